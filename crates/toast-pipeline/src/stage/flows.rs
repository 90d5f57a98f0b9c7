//! Presenter flows run inside the stage loop: show, hold, exit, reset and
//! the requests that route to a bound presenter.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio::time::Instant;
use toast_model::{Notification, NotificationId, NotificationState};

use super::{Stage, panic_message};
use crate::cache::EntryKind;
use crate::error::{PipelineError, Result};
use crate::incident::IncidentKind;
use crate::presenter::{Presenter, PresenterId, PresenterState};
use crate::timers::TimerKind;

impl Stage {
    fn presenter_mut(&mut self, pid: PresenterId) -> Result<&mut Presenter> {
        self.pool
            .get_mut(pid)
            .ok_or(PipelineError::UnknownPresenter(pid))
    }

    /// Displays `notification` at `index` of the visible stack. A failed or
    /// panicking attempt is abandoned before the error is returned; only the
    /// presenter acquired for this attempt is released.
    pub(super) fn show(&mut self, notification: Arc<Notification>, index: usize) -> Result<PresenterId> {
        let pid = match self.pool.acquire(Arc::clone(&notification)) {
            Ok(pid) => pid,
            Err(e) => {
                self.abandon(None, &notification);
                return Err(e);
            }
        };
        let attempt = catch_unwind(AssertUnwindSafe(|| self.present(pid, &notification, index)));
        let result = attempt
            .unwrap_or_else(|payload| Err(PipelineError::Release(panic_message(payload.as_ref()))));
        match result {
            Ok(()) => Ok(pid),
            Err(e) => {
                self.abandon(Some(pid), &notification);
                Err(e)
            }
        }
    }

    fn present(&mut self, pid: PresenterId, notification: &Arc<Notification>, index: usize) -> Result<()> {
        let id = notification.id();
        let size = {
            let element = self.cache.get(notification)?;
            element.on_attached();
            element.size()
        };
        if notification.state() != NotificationState::Hide {
            notification.transition(NotificationState::Showing)?;
        }

        let presenter = self
            .pool
            .get_mut(pid)
            .ok_or(PipelineError::UnknownPresenter(pid))?;
        presenter.set_size(size);
        presenter.transition(PresenterState::Showing)?;
        let anchor = self.placement.anchor(&presenter.view());
        presenter.set_position(anchor);
        let seq = presenter.begin_animation();

        self.pool.insert_visible(pid, index);
        self.sync_visible();
        self.timers
            .schedule(Instant::now() + self.enter, seq, TimerKind::EnterDone(pid));
        self.relayout()?;

        if let Some(cue) = notification.audio() {
            tracing::debug!(%id, cue = cue.name(), "Audio cue requested");
        }
        tracing::debug!(
            %id,
            presenter = %pid,
            kind = %notification.kind(),
            waited_ms = notification.age_ms(),
            "Notification showing"
        );
        Ok(())
    }

    pub(super) fn enter_done(&mut self, pid: PresenterId, seq: u64) {
        let now = Instant::now();
        let Some(presenter) = self.pool.get_mut(pid) else {
            return;
        };
        if presenter.anim_seq() != seq || presenter.state() != PresenterState::Showing {
            return;
        }
        if let Err(e) = presenter.transition(PresenterState::Shown) {
            tracing::error!(error = %e, "Failed to finish enter animation");
            return;
        }
        let Some(notification) = presenter.notification().cloned() else {
            return;
        };
        if notification.state() == NotificationState::Showing {
            if let Err(e) = notification.transition(NotificationState::Shown) {
                tracing::error!(error = %e, "Failed to mark notification shown");
            }
        }

        let Some(hold) = notification.hold().resolve(self.default_hold) else {
            return;
        };
        if let Some((deadline, hold_seq)) = presenter.start_hold(now, hold) {
            self.timers
                .schedule(deadline, hold_seq, TimerKind::HoldDone(pid));
        }
    }

    pub(super) fn hold_done(&mut self, pid: PresenterId, seq: u64) {
        let current = self
            .pool
            .get(pid)
            .is_some_and(|p| p.anim_seq() == seq && p.state() == PresenterState::Shown);
        if !current {
            return;
        }
        if let Err(e) = self.close_presenter(pid) {
            tracing::error!(presenter = %pid, error = %e, "Hold expiry failed to close");
        }
    }

    /// No-op unless the presenter is displayed.
    fn close_presenter(&mut self, pid: PresenterId) -> Result<()> {
        let presenter = self
            .pool
            .get(pid)
            .ok_or(PipelineError::UnknownPresenter(pid))?;
        if !presenter.state().is_displayed() {
            return Ok(());
        }
        let Some(notification) = presenter.notification().cloned() else {
            return Ok(());
        };
        if !notification.hooks().allows_close(&notification) {
            tracing::debug!(id = %notification.id(), "Close vetoed");
            return Ok(());
        }
        if notification.state() != NotificationState::Hide {
            notification.transition(NotificationState::Closing)?;
        }
        self.begin_exit(pid)
    }

    fn archive_presenter(&mut self, pid: PresenterId) -> Result<()> {
        let presenter = self
            .pool
            .get(pid)
            .ok_or(PipelineError::UnknownPresenter(pid))?;
        let notification = presenter
            .notification()
            .cloned()
            .ok_or(PipelineError::UnknownPresenter(pid))?;
        if !presenter.state().is_displayed() {
            return Err(PipelineError::NotVisible(notification.id()));
        }
        // A revealed member is already archived; leaving the screen is enough.
        if notification.state() != NotificationState::Hide {
            notification.transition(NotificationState::Archiving)?;
        }
        self.begin_exit(pid)
    }

    fn begin_exit(&mut self, pid: PresenterId) -> Result<()> {
        let exit = self.exit;
        let presenter = self.presenter_mut(pid)?;
        presenter.transition(PresenterState::Hiding)?;
        let seq = presenter.begin_animation();
        self.timers
            .schedule(Instant::now() + exit, seq, TimerKind::ExitDone(pid));
        Ok(())
    }

    pub(super) fn exited(&mut self, pid: PresenterId, seq: u64) {
        let Some(presenter) = self.pool.get_mut(pid) else {
            return;
        };
        if presenter.anim_seq() != seq || presenter.state() != PresenterState::Hiding {
            return;
        }
        if let Err(e) = presenter.transition(PresenterState::Hidden) {
            tracing::error!(error = %e, "Failed to finish exit animation");
            return;
        }
        self.reset_presenter(pid, false);
        self.relayout_or_report();
        self.maybe_cleanup();
    }

    /// Unbinds a presenter and returns it to the idle set.
    fn detach(&mut self, pid: PresenterId) -> Option<Arc<Notification>> {
        let presenter = self.pool.get_mut(pid)?;
        presenter.cancel_animations();
        if !presenter.state().is_idle() {
            if let Err(e) = presenter.transition(PresenterState::Reset) {
                tracing::error!(error = %e, "Failed to reset presenter");
            }
        }
        let notification = presenter.take_notification();
        self.pool.remove_visible(pid);
        self.pool.release(pid);
        self.sync_visible();

        if let Some(n) = &notification {
            if let Some(element) = self.cache.try_get(n.id()) {
                element.on_detached();
            }
        }
        notification
    }

    /// Resets a presenter and routes its notification by state: destroyed
    /// when forced or closing, archived when archiving, element forgotten
    /// when it was a revealed archive member.
    pub(super) fn reset_presenter(&mut self, pid: PresenterId, force: bool) {
        let Some(notification) = self.detach(pid) else {
            return;
        };
        let id = notification.id();

        match notification.state() {
            _ if force => self.destroy_notification(&notification, true),
            NotificationState::Closing if notification.is_group() => {
                self.destroy_notification(&notification, true);
            }
            NotificationState::Closing => {
                if let Err(e) = self.cache.retire(&notification) {
                    tracing::error!(%id, error = %e, "Failed to retire element");
                }
                // A strong element has nobody left to keep it for.
                if self.cache.entry_kind(id) == Some(EntryKind::Strong) {
                    self.cache.forget(&notification);
                }
                self.destroy_notification(&notification, false);
            }
            NotificationState::Archiving if notification.is_group() => {
                if let Err(e) = self.park_group(&notification) {
                    tracing::error!(%id, error = %e, "Failed to park archive group");
                }
            }
            NotificationState::Archiving => {
                if let Err(e) = self.aggregator.archive_displayed(&notification, &mut self.cache) {
                    self.shared
                        .incidents
                        .report(IncidentKind::Archival, Some(id), e.to_string());
                    self.destroy_notification(&notification, true);
                }
            }
            NotificationState::Hide => {
                self.cache.forget(&notification);
            }
            state => {
                self.shared.incidents.report(
                    IncidentKind::ContractViolation,
                    Some(id),
                    format!("presenter {pid} reset with notification in {state:?}"),
                );
            }
        }
    }

    /// Takes the group off screen without touching its members.
    fn park_group(&mut self, group: &Arc<Notification>) -> Result<()> {
        if group.state().is_displayed() {
            group.transition(NotificationState::Archiving)?;
        }
        self.cache.archive(group)?;
        group.transition(NotificationState::Archive)?;
        Ok(())
    }

    /// Destroys a notification. Group members go with their group.
    pub(super) fn destroy_notification(&mut self, notification: &Arc<Notification>, teardown: bool) {
        if let Some(members) = notification.members() {
            for member in members.drain() {
                match self.pool.bound_to(member.id()) {
                    Some(pid) => self.reset_presenter(pid, true),
                    None => self.destroy_notification(&member, teardown),
                }
            }
        }
        if teardown {
            self.cache.forget(notification);
        }
        self.aggregator.remove_member(notification.id());
        if notification.state() != NotificationState::Destroy {
            if let Err(e) = notification.transition(NotificationState::Destroy) {
                tracing::error!(error = %e, "Failed to destroy notification");
            }
        }
        tracing::debug!(id = %notification.id(), teardown, "Notification destroyed");
    }

    /// Force-destroys overflow the archive refused.
    pub(super) fn discard(&mut self, batch: Vec<Arc<Notification>>) {
        let count = batch.len();
        for n in &batch {
            if n.state() == NotificationState::Destroy {
                continue;
            }
            match self.pool.bound_to(n.id()) {
                Some(pid) => self.reset_presenter(pid, true),
                None => self.destroy_notification(n, true),
            }
        }
        self.shared.incidents.report(
            IncidentKind::Archival,
            None,
            format!("{count} overflowed notifications destroyed after archival failed"),
        );
        self.relayout_or_report();
    }

    /// Drops whatever a failed display attempt left behind. `pid` is the
    /// presenter acquired for that attempt, if it got that far. The live
    /// group survives and can be shown again.
    pub(super) fn abandon(&mut self, pid: Option<PresenterId>, notification: &Arc<Notification>) {
        if notification.is_group() {
            if let Some(pid) = pid {
                self.detach(pid);
            }
            if notification.state().is_displayed() {
                if let Err(e) = self.park_group(notification) {
                    tracing::error!(error = %e, "Failed to park archive group");
                }
            }
        } else {
            match pid {
                Some(pid) => self.reset_presenter(pid, true),
                None => self.destroy_notification(notification, true),
            }
        }
        self.relayout_or_report();
    }

    /// Applies the placement strategy to the visible stack. Presenters that
    /// no longer fit are archived.
    fn relayout(&mut self) -> Result<()> {
        let views = self.pool.views();
        if views.is_empty() {
            return Ok(());
        }
        let layout = self
            .placement
            .adjust(&views)
            .map_err(|e| PipelineError::Placement(format!("{e:#}")))?;

        for (pid, position) in layout.positions {
            if let Some(presenter) = self.pool.get_mut(pid) {
                presenter.set_position(position);
            }
        }
        for pid in layout.overflow {
            tracing::debug!(presenter = %pid, "Presenter out of bounds, archiving");
            if let Err(e) = self.archive_presenter(pid) {
                tracing::warn!(presenter = %pid, error = %e, "Failed to archive overflowing presenter");
            }
        }
        Ok(())
    }

    fn relayout_or_report(&mut self) {
        if let Err(e) = self.relayout() {
            self.shared
                .incidents
                .report(IncidentKind::Placement, None, e.to_string());
        }
    }

    /// Destroys idle presenters once nothing queued or visible will close
    /// by itself.
    fn maybe_cleanup(&mut self) {
        if self.shared.pending.load(Ordering::SeqCst) > 0
            || self.shared.candidates.any(|n| n.hold().is_bounded())
        {
            return;
        }
        let timed_visible = self.pool.visible().iter().any(|pid| {
            self.pool
                .get(*pid)
                .and_then(Presenter::notification)
                .is_some_and(|n| n.hold().is_bounded())
        });
        if timed_visible {
            return;
        }
        let destroyed = self.pool.destroy_idle();
        if destroyed > 0 {
            tracing::debug!(count = destroyed, "Idle presenters destroyed");
        }
    }

    pub(super) fn hover(&mut self, id: NotificationId, hovered: bool) {
        let Some(pid) = self.pool.find_by_notification(id) else {
            return;
        };
        let Some(presenter) = self.pool.get_mut(pid) else {
            return;
        };
        if let Some((deadline, seq)) = presenter.set_hovered(hovered, Instant::now()) {
            self.timers.schedule(deadline, seq, TimerKind::HoldDone(pid));
        }
    }

    pub(super) fn close(&mut self, id: NotificationId) -> Result<()> {
        let pid = self
            .pool
            .find_by_notification(id)
            .ok_or(PipelineError::NotVisible(id))?;
        self.close_presenter(pid)
    }

    pub(super) fn archive(&mut self, id: NotificationId) -> Result<()> {
        let pid = self
            .pool
            .find_by_notification(id)
            .ok_or(PipelineError::NotVisible(id))?;
        self.archive_presenter(pid)
    }

    /// Shows an archived member on top of the stack, bypassing the queues.
    pub(super) fn reveal(&mut self, id: NotificationId) -> Result<()> {
        let member = self.aggregator.member(id)?;
        if self.pool.bound_to(id).is_some() {
            return Ok(());
        }
        if member.state() != NotificationState::Hide {
            member.transition(NotificationState::Hide)?;
        }
        self.show(member, 0)?;
        tracing::debug!(%id, "Archived notification revealed");
        Ok(())
    }

    /// Takes a member out of the archive and resets it for resubmission.
    pub(super) fn restore(&mut self, id: NotificationId) -> Result<Arc<Notification>> {
        let member = self.aggregator.member(id)?;
        member.reset()?;
        self.aggregator.remove_member(id);
        tracing::debug!(%id, episode = member.episode(), "Archived notification restored");
        Ok(member)
    }

    pub(super) fn show_archive(&mut self) -> Result<()> {
        let group = self.aggregator.group().ok_or(PipelineError::NoArchive)?;
        if self.pool.bound_to(group.id()).is_some() {
            return Ok(());
        }
        if group.state() == NotificationState::Archive {
            group.reset()?;
        }
        self.show(group, 0)?;
        Ok(())
    }
}
