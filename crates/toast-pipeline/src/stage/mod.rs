//! The stage loop: the single cooperative UI context.
//!
//! One task owns presenters, strong render elements, the visible stack, the
//! archive aggregator and the placement strategy. Everything else reaches
//! it through [`UiCommand`]s. Commands are served before timers, so a batch
//! archival requested by the worker completes before the next release tick.

mod flows;
mod link;

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::Instant;
use toast_model::{Notification, NotificationId, NotificationKind, NotificationState};

use crate::archive::ArchiveAggregator;
use crate::cache::{CacheCounts, ElementCache};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::geometry::Point;
use crate::incident::{IncidentKind, IncidentSink};
use crate::placement::Placement;
use crate::presenter::{PresenterId, PresenterPool, PresenterState};
use crate::scheduler::{CandidateQueue, Rendezvous};
use crate::timers::{Timer, TimerKind, Timers, wait_until};

pub(crate) use link::{UiCommand, UiLink};

#[derive(Debug, Clone, Serialize)]
pub struct VisibleEntry {
    pub presenter: PresenterId,
    pub notification: NotificationId,
    pub presenter_state: PresenterState,
    pub notification_state: NotificationState,
    pub position: Point,
    /// Hold timer is paused while the pointer is over the toast.
    pub hovered: bool,
}

/// Point-in-time view of the pipeline, as seen from the stage loop.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StageSnapshot {
    /// Visible presenters, top of the stack first.
    pub visible: Vec<VisibleEntry>,
    pub idle_presenters: usize,
    pub total_presenters: usize,
    pub candidates: usize,
    pub pending: usize,
    pub releasing: bool,
    pub archive_group: Option<NotificationId>,
    pub archive_len: usize,
    pub archive_shown: bool,
    pub archive_kinds: BTreeMap<NotificationKind, usize>,
    pub cache: CacheCounts,
}

impl StageSnapshot {
    pub fn entry(&self, id: NotificationId) -> Option<&VisibleEntry> {
        self.visible.iter().find(|entry| entry.notification == id)
    }
}

/// What shutdown had to clean up by force.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    /// Queued notifications destroyed before ever being shown.
    pub queued_destroyed: usize,
    pub visible_destroyed: usize,
    /// Cache entries still alive at shutdown.
    pub leaked_elements: usize,
}

/// Handles shared between the stage loop and the public API.
#[derive(Debug, Clone)]
pub(crate) struct Shared {
    pub candidates: CandidateQueue,
    pub pending: Arc<AtomicUsize>,
    pub visible: Arc<AtomicUsize>,
    pub incidents: IncidentSink,
}

pub(crate) struct Stage {
    commands: mpsc::UnboundedReceiver<UiCommand>,
    shared: Shared,
    pool: PresenterPool,
    cache: ElementCache,
    aggregator: ArchiveAggregator,
    placement: Box<dyn Placement>,
    rendezvous: Rendezvous,
    timers: Timers,
    releasing: bool,
    release_seq: u64,
    release_interval: Duration,
    enter: Duration,
    exit: Duration,
    default_hold: Duration,
}

impl Stage {
    pub fn new(
        config: &PipelineConfig,
        shared: Shared,
        commands: mpsc::UnboundedReceiver<UiCommand>,
        cache: ElementCache,
        placement: Box<dyn Placement>,
        rendezvous: Rendezvous,
    ) -> Self {
        Self {
            commands,
            shared,
            pool: PresenterPool::new(),
            cache,
            aggregator: ArchiveAggregator::new(),
            placement,
            rendezvous,
            timers: Timers::default(),
            releasing: false,
            release_seq: 0,
            release_interval: config.release_interval(),
            enter: config.enter_animation(),
            exit: config.exit_animation(),
            default_hold: config.default_hold(),
        }
    }

    pub async fn run(mut self) {
        tracing::info!("Stage loop started");

        loop {
            let deadline = self.timers.next_deadline();
            tokio::select! {
                biased;
                command = self.commands.recv() => match command {
                    Some(UiCommand::Shutdown { leftovers, reply }) => {
                        let report = self.shutdown(leftovers);
                        let _ = reply.send(report);
                        break;
                    }
                    Some(command) => self.handle(command),
                    None => {
                        self.shutdown(Vec::new());
                        break;
                    }
                },
                count = self.cache.recycle_reclaimed() => {
                    tracing::trace!(count, "Reclaimed elements recycled");
                }
                () = wait_until(deadline) => self.fire_due(),
            }
        }

        tracing::info!("Stage loop stopped");
    }

    fn handle(&mut self, command: UiCommand) {
        match command {
            UiCommand::StartRelease => self.start_release(),
            UiCommand::StopRelease => {
                self.releasing = false;
                self.release_seq += 1;
                tracing::debug!("Release timer stopped");
            }
            UiCommand::ArchiveBatch { batch, reply } => {
                let result = self.aggregator.archive_batch(batch, &mut self.cache);
                if let Err(e) = &result {
                    self.shared
                        .incidents
                        .report(IncidentKind::Archival, None, e.to_string());
                }
                let _ = reply.send(result);
            }
            UiCommand::Discard { batch } => self.discard(batch),
            UiCommand::Close { id, reply } => {
                let result = self.close(id);
                let _ = reply.send(result);
            }
            UiCommand::Archive { id, reply } => {
                let result = self.archive(id);
                let _ = reply.send(result);
            }
            UiCommand::Reveal { id, reply } => {
                let result = self.reveal(id);
                let _ = reply.send(result);
            }
            UiCommand::Restore { id, reply } => {
                let result = self.restore(id);
                let _ = reply.send(result);
            }
            UiCommand::ShowArchive { reply } => {
                let result = self.show_archive();
                let _ = reply.send(result);
            }
            UiCommand::Hover { id, hovered } => self.hover(id, hovered),
            UiCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            // Handled by the run loop.
            UiCommand::Shutdown { .. } => {}
        }
    }

    fn start_release(&mut self) {
        if self.releasing {
            return;
        }
        self.releasing = true;
        self.release_seq += 1;
        // First tick fires at once.
        self.timers
            .schedule(Instant::now(), self.release_seq, TimerKind::ReleaseTick);
        tracing::debug!("Release timer started");
    }

    fn fire_due(&mut self) {
        let now = Instant::now();
        while let Some(timer) = self.timers.pop_due(now) {
            self.fire(timer);
        }
    }

    fn fire(&mut self, timer: Timer) {
        match timer.kind {
            TimerKind::ReleaseTick => {
                if !self.releasing || timer.seq != self.release_seq {
                    return;
                }
                self.release_tick();
                self.timers.schedule(
                    timer.at + self.release_interval,
                    self.release_seq,
                    TimerKind::ReleaseTick,
                );
            }
            TimerKind::EnterDone(pid) => self.enter_done(pid, timer.seq),
            TimerKind::HoldDone(pid) => self.hold_done(pid, timer.seq),
            TimerKind::ExitDone(pid) => self.exited(pid, timer.seq),
        }
    }

    /// Releases one candidate. Failures, panics included, are reported
    /// through the rendezvous and the incident channel.
    fn release_tick(&mut self) {
        let Some(notification) = self.shared.candidates.pop() else {
            self.rendezvous.publish(None);
            return;
        };
        let id = notification.id();

        // Newest toast takes the slot nearest the corner.
        let poison = match self.show(notification, 0) {
            Ok(_) => None,
            Err(e) => {
                let kind = match &e {
                    PipelineError::ElementCreation(_) => IncidentKind::ElementCreation,
                    PipelineError::Placement(_) => IncidentKind::Placement,
                    _ => IncidentKind::ReleaseFailed,
                };
                self.shared.incidents.report(kind, Some(id), e.to_string());
                Some(e.to_string())
            }
        };
        self.rendezvous.publish(poison);
    }

    pub(super) fn sync_visible(&self) {
        self.shared
            .visible
            .store(self.pool.visible_len(), Ordering::SeqCst);
    }

    fn snapshot(&self) -> StageSnapshot {
        let visible = self
            .pool
            .visible()
            .iter()
            .filter_map(|pid| {
                let presenter = self.pool.get(*pid)?;
                let notification = presenter.notification()?;
                Some(VisibleEntry {
                    presenter: *pid,
                    notification: notification.id(),
                    presenter_state: presenter.state(),
                    notification_state: notification.state(),
                    position: presenter.position(),
                    hovered: presenter.is_hovered(),
                })
            })
            .collect();
        let group = self.aggregator.group();
        let archive_kinds = group
            .as_ref()
            .and_then(|g| g.members().map(|m| m.kind_counts()))
            .unwrap_or_default();

        StageSnapshot {
            visible,
            idle_presenters: self.pool.idle_count(),
            total_presenters: self.pool.total(),
            candidates: self.shared.candidates.len(),
            pending: self.shared.pending.load(Ordering::SeqCst),
            releasing: self.releasing,
            archive_group: group.map(|g| g.id()),
            archive_len: self.aggregator.len(),
            archive_shown: self.aggregator.is_shown(),
            archive_kinds,
            cache: self.cache.counts(),
        }
    }

    fn shutdown(&mut self, leftovers: Vec<Arc<Notification>>) -> ShutdownReport {
        self.releasing = false;
        self.timers.clear();

        let mut queued = leftovers;
        queued.extend(self.shared.candidates.drain());
        for notification in &queued {
            self.destroy_notification(notification, true);
        }

        let visible = self.pool.visible().to_vec();
        for pid in &visible {
            self.reset_presenter(*pid, true);
        }
        self.pool.destroy_idle();

        if let Some(group) = self.aggregator.take() {
            self.destroy_notification(&group, true);
        }
        self.placement.on_shutdown();

        let report = ShutdownReport {
            queued_destroyed: queued.len(),
            visible_destroyed: visible.len(),
            leaked_elements: self.cache.shutdown(),
        };
        tracing::info!(
            queued = report.queued_destroyed,
            visible = report.visible_destroyed,
            leaked = report.leaked_elements,
            "Stage shut down"
        );
        report
    }
}

pub(super) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
