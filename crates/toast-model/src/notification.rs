//! Core notification type.
//!
//! A `Notification` is shared as `Arc<Notification>` between producer
//! threads, the delivery worker and the UI stage. Content and parameters are
//! immutable; only the lifecycle state (and its episode counter) changes.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::group::GroupMembers;
use crate::hooks::{ArchiveContext, Hooks, StateChange, StateListener};
use crate::kind::NotificationKind;
use crate::params::{AudioCue, DisplayParams, Hold};
use crate::state::{NotificationState, TransitionError};
use crate::tier::ReferenceTier;

const DIGEST_BODY_CHARS: usize = 80;

/// Unique identifier for a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NotificationId(u64);

impl NotificationId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub struct Notification {
    id: NotificationId,
    kind: NotificationKind,
    title: String,
    body: String,
    params: DisplayParams,
    hooks: Hooks,
    created: Instant,
    created_at: DateTime<Utc>,
    state: Mutex<NotificationState>,
    /// Set while the notification sits in the delivery queues.
    queued: AtomicBool,
    episode: AtomicU32,
    digest: OnceLock<String>,
    listeners: Mutex<Vec<Arc<StateListener>>>,
    members: Option<GroupMembers>,
}

impl Notification {
    pub fn builder(kind: NotificationKind, title: impl Into<String>) -> NotificationBuilder {
        NotificationBuilder::new(kind, title)
    }

    /// Creates an archive group: a `List` notification that owns archived members.
    pub fn group(title: impl Into<String>) -> Arc<Self> {
        let mut notification = NotificationBuilder::new(NotificationKind::List, title)
            .hold(Hold::Indefinite)
            .into_notification();
        notification.members = Some(GroupMembers::new());
        Arc::new(notification)
    }

    pub fn id(&self) -> NotificationId {
        self.id
    }

    pub fn kind(&self) -> NotificationKind {
        self.kind
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn params(&self) -> &DisplayParams {
        &self.params
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    /// Monotonic creation instant.
    pub fn created(&self) -> Instant {
        self.created
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Milliseconds since creation, on the monotonic clock.
    pub fn age_ms(&self) -> u128 {
        self.created.elapsed().as_millis()
    }

    pub fn state(&self) -> NotificationState {
        *lock(&self.state)
    }

    /// Claims the notification for the delivery queues. Fails when it is
    /// already queued or not in `AbleShow`. The claim ends with the first
    /// transition out of `AbleShow` or with [`Notification::release_queued`].
    pub fn try_mark_queued(&self) -> bool {
        let state = lock(&self.state);
        *state == NotificationState::AbleShow
            && self
                .queued
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
    }

    pub fn is_queued(&self) -> bool {
        self.queued.load(Ordering::SeqCst)
    }

    pub fn release_queued(&self) {
        self.queued.store(false, Ordering::SeqCst);
    }

    /// Lifecycle episode, incremented by every `Archive -> AbleShow` reset.
    pub fn episode(&self) -> u32 {
        self.episode.load(Ordering::SeqCst)
    }

    pub fn is_group(&self) -> bool {
        self.members.is_some()
    }

    /// Archived members, present only on group notifications.
    pub fn members(&self) -> Option<&GroupMembers> {
        self.members.as_ref()
    }

    /// Summary line, computed on first use.
    pub fn digest(&self) -> &str {
        self.digest.get_or_init(|| {
            let stamp = self.created_at.format("%H:%M:%S");
            if self.body.is_empty() {
                return format!("[{}] {} ({stamp})", self.kind, self.title);
            }
            let mut body: String = self.body.chars().take(DIGEST_BODY_CHARS).collect();
            if self.body.chars().count() > DIGEST_BODY_CHARS {
                body.push_str("...");
            }
            format!("[{}] {}: {body} ({stamp})", self.kind, self.title)
        })
    }

    /// Tier proposed when the notification leaves the screen.
    pub fn preferred_tier(&self, default: ReferenceTier) -> ReferenceTier {
        self.params.reference_tier.unwrap_or(default)
    }

    /// Tier after the notification's own archive hook has had its say.
    pub fn select_tier(&self, ctx: ArchiveContext) -> ReferenceTier {
        self.hooks.select_tier(self, ctx).unwrap_or(ctx.proposed)
    }

    pub fn hold(&self) -> Hold {
        self.params.hold
    }

    pub fn audio(&self) -> Option<&AudioCue> {
        self.params.audio.as_ref()
    }

    /// Registers a listener invoked after every successful transition.
    pub fn on_state_change(
        &self,
        listener: impl Fn(&Notification, StateChange) + Send + Sync + 'static,
    ) {
        lock(&self.listeners).push(Arc::new(listener));
    }

    /// Moves to `next`, returning the previous state.
    pub fn transition(
        &self,
        next: NotificationState,
    ) -> Result<NotificationState, TransitionError> {
        let from = {
            let mut state = lock(&self.state);
            let from = *state;
            if !from.can_transition_to(next) {
                return Err(TransitionError {
                    id: self.id,
                    from,
                    to: next,
                });
            }
            *state = next;
            if from == NotificationState::AbleShow {
                self.queued.store(false, Ordering::SeqCst);
            }
            from
        };
        tracing::trace!(id = %self.id, ?from, to = ?next, "Notification state changed");
        self.notify(StateChange { from, to: next });
        Ok(from)
    }

    /// `Archive -> AbleShow`: starts a new lifecycle episode.
    pub fn reset(&self) -> Result<(), TransitionError> {
        let state = self.state();
        if state != NotificationState::Archive {
            return Err(TransitionError {
                id: self.id,
                from: state,
                to: NotificationState::AbleShow,
            });
        }
        self.transition(NotificationState::AbleShow)?;
        self.episode.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn notify(&self, change: StateChange) {
        let listeners = lock(&self.listeners).clone();
        for listener in listeners {
            listener(self, change);
        }
    }
}

impl fmt::Debug for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notification")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("title", &self.title)
            .field("state", &self.state())
            .field("episode", &self.episode())
            .field("group", &self.is_group())
            .finish()
    }
}

/// Builds a notification with its full hook set in one go.
pub struct NotificationBuilder {
    kind: NotificationKind,
    title: String,
    body: String,
    params: DisplayParams,
    hooks: Hooks,
}

impl NotificationBuilder {
    pub fn new(kind: NotificationKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            body: String::new(),
            params: DisplayParams::default(),
            hooks: Hooks::default(),
        }
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn hold(mut self, hold: Hold) -> Self {
        self.params.hold = hold;
        self
    }

    pub fn hold_for(self, duration: Duration) -> Self {
        self.hold(Hold::For(duration))
    }

    /// Screen offsets consumed by the placement strategy.
    pub fn offset(mut self, fix_x: Option<f32>, fix_y: Option<f32>) -> Self {
        self.params.fix_x = fix_x;
        self.params.fix_y = fix_y;
        self
    }

    pub fn audio(mut self, cue: AudioCue) -> Self {
        self.params.audio = Some(cue);
        self
    }

    pub fn reference_tier(mut self, tier: ReferenceTier) -> Self {
        self.params.reference_tier = Some(tier);
        self
    }

    pub fn on_archive(
        mut self,
        hook: impl Fn(&Notification, ArchiveContext) -> Option<ReferenceTier> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.archive = Some(Arc::new(hook));
        self
    }

    pub fn on_element_destroyed(
        mut self,
        hook: impl Fn(&Notification) + Send + Sync + 'static,
    ) -> Self {
        self.hooks.element_destroyed = Some(Arc::new(hook));
        self
    }

    pub fn on_element_recycled(
        mut self,
        hook: impl Fn(&Notification) + Send + Sync + 'static,
    ) -> Self {
        self.hooks.element_recycled = Some(Arc::new(hook));
        self
    }

    /// `veto` returns `false` to keep the notification open.
    pub fn close_veto(mut self, veto: impl Fn(&Notification) -> bool + Send + Sync + 'static) -> Self {
        self.hooks.close_veto = Some(Arc::new(veto));
        self
    }

    pub fn build(self) -> Arc<Notification> {
        Arc::new(self.into_notification())
    }

    fn into_notification(self) -> Notification {
        Notification {
            id: NotificationId::next(),
            kind: self.kind,
            title: self.title,
            body: self.body,
            params: self.params,
            hooks: self.hooks,
            created: Instant::now(),
            created_at: Utc::now(),
            state: Mutex::new(NotificationState::AbleShow),
            queued: AtomicBool::new(false),
            episode: AtomicU32::new(0),
            digest: OnceLock::new(),
            listeners: Mutex::new(Vec::new()),
            members: None,
        }
    }
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
