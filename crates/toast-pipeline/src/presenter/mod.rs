//! Presenters: pooled on-screen surfaces bound to one visible notification.
//!
//! ```text
//! Initial/Reset -> Prepare -> Showing -> Shown -> Hiding -> Hidden -> Reset
//! Initial/Reset -> Destroy
//! ```
//!
//! Any live state may be forced to `Reset` when a display attempt is
//! abandoned or the pipeline shuts down.

mod pool;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use toast_model::Notification;

use crate::error::{PipelineError, Result};
use crate::geometry::{Point, Size};

pub use pool::PresenterPool;

/// Arena handle. The generation changes whenever a slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PresenterId {
    index: u32,
    generation: u32,
}

impl PresenterId {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub(crate) fn index(self) -> usize {
        self.index as usize
    }

    pub(crate) fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for PresenterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}.{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenterState {
    Initial,
    Prepare,
    Showing,
    Shown,
    Hiding,
    Hidden,
    Reset,
    Destroy,
}

impl PresenterState {
    pub fn can_transition_to(self, next: PresenterState) -> bool {
        use PresenterState::*;

        match (self, next) {
            (Destroy, _) => false,
            (Initial | Reset, Destroy | Prepare) => true,
            (_, Destroy) => false,
            (Prepare, Showing) => true,
            (Showing, Shown | Hiding) => true,
            (Shown, Hiding) => true,
            (Hiding, Hidden) => true,
            (Initial | Reset, Reset) => false,
            (_, Reset) => true,
            _ => false,
        }
    }

    pub fn is_idle(self) -> bool {
        matches!(self, Self::Initial | Self::Reset)
    }

    pub fn is_displayed(self) -> bool {
        matches!(self, Self::Showing | Self::Shown)
    }
}

/// Geometry handed to placement strategies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresenterView {
    pub id: PresenterId,
    pub state: PresenterState,
    pub size: Size,
    pub position: Point,
    pub fix_x: Option<f32>,
    pub fix_y: Option<f32>,
}

#[derive(Debug)]
pub struct Presenter {
    id: PresenterId,
    state: PresenterState,
    notification: Option<Arc<Notification>>,
    size: Size,
    position: Point,
    hovered: bool,
    anim_seq: u64,
    hold_deadline: Option<Instant>,
    hold_remaining: Option<Duration>,
}

impl Presenter {
    pub(crate) fn new(id: PresenterId) -> Self {
        Self {
            id,
            state: PresenterState::Initial,
            notification: None,
            size: Size::default(),
            position: Point::default(),
            hovered: false,
            anim_seq: 0,
            hold_deadline: None,
            hold_remaining: None,
        }
    }

    pub fn id(&self) -> PresenterId {
        self.id
    }

    pub fn state(&self) -> PresenterState {
        self.state
    }

    pub fn notification(&self) -> Option<&Arc<Notification>> {
        self.notification.as_ref()
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn is_hovered(&self) -> bool {
        self.hovered
    }

    pub(crate) fn anim_seq(&self) -> u64 {
        self.anim_seq
    }

    pub(crate) fn transition(&mut self, next: PresenterState) -> Result<PresenterState> {
        let from = self.state;
        if !from.can_transition_to(next) {
            return Err(PipelineError::PresenterTransition {
                presenter: self.id,
                from,
                to: next,
            });
        }
        self.state = next;
        tracing::trace!(presenter = %self.id, ?from, to = ?next, "Presenter state changed");
        Ok(from)
    }

    /// Binds an idle presenter to `notification`.
    pub(crate) fn bind(&mut self, notification: Arc<Notification>) -> Result<()> {
        self.transition(PresenterState::Prepare)?;
        self.notification = Some(notification);
        self.hovered = false;
        Ok(())
    }

    pub(crate) fn take_notification(&mut self) -> Option<Arc<Notification>> {
        self.notification.take()
    }

    pub(crate) fn set_size(&mut self, size: Size) {
        self.size = size;
    }

    pub(crate) fn set_position(&mut self, position: Point) {
        self.position = position;
    }

    /// Starts a new animation; pending events of earlier ones become stale.
    pub(crate) fn begin_animation(&mut self) -> u64 {
        self.cancel_animations();
        self.anim_seq
    }

    pub(crate) fn cancel_animations(&mut self) {
        self.anim_seq += 1;
        self.hold_deadline = None;
        self.hold_remaining = None;
    }

    /// Starts the hold countdown, or parks it while the pointer is over us.
    /// Returns the deadline and sequence to schedule, if any.
    pub(crate) fn start_hold(&mut self, now: Instant, duration: Duration) -> Option<(Instant, u64)> {
        let seq = self.begin_animation();
        if self.hovered {
            self.hold_remaining = Some(duration);
            return None;
        }
        let deadline = now + duration;
        self.hold_deadline = Some(deadline);
        Some((deadline, seq))
    }

    pub(crate) fn set_hovered(&mut self, hovered: bool, now: Instant) -> Option<(Instant, u64)> {
        if self.hovered == hovered {
            return None;
        }
        self.hovered = hovered;
        if hovered {
            if let Some(deadline) = self.hold_deadline.take() {
                self.hold_remaining = Some(deadline.saturating_duration_since(now));
                self.anim_seq += 1;
            }
            return None;
        }
        let remaining = self.hold_remaining.take()?;
        if self.state != PresenterState::Shown {
            return None;
        }
        self.start_hold(now, remaining)
    }

    pub fn view(&self) -> PresenterView {
        let params = self.notification.as_ref().map(|n| n.params());
        PresenterView {
            id: self.id,
            state: self.state,
            size: self.size,
            position: self.position,
            fix_x: params.and_then(|p| p.fix_x),
            fix_y: params.and_then(|p| p.fix_y),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PresenterState::*;
    use super::*;

    #[test]
    fn lifecycle_path_is_allowed() {
        let path = [Prepare, Showing, Shown, Hiding, Hidden, Reset, Prepare];
        let mut state = Initial;
        for next in path {
            assert!(state.can_transition_to(next), "{state:?} -> {next:?}");
            state = next;
        }
    }

    #[test]
    fn destroy_only_from_idle() {
        assert!(Initial.can_transition_to(Destroy));
        assert!(Reset.can_transition_to(Destroy));
        for busy in [Prepare, Showing, Shown, Hiding, Hidden] {
            assert!(!busy.can_transition_to(Destroy), "{busy:?}");
            assert!(busy.can_transition_to(Reset), "{busy:?}");
        }
        assert!(!Destroy.can_transition_to(Reset));
    }

    #[test]
    fn illegal_transition_names_presenter() {
        let mut presenter = Presenter::new(PresenterId::new(3, 1));
        let err = presenter.transition(Shown).unwrap_err();
        assert_eq!(
            err,
            PipelineError::PresenterTransition {
                presenter: PresenterId::new(3, 1),
                from: Initial,
                to: Shown,
            }
        );
        assert_eq!(err.to_string(), "illegal presenter transition for p3.1: Initial -> Shown");
    }

    #[test]
    fn hover_pauses_and_resumes_hold() {
        let start = Instant::now();
        let mut presenter = Presenter::new(PresenterId::new(0, 0));
        presenter.state = Shown;

        let (deadline, first) = presenter
            .start_hold(start, Duration::from_millis(1_000))
            .expect("hold scheduled");
        assert_eq!(deadline, start + Duration::from_millis(1_000));

        let paused_at = start + Duration::from_millis(400);
        assert!(presenter.set_hovered(true, paused_at).is_none());
        assert_ne!(presenter.anim_seq(), first);

        let resumed_at = start + Duration::from_millis(5_000);
        let (deadline, seq) = presenter
            .set_hovered(false, resumed_at)
            .expect("hold resumed");
        assert_eq!(deadline, resumed_at + Duration::from_millis(600));
        assert_eq!(seq, presenter.anim_seq());
    }
}
