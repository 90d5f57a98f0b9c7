//! Notification lifecycle state machine.
//!
//! ```text
//! AbleShow -> Showing -> Shown -> {Closing | Archiving} -> {Destroy | Archive}
//! Archive  -> AbleShow            (reset, starts a new episode)
//! Archive  -> Hide                (re-displayed from inside the archive group)
//! ```
//!
//! `Destroy` is terminal and reachable from every other state; everything
//! else only moves forward.

use serde::{Deserialize, Serialize};

use crate::notification::NotificationId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationState {
    AbleShow,
    Showing,
    Shown,
    Closing,
    Archiving,
    Archive,
    Hide,
    Destroy,
}

impl NotificationState {
    pub fn can_transition_to(self, next: NotificationState) -> bool {
        use NotificationState::*;

        match (self, next) {
            (Destroy, _) => false,
            (_, Destroy) => true,
            (AbleShow, Showing | Archiving) => true,
            (Showing, Shown | Closing | Archiving) => true,
            (Shown, Closing | Archiving) => true,
            (Archiving, Archive) => true,
            (Archive, AbleShow | Hide) => true,
            _ => false,
        }
    }

    /// Showing or Shown.
    pub fn is_displayed(self) -> bool {
        matches!(self, Self::Showing | Self::Shown)
    }
}

/// Raised when a caller attempts a transition the state machine forbids.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal transition for notification {id}: {from:?} -> {to:?}")]
pub struct TransitionError {
    pub id: NotificationId,
    pub from: NotificationState,
    pub to: NotificationState,
}
