//! Notification data model for the toast delivery pipeline.
//!
//! Provides notification identity and content, the notification lifecycle
//! state machine, display parameters, the per-notification hook set, and the
//! observable container backing the archive group.

pub mod group;
pub mod hooks;
pub mod kind;
pub mod notification;
pub mod observable;
pub mod params;
pub mod state;
pub mod tier;

// Re-exports for convenience
pub use group::GroupMembers;
pub use hooks::{ArchiveContext, Capabilities, Hooks, StateChange};
pub use kind::NotificationKind;
pub use notification::{Notification, NotificationBuilder, NotificationId};
pub use observable::{ListChange, ObservableList};
pub use params::{AudioCue, DisplayParams, Hold};
pub use state::{NotificationState, TransitionError};
pub use tier::ReferenceTier;
