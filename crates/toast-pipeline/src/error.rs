//! Error types for the delivery pipeline.

use toast_model::{NotificationId, NotificationKind, TransitionError};

use crate::presenter::{PresenterId, PresenterState};

/// Failure to materialize a render element.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ElementError {
    #[error("no element factory registered for {0} notifications")]
    NoFactory(NotificationKind),
    #[error("element factory failed: {0}")]
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("notification {0} is not archiving")]
    NotArchiving(NotificationId),
    #[error("notification {0} is not closing")]
    NotClosing(NotificationId),
    #[error("illegal presenter transition for {presenter}: {from:?} -> {to:?}")]
    PresenterTransition {
        presenter: PresenterId,
        from: PresenterState,
        to: PresenterState,
    },
    #[error("unknown presenter {0}")]
    UnknownPresenter(PresenterId),
    #[error(transparent)]
    ElementCreation(#[from] ElementError),
    #[error("placement failed: {0}")]
    Placement(String),
    #[error("notification {0} is not in the archive")]
    NotInArchive(NotificationId),
    #[error("no archive group exists")]
    NoArchive,
    #[error("notification {0} is not visible")]
    NotVisible(NotificationId),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("pipeline is shut down")]
    ShutDown,
    #[error("stage loop is no longer running")]
    StageGone,
    #[error("display attempt panicked: {0}")]
    Release(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
