//! Messages into the stage loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{mpsc, oneshot};
use toast_model::{Notification, NotificationId};

use super::{ShutdownReport, StageSnapshot};
use crate::error::{PipelineError, Result};
use crate::scheduler::StageLink;

#[derive(Debug)]
pub(crate) enum UiCommand {
    StartRelease,
    StopRelease,
    ArchiveBatch {
        batch: Vec<Arc<Notification>>,
        reply: oneshot::Sender<Result<()>>,
    },
    Discard {
        batch: Vec<Arc<Notification>>,
    },
    Close {
        id: NotificationId,
        reply: oneshot::Sender<Result<()>>,
    },
    Archive {
        id: NotificationId,
        reply: oneshot::Sender<Result<()>>,
    },
    Reveal {
        id: NotificationId,
        reply: oneshot::Sender<Result<()>>,
    },
    Restore {
        id: NotificationId,
        reply: oneshot::Sender<Result<Arc<Notification>>>,
    },
    ShowArchive {
        reply: oneshot::Sender<Result<()>>,
    },
    Hover {
        id: NotificationId,
        hovered: bool,
    },
    Snapshot {
        reply: oneshot::Sender<StageSnapshot>,
    },
    Shutdown {
        leftovers: Vec<Arc<Notification>>,
        reply: oneshot::Sender<ShutdownReport>,
    },
}

/// The delivery worker's handle on the stage loop.
#[derive(Debug, Clone)]
pub(crate) struct UiLink {
    commands: mpsc::UnboundedSender<UiCommand>,
    releasing: Arc<AtomicBool>,
}

impl UiLink {
    pub fn new(commands: mpsc::UnboundedSender<UiCommand>) -> Self {
        Self {
            commands,
            releasing: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl StageLink for UiLink {
    fn start_release(&self) {
        if !self.releasing.swap(true, Ordering::SeqCst) {
            let _ = self.commands.send(UiCommand::StartRelease);
        }
    }

    fn stop_release(&self) {
        if self.releasing.swap(false, Ordering::SeqCst) {
            let _ = self.commands.send(UiCommand::StopRelease);
        }
    }

    fn discard(&self, batch: Vec<Arc<Notification>>) {
        let _ = self.commands.send(UiCommand::Discard { batch });
    }

    async fn archive_batch(&self, batch: Vec<Arc<Notification>>) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(UiCommand::ArchiveBatch { batch, reply })
            .map_err(|_| PipelineError::StageGone)?;
        rx.await.map_err(|_| PipelineError::StageGone)?
    }
}
