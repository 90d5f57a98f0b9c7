//! Operator-visible error channel.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use toast_model::NotificationId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentKind {
    /// A release tick failed or panicked.
    ReleaseFailed,
    ElementCreation,
    Placement,
    Archival,
    ContractViolation,
}

#[derive(Debug, Clone, Serialize)]
pub struct Incident {
    pub kind: IncidentKind,
    pub notification: Option<NotificationId>,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Logs incidents and fans them out to subscribers.
#[derive(Debug, Clone)]
pub struct IncidentSink {
    tx: broadcast::Sender<Incident>,
}

impl IncidentSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Incident> {
        self.tx.subscribe()
    }

    pub fn report(
        &self,
        kind: IncidentKind,
        notification: Option<NotificationId>,
        message: impl Into<String>,
    ) {
        let message = message.into();
        match notification {
            Some(id) => tracing::error!(?kind, %id, "{message}"),
            None => tracing::error!(?kind, "{message}"),
        }
        // No subscribers is fine.
        let _ = self.tx.send(Incident {
            kind,
            notification,
            message,
            at: Utc::now(),
        });
    }
}
