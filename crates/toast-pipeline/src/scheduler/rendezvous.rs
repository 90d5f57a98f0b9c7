//! Release rendezvous between the delivery worker and the stage loop.
//!
//! Every release tick publishes an outcome with an increasing sequence. The
//! worker waits for the sequence to move; a failed tick still moves it,
//! carrying the failure so the worker can log it and carry on.

use tokio::sync::watch;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub seq: u64,
    /// Failure message of a tick that did not complete.
    pub poison: Option<String>,
}

#[derive(Debug)]
pub(crate) struct Rendezvous {
    tx: watch::Sender<TickOutcome>,
}

impl Rendezvous {
    pub fn new() -> (Self, watch::Receiver<TickOutcome>) {
        let (tx, rx) = watch::channel(TickOutcome::default());
        (Self { tx }, rx)
    }

    pub fn publish(&self, poison: Option<String>) {
        self.tx.send_modify(|outcome| {
            outcome.seq += 1;
            outcome.poison = poison;
        });
    }
}
