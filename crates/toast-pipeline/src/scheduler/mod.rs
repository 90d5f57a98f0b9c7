//! Delivery scheduler.
//!
//! A background worker drains the unbounded ingestion queue into the bounded
//! candidate queue. The stage loop releases candidates on its own tick; when
//! the candidate queue is full, the worker archives overflow so that only
//! the most recent arrivals stay candidates.

mod rendezvous;

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use toast_model::Notification;

use crate::error::PipelineError;

pub(crate) use rendezvous::Rendezvous;
pub use rendezvous::TickOutcome;

/// The worker's view of the stage loop.
pub trait StageLink: Send + Sync + 'static {
    /// Starts the periodic release timer if it is stopped.
    fn start_release(&self);

    fn stop_release(&self);

    /// Archives never-displayed notifications in one step. Resolves once the
    /// group membership is updated.
    fn archive_batch(
        &self,
        batch: Vec<Arc<Notification>>,
    ) -> impl Future<Output = Result<(), PipelineError>> + Send;

    /// Force-destroys notifications the archive refused.
    fn discard(&self, batch: Vec<Arc<Notification>>);
}

/// Notifications awaiting release, oldest first.
#[derive(Debug, Clone, Default)]
pub struct CandidateQueue {
    inner: Arc<Mutex<VecDeque<Arc<Notification>>>>,
}

impl CandidateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Arc<Notification>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn push(&self, notification: Arc<Notification>) {
        self.lock().push_back(notification);
    }

    pub fn extend(&self, batch: Vec<Arc<Notification>>) {
        self.lock().extend(batch);
    }

    pub fn pop(&self) -> Option<Arc<Notification>> {
        self.lock().pop_front()
    }

    /// Pops the oldest entries until at most `target` remain.
    pub fn shrink_to(&self, target: usize) -> Vec<Arc<Notification>> {
        let mut queue = self.lock();
        let excess = queue.len().saturating_sub(target);
        queue.drain(..excess).collect()
    }

    pub fn drain(&self) -> Vec<Arc<Notification>> {
        self.lock().drain(..).collect()
    }

    pub fn any(&self, pred: impl Fn(&Notification) -> bool) -> bool {
        self.lock().iter().any(|n| pred(n))
    }

    pub fn snapshot(&self) -> Vec<Arc<Notification>> {
        self.lock().iter().cloned().collect()
    }
}

/// Splits an overflow batch into (kept, discarded): the `limit` most recent
/// arrivals are kept, the older remainder is discarded in arrival order.
pub fn split_burst(
    mut batch: Vec<Arc<Notification>>,
    limit: usize,
) -> (Vec<Arc<Notification>>, Vec<Arc<Notification>>) {
    if batch.len() <= limit {
        return (batch, Vec::new());
    }
    let kept = batch.split_off(batch.len() - limit);
    (kept, batch)
}

/// Producer side of the ingestion queue.
#[derive(Debug, Clone)]
pub(crate) struct Ingest {
    tx: mpsc::UnboundedSender<Arc<Notification>>,
    pending: Arc<AtomicUsize>,
}

impl Ingest {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Arc<Notification>>, Arc<AtomicUsize>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        (
            Self {
                tx,
                pending: Arc::clone(&pending),
            },
            rx,
            pending,
        )
    }

    /// Returns `false` once the worker has gone away.
    pub fn send(&self, notification: Arc<Notification>) -> bool {
        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(notification).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return false;
        }
        true
    }
}

pub(crate) struct Worker<L> {
    link: L,
    rx: mpsc::UnboundedReceiver<Arc<Notification>>,
    pending: Arc<AtomicUsize>,
    candidates: CandidateQueue,
    limit: usize,
    ticks: watch::Receiver<TickOutcome>,
    cancel: CancellationToken,
}

impl<L: StageLink> Worker<L> {
    pub fn new(
        link: L,
        rx: mpsc::UnboundedReceiver<Arc<Notification>>,
        pending: Arc<AtomicUsize>,
        candidates: CandidateQueue,
        limit: usize,
        ticks: watch::Receiver<TickOutcome>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            link,
            rx,
            pending,
            candidates,
            limit,
            ticks,
            cancel,
        }
    }

    fn is_idle(&self) -> bool {
        self.candidates.is_empty() && self.pending.load(Ordering::SeqCst) == 0
    }

    fn received(&self) {
        self.pending.fetch_sub(1, Ordering::SeqCst);
    }

    /// Runs until cancelled. Hands the ingestion receiver back so shutdown
    /// can destroy whatever is still queued.
    pub async fn run(mut self) -> mpsc::UnboundedReceiver<Arc<Notification>> {
        tracing::info!(limit = self.limit, "Delivery worker started");

        loop {
            // Ticks seen so far do not satisfy the next wait.
            self.ticks.borrow_and_update();

            let next = if self.is_idle() {
                self.link.stop_release();
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => break,
                    next = self.rx.recv() => match next {
                        Some(n) => n,
                        None => break,
                    },
                }
            } else {
                match self.rx.try_recv() {
                    Ok(n) => n,
                    Err(TryRecvError::Empty) => {
                        if !self.wait_for_tick().await {
                            break;
                        }
                        continue;
                    }
                    Err(TryRecvError::Disconnected) => break,
                }
            };
            self.received();

            match self.accept(next).await {
                Ok(()) => {}
                Err(PipelineError::StageGone) => break,
                Err(e) => tracing::error!(error = %e, "Overflow archival failed"),
            }
        }

        tracing::info!("Delivery worker stopped");
        self.rx
    }

    /// Waits for the next release tick. Returns `false` when the worker
    /// should stop.
    async fn wait_for_tick(&mut self) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            changed = self.ticks.changed() => {
                if changed.is_err() {
                    return false;
                }
                let outcome = self.ticks.borrow_and_update().clone();
                if let Some(reason) = outcome.poison {
                    tracing::warn!(seq = outcome.seq, %reason, "Release tick failed; worker resuming");
                }
                true
            }
        }
    }

    async fn accept(&mut self, first: Arc<Notification>) -> Result<(), PipelineError> {
        if self.candidates.len() < self.limit {
            tracing::debug!(id = %first.id(), "Candidate queued");
            self.candidates.push(first);
            self.link.start_release();
            return Ok(());
        }

        let mut batch = vec![first];
        while let Ok(n) = self.rx.try_recv() {
            self.received();
            batch.push(n);
        }

        let (kept, discarded) = split_burst(batch, self.limit);
        let target = self.limit - kept.len();
        let mut archive = self.candidates.shrink_to(target);
        let evicted = archive.len();
        archive.extend(discarded);
        tracing::debug!(
            kept = kept.len(),
            evicted,
            archived = archive.len(),
            "Candidate overflow"
        );

        let archived = if archive.is_empty() {
            Ok(())
        } else {
            let refused = archive.clone();
            let result = self.link.archive_batch(archive).await;
            if result.as_ref().is_err_and(|e| *e != PipelineError::StageGone) {
                // Nothing else owns these any more.
                self.link.discard(refused);
            }
            result
        };
        self.candidates.extend(kept);
        self.link.start_release();
        archived
    }
}
