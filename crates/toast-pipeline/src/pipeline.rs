//! Public entry point: builds the pipeline, spawns the delivery worker and
//! the stage loop, and exposes the operations callers use.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use toast_model::{Capabilities, Notification, NotificationId, NotificationKind};

use crate::cache::{ElementCache, Reclaimer};
use crate::config::PipelineConfig;
use crate::element::{ElementFactory, FactoryRegistry};
use crate::error::{PipelineError, Result};
use crate::incident::{Incident, IncidentSink};
use crate::placement::{Placement, StackPlacement};
use crate::scheduler::{CandidateQueue, Ingest, Rendezvous, Worker};
use crate::stage::{Shared, ShutdownReport, Stage, StageSnapshot, UiCommand, UiLink};

type WorkerHandle = JoinHandle<mpsc::UnboundedReceiver<Arc<Notification>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
pub struct PipelineBuilder {
    config: PipelineConfig,
    factories: FactoryRegistry,
    placement: Option<Box<dyn Placement>>,
    required: HashMap<NotificationKind, Capabilities>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn factory(mut self, kind: NotificationKind, factory: impl ElementFactory + 'static) -> Self {
        self.factories.register(kind, Arc::new(factory));
        self
    }

    /// Uses one factory for every notification kind.
    pub fn factory_for_all(mut self, factory: impl ElementFactory + 'static) -> Self {
        self.factories.register_all(Arc::new(factory));
        self
    }

    /// Refuses notifications of `kind` that lack any of the `required` hooks.
    pub fn require_hooks(mut self, kind: NotificationKind, required: Capabilities) -> Self {
        self.required.insert(kind, required);
        self
    }

    /// Defaults to [`StackPlacement::default`].
    pub fn placement(mut self, placement: impl Placement + 'static) -> Self {
        self.placement = Some(Box::new(placement));
        self
    }

    /// Validates the configuration and spawns the worker and stage tasks.
    /// Must be called from within a Tokio runtime.
    pub fn start(self) -> Result<Pipeline> {
        let config = self.config;
        config.validate()?;

        for kind in NotificationKind::ALL {
            if !self.factories.contains(kind) {
                tracing::warn!(%kind, "No element factory registered");
            }
        }

        let cancel = CancellationToken::new();
        let (ingest, ingest_rx, pending) = Ingest::new();
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (rendezvous, ticks) = Rendezvous::new();

        let shared = Shared {
            candidates: CandidateQueue::new(),
            pending: Arc::clone(&pending),
            visible: Arc::new(AtomicUsize::new(0)),
            incidents: IncidentSink::new(config.incident_capacity),
        };

        let cache = ElementCache::new(self.factories, &config, cancel.child_token());
        let reclaimer = cache.reclaimer();
        let placement = self
            .placement
            .unwrap_or_else(|| Box::new(StackPlacement::default()));

        let stage = Stage::new(
            &config,
            shared.clone(),
            command_rx,
            cache,
            placement,
            rendezvous,
        );
        let stage = tokio::spawn(stage.run());

        let worker = Worker::new(
            UiLink::new(commands.clone()),
            ingest_rx,
            pending,
            shared.candidates.clone(),
            config.candidate_limit,
            ticks,
            cancel.clone(),
        );
        let worker = tokio::spawn(worker.run());

        tracing::info!(
            limit = config.candidate_limit,
            interval_ms = config.release_interval_ms,
            default_tier = %config.default_reference_tier,
            "Notification pipeline started"
        );

        Ok(Pipeline {
            ingest,
            commands,
            shared,
            reclaimer,
            cancel,
            worker: Mutex::new(Some(worker)),
            stage: Mutex::new(Some(stage)),
            shut_down: AtomicBool::new(false),
            required: self.required,
        })
    }
}

/// Handle to a running pipeline. Dropping it cancels the background tasks
/// without waiting for them; prefer [`Pipeline::shutdown`].
pub struct Pipeline {
    ingest: Ingest,
    commands: mpsc::UnboundedSender<UiCommand>,
    shared: Shared,
    reclaimer: Reclaimer,
    cancel: CancellationToken,
    worker: Mutex<Option<WorkerHandle>>,
    stage: Mutex<Option<JoinHandle<()>>>,
    shut_down: AtomicBool,
    required: HashMap<NotificationKind, Capabilities>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Queues a notification for display. Returns `false` if the pipeline
    /// is shut down, or the notification is already queued, not ready to be
    /// shown or missing hooks its kind requires.
    pub fn submit(&self, notification: Arc<Notification>) -> bool {
        if self.is_shut_down() {
            tracing::debug!(id = %notification.id(), "Submit after shutdown rejected");
            return false;
        }
        if !self.admit(&notification) {
            return false;
        }
        self.enqueue(notification)
    }

    /// Queues every notification, or none of them.
    pub fn submit_batch(&self, batch: Vec<Arc<Notification>>) -> bool {
        if self.is_shut_down() {
            return false;
        }
        for (claimed, n) in batch.iter().enumerate() {
            if !self.admit(n) {
                for n in &batch[..claimed] {
                    n.release_queued();
                }
                return false;
            }
        }
        let mut all = true;
        for n in batch {
            all &= self.enqueue(n);
        }
        all
    }

    /// Checks the hook requirements and claims the notification for the
    /// queues.
    fn admit(&self, notification: &Notification) -> bool {
        let id = notification.id();
        if let Some(required) = self.required.get(&notification.kind()) {
            let missing = notification.hooks().capabilities().missing(*required);
            if !missing.is_empty() {
                tracing::warn!(%id, kind = %notification.kind(), ?missing, "Submit rejected: required hooks missing");
                return false;
            }
        }
        if !notification.try_mark_queued() {
            tracing::warn!(
                %id,
                state = ?notification.state(),
                queued = notification.is_queued(),
                "Submit rejected"
            );
            return false;
        }
        true
    }

    fn enqueue(&self, notification: Arc<Notification>) -> bool {
        if self.ingest.send(Arc::clone(&notification)) {
            return true;
        }
        notification.release_queued();
        false
    }

    /// True when nothing is queued and nothing is on screen.
    pub fn is_pipeline_idle(&self) -> bool {
        self.shared.pending.load(Ordering::SeqCst) == 0
            && self.shared.candidates.is_empty()
            && self.shared.visible.load(Ordering::SeqCst) == 0
    }

    pub fn subscribe_incidents(&self) -> broadcast::Receiver<Incident> {
        self.shared.incidents.subscribe()
    }

    /// Injects reclamation signals for tiered render elements.
    pub fn reclaimer(&self) -> Reclaimer {
        self.reclaimer.clone()
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> UiCommand) -> Result<T> {
        if self.is_shut_down() {
            return Err(PipelineError::ShutDown);
        }
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(command(reply))
            .map_err(|_| PipelineError::StageGone)?;
        rx.await.map_err(|_| PipelineError::StageGone)
    }

    /// Closes the visible notification `id`.
    pub async fn close(&self, id: NotificationId) -> Result<()> {
        self.request(|reply| UiCommand::Close { id, reply }).await?
    }

    /// Moves the visible notification `id` to the archive.
    pub async fn archive(&self, id: NotificationId) -> Result<()> {
        self.request(|reply| UiCommand::Archive { id, reply }).await?
    }

    /// Shows an archived notification again without taking it out of the
    /// archive.
    pub async fn reveal(&self, id: NotificationId) -> Result<()> {
        self.request(|reply| UiCommand::Reveal { id, reply }).await?
    }

    /// Takes `id` out of the archive and submits it again.
    pub async fn restore(&self, id: NotificationId) -> Result<Arc<Notification>> {
        let notification = self
            .request(|reply| UiCommand::Restore { id, reply })
            .await??;
        if !self.submit(Arc::clone(&notification)) {
            return Err(PipelineError::ShutDown);
        }
        Ok(notification)
    }

    /// Displays the archive group itself.
    pub async fn show_archive(&self) -> Result<()> {
        self.request(|reply| UiCommand::ShowArchive { reply }).await?
    }

    /// Pauses (`true`) or resumes the hold countdown of a visible notification.
    pub fn hover(&self, id: NotificationId, hovered: bool) -> Result<()> {
        if self.is_shut_down() {
            return Err(PipelineError::ShutDown);
        }
        self.commands
            .send(UiCommand::Hover { id, hovered })
            .map_err(|_| PipelineError::StageGone)
    }

    pub async fn snapshot(&self) -> Result<StageSnapshot> {
        self.request(|reply| UiCommand::Snapshot { reply }).await
    }

    /// Stops the worker, destroys everything still queued or visible and
    /// reports what had to be cleaned up by force.
    pub async fn shutdown(&self) -> Result<ShutdownReport> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Err(PipelineError::ShutDown);
        }
        tracing::info!("Notification pipeline shutting down");
        self.cancel.cancel();

        let mut leftovers = Vec::new();
        let worker = lock(&self.worker).take();
        if let Some(worker) = worker {
            match worker.await {
                Ok(mut rx) => {
                    rx.close();
                    while let Ok(n) = rx.try_recv() {
                        self.shared.pending.fetch_sub(1, Ordering::SeqCst);
                        leftovers.push(n);
                    }
                }
                Err(e) => tracing::error!(error = %e, "Delivery worker task failed"),
            }
        }

        let (reply, rx) = oneshot::channel();
        self.commands
            .send(UiCommand::Shutdown { leftovers, reply })
            .map_err(|_| PipelineError::StageGone)?;
        let report = rx.await.map_err(|_| PipelineError::StageGone)?;

        let stage = lock(&self.stage).take();
        if let Some(stage) = stage {
            if let Err(e) = stage.await {
                tracing::error!(error = %e, "Stage task failed");
            }
        }

        tracing::info!(
            queued = report.queued_destroyed,
            visible = report.visible_destroyed,
            leaked = report.leaked_elements,
            "Notification pipeline shut down"
        );
        Ok(report)
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
