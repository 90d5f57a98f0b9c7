#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use toast_model::{Notification, NotificationBuilder, NotificationKind};
use toast_pipeline::{ElementError, Pipeline, PipelineBuilder, PipelineConfig, RenderElement, Size};

/// Counts element lifecycles. Titles starting with `fail` make the factory
/// return an error, titles starting with `panic` make it panic.
#[derive(Debug, Default)]
pub struct Recorder {
    pub created: AtomicUsize,
    pub destroyed: AtomicUsize,
    pub attached: AtomicUsize,
}

impl Recorder {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }
}

struct TestElement {
    recorder: Arc<Recorder>,
}

impl RenderElement for TestElement {
    fn size(&self) -> Size {
        Size::new(300.0, 60.0)
    }

    fn on_attached(&mut self) {
        self.recorder.attached.fetch_add(1, Ordering::SeqCst);
    }

    fn on_destroyed(&mut self) {
        self.recorder.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn config(limit: usize) -> PipelineConfig {
    PipelineConfig {
        candidate_limit: limit,
        ..PipelineConfig::default()
    }
}

pub fn start(config: PipelineConfig) -> (Pipeline, Arc<Recorder>) {
    let (builder, recorder) = builder(config);
    (builder.start().expect("pipeline starts"), recorder)
}

/// A builder wired to a fresh [`Recorder`], for tests that need extra setup.
pub fn builder(config: PipelineConfig) -> (PipelineBuilder, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let factory_recorder = Arc::clone(&recorder);
    let builder = Pipeline::builder().config(config).factory_for_all(
        move |n: &Notification| -> Result<Box<dyn RenderElement>, ElementError> {
            if n.title().starts_with("panic") {
                panic!("factory blew up for {}", n.title());
            }
            if n.title().starts_with("fail") {
                return Err(ElementError::Failed(format!("cannot render {}", n.title())));
            }
            factory_recorder.created.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(TestElement {
                recorder: Arc::clone(&factory_recorder),
            }))
        },
    );
    (builder, recorder)
}

pub fn info(title: &str) -> NotificationBuilder {
    Notification::builder(NotificationKind::Info, title)
}

pub fn notes(prefix: &str, count: usize) -> Vec<Arc<Notification>> {
    (0..count)
        .map(|i| info(&format!("{prefix}{i}")).build())
        .collect()
}

/// Lets the paused clock run forward by `ms`.
pub async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
