//! Headless demo host for the toast pipeline.
//!
//! Pushes a scripted burst through the pipeline with console render
//! elements, exercising overflow archival, reveal, restore and shutdown.

mod console;
mod log_capture;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::Context;
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use toast_model::{AudioCue, Hold, Notification, NotificationKind, NotificationState, ReferenceTier};
use toast_pipeline::{Bounds, Corner, Pipeline, PipelineConfig, StackPlacement};

use console::ConsoleFactory;
use log_capture::LogCapture;

const CONFIG_FILE_ENV: &str = "TOAST_CONFIG_FILE";
const LOG_CAPACITY: usize = 500;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let capture = LogCapture::new(LOG_CAPACITY);
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(capture.layer())
        .init();

    tracing::info!("Starting toast demo");
    load_dotenv();
    let config = load_config()?;

    let factory = ConsoleFactory::default();
    let stats = factory.stats();
    let pipeline = Pipeline::builder()
        .config(config)
        .factory_for_all(factory)
        .placement(StackPlacement::new(
            Bounds::new(0.0, 0.0, 1280.0, 720.0),
            Corner::BottomRight,
        ))
        .start()
        .context("failed to start pipeline")?;

    let mut incidents = pipeline.subscribe_incidents();
    tokio::spawn(async move {
        while let Ok(incident) = incidents.recv().await {
            tracing::warn!(kind = ?incident.kind, "Incident observed: {}", incident.message);
        }
    });

    run_script(&pipeline).await?;

    let report = pipeline.shutdown().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    println!(
        "elements created={} destroyed={}",
        stats.created.load(Ordering::SeqCst),
        stats.destroyed.load(Ordering::SeqCst)
    );
    print_log_digest(&capture);
    Ok(())
}

fn load_dotenv() {
    let candidates = [".env", "../.env"];
    for path in &candidates {
        if dotenvy::from_filename(path).is_ok() {
            tracing::info!("Loaded .env from: {path}");
            return;
        }
    }
    tracing::info!("No .env file found, using system environment variables");
}

/// Defaults, then an optional JSON file, then `TOAST_*` overrides.
fn load_config() -> anyhow::Result<PipelineConfig> {
    let config = match std::env::var(CONFIG_FILE_ENV) {
        Ok(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {path}"))?;
            PipelineConfig::from_json(&json)?
        }
        Err(_) => PipelineConfig::default(),
    };
    let config = config.with_env_overrides();
    config.validate()?;
    tracing::info!(
        limit = config.candidate_limit,
        interval_ms = config.release_interval_ms,
        "Configuration loaded"
    );
    Ok(config)
}

fn burst() -> Vec<Arc<Notification>> {
    let kinds = NotificationKind::ALL;
    (0..12)
        .map(|i| {
            let kind = kinds[i % (kinds.len() - 1)];
            let mut builder = Notification::builder(kind, format!("Event {i}"))
                .body(format!("Something happened ({i})"));
            if i % 4 == 0 {
                builder = builder.reference_tier(ReferenceTier::Weak);
            }
            if i % 5 == 0 {
                builder = builder.audio(AudioCue::new("chime"));
            }
            if i == 11 {
                builder = builder.hold(Hold::Indefinite);
            }
            builder.build()
        })
        .collect()
}

async fn run_script(pipeline: &Pipeline) -> anyhow::Result<()> {
    let notes = burst();
    if !pipeline.submit_batch(notes.clone()) {
        anyhow::bail!("pipeline refused the scripted burst");
    }
    sleep(Duration::from_millis(1_800)).await;

    let snapshot = pipeline.snapshot().await?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    let archived: Vec<_> = notes
        .iter()
        .filter(|n| n.state() == NotificationState::Archive)
        .cloned()
        .collect();
    tracing::info!(count = archived.len(), "Overflow archived");

    if let Some(first) = archived.first() {
        pipeline.reveal(first.id()).await?;
    }
    if let Some(second) = archived.get(1) {
        let restored = pipeline.restore(second.id()).await?;
        tracing::info!(id = %restored.id(), episode = restored.episode(), "Restored from archive");
    }
    pipeline.show_archive().await?;
    sleep(Duration::from_millis(600)).await;

    if let Some(pinned) = notes.last() {
        pipeline.hover(pinned.id(), true)?;
        pipeline.archive(pinned.id()).await?;
    }
    sleep(Duration::from_millis(2_000)).await;

    let snapshot = pipeline.snapshot().await?;
    tracing::info!(
        visible = snapshot.visible.len(),
        archived = snapshot.archive_len,
        presenters = snapshot.total_presenters,
        "Script finished"
    );
    Ok(())
}

fn print_log_digest(capture: &LogCapture) {
    println!("log levels: {:?}", capture.level_counts());
    for entry in capture.recent(5) {
        println!("  [{}] {} {}", entry.level, entry.target, entry.message);
    }
}
