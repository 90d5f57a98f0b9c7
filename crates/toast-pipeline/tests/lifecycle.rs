mod common;

use std::time::Duration;

use common::{advance, builder, config, info, notes, start};
use toast_model::{Capabilities, NotificationKind, NotificationState, ReferenceTier};
use toast_pipeline::{Pipeline, PipelineConfig, PipelineError, ShutdownReport};

#[tokio::test(start_paused = true)]
async fn shutdown_force_destroys_queued_and_visible() {
    let (pipeline, recorder) = start(config(7));
    let burst = notes("s", 10);

    assert!(pipeline.submit_batch(burst.clone()));
    advance(10).await;

    let report = pipeline.shutdown().await.unwrap();
    assert_eq!(
        report,
        ShutdownReport {
            queued_destroyed: 6,
            visible_destroyed: 1,
            leaked_elements: 0,
        }
    );
    assert!(burst.iter().all(|n| n.state() == NotificationState::Destroy));
    assert_eq!(recorder.destroyed(), 1);

    assert!(!pipeline.submit(info("late").build()));
    assert_eq!(pipeline.shutdown().await, Err(PipelineError::ShutDown));
    assert_eq!(
        pipeline.snapshot().await.map(|s| s.visible.len()),
        Err(PipelineError::ShutDown)
    );
}

#[tokio::test(start_paused = true)]
async fn shutdown_reports_elements_still_cached() {
    let (pipeline, recorder) = start(config(7));
    let n = info("lingering").reference_tier(ReferenceTier::Weak).build();

    assert!(pipeline.submit(n.clone()));
    advance(300).await;
    pipeline.close(n.id()).await.unwrap();
    advance(300).await;

    let report = pipeline.shutdown().await.unwrap();
    assert_eq!(report.leaked_elements, 1);
    assert_eq!(report.visible_destroyed, 0);
    assert_eq!(recorder.destroyed(), 1);
}

#[tokio::test(start_paused = true)]
async fn idle_presenters_are_cleaned_up() {
    let (pipeline, _recorder) = start(config(7));
    let n = info("brief").hold_for(Duration::from_secs(1)).build();

    assert!(pipeline.submit(n.clone()));
    advance(300).await;
    assert_eq!(pipeline.snapshot().await.unwrap().total_presenters, 1);

    advance(1_500).await;
    assert_eq!(n.state(), NotificationState::Destroy);
    let snapshot = pipeline.snapshot().await.unwrap();
    assert_eq!(snapshot.total_presenters, 0);
    assert!(snapshot.visible.is_empty());
    assert!(pipeline.is_pipeline_idle());
}

#[tokio::test(start_paused = true)]
async fn hover_pauses_the_hold() {
    let (pipeline, _recorder) = start(config(7));
    let n = info("hovered").hold_for(Duration::from_secs(1)).build();

    assert!(pipeline.submit(n.clone()));
    advance(500).await;
    pipeline.hover(n.id(), true).unwrap();
    advance(3_000).await;
    assert_eq!(n.state(), NotificationState::Shown);
    let snapshot = pipeline.snapshot().await.unwrap();
    assert!(snapshot.entry(n.id()).expect("visible").hovered);

    pipeline.hover(n.id(), false).unwrap();
    advance(10).await;
    let snapshot = pipeline.snapshot().await.unwrap();
    assert!(!snapshot.entry(n.id()).expect("visible").hovered);
    advance(1_500).await;
    assert_eq!(n.state(), NotificationState::Destroy);
}

#[tokio::test(start_paused = true)]
async fn close_veto_keeps_notification_on_screen() {
    let (pipeline, _recorder) = start(config(7));
    let n = info("sticky")
        .hold_for(Duration::from_millis(500))
        .close_veto(|_| false)
        .build();

    assert!(pipeline.submit(n.clone()));
    advance(1_500).await;
    assert_eq!(n.state(), NotificationState::Shown);

    pipeline.close(n.id()).await.unwrap();
    advance(500).await;
    assert_eq!(n.state(), NotificationState::Shown);

    pipeline.archive(n.id()).await.unwrap();
    advance(500).await;
    assert_eq!(n.state(), NotificationState::Archive);
}

#[tokio::test]
async fn invalid_config_is_refused() {
    let config = PipelineConfig {
        candidate_limit: 0,
        ..PipelineConfig::default()
    };
    let result = Pipeline::builder().config(config).start();
    assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
}

#[tokio::test(start_paused = true)]
async fn kind_missing_required_hooks_is_refused() {
    let (builder, recorder) = builder(config(7));
    let pipeline = builder
        .require_hooks(
            NotificationKind::Info,
            Capabilities {
                close_veto: true,
                ..Capabilities::NONE
            },
        )
        .start()
        .unwrap();

    let bare = info("bare").build();
    let vetoable = info("vetoable").close_veto(|_| true).build();
    let other_kind = toast_model::Notification::builder(NotificationKind::Warn, "warn").build();

    assert!(!pipeline.submit(bare.clone()));
    assert!(!bare.is_queued());
    assert!(pipeline.submit(vetoable.clone()));
    assert!(pipeline.submit(other_kind.clone()));

    advance(600).await;
    assert_eq!(bare.state(), NotificationState::AbleShow);
    assert_eq!(vetoable.state(), NotificationState::Shown);
    assert_eq!(other_kind.state(), NotificationState::Shown);
    assert_eq!(recorder.created(), 2);
}
