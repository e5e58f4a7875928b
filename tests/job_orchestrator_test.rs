/// Job orchestration and the registry behind it
///
/// Tests cover:
/// - per-item failures recorded without aborting a stage
/// - batched sweeps visiting every page
/// - one running job per key
/// - progress reporting
mod utils;

use serde_json::json;
use sofa_sync_lib::commands::JobStartParams;
use sofa_sync_lib::modules::jobs::application::item_error;
use sofa_sync_lib::modules::jobs::{
    ItemOutcome, JobKey, JobKind, JobRegistry, JobStatus, ListStage, Orchestrator,
};
use sofa_sync_lib::shared::errors::AppError;
use sofa_sync_lib::shared::utils::{PacingPolicy, RecordingPacer};
use std::sync::{Arc, Mutex};
use utils::fakes::harness;

fn orchestrator() -> (Orchestrator, Arc<RecordingPacer>) {
    let pacer = Arc::new(RecordingPacer::new());
    (Orchestrator::new(pacer.clone(), PacingPolicy::immediate()), pacer)
}

// ================================================================================================
// STAGES
// ================================================================================================

#[tokio::test]
async fn failing_item_is_recorded_and_the_stage_continues() {
    let (orchestrator, pacer) = orchestrator();
    let registry = JobRegistry::new();
    let handle = registry
        .try_start(JobKey::global(JobKind::BatchPlayers), &["players"])
        .unwrap();

    let stage = ListStage::new(
        "players",
        (1..=10).collect::<Vec<u32>>(),
        |n: &u32| format!("player {}", n),
        |n: u32| async move {
            if n == 4 {
                Err(AppError::NotFound("player 4".into()))
            } else if n % 2 == 0 {
                Ok(ItemOutcome::Created)
            } else {
                Ok(ItemOutcome::Updated)
            }
        },
    );

    let counters = orchestrator.run_stage(&handle, &stage).await.unwrap();
    handle.complete();

    assert_eq!(counters.processed, 10);
    assert_eq!(counters.errors, 1);
    assert_eq!(counters.created, 4);
    assert_eq!(counters.updated, 5);
    assert!(counters.is_balanced());
    // a pause between items, none after the last
    assert_eq!(pacer.count(), 9);

    let state = registry.snapshot(handle.id()).unwrap();
    assert_eq!(state.status, JobStatus::Completed);
    assert_eq!(state.progress_percent, 100.0);
    assert_eq!(state.stats, counters);
    assert_eq!(state.errors.len(), 1);
    assert_eq!(
        state.errors[0],
        item_error("players", 3, "player 4", &AppError::NotFound("player 4".into()).to_string())
    );
    assert!(state.errors[0].contains("item #4"));
}

#[tokio::test]
async fn progress_never_moves_backwards() {
    let (orchestrator, _pacer) = orchestrator();
    let registry = JobRegistry::new();
    let handle = registry
        .try_start(JobKey::global(JobKind::DatabasePopulation), &["countries", "leagues"])
        .unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    for name in ["countries", "leagues"] {
        let observer = handle.clone();
        let seen = seen.clone();
        let stage = ListStage::new(
            name,
            (0..7).collect::<Vec<u32>>(),
            |n: &u32| n.to_string(),
            move |_n: u32| {
                let observer = observer.clone();
                let seen = seen.clone();
                async move {
                    if let Some(state) = observer.snapshot() {
                        seen.lock().unwrap().push(state.progress_percent);
                    }
                    Ok(ItemOutcome::Created)
                }
            },
        );
        orchestrator.run_stage(&handle, &stage).await.unwrap();
    }
    handle.complete();

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 14);
    assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]), "{:?}", seen);
    assert!(seen.iter().all(|p| *p <= 100.0));
    assert_eq!(registry.snapshot(handle.id()).unwrap().progress_percent, 100.0);
}

// ================================================================================================
// BATCHES
// ================================================================================================

#[tokio::test]
async fn batched_sweep_visits_every_page() {
    let (orchestrator, pacer) = orchestrator();
    let total = 237usize;
    let mut seen_items = 0usize;

    let offsets = orchestrator
        .run_batched(50, 0, |batch| {
            let page = total.saturating_sub(batch.offset).min(batch.size);
            seen_items += page;
            async move { Ok(page) }
        })
        .await
        .unwrap();

    assert_eq!(offsets, vec![0, 50, 100, 150, 200]);
    assert_eq!(seen_items, total);
    assert_eq!(pacer.count(), 4);
}

#[tokio::test]
async fn batched_sweep_stops_on_page_error() {
    let (orchestrator, _pacer) = orchestrator();

    let result = orchestrator
        .run_batched(10, 0, |batch| async move {
            if batch.offset >= 20 {
                Err(AppError::PersistenceError("connection reset".into()))
            } else {
                Ok(10)
            }
        })
        .await;

    assert!(matches!(result, Err(AppError::PersistenceError(_))));
}

// ================================================================================================
// REGISTRY
// ================================================================================================

#[tokio::test]
async fn second_start_of_a_running_key_conflicts() {
    let registry = JobRegistry::new();
    let key = JobKey::scoped(JobKind::TeamEnrichment, 42);

    let first = registry.try_start(key.clone(), &["team"]).unwrap();
    let err = registry.try_start(key.clone(), &["team"]).unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(err.http_status(), 409);

    // another scope is a different slot
    assert!(registry
        .try_start(JobKey::scoped(JobKind::TeamEnrichment, 43), &["team"])
        .is_ok());

    first.complete();
    assert!(!registry.is_running(first.id()));
    let first_run = registry.snapshot(first.id()).unwrap().run_id;

    let second = registry.try_start(key, &["team"]).unwrap();
    let second_run = second.snapshot().unwrap().run_id;
    assert!(second_run.is_some());
    assert_ne!(first_run, second_run);
}

#[tokio::test]
async fn season_fixture_cannot_start_twice() {
    let h = harness(|_| Ok(json!({ "events": [] })));
    let params = JobStartParams {
        season: Some("2024-2025".into()),
        ..JobStartParams::default()
    };

    let accepted = h
        .surface
        .start_job(JobKind::SeasonFixture, params.clone())
        .unwrap();
    assert_eq!(accepted.status, 202);
    assert_eq!(accepted.job_id, "season_fixture:2024-2025");

    let err = h
        .surface
        .start_job(JobKind::SeasonFixture, params)
        .unwrap_err();
    assert_eq!(err.http_status(), 409);
    assert!(err.to_string().contains("season_fixture:2024-2025"));

    h.surface.shutdown().await;
    let status = h.surface.job_status(&accepted.job_id).unwrap();
    assert_eq!(status.status, JobStatus::Completed);
    assert!(!status.is_running);
}

#[tokio::test]
async fn unknown_job_id_is_not_found() {
    let h = harness(|path| Err(utils::fakes::not_found(path)));

    let err = h.surface.job_status("team_enrichment:1").unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(err.http_status(), 404);
    assert!(h.surface.jobs().is_empty());
}

#[tokio::test]
async fn invalid_start_parameters_are_rejected_before_claiming_a_slot() {
    let h = harness(|path| Err(utils::fakes::not_found(path)));

    let err = h
        .surface
        .start_job(
            JobKind::SeasonFixture,
            JobStartParams {
                season: Some("2024-2026".into()),
                ..JobStartParams::default()
            },
        )
        .unwrap_err();
    assert_eq!(err.http_status(), 400);

    let err = h
        .surface
        .start_job(JobKind::TeamEnrichment, JobStartParams::default())
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));
    assert!(h.surface.jobs().is_empty());
}
