/// Enrichment pipelines run through the control surface
///
/// Tests cover:
/// - single team enrichment with squad and player details
/// - reruns leaving the store unchanged
/// - per-item failures inside a pipeline
/// - the cause of a failed team enrichment
/// - the stored-teams sweep and league players (saved and dry)
/// - batch progress moving while its leagues run
mod utils;

use async_trait::async_trait;
use serde_json::Value;
use sofa_sync_lib::commands::JobStartParams;
use sofa_sync_lib::modules::catalog::{EntityKind, MemoryEntityStore, ScopeContext};
use sofa_sync_lib::modules::jobs::application::{BatchPlayersParams, TeamEnrichmentParams};
use sofa_sync_lib::modules::jobs::{
    JobKey, JobKind, JobRegistry, JobRequest, JobRunner, JobStatus, Orchestrator, SyncContext,
};
use sofa_sync_lib::modules::provider::domain::shapes::TeamShape;
use sofa_sync_lib::modules::provider::{Endpoints, FetchGateway, Fidelity, RetryPolicy};
use sofa_sync_lib::shared::errors::{AppError, AppResult};
use sofa_sync_lib::shared::utils::{Pacer, PacingPolicy};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use utils::fakes::{harness, not_found, Harness, RoutedTransport};
use utils::payloads;

const SQUAD: [(u64, &str); 3] = [(101, "David Raya"), (102, "William Saliba"), (103, "Bukayo Saka")];

fn club_route(path: &str) -> AppResult<Value> {
    match path {
        "/team/42" => Ok(payloads::team(42, "Arsenal")),
        "/team/42/players" => Ok(payloads::squad(&SQUAD)),
        _ => match path.strip_prefix("/player/").and_then(|id| id.parse::<u64>().ok()) {
            Some(id) => match SQUAD.iter().find(|(pid, _)| *pid == id) {
                Some((_, name)) => Ok(payloads::player(id, name, (42, "Arsenal"))),
                None => Err(not_found(path)),
            },
            None => Err(not_found(path)),
        },
    }
}

fn enrich(team_id: u64) -> JobStartParams {
    JobStartParams {
        team_id: Some(team_id),
        ..JobStartParams::default()
    }
}

async fn run_to_end(h: &Harness, kind: JobKind, params: JobStartParams) -> sofa_sync_lib::JobStatusView {
    let accepted = h.surface.start_job(kind, params).unwrap();
    h.surface.shutdown().await;
    h.surface.job_status(&accepted.job_id).unwrap()
}

// ================================================================================================
// TEAM ENRICHMENT
// ================================================================================================

#[tokio::test]
async fn team_enrichment_stores_team_squad_and_details() {
    let h = harness(club_route);

    let status = run_to_end(&h, JobKind::TeamEnrichment, enrich(42)).await;

    assert_eq!(status.job_id, "team_enrichment:42");
    assert_eq!(status.status, JobStatus::Completed);
    assert_eq!(status.progress, 100.0);
    assert!(status.errors.is_empty(), "{:?}", status.errors);
    assert!(status.stats.is_balanced());
    assert_eq!(status.detail["created"], true);
    assert_eq!(status.detail["squad_size"], 3);
    assert_eq!(status.detail["new_players"], 3);
    assert_eq!(status.detail["details_refreshed"], 3);

    let teams = h.store.all_of(EntityKind::Team);
    assert_eq!(teams.len(), 1);
    let players = h.store.all_of(EntityKind::Player);
    assert_eq!(players.len(), 3);
    for row in &players {
        let player = row.entity.as_player().unwrap();
        assert_eq!(player.team_id, Some(teams[0].id));
        // filled in by the details stage
        assert_eq!(player.height, Some(181));
    }
    assert_eq!(h.transport.calls_to("/player/101"), 1);
    assert_eq!(h.transport.calls_to("/player/101/transfer-history"), 0);
}

#[tokio::test]
async fn rerunning_team_enrichment_creates_nothing() {
    let h = harness(club_route);
    run_to_end(&h, JobKind::TeamEnrichment, enrich(42)).await;
    let rows_after_first = h.store.len();

    // the tracker is closed after the first run; a fresh surface shares the store
    let status = {
        let surface = sofa_sync_lib::ControlSurface::from_context(h.surface.context().clone());
        let accepted = surface.start_job(JobKind::TeamEnrichment, enrich(42)).unwrap();
        surface.shutdown().await;
        surface.job_status(&accepted.job_id).unwrap()
    };

    assert_eq!(status.status, JobStatus::Completed);
    assert_eq!(status.stats.created, 0);
    assert_eq!(status.detail["created"], false);
    assert_eq!(h.store.len(), rows_after_first);
    assert_eq!(h.store.all_of(EntityKind::Player).len(), 3);
}

#[tokio::test]
async fn missing_player_is_an_item_error_not_a_failed_job() {
    let h = harness(|path| match path {
        "/player/103" => Err(not_found(path)),
        _ => club_route(path),
    });

    let status = run_to_end(&h, JobKind::TeamEnrichment, enrich(42)).await;

    assert_eq!(status.status, JobStatus::Completed);
    assert_eq!(status.stats.errors, 1);
    assert_eq!(status.errors.len(), 1);
    assert!(
        status.errors[0].starts_with("[player-details] item #3 (Bukayo Saka)"),
        "{}",
        status.errors[0]
    );
    assert_eq!(status.detail["details_refreshed"], 2);
    // the squad stage already stored the player
    assert_eq!(h.store.all_of(EntityKind::Player).len(), 3);
}

#[tokio::test]
async fn team_without_players_skips_the_squad() {
    let h = harness(club_route);

    let status = run_to_end(
        &h,
        JobKind::TeamEnrichment,
        JobStartParams {
            get_players: Some(false),
            ..enrich(42)
        },
    )
    .await;

    assert_eq!(status.status, JobStatus::Completed);
    assert_eq!(status.stages.len(), 1);
    assert_eq!(h.transport.calls(), vec!["/team/42".to_string()]);
    assert!(h.store.all_of(EntityKind::Player).is_empty());
}

#[tokio::test]
async fn unknown_team_fails_the_job() {
    let h = harness(club_route);

    let status = run_to_end(&h, JobKind::TeamEnrichment, enrich(7)).await;

    assert_eq!(status.status, JobStatus::Failed);
    assert!(!status.is_running);
    assert!(status.end_time.is_some());
    assert!(status.errors.last().unwrap().starts_with("Not found:"), "{:?}", status.errors);
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn unknown_team_keeps_its_not_found_cause() {
    let h = harness(club_route);
    let runner = JobRunner::new(h.surface.context().clone());
    let params = TeamEnrichmentParams {
        team_id: 7,
        force_update: false,
        get_players: true,
    };
    let handle = runner
        .start(&JobRequest::TeamEnrichment(params.clone()))
        .unwrap();

    let err = runner.team_enrichment(&handle, params).await.unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)), "got {:?}", err);
    assert_eq!(err.http_status(), 404);
}

// ================================================================================================
// STORED TEAMS SWEEP
// ================================================================================================

#[tokio::test]
async fn all_teams_sweep_pages_through_stored_teams() {
    let h = harness(|path| match path {
        "/team/1" => Ok(payloads::team(1, "Arsenal")),
        "/team/3" => Ok(payloads::team(3, "Everton")),
        _ => Err(not_found(path)),
    });
    let ctx = h.surface.context();
    for (id, name) in [(1, "Arsenal"), (2, "Chelsea"), (3, "Everton")] {
        let record = ctx.mapper.team(&TeamShape::bare(id, name), Fidelity::Degraded);
        ctx.resolver
            .resolve_and_upsert(record, ScopeContext::default(), false)
            .await
            .unwrap();
    }

    let status = run_to_end(
        &h,
        JobKind::AllTeamsEnrichment,
        JobStartParams {
            batch_size: Some(2),
            limit: Some(100),
            ..JobStartParams::default()
        },
    )
    .await;

    assert_eq!(status.status, JobStatus::Completed);
    assert_eq!(status.detail["offsets"], serde_json::json!([0, 2]));
    assert_eq!(status.detail["teams"], 3);
    assert_eq!(status.detail["next_offset"], 3);
    assert_eq!(status.stats.processed, 3);
    assert_eq!(status.stats.errors, 1);
    assert!(status.errors[0].starts_with("[teams] item #2 (Chelsea)"), "{}", status.errors[0]);

    // the degraded rows were completed from the full records
    let arsenal = ctx.resolver.lookup(EntityKind::Team, "1").await.unwrap().unwrap();
    assert_eq!(arsenal.entity.as_team().unwrap().stadium.as_deref(), Some("Arsenal Ground"));
}

// ================================================================================================
// LEAGUE PLAYERS
// ================================================================================================

fn league_route(path: &str) -> AppResult<Value> {
    match path {
        "/unique-tournament/17" => Ok(payloads::tournament(17, "Premier League")),
        "/unique-tournament/17/seasons" => Ok(payloads::seasons()),
        "/unique-tournament/17/season/61627/standings/total" => {
            Ok(payloads::standings(&[(42, "Arsenal"), (43, "Chelsea")]))
        }
        "/team/42/players" => Ok(payloads::squad(&[(101, "David Raya"), (102, "William Saliba")])),
        "/team/43/players" => Ok(payloads::squad(&[(201, "Cole Palmer"), (202, "Reece James")])),
        _ => Err(not_found(path)),
    }
}

fn league_players(save: bool) -> JobStartParams {
    JobStartParams {
        league: Some("EPL".into()),
        save: Some(save),
        ..JobStartParams::default()
    }
}

#[tokio::test]
async fn league_players_stores_every_squad_of_the_current_season() {
    let h = harness(league_route);

    let status = run_to_end(&h, JobKind::LeaguePlayers, league_players(true)).await;

    assert_eq!(status.job_id, "league_players:17");
    assert_eq!(status.status, JobStatus::Completed);
    assert!(status.errors.is_empty(), "{:?}", status.errors);
    assert_eq!(status.detail["season"]["id"], 61627);
    assert_eq!(status.detail["total_players"], 4);
    assert_eq!(status.detail["teams"].as_array().unwrap().len(), 2);

    assert_eq!(h.store.all_of(EntityKind::League).len(), 1);
    assert_eq!(h.store.all_of(EntityKind::Team).len(), 2);
    assert_eq!(h.store.all_of(EntityKind::Standing).len(), 2);
    assert_eq!(h.store.all_of(EntityKind::Player).len(), 4);
}

#[tokio::test]
async fn league_players_without_save_leaves_the_store_alone() {
    let h = harness(league_route);

    let status = run_to_end(&h, JobKind::LeaguePlayers, league_players(false)).await;

    assert_eq!(status.status, JobStatus::Completed);
    assert_eq!(status.detail["saved"], false);
    assert_eq!(status.detail["total_players"], 4);
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn unknown_league_is_rejected_at_start() {
    let h = harness(league_route);

    let err = h
        .surface
        .start_job(
            JobKind::LeaguePlayers,
            JobStartParams {
                league: Some("Atlantis Premier Division".into()),
                ..JobStartParams::default()
            },
        )
        .unwrap_err();

    assert_eq!(err.http_status(), 400);
    assert!(h.transport.calls().is_empty());
}

// ================================================================================================
// BATCH PLAYERS
// ================================================================================================

const LEAGUE_PAUSE: Duration = Duration::from_secs(9);

/// Notes the batch's progress whenever it waits between two leagues.
struct ObservingPacer {
    registry: JobRegistry,
    seen: Mutex<Vec<(f64, Option<String>)>>,
}

#[async_trait]
impl Pacer for ObservingPacer {
    async fn pause(&self, delay: Duration) {
        if delay != LEAGUE_PAUSE {
            return;
        }
        let id = JobKey::global(JobKind::BatchPlayers).id();
        if let Some(state) = self.registry.snapshot(&id) {
            self.seen
                .lock()
                .unwrap()
                .push((state.progress_percent, state.current_item.clone()));
        }
    }
}

#[tokio::test]
async fn batch_progress_moves_between_leagues() {
    let registry = JobRegistry::new();
    let pacer = Arc::new(ObservingPacer {
        registry: registry.clone(),
        seen: Mutex::new(Vec::new()),
    });
    let pacing = PacingPolicy {
        league: LEAGUE_PAUSE,
        ..PacingPolicy::immediate()
    };
    let gateway = Arc::new(FetchGateway::new(
        Arc::new(RoutedTransport::new(league_route)),
        Endpoints::default(),
        RetryPolicy::default(),
        pacing.clone(),
        pacer.clone(),
    ));
    let ctx = SyncContext::new(
        gateway,
        Arc::new(MemoryEntityStore::new()),
        Orchestrator::new(pacer.clone(), pacing),
        registry.clone(),
    );
    let runner = JobRunner::new(ctx);
    let params = BatchPlayersParams {
        leagues: vec!["EPL".into(), "La Liga".into()],
        year: None,
        max_teams: None,
        parallel: false,
        force_update: false,
    };
    let handle = runner
        .start(&JobRequest::BatchPlayers(params.clone()))
        .unwrap();

    let detail = runner.batch_players(&handle, params).await.unwrap();

    let seen = pacer.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    let (progress, current) = &seen[0];
    assert_eq!(*progress, 50.0);
    assert_eq!(current.as_deref(), Some("EPL"));

    assert_eq!(detail.leagues.len(), 2);
    assert_eq!(detail.leagues[0].players, 4);
    assert!(detail.leagues[1].error.is_some());
    let state = handle.snapshot().unwrap();
    assert_eq!(state.stats.processed, 2);
    assert_eq!(state.stats.errors, 1);
}
