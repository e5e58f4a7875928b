//! The long-running enrichment jobs.
//!
//! Every job claims its registry slot synchronously (so a double start is
//! rejected before anything is spawned) and then runs detached through
//! [`JobRunner::run`], which marks the slot completed or failed at the end.

use crate::modules::catalog::domain::{
    Batch, EntityKind, EntityQuery, ExternalRecord, ReferenceLeague, ScopeContext, StoredEntity,
};
use crate::modules::jobs::application::context::SyncContext;
use crate::modules::jobs::application::orchestrator::{item_error, ListStage};
use crate::modules::jobs::application::steps::{
    self, LeagueTarget, PlayerTarget, SeasonRef, TeamTarget,
};
use crate::modules::jobs::domain::entities::{ItemOutcome, JobKey, JobKind};
use crate::modules::jobs::infrastructure::JobHandle;
use crate::modules::provider::domain::shapes::SquadEntryShape;
use crate::modules::provider::Resource;
use crate::shared::errors::{AppError, AppResult};
use crate::{log_info, log_warn};
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const STAGE_TEAM: &str = "team";
pub const STAGE_SQUAD: &str = "squad";
pub const STAGE_PLAYER_DETAILS: &str = "player-details";
pub const STAGE_TEAMS: &str = "teams";
pub const STAGE_LEAGUE: &str = "league";
pub const STAGE_SEASON: &str = "season";
pub const STAGE_PLAYERS: &str = "players";
pub const STAGE_LEAGUES: &str = "leagues";
pub const STAGE_COUNTRIES: &str = "countries";

/// Stored teams read per page by the all-teams sweep.
pub const DEFAULT_TEAM_BATCH: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamEnrichmentParams {
    pub team_id: u64,
    #[serde(default)]
    pub force_update: bool,
    #[serde(default = "default_true")]
    pub get_players: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllTeamsParams {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub force_update: bool,
    #[serde(default)]
    pub get_players: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaguePlayersParams {
    pub league: String,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub max_teams: Option<usize>,
    #[serde(default = "default_true")]
    pub save: bool,
    #[serde(default)]
    pub force_update: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchPlayersParams {
    /// Empty means the main leagues
    #[serde(default)]
    pub leagues: Vec<String>,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub max_teams: Option<usize>,
    #[serde(default)]
    pub parallel: bool,
    #[serde(default)]
    pub force_update: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PopulationParams {
    #[serde(default)]
    pub leagues: Vec<String>,
    #[serde(default)]
    pub max_teams: Option<usize>,
    #[serde(default)]
    pub force_update: bool,
}

fn default_true() -> bool {
    true
}

fn default_limit() -> usize {
    DEFAULT_TEAM_BATCH
}

/// One startable job, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "params", rename_all = "snake_case")]
pub enum JobRequest {
    TeamEnrichment(TeamEnrichmentParams),
    AllTeamsEnrichment(AllTeamsParams),
    LeaguePlayers(LeaguePlayersParams),
    BatchPlayers(BatchPlayersParams),
    DatabasePopulation(PopulationParams),
}

impl JobRequest {
    pub fn kind(&self) -> JobKind {
        match self {
            JobRequest::TeamEnrichment(_) => JobKind::TeamEnrichment,
            JobRequest::AllTeamsEnrichment(_) => JobKind::AllTeamsEnrichment,
            JobRequest::LeaguePlayers(_) => JobKind::LeaguePlayers,
            JobRequest::BatchPlayers(_) => JobKind::BatchPlayers,
            JobRequest::DatabasePopulation(_) => JobKind::DatabasePopulation,
        }
    }

    pub fn key(&self) -> JobKey {
        match self {
            JobRequest::TeamEnrichment(p) => JobKey::scoped(JobKind::TeamEnrichment, p.team_id),
            JobRequest::LeaguePlayers(p) => league_players_key(&p.league),
            other => JobKey::global(other.kind()),
        }
    }

    /// Stage names in the order they run.
    pub fn stages(&self) -> Vec<&'static str> {
        match self {
            JobRequest::TeamEnrichment(p) if p.get_players => {
                vec![STAGE_TEAM, STAGE_SQUAD, STAGE_PLAYER_DETAILS]
            }
            JobRequest::TeamEnrichment(_) => vec![STAGE_TEAM],
            JobRequest::AllTeamsEnrichment(_) => vec![STAGE_TEAMS],
            JobRequest::LeaguePlayers(_) => {
                vec![STAGE_LEAGUE, STAGE_SEASON, STAGE_TEAMS, STAGE_PLAYERS]
            }
            JobRequest::BatchPlayers(_) => vec![STAGE_LEAGUES],
            JobRequest::DatabasePopulation(_) => vec![
                STAGE_COUNTRIES,
                STAGE_LEAGUES,
                STAGE_TEAMS,
                STAGE_PLAYERS,
                STAGE_PLAYER_DETAILS,
            ],
        }
    }

    /// Reject malformed parameters before a slot is claimed.
    pub fn validate(&self) -> AppResult<()> {
        match self {
            JobRequest::TeamEnrichment(p) => {
                if p.team_id == 0 {
                    return Err(AppError::ValidationError("team_id must be positive".to_string()));
                }
            }
            JobRequest::AllTeamsEnrichment(p) => {
                if p.limit == 0 {
                    return Err(AppError::ValidationError("limit must be at least 1".to_string()));
                }
            }
            JobRequest::LeaguePlayers(p) => {
                validate_league(&p.league)?;
                validate_max_teams(p.max_teams)?;
            }
            JobRequest::BatchPlayers(p) => {
                p.leagues.iter().try_for_each(|league| validate_league(league))?;
                validate_max_teams(p.max_teams)?;
            }
            JobRequest::DatabasePopulation(p) => {
                p.leagues.iter().try_for_each(|league| validate_league(league))?;
                validate_max_teams(p.max_teams)?;
            }
        }
        Ok(())
    }
}

/// Slot of a league-players run: the tournament id when the league is known.
pub fn league_players_key(league: &str) -> JobKey {
    match ReferenceLeague::find(league) {
        Some(reference) => JobKey::scoped(JobKind::LeaguePlayers, reference.tournament_id),
        None => JobKey::scoped(JobKind::LeaguePlayers, league.trim()),
    }
}

fn validate_league(league: &str) -> AppResult<()> {
    if ReferenceLeague::find(league).is_some() || league.trim().parse::<u64>().is_ok() {
        return Ok(());
    }
    Err(AppError::ValidationError(format!(
        "Unknown league '{}': use a reference key, name or tournament id",
        league
    )))
}

fn validate_max_teams(max_teams: Option<usize>) -> AppResult<()> {
    match max_teams {
        Some(0) => Err(AppError::ValidationError("max_teams must be at least 1".to_string())),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TeamEnrichmentDetail {
    pub team: Option<TeamTarget>,
    pub created: bool,
    pub updated_fields: Vec<String>,
    pub squad_size: usize,
    pub new_players: usize,
    pub details_refreshed: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AllTeamsDetail {
    pub offsets: Vec<usize>,
    /// Offset to resume from if this run is interrupted
    pub next_offset: usize,
    pub teams: usize,
    pub new_players: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SquadSummary {
    pub team: TeamTarget,
    pub players: Vec<PlayerTarget>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LeaguePlayersDetail {
    pub league: Option<LeagueTarget>,
    pub season: Option<SeasonRef>,
    pub saved: bool,
    pub teams: Vec<SquadSummary>,
    pub total_players: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChildRun {
    pub league: String,
    pub job_id: String,
    pub players: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchPlayersDetail {
    pub parallel: bool,
    pub leagues: Vec<ChildRun>,
    pub total_players: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PopulationDetail {
    pub countries: usize,
    pub leagues: usize,
    pub teams: usize,
    pub players: usize,
    pub player_details: usize,
    pub transfers: usize,
}

/// Items handed from one stage to the next.
struct Sink<T>(Arc<Mutex<Vec<T>>>);

impl<T> Clone for Sink<T> {
    fn clone(&self) -> Self {
        Sink(self.0.clone())
    }
}

impl<T> Sink<T> {
    fn new() -> Self {
        Sink(Arc::new(Mutex::new(Vec::new())))
    }

    fn push(&self, item: T) {
        self.0.lock().unwrap_or_else(|p| p.into_inner()).push(item);
    }

    fn extend(&self, items: impl IntoIterator<Item = T>) {
        self.0.lock().unwrap_or_else(|p| p.into_inner()).extend(items);
    }

    fn take(&self) -> Vec<T> {
        std::mem::take(&mut *self.0.lock().unwrap_or_else(|p| p.into_inner()))
    }
}

/// Count one finished league-players child against the batch's leagues stage.
fn record_child(
    handle: &JobHandle,
    index: usize,
    (league, job_id, outcome): (String, String, AppResult<LeaguePlayersDetail>),
) -> ChildRun {
    match outcome {
        Ok(child) => {
            handle.record(STAGE_LEAGUES, ItemOutcome::Updated, None);
            ChildRun {
                league,
                job_id,
                players: child.total_players,
                error: None,
            }
        }
        Err(e) => {
            let message = item_error(STAGE_LEAGUES, index, &league, &e.to_string());
            handle.record(STAGE_LEAGUES, ItemOutcome::Failed, Some(message));
            ChildRun {
                league,
                job_id,
                players: 0,
                error: Some(e.to_string()),
            }
        }
    }
}

/// Mark `handle` completed or failed according to `work`'s result.
pub async fn drive<T, F>(handle: &JobHandle, work: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match work.await {
        Ok(value) => {
            handle.complete();
            Ok(value)
        }
        Err(e) => {
            handle.fail(&e);
            Err(e)
        }
    }
}

#[derive(Clone)]
pub struct JobRunner {
    ctx: SyncContext,
}

impl JobRunner {
    pub fn new(ctx: SyncContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &SyncContext {
        &self.ctx
    }

    /// Validate `request` and claim its registry slot.
    pub fn start(&self, request: &JobRequest) -> AppResult<JobHandle> {
        request.validate()?;
        self.ctx.registry.try_start(request.key(), &request.stages())
    }

    /// Run a claimed job to its end.
    pub async fn run(&self, handle: JobHandle, request: JobRequest) {
        log_info!("Running job {}", handle.id());
        let id = handle.id().to_string();
        let result = match request {
            JobRequest::TeamEnrichment(p) => drive(&handle, self.team_enrichment(&handle, p)).await.map(|_| ()),
            JobRequest::AllTeamsEnrichment(p) => drive(&handle, self.all_teams(&handle, p)).await.map(|_| ()),
            JobRequest::LeaguePlayers(p) => {
                let ctx = self.scoped_context(p.save);
                drive(&handle, Self::league_players(&ctx, &handle, p)).await.map(|_| ())
            }
            JobRequest::BatchPlayers(p) => drive(&handle, self.batch_players(&handle, p)).await.map(|_| ()),
            JobRequest::DatabasePopulation(p) => drive(&handle, self.populate(&handle, p)).await.map(|_| ()),
        };
        if let Err(e) = result {
            log_warn!("Job {} failed: {}", id, e);
        }
    }

    fn scoped_context(&self, save: bool) -> SyncContext {
        if save {
            self.ctx.clone()
        } else {
            self.ctx.dry_run()
        }
    }

    pub async fn team_enrichment(
        &self,
        handle: &JobHandle,
        params: TeamEnrichmentParams,
    ) -> AppResult<TeamEnrichmentDetail> {
        let ctx = &self.ctx;
        let orchestrator = &ctx.orchestrator;
        let force = params.force_update;
        let mut detail = TeamEnrichmentDetail::default();

        let teams: Sink<AppResult<steps::TeamStep>> = Sink::new();
        let stage = {
            let (ctx, teams) = (ctx.clone(), teams.clone());
            ListStage::new(
                STAGE_TEAM,
                vec![params.team_id],
                |id: &u64| format!("team {}", id),
                move |id: u64| {
                    let (ctx, teams) = (ctx.clone(), teams.clone());
                    async move {
                        let step = steps::enrich_team(&ctx, id, force).await;
                        // failures are kept too; they decide the job outcome
                        teams.push(step.clone());
                        step.map(|step| ItemOutcome::from_created(step.result.created))
                    }
                },
            )
        };
        orchestrator.run_stage(handle, &stage).await?;

        let team = teams.take().pop().unwrap_or_else(|| {
            Err(AppError::InternalError(format!("Team {} was never attempted", params.team_id)))
        })?;
        detail.created = team.result.created;
        detail.updated_fields = team.result.changed_fields.clone();
        detail.team = Some(team.target.clone());
        handle.set_detail(&detail);

        if !params.get_players {
            return Ok(detail);
        }
        orchestrator.between_stages().await;

        handle.begin_stage(STAGE_SQUAD, None);
        let squad = ctx.gateway.fetch(&Resource::TeamPlayers(team.target.external_id)).await?;
        let fidelity = squad.fidelity;
        let entries = squad.payload.into_squad()?;
        detail.squad_size = entries.len();

        let players = Sink::new();
        let stage = {
            let (ctx, players) = (ctx.clone(), players.clone());
            let local_team = team.target.local_id;
            ListStage::new(
                STAGE_SQUAD,
                entries,
                |entry: &SquadEntryShape| entry.player.name.clone(),
                move |entry: SquadEntryShape| {
                    let (ctx, players) = (ctx.clone(), players.clone());
                    async move {
                        let record = ctx.mapper.squad_entry(&entry, fidelity, ctx.today());
                        let result = ctx
                            .resolver
                            .resolve_and_upsert(record, ScopeContext::team(local_team), force)
                            .await?;
                        players.push(PlayerTarget {
                            external_id: entry.player.id,
                            local_id: result.id(),
                            name: entry.player.name.clone(),
                        });
                        Ok(ItemOutcome::from_created(result.created))
                    }
                },
            )
        };
        let counters = orchestrator.run_stage(handle, &stage).await?;
        detail.new_players = counters.created;
        handle.set_detail(&detail);

        if fidelity.is_degraded() {
            log_warn!(
                "Squad of {} came from the page fallback; skipping player details",
                team.target.name
            );
            handle.finish_stage(STAGE_PLAYER_DETAILS);
            return Ok(detail);
        }
        orchestrator.between_stages().await;

        let counters = orchestrator
            .run_stage(handle, &player_details_stage(ctx, players.take(), false, force, None))
            .await?;
        detail.details_refreshed = counters.processed - counters.errors;
        handle.set_detail(&detail);
        Ok(detail)
    }

    pub async fn all_teams(&self, handle: &JobHandle, params: AllTeamsParams) -> AppResult<AllTeamsDetail> {
        let ctx = &self.ctx;
        let store = ctx.resolver.store().clone();
        let query = EntityQuery::of(EntityKind::Team).with_external_id();

        let total = store.count(&query).await?;
        handle.begin_stage(STAGE_TEAMS, Some(total.saturating_sub(params.offset)));
        log_info!(
            "Enriching {} stored teams from offset {} ({} per batch)",
            total,
            params.offset,
            params.limit
        );

        let new_players = Arc::new(AtomicUsize::new(0));
        let processed = Arc::new(AtomicUsize::new(0));
        let offsets = {
            let (ctx, handle, query) = (ctx.clone(), handle.clone(), query.clone());
            let (new_players, processed) = (new_players.clone(), processed.clone());
            let (force, get_players, start) = (params.force_update, params.get_players, params.offset);

            ctx.orchestrator
                .clone()
                .run_batched(params.limit, params.offset, move |batch: Batch| {
                    let (ctx, handle, query) = (ctx.clone(), handle.clone(), query.clone());
                    let (new_players, processed) = (new_players.clone(), processed.clone());
                    async move {
                        let rows = ctx.resolver.store().list(&query, batch).await?;
                        let seen = rows.len();
                        let stage = team_sweep_stage(&ctx, rows, force, get_players, new_players);
                        ctx.orchestrator.run_slice(&handle, &stage, batch.offset - start).await?;
                        processed.fetch_add(seen, Ordering::SeqCst);
                        Ok(seen)
                    }
                })
                .await?
        };
        handle.finish_stage(STAGE_TEAMS);

        let teams = processed.load(Ordering::SeqCst);
        let detail = AllTeamsDetail {
            offsets,
            next_offset: params.offset + teams,
            teams,
            new_players: new_players.load(Ordering::SeqCst),
        };
        handle.set_detail(&detail);
        Ok(detail)
    }

    /// Teams of one league season and their squads.
    pub async fn league_players(
        ctx: &SyncContext,
        handle: &JobHandle,
        params: LeaguePlayersParams,
    ) -> AppResult<LeaguePlayersDetail> {
        let orchestrator = &ctx.orchestrator;
        let force = params.force_update;
        let mut detail = LeaguePlayersDetail {
            saved: params.save,
            ..LeaguePlayersDetail::default()
        };

        let leagues = Sink::new();
        let stage = {
            let (ctx, leagues) = (ctx.clone(), leagues.clone());
            ListStage::new(
                STAGE_LEAGUE,
                vec![params.league.clone()],
                |query: &String| query.clone(),
                move |query: String| {
                    let (ctx, leagues) = (ctx.clone(), leagues.clone());
                    async move {
                        let league = steps::resolve_league(&ctx, &query, force).await?;
                        leagues.push(league);
                        Ok(ItemOutcome::Updated)
                    }
                },
            )
        };
        orchestrator.run_stage(handle, &stage).await?;
        let league = leagues
            .take()
            .pop()
            .ok_or_else(|| AppError::NotFound(format!("League {} could not be resolved", params.league)))?;
        detail.league = Some(league.clone());
        handle.set_detail(&detail);
        orchestrator.between_stages().await;

        let seasons = Sink::new();
        let stage = {
            let (ctx, seasons, year) = (ctx.clone(), seasons.clone(), params.year.clone());
            ListStage::new(
                STAGE_SEASON,
                vec![league.tournament_id],
                |id: &u64| format!("tournament {}", id),
                move |id: u64| {
                    let (ctx, seasons, year) = (ctx.clone(), seasons.clone(), year.clone());
                    async move {
                        seasons.push(steps::pick_season(&ctx, id, year.as_deref()).await?);
                        Ok(ItemOutcome::Updated)
                    }
                },
            )
        };
        orchestrator.run_stage(handle, &stage).await?;
        let season = seasons.take().pop().ok_or_else(|| {
            AppError::NotFound(format!(
                "No {} season for {}",
                params.year.as_deref().unwrap_or("current"),
                league.name
            ))
        })?;
        detail.season = Some(season.clone());
        handle.set_detail(&detail);
        orchestrator.between_stages().await;

        let teams = Sink::new();
        let stage = {
            let (ctx, teams, league, season) = (ctx.clone(), teams.clone(), league.clone(), season.clone());
            ListStage::new(
                STAGE_TEAMS,
                vec![season.name.clone()],
                |name: &String| format!("standings {}", name),
                move |_: String| {
                    let (ctx, teams, league, season) =
                        (ctx.clone(), teams.clone(), league.clone(), season.clone());
                    async move {
                        teams.extend(steps::league_teams(&ctx, &league, &season, force).await?);
                        Ok(ItemOutcome::Updated)
                    }
                },
            )
        };
        orchestrator.run_stage(handle, &stage).await?;
        let mut targets = teams.take();
        if let Some(max) = params.max_teams {
            targets.truncate(max);
        }
        orchestrator.between_stages().await;

        let squads = Sink::new();
        let stage = {
            let (ctx, squads) = (ctx.clone(), squads.clone());
            ListStage::new(
                STAGE_PLAYERS,
                targets,
                |team: &TeamTarget| team.name.clone(),
                move |team: TeamTarget| {
                    let (ctx, squads) = (ctx.clone(), squads.clone());
                    async move {
                        let squad = steps::sync_squad(&ctx, &team, force).await?;
                        let outcome = ItemOutcome::from_created(squad.created > 0);
                        squads.push(SquadSummary {
                            team,
                            players: squad.players,
                        });
                        Ok(outcome)
                    }
                },
            )
        };
        orchestrator.run_stage(handle, &stage).await?;

        detail.teams = squads.take();
        detail.total_players = detail.teams.iter().map(|s| s.players.len()).sum();
        handle.set_detail(&detail);
        log_info!(
            "{} {}: {} players across {} teams",
            league.name,
            season.name,
            detail.total_players,
            detail.teams.len()
        );
        Ok(detail)
    }

    /// One league-players child per league, each in its own registry slot.
    pub async fn batch_players(
        &self,
        handle: &JobHandle,
        params: BatchPlayersParams,
    ) -> AppResult<BatchPlayersDetail> {
        let leagues: Vec<String> = if params.leagues.is_empty() {
            ReferenceLeague::main_leagues()
                .iter()
                .map(|league| league.key.to_string())
                .collect()
        } else {
            params.leagues.clone()
        };
        handle.begin_stage(STAGE_LEAGUES, Some(leagues.len()));

        let child = |league: &String| LeaguePlayersParams {
            league: league.clone(),
            year: params.year.clone(),
            max_teams: params.max_teams,
            save: true,
            force_update: params.force_update,
        };

        // children are counted as they end
        let mut runs: Vec<(usize, ChildRun)> = Vec::with_capacity(leagues.len());
        if params.parallel {
            let mut pending: FuturesUnordered<_> = leagues
                .iter()
                .enumerate()
                .map(|(index, league)| {
                    let run = self.run_child(child(league));
                    async move { (index, run.await) }
                })
                .collect();
            while let Some((index, outcome)) = pending.next().await {
                runs.push((index, record_child(handle, index, outcome)));
            }
        } else {
            for (index, league) in leagues.iter().enumerate() {
                if index > 0 {
                    self.ctx.orchestrator.pacer().pause(self.ctx.orchestrator.pacing().league).await;
                }
                handle.set_current_item(league);
                let outcome = self.run_child(child(league)).await;
                runs.push((index, record_child(handle, index, outcome)));
            }
        }
        runs.sort_by_key(|(index, _)| *index);

        let mut detail = BatchPlayersDetail {
            parallel: params.parallel,
            ..BatchPlayersDetail::default()
        };
        for (_, run) in runs {
            detail.total_players += run.players;
            detail.leagues.push(run);
        }
        handle.finish_stage(STAGE_LEAGUES);
        handle.set_detail(&detail);
        Ok(detail)
    }

    async fn run_child(&self, params: LeaguePlayersParams) -> (String, String, AppResult<LeaguePlayersDetail>) {
        let league = params.league.clone();
        let request = JobRequest::LeaguePlayers(params.clone());
        let job_id = request.key().id();

        let child = match self.ctx.registry.try_start(request.key(), &request.stages()) {
            Ok(child) => child,
            Err(e) => return (league, job_id, Err(e)),
        };
        let outcome = drive(&child, Self::league_players(&self.ctx, &child, params)).await;
        (league, job_id, outcome)
    }

    /// Countries, main leagues, their teams and squads, then player details.
    pub async fn populate(&self, handle: &JobHandle, params: PopulationParams) -> AppResult<PopulationDetail> {
        let ctx = &self.ctx;
        let orchestrator = &ctx.orchestrator;
        let force = params.force_update;
        let mut detail = PopulationDetail::default();

        let countries = self.country_records().await;
        let stage = {
            let ctx = ctx.clone();
            ListStage::new(
                STAGE_COUNTRIES,
                countries,
                |record: &ExternalRecord| record.label(),
                move |record: ExternalRecord| {
                    let ctx = ctx.clone();
                    async move {
                        let result = ctx
                            .resolver
                            .resolve_and_upsert(record, ScopeContext::default(), force)
                            .await?;
                        Ok(ItemOutcome::from_created(result.created))
                    }
                },
            )
        };
        let counters = orchestrator.run_stage(handle, &stage).await?;
        detail.countries = counters.processed - counters.errors;
        handle.set_detail(&detail);
        orchestrator.between_stages().await;

        let leagues: Vec<String> = if params.leagues.is_empty() {
            ReferenceLeague::main_leagues()
                .iter()
                .map(|league| league.key.to_string())
                .collect()
        } else {
            params.leagues.clone()
        };
        let teams = Sink::new();
        let stage = {
            let (ctx, teams, max_teams) = (ctx.clone(), teams.clone(), params.max_teams);
            ListStage::new(
                STAGE_LEAGUES,
                leagues,
                |league: &String| league.clone(),
                move |query: String| {
                    let (ctx, teams) = (ctx.clone(), teams.clone());
                    async move {
                        let league = steps::resolve_league(&ctx, &query, force).await?;
                        let season = steps::pick_season(&ctx, league.tournament_id, None).await?;
                        let mut found = steps::league_teams(&ctx, &league, &season, force).await?;
                        if let Some(max) = max_teams {
                            found.truncate(max);
                        }
                        teams.extend(found);
                        Ok(ItemOutcome::Updated)
                    }
                },
            )
        };
        let counters = orchestrator.run_stage(handle, &stage).await?;
        detail.leagues = counters.processed - counters.errors;
        handle.set_detail(&detail);
        orchestrator.between_stages().await;

        let targets = teams.take();
        let enriched = Sink::new();
        let stage = {
            let (ctx, enriched) = (ctx.clone(), enriched.clone());
            ListStage::new(
                STAGE_TEAMS,
                targets,
                |team: &TeamTarget| team.name.clone(),
                move |team: TeamTarget| {
                    let (ctx, enriched) = (ctx.clone(), enriched.clone());
                    async move {
                        let step = steps::enrich_team(&ctx, team.external_id, force).await?;
                        enriched.push(step.target);
                        Ok(ItemOutcome::from_created(step.result.created))
                    }
                },
            )
        };
        let counters = orchestrator.run_stage(handle, &stage).await?;
        detail.teams = counters.processed - counters.errors;
        handle.set_detail(&detail);
        orchestrator.between_stages().await;

        let players = Sink::new();
        let stage = {
            let (ctx, players) = (ctx.clone(), players.clone());
            ListStage::new(
                STAGE_PLAYERS,
                enriched.take(),
                |team: &TeamTarget| team.name.clone(),
                move |team: TeamTarget| {
                    let (ctx, players) = (ctx.clone(), players.clone());
                    async move {
                        let squad = steps::sync_squad(&ctx, &team, force).await?;
                        let outcome = ItemOutcome::from_created(squad.created > 0);
                        if !squad.fidelity.is_degraded() {
                            players.extend(squad.players);
                        }
                        Ok(outcome)
                    }
                },
            )
        };
        orchestrator.run_stage(handle, &stage).await?;
        let players = players.take();
        detail.players = players.len();
        handle.set_detail(&detail);
        orchestrator.between_stages().await;

        let transfers = Arc::new(AtomicUsize::new(0));
        let counters = orchestrator
            .run_stage(
                handle,
                &player_details_stage(ctx, players, true, force, Some(transfers.clone())),
            )
            .await?;
        detail.player_details = counters.processed - counters.errors;
        detail.transfers = transfers.load(Ordering::SeqCst);
        handle.set_detail(&detail);
        Ok(detail)
    }

    /// Upstream football categories, or the reference table's countries when
    /// the taxonomy endpoint is down.
    async fn country_records(&self) -> Vec<ExternalRecord> {
        let ctx = &self.ctx;
        let categories = async {
            let data = ctx.gateway.fetch(&Resource::Categories).await?;
            let fidelity = data.fidelity;
            Ok::<_, AppError>((data.payload.into_categories()?, fidelity))
        }
        .await;

        match categories {
            Ok((categories, fidelity)) => categories
                .iter()
                .map(|category| ctx.mapper.country(category, fidelity))
                .collect(),
            Err(e) => {
                log_warn!("Category list unavailable ({}); using reference countries", e);
                let mut names: Vec<&str> = ReferenceLeague::main_leagues()
                    .iter()
                    .map(|league| league.country)
                    .collect();
                names.dedup();
                names
                    .into_iter()
                    .filter_map(|name| ctx.mapper.country_named(name, None))
                    .collect()
            }
        }
    }
}

type ItemFn<T> = Box<dyn Fn(T) -> BoxFuture<'static, AppResult<ItemOutcome>> + Send + Sync>;

type PlayerDetailsStage = ListStage<PlayerTarget, fn(&PlayerTarget) -> String, ItemFn<PlayerTarget>>;

fn player_details_stage(
    ctx: &SyncContext,
    players: Vec<PlayerTarget>,
    with_transfers: bool,
    force: bool,
    transfers: Option<Arc<AtomicUsize>>,
) -> PlayerDetailsStage {
    let ctx = ctx.clone();
    let describe: fn(&PlayerTarget) -> String = |player| player.name.clone();
    let process: ItemFn<PlayerTarget> = Box::new(move |player: PlayerTarget| {
        let (ctx, transfers) = (ctx.clone(), transfers.clone());
        Box::pin(async move {
            let step = steps::enrich_player(&ctx, player.external_id, with_transfers, force).await?;
            if let Some(counter) = transfers {
                counter.fetch_add(step.transfers, Ordering::SeqCst);
            }
            Ok(ItemOutcome::from_created(step.result.created))
        })
    });
    ListStage::new(STAGE_PLAYER_DETAILS, players, describe, process)
}

type TeamSweepStage = ListStage<StoredEntity, fn(&StoredEntity) -> String, ItemFn<StoredEntity>>;

fn team_sweep_stage(
    ctx: &SyncContext,
    rows: Vec<StoredEntity>,
    force: bool,
    get_players: bool,
    new_players: Arc<AtomicUsize>,
) -> TeamSweepStage {
    let ctx = ctx.clone();
    let describe: fn(&StoredEntity) -> String =
        |row| row.entity.name().unwrap_or("unnamed team").to_string();
    let process: ItemFn<StoredEntity> = Box::new(move |row: StoredEntity| {
        let (ctx, new_players) = (ctx.clone(), new_players.clone());
        Box::pin(async move {
            let external_id = row
                .external_id
                .as_deref()
                .and_then(|id| id.parse::<u64>().ok())
                .ok_or_else(|| {
                    AppError::ValidationError(format!("Team #{} has no usable external id", row.id))
                })?;
            let step = steps::enrich_team(&ctx, external_id, force).await?;
            if get_players {
                let squad = steps::sync_squad(&ctx, &step.target, force).await?;
                new_players.fetch_add(squad.created, Ordering::SeqCst);
            }
            Ok(ItemOutcome::from_created(step.result.created))
        })
    });
    ListStage::new(STAGE_TEAMS, rows, describe, process)
}
