//! Everything an outer transport (an HTTP router, the CLI) calls into.
//!
//! Job starts validate and claim their registry slot synchronously, then run
//! detached on a [`TaskTracker`]; callers follow them by polling
//! [`ControlSurface::job_status`]. Lookups run inline and return their result.

use super::params::{JobStartParams, StartRequest};
use super::views::{
    Accepted, JobStatusView, MatchDetails, PlayerLookup, SeasonsView, StandingsView, TeamLookup,
    TopScorersView,
};
use crate::modules::catalog::domain::{EntityKind, ReferenceLeague, REFERENCE_LEAGUES};
use crate::modules::catalog::infrastructure::{MemoryEntityStore, PostgresEntityStore};
use crate::modules::catalog::EntityStore;
use crate::modules::fixtures::application::match_day::summarize_event;
use crate::modules::fixtures::domain::season::{parse_day, week_of};
use crate::modules::fixtures::{
    DayMatches, RangeMatches, SeasonCrawler, SeasonFixtureParams, SeasonMatches,
};
use crate::modules::jobs::application::steps::{pick_season, tournament_id_for};
use crate::modules::jobs::application::{JobRequest, JobRunner, Orchestrator, SyncContext};
use crate::modules::jobs::domain::JobKind;
use crate::modules::jobs::infrastructure::JobRegistry;
use crate::modules::provider::domain::shapes::PlayerShape;
use crate::modules::provider::{FetchGateway, Resource};
use crate::shared::config::AppConfig;
use crate::shared::database::Database;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::{Pacer, PacingPolicy, TokioPacer};
use crate::{log_info, log_warn};
use std::sync::Arc;
use tokio_util::task::TaskTracker;

#[derive(Clone)]
pub struct ControlSurface {
    ctx: SyncContext,
    runner: JobRunner,
    crawler: SeasonCrawler,
    tracker: TaskTracker,
}

impl ControlSurface {
    pub fn new(
        gateway: Arc<FetchGateway>,
        store: Arc<dyn EntityStore>,
        pacer: Arc<dyn Pacer>,
        pacing: PacingPolicy,
    ) -> Self {
        let orchestrator = Orchestrator::new(pacer, pacing);
        Self::from_context(SyncContext::new(gateway, store, orchestrator, JobRegistry::new()))
    }

    pub fn from_context(ctx: SyncContext) -> Self {
        Self {
            runner: JobRunner::new(ctx.clone()),
            crawler: SeasonCrawler::new(ctx.clone()),
            ctx,
            tracker: TaskTracker::new(),
        }
    }

    /// Production wiring: Postgres when `DATABASE_URL` is set, memory otherwise.
    pub async fn from_config(config: &AppConfig) -> AppResult<Self> {
        let pacer: Arc<dyn Pacer> = Arc::new(TokioPacer);
        let gateway = Arc::new(FetchGateway::from_config(config, pacer.clone())?);

        let store: Arc<dyn EntityStore> = match &config.database_url {
            Some(url) => {
                let database = Database::connect(url)?;
                database.run_migrations().await?;
                Arc::new(PostgresEntityStore::new(database.pool().clone()))
            }
            None => {
                log_warn!("DATABASE_URL is not set; entities are kept in memory for this run");
                Arc::new(MemoryEntityStore::new())
            }
        };

        Ok(Self::new(gateway, store, pacer, PacingPolicy::from_config(config)))
    }

    pub fn context(&self) -> &SyncContext {
        &self.ctx
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.ctx.registry
    }

    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    /// Validate loose parameters for `kind` and start that job.
    pub fn start_job(&self, kind: JobKind, params: JobStartParams) -> AppResult<Accepted> {
        match params.into_request(kind)? {
            StartRequest::Pipeline(request) => self.start_pipeline(request),
            StartRequest::SeasonFixture(params) => self.start_season_fixture(params),
        }
    }

    pub fn start_pipeline(&self, request: JobRequest) -> AppResult<Accepted> {
        let handle = self.runner.start(&request)?;
        let accepted = Accepted::new(handle.id());

        let runner = self.runner.clone();
        self.tracker.spawn(async move { runner.run(handle, request).await });
        log_info!("Accepted job {}", accepted.job_id);
        Ok(accepted)
    }

    pub fn start_season_fixture(&self, params: SeasonFixtureParams) -> AppResult<Accepted> {
        let (handle, season) = self.crawler.start(&params)?;
        let accepted = Accepted::new(handle.id());

        let crawler = self.crawler.clone();
        let save = params.save;
        self.tracker.spawn(async move {
            if let Err(e) = crawler.run(handle, season, save).await {
                log_warn!("Season {} crawl failed: {}", season, e);
            }
        });
        log_info!("Accepted job {}", accepted.job_id);
        Ok(accepted)
    }

    pub fn job_status(&self, job_id: &str) -> AppResult<JobStatusView> {
        self.ctx
            .registry
            .snapshot(job_id)
            .map(JobStatusView::from)
            .ok_or_else(|| AppError::NotFound(format!("No job with id {}", job_id)))
    }

    pub fn jobs(&self) -> Vec<JobStatusView> {
        self.ctx.registry.list().into_iter().map(JobStatusView::from).collect()
    }

    /// Stop accepting new work and wait for every spawned job to finish.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }

    pub async fn team(&self, team_id: u64) -> AppResult<TeamLookup> {
        let data = self.ctx.gateway.fetch(&Resource::Team(team_id)).await?;
        let fidelity = data.fidelity;
        let team = data.payload.into_team()?;
        let stored = self.ctx.resolver.lookup(EntityKind::Team, &team_id.to_string()).await?;

        Ok(TeamLookup {
            logo: self.ctx.gateway.endpoints().team_image(team.id),
            team,
            fidelity,
            stored,
        })
    }

    pub async fn player(&self, player_id: u64) -> AppResult<PlayerLookup> {
        let data = self.ctx.gateway.fetch(&Resource::Player(player_id)).await?;
        let fidelity = data.fidelity;
        let player = data.payload.into_player()?;
        let stored = self
            .ctx
            .resolver
            .lookup(EntityKind::Player, &player_id.to_string())
            .await?;

        Ok(PlayerLookup {
            photo: self.ctx.gateway.endpoints().player_image(player.id),
            player,
            fidelity,
            stored,
        })
    }

    pub async fn search_players(&self, query: &str) -> AppResult<Vec<PlayerShape>> {
        let query = query.trim();
        if query.len() < 2 {
            return Err(AppError::ValidationError(
                "Search query needs at least 2 characters".to_string(),
            ));
        }
        self.ctx
            .gateway
            .fetch(&Resource::SearchPlayers(query.to_string()))
            .await?
            .payload
            .into_player_search()
    }

    /// The match plus its lineups when the upstream has them.
    pub async fn match_details(&self, event_id: u64) -> AppResult<MatchDetails> {
        let data = self.ctx.gateway.fetch(&Resource::Event(event_id)).await?;
        let fidelity = data.fidelity;
        let event = data.payload.into_event()?;

        let lineups = match self.ctx.gateway.fetch(&Resource::EventLineups(event_id)).await {
            Ok(data) => Some(data.payload.into_lineups()?),
            Err(AppError::NotFound(_)) => None,
            Err(e) => {
                log_warn!("Lineups of event {} unavailable: {}", event_id, e);
                None
            }
        };

        Ok(MatchDetails {
            summary: summarize_event(&event, self.ctx.gateway.endpoints()),
            event,
            lineups,
            fidelity,
        })
    }

    pub async fn matches_by_date(&self, date: &str, save: bool) -> AppResult<DayMatches> {
        let date = parse_day(date)?;
        self.crawler.days().matches_for_day(date, save).await
    }

    pub async fn matches_by_range(&self, start: &str, end: &str, save: bool) -> AppResult<RangeMatches> {
        let (start, end) = (parse_day(start)?, parse_day(end)?);
        self.crawler.days().matches_for_range(start, end, save).await
    }

    pub async fn today_matches(&self, save: bool) -> AppResult<DayMatches> {
        self.crawler.days().matches_for_day(self.ctx.today(), save).await
    }

    /// Monday to Sunday of the current week.
    pub async fn week_matches(&self, save: bool) -> AppResult<RangeMatches> {
        let (monday, sunday) = week_of(self.ctx.today());
        self.crawler.days().matches_for_range(monday, sunday, save).await
    }

    /// Monday to Sunday of the week holding `date`.
    pub async fn week_matches_of(&self, date: &str, save: bool) -> AppResult<RangeMatches> {
        let (monday, sunday) = week_of(parse_day(date)?);
        self.crawler.days().matches_for_range(monday, sunday, save).await
    }

    pub async fn seasons(&self, league: &str) -> AppResult<SeasonsView> {
        let (reference, tournament_id) = tournament_id_for(league)?;
        let seasons = self
            .ctx
            .gateway
            .fetch(&Resource::TournamentSeasons(tournament_id))
            .await?
            .payload
            .into_seasons()?;

        Ok(SeasonsView {
            tournament_id,
            league: reference.map(|league| league.key.to_string()),
            seasons,
        })
    }

    /// A league season's matches; `year` picks the season, the latest when absent.
    pub async fn league_matches(
        &self,
        league: &str,
        year: Option<&str>,
        save: bool,
    ) -> AppResult<SeasonMatches> {
        let (_, tournament_id) = tournament_id_for(league)?;
        let season = pick_season(&self.ctx, tournament_id, year).await?;
        self.crawler
            .days()
            .matches_for_season(tournament_id, season.id, &season.name, save)
            .await
    }

    pub async fn standings(&self, league: &str, year: Option<&str>) -> AppResult<StandingsView> {
        let (_, tournament_id) = tournament_id_for(league)?;
        let season = pick_season(&self.ctx, tournament_id, year).await?;
        let tables = self
            .ctx
            .gateway
            .fetch(&Resource::Standings {
                tournament: tournament_id,
                season: season.id,
            })
            .await?
            .payload
            .into_standings()?;

        Ok(StandingsView {
            tournament_id,
            season,
            tables,
        })
    }

    pub async fn top_scorers(&self, league: &str, year: Option<&str>) -> AppResult<TopScorersView> {
        let (_, tournament_id) = tournament_id_for(league)?;
        let season = pick_season(&self.ctx, tournament_id, year).await?;
        let top = self
            .ctx
            .gateway
            .fetch(&Resource::TopPlayers {
                tournament: tournament_id,
                season: season.id,
            })
            .await?
            .payload
            .into_top_players()?;

        Ok(TopScorersView {
            tournament_id,
            season,
            scorers: top.goals,
        })
    }

    pub fn reference_leagues(&self) -> &'static [ReferenceLeague] {
        REFERENCE_LEAGUES
    }
}
