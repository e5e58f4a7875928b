use crate::modules::fixtures::domain::season::{parse_day, Season};
use crate::modules::fixtures::SeasonFixtureParams;
use crate::modules::jobs::application::pipelines::{
    AllTeamsParams, BatchPlayersParams, JobRequest, LeaguePlayersParams, PopulationParams,
    TeamEnrichmentParams, DEFAULT_TEAM_BATCH,
};
use crate::modules::jobs::domain::JobKind;
use crate::shared::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Loosely typed parameters as they arrive from a caller.
///
/// Every field is optional; [`JobStartParams::into_request`] checks what the
/// requested job kind needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStartParams {
    pub season: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    /// Page size of batched sweeps; wins over `limit`
    pub batch_size: Option<usize>,
    pub save: Option<bool>,
    pub max_teams: Option<usize>,
    pub get_players: Option<bool>,
    pub force_update: Option<bool>,
    pub team_id: Option<u64>,
    pub league: Option<String>,
    pub leagues: Option<Vec<String>>,
    pub year: Option<String>,
    pub parallel: Option<bool>,
    pub date: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// A validated start, ready to claim a registry slot.
#[derive(Debug, Clone, PartialEq)]
pub enum StartRequest {
    Pipeline(JobRequest),
    SeasonFixture(SeasonFixtureParams),
}

impl StartRequest {
    pub fn kind(&self) -> JobKind {
        match self {
            StartRequest::Pipeline(request) => request.kind(),
            StartRequest::SeasonFixture(_) => JobKind::SeasonFixture,
        }
    }
}

impl JobStartParams {
    pub fn validate(&self) -> AppResult<()> {
        if let Some(season) = &self.season {
            Season::parse(season)?;
        }
        at_least_one("limit", self.limit)?;
        at_least_one("batchSize", self.batch_size)?;
        at_least_one("maxTeams", self.max_teams)?;

        if let Some(date) = &self.date {
            parse_day(date)?;
        }
        let start = self.start_date.as_deref().map(parse_day).transpose()?;
        let end = self.end_date.as_deref().map(parse_day).transpose()?;
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(AppError::ValidationError(format!(
                    "startDate {} is after endDate {}",
                    start, end
                )));
            }
        }
        Ok(())
    }

    pub fn into_request(self, kind: JobKind) -> AppResult<StartRequest> {
        self.validate()?;
        let force_update = self.force_update.unwrap_or(false);

        let request = match kind {
            JobKind::TeamEnrichment => JobRequest::TeamEnrichment(TeamEnrichmentParams {
                team_id: self.team_id.ok_or_else(|| missing("teamId", kind))?,
                force_update,
                get_players: self.get_players.unwrap_or(true),
            }),
            JobKind::AllTeamsEnrichment => JobRequest::AllTeamsEnrichment(AllTeamsParams {
                limit: self.batch_size.or(self.limit).unwrap_or(DEFAULT_TEAM_BATCH),
                offset: self.offset.unwrap_or(0),
                force_update,
                get_players: self.get_players.unwrap_or(false),
            }),
            JobKind::LeaguePlayers => JobRequest::LeaguePlayers(LeaguePlayersParams {
                league: self.league.ok_or_else(|| missing("league", kind))?,
                year: self.year,
                max_teams: self.max_teams,
                save: self.save.unwrap_or(true),
                force_update,
            }),
            JobKind::BatchPlayers => JobRequest::BatchPlayers(BatchPlayersParams {
                leagues: self.leagues.unwrap_or_default(),
                year: self.year,
                max_teams: self.max_teams,
                parallel: self.parallel.unwrap_or(false),
                force_update,
            }),
            JobKind::DatabasePopulation => JobRequest::DatabasePopulation(PopulationParams {
                leagues: self.leagues.unwrap_or_default(),
                max_teams: self.max_teams,
                force_update,
            }),
            JobKind::SeasonFixture => {
                return Ok(StartRequest::SeasonFixture(SeasonFixtureParams {
                    season: self.season.ok_or_else(|| missing("season", kind))?,
                    save: self.save.unwrap_or(false),
                }))
            }
        };
        Ok(StartRequest::Pipeline(request))
    }
}

fn at_least_one(name: &str, value: Option<usize>) -> AppResult<()> {
    match value {
        Some(0) => Err(AppError::ValidationError(format!("{} must be at least 1", name))),
        _ => Ok(()),
    }
}

fn missing(name: &str, kind: JobKind) -> AppError {
    AppError::ValidationError(format!("{} is required for {}", name, kind))
}
