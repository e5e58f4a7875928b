use crate::modules::catalog::domain::StoredEntity;
use crate::modules::fixtures::MatchSummary;
use crate::modules::jobs::application::steps::SeasonRef;
use crate::modules::jobs::domain::{JobKind, JobState, JobStatus, StageCounters, StageProgress};
use crate::modules::provider::domain::shapes::{
    EventShape, LineupsShape, PlayerShape, SeasonShape, StandingTableShape, TeamShape,
    TopPlayerEntryShape,
};
use crate::modules::provider::Fidelity;
use crate::shared::errors::AppError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Reply to a job start; the job itself runs detached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Accepted {
    pub status: u16,
    pub job_id: String,
    pub status_endpoint: String,
}

impl Accepted {
    pub fn new(job_id: impl Into<String>) -> Self {
        let job_id = job_id.into();
        Self {
            status: 202,
            status_endpoint: status_endpoint(&job_id),
            job_id,
        }
    }
}

pub fn status_endpoint(job_id: &str) -> String {
    format!("/api/jobs/{}/status", job_id)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
    pub job_id: String,
    pub run_id: Option<Uuid>,
    pub kind: JobKind,
    pub is_running: bool,
    pub status: JobStatus,
    pub progress: f64,
    pub stats: StageCounters,
    pub stages: Vec<StageProgress>,
    pub errors: Vec<String>,
    pub current_stage: Option<String>,
    pub current_item: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub detail: Value,
}

impl From<JobState> for JobStatusView {
    fn from(state: JobState) -> Self {
        Self {
            job_id: state.key.id(),
            run_id: state.run_id,
            kind: state.key.kind,
            is_running: state.is_running(),
            status: state.status,
            progress: state.progress_percent,
            stats: state.stats,
            stages: state.stages,
            errors: state.errors,
            current_stage: state.current_stage,
            current_item: state.current_item,
            start_time: state.start_time,
            end_time: state.end_time,
            detail: state.detail,
        }
    }
}

/// Structured error reply: 4xx for caller mistakes, 5xx otherwise.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub status: u16,
    pub kind: &'static str,
    pub message: String,
}

impl From<&AppError> for ErrorBody {
    fn from(error: &AppError) -> Self {
        Self {
            status: error.http_status(),
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamLookup {
    pub team: TeamShape,
    pub logo: String,
    pub fidelity: Fidelity,
    /// The local entity, when this team was stored before
    pub stored: Option<StoredEntity>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerLookup {
    pub player: PlayerShape,
    pub photo: String,
    pub fidelity: Fidelity,
    pub stored: Option<StoredEntity>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchDetails {
    pub event: EventShape,
    pub summary: Option<MatchSummary>,
    /// `None` when the upstream has no lineups for the match yet
    pub lineups: Option<LineupsShape>,
    pub fidelity: Fidelity,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StandingsView {
    pub tournament_id: u64,
    pub season: SeasonRef,
    pub tables: Vec<StandingTableShape>,
}

/// Seasons the upstream knows for a league, most recent first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonsView {
    pub tournament_id: u64,
    /// Reference key when the league is a known one
    pub league: Option<String>,
    pub seasons: Vec<SeasonShape>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopScorersView {
    pub tournament_id: u64,
    pub season: SeasonRef,
    pub scorers: Vec<TopPlayerEntryShape>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::jobs::domain::JobKey;

    #[test]
    fn test_accepted_points_at_status_endpoint() {
        let accepted = Accepted::new("season_fixture:2024-2025");
        assert_eq!(accepted.status, 202);
        assert_eq!(accepted.status_endpoint, "/api/jobs/season_fixture:2024-2025/status");

        let json = serde_json::to_value(&accepted).unwrap();
        assert_eq!(json["jobId"], "season_fixture:2024-2025");
    }

    #[test]
    fn test_status_view_copies_state() {
        let state = JobState::started(JobKey::scoped(JobKind::TeamEnrichment, 42), &["team"]);
        let view = JobStatusView::from(state);
        assert_eq!(view.job_id, "team_enrichment:42");
        assert!(view.is_running);
        assert_eq!(view.status, JobStatus::Running);
        assert_eq!(view.stages.len(), 1);
        assert!(view.start_time.is_some());
        assert!(view.run_id.is_some());
    }

    #[test]
    fn test_error_body_status() {
        let body = ErrorBody::from(&AppError::ValidationError("bad season".into()));
        assert_eq!(body.status, 400);
        let body = ErrorBody::from(&AppError::PersistenceError("db down".into()));
        assert_eq!(body.status, 500);
    }
}
