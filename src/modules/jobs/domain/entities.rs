/// Domain entities for the long-running job system
///
/// A job is one multi-stage sweep (team enrichment, league players, season
/// fixtures...). Its state lives in process memory keyed by the job id and is
/// overwritten by the next run with the same id.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Job status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Idle,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Idle => write!(f, "idle"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "idle" => Ok(JobStatus::Idle),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(format!("Invalid job status: {}", s)),
        }
    }
}

/// Job kind enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    TeamEnrichment,
    AllTeamsEnrichment,
    LeaguePlayers,
    BatchPlayers,
    DatabasePopulation,
    SeasonFixture,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::TeamEnrichment => write!(f, "team_enrichment"),
            JobKind::AllTeamsEnrichment => write!(f, "all_teams_enrichment"),
            JobKind::LeaguePlayers => write!(f, "league_players"),
            JobKind::BatchPlayers => write!(f, "batch_players"),
            JobKind::DatabasePopulation => write!(f, "database_population"),
            JobKind::SeasonFixture => write!(f, "season_fixture"),
        }
    }
}

impl std::str::FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "team_enrichment" => Ok(JobKind::TeamEnrichment),
            "all_teams_enrichment" => Ok(JobKind::AllTeamsEnrichment),
            "league_players" => Ok(JobKind::LeaguePlayers),
            "batch_players" => Ok(JobKind::BatchPlayers),
            "database_population" => Ok(JobKind::DatabasePopulation),
            "season_fixture" => Ok(JobKind::SeasonFixture),
            _ => Err(format!("Invalid job kind: {}", s)),
        }
    }
}

/// Identifier of a job slot: the kind alone for whole-database jobs,
/// `kind:scope` for per-team / per-league / per-season jobs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobKey {
    pub kind: JobKind,
    pub scope: Option<String>,
}

impl JobKey {
    pub fn global(kind: JobKind) -> Self {
        Self { kind, scope: None }
    }

    pub fn scoped(kind: JobKind, scope: impl std::fmt::Display) -> Self {
        Self {
            kind,
            scope: Some(scope.to_string()),
        }
    }

    pub fn id(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for JobKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.scope {
            Some(scope) => write!(f, "{}:{}", self.kind, scope),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::str::FromStr for JobKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((kind, scope)) if !scope.is_empty() => Ok(JobKey::scoped(kind.parse()?, scope)),
            Some(_) => Err(format!("Invalid job id: {}", s)),
            None => Ok(JobKey::global(s.parse()?)),
        }
    }
}

/// Result of processing one stage item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemOutcome {
    Created,
    Updated,
    Failed,
}

impl ItemOutcome {
    pub fn from_created(created: bool) -> Self {
        if created {
            ItemOutcome::Created
        } else {
            ItemOutcome::Updated
        }
    }
}

/// Counters of one stage; `processed == created + updated + errors`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCounters {
    pub processed: usize,
    pub updated: usize,
    pub created: usize,
    pub errors: usize,
}

impl StageCounters {
    pub fn record(&mut self, outcome: ItemOutcome) {
        self.processed += 1;
        match outcome {
            ItemOutcome::Created => self.created += 1,
            ItemOutcome::Updated => self.updated += 1,
            ItemOutcome::Failed => self.errors += 1,
        }
    }

    pub fn absorb(&mut self, other: &StageCounters) {
        self.processed += other.processed;
        self.updated += other.updated;
        self.created += other.created;
        self.errors += other.errors;
    }

    pub fn is_balanced(&self) -> bool {
        self.processed == self.created + self.updated + self.errors
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageProgress {
    pub name: String,
    pub total: Option<usize>,
    pub counters: StageCounters,
    pub finished: bool,
}

impl StageProgress {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            total: None,
            counters: StageCounters::default(),
            finished: false,
        }
    }

    /// Completed share of this stage in [0, 1]; 0 while the total is unknown.
    pub fn fraction(&self) -> f64 {
        if self.finished {
            return 1.0;
        }
        match self.total {
            Some(0) => 1.0,
            Some(total) => (self.counters.processed as f64 / total as f64).clamp(0.0, 1.0),
            None => 0.0,
        }
    }
}

/// Snapshot-able state of one job run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobState {
    pub key: JobKey,
    /// Fresh for every run of the same slot
    pub run_id: Option<Uuid>,
    pub status: JobStatus,
    pub progress_percent: f64,
    pub stats: StageCounters,
    pub stages: Vec<StageProgress>,
    pub errors: Vec<String>,
    pub current_stage: Option<String>,
    pub current_item: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub detail: Value,
}

impl JobState {
    pub fn idle(key: JobKey) -> Self {
        Self {
            key,
            run_id: None,
            status: JobStatus::Idle,
            progress_percent: 0.0,
            stats: StageCounters::default(),
            stages: Vec::new(),
            errors: Vec::new(),
            current_stage: None,
            current_item: None,
            start_time: None,
            end_time: None,
            detail: Value::Null,
        }
    }

    /// Fresh running state with the declared stages.
    pub fn started(key: JobKey, stages: &[&str]) -> Self {
        Self {
            run_id: Some(Uuid::new_v4()),
            status: JobStatus::Running,
            stages: stages.iter().map(|s| StageProgress::new(*s)).collect(),
            start_time: Some(Utc::now()),
            ..Self::idle(key)
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == JobStatus::Running
    }

    pub fn stage_mut(&mut self, name: &str) -> &mut StageProgress {
        if let Some(index) = self.stages.iter().position(|s| s.name == name) {
            return &mut self.stages[index];
        }
        self.stages.push(StageProgress::new(name));
        let last = self.stages.len() - 1;
        &mut self.stages[last]
    }

    /// Recompute overall progress from the stages; never moves backwards.
    pub fn refresh_progress(&mut self) {
        if self.stages.is_empty() {
            return;
        }
        let done: f64 = self.stages.iter().map(StageProgress::fraction).sum();
        let percent = (done / self.stages.len() as f64 * 100.0).clamp(0.0, 100.0);
        let percent = (percent * 10.0).round() / 10.0;
        if percent > self.progress_percent {
            self.progress_percent = percent;
        }
    }

    pub fn recompute_stats(&mut self) {
        let mut stats = StageCounters::default();
        for stage in &self.stages {
            stats.absorb(&stage.counters);
        }
        self.stats = stats;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_display() {
        assert_eq!(JobStatus::Idle.to_string(), "idle");
        assert_eq!(JobStatus::Running.to_string(), "running");
        assert_eq!(JobStatus::Completed.to_string(), "completed");
        assert_eq!(JobStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn test_job_status_from_str() {
        assert_eq!("idle".parse::<JobStatus>().unwrap(), JobStatus::Idle);
        assert_eq!("RUNNING".parse::<JobStatus>().unwrap(), JobStatus::Running);
        assert!("pending".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_job_key_round_trip() {
        let key = JobKey::scoped(JobKind::TeamEnrichment, 42);
        assert_eq!(key.id(), "team_enrichment:42");
        assert_eq!("team_enrichment:42".parse::<JobKey>().unwrap(), key);
        assert_eq!(
            "database_population".parse::<JobKey>().unwrap(),
            JobKey::global(JobKind::DatabasePopulation)
        );
        assert!("team_enrichment:".parse::<JobKey>().is_err());
        assert!("unknown".parse::<JobKey>().is_err());
    }

    #[test]
    fn test_counters_stay_balanced() {
        let mut counters = StageCounters::default();
        counters.record(ItemOutcome::Created);
        counters.record(ItemOutcome::Updated);
        counters.record(ItemOutcome::Failed);
        assert_eq!(counters.processed, 3);
        assert!(counters.is_balanced());
    }

    #[test]
    fn test_progress_never_decreases() {
        let mut state = JobState::started(JobKey::global(JobKind::DatabasePopulation), &["a", "b"]);
        state.stage_mut("a").total = Some(4);
        state.stage_mut("a").counters.processed = 2;
        state.refresh_progress();
        assert_eq!(state.progress_percent, 25.0);

        // a stage discovering more work lowers its fraction, not the overall percent
        state.stage_mut("a").total = Some(10);
        state.refresh_progress();
        assert_eq!(state.progress_percent, 25.0);
    }

    #[test]
    fn test_unknown_total_counts_only_finished_stages() {
        let mut state = JobState::started(JobKey::global(JobKind::BatchPlayers), &["a", "b"]);
        state.stage_mut("a").counters.processed = 7;
        state.refresh_progress();
        assert_eq!(state.progress_percent, 0.0);
        state.stage_mut("a").finished = true;
        state.refresh_progress();
        assert_eq!(state.progress_percent, 50.0);
    }
}
