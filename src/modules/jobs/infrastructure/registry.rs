/// Process-wide table of job states
///
/// Only a [`JobHandle`] mutates a slot; readers get cloned snapshots.
use crate::modules::jobs::domain::entities::{ItemOutcome, JobKey, JobState, JobStatus};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::LogContext;
use crate::{log_info, log_warn};
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<DashMap<String, JobState>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for `key` unless a run with the same id is in progress.
    pub fn try_start(&self, key: JobKey, stages: &[&str]) -> AppResult<JobHandle> {
        let id = key.id();
        match self.jobs.entry(id.clone()) {
            Entry::Occupied(entry) if entry.get().is_running() => {
                let running = entry.get();
                Err(AppError::Conflict(format!(
                    "Job {} is already running ({:.1}% done, stage {})",
                    id,
                    running.progress_percent,
                    running.current_stage.as_deref().unwrap_or("-")
                )))
            }
            Entry::Occupied(mut entry) => {
                entry.insert(JobState::started(key, stages));
                log_info!("Job {} restarted", id);
                Ok(self.handle(id))
            }
            Entry::Vacant(entry) => {
                entry.insert(JobState::started(key, stages));
                log_info!("Job {} started", id);
                Ok(self.handle(id))
            }
        }
    }

    fn handle(&self, id: String) -> JobHandle {
        JobHandle {
            jobs: self.jobs.clone(),
            id,
        }
    }

    pub fn snapshot(&self, id: &str) -> Option<JobState> {
        self.jobs.get(id).map(|state| state.clone())
    }

    pub fn is_running(&self, id: &str) -> bool {
        self.jobs
            .get(id)
            .map(|state| state.is_running())
            .unwrap_or(false)
    }

    /// All known jobs, ordered by id.
    pub fn list(&self) -> Vec<JobState> {
        let mut jobs: Vec<JobState> = self.jobs.iter().map(|entry| entry.value().clone()).collect();
        jobs.sort_by(|a, b| a.key.id().cmp(&b.key.id()));
        jobs
    }
}

/// Write access to one running job.
#[derive(Debug, Clone)]
pub struct JobHandle {
    jobs: Arc<DashMap<String, JobState>>,
    id: String,
}

impl JobHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    fn update<R>(&self, f: impl FnOnce(&mut JobState) -> R) -> Option<R> {
        self.jobs.get_mut(&self.id).map(|mut state| f(&mut state))
    }

    pub fn snapshot(&self) -> Option<JobState> {
        self.jobs.get(&self.id).map(|state| state.clone())
    }

    /// Enter `stage`, announcing how many items it holds once that is known.
    pub fn begin_stage(&self, stage: &str, total: Option<usize>) {
        self.update(|state| {
            state.current_stage = Some(stage.to_string());
            state.current_item = None;
            let progress = state.stage_mut(stage);
            progress.finished = false;
            if let Some(total) = total {
                progress.total = Some(total.max(progress.counters.processed));
            }
            state.refresh_progress();
        });
    }

    pub fn set_current_item(&self, label: &str) {
        self.update(|state| state.current_item = Some(label.to_string()));
    }

    /// Count one item; failures also append `error` to the job's error list.
    pub fn record(&self, stage: &str, outcome: ItemOutcome, error: Option<String>) {
        self.update(|state| {
            state.stage_mut(stage).counters.record(outcome);
            if let Some(error) = error {
                state.errors.push(error);
            }
            state.recompute_stats();
            state.refresh_progress();

            let progress = state.stage_mut(stage);
            let (processed, total) = (progress.counters.processed, progress.total);
            LogContext::job_progress(&self.id, stage, processed, total);
        });
    }

    pub fn push_error(&self, error: String) {
        self.update(|state| state.errors.push(error));
    }

    pub fn finish_stage(&self, stage: &str) {
        self.update(|state| {
            state.stage_mut(stage).finished = true;
            state.current_item = None;
            state.refresh_progress();
        });
    }

    pub fn set_detail<T: Serialize>(&self, detail: &T) {
        match serde_json::to_value(detail) {
            Ok(value) => {
                self.update(|state| state.detail = value);
            }
            Err(e) => log_warn!("Job {}: detail not serializable: {}", self.id, e),
        }
    }

    pub fn complete(&self) {
        self.update(|state| {
            for stage in state.stages.iter_mut() {
                stage.finished = true;
            }
            state.status = JobStatus::Completed;
            state.progress_percent = 100.0;
            state.current_item = None;
            state.end_time = Some(Utc::now());
            log_info!(
                "Job {} completed: {} processed, {} errors",
                self.id,
                state.stats.processed,
                state.stats.errors
            );
        });
    }

    /// Terminal failure: something outside any item loop went wrong.
    pub fn fail(&self, error: &AppError) {
        self.update(|state| {
            state.status = JobStatus::Failed;
            state.errors.push(error.to_string());
            state.current_item = None;
            state.end_time = Some(Utc::now());
        });
        LogContext::error_with_context(error, &format!("job {}", self.id));
    }
}
