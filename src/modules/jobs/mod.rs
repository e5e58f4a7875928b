/// Long-running job system
///
/// Runs multi-stage enrichment sweeps detached from the request that started
/// them, for example team enrichment, league players and database population.
///
/// Architecture:
/// - Domain: job keys, states, stage counters
/// - Infrastructure: the in-process job registry
/// - Application: the stage orchestrator, pipeline steps and the job runner
pub mod application;
pub mod domain;
pub mod infrastructure;

// Re-exports for easy access
pub use application::{JobRequest, JobRunner, ListStage, Orchestrator, Stage, SyncContext};
pub use domain::{ItemOutcome, JobKey, JobKind, JobState, JobStatus, StageCounters, StageProgress};
pub use infrastructure::{JobHandle, JobRegistry};
