pub mod context;
pub mod orchestrator;
pub mod pipelines;
pub mod steps;

pub use context::SyncContext;
pub use orchestrator::{item_error, ListStage, Orchestrator, Stage};
pub use pipelines::{
    drive, AllTeamsParams, BatchPlayersParams, JobRequest, JobRunner, LeaguePlayersParams,
    PopulationParams, TeamEnrichmentParams,
};
