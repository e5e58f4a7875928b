pub mod entities;

pub use entities::{
    ItemOutcome, JobKey, JobKind, JobState, JobStatus, StageCounters, StageProgress,
};
