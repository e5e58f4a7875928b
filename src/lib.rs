pub mod commands;
pub mod modules;
mod schema;
pub mod shared;

pub use commands::{Accepted, ControlSurface, JobStartParams, JobStatusView};
pub use shared::{AppConfig, AppError, AppResult};
