pub mod catalog;
pub mod fixtures;
pub mod jobs;
pub mod provider;
