pub mod registry;

pub use registry::{JobHandle, JobRegistry};
