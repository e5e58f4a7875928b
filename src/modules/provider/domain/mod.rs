pub mod parsed;
pub mod resource;
pub mod shapes;

pub use parsed::{Fidelity, ParsedData, Payload};
pub use resource::{Host, Resource};
