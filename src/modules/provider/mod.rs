//! Fetch gateway: dual-strategy retrieval of upstream resources.
//!
//! - Domain: resource descriptors, typed upstream shapes, parsed payloads
//! - Infrastructure: rate-limited HTTP transport, retry policy, HTML page fallback
//! - Application: the gateway state machine tying them together
pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::FetchGateway;
pub use domain::{Fidelity, ParsedData, Payload, Resource};
pub use infrastructure::{
    Endpoints, HtmlPageRenderer, HttpTransport, PageRenderer, RetryPolicy, UpstreamTransport,
};
