pub mod http_client;
pub mod sofascore;

pub use http_client::{HttpTransport, RetryPolicy, UpstreamTransport};
pub use sofascore::{Endpoints, HtmlPageRenderer, PageRenderer};
