pub mod endpoints;
pub mod page_renderer;

pub use endpoints::Endpoints;
pub use page_renderer::{HtmlPageRenderer, PageRenderer};
