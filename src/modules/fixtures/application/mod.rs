pub mod crawler;
pub mod match_day;

pub use crawler::{SeasonCrawler, SeasonFixtureParams};
pub use match_day::MatchDayService;
