/// Season fixture crawling
///
/// Architecture:
/// - Domain: seasons, date blocks, match summaries and crawl results
/// - Application: per-day retrieval and the block-by-block season crawler
pub mod application;
pub mod domain;

pub use application::{MatchDayService, SeasonCrawler, SeasonFixtureParams};
pub use domain::{
    DateBlock, DayMatches, MatchSummary, RangeMatches, Season, SeasonFixture, SeasonMatches,
};
