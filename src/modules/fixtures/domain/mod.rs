pub mod season;
pub mod summary;

pub use season::{parse_day, partition_months, week_of, DateBlock, Season};
pub use summary::{
    BlockError, CrawlProgress, DayError, DayMatches, LeagueCount, MatchSummary, RangeMatches,
    SeasonFixture, SeasonMatches,
};
