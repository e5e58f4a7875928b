use super::season::DateBlock;
use crate::modules::catalog::domain::MatchStatus;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const UNKNOWN_COMPETITION: &str = "Unknown";
pub const UNKNOWN_COUNTRY: &str = "Unknown";

/// Flat view of one scheduled event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub id: String,
    pub home_team: String,
    pub home_team_id: String,
    pub home_team_logo: String,
    pub away_team: String,
    pub away_team_id: String,
    pub away_team_logo: String,
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
    pub date: NaiveDate,
    pub datetime: DateTime<Utc>,
    pub competition: String,
    pub country: String,
    pub status: MatchStatus,
    pub round: Option<i64>,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayMatches {
    pub date: NaiveDate,
    pub matches: Vec<MatchSummary>,
    pub count: usize,
    /// Sorted, distinct
    pub competitions: Vec<String>,
    /// Matches written to the store when saving was requested
    pub saved: usize,
    pub save_errors: Vec<String>,
}

impl DayMatches {
    pub fn new(date: NaiveDate, matches: Vec<MatchSummary>) -> Self {
        let mut competitions: Vec<String> = matches.iter().map(|m| m.competition.clone()).collect();
        competitions.sort();
        competitions.dedup();
        Self {
            date,
            count: matches.len(),
            matches,
            competitions,
            saved: 0,
            save_errors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayError {
    pub date: NaiveDate,
    pub error: String,
}

/// Matches of a date range, keyed by day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeMatches {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub matches: BTreeMap<NaiveDate, Vec<MatchSummary>>,
    pub total_matches: usize,
    pub errors: Vec<DayError>,
}

impl RangeMatches {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end,
            matches: BTreeMap::new(),
            total_matches: 0,
            errors: Vec::new(),
        }
    }

    pub fn add_day(&mut self, day: DayMatches) {
        self.total_matches += day.count;
        self.matches.insert(day.date, day.matches);
    }

    pub fn add_error(&mut self, date: NaiveDate, error: String) {
        self.matches.insert(date, Vec::new());
        self.errors.push(DayError { date, error });
    }
}

/// Every match of one league season, oldest kickoff first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonMatches {
    pub tournament_id: u64,
    pub season_id: u64,
    pub season: String,
    pub matches: Vec<MatchSummary>,
    pub count: usize,
    /// Event pages read from the upstream
    pub pages: u32,
    pub saved: usize,
    pub save_errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitionMatches {
    pub name: String,
    pub matches: Vec<MatchSummary>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeagueCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockError {
    pub block: usize,
    pub dates: DateBlock,
    pub error: String,
}

/// Everything one season crawl found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonFixture {
    pub season: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub leagues: BTreeMap<String, CompetitionMatches>,
    pub leagues_summary: Vec<LeagueCount>,
    pub total_matches: usize,
    pub processed_blocks: usize,
    pub total_blocks: usize,
    pub errors: Vec<BlockError>,
}

impl SeasonFixture {
    pub fn new(season: String, start_date: NaiveDate, end_date: NaiveDate, total_blocks: usize) -> Self {
        Self {
            season,
            start_date,
            end_date,
            leagues: BTreeMap::new(),
            leagues_summary: Vec::new(),
            total_matches: 0,
            processed_blocks: 0,
            total_blocks,
            errors: Vec::new(),
        }
    }

    /// Group a block's matches under their competition.
    pub fn absorb(&mut self, range: RangeMatches) {
        for summary in range.matches.into_values().flatten() {
            let group = self
                .leagues
                .entry(summary.competition.clone())
                .or_insert_with(|| CompetitionMatches {
                    name: summary.competition.clone(),
                    matches: Vec::new(),
                    count: 0,
                });
            group.matches.push(summary);
            group.count += 1;
            self.total_matches += 1;
        }
    }

    /// Whole-percent share of blocks done.
    pub fn progress(&self) -> u32 {
        if self.total_blocks == 0 {
            return 100;
        }
        ((self.processed_blocks as f64 / self.total_blocks as f64) * 100.0).round() as u32
    }

    /// Competitions by match count, busiest first; ties by name.
    pub fn summarize(&mut self) {
        let mut summary: Vec<LeagueCount> = self
            .leagues
            .values()
            .map(|league| LeagueCount {
                name: league.name.clone(),
                count: league.count,
            })
            .collect();
        summary.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
        self.leagues_summary = summary;
    }
}

/// Progress snapshot published on the job while the crawl runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrawlProgress {
    pub season: String,
    pub processed_blocks: usize,
    pub total_blocks: usize,
    pub total_matches: usize,
    pub progress: u32,
    pub leagues_summary: Vec<LeagueCount>,
    pub errors: Vec<BlockError>,
}

impl From<&SeasonFixture> for CrawlProgress {
    fn from(fixture: &SeasonFixture) -> Self {
        Self {
            season: fixture.season.clone(),
            processed_blocks: fixture.processed_blocks,
            total_blocks: fixture.total_blocks,
            total_matches: fixture.total_matches,
            progress: fixture.progress(),
            leagues_summary: fixture.leagues_summary.clone(),
            errors: fixture.errors.clone(),
        }
    }
}
