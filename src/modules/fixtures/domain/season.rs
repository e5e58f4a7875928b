use crate::shared::errors::{AppError, AppResult};
use chrono::{Datelike, Days, Months, NaiveDate, NaiveTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

fn season_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{4}-\d{4}$").expect("valid season pattern"))
}

/// A European football season, `YYYY-YYYY` with consecutive years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Season {
    start_year: i32,
}

impl Season {
    pub fn parse(raw: &str) -> AppResult<Self> {
        let raw = raw.trim();
        if !season_pattern().is_match(raw) {
            return Err(AppError::ValidationError(format!(
                "Invalid season '{}': expected YYYY-YYYY",
                raw
            )));
        }

        let (first, second) = raw
            .split_once('-')
            .ok_or_else(|| AppError::ValidationError(format!("Invalid season '{}'", raw)))?;
        let start_year: i32 = first.parse()?;
        let end_year: i32 = second.parse()?;
        if end_year != start_year + 1 {
            return Err(AppError::ValidationError(format!(
                "Invalid season '{}': years must be consecutive",
                raw
            )));
        }
        Ok(Self { start_year })
    }

    pub fn start_year(&self) -> i32 {
        self.start_year
    }

    /// August 1 of the first year.
    pub fn start(&self) -> AppResult<NaiveDate> {
        ymd(self.start_year, 8, 1)
    }

    /// May 31 of the second year.
    pub fn end(&self) -> AppResult<NaiveDate> {
        ymd(self.start_year + 1, 5, 31)
    }

    pub fn blocks(&self) -> AppResult<Vec<DateBlock>> {
        partition_months(self.start()?, self.end()?)
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start_year, self.start_year + 1)
    }
}

fn ymd(year: i32, month: u32, day: u32) -> AppResult<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| AppError::ValidationError(format!("Invalid date {}-{:02}-{:02}", year, month, day)))
}

/// Inclusive run of days crawled as one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateBlock {
    /// 1-based position within the season
    pub index: usize,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateBlock {
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        self.start.iter_days().take_while({
            let end = self.end;
            move |day| *day <= end
        })
    }

    pub fn len_days(&self) -> usize {
        (self.end - self.start).num_days() as usize + 1
    }
}

impl fmt::Display for DateBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Split `[start, end]` into month-long blocks.
///
/// A block ends the day before the same day of the following month; the last
/// block is cut at `end`. Blocks are contiguous and never overlap.
pub fn partition_months(start: NaiveDate, end: NaiveDate) -> AppResult<Vec<DateBlock>> {
    if start > end {
        return Err(AppError::ValidationError(format!(
            "Range start {} is after its end {}",
            start, end
        )));
    }

    let mut blocks = Vec::new();
    let mut block_start = start;
    while block_start <= end {
        let next = block_start
            .checked_add_months(Months::new(1))
            .ok_or_else(|| AppError::ValidationError(format!("Date out of range after {}", block_start)))?;
        let block_end = match next.checked_sub_days(Days::new(1)) {
            Some(day) if day < end => day,
            _ => end,
        };
        blocks.push(DateBlock {
            index: blocks.len() + 1,
            start: block_start,
            end: block_end,
        });
        block_start = next;
    }
    Ok(blocks)
}

/// `YYYY-MM-DD`
pub fn parse_day(raw: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        AppError::ValidationError(format!("Invalid date '{}': expected YYYY-MM-DD", raw))
    })
}

/// Monday and Sunday of the week holding `day`.
pub fn week_of(day: NaiveDate) -> (NaiveDate, NaiveDate) {
    let monday = day - Days::new(u64::from(day.weekday().num_days_from_monday()));
    (monday, monday + Days::new(6))
}

/// Seconds since the epoch at 00:00 UTC of `day`.
pub fn day_start_timestamp(day: NaiveDate) -> i64 {
    day.and_time(NaiveTime::MIN).and_utc().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_week_runs_monday_to_sunday() {
        assert_eq!(week_of(day(2024, 8, 14)), (day(2024, 8, 12), day(2024, 8, 18)));
        assert_eq!(week_of(day(2024, 8, 12)), (day(2024, 8, 12), day(2024, 8, 18)));
        // across a month boundary
        assert_eq!(week_of(day(2024, 9, 1)), (day(2024, 8, 26), day(2024, 9, 1)));
    }

    #[test]
    fn test_parse_season() {
        let season = Season::parse("2024-2025").unwrap();
        assert_eq!(season.start_year(), 2024);
        assert_eq!(season.to_string(), "2024-2025");
        assert_eq!(season.start().unwrap(), day(2024, 8, 1));
        assert_eq!(season.end().unwrap(), day(2025, 5, 31));
    }

    #[test]
    fn test_parse_rejects_bad_seasons() {
        for raw in ["2024", "2024-2026", "2025-2024", "24-25", "2024/2025", ""] {
            assert!(
                matches!(Season::parse(raw), Err(AppError::ValidationError(_))),
                "{} should be rejected",
                raw
            );
        }
    }

    #[test]
    fn test_season_blocks_cover_range_exactly() {
        let blocks = Season::parse("2024-2025").unwrap().blocks().unwrap();
        assert_eq!(blocks.len(), 10);
        assert_eq!(blocks[0].start, day(2024, 8, 1));
        assert_eq!(blocks[0].end, day(2024, 8, 31));
        assert_eq!(blocks[6].start, day(2025, 2, 1));
        assert_eq!(blocks[6].end, day(2025, 2, 28));
        assert_eq!(blocks[9].end, day(2025, 5, 31));

        for pair in blocks.windows(2) {
            assert_eq!(pair[0].end.succ_opt().unwrap(), pair[1].start);
        }
        let days: usize = blocks.iter().map(DateBlock::len_days).sum();
        assert_eq!(days, 304);
        assert_eq!(blocks.iter().map(|b| b.index).collect::<Vec<_>>(), (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn test_partial_final_block() {
        let blocks = partition_months(day(2024, 1, 15), day(2024, 3, 3)).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].end, day(2024, 2, 14));
        assert_eq!(blocks[1].start, day(2024, 2, 15));
        assert_eq!(blocks[1].end, day(2024, 3, 3));
    }

    #[test]
    fn test_block_days() {
        let block = DateBlock {
            index: 1,
            start: day(2024, 12, 30),
            end: day(2025, 1, 2),
        };
        assert_eq!(block.days().count(), 4);
        assert_eq!(block.len_days(), 4);
    }

    #[test]
    fn test_day_helpers() {
        assert_eq!(parse_day("2024-08-17").unwrap(), day(2024, 8, 17));
        assert!(parse_day("17/08/2024").is_err());
        assert_eq!(day_start_timestamp(day(1970, 1, 2)), 86_400);
    }
}
