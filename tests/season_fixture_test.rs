/// Season fixture crawl and the per-day match lookups
///
/// Tests cover:
/// - a full season crawled block by block with its pauses
/// - a failing day turning its block into a recorded error
/// - detached runs through the control surface
/// - storing the matches of a date range
/// - the current week running Monday to Sunday
/// - a league's seasons and its season matches read page by page
mod utils;

use chrono::{Datelike, NaiveDate, Weekday};
use serde_json::Value;
use sofa_sync_lib::modules::catalog::EntityKind;
use sofa_sync_lib::modules::fixtures::{SeasonCrawler, SeasonFixtureParams};
use sofa_sync_lib::modules::jobs::{JobKind, JobStatus};
use sofa_sync_lib::shared::errors::AppResult;
use sofa_sync_lib::shared::utils::PacingPolicy;
use std::time::Duration;
use utils::fakes::{harness, harness_with_pacing, not_found};
use utils::payloads::{event, kickoff, scheduled_date, scheduled_events, season_events, seasons};

const BLOCK_PAUSE: Duration = Duration::from_secs(5);
const DAY_PAUSE: Duration = Duration::from_secs(2);

/// Premier League on weekdays, La Liga on Saturdays.
fn fixture_route(path: &str) -> AppResult<Value> {
    match scheduled_date(path) {
        Some(date) if date.weekday() == Weekday::Sat => Ok(scheduled_events(date, "La Liga")),
        Some(date) => Ok(scheduled_events(date, "Premier League")),
        None => Err(not_found(path)),
    }
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn params(season: &str) -> SeasonFixtureParams {
    SeasonFixtureParams {
        season: season.to_string(),
        save: false,
    }
}

// ================================================================================================
// SEASON CRAWL
// ================================================================================================

#[tokio::test]
async fn full_season_is_crawled_block_by_block() {
    let pacing = PacingPolicy {
        block: BLOCK_PAUSE,
        day: DAY_PAUSE,
        ..PacingPolicy::immediate()
    };
    let h = harness_with_pacing(fixture_route, pacing);
    let crawler = SeasonCrawler::new(h.surface.context().clone());

    let fixture = crawler.crawl_season(params("2024-2025")).await.unwrap();

    // Aug 1 2024 ..= May 31 2025, one match per day
    assert_eq!(fixture.start_date, day(2024, 8, 1));
    assert_eq!(fixture.end_date, day(2025, 5, 31));
    assert_eq!(fixture.total_matches, 304);
    assert_eq!(fixture.total_blocks, 10);
    assert_eq!(fixture.processed_blocks, 10);
    assert!(fixture.errors.is_empty());
    assert_eq!(h.transport.calls().len(), 304);

    assert_eq!(fixture.leagues_summary[0].name, "Premier League");
    assert_eq!(fixture.leagues_summary[1].name, "La Liga");
    assert_eq!(
        fixture.leagues_summary.iter().map(|l| l.count).sum::<usize>(),
        304
    );

    let pauses = h.pacer.pauses();
    assert_eq!(pauses.iter().filter(|p| **p == BLOCK_PAUSE).count(), 9);
    assert_eq!(pauses.iter().filter(|p| **p == DAY_PAUSE).count(), 294);

    let status = h.surface.job_status("season_fixture:2024-2025").unwrap();
    assert_eq!(status.status, JobStatus::Completed);
    assert_eq!(status.progress, 100.0);
    assert_eq!(status.stats.processed, 10);
    assert_eq!(status.detail["total_blocks"], 10);
    // nothing stored without save
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn failing_day_marks_its_block_and_the_crawl_goes_on() {
    let bad_day = day(2024, 9, 10);
    let h = harness(move |path| match scheduled_date(path) {
        Some(date) if date == bad_day => Err(not_found(path)),
        _ => fixture_route(path),
    });
    let crawler = SeasonCrawler::new(h.surface.context().clone());

    let fixture = crawler.crawl_season(params("2024-2025")).await.unwrap();

    assert_eq!(fixture.total_matches, 303);
    assert_eq!(fixture.processed_blocks, 10);
    assert_eq!(fixture.errors.len(), 1);
    assert_eq!(fixture.errors[0].block, 2);
    assert!(fixture.errors[0].error.starts_with("2024-09-10: "));

    let status = h.surface.job_status("season_fixture:2024-2025").unwrap();
    assert_eq!(status.status, JobStatus::Completed);
    assert_eq!(status.stats.processed, 10);
    assert_eq!(status.stats.errors, 1);
    assert_eq!(status.errors.len(), 1);
    assert!(status.errors[0].starts_with("[blocks] item #2"), "{}", status.errors[0]);
}

#[tokio::test]
async fn detached_crawl_completes_before_shutdown_returns() {
    let h = harness(fixture_route);

    let accepted = h
        .surface
        .start_job(
            JobKind::SeasonFixture,
            sofa_sync_lib::commands::JobStartParams {
                season: Some("2023-2024".into()),
                save: Some(true),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(accepted.status_endpoint, "/api/jobs/season_fixture:2023-2024/status");

    h.surface.shutdown().await;

    let status = h.surface.job_status(&accepted.job_id).unwrap();
    assert_eq!(status.status, JobStatus::Completed);
    assert!(status.end_time.is_some());
    // 2024 is a leap year: Aug 1 2023 ..= May 31 2024 holds 305 days
    assert_eq!(status.detail["total_matches"], 305);
    assert_eq!(h.store.all_of(EntityKind::Match).len(), 305);
}

#[tokio::test]
async fn malformed_season_is_rejected() {
    let h = harness(fixture_route);
    let crawler = SeasonCrawler::new(h.surface.context().clone());

    for season in ["2024", "2024-2026", "24-25", "2024/2025"] {
        let err = crawler.crawl_season(params(season)).await.unwrap_err();
        assert_eq!(err.http_status(), 400, "{}", season);
    }
    assert!(h.transport.calls().is_empty());
}

// ================================================================================================
// DAYS AND RANGES
// ================================================================================================

#[tokio::test]
async fn day_lookup_keeps_only_that_days_kickoffs() {
    let h = harness(fixture_route);

    let matches = h.surface.matches_by_date("2024-08-12", false).await.unwrap();

    assert_eq!(matches.count, 1);
    assert_eq!(matches.matches[0].home_team, "Arsenal");
    assert_eq!(matches.matches[0].competition, "Premier League");
    assert_eq!(matches.matches[0].country, "England");
    assert_eq!(matches.saved, 0);
}

#[tokio::test]
async fn range_with_save_stores_matches_and_teams() {
    let h = harness(fixture_route);

    let range = h
        .surface
        .matches_by_range("2024-08-10", "2024-08-12", true)
        .await
        .unwrap();

    assert_eq!(range.total_matches, 3);
    assert_eq!(range.matches.len(), 3);
    assert!(range.errors.is_empty());

    assert_eq!(h.store.all_of(EntityKind::Match).len(), 3);
    let mut teams: Vec<String> = h
        .store
        .all_of(EntityKind::Team)
        .into_iter()
        .filter_map(|row| row.external_id)
        .collect();
    teams.sort();
    assert_eq!(teams, vec!["1", "2"]);
    assert_eq!(h.store.all_of(EntityKind::League).len(), 1);
}

#[tokio::test]
async fn failed_day_in_range_has_no_matches() {
    let h = harness(move |path| match scheduled_date(path) {
        Some(date) if date == day(2024, 8, 11) => Err(not_found(path)),
        _ => fixture_route(path),
    });

    let range = h
        .surface
        .matches_by_range("2024-08-10", "2024-08-12", false)
        .await
        .unwrap();

    assert_eq!(range.total_matches, 2);
    assert_eq!(range.errors.len(), 1);
    assert_eq!(range.errors[0].date, day(2024, 8, 11));
    assert_eq!(range.matches[&day(2024, 8, 11)].len(), 0);
}

#[tokio::test]
async fn reversed_range_is_rejected() {
    let h = harness(fixture_route);

    let err = h
        .surface
        .matches_by_range("2024-08-12", "2024-08-10", false)
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), 400);
}

#[tokio::test]
async fn week_runs_monday_to_sunday() {
    let h = harness(fixture_route);

    let week = h.surface.week_matches(false).await.unwrap();

    assert_eq!(week.start.weekday(), Weekday::Mon);
    assert_eq!(week.end.weekday(), Weekday::Sun);
    assert_eq!((week.end - week.start).num_days(), 6);
    assert_eq!(week.matches.len(), 7);
    assert_eq!(week.total_matches, 7);
    assert_eq!(h.transport.calls().len(), 7);
}

#[tokio::test]
async fn week_of_a_date_starts_on_its_monday() {
    let h = harness(fixture_route);

    // a Wednesday
    let week = h.surface.week_matches_of("2024-08-14", false).await.unwrap();

    assert_eq!(week.start, day(2024, 8, 12));
    assert_eq!(week.end, day(2024, 8, 18));
    // the Saturday belongs to La Liga
    assert_eq!(week.matches[&day(2024, 8, 17)][0].competition, "La Liga");
}

#[tokio::test]
async fn today_reads_a_single_day() {
    let h = harness(fixture_route);

    let today = h.surface.today_matches(false).await.unwrap();

    assert_eq!(today.count, 1);
    assert_eq!(h.transport.calls().len(), 1);
}

// ================================================================================================
// LEAGUE SEASONS
// ================================================================================================

const SEASONS_PATH: &str = "/unique-tournament/17/seasons";
const CURRENT_PAGE: &str = "/unique-tournament/17/season/61627/events/last";

fn derby(id: u64, date: NaiveDate) -> Value {
    event(id, kickoff(date, 16), (1, "Arsenal"), (2, "Chelsea"), "Premier League")
}

/// Two pages of the current season; the second repeats the first page's last match.
fn league_route(path: &str) -> AppResult<Value> {
    match path {
        SEASONS_PATH => Ok(seasons()),
        p if p == format!("{}/0", CURRENT_PAGE) => Ok(season_events(
            vec![derby(3, day(2025, 3, 1)), derby(2, day(2025, 2, 1))],
            true,
        )),
        p if p == format!("{}/1", CURRENT_PAGE) => Ok(season_events(
            vec![derby(2, day(2025, 2, 1)), derby(1, day(2025, 1, 1))],
            false,
        )),
        _ => Err(not_found(path)),
    }
}

#[tokio::test]
async fn seasons_are_listed_most_recent_first() {
    let h = harness(league_route);

    let view = h.surface.seasons("EPL").await.unwrap();

    assert_eq!(view.tournament_id, 17);
    assert_eq!(view.league.as_deref(), Some("EPL"));
    assert_eq!(view.seasons.len(), 2);
    assert_eq!(view.seasons[0].id, 61627);
}

#[tokio::test]
async fn league_matches_follow_the_pages() {
    let h = harness_with_pacing(
        league_route,
        PacingPolicy {
            batch: BLOCK_PAUSE,
            ..PacingPolicy::immediate()
        },
    );

    let season = h.surface.league_matches("EPL", None, true).await.unwrap();

    assert_eq!(season.season_id, 61627);
    assert_eq!(season.pages, 2);
    assert_eq!(season.count, 3);
    let ids: Vec<&str> = season.matches.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
    assert_eq!(season.saved, 3);
    assert_eq!(h.store.all_of(EntityKind::Match).len(), 3);
    // one pause between the two pages
    assert_eq!(h.pacer.pauses().iter().filter(|p| **p == BLOCK_PAUSE).count(), 1);
}

#[tokio::test]
async fn missing_page_ends_the_season() {
    let h = harness(|path| match path {
        SEASONS_PATH => Ok(seasons()),
        p if p == format!("{}/0", CURRENT_PAGE) => {
            Ok(season_events(vec![derby(7, day(2025, 4, 1))], true))
        }
        _ => Err(not_found(path)),
    });

    let season = h.surface.league_matches("17", Some("24/25"), false).await.unwrap();

    assert_eq!(season.pages, 1);
    assert_eq!(season.count, 1);
    assert_eq!(season.saved, 0);
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn unknown_league_is_rejected_before_any_call() {
    let h = harness(league_route);

    let err = h.surface.seasons("Sunday League").await.unwrap_err();
    assert_eq!(err.http_status(), 400);
    let err = h.surface.league_matches("Sunday League", None, false).await.unwrap_err();
    assert_eq!(err.http_status(), 400);
    assert!(h.transport.calls().is_empty());
}
