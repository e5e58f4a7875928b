//! Scheduled matches of single days and short date ranges.

use crate::modules::catalog::application::mapper::timestamp_to_datetime;
use crate::modules::catalog::domain::{MatchStatus, ScopeContext};
use crate::modules::fixtures::domain::season::day_start_timestamp;
use crate::modules::fixtures::domain::summary::{
    DayMatches, MatchSummary, RangeMatches, SeasonMatches, UNKNOWN_COMPETITION, UNKNOWN_COUNTRY,
};
use crate::modules::jobs::application::context::SyncContext;
use crate::modules::provider::domain::shapes::EventShape;
use crate::modules::provider::{Endpoints, Fidelity, Resource};
use crate::shared::errors::{AppError, AppResult};
use crate::{log_debug, log_info, log_warn};
use chrono::NaiveDate;

const SECONDS_PER_DAY: i64 = 86_400;
/// Ranges longer than this still run, with a warning.
const LONG_RANGE_DAYS: i64 = 31;
/// Event pages read at most for one league season.
pub const MAX_EVENT_PAGES: u32 = 10;

#[derive(Clone)]
pub struct MatchDayService {
    ctx: SyncContext,
}

impl MatchDayService {
    pub fn new(ctx: SyncContext) -> Self {
        Self { ctx }
    }

    /// Matches kicking off on `date` (UTC); optionally stored with their teams.
    pub async fn matches_for_day(&self, date: NaiveDate, save: bool) -> AppResult<DayMatches> {
        let data = self.ctx.gateway.fetch(&Resource::ScheduledEvents(date)).await?;
        let fidelity = data.fidelity;
        let events = data.payload.into_events()?;

        let day_events = events_on(&events, date);
        let endpoints = self.ctx.gateway.endpoints();
        let summaries = day_events
            .iter()
            .filter_map(|event| summarize_event(event, endpoints))
            .collect();
        let mut day = DayMatches::new(date, summaries);
        log_debug!("{}: {} of {} scheduled events kick off that day", date, day.count, events.len());

        if save {
            (day.saved, day.save_errors) = self.store_events(&day_events, fidelity).await;
        }
        Ok(day)
    }

    /// Every event of one league season, read page by page from the most recent.
    pub async fn matches_for_season(
        &self,
        tournament_id: u64,
        season_id: u64,
        season_name: &str,
        save: bool,
    ) -> AppResult<SeasonMatches> {
        let mut events: Vec<EventShape> = Vec::new();
        let mut pages = 0;
        for page in 0..MAX_EVENT_PAGES {
            if page > 0 {
                self.ctx.orchestrator.pacer().pause(self.ctx.orchestrator.pacing().batch).await;
            }
            let resource = Resource::SeasonEvents {
                tournament: tournament_id,
                season: season_id,
                page,
            };
            let chunk = match self.ctx.gateway.fetch(&resource).await {
                Ok(data) => data.payload.into_event_page()?,
                // the upstream answers 404 past the last page
                Err(AppError::NotFound(_)) if page > 0 => break,
                Err(e) => return Err(e),
            };
            pages += 1;
            let more = chunk.has_next_page && !chunk.events.is_empty();
            events.extend(chunk.events);
            if !more {
                break;
            }
        }
        events.sort_by_key(|event| (event.start_timestamp, event.id));
        events.dedup_by_key(|event| event.id);
        log_info!(
            "Tournament {} season {}: {} events over {} pages",
            tournament_id,
            season_name,
            events.len(),
            pages
        );

        let endpoints = self.ctx.gateway.endpoints();
        let matches: Vec<MatchSummary> = events
            .iter()
            .filter_map(|event| summarize_event(event, endpoints))
            .collect();
        let (saved, save_errors) = if save {
            self.store_events(&events, Fidelity::Full).await
        } else {
            (0, Vec::new())
        };

        Ok(SeasonMatches {
            tournament_id,
            season_id,
            season: season_name.to_string(),
            count: matches.len(),
            matches,
            pages,
            saved,
            save_errors,
        })
    }

    /// Store each event with its teams; failures are reported, not raised.
    async fn store_events(&self, events: &[EventShape], fidelity: Fidelity) -> (usize, Vec<String>) {
        let mut saved = 0;
        let mut errors = Vec::new();
        for event in events {
            let record = self.ctx.mapper.event(event, fidelity);
            match self
                .ctx
                .resolver
                .resolve_and_upsert(record, ScopeContext::default(), false)
                .await
            {
                Ok(_) => saved += 1,
                Err(e) => {
                    log_warn!("Could not store event {}: {}", event.id, e);
                    errors.push(format!("event {}: {}", event.id, e));
                }
            }
        }
        (saved, errors)
    }

    /// Day-by-day sweep of `[start, end]`; a failed day is recorded and skipped.
    pub async fn matches_for_range(&self, start: NaiveDate, end: NaiveDate, save: bool) -> AppResult<RangeMatches> {
        if start > end {
            return Err(AppError::ValidationError(format!(
                "Range start {} is after its end {}",
                start, end
            )));
        }
        let days = (end - start).num_days() + 1;
        if days > LONG_RANGE_DAYS {
            log_warn!("Requested {} days of matches; this will take several minutes", days);
        }

        let mut range = RangeMatches::new(start, end);
        for (index, day) in start.iter_days().take(days as usize).enumerate() {
            if index > 0 {
                self.ctx.orchestrator.pacer().pause(self.ctx.orchestrator.pacing().day).await;
            }
            match self.matches_for_day(day, save).await {
                Ok(matches) => {
                    log_info!("Day {}/{} {}: {} matches", index + 1, days, day, matches.count);
                    range.add_day(matches);
                }
                Err(e) => {
                    log_warn!("Day {} failed: {}", day, e);
                    range.add_error(day, e.to_string());
                }
            }
        }
        Ok(range)
    }
}

/// Events whose kickoff falls in `[date 00:00Z, date+1 00:00Z)`.
pub fn events_on(events: &[EventShape], date: NaiveDate) -> Vec<EventShape> {
    let from = day_start_timestamp(date);
    let to = from + SECONDS_PER_DAY;
    events
        .iter()
        .filter(|event| event.start_timestamp >= from && event.start_timestamp < to)
        .cloned()
        .collect()
}

pub fn summarize_event(event: &EventShape, endpoints: &Endpoints) -> Option<MatchSummary> {
    let datetime = timestamp_to_datetime(event.start_timestamp)?;
    Some(MatchSummary {
        id: event.id.to_string(),
        home_team: event.home_team.name.clone(),
        home_team_id: event.home_team.id.to_string(),
        home_team_logo: endpoints.team_image(event.home_team.id),
        away_team: event.away_team.name.clone(),
        away_team_id: event.away_team.id.to_string(),
        away_team_logo: endpoints.team_image(event.away_team.id),
        home_score: event.home_score.as_ref().and_then(|s| s.current),
        away_score: event.away_score.as_ref().and_then(|s| s.current),
        date: datetime.date_naive(),
        datetime,
        competition: event
            .competition_name()
            .unwrap_or(UNKNOWN_COMPETITION)
            .to_string(),
        country: event.country_name().unwrap_or(UNKNOWN_COUNTRY).to_string(),
        status: MatchStatus::from_upstream(event.status.as_ref().and_then(|s| s.status_type.as_deref())),
        round: event.round_info.as_ref().and_then(|r| r.round),
        url: endpoints.event_page(event.id),
    })
}
