//! Secondary retrieval path: the public HTML pages.
//!
//! The server-rendered page is downloaded once and fields are pulled out with
//! DOM queries. A page without its content selector is a parse failure; the
//! body is static, so fetching it again would not change the answer.
//! Whatever comes back is a strict subset of what the JSON API offers.

use crate::modules::provider::domain::shapes::{
    CountryShape, EventShape, NamedShape, PlayerShape, SquadEntryShape, StadiumShape, TeamShape,
    VenueShape,
};
use crate::modules::provider::domain::{Payload, Resource};
use crate::modules::provider::infrastructure::http_client::UpstreamTransport;
use crate::shared::errors::{AppError, AppResult};
use crate::{log_debug, log_info};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};

#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Load `url` and extract the payload `resource` would have produced.
    async fn render(&self, resource: &Resource, url: &str) -> AppResult<Payload>;
}

pub struct HtmlPageRenderer {
    transport: Arc<dyn UpstreamTransport>,
}

impl HtmlPageRenderer {
    pub fn new(transport: Arc<dyn UpstreamTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl PageRenderer for HtmlPageRenderer {
    async fn render(&self, resource: &Resource, url: &str) -> AppResult<Payload> {
        let selector = resource.content_selector().ok_or_else(|| {
            AppError::ParseError(format!("No page extraction defined for {}", resource))
        })?;

        let html = self.transport.get_html(url).await?;
        // `Html` is not Send, so parsing stays out of any await
        match extract(resource, &html, selector) {
            Some(result) => {
                log_info!("Page fallback extracted {} from {}", resource, url);
                result
            }
            None => {
                log_debug!("Selector '{}' missing on {}", selector, url);
                Err(AppError::ParseError(format!(
                    "Selector '{}' not present on {}",
                    selector, url
                )))
            }
        }
    }
}

fn h1() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("h1").expect("static selector"))
}

fn dt() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("dt").expect("static selector"))
}

fn dd() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("dd").expect("static selector"))
}

fn player_links() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("a[href*=\"/player/\"]").expect("static selector"))
}

fn team_links() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("a[href*=\"/team/\"]").expect("static selector"))
}

fn time_tag() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("time[datetime]").expect("static selector"))
}

fn player_href_id() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"/player/(?:[^/?#]+/)?(\d+)").expect("static pattern"))
}

fn team_href_id() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"/team/(?:football/)?(?:[^/?#]+/)?(\d+)").expect("static pattern")
    })
}

/// `None` while the content selector is absent.
fn extract(resource: &Resource, html: &str, content_selector: &str) -> Option<AppResult<Payload>> {
    let document = Html::parse_document(html);
    let ready = Selector::parse(content_selector)
        .map(|s| document.select(&s).next().is_some())
        .unwrap_or(false);
    if !ready {
        return None;
    }

    Some(match resource {
        Resource::Player(id) => extract_player(&document, *id).map(Payload::Player),
        Resource::Team(id) => extract_team(&document, *id).map(Payload::Team),
        Resource::TeamPlayers(id) => extract_squad(&document, *id).map(Payload::Squad),
        Resource::Event(id) => extract_event(&document, *id).map(Payload::Event),
        other => Err(AppError::ParseError(format!(
            "No page extraction defined for {}",
            other
        ))),
    })
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn heading(document: &Html) -> Option<String> {
    document
        .select(h1())
        .next()
        .map(element_text)
        .filter(|text| !text.is_empty())
}

/// Labelled facts from `dt`/`dd` pairs, keyed by snake_cased label.
fn info_rows(document: &Html) -> HashMap<String, String> {
    document
        .select(dt())
        .map(element_text)
        .zip(document.select(dd()).map(element_text))
        .filter(|(label, value)| !label.is_empty() && !value.is_empty())
        .map(|(label, value)| {
            let key = label
                .to_lowercase()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join("_");
            (key, value)
        })
        .collect()
}

fn leading_number(text: Option<&String>) -> Option<i64> {
    let digits: String = text?
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

fn parse_birth_date(text: Option<&String>) -> Option<i64> {
    let text = text?.trim();
    // "12 Jun 1998 (26 yrs)" style values carry a suffix
    let head = text.split('(').next().unwrap_or(text).trim();
    ["%d %b %Y", "%Y-%m-%d", "%d/%m/%Y", "%b %d, %Y"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(head, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
}

fn first_fact<'a>(facts: &'a HashMap<String, String>, keys: &[&str]) -> Option<&'a String> {
    keys.iter().find_map(|key| facts.get(*key))
}

fn extract_player(document: &Html, id: u64) -> AppResult<PlayerShape> {
    let name = heading(document)
        .ok_or_else(|| AppError::ParseError(format!("Player page {} has no heading", id)))?;
    let facts = info_rows(document);

    let mut player = PlayerShape::bare(id, name);
    player.position = first_fact(&facts, &["position"]).cloned();
    player.height = leading_number(first_fact(&facts, &["height"]));
    player.jersey_number = leading_number(first_fact(&facts, &["jersey_number", "shirt_number"]));
    player.preferred_foot = first_fact(&facts, &["preferred_foot", "foot"]).cloned();
    player.date_of_birth_timestamp = parse_birth_date(first_fact(&facts, &["date_of_birth", "born"]));
    player.country = first_fact(&facts, &["nationality", "country"]).map(|name| CountryShape {
        name: Some(name.clone()),
        ..CountryShape::default()
    });
    Ok(player)
}

fn extract_team(document: &Html, id: u64) -> AppResult<TeamShape> {
    let name = heading(document)
        .ok_or_else(|| AppError::ParseError(format!("Team page {} has no heading", id)))?;
    let facts = info_rows(document);

    let mut team = TeamShape::bare(id, name);
    team.manager = first_fact(&facts, &["manager", "coach"]).map(|name| NamedShape {
        name: Some(name.clone()),
    });
    team.country = first_fact(&facts, &["country"]).map(|name| CountryShape {
        name: Some(name.clone()),
        ..CountryShape::default()
    });
    let stadium = first_fact(&facts, &["stadium", "venue"]).cloned();
    let city = first_fact(&facts, &["city"]).cloned();
    let capacity = leading_number(first_fact(&facts, &["capacity"]));
    if stadium.is_some() || city.is_some() {
        team.venue = Some(VenueShape {
            city: city.map(|name| NamedShape { name: Some(name) }),
            stadium: Some(StadiumShape {
                name: stadium,
                capacity,
            }),
        });
    }
    Ok(team)
}

fn extract_squad(document: &Html, team_id: u64) -> AppResult<Vec<SquadEntryShape>> {
    let mut seen = HashSet::new();
    let squad: Vec<SquadEntryShape> = document
        .select(player_links())
        .filter_map(|anchor| {
            let href = anchor.value().attr("href")?;
            let id: u64 = player_href_id().captures(href)?.get(1)?.as_str().parse().ok()?;
            let name = element_text(anchor);
            if name.is_empty() || !seen.insert(id) {
                return None;
            }
            Some(SquadEntryShape {
                player: PlayerShape::bare(id, name),
                jersey_number: None,
            })
        })
        .collect();

    if squad.is_empty() {
        return Err(AppError::ParseError(format!(
            "Team page {} lists no players",
            team_id
        )));
    }
    Ok(squad)
}

fn extract_event(document: &Html, id: u64) -> AppResult<EventShape> {
    let title = heading(document)
        .ok_or_else(|| AppError::ParseError(format!("Event page {} has no heading", id)))?;
    let (home_name, away_name) = title
        .split_once(" - ")
        .or_else(|| title.split_once(" vs "))
        .map(|(h, a)| (h.trim().to_string(), a.trim().to_string()))
        .ok_or_else(|| {
            AppError::ParseError(format!("Cannot split teams from event title '{}'", title))
        })?;

    let mut team_ids = Vec::new();
    for anchor in document.select(team_links()) {
        let parsed = anchor
            .value()
            .attr("href")
            .and_then(|href| team_href_id().captures(href))
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u64>().ok());
        if let Some(team_id) = parsed {
            if !team_ids.contains(&team_id) {
                team_ids.push(team_id);
            }
        }
    }
    let (home_id, away_id) = match team_ids.as_slice() {
        [home, away, ..] => (*home, *away),
        _ => {
            return Err(AppError::ParseError(format!(
                "Event page {} does not link both teams",
                id
            )))
        }
    };

    let start_timestamp = document
        .select(time_tag())
        .find_map(|t| t.value().attr("datetime"))
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.timestamp())
        .ok_or_else(|| AppError::ParseError(format!("Event page {} has no kickoff time", id)))?;

    Ok(EventShape {
        id,
        start_timestamp,
        home_team: TeamShape::bare(home_id, home_name),
        away_team: TeamShape::bare(away_id, away_name),
        status: None,
        home_score: None,
        away_score: None,
        tournament: None,
        round_info: None,
        season: None,
        venue: None,
        referee: None,
        attendance: None,
    })
}
