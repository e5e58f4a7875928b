use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One retrievable upstream resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "resource", content = "params", rename_all = "snake_case")]
pub enum Resource {
    Team(u64),
    TeamPlayers(u64),
    Player(u64),
    PlayerTransfers(u64),
    Event(u64),
    EventLineups(u64),
    ScheduledEvents(NaiveDate),
    Tournament(u64),
    TournamentSeasons(u64),
    Standings { tournament: u64, season: u64 },
    TopPlayers { tournament: u64, season: u64 },
    /// Past events of a season, `page` counted from the most recent
    SeasonEvents { tournament: u64, season: u64, page: u32 },
    Categories,
    SearchPlayers(String),
}

/// Which host a JSON path is relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Host {
    Api,
    Web,
}

impl Resource {
    /// Host and path of the structured JSON endpoint.
    pub fn api_path(&self) -> (Host, String) {
        match self {
            Resource::Team(id) => (Host::Api, format!("/team/{}", id)),
            Resource::TeamPlayers(id) => (Host::Api, format!("/team/{}/players", id)),
            Resource::Player(id) => (Host::Api, format!("/player/{}", id)),
            Resource::PlayerTransfers(id) => {
                (Host::Api, format!("/player/{}/transfer-history", id))
            }
            Resource::Event(id) => (Host::Api, format!("/event/{}", id)),
            Resource::EventLineups(id) => (Host::Api, format!("/event/{}/lineups", id)),
            Resource::ScheduledEvents(date) => (
                Host::Web,
                format!(
                    "/api/v1/sport/football/scheduled-events/{}",
                    date.format("%Y-%m-%d")
                ),
            ),
            Resource::Tournament(id) => (Host::Api, format!("/unique-tournament/{}", id)),
            Resource::TournamentSeasons(id) => {
                (Host::Api, format!("/unique-tournament/{}/seasons", id))
            }
            Resource::Standings { tournament, season } => (
                Host::Api,
                format!(
                    "/unique-tournament/{}/season/{}/standings/total",
                    tournament, season
                ),
            ),
            Resource::TopPlayers { tournament, season } => (
                Host::Api,
                format!(
                    "/unique-tournament/{}/season/{}/top-players/overall",
                    tournament, season
                ),
            ),
            Resource::SeasonEvents {
                tournament,
                season,
                page,
            } => (
                Host::Api,
                format!(
                    "/unique-tournament/{}/season/{}/events/last/{}",
                    tournament, season, page
                ),
            ),
            Resource::Categories => (Host::Api, "/sport/football/categories".to_string()),
            Resource::SearchPlayers(query) => (
                Host::Api,
                format!("/search/players/{}", urlencoding::encode(query.trim())),
            ),
        }
    }

    /// Path of the HTML page carrying the same entity, if there is one.
    pub fn page_path(&self) -> Option<String> {
        match self {
            Resource::Team(id) | Resource::TeamPlayers(id) => {
                Some(format!("/team/football/{}", id))
            }
            Resource::Player(id) => Some(format!("/player/{}", id)),
            Resource::Event(id) => Some(format!("/event/{}", id)),
            _ => None,
        }
    }

    /// CSS selector whose presence signals the page finished rendering.
    pub fn content_selector(&self) -> Option<&'static str> {
        match self {
            Resource::TeamPlayers(_) => Some("a[href*=\"/player/\"]"),
            Resource::Team(_) | Resource::Player(_) | Resource::Event(_) => Some("h1"),
            _ => None,
        }
    }

    pub fn has_fallback(&self) -> bool {
        self.page_path().is_some()
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Team(id) => write!(f, "team {}", id),
            Resource::TeamPlayers(id) => write!(f, "team {} players", id),
            Resource::Player(id) => write!(f, "player {}", id),
            Resource::PlayerTransfers(id) => write!(f, "player {} transfers", id),
            Resource::Event(id) => write!(f, "event {}", id),
            Resource::EventLineups(id) => write!(f, "event {} lineups", id),
            Resource::ScheduledEvents(date) => write!(f, "scheduled events {}", date),
            Resource::Tournament(id) => write!(f, "tournament {}", id),
            Resource::TournamentSeasons(id) => write!(f, "tournament {} seasons", id),
            Resource::Standings { tournament, season } => {
                write!(f, "standings {}/{}", tournament, season)
            }
            Resource::TopPlayers { tournament, season } => {
                write!(f, "top players {}/{}", tournament, season)
            }
            Resource::SeasonEvents {
                tournament,
                season,
                page,
            } => write!(f, "season events {}/{} page {}", tournament, season, page),
            Resource::Categories => write!(f, "categories"),
            Resource::SearchPlayers(query) => write!(f, "player search '{}'", query),
        }
    }
}
