use super::resource::Resource;
use super::shapes::*;
use crate::shared::errors::{AppError, AppResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How complete the returned data is expected to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fidelity {
    /// Structured API response
    Full,
    /// Scraped from the HTML page; optional fields are usually missing
    Degraded,
}

impl Fidelity {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Fidelity::Degraded)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Payload {
    Team(TeamShape),
    Squad(Vec<SquadEntryShape>),
    Player(PlayerShape),
    Transfers(Vec<TransferShape>),
    Event(EventShape),
    Events(Vec<EventShape>),
    EventPage(EventPageShape),
    Lineups(LineupsShape),
    Tournament(UniqueTournamentShape),
    Seasons(Vec<SeasonShape>),
    Standings(Vec<StandingTableShape>),
    TopPlayers(TopPlayersShape),
    Categories(Vec<CategoryShape>),
    PlayerSearch(Vec<PlayerShape>),
}

/// Result of one gateway fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedData {
    pub resource: Resource,
    pub payload: Payload,
    pub fidelity: Fidelity,
    /// Requests made on the structured path, including the first one
    pub api_attempts: u32,
}

fn decode<T: DeserializeOwned>(resource: &Resource, value: Value) -> AppResult<T> {
    serde_json::from_value(value)
        .map_err(|e| AppError::ParseError(format!("Unexpected shape for {}: {}", resource, e)))
}

fn require_name(resource: &Resource, what: &str, name: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::ParseError(format!(
            "Empty {} name in {}",
            what, resource
        )));
    }
    Ok(())
}

impl Payload {
    /// Decode and shape-check the JSON returned for `resource`.
    pub fn from_json(resource: &Resource, value: Value) -> AppResult<Self> {
        let payload = match resource {
            Resource::Team(_) => Payload::Team(decode::<TeamEnvelope>(resource, value)?.team),
            Resource::TeamPlayers(_) => {
                Payload::Squad(decode::<SquadEnvelope>(resource, value)?.players)
            }
            Resource::Player(_) => {
                Payload::Player(decode::<PlayerEnvelope>(resource, value)?.player)
            }
            Resource::PlayerTransfers(_) => Payload::Transfers(
                decode::<TransferEnvelope>(resource, value)?.transfer_history,
            ),
            Resource::Event(_) => Payload::Event(decode::<EventEnvelope>(resource, value)?.event),
            Resource::EventLineups(_) => Payload::Lineups(decode::<LineupsShape>(resource, value)?),
            Resource::ScheduledEvents(_) => {
                Payload::Events(decode::<EventsEnvelope>(resource, value)?.events)
            }
            Resource::SeasonEvents { .. } => {
                Payload::EventPage(decode::<EventPageShape>(resource, value)?)
            }
            Resource::Tournament(_) => Payload::Tournament(
                decode::<TournamentEnvelope>(resource, value)?.unique_tournament,
            ),
            Resource::TournamentSeasons(_) => {
                Payload::Seasons(decode::<SeasonsEnvelope>(resource, value)?.seasons)
            }
            Resource::Standings { .. } => {
                Payload::Standings(decode::<StandingsEnvelope>(resource, value)?.standings)
            }
            Resource::TopPlayers { .. } => {
                Payload::TopPlayers(decode::<TopPlayersEnvelope>(resource, value)?.top_players)
            }
            Resource::Categories => {
                Payload::Categories(decode::<CategoriesEnvelope>(resource, value)?.categories)
            }
            Resource::SearchPlayers(_) => Payload::PlayerSearch(
                decode::<SearchEnvelope>(resource, value)?
                    .results
                    .into_iter()
                    .map(|r| r.entity)
                    .collect(),
            ),
        };
        payload.validate(resource)?;
        Ok(payload)
    }

    fn validate(&self, resource: &Resource) -> AppResult<()> {
        match self {
            Payload::Team(team) => require_name(resource, "team", &team.name),
            Payload::Player(player) => require_name(resource, "player", &player.name),
            Payload::Squad(entries) => entries
                .iter()
                .try_for_each(|e| require_name(resource, "player", &e.player.name)),
            Payload::Event(event) => {
                require_name(resource, "home team", &event.home_team.name)?;
                require_name(resource, "away team", &event.away_team.name)
            }
            Payload::Tournament(t) => require_name(resource, "tournament", &t.name),
            Payload::Standings(tables) => tables
                .iter()
                .flat_map(|t| t.rows.iter())
                .try_for_each(|row| require_name(resource, "team", &row.team.name)),
            _ => Ok(()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Team(_) => "team",
            Payload::Squad(_) => "squad",
            Payload::Player(_) => "player",
            Payload::Transfers(_) => "transfers",
            Payload::Event(_) => "event",
            Payload::Events(_) => "events",
            Payload::EventPage(_) => "event_page",
            Payload::Lineups(_) => "lineups",
            Payload::Tournament(_) => "tournament",
            Payload::Seasons(_) => "seasons",
            Payload::Standings(_) => "standings",
            Payload::TopPlayers(_) => "top_players",
            Payload::Categories(_) => "categories",
            Payload::PlayerSearch(_) => "player_search",
        }
    }
}

macro_rules! payload_accessor {
    ($fn_name:ident, $variant:ident, $ty:ty) => {
        pub fn $fn_name(self) -> AppResult<$ty> {
            match self {
                Payload::$variant(inner) => Ok(inner),
                other => Err(AppError::ParseError(format!(
                    "Expected {} payload, got {}",
                    stringify!($variant),
                    other.kind()
                ))),
            }
        }
    };
}

impl Payload {
    payload_accessor!(into_team, Team, TeamShape);
    payload_accessor!(into_squad, Squad, Vec<SquadEntryShape>);
    payload_accessor!(into_player, Player, PlayerShape);
    payload_accessor!(into_transfers, Transfers, Vec<TransferShape>);
    payload_accessor!(into_event, Event, EventShape);
    payload_accessor!(into_events, Events, Vec<EventShape>);
    payload_accessor!(into_event_page, EventPage, EventPageShape);
    payload_accessor!(into_lineups, Lineups, LineupsShape);
    payload_accessor!(into_tournament, Tournament, UniqueTournamentShape);
    payload_accessor!(into_seasons, Seasons, Vec<SeasonShape>);
    payload_accessor!(into_standings, Standings, Vec<StandingTableShape>);
    payload_accessor!(into_top_players, TopPlayers, TopPlayersShape);
    payload_accessor!(into_categories, Categories, Vec<CategoryShape>);
    payload_accessor!(into_player_search, PlayerSearch, Vec<PlayerShape>);
}
