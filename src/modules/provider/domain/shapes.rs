//! Typed shapes of the upstream JSON documents.
//!
//! Identity fields (`id`, `name`, event teams and start time) are required,
//! so a drifted payload fails to deserialize instead of leaking half-empty
//! records downstream. Everything else is optional.

use serde::{Deserialize, Deserializer, Serialize};

/// Accepts `7`, `"7"`, `null` or a missing key.
fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(i64),
        Float(f64),
        Text(String),
    }

    Ok(
        match Option::<NumberOrText>::deserialize(deserializer)? {
            Some(NumberOrText::Number(n)) => Some(n),
            Some(NumberOrText::Float(f)) => Some(f as i64),
            Some(NumberOrText::Text(s)) => s.trim().parse().ok(),
            None => None,
        },
    )
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryShape {
    pub name: Option<String>,
    pub alpha2: Option<String>,
    pub alpha3: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryShape {
    pub id: u64,
    pub name: String,
    pub slug: Option<String>,
    pub alpha2: Option<String>,
    pub flag: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamedShape {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StadiumShape {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub capacity: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VenueShape {
    pub city: Option<NamedShape>,
    pub stadium: Option<StadiumShape>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamColorsShape {
    pub primary: Option<String>,
    pub secondary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamShape {
    pub id: u64,
    pub name: String,
    pub short_name: Option<String>,
    pub slug: Option<String>,
    pub name_code: Option<String>,
    pub country: Option<CountryShape>,
    pub venue: Option<VenueShape>,
    pub manager: Option<NamedShape>,
    pub team_colors: Option<TeamColorsShape>,
    pub foundation_date_timestamp: Option<i64>,
}

impl TeamShape {
    /// Bare team carrying only its identity, as the HTML fallback sees it.
    pub fn bare(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            short_name: None,
            slug: None,
            name_code: None,
            country: None,
            venue: None,
            manager: None,
            team_colors: None,
            foundation_date_timestamp: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MoneyShape {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub value: Option<i64>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerShape {
    pub id: u64,
    pub name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub short_name: Option<String>,
    pub slug: Option<String>,
    pub position: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub jersey_number: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub height: Option<i64>,
    pub preferred_foot: Option<String>,
    pub date_of_birth_timestamp: Option<i64>,
    pub contract_until_timestamp: Option<i64>,
    pub country: Option<CountryShape>,
    pub team: Option<TeamShape>,
    pub proposed_market_value_raw: Option<MoneyShape>,
}

impl PlayerShape {
    pub fn bare(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            first_name: None,
            last_name: None,
            short_name: None,
            slug: None,
            position: None,
            jersey_number: None,
            height: None,
            preferred_foot: None,
            date_of_birth_timestamp: None,
            contract_until_timestamp: None,
            country: None,
            team: None,
            proposed_market_value_raw: None,
        }
    }
}

/// One row of `/team/{id}/players`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SquadEntryShape {
    pub player: PlayerShape,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub jersey_number: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferShape {
    pub id: Option<u64>,
    pub transfer_date_timestamp: Option<i64>,
    pub transfer_from: Option<TeamShape>,
    pub transfer_to: Option<TeamShape>,
    #[serde(rename = "type", default, deserialize_with = "lenient_i64")]
    pub transfer_type: Option<i64>,
    pub transfer_fee_raw: Option<MoneyShape>,
    pub transfer_fee_description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreShape {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub current: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub period1: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventStatusShape {
    pub code: Option<i64>,
    #[serde(rename = "type")]
    pub status_type: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniqueTournamentShape {
    pub id: u64,
    pub name: String,
    pub slug: Option<String>,
    pub category: Option<CategoryShape>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub tier: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentRefShape {
    pub name: Option<String>,
    pub category: Option<CategoryShape>,
    pub unique_tournament: Option<UniqueTournamentShape>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundInfoShape {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub round: Option<i64>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonShape {
    pub id: u64,
    pub name: Option<String>,
    pub year: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventShape {
    pub id: u64,
    pub start_timestamp: i64,
    pub home_team: TeamShape,
    pub away_team: TeamShape,
    pub status: Option<EventStatusShape>,
    pub home_score: Option<ScoreShape>,
    pub away_score: Option<ScoreShape>,
    pub tournament: Option<TournamentRefShape>,
    pub round_info: Option<RoundInfoShape>,
    pub season: Option<SeasonShape>,
    pub venue: Option<VenueShape>,
    pub referee: Option<NamedShape>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub attendance: Option<i64>,
}

impl EventShape {
    pub fn competition_name(&self) -> Option<&str> {
        self.tournament
            .as_ref()
            .and_then(|t| {
                t.unique_tournament
                    .as_ref()
                    .map(|u| u.name.as_str())
                    .or(t.name.as_deref())
            })
            .filter(|name| !name.trim().is_empty())
    }

    pub fn country_name(&self) -> Option<&str> {
        self.tournament
            .as_ref()
            .and_then(|t| t.category.as_ref())
            .map(|c| c.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineupPlayerShape {
    pub player: PlayerShape,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub shirt_number: Option<i64>,
    pub position: Option<String>,
    #[serde(default)]
    pub substitute: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineupSideShape {
    #[serde(default)]
    pub players: Vec<LineupPlayerShape>,
    pub formation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineupsShape {
    pub home: LineupSideShape,
    pub away: LineupSideShape,
    #[serde(default)]
    pub confirmed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromotionShape {
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandingRowShape {
    pub team: TeamShape,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub position: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub matches: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub wins: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub draws: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub losses: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub scores_for: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub scores_against: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub points: Option<i64>,
    pub promotion: Option<PromotionShape>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandingTableShape {
    pub name: Option<String>,
    #[serde(default)]
    pub rows: Vec<StandingRowShape>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopStatisticsShape {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub goals: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub assists: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub appearances: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub minutes_played: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub penalty_goals: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopPlayerEntryShape {
    pub player: PlayerShape,
    pub team: Option<TeamShape>,
    #[serde(default)]
    pub statistics: TopStatisticsShape,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopPlayersShape {
    #[serde(default)]
    pub goals: Vec<TopPlayerEntryShape>,
    #[serde(default)]
    pub assists: Vec<TopPlayerEntryShape>,
}

// Response envelopes. The key each one names must be present.

#[derive(Debug, Deserialize)]
pub struct TeamEnvelope {
    pub team: TeamShape,
}

#[derive(Debug, Deserialize)]
pub struct SquadEnvelope {
    pub players: Vec<SquadEntryShape>,
}

#[derive(Debug, Deserialize)]
pub struct PlayerEnvelope {
    pub player: PlayerShape,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferEnvelope {
    pub transfer_history: Vec<TransferShape>,
}

#[derive(Debug, Deserialize)]
pub struct EventEnvelope {
    pub event: EventShape,
}

#[derive(Debug, Deserialize)]
pub struct EventsEnvelope {
    pub events: Vec<EventShape>,
}

/// One page of a season's past events, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPageShape {
    pub events: Vec<EventShape>,
    #[serde(default)]
    pub has_next_page: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentEnvelope {
    pub unique_tournament: UniqueTournamentShape,
}

#[derive(Debug, Deserialize)]
pub struct SeasonsEnvelope {
    pub seasons: Vec<SeasonShape>,
}

#[derive(Debug, Deserialize)]
pub struct StandingsEnvelope {
    pub standings: Vec<StandingTableShape>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopPlayersEnvelope {
    pub top_players: TopPlayersShape,
}

#[derive(Debug, Deserialize)]
pub struct CategoriesEnvelope {
    pub categories: Vec<CategoryShape>,
}

#[derive(Debug, Deserialize)]
pub struct SearchResultShape {
    pub entity: PlayerShape,
}

#[derive(Debug, Deserialize)]
pub struct SearchEnvelope {
    pub results: Vec<SearchResultShape>,
}
