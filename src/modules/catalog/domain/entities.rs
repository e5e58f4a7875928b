/// Canonical entities owned by the local store.
///
/// Every descriptive field is optional so a partial record can be stored and
/// completed later; merges only ever add or refresh values, never clear them.
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::shared::errors::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Country,
    League,
    Team,
    Player,
    Match,
    Standing,
    TopScorer,
    Transfer,
}

impl EntityKind {
    pub const ALL: [EntityKind; 8] = [
        EntityKind::Country,
        EntityKind::League,
        EntityKind::Team,
        EntityKind::Player,
        EntityKind::Match,
        EntityKind::Standing,
        EntityKind::TopScorer,
        EntityKind::Transfer,
    ];

    /// Kinds whose names are only unique inside a parent (team, league, date...).
    pub fn requires_scope(&self) -> bool {
        matches!(
            self,
            EntityKind::Player
                | EntityKind::Match
                | EntityKind::Standing
                | EntityKind::TopScorer
                | EntityKind::Transfer
        )
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Country => write!(f, "country"),
            EntityKind::League => write!(f, "league"),
            EntityKind::Team => write!(f, "team"),
            EntityKind::Player => write!(f, "player"),
            EntityKind::Match => write!(f, "match"),
            EntityKind::Standing => write!(f, "standing"),
            EntityKind::TopScorer => write!(f, "top_scorer"),
            EntityKind::Transfer => write!(f, "transfer"),
        }
    }
}

impl std::str::FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "country" => Ok(EntityKind::Country),
            "league" => Ok(EntityKind::League),
            "team" => Ok(EntityKind::Team),
            "player" => Ok(EntityKind::Player),
            "match" => Ok(EntityKind::Match),
            "standing" => Ok(EntityKind::Standing),
            "top_scorer" => Ok(EntityKind::TopScorer),
            "transfer" => Ok(EntityKind::Transfer),
            _ => Err(format!("Invalid entity kind: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MatchStatus {
    Scheduled,
    Live,
    Finished,
    Postponed,
    Cancelled,
}

impl MatchStatus {
    /// Map the upstream `status.type` value.
    pub fn from_upstream(status_type: Option<&str>) -> Self {
        match status_type.map(|s| s.to_lowercase()).as_deref() {
            Some("inprogress") => MatchStatus::Live,
            Some("finished") => MatchStatus::Finished,
            Some("postponed") => MatchStatus::Postponed,
            Some("canceled") | Some("cancelled") => MatchStatus::Cancelled,
            _ => MatchStatus::Scheduled,
        }
    }
}

/// How an incoming record is folded into a stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    /// Only empty fields are written
    FillMissing,
    /// Empty fields are written and time-varying ones (scores, points...) refreshed
    FillAndRefresh,
    /// Every field the incoming record carries wins
    Overwrite,
}

impl MergeMode {
    fn overwrites_stable(&self) -> bool {
        matches!(self, MergeMode::Overwrite)
    }

    fn overwrites_volatile(&self) -> bool {
        matches!(self, MergeMode::Overwrite | MergeMode::FillAndRefresh)
    }
}

fn merge_field<T: Clone + PartialEq>(
    current: &mut Option<T>,
    incoming: &Option<T>,
    overwrite: bool,
    name: &'static str,
    changed: &mut Vec<&'static str>,
) {
    if let Some(value) = incoming {
        let replace = match current {
            None => true,
            Some(existing) => overwrite && existing != value,
        };
        if replace {
            *current = Some(value.clone());
            changed.push(name);
        }
    }
}

pub trait Mergeable {
    /// Fold `incoming` into `self`; returns the names of fields that changed.
    fn merge_from(&mut self, incoming: &Self, mode: MergeMode) -> Vec<&'static str>;
}

macro_rules! mergeable {
    ($ty:ty, stable: [$($stable:ident),* $(,)?], volatile: [$($volatile:ident),* $(,)?]) => {
        impl Mergeable for $ty {
            fn merge_from(&mut self, incoming: &Self, mode: MergeMode) -> Vec<&'static str> {
                let mut changed = Vec::new();
                $(
                    merge_field(
                        &mut self.$stable,
                        &incoming.$stable,
                        mode.overwrites_stable(),
                        stringify!($stable),
                        &mut changed,
                    );
                )*
                $(
                    merge_field(
                        &mut self.$volatile,
                        &incoming.$volatile,
                        mode.overwrites_volatile(),
                        stringify!($volatile),
                        &mut changed,
                    );
                )*
                changed
            }
        }
    };
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Country {
    pub name: String,
    pub code: Option<String>,
    pub flag: Option<String>,
}

mergeable!(Country, stable: [code, flag], volatile: []);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct League {
    pub name: String,
    pub country: Option<String>,
    pub country_id: Option<i64>,
    pub logo: Option<String>,
    pub category: Option<String>,
    pub tier: Option<i64>,
    pub current_season: Option<String>,
}

mergeable!(League, stable: [country, country_id, logo, category, tier], volatile: [current_season]);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub name: String,
    pub short_name: Option<String>,
    pub slug: Option<String>,
    pub country: Option<String>,
    pub country_id: Option<i64>,
    pub logo: Option<String>,
    pub city: Option<String>,
    pub stadium: Option<String>,
    pub stadium_capacity: Option<i64>,
    pub founded: Option<i32>,
    pub manager: Option<String>,
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
}

mergeable!(
    Team,
    stable: [
        short_name,
        slug,
        country,
        country_id,
        logo,
        city,
        stadium,
        stadium_capacity,
        founded,
        primary_color,
        secondary_color,
    ],
    volatile: [manager]
);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    pub full_name: Option<String>,
    pub short_name: Option<String>,
    pub slug: Option<String>,
    pub position: Option<String>,
    pub position_category: Option<String>,
    pub nationality: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub age: Option<i32>,
    pub height: Option<i64>,
    pub weight: Option<i64>,
    pub foot: Option<String>,
    pub shirt_number: Option<i64>,
    pub photo: Option<String>,
    pub market_value: Option<String>,
    pub contract_until: Option<NaiveDate>,
    pub team_id: Option<i64>,
}

mergeable!(
    Player,
    stable: [
        full_name,
        short_name,
        slug,
        position,
        position_category,
        nationality,
        birth_date,
        height,
        weight,
        foot,
        photo,
    ],
    volatile: [age, shirt_number, market_value, contract_until, team_id]
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub kickoff: DateTime<Utc>,
    pub status: Option<MatchStatus>,
    pub round: Option<String>,
    pub season: Option<String>,
    pub competition: Option<String>,
    pub league_id: Option<i64>,
    pub home_team_id: Option<i64>,
    pub away_team_id: Option<i64>,
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
    pub half_time_home_score: Option<i64>,
    pub half_time_away_score: Option<i64>,
    pub venue: Option<String>,
    pub referee: Option<String>,
    pub attendance: Option<i64>,
}

mergeable!(
    Match,
    stable: [round, season, competition, league_id, home_team_id, away_team_id, venue],
    volatile: [
        status,
        home_score,
        away_score,
        half_time_home_score,
        half_time_away_score,
        referee,
        attendance,
    ]
);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Standing {
    pub league_id: Option<i64>,
    pub team_id: Option<i64>,
    pub season: Option<String>,
    pub group_name: Option<String>,
    pub position: Option<i64>,
    pub played: Option<i64>,
    pub won: Option<i64>,
    pub drawn: Option<i64>,
    pub lost: Option<i64>,
    pub goals_for: Option<i64>,
    pub goals_against: Option<i64>,
    pub goal_difference: Option<i64>,
    pub points: Option<i64>,
    pub form: Option<String>,
}

mergeable!(
    Standing,
    stable: [league_id, team_id, season, group_name],
    volatile: [
        position,
        played,
        won,
        drawn,
        lost,
        goals_for,
        goals_against,
        goal_difference,
        points,
        form,
    ]
);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopScorer {
    pub league_id: Option<i64>,
    pub player_id: Option<i64>,
    pub team_id: Option<i64>,
    pub season: Option<String>,
    pub category: Option<String>,
    pub rank: Option<i64>,
    pub value: Option<i64>,
    pub matches: Option<i64>,
    pub minutes_played: Option<i64>,
    pub penalty_goals: Option<i64>,
    pub goals_per_match: Option<f64>,
}

mergeable!(
    TopScorer,
    stable: [league_id, player_id, season, category],
    volatile: [team_id, rank, value, matches, minutes_played, penalty_goals, goals_per_match]
);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub player_id: Option<i64>,
    pub from_team_id: Option<i64>,
    pub to_team_id: Option<i64>,
    pub transfer_date: Option<NaiveDate>,
    pub transfer_type: Option<String>,
    pub fee: Option<String>,
    pub currency: Option<String>,
}

mergeable!(
    Transfer,
    stable: [player_id, from_team_id, to_team_id, transfer_date, transfer_type, fee, currency],
    volatile: []
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "fields", rename_all = "snake_case")]
pub enum Entity {
    Country(Country),
    League(League),
    Team(Team),
    Player(Player),
    Match(Match),
    Standing(Standing),
    TopScorer(TopScorer),
    Transfer(Transfer),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Country(_) => EntityKind::Country,
            Entity::League(_) => EntityKind::League,
            Entity::Team(_) => EntityKind::Team,
            Entity::Player(_) => EntityKind::Player,
            Entity::Match(_) => EntityKind::Match,
            Entity::Standing(_) => EntityKind::Standing,
            Entity::TopScorer(_) => EntityKind::TopScorer,
            Entity::Transfer(_) => EntityKind::Transfer,
        }
    }

    /// Display name, for entities that have one.
    pub fn name(&self) -> Option<&str> {
        match self {
            Entity::Country(c) => Some(&c.name),
            Entity::League(l) => Some(&l.name),
            Entity::Team(t) => Some(&t.name),
            Entity::Player(p) => Some(&p.name),
            _ => None,
        }
    }

    /// Fold `incoming` (same kind) into `self`.
    pub fn merge_from(&mut self, incoming: &Entity, mode: MergeMode) -> AppResult<Vec<&'static str>> {
        let mut changed = match (&mut *self, incoming) {
            (Entity::Country(a), Entity::Country(b)) => a.merge_from(b, mode),
            (Entity::League(a), Entity::League(b)) => a.merge_from(b, mode),
            (Entity::Team(a), Entity::Team(b)) => a.merge_from(b, mode),
            (Entity::Player(a), Entity::Player(b)) => a.merge_from(b, mode),
            (Entity::Match(a), Entity::Match(b)) => {
                let mut changed = a.merge_from(b, mode);
                if mode != MergeMode::FillMissing && a.kickoff != b.kickoff {
                    a.kickoff = b.kickoff;
                    changed.push("kickoff");
                }
                changed
            }
            (Entity::Standing(a), Entity::Standing(b)) => a.merge_from(b, mode),
            (Entity::TopScorer(a), Entity::TopScorer(b)) => a.merge_from(b, mode),
            (Entity::Transfer(a), Entity::Transfer(b)) => a.merge_from(b, mode),
            (current, other) => {
                return Err(AppError::InternalError(format!(
                    "Cannot merge {} into {}",
                    other.kind(),
                    current.kind()
                )))
            }
        };

        if mode == MergeMode::Overwrite {
            if let (Some(current), Some(new_name)) = (self.name(), incoming.name()) {
                if current != new_name && !new_name.trim().is_empty() {
                    let new_name = new_name.to_string();
                    self.set_name(new_name);
                    changed.push("name");
                }
            }
        }
        Ok(changed)
    }

    fn set_name(&mut self, name: String) {
        match self {
            Entity::Country(c) => c.name = name,
            Entity::League(l) => l.name = name,
            Entity::Team(t) => t.name = name,
            Entity::Player(p) => p.name = name,
            _ => {}
        }
    }

    /// JSON object of the entity's own fields (no kind tag).
    pub fn to_fields(&self) -> AppResult<Value> {
        let value = match self {
            Entity::Country(e) => serde_json::to_value(e),
            Entity::League(e) => serde_json::to_value(e),
            Entity::Team(e) => serde_json::to_value(e),
            Entity::Player(e) => serde_json::to_value(e),
            Entity::Match(e) => serde_json::to_value(e),
            Entity::Standing(e) => serde_json::to_value(e),
            Entity::TopScorer(e) => serde_json::to_value(e),
            Entity::Transfer(e) => serde_json::to_value(e),
        }?;
        Ok(value)
    }

    pub fn from_fields(kind: EntityKind, fields: Value) -> AppResult<Entity> {
        let entity = match kind {
            EntityKind::Country => Entity::Country(serde_json::from_value(fields)?),
            EntityKind::League => Entity::League(serde_json::from_value(fields)?),
            EntityKind::Team => Entity::Team(serde_json::from_value(fields)?),
            EntityKind::Player => Entity::Player(serde_json::from_value(fields)?),
            EntityKind::Match => Entity::Match(serde_json::from_value(fields)?),
            EntityKind::Standing => Entity::Standing(serde_json::from_value(fields)?),
            EntityKind::TopScorer => Entity::TopScorer(serde_json::from_value(fields)?),
            EntityKind::Transfer => Entity::Transfer(serde_json::from_value(fields)?),
        };
        Ok(entity)
    }

    pub fn as_team(&self) -> Option<&Team> {
        match self {
            Entity::Team(team) => Some(team),
            _ => None,
        }
    }

    pub fn as_player(&self) -> Option<&Player> {
        match self {
            Entity::Player(player) => Some(player),
            _ => None,
        }
    }

    pub fn as_match(&self) -> Option<&Match> {
        match self {
            Entity::Match(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_league(&self) -> Option<&League> {
        match self {
            Entity::League(league) => Some(league),
            _ => None,
        }
    }
}
