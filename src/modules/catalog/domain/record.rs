/// Records coming from the upstream and what the store hands back.
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::entities::{Entity, EntityKind, MergeMode};
use crate::modules::provider::domain::Fidelity;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::normalize_name;

/// Matching key used when a record carries no external id.
///
/// `name` is already normalized; `scope` narrows the name to a parent
/// (team, league+season, date...). Two keys match only when both parts are equal,
/// so a `None` scope never matches a scoped key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NaturalKey {
    pub name: String,
    pub scope: Option<String>,
}

impl NaturalKey {
    pub fn new(name: &str, scope: Option<String>) -> Self {
        Self {
            name: normalize_name(name),
            scope: scope.map(|s| normalize_name(&s)),
        }
    }

    pub fn is_scoped(&self) -> bool {
        self.scope.is_some()
    }
}

impl std::fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.scope {
            Some(scope) => write!(f, "{}@{}", self.name, scope),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Role of a parent record relative to its child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Link {
    Country,
    League,
    Team,
    HomeTeam,
    AwayTeam,
    FromTeam,
    ToTeam,
    Player,
}

/// Caller-supplied context for records whose identity depends on a parent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeContext {
    pub team_id: Option<i64>,
    pub league_id: Option<i64>,
    pub season: Option<String>,
}

impl ScopeContext {
    pub fn team(team_id: i64) -> Self {
        Self {
            team_id: Some(team_id),
            ..Self::default()
        }
    }

    pub fn league_season(league_id: i64, season: impl Into<String>) -> Self {
        Self {
            league_id: Some(league_id),
            season: Some(season.into()),
            ..Self::default()
        }
    }
}

/// An entity as the upstream described it, with the parents it refers to.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalRecord {
    pub external_id: Option<String>,
    pub entity: Entity,
    pub links: Vec<(Link, ExternalRecord)>,
    pub fidelity: Fidelity,
}

impl ExternalRecord {
    pub fn new(external_id: Option<String>, entity: Entity, fidelity: Fidelity) -> Self {
        Self {
            external_id,
            entity,
            links: Vec::new(),
            fidelity,
        }
    }

    pub fn with_link(mut self, link: Link, parent: ExternalRecord) -> Self {
        self.links.push((link, parent));
        self
    }

    pub fn kind(&self) -> EntityKind {
        self.entity.kind()
    }

    /// Label used in logs and job error lines.
    pub fn label(&self) -> String {
        match (self.entity.name(), &self.external_id) {
            (Some(name), Some(id)) => format!("{} {} ({})", self.kind(), name, id),
            (Some(name), None) => format!("{} {}", self.kind(), name),
            (None, Some(id)) => format!("{} {}", self.kind(), id),
            (None, None) => self.kind().to_string(),
        }
    }

    /// Degraded records only fill gaps; full records refresh or overwrite.
    pub fn merge_mode(&self, force_update: bool) -> MergeMode {
        match (self.fidelity, force_update) {
            (Fidelity::Degraded, _) => MergeMode::FillMissing,
            (Fidelity::Full, true) => MergeMode::Overwrite,
            (Fidelity::Full, false) => MergeMode::FillAndRefresh,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredEntity {
    pub id: i64,
    pub kind: EntityKind,
    pub external_id: Option<String>,
    pub natural_key: NaturalKey,
    pub entity: Entity,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpsertResult {
    pub entity: StoredEntity,
    pub created: bool,
    pub changed_fields: Vec<String>,
}

impl UpsertResult {
    pub fn id(&self) -> i64 {
        self.entity.id
    }
}

impl Entity {
    /// Set the foreign key that `link` refers to.
    pub fn attach(&mut self, link: Link, parent_id: i64) -> AppResult<()> {
        let slot = match (&mut *self, link) {
            (Entity::League(l), Link::Country) => &mut l.country_id,
            (Entity::Team(t), Link::Country) => &mut t.country_id,
            (Entity::Player(p), Link::Team) => &mut p.team_id,
            (Entity::Match(m), Link::League) => &mut m.league_id,
            (Entity::Match(m), Link::HomeTeam) => &mut m.home_team_id,
            (Entity::Match(m), Link::AwayTeam) => &mut m.away_team_id,
            (Entity::Standing(s), Link::League) => &mut s.league_id,
            (Entity::Standing(s), Link::Team) => &mut s.team_id,
            (Entity::TopScorer(s), Link::League) => &mut s.league_id,
            (Entity::TopScorer(s), Link::Team) => &mut s.team_id,
            (Entity::TopScorer(s), Link::Player) => &mut s.player_id,
            (Entity::Transfer(t), Link::Player) => &mut t.player_id,
            (Entity::Transfer(t), Link::FromTeam) => &mut t.from_team_id,
            (Entity::Transfer(t), Link::ToTeam) => &mut t.to_team_id,
            (entity, link) => {
                return Err(AppError::ValidationError(format!(
                    "A {} cannot link to a {:?}",
                    entity.kind(),
                    link
                )))
            }
        };
        *slot = Some(parent_id);
        Ok(())
    }

    /// Fill parent references the record left empty from the caller's scope.
    pub fn apply_scope(&mut self, scope: &ScopeContext) {
        fn fill<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
            if slot.is_none() {
                *slot = value.clone();
            }
        }

        match self {
            Entity::Player(p) => fill(&mut p.team_id, &scope.team_id),
            Entity::Match(m) => {
                fill(&mut m.league_id, &scope.league_id);
                fill(&mut m.season, &scope.season);
            }
            Entity::Standing(s) => {
                fill(&mut s.league_id, &scope.league_id);
                fill(&mut s.season, &scope.season);
            }
            Entity::TopScorer(s) => {
                fill(&mut s.league_id, &scope.league_id);
                fill(&mut s.season, &scope.season);
                fill(&mut s.team_id, &scope.team_id);
            }
            _ => {}
        }
    }

    /// The canonical natural key of this entity.
    pub fn natural_key(&self) -> NaturalKey {
        fn id(value: Option<i64>) -> String {
            value.map(|v| v.to_string()).unwrap_or_default()
        }

        match self {
            Entity::Country(c) => NaturalKey::new(&c.name, None),
            Entity::League(l) => NaturalKey::new(&l.name, l.country.clone()),
            Entity::Team(t) => NaturalKey::new(&t.name, t.country_id.map(|id| id.to_string())),
            Entity::Player(p) => NaturalKey::new(&p.name, p.team_id.map(|id| id.to_string())),
            Entity::Match(m) => {
                let scope = Some(m.kickoff.date_naive().to_string());
                match (m.home_team_id, m.away_team_id) {
                    (Some(home), Some(away)) => NaturalKey::new(&format!("{}:{}", home, away), scope),
                    _ => NaturalKey::new("", None),
                }
            }
            Entity::Standing(s) => match (s.team_id, s.league_id, &s.season) {
                (Some(team), Some(league), Some(season)) => NaturalKey::new(
                    &team.to_string(),
                    Some(format!(
                        "{}:{}:{}",
                        league,
                        season,
                        s.group_name.clone().unwrap_or_default()
                    )),
                ),
                _ => NaturalKey::new(&id(s.team_id), None),
            },
            Entity::TopScorer(s) => match (s.player_id, s.league_id, &s.season) {
                (Some(player), Some(league), Some(season)) => NaturalKey::new(
                    &player.to_string(),
                    Some(format!(
                        "{}:{}:{}",
                        league,
                        season,
                        s.category.clone().unwrap_or_default()
                    )),
                ),
                _ => NaturalKey::new(&id(s.player_id), None),
            },
            Entity::Transfer(t) => match (t.player_id, t.transfer_date) {
                (Some(player), Some(date)) => NaturalKey::new(
                    &player.to_string(),
                    Some(format!(
                        "{}:{}:{}",
                        date,
                        id(t.from_team_id),
                        id(t.to_team_id)
                    )),
                ),
                _ => NaturalKey::new(&id(t.player_id), None),
            },
        }
    }

    /// Keys to try, in order, when looking for an existing row.
    ///
    /// Matches tolerate a kickoff one day either side of the stored one.
    pub fn natural_key_candidates(&self) -> Vec<NaturalKey> {
        let primary = self.natural_key();
        match self {
            Entity::Match(m) if primary.is_scoped() => {
                let mut keys = vec![primary.clone()];
                for offset in [-1, 1] {
                    let day = (m.kickoff + Duration::days(offset)).date_naive();
                    keys.push(NaturalKey {
                        name: primary.name.clone(),
                        scope: Some(day.to_string()),
                    });
                }
                keys
            }
            _ => vec![primary],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::catalog::domain::entities::{Match, Player, Team};
    use chrono::TimeZone;

    fn player(name: &str, team_id: Option<i64>) -> Entity {
        Entity::Player(Player {
            name: name.to_string(),
            team_id,
            ..Player::default()
        })
    }

    #[test]
    fn test_natural_key_normalizes_name() {
        let key = Entity::Team(Team {
            name: "  Manchester   United ".into(),
            ..Team::default()
        })
        .natural_key();
        assert_eq!(key.name, "manchester united");
        assert!(!key.is_scoped());
    }

    #[test]
    fn test_player_key_is_scoped_by_team() {
        let scoped = player("Bukayo Saka", Some(42)).natural_key();
        let unscoped = player("Bukayo Saka", None).natural_key();
        assert_eq!(scoped.scope.as_deref(), Some("42"));
        assert_ne!(scoped, unscoped);
    }

    #[test]
    fn test_scope_fills_only_missing_parents() {
        let mut entity = player("Saka", Some(7));
        entity.apply_scope(&ScopeContext::team(42));
        assert_eq!(entity.as_player().unwrap().team_id, Some(7));

        let mut entity = player("Saka", None);
        entity.apply_scope(&ScopeContext::team(42));
        assert_eq!(entity.as_player().unwrap().team_id, Some(42));
    }

    #[test]
    fn test_attach_rejects_unknown_links() {
        let mut entity = Entity::Team(Team::default());
        assert!(entity.attach(Link::Country, 3).is_ok());
        assert!(entity.attach(Link::HomeTeam, 3).is_err());
    }

    #[test]
    fn test_match_candidates_cover_adjacent_days() {
        let entity = Entity::Match(Match {
            kickoff: Utc.with_ymd_and_hms(2024, 8, 17, 19, 0, 0).unwrap(),
            status: None,
            round: None,
            season: None,
            competition: None,
            league_id: None,
            home_team_id: Some(1),
            away_team_id: Some(2),
            home_score: None,
            away_score: None,
            half_time_home_score: None,
            half_time_away_score: None,
            venue: None,
            referee: None,
            attendance: None,
        });
        let scopes: Vec<_> = entity
            .natural_key_candidates()
            .into_iter()
            .filter_map(|k| k.scope)
            .collect();
        assert_eq!(scopes, vec!["2024-08-17", "2024-08-16", "2024-08-18"]);
    }

    #[test]
    fn test_degraded_records_only_fill() {
        let record = ExternalRecord::new(None, player("Saka", None), Fidelity::Degraded);
        assert_eq!(record.merge_mode(true), MergeMode::FillMissing);
        let record = ExternalRecord::new(None, player("Saka", None), Fidelity::Full);
        assert_eq!(record.merge_mode(true), MergeMode::Overwrite);
        assert_eq!(record.merge_mode(false), MergeMode::FillAndRefresh);
    }
}
