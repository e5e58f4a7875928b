/// Persistence seam of the catalog.
///
/// Resolution runs synchronously inside [`EntityStore::transaction`] through a
/// [`StoreTx`], so a record and all of its parents commit or roll back together.
use super::entities::{Entity, EntityKind};
use super::record::{NaturalKey, StoredEntity, UpsertResult};
use crate::shared::errors::AppResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub trait StoreTx {
    fn find_by_external_id(
        &mut self,
        kind: EntityKind,
        external_id: &str,
    ) -> AppResult<Option<StoredEntity>>;

    /// Oldest row whose key matches exactly (name and scope).
    fn find_by_natural_key(
        &mut self,
        kind: EntityKind,
        key: &NaturalKey,
    ) -> AppResult<Option<StoredEntity>>;

    fn insert(
        &mut self,
        external_id: Option<&str>,
        key: &NaturalKey,
        entity: &Entity,
    ) -> AppResult<StoredEntity>;

    fn update(
        &mut self,
        id: i64,
        external_id: Option<&str>,
        key: &NaturalKey,
        entity: &Entity,
    ) -> AppResult<StoredEntity>;
}

pub type TxWork =
    Box<dyn FnOnce(&mut dyn StoreTx) -> AppResult<Vec<UpsertResult>> + Send + 'static>;

/// Window of a list query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub offset: usize,
    pub size: usize,
}

impl Batch {
    pub fn new(offset: usize, size: usize) -> Self {
        Self { offset, size }
    }
}

/// Which rows a list or count covers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntityQuery {
    pub kind: Option<EntityKind>,
    pub with_external_id: bool,
    pub team_id: Option<i64>,
    pub league_id: Option<i64>,
    pub name_contains: Option<String>,
}

impl EntityQuery {
    pub fn of(kind: EntityKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn with_external_id(mut self) -> Self {
        self.with_external_id = true;
        self
    }

    pub fn for_team(mut self, team_id: i64) -> Self {
        self.team_id = Some(team_id);
        self
    }

    pub fn for_league(mut self, league_id: i64) -> Self {
        self.league_id = Some(league_id);
        self
    }

    pub fn named_like(mut self, fragment: &str) -> Self {
        self.name_contains = Some(fragment.to_lowercase());
        self
    }

    /// In-memory evaluation of the filter.
    pub fn matches(&self, row: &StoredEntity) -> bool {
        if let Some(kind) = self.kind {
            if row.kind != kind {
                return false;
            }
        }
        if self.with_external_id && row.external_id.is_none() {
            return false;
        }
        if let Some(team_id) = self.team_id {
            let row_team = match &row.entity {
                Entity::Player(p) => p.team_id,
                Entity::Standing(s) => s.team_id,
                Entity::TopScorer(s) => s.team_id,
                _ => None,
            };
            if row_team != Some(team_id) {
                return false;
            }
        }
        if let Some(league_id) = self.league_id {
            let row_league = match &row.entity {
                Entity::Match(m) => m.league_id,
                Entity::Standing(s) => s.league_id,
                Entity::TopScorer(s) => s.league_id,
                _ => None,
            };
            if row_league != Some(league_id) {
                return false;
            }
        }
        if let Some(fragment) = &self.name_contains {
            if !row.natural_key.name.contains(fragment.as_str()) {
                return false;
            }
        }
        true
    }
}

#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Run `work` atomically: on `Err` nothing it wrote is kept.
    async fn transaction(&self, work: TxWork) -> AppResult<Vec<UpsertResult>>;

    async fn get(&self, id: i64) -> AppResult<Option<StoredEntity>>;

    async fn find_by_external_id(
        &self,
        kind: EntityKind,
        external_id: &str,
    ) -> AppResult<Option<StoredEntity>>;

    async fn count(&self, query: &EntityQuery) -> AppResult<usize>;

    /// Rows ordered by id.
    async fn list(&self, query: &EntityQuery, batch: Batch) -> AppResult<Vec<StoredEntity>>;
}
