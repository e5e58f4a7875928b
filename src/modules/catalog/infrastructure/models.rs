/// Diesel models for the canonical_entities table
use crate::modules::catalog::domain::{Entity, EntityKind, NaturalKey, StoredEntity};
use crate::schema::canonical_entities;
use crate::shared::errors::AppResult;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value as JsonValue;

/// Entity kind enum matching database type
#[derive(diesel_derive_enum::DbEnum, Debug, Clone, Copy, PartialEq, Eq)]
#[ExistingTypePath = "crate::schema::sql_types::EntityKind"]
pub enum EntityKindDb {
    Country,
    League,
    Team,
    Player,
    Match,
    Standing,
    TopScorer,
    Transfer,
}

impl From<EntityKind> for EntityKindDb {
    fn from(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Country => EntityKindDb::Country,
            EntityKind::League => EntityKindDb::League,
            EntityKind::Team => EntityKindDb::Team,
            EntityKind::Player => EntityKindDb::Player,
            EntityKind::Match => EntityKindDb::Match,
            EntityKind::Standing => EntityKindDb::Standing,
            EntityKind::TopScorer => EntityKindDb::TopScorer,
            EntityKind::Transfer => EntityKindDb::Transfer,
        }
    }
}

impl From<EntityKindDb> for EntityKind {
    fn from(kind: EntityKindDb) -> Self {
        match kind {
            EntityKindDb::Country => EntityKind::Country,
            EntityKindDb::League => EntityKind::League,
            EntityKindDb::Team => EntityKind::Team,
            EntityKindDb::Player => EntityKind::Player,
            EntityKindDb::Match => EntityKind::Match,
            EntityKindDb::Standing => EntityKind::Standing,
            EntityKindDb::TopScorer => EntityKind::TopScorer,
            EntityKindDb::Transfer => EntityKind::Transfer,
        }
    }
}

/// Diesel model for inserting new rows
#[derive(Insertable, Debug)]
#[diesel(table_name = canonical_entities)]
pub struct NewEntityRow {
    pub kind: EntityKindDb,
    pub external_id: Option<String>,
    pub natural_key: String,
    pub scope_key: Option<String>,
    pub fields: JsonValue,
}

impl NewEntityRow {
    pub fn build(external_id: Option<&str>, key: &NaturalKey, entity: &Entity) -> AppResult<Self> {
        Ok(Self {
            kind: entity.kind().into(),
            external_id: external_id.map(str::to_string),
            natural_key: key.name.clone(),
            scope_key: key.scope.clone(),
            fields: entity.to_fields()?,
        })
    }
}

/// Diesel model for querying existing rows
#[derive(Queryable, Selectable, QueryableByName, Debug, Clone)]
#[diesel(table_name = canonical_entities)]
pub struct EntityRow {
    pub id: i64,
    pub kind: EntityKindDb,
    pub external_id: Option<String>,
    pub natural_key: String,
    pub scope_key: Option<String>,
    pub fields: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EntityRow {
    /// Convert to domain StoredEntity
    pub fn into_stored(self) -> AppResult<StoredEntity> {
        let kind: EntityKind = self.kind.into();
        Ok(StoredEntity {
            id: self.id,
            kind,
            external_id: self.external_id,
            natural_key: NaturalKey {
                name: self.natural_key,
                scope: self.scope_key,
            },
            entity: Entity::from_fields(kind, self.fields)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
