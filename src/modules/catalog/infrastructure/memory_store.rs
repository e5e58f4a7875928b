/// In-process EntityStore used by tests and by dry runs without a database.
///
/// A transaction works on a copy of the state and swaps it in on success, so a
/// failed resolution leaves no trace.
use crate::modules::catalog::domain::{
    Batch, Entity, EntityKind, EntityQuery, EntityStore, NaturalKey, StoreTx, StoredEntity,
    TxWork, UpsertResult,
};
use crate::shared::errors::{AppError, AppResult};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    rows: BTreeMap<i64, StoredEntity>,
    by_external_id: HashMap<(EntityKind, String), i64>,
    next_id: i64,
}

#[derive(Debug, Default)]
pub struct MemoryEntityStore {
    state: Mutex<MemoryState>,
    failing_kind: Mutex<Option<EntityKind>>,
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write of `kind` fail with a persistence error.
    pub fn fail_writes_of(&self, kind: Option<EntityKind>) {
        *self
            .failing_kind
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = kind;
    }

    pub fn len(&self) -> usize {
        self.lock_state().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every stored row of `kind`, by id.
    pub fn all_of(&self, kind: EntityKind) -> Vec<StoredEntity> {
        self.lock_state()
            .rows
            .values()
            .filter(|row| row.kind == kind)
            .cloned()
            .collect()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn failing_kind(&self) -> Option<EntityKind> {
        *self
            .failing_kind
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

struct MemoryTx<'a> {
    state: &'a mut MemoryState,
    failing_kind: Option<EntityKind>,
}

impl MemoryTx<'_> {
    fn check_writable(&self, kind: EntityKind) -> AppResult<()> {
        if self.failing_kind == Some(kind) {
            return Err(AppError::PersistenceError(format!(
                "Simulated write failure for {}",
                kind
            )));
        }
        Ok(())
    }

    fn claim_external_id(&mut self, kind: EntityKind, external_id: Option<&str>, id: i64) -> AppResult<()> {
        if let Some(external_id) = external_id {
            let key = (kind, external_id.to_string());
            match self.state.by_external_id.get(&key) {
                Some(owner) if *owner != id => {
                    return Err(AppError::PersistenceError(format!(
                        "Duplicate external id {} for {}",
                        external_id, kind
                    )))
                }
                _ => {
                    self.state.by_external_id.insert(key, id);
                }
            }
        }
        Ok(())
    }
}

impl StoreTx for MemoryTx<'_> {
    fn find_by_external_id(
        &mut self,
        kind: EntityKind,
        external_id: &str,
    ) -> AppResult<Option<StoredEntity>> {
        Ok(self
            .state
            .by_external_id
            .get(&(kind, external_id.to_string()))
            .and_then(|id| self.state.rows.get(id))
            .cloned())
    }

    fn find_by_natural_key(
        &mut self,
        kind: EntityKind,
        key: &NaturalKey,
    ) -> AppResult<Option<StoredEntity>> {
        Ok(self
            .state
            .rows
            .values()
            .find(|row| row.kind == kind && &row.natural_key == key)
            .cloned())
    }

    fn insert(
        &mut self,
        external_id: Option<&str>,
        key: &NaturalKey,
        entity: &Entity,
    ) -> AppResult<StoredEntity> {
        let kind = entity.kind();
        self.check_writable(kind)?;

        self.state.next_id += 1;
        let id = self.state.next_id;
        self.claim_external_id(kind, external_id, id)?;

        let now = Utc::now();
        let row = StoredEntity {
            id,
            kind,
            external_id: external_id.map(str::to_string),
            natural_key: key.clone(),
            entity: entity.clone(),
            created_at: now,
            updated_at: now,
        };
        self.state.rows.insert(id, row.clone());
        Ok(row)
    }

    fn update(
        &mut self,
        id: i64,
        external_id: Option<&str>,
        key: &NaturalKey,
        entity: &Entity,
    ) -> AppResult<StoredEntity> {
        let kind = entity.kind();
        self.check_writable(kind)?;
        self.claim_external_id(kind, external_id, id)?;

        let row = self
            .state
            .rows
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("No stored entity with id {}", id)))?;
        row.external_id = external_id.map(str::to_string);
        row.natural_key = key.clone();
        row.entity = entity.clone();
        row.updated_at = Utc::now();
        Ok(row.clone())
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn transaction(&self, work: TxWork) -> AppResult<Vec<UpsertResult>> {
        let failing_kind = self.failing_kind();
        let mut state = self.lock_state();
        let mut draft = state.clone();

        let results = work(&mut MemoryTx {
            state: &mut draft,
            failing_kind,
        })?;
        *state = draft;
        Ok(results)
    }

    async fn get(&self, id: i64) -> AppResult<Option<StoredEntity>> {
        Ok(self.lock_state().rows.get(&id).cloned())
    }

    async fn find_by_external_id(
        &self,
        kind: EntityKind,
        external_id: &str,
    ) -> AppResult<Option<StoredEntity>> {
        let state = self.lock_state();
        Ok(state
            .by_external_id
            .get(&(kind, external_id.to_string()))
            .and_then(|id| state.rows.get(id))
            .cloned())
    }

    async fn count(&self, query: &EntityQuery) -> AppResult<usize> {
        Ok(self
            .lock_state()
            .rows
            .values()
            .filter(|row| query.matches(row))
            .count())
    }

    async fn list(&self, query: &EntityQuery, batch: Batch) -> AppResult<Vec<StoredEntity>> {
        Ok(self
            .lock_state()
            .rows
            .values()
            .filter(|row| query.matches(row))
            .skip(batch.offset)
            .take(batch.size)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::catalog::domain::{Country, UpsertResult};

    fn country(name: &str) -> Entity {
        Entity::Country(Country {
            name: name.to_string(),
            ..Country::default()
        })
    }

    fn insert(tx: &mut dyn StoreTx, name: &str, external_id: Option<&str>) -> AppResult<UpsertResult> {
        let entity = country(name);
        let stored = tx.insert(external_id, &entity.natural_key(), &entity)?;
        Ok(UpsertResult {
            entity: stored,
            created: true,
            changed_fields: vec![],
        })
    }

    #[tokio::test]
    async fn test_failed_transaction_rolls_back() {
        let store = MemoryEntityStore::new();
        let result = store
            .transaction(Box::new(|tx: &mut dyn StoreTx| {
                insert(tx, "England", Some("1"))?;
                Err(AppError::PersistenceError("boom".into()))
            }))
            .await;

        assert!(result.is_err());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_committed_rows_are_listed_in_id_order() {
        let store = MemoryEntityStore::new();
        store
            .transaction(Box::new(|tx: &mut dyn StoreTx| {
                Ok(vec![
                    insert(tx, "England", Some("1"))?,
                    insert(tx, "Spain", None)?,
                    insert(tx, "Italy", Some("3"))?,
                ])
            }))
            .await
            .unwrap();

        let query = EntityQuery::of(EntityKind::Country).with_external_id();
        assert_eq!(store.count(&query).await.unwrap(), 2);

        let page = store
            .list(&EntityQuery::of(EntityKind::Country), Batch::new(1, 5))
            .await
            .unwrap();
        let names: Vec<_> = page.iter().filter_map(|r| r.entity.name()).collect();
        assert_eq!(names, vec!["Spain", "Italy"]);
    }

    #[tokio::test]
    async fn test_duplicate_external_id_is_rejected() {
        let store = MemoryEntityStore::new();
        let result = store
            .transaction(Box::new(|tx: &mut dyn StoreTx| {
                Ok(vec![
                    insert(tx, "England", Some("1"))?,
                    insert(tx, "Scotland", Some("1"))?,
                ])
            }))
            .await;
        assert!(matches!(result, Err(AppError::PersistenceError(_))));
        assert!(store.is_empty());
    }
}
