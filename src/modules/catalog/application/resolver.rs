//! Maps external records onto canonical entities and persists them.
//!
//! Lookup order is external id, then natural key (exact after
//! normalization). Parents referenced by a record are resolved first, inside
//! the same transaction, so a failure anywhere leaves the store untouched.

use crate::modules::catalog::domain::{
    Entity, EntityKind, EntityStore, ExternalRecord, ScopeContext, StoreTx, StoredEntity,
    UpsertResult,
};
use crate::shared::errors::{AppError, AppResult};
use crate::{log_debug, log_info};
use std::sync::Arc;

pub struct EntityResolver {
    store: Arc<dyn EntityStore>,
}

impl EntityResolver {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    /// Find-or-create `record` (and its parents) and merge in what it carries.
    pub async fn resolve_and_upsert(
        &self,
        record: ExternalRecord,
        scope: ScopeContext,
        force_update: bool,
    ) -> AppResult<UpsertResult> {
        let label = record.label();
        let mut results = self
            .store
            .transaction(Box::new(move |tx: &mut dyn StoreTx| {
                resolve_in(tx, &record, &scope, force_update).map(|result| vec![result])
            }))
            .await?;

        let result = results
            .pop()
            .ok_or_else(|| AppError::InternalError(format!("No result for {}", label)))?;
        log_outcome(&label, &result);
        Ok(result)
    }

    /// Resolve several records as one unit: all are stored or none is.
    pub async fn resolve_group(
        &self,
        records: Vec<ExternalRecord>,
        scope: ScopeContext,
        force_update: bool,
    ) -> AppResult<Vec<UpsertResult>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let count = records.len();
        let results = self
            .store
            .transaction(Box::new(move |tx: &mut dyn StoreTx| {
                records
                    .iter()
                    .map(|record| resolve_in(tx, record, &scope, force_update))
                    .collect()
            }))
            .await?;

        let created = results.iter().filter(|r| r.created).count();
        log_info!(
            "Resolved group of {} records ({} created, {} existing)",
            count,
            created,
            count - created
        );
        Ok(results)
    }

    /// Stored entity for an upstream id, if it was ever resolved.
    pub async fn lookup(&self, kind: EntityKind, external_id: &str) -> AppResult<Option<StoredEntity>> {
        self.store.find_by_external_id(kind, external_id).await
    }
}

fn log_outcome(label: &str, result: &UpsertResult) {
    if result.created {
        log_debug!("Created {} as #{}", label, result.id());
    } else if result.changed_fields.is_empty() {
        log_debug!("{} unchanged (#{})", label, result.id());
    } else {
        log_debug!(
            "Updated {} (#{}): {}",
            label,
            result.id(),
            result.changed_fields.join(", ")
        );
    }
}

/// Synchronous resolution against an open transaction.
pub fn resolve_in(
    tx: &mut dyn StoreTx,
    record: &ExternalRecord,
    scope: &ScopeContext,
    force_update: bool,
) -> AppResult<UpsertResult> {
    let kind = record.kind();
    let mut entity: Entity = record.entity.clone();

    if let Some(name) = entity.name() {
        if name.trim().is_empty() {
            return Err(AppError::ValidationError(format!(
                "{} record {:?} has an empty name",
                kind, record.external_id
            )));
        }
    }

    for (link, parent) in &record.links {
        let parent = resolve_in(tx, parent, &ScopeContext::default(), force_update)?;
        entity.attach(*link, parent.id())?;
    }
    entity.apply_scope(scope);

    let candidates = entity.natural_key_candidates();
    let primary_key = candidates
        .first()
        .cloned()
        .ok_or_else(|| AppError::InternalError(format!("No natural key for {}", kind)))?;
    let key_usable = !kind.requires_scope() || primary_key.is_scoped();

    if record.external_id.is_none() && !key_usable {
        return Err(AppError::ValidationError(format!(
            "{} '{}' has no external id and no scoping parent",
            kind, primary_key.name
        )));
    }

    let mut existing = match &record.external_id {
        Some(external_id) => tx.find_by_external_id(kind, external_id)?,
        None => None,
    };

    if existing.is_none() && key_usable {
        for key in &candidates {
            if let Some(found) = tx.find_by_natural_key(kind, key)? {
                // Same name, different upstream identity: a distinct entity.
                let conflicting = matches!(
                    (&record.external_id, &found.external_id),
                    (Some(incoming), Some(stored)) if incoming != stored
                );
                if !conflicting {
                    existing = Some(found);
                    break;
                }
            }
        }
    }

    match existing {
        None => {
            let stored = tx.insert(record.external_id.as_deref(), &primary_key, &entity)?;
            Ok(UpsertResult {
                entity: stored,
                created: true,
                changed_fields: Vec::new(),
            })
        }
        Some(stored) => {
            let mut merged = stored.entity.clone();
            let mut changed: Vec<String> = merged
                .merge_from(&entity, record.merge_mode(force_update))?
                .into_iter()
                .map(str::to_string)
                .collect();

            let external_id = stored.external_id.clone().or_else(|| record.external_id.clone());
            if external_id != stored.external_id {
                changed.push("external_id".to_string());
            }

            if changed.is_empty() {
                return Ok(UpsertResult {
                    entity: stored,
                    created: false,
                    changed_fields: changed,
                });
            }

            let key = merged.natural_key();
            let updated = tx.update(stored.id, external_id.as_deref(), &key, &merged)?;
            Ok(UpsertResult {
                entity: updated,
                created: false,
                changed_fields: changed,
            })
        }
    }
}
