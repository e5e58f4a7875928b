/// Entity resolution against the in-memory store
///
/// Tests cover:
/// - idempotent upserts by external id
/// - degraded records only filling gaps
/// - natural-key matching inside a scope
/// - all-or-nothing group resolution
mod utils;

use serde_json::from_value;
use sofa_sync_lib::modules::catalog::domain::Player;
use sofa_sync_lib::modules::catalog::{
    Entity, EntityKind, EntityResolver, ExternalRecord, MemoryEntityStore, RecordMapper,
    ScopeContext,
};
use sofa_sync_lib::modules::provider::domain::shapes::TeamShape;
use sofa_sync_lib::modules::provider::{Endpoints, Fidelity};
use sofa_sync_lib::shared::errors::AppError;
use std::sync::Arc;
use utils::payloads;

fn setup() -> (EntityResolver, Arc<MemoryEntityStore>, RecordMapper) {
    let store = Arc::new(MemoryEntityStore::new());
    let resolver = EntityResolver::new(store.clone());
    (resolver, store, RecordMapper::new(Endpoints::default()))
}

fn arsenal() -> TeamShape {
    from_value(payloads::team_body(42, "Arsenal")).unwrap()
}

fn unlinked_player(name: &str) -> ExternalRecord {
    ExternalRecord::new(
        None,
        Entity::Player(Player {
            name: name.to_string(),
            position: Some("M".into()),
            ..Player::default()
        }),
        Fidelity::Full,
    )
}

#[tokio::test]
async fn upserting_the_same_record_twice_is_idempotent() {
    let (resolver, store, mapper) = setup();

    let first = resolver
        .resolve_and_upsert(mapper.team(&arsenal(), Fidelity::Full), ScopeContext::default(), false)
        .await
        .unwrap();
    let rows_after_first = store.len();

    let second = resolver
        .resolve_and_upsert(mapper.team(&arsenal(), Fidelity::Full), ScopeContext::default(), false)
        .await
        .unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.id(), second.id());
    assert!(second.changed_fields.is_empty());
    assert_eq!(store.len(), rows_after_first);
    assert_eq!(store.all_of(EntityKind::Team).len(), 1);
}

#[tokio::test]
async fn degraded_record_never_clears_known_fields() {
    let (resolver, _store, mapper) = setup();
    let full = resolver
        .resolve_and_upsert(mapper.team(&arsenal(), Fidelity::Full), ScopeContext::default(), false)
        .await
        .unwrap();

    let degraded = resolver
        .resolve_and_upsert(
            mapper.team(&TeamShape::bare(42, "Arsenal"), Fidelity::Degraded),
            ScopeContext::default(),
            true,
        )
        .await
        .unwrap();

    assert_eq!(degraded.id(), full.id());
    let team = degraded.entity.entity.as_team().unwrap();
    assert_eq!(team.manager.as_deref(), Some("A. Manager"));
    assert_eq!(team.stadium.as_deref(), Some("Arsenal Ground"));
}

#[tokio::test]
async fn player_without_external_id_matches_by_name_within_team() {
    let (resolver, store, _mapper) = setup();

    let first = resolver
        .resolve_and_upsert(unlinked_player("Martin Ødegaard"), ScopeContext::team(1), false)
        .await
        .unwrap();
    let again = resolver
        .resolve_and_upsert(unlinked_player("  martin   ødegaard "), ScopeContext::team(1), false)
        .await
        .unwrap();
    let other_team = resolver
        .resolve_and_upsert(unlinked_player("Martin Ødegaard"), ScopeContext::team(2), false)
        .await
        .unwrap();

    assert_eq!(first.id(), again.id());
    assert_ne!(first.id(), other_team.id());
    assert_eq!(store.all_of(EntityKind::Player).len(), 2);
}

#[tokio::test]
async fn scoped_kind_without_id_or_scope_is_rejected() {
    let (resolver, store, _mapper) = setup();

    let err = resolver
        .resolve_and_upsert(unlinked_player("Bukayo Saka"), ScopeContext::default(), false)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::ValidationError(_)), "got {:?}", err);
    assert!(store.is_empty());
}

#[tokio::test]
async fn group_failure_leaves_the_store_untouched() {
    let (resolver, store, mapper) = setup();
    store.fail_writes_of(Some(EntityKind::Player));

    let team = mapper.team(&arsenal(), Fidelity::Full);
    let result = resolver
        .resolve_group(vec![team, unlinked_player("Declan Rice")], ScopeContext::team(1), false)
        .await;

    assert!(matches!(result, Err(AppError::PersistenceError(_))));
    assert!(store.is_empty());
}

#[tokio::test]
async fn lookup_finds_stored_entity_by_external_id() {
    let (resolver, _store, mapper) = setup();
    resolver
        .resolve_and_upsert(mapper.team(&arsenal(), Fidelity::Full), ScopeContext::default(), false)
        .await
        .unwrap();

    let found = resolver.lookup(EntityKind::Team, "42").await.unwrap();
    assert_eq!(found.and_then(|row| row.entity.name().map(str::to_string)), Some("Arsenal".into()));
    assert!(resolver.lookup(EntityKind::Team, "43").await.unwrap().is_none());
}

#[tokio::test]
async fn same_name_with_another_upstream_id_is_a_new_entity() {
    let (resolver, store, mapper) = setup();
    let first = resolver
        .resolve_and_upsert(mapper.team(&arsenal(), Fidelity::Full), ScopeContext::default(), false)
        .await
        .unwrap();

    let twin: TeamShape = from_value(payloads::team_body(43, "Arsenal")).unwrap();
    let second = resolver
        .resolve_and_upsert(mapper.team(&twin, Fidelity::Full), ScopeContext::default(), false)
        .await
        .unwrap();

    assert!(second.created);
    assert_ne!(first.id(), second.id());
    assert_eq!(store.all_of(EntityKind::Team).len(), 2);
}
