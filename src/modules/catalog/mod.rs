/// Entity resolution against the local store
///
/// Architecture:
/// - Domain: canonical entities, natural keys, store traits
/// - Infrastructure: Postgres (Diesel) and in-memory stores
/// - Application: record mapping and the resolver
pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{EntityResolver, RecordMapper};
pub use domain::{
    Batch, Entity, EntityKind, EntityQuery, EntityStore, ExternalRecord, Link, NaturalKey,
    ReferenceLeague, ScopeContext, StoredEntity, UpsertResult,
};
pub use infrastructure::{MemoryEntityStore, PostgresEntityStore};
