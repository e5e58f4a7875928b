pub mod entities;
pub mod record;
pub mod reference;
pub mod repository;

pub use entities::{
    Country, Entity, EntityKind, League, Match, MatchStatus, MergeMode, Mergeable, Player,
    Standing, Team, TopScorer, Transfer,
};
pub use record::{ExternalRecord, Link, NaturalKey, ScopeContext, StoredEntity, UpsertResult};
pub use reference::{ReferenceLeague, MAIN_LEAGUES, REFERENCE_LEAGUES};
pub use repository::{Batch, EntityQuery, EntityStore, StoreTx, TxWork};
