pub mod memory_store;
pub mod models;
pub mod postgres_store;

pub use memory_store::MemoryEntityStore;
pub use postgres_store::PostgresEntityStore;
