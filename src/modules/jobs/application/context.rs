use crate::modules::catalog::{EntityResolver, EntityStore, MemoryEntityStore, RecordMapper};
use crate::modules::jobs::application::orchestrator::Orchestrator;
use crate::modules::jobs::infrastructure::JobRegistry;
use crate::modules::provider::FetchGateway;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;

/// Services every pipeline works with.
#[derive(Clone)]
pub struct SyncContext {
    pub gateway: Arc<FetchGateway>,
    pub resolver: Arc<EntityResolver>,
    pub mapper: RecordMapper,
    pub orchestrator: Orchestrator,
    pub registry: JobRegistry,
}

impl SyncContext {
    pub fn new(
        gateway: Arc<FetchGateway>,
        store: Arc<dyn EntityStore>,
        orchestrator: Orchestrator,
        registry: JobRegistry,
    ) -> Self {
        let mapper = RecordMapper::new(gateway.endpoints().clone());
        Self {
            gateway,
            resolver: Arc::new(EntityResolver::new(store)),
            mapper,
            orchestrator,
            registry,
        }
    }

    /// Same services, resolving into a throwaway in-memory store.
    pub fn dry_run(&self) -> Self {
        Self {
            resolver: Arc::new(EntityResolver::new(Arc::new(MemoryEntityStore::new()))),
            ..self.clone()
        }
    }

    pub fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}
