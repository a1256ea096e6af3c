//! Service bundle handed to fetch controllers

use std::sync::Arc;

use ahash::AHashMap;
use gf_core::services::{DatasourceListing, DefinitionService, QueryService, RowService};
use parking_lot::RwLock;
use tracing::info;

use crate::sources::Adapter;

/// External services plus the adapters registered per backend connection
#[derive(Clone)]
pub struct ServiceRegistry {
    pub definitions: Arc<dyn DefinitionService>,
    pub datasources: Arc<dyn DatasourceListing>,
    pub queries: Arc<dyn QueryService>,
    pub rows: Arc<dyn RowService>,
    adapters: Arc<RwLock<AHashMap<String, Arc<dyn Adapter>>>>,
}

impl ServiceRegistry {
    pub fn new(
        definitions: Arc<dyn DefinitionService>,
        datasources: Arc<dyn DatasourceListing>,
        queries: Arc<dyn QueryService>,
        rows: Arc<dyn RowService>,
    ) -> Self {
        Self {
            definitions,
            datasources,
            queries,
            rows,
            adapters: Arc::new(RwLock::new(AHashMap::new())),
        }
    }

    /// Register the adapter serving a backend connection, replacing any previous one
    pub fn register_adapter(&self, source_id: impl Into<String>, adapter: Arc<dyn Adapter>) {
        let source_id = source_id.into();
        info!("Registering adapter for source {}", source_id);
        self.adapters.write().insert(source_id, adapter);
    }

    pub fn adapter(&self, source_id: &str) -> Option<Arc<dyn Adapter>> {
        self.adapters.read().get(source_id).cloned()
    }

    pub fn remove_adapter(&self, source_id: &str) -> Option<Arc<dyn Adapter>> {
        self.adapters.write().remove(source_id)
    }
}
