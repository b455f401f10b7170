use std::sync::Arc;

use crate::store::{DocumentStore, MemoryStore, Repository};

/// Shared handles injected into every handler and service.
#[derive(Clone)]
pub struct AppState {
    pub repo: Repository,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            repo: Repository::new(store),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }
}
