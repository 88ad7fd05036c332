use std::sync::Arc;

use crate::config::Config;
use crate::matching::enhancement::Enhancer;
use crate::matching::MatchService;
use crate::storage::{BlobStore, MemoryBlobStore};
use crate::store::{DocumentStore, MatchStore, MemoryStore};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub documents: Arc<dyn DocumentStore>,
    pub matches: Arc<dyn MatchStore>,
    /// Original resume uploads (S3, or process memory when no bucket is configured).
    pub blobs: Arc<dyn BlobStore>,
    pub service: MatchService,
    pub config: Config,
}

impl AppState {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        matches: Arc<dyn MatchStore>,
        blobs: Arc<dyn BlobStore>,
        enhancer: Enhancer,
        config: Config,
    ) -> Self {
        let service = MatchService::new(
            documents.clone(),
            matches.clone(),
            enhancer,
            config.ai_enhancement_concurrency,
        );
        Self {
            documents,
            matches,
            blobs,
            service,
            config,
        }
    }

    /// State backed entirely by process memory.
    pub fn in_memory(enhancer: Enhancer, config: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::new(
            store.clone(),
            store,
            Arc::new(MemoryBlobStore::new()),
            enhancer,
            config,
        )
    }
}
