//! # Application State
//!
//! Shared handles passed to every handler. Storage, registry and queue are
//! trait objects so the same router runs against Postgres or the in-memory
//! implementations.

use std::sync::Arc;

use mirror_db::{AssetRegistry, TaskQueue};
use mirror_origin::OriginClient;
use mirror_storage::StorageBackend;

use crate::config::AppConfig;
use crate::middleware::metrics::ApiMetrics;
use crate::orchestrator::DownloadOrchestrator;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub registry: Arc<dyn AssetRegistry>,
    pub orchestrator: DownloadOrchestrator,
    pub metrics: ApiMetrics,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(
        config: AppConfig,
        storage: Arc<dyn StorageBackend>,
        registry: Arc<dyn AssetRegistry>,
        queue: Arc<dyn TaskQueue>,
        origin: OriginClient,
    ) -> Self {
        let metrics = ApiMetrics::new();
        let orchestrator = DownloadOrchestrator::new(storage, origin, queue, metrics.clone());
        Self {
            config,
            registry,
            orchestrator,
            metrics,
        }
    }
}
