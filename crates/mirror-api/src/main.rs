//! # mirror-api: Binary Entry Point
//!
//! Starts the Axum HTTP server and, unless `MIRROR_EMBEDDED_WORKERS=0`, an
//! embedded population worker pool sharing the same queue.

use std::sync::Arc;

use mirror_api::config::AppConfig;
use mirror_api::state::AppState;
use mirror_db::{
    AssetRegistry, InMemoryAssetRegistry, InMemoryTaskQueue, PgAssetRegistry, PgTaskQueue,
    TaskQueue,
};
use mirror_origin::{OriginClient, OriginConfig};
use mirror_storage::StorageConfig;
use mirror_worker::{PopulationWorker, TaskRunner, WorkerConfig, WorkerPool};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;
    mirror_api::init_tracing(config.log_format);
    tracing::info!(?config, "loaded configuration");

    let storage = StorageConfig::from_env()?.build()?;
    tracing::info!(backend = storage.name(), "storage backend ready");

    let origin = OriginClient::new(OriginConfig::from_env()?)?;

    // Initialize database pool (optional; absent means in-memory only).
    let db_pool = mirror_db::init_pool().await.map_err(|e| {
        tracing::error!("Database initialization failed: {e}");
        e
    })?;
    let (registry, queue): (Arc<dyn AssetRegistry>, Arc<dyn TaskQueue>) = match db_pool {
        Some(pool) => (
            Arc::new(PgAssetRegistry::new(pool.clone())),
            Arc::new(PgTaskQueue::new(pool)),
        ),
        None => (
            Arc::new(InMemoryAssetRegistry::new()),
            Arc::new(InMemoryTaskQueue::new()),
        ),
    };

    let workers = WorkerConfig::from_env();
    let cancel = CancellationToken::new();
    let handles = if workers.concurrency > 0 {
        let worker = PopulationWorker::new(storage.clone(), registry.clone(), origin.clone());
        let runner = TaskRunner::new(worker, queue.clone(), workers.retry_policy());
        WorkerPool::new(runner, workers.concurrency, workers.poll_interval).spawn(cancel.clone())
    } else {
        tracing::info!("embedded workers disabled; run `mirror worker` to populate the cache");
        Vec::new()
    };

    let state = AppState::new(config.clone(), storage, registry, queue, origin);
    let app = mirror_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Mirror API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cancel.cancel();
    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!("population worker did not stop cleanly: {e}");
        }
    }
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
