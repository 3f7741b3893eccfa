//! # Worker Subcommand
//!
//! Runs a population worker pool against the shared Postgres queue until
//! Ctrl-C. Storage and origin are configured from the same environment
//! variables as the API.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use mirror_origin::{OriginClient, OriginConfig};
use mirror_storage::StorageConfig;
use mirror_worker::{PopulationWorker, TaskRunner, WorkerConfig, WorkerPool};
use tokio_util::sync::CancellationToken;

use crate::connect_database;

/// Arguments for `mirror worker`.
#[derive(Args, Debug)]
pub struct WorkerArgs {
    /// Number of concurrent worker loops (default: `MIRROR_EMBEDDED_WORKERS` or 2).
    #[arg(long)]
    pub concurrency: Option<usize>,
}

pub async fn run_worker(args: &WorkerArgs) -> Result<u8> {
    let mut config = WorkerConfig::from_env();
    if let Some(n) = args.concurrency {
        config.concurrency = n;
    }
    config.concurrency = config.concurrency.max(1);

    let storage = StorageConfig::from_env()
        .context("storage configuration")?
        .build()
        .context("storage backend")?;
    let origin = OriginClient::new(OriginConfig::from_env().context("origin configuration")?)?;
    let (registry, queue) = connect_database().await?;

    let worker = PopulationWorker::new(storage, Arc::new(registry), origin);
    let runner = TaskRunner::new(worker, Arc::new(queue), config.retry_policy());
    let pool = WorkerPool::new(runner, config.concurrency, config.poll_interval);

    let cancel = CancellationToken::new();
    let signal = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for shutdown signal: {e}");
            return;
        }
        tracing::info!("shutdown signal received, finishing in-flight tasks");
        signal.cancel();
    });

    pool.run(cancel).await;
    Ok(0)
}
