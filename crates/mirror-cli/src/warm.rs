//! # Warm Subcommand
//!
//! Enqueues population tasks so the worker fills the cache before any client
//! asks. All paths are parsed first; nothing is enqueued if one is invalid.

use anyhow::{bail, Result};
use clap::Args;
use mirror_core::{identify, AssetDescriptor};
use mirror_db::TaskQueue;

use crate::{connect_database, split_request};

/// Arguments for `mirror warm`.
#[derive(Args, Debug)]
pub struct WarmArgs {
    /// Request paths to populate (same form as download URLs).
    #[arg(required = true)]
    pub paths: Vec<String>,
}

pub async fn run_warm(args: &WarmArgs) -> Result<u8> {
    let descriptors = parse_paths(&args.paths)?;
    let (_, queue) = connect_database().await?;
    enqueue_all(&queue, &descriptors).await?;
    Ok(0)
}

/// Parse every path, reporting all failures together.
pub fn parse_paths(paths: &[String]) -> Result<Vec<AssetDescriptor>> {
    let mut descriptors = Vec::with_capacity(paths.len());
    let mut errors = Vec::new();
    for raw in paths {
        let (path, query) = split_request(raw);
        match identify(path, query) {
            Ok(d) => descriptors.push(d),
            Err(e) => errors.push(format!("{raw}: {e}")),
        }
    }
    if !errors.is_empty() {
        bail!("invalid paths:\n  {}", errors.join("\n  "));
    }
    Ok(descriptors)
}

async fn enqueue_all(queue: &dyn TaskQueue, descriptors: &[AssetDescriptor]) -> Result<()> {
    for descriptor in descriptors {
        let id = queue.enqueue(descriptor).await?;
        println!("{id}  {}", descriptor.storage_path());
        tracing::info!(task_id = %id, file = %descriptor.file_name, "enqueued population task");
    }
    Ok(())
}
