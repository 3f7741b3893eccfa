//! # mirror-cli: Operator CLI for the Asset Mirror
//!
//! ## Subcommands
//!
//! - `mirror worker`: run a standalone population worker pool.
//! - `mirror identify`: show how a request path is parsed.
//! - `mirror warm`: enqueue population tasks for known paths.
//! - `mirror failed`: list dead-lettered population tasks.
//!
//! ```bash
//! mirror identify /plugin/akismet.5.3.zip
//! mirror warm /wordpress-6.4.2.zip /theme/linnet.1.0.15.zip
//! DATABASE_URL=postgres://... mirror worker --concurrency 8
//! mirror failed --limit 20
//! ```
//!
//! Every command except `identify` needs `DATABASE_URL`: an in-memory queue
//! would not be shared with the API process.

pub mod failed;
pub mod identify;
pub mod warm;
pub mod worker;

use anyhow::{Context, Result};
use mirror_db::{PgAssetRegistry, PgTaskQueue};

/// Connect to Postgres from `DATABASE_URL` and apply migrations.
pub async fn connect_database() -> Result<(PgAssetRegistry, PgTaskQueue)> {
    let url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set; this command operates on the shared Postgres queue")?;
    let pool = mirror_db::connect(&url)
        .await
        .context("failed to connect to the database")?;
    Ok((PgAssetRegistry::new(pool.clone()), PgTaskQueue::new(pool)))
}

/// Split `path?query` into its parts.
pub fn split_request(raw: &str) -> (&str, Option<&str>) {
    match raw.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (raw, None),
    }
}
