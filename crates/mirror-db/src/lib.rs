//! # mirror-db: Registry and Queue Persistence
//!
//! Two repository traits, each with a Postgres and an in-memory
//! implementation:
//!
//! - [`AssetRegistry`]: one [`AssetRecord`](mirror_core::AssetRecord) per
//!   uniquely cached file. Uniqueness is enforced by the store itself
//!   (`UNIQUE NULLS NOT DISTINCT` + `ON CONFLICT DO UPDATE` in Postgres, a
//!   single write lock in memory), so concurrent upserts of the same key
//!   converge on one row.
//! - [`TaskQueue`]: at-least-once delivery of population tasks. Postgres
//!   claims with `FOR UPDATE SKIP LOCKED` plus a lease, so a task held by a
//!   crashed worker becomes claimable again once its lease expires.
//!
//! ## Architecture
//!
//! The database is **optional**. When `DATABASE_URL` is set, [`init_pool`]
//! connects and applies the embedded migrations. When absent, callers fall
//! back to [`InMemoryAssetRegistry`] and [`InMemoryTaskQueue`], which is
//! suitable for single-process deployments and tests; nothing survives a
//! restart.

pub mod error;
pub mod queue;
pub mod registry;

pub use error::{QueueError, RegistryError};
pub use queue::memory::InMemoryTaskQueue;
pub use queue::postgres::PgTaskQueue;
pub use queue::{ClaimedTask, PopulationTask, TaskQueue, TaskStatus};
pub use registry::memory::InMemoryAssetRegistry;
pub use registry::postgres::PgAssetRegistry;
pub use registry::{AssetRegistry, SlugPage};

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Initialize the database connection pool and run migrations.
///
/// Returns `None` if `DATABASE_URL` is not set (in-memory-only mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!(
                "DATABASE_URL not set, running in-memory only mode. \
                 The registry and task queue will not survive restarts."
            );
            return Ok(None);
        }
    };
    connect(&url).await.map(Some)
}

/// Connect to `url` and apply the embedded migrations.
pub async fn connect(url: &str) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(1)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(pool)
}
