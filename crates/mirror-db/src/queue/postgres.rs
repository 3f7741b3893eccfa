//! Postgres-backed task queue over the `population_tasks` table.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mirror_core::AssetDescriptor;
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    attempts_from_db, attempts_to_db, ClaimedTask, PopulationTask, TaskQueue, TaskStatus,
    DEFAULT_LEASE,
};
use crate::error::QueueError;

type PgQuery<'q> = sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>;

/// Task queue persisted in Postgres.
///
/// `claim` takes the oldest available row with `FOR UPDATE SKIP LOCKED`,
/// so concurrent workers never receive the same task while its lease holds.
#[derive(Debug, Clone)]
pub struct PgTaskQueue {
    pool: PgPool,
    lease: Duration,
}

impl PgTaskQueue {
    pub fn new(pool: PgPool) -> Self {
        Self::with_lease(pool, DEFAULT_LEASE)
    }

    pub fn with_lease(pool: PgPool, lease: Duration) -> Self {
        Self { pool, lease }
    }

    async fn update_one(&self, id: Uuid, query: PgQuery<'_>) -> Result<(), QueueError> {
        let result = query.execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(QueueError::NotFound(id));
        }
        Ok(())
    }
}

#[async_trait]
impl TaskQueue for PgTaskQueue {
    async fn enqueue(&self, descriptor: &AssetDescriptor) -> Result<Uuid, QueueError> {
        let payload = serde_json::to_value(descriptor)?;
        let id = Uuid::new_v4();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO population_tasks (id, payload, status, attempts, available_at, created_at, updated_at)
             VALUES ($1, $2, 'queued', 0, $3, $3, $3)",
        )
        .bind(id)
        .bind(&payload)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    async fn claim(&self) -> Result<Option<ClaimedTask>, QueueError> {
        let now = Utc::now();
        let lease = chrono::Duration::from_std(self.lease).unwrap_or(chrono::Duration::MAX);
        let locked_until = now.checked_add_signed(lease).unwrap_or(DateTime::<Utc>::MAX_UTC);

        let row = sqlx::query_as::<_, (Uuid, serde_json::Value, i32)>(
            "UPDATE population_tasks
             SET status = 'running', locked_until = $2, updated_at = $1
             WHERE id = (
                 SELECT id FROM population_tasks
                 WHERE (status = 'queued' AND available_at <= $1)
                    OR (status = 'running' AND locked_until < $1)
                 ORDER BY available_at, created_at
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING id, payload, attempts",
        )
        .bind(now)
        .bind(locked_until)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, payload, attempts)| ClaimedTask {
            id,
            payload,
            attempts: attempts_from_db(attempts),
        }))
    }

    async fn record_failure(
        &self,
        id: Uuid,
        attempts: u32,
        error: &str,
        retry_at: DateTime<Utc>,
    ) -> Result<(), QueueError> {
        let query = sqlx::query(
            "UPDATE population_tasks
             SET status = 'queued', attempts = $2, last_error = $3,
                 available_at = $4, locked_until = NULL, updated_at = now()
             WHERE id = $1",
        )
        .bind(id)
        .bind(attempts_to_db(attempts))
        .bind(error)
        .bind(retry_at);
        self.update_one(id, query).await
    }

    async fn complete(&self, id: Uuid) -> Result<(), QueueError> {
        let query = sqlx::query(
            "UPDATE population_tasks
             SET status = 'done', locked_until = NULL, updated_at = now()
             WHERE id = $1",
        )
        .bind(id);
        self.update_one(id, query).await
    }

    async fn dead_letter(&self, id: Uuid, attempts: u32, error: &str) -> Result<(), QueueError> {
        let query = sqlx::query(
            "UPDATE population_tasks
             SET status = 'failed', attempts = $2, last_error = $3,
                 locked_until = NULL, updated_at = now()
             WHERE id = $1",
        )
        .bind(id)
        .bind(attempts_to_db(attempts))
        .bind(error);
        self.update_one(id, query).await
    }

    async fn list_failed(&self, limit: u32) -> Result<Vec<PopulationTask>, QueueError> {
        let rows = sqlx::query_as::<_, TaskRow>(
            "SELECT id, payload, status, attempts, last_error, available_at,
                    locked_until, created_at, updated_at
             FROM population_tasks
             WHERE status = 'failed'
             ORDER BY updated_at DESC
             LIMIT $1",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TaskRow::into_task).collect()
    }

    async fn get(&self, id: Uuid) -> Result<Option<PopulationTask>, QueueError> {
        let row = sqlx::query_as::<_, TaskRow>(
            "SELECT id, payload, status, attempts, last_error, available_at,
                    locked_until, created_at, updated_at
             FROM population_tasks WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TaskRow::into_task).transpose()
    }
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct TaskRow {
    id: Uuid,
    payload: serde_json::Value,
    status: String,
    attempts: i32,
    last_error: Option<String>,
    available_at: DateTime<Utc>,
    locked_until: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TaskRow {
    fn into_task(self) -> Result<PopulationTask, QueueError> {
        let status = self
            .status
            .parse::<TaskStatus>()
            .map_err(|reason| QueueError::Corrupt {
                id: self.id,
                reason,
            })?;
        Ok(PopulationTask {
            id: self.id,
            payload: self.payload,
            status,
            attempts: attempts_from_db(self.attempts),
            last_error: self.last_error,
            available_at: self.available_at,
            locked_until: self.locked_until,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
