//! Postgres-backed registry over the `assets` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mirror_core::{AssetKind, AssetRecord};
use sqlx::PgPool;
use uuid::Uuid;

use super::{AssetRegistry, SlugPage};
use crate::error::RegistryError;

const COLUMNS: &str = "id, kind, slug, file_name, version, revision, repository, \
                       upstream_url, storage_path, created_at, updated_at";

/// Registry persisted in Postgres.
#[derive(Debug, Clone)]
pub struct PgAssetRegistry {
    pool: PgPool,
}

impl PgAssetRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AssetRegistry for PgAssetRegistry {
    async fn upsert(&self, record: AssetRecord) -> Result<AssetRecord, RegistryError> {
        let sql = format!(
            "INSERT INTO assets ({COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             ON CONFLICT ON CONSTRAINT assets_identity_key DO UPDATE SET
                 repository = EXCLUDED.repository,
                 upstream_url = EXCLUDED.upstream_url,
                 storage_path = EXCLUDED.storage_path,
                 updated_at = GREATEST(assets.updated_at, EXCLUDED.updated_at)
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, AssetRow>(&sql)
            .bind(record.id)
            .bind(record.kind.as_str())
            .bind(&record.slug)
            .bind(&record.file_name)
            .bind(&record.version)
            .bind(&record.revision)
            .bind(&record.repository)
            .bind(&record.upstream_url)
            .bind(&record.storage_path)
            .bind(record.created_at)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;
        row.into_record()
    }

    async fn find_by_descriptor(
        &self,
        kind: AssetKind,
        slug: Option<&str>,
        version: Option<&str>,
        file_name: &str,
    ) -> Result<Option<AssetRecord>, RegistryError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM assets
             WHERE kind = $1
               AND slug IS NOT DISTINCT FROM $2
               AND ($3::TEXT IS NULL OR version = $3)
               AND file_name = $4
             ORDER BY updated_at DESC
             LIMIT 1"
        );
        let row = sqlx::query_as::<_, AssetRow>(&sql)
            .bind(kind.as_str())
            .bind(slug)
            .bind(version)
            .bind(file_name)
            .fetch_optional(&self.pool)
            .await?;
        row.map(AssetRow::into_record).transpose()
    }

    async fn list_by_slug(
        &self,
        kind: AssetKind,
        slug: &str,
    ) -> Result<Vec<AssetRecord>, RegistryError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM assets
             WHERE kind = $1 AND slug = $2
             ORDER BY updated_at DESC"
        );
        let rows = sqlx::query_as::<_, AssetRow>(&sql)
            .bind(kind.as_str())
            .bind(slug)
            .fetch_all(&self.pool)
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            match row.into_record() {
                Ok(record) => records.push(record),
                Err(e) => tracing::error!(error = %e, "skipping corrupt asset row in list_by_slug"),
            }
        }
        Ok(records)
    }

    async fn list_slugs(
        &self,
        kind: AssetKind,
        search: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<SlugPage, RegistryError> {
        let pattern = search.map(|s| format!("%{}%", escape_like(s)));

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT slug) FROM assets
             WHERE kind = $1 AND slug IS NOT NULL
               AND ($2::TEXT IS NULL OR slug ILIKE $2)",
        )
        .bind(kind.as_str())
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let slugs: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT slug FROM assets
             WHERE kind = $1 AND slug IS NOT NULL
               AND ($2::TEXT IS NULL OR slug ILIKE $2)
             ORDER BY slug
             LIMIT $3 OFFSET $4",
        )
        .bind(kind.as_str())
        .bind(&pattern)
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(&self.pool)
        .await?;

        Ok(SlugPage {
            slugs,
            total: u64::try_from(total).unwrap_or_default(),
        })
    }

    async fn health_check(&self) -> Result<(), RegistryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct AssetRow {
    id: Uuid,
    kind: String,
    slug: Option<String>,
    file_name: String,
    version: Option<String>,
    revision: Option<String>,
    repository: String,
    upstream_url: String,
    storage_path: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AssetRow {
    fn into_record(self) -> Result<AssetRecord, RegistryError> {
        let kind = self
            .kind
            .parse::<AssetKind>()
            .map_err(|e| RegistryError::Corrupt {
                id: self.id,
                reason: e.to_string(),
            })?;
        Ok(AssetRecord {
            id: self.id,
            kind,
            slug: self.slug,
            file_name: self.file_name,
            version: self.version,
            revision: self.revision,
            repository: self.repository,
            upstream_url: self.upstream_url,
            storage_path: self.storage_path,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
