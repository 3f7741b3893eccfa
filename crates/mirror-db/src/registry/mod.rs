//! # Asset Registry
//!
//! Repository trait over persisted [`AssetRecord`]s.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use mirror_core::{AssetKind, AssetRecord};

use crate::error::RegistryError;

/// One page of distinct slugs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlugPage {
    /// Slugs on this page, in ascending order.
    pub slugs: Vec<String>,
    /// Distinct slugs matching the query across all pages.
    pub total: u64,
}

/// Persistent metadata for cached files.
#[async_trait]
pub trait AssetRegistry: Send + Sync {
    /// Insert `record`, or refresh the existing record with the same
    /// [`AssetKey`](mirror_core::AssetKey).
    ///
    /// On conflict the stored `id` and `created_at` are kept; repository,
    /// upstream URL, storage path and `updated_at` take the new values.
    /// Returns the stored record.
    async fn upsert(&self, record: AssetRecord) -> Result<AssetRecord, RegistryError>;

    /// Look up a record. A `version` of `None` matches any stored version,
    /// so a request for `akismet.zip` finds the row whose version was
    /// resolved from the origin. When several rows match, the most recently
    /// updated one wins.
    async fn find_by_descriptor(
        &self,
        kind: AssetKind,
        slug: Option<&str>,
        version: Option<&str>,
        file_name: &str,
    ) -> Result<Option<AssetRecord>, RegistryError>;

    /// Every record of `kind` for `slug`, newest first.
    async fn list_by_slug(
        &self,
        kind: AssetKind,
        slug: &str,
    ) -> Result<Vec<AssetRecord>, RegistryError>;

    /// Distinct slugs of `kind`, optionally filtered by a case-insensitive
    /// substring, paged with `limit`/`offset`.
    async fn list_slugs(
        &self,
        kind: AssetKind,
        search: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<SlugPage, RegistryError>;

    /// Cheap connectivity probe for readiness checks.
    async fn health_check(&self) -> Result<(), RegistryError>;
}
