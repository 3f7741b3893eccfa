//! In-memory registry for single-process deployments and tests.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use mirror_core::{AssetKey, AssetKind, AssetRecord};
use parking_lot::RwLock;

use super::{AssetRegistry, SlugPage};
use crate::error::RegistryError;

/// Registry held in a `HashMap` keyed by [`AssetKey`].
///
/// Upserts check and set under one write lock, which gives the same
/// one-row-per-key guarantee as the Postgres unique constraint.
#[derive(Debug, Default)]
pub struct InMemoryAssetRegistry {
    records: RwLock<HashMap<AssetKey, AssetRecord>>,
}

impl InMemoryAssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl AssetRegistry for InMemoryAssetRegistry {
    async fn upsert(&self, record: AssetRecord) -> Result<AssetRecord, RegistryError> {
        let mut records = self.records.write();
        let stored = records
            .entry(record.key())
            .and_modify(|existing| {
                existing.repository = record.repository.clone();
                existing.upstream_url = record.upstream_url.clone();
                existing.storage_path = record.storage_path.clone();
                existing.updated_at = Utc::now().max(existing.updated_at);
            })
            .or_insert(record);
        Ok(stored.clone())
    }

    async fn find_by_descriptor(
        &self,
        kind: AssetKind,
        slug: Option<&str>,
        version: Option<&str>,
        file_name: &str,
    ) -> Result<Option<AssetRecord>, RegistryError> {
        let records = self.records.read();
        Ok(records
            .values()
            .filter(|r| {
                r.kind == kind
                    && r.slug.as_deref() == slug
                    && (version.is_none() || r.version.as_deref() == version)
                    && r.file_name == file_name
            })
            .max_by_key(|r| r.updated_at)
            .cloned())
    }

    async fn list_by_slug(
        &self,
        kind: AssetKind,
        slug: &str,
    ) -> Result<Vec<AssetRecord>, RegistryError> {
        let records = self.records.read();
        let mut found: Vec<AssetRecord> = records
            .values()
            .filter(|r| r.kind == kind && r.slug.as_deref() == Some(slug))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(found)
    }

    async fn list_slugs(
        &self,
        kind: AssetKind,
        search: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<SlugPage, RegistryError> {
        let needle = search.map(str::to_lowercase);
        let records = self.records.read();
        let slugs: BTreeSet<&str> = records
            .values()
            .filter(|r| r.kind == kind)
            .filter_map(|r| r.slug.as_deref())
            .filter(|slug| match &needle {
                Some(n) => slug.to_lowercase().contains(n.as_str()),
                None => true,
            })
            .collect();
        Ok(SlugPage {
            total: slugs.len() as u64,
            slugs: slugs
                .into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .map(str::to_string)
                .collect(),
        })
    }

    async fn health_check(&self) -> Result<(), RegistryError> {
        Ok(())
    }
}
