//! # Asset Records
//!
//! One [`AssetRecord`] exists per uniquely cached file. The uniqueness key is
//! [`AssetKey`]: `(kind, slug, version, revision, file_name)`, with `None`
//! components comparing equal to each other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::descriptor::AssetDescriptor;
use crate::kind::AssetKind;

/// Registry metadata for a cached file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub id: Uuid,
    pub kind: AssetKind,
    pub slug: Option<String>,
    pub file_name: String,
    pub version: Option<String>,
    pub revision: Option<String>,
    /// Origin repository: `core`, `plugin` or `theme`.
    pub repository: String,
    /// Origin URL the bytes were fetched from.
    pub upstream_url: String,
    /// Backend-relative storage path.
    pub storage_path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AssetRecord {
    /// Build a fresh record for a descriptor that was just stored.
    ///
    /// `id` and timestamps are placeholders until the registry upsert
    /// returns the persisted row.
    pub fn from_descriptor(descriptor: &AssetDescriptor, upstream_url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            kind: descriptor.kind,
            slug: descriptor.slug.clone(),
            file_name: descriptor.file_name.clone(),
            version: descriptor.version.clone(),
            revision: descriptor.revision.clone(),
            repository: descriptor.kind.repository().to_string(),
            upstream_url: upstream_url.into(),
            storage_path: descriptor.storage_path(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The uniqueness key of this record.
    pub fn key(&self) -> AssetKey {
        AssetKey {
            kind: self.kind,
            slug: self.slug.clone(),
            version: self.version.clone(),
            revision: self.revision.clone(),
            file_name: self.file_name.clone(),
        }
    }
}

/// Registry uniqueness key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetKey {
    pub kind: AssetKind,
    pub slug: Option<String>,
    pub version: Option<String>,
    pub revision: Option<String>,
    pub file_name: String,
}
