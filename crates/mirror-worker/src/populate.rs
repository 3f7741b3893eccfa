//! Single-descriptor population.

use std::sync::Arc;

use mirror_core::{version_from_file_name, AssetDescriptor, AssetRecord};
use mirror_db::AssetRegistry;
use mirror_origin::{OriginClient, OriginResponse};
use mirror_storage::StorageBackend;
use tracing::{debug, info};

use crate::error::PopulateError;

/// What a successful population did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopulateOutcome {
    /// Bytes were fetched and written.
    Stored { record: AssetRecord, bytes: u64 },
    /// The object was already present; only the registry row was refreshed.
    AlreadyCached { record: AssetRecord },
}

impl PopulateOutcome {
    pub fn record(&self) -> &AssetRecord {
        match self {
            Self::Stored { record, .. } | Self::AlreadyCached { record } => record,
        }
    }
}

/// Fetches, stores and records one asset.
#[derive(Clone)]
pub struct PopulationWorker {
    storage: Arc<dyn StorageBackend>,
    registry: Arc<dyn AssetRegistry>,
    origin: OriginClient,
}

impl PopulationWorker {
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        registry: Arc<dyn AssetRegistry>,
        origin: OriginClient,
    ) -> Self {
        Self {
            storage,
            registry,
            origin,
        }
    }

    /// Populate the cache for `descriptor`.
    pub async fn populate(
        &self,
        descriptor: &AssetDescriptor,
    ) -> Result<PopulateOutcome, PopulateError> {
        descriptor
            .validate()
            .map_err(|e| PopulateError::Fatal(e.to_string()))?;
        let path = descriptor.storage_path();

        if self.storage.exists(&path).await? {
            let record = self.refresh_record(descriptor).await?;
            debug!(path, kind = %descriptor.kind, "object already cached, refreshed registry");
            return Ok(PopulateOutcome::AlreadyCached { record });
        }

        let response = self.origin.fetch(descriptor).await?;
        let version = resolve_version(descriptor, &response);
        let upstream = response.url.to_string();
        let content_length = response.content_length;

        let bytes = self
            .storage
            .write_atomic(&path, response.into_stream(), content_length)
            .await?;

        let resolved = descriptor.clone().with_version(version);
        let record = self
            .registry
            .upsert(AssetRecord::from_descriptor(&resolved, upstream))
            .await?;

        info!(
            path,
            bytes,
            kind = %descriptor.kind,
            slug = ?descriptor.slug,
            version = ?record.version,
            backend = self.storage.name(),
            "populated asset"
        );
        Ok(PopulateOutcome::Stored { record, bytes })
    }

    /// Re-upsert the row of an object that is already stored.
    ///
    /// The existing row keeps the version resolved when the bytes were first
    /// fetched; a descriptor without one must not create a second row.
    async fn refresh_record(
        &self,
        descriptor: &AssetDescriptor,
    ) -> Result<AssetRecord, PopulateError> {
        let existing = self
            .registry
            .find_by_descriptor(
                descriptor.kind,
                descriptor.slug.as_deref(),
                descriptor.version.as_deref(),
                &descriptor.file_name,
            )
            .await?;
        let record = match existing {
            Some(found) => {
                let version = descriptor.version.clone().or(found.version);
                let resolved = descriptor.clone().with_version(version);
                AssetRecord::from_descriptor(&resolved, found.upstream_url)
            }
            None => {
                let upstream = self.origin.url_for(descriptor)?;
                AssetRecord::from_descriptor(descriptor, upstream.as_str())
            }
        };
        Ok(self.registry.upsert(record).await?)
    }
}

/// The request's version, else the origin's `Content-Disposition` file name,
/// else the final URL's file name.
fn resolve_version(descriptor: &AssetDescriptor, response: &OriginResponse) -> Option<String> {
    descriptor
        .version
        .clone()
        .or_else(|| {
            response
                .disposition_file_name()
                .and_then(|name| version_from_file_name(descriptor.kind, &name))
        })
        .or_else(|| {
            response
                .final_file_name()
                .and_then(|name| version_from_file_name(descriptor.kind, &name))
        })
}
