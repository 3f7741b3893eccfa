//! Storage backend selection from the environment.

use std::path::PathBuf;
use std::sync::Arc;

use url::Url;

use crate::error::StorageError;
use crate::local::LocalStorage;
use crate::object::ObjectStorage;
use crate::StorageBackend;

/// Which backend to build, and how.
///
/// Custom `Debug` redacts the object store token.
#[derive(Clone)]
pub enum StorageConfig {
    Local {
        root: PathBuf,
    },
    Object {
        endpoint: Url,
        bucket: String,
        token: Option<String>,
        public_url: Option<Url>,
    },
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local { root } => f.debug_struct("Local").field("root", root).finish(),
            Self::Object {
                endpoint,
                bucket,
                token,
                public_url,
            } => f
                .debug_struct("Object")
                .field("endpoint", &endpoint.as_str())
                .field("bucket", bucket)
                .field("token", &token.as_ref().map(|_| "[REDACTED]"))
                .field("public_url", &public_url.as_ref().map(Url::as_str))
                .finish(),
        }
    }
}

impl StorageConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `MIRROR_STORAGE`: `local` (default) or `object`
    /// - `MIRROR_STORAGE_ROOT`: local root (default: `./storage`)
    /// - `MIRROR_OBJECT_ENDPOINT`: object store endpoint (required for `object`)
    /// - `MIRROR_OBJECT_BUCKET`: bucket name (required for `object`)
    /// - `MIRROR_OBJECT_TOKEN`: optional bearer token
    /// - `MIRROR_OBJECT_PUBLIC_URL`: optional public base URL
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let backend = lookup("MIRROR_STORAGE").unwrap_or_else(|| "local".to_string());
        match backend.as_str() {
            "local" => Ok(Self::Local {
                root: lookup("MIRROR_STORAGE_ROOT")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("./storage")),
            }),
            "object" => {
                let endpoint = required_url(&lookup, "MIRROR_OBJECT_ENDPOINT")?;
                let bucket = lookup("MIRROR_OBJECT_BUCKET")
                    .filter(|b| !b.is_empty())
                    .ok_or(ConfigError::Missing("MIRROR_OBJECT_BUCKET"))?;
                let public_url = lookup("MIRROR_OBJECT_PUBLIC_URL")
                    .map(|raw| parse_url("MIRROR_OBJECT_PUBLIC_URL", &raw))
                    .transpose()?;
                Ok(Self::Object {
                    endpoint,
                    bucket,
                    token: lookup("MIRROR_OBJECT_TOKEN").filter(|t| !t.is_empty()),
                    public_url,
                })
            }
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }

    /// Construct the configured backend.
    pub fn build(&self) -> Result<Arc<dyn StorageBackend>, StorageError> {
        match self {
            Self::Local { root } => Ok(Arc::new(LocalStorage::new(root.clone()))),
            Self::Object {
                endpoint,
                bucket,
                token,
                public_url,
            } => Ok(Arc::new(ObjectStorage::new(
                endpoint.clone(),
                bucket.clone(),
                token.clone(),
                public_url.clone(),
            )?)),
        }
    }
}

fn required_url(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Url, ConfigError> {
    let raw = lookup(var).ok_or(ConfigError::Missing(var))?;
    parse_url(var, &raw)
}

fn parse_url(var: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

/// Storage configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required for object storage")]
    Missing(&'static str),
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("unknown storage backend {0:?} (expected \"local\" or \"object\")")]
    UnknownBackend(String),
}
