//! # Local Filesystem Backend
//!
//! Objects live under a root directory at their backend-relative path.
//! `write_atomic` streams into `.<name>.<uuid>.part` in the destination
//! directory, checks the length, fsyncs, and renames over the destination.
//! Any failure removes the staging file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use mirror_core::ByteStream;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::error::StorageError;
use crate::path::validate_path;
use crate::{StorageBackend, StoredObject};

/// Filesystem-backed storage rooted at a directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    /// Create a backend rooted at `root`. The directory is created lazily on
    /// first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        validate_path(path)?;
        Ok(self.root.join(path))
    }

    async fn write_staging(
        &self,
        path: &str,
        staging: &Path,
        mut body: ByteStream,
        content_length: Option<u64>,
    ) -> Result<u64, StorageError> {
        let mut file = fs::File::create(staging)
            .await
            .map_err(|e| StorageError::io(path, e))?;
        let mut written: u64 = 0;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| StorageError::io(path, e))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| StorageError::io(path, e))?;
            written += chunk.len() as u64;
        }
        if let Some(expected) = content_length {
            if expected != written {
                return Err(StorageError::LengthMismatch {
                    path: path.to_string(),
                    expected,
                    actual: written,
                });
            }
        }
        file.flush().await.map_err(|e| StorageError::io(path, e))?;
        file.sync_all().await.map_err(|e| StorageError::io(path, e))?;
        Ok(written)
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let full = self.resolve(path)?;
        match fs::metadata(&full).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    async fn open_read(&self, path: &str) -> Result<StoredObject, StorageError> {
        let full = self.resolve(path)?;
        let file = match fs::File::open(&full).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(path.to_string()))
            }
            Err(e) => return Err(StorageError::io(path, e)),
        };
        let meta = file
            .metadata()
            .await
            .map_err(|e| StorageError::io(path, e))?;
        if !meta.is_file() {
            return Err(StorageError::NotFound(path.to_string()));
        }
        Ok(StoredObject {
            size: Some(meta.len()),
            stream: ReaderStream::new(file).boxed(),
        })
    }

    async fn write_atomic(
        &self,
        path: &str,
        body: ByteStream,
        content_length: Option<u64>,
    ) -> Result<u64, StorageError> {
        let dest = self.resolve(path)?;
        let (Some(dir), Some(file_name)) = (dest.parent(), dest.file_name()) else {
            return Err(StorageError::InvalidPath(path.to_string()));
        };
        fs::create_dir_all(dir)
            .await
            .map_err(|e| StorageError::io(path, e))?;

        let staging = dir.join(format!(
            ".{}.{}.part",
            file_name.to_string_lossy(),
            Uuid::new_v4().simple()
        ));

        let written = match self.write_staging(path, &staging, body, content_length).await {
            Ok(written) => written,
            Err(e) => {
                warn!(path, error = %e, "local write failed, discarding staging file");
                let _ = fs::remove_file(&staging).await;
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&staging, &dest).await {
            warn!(from = ?staging, to = ?dest, error = %e, "failed to rename staging file");
            let _ = fs::remove_file(&staging).await;
            return Err(StorageError::io(path, e));
        }

        debug!(path, bytes = written, "stored object");
        Ok(written)
    }

    fn public_url(&self, _path: &str) -> Option<Url> {
        None
    }
}
