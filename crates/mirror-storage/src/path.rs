//! Storage path validation.

use crate::error::StorageError;

/// Check that `path` is a relative, `/`-separated path that stays inside the
/// storage root.
///
/// Rejects empty paths, leading `/`, backslashes, empty segments, and `.` or
/// `..` segments.
pub fn validate_path(path: &str) -> Result<(), StorageError> {
    let invalid = path.is_empty()
        || path.starts_with('/')
        || path.contains('\\')
        || path
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if invalid {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    Ok(())
}
