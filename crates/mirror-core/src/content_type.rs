//! Content types inferred from file extensions.

/// Fallback when neither the extension nor the origin says otherwise.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Infer the MIME type of a mirrored file from its name.
///
/// Returns `None` for extensions the mirror does not serve, so callers can
/// fall back to an origin-supplied header.
pub fn content_type_for(file_name: &str) -> Option<&'static str> {
    let lower = file_name.to_ascii_lowercase();
    if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
        return Some("application/gzip");
    }
    let ext = lower.rsplit_once('.').map(|(_, ext)| ext)?;
    match ext {
        "zip" => Some("application/zip"),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "svg" => Some("image/svg+xml"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}
