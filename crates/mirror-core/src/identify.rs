//! # Asset Identifier
//!
//! Turns a request path and query string into an [`AssetDescriptor`].
//!
//! Patterns are tried most specific first:
//!
//! | Pattern | Kind |
//! |---|---|
//! | `plugin/<slug>[.<version>].zip` | `PluginZip` |
//! | `theme/<slug>[.<version>].zip` | `ThemeZip` |
//! | `<slug>/assets/(screenshot\|banner\|icon)-<variant>.<ext>` | image kinds |
//! | `<name>-<version>.(zip\|tar.gz)` | `CoreZip` |
//!
//! Archive versions are the longest trailing run of all-digit dot segments
//! in the file stem, so `test-plugin.2.1.0.zip` is slug `test-plugin`,
//! version `2.1.0`, and `akismet.zip` has no version.

use std::sync::LazyLock;

use regex::Regex;

use crate::descriptor::AssetDescriptor;
use crate::error::ParseError;
use crate::kind::AssetKind;

static ARCHIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<dir>plugin|theme)/(?P<file>(?P<stem>[^/]+)\.zip)$")
        .expect("archive pattern compiles")
});

static IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<slug>[A-Za-z0-9-]+)/assets/(?P<file>(?P<prefix>screenshot|banner|icon)-[A-Za-z0-9-]+\.[A-Za-z0-9]+)$",
    )
    .expect("image pattern compiles")
});

static CORE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<file>[A-Za-z0-9_-]+?-(?P<version>[0-9]+(?:\.[0-9]+)*)\.(?:zip|tar\.gz))$")
        .expect("core pattern compiles")
});

/// Parse a request into a descriptor.
///
/// `path` is the URI path (a leading `/` is ignored); `query` is the raw
/// query string without the `?`.
pub fn identify(path: &str, query: Option<&str>) -> Result<AssetDescriptor, ParseError> {
    let trimmed = path.trim_start_matches('/');

    if let Some(caps) = ARCHIVE_RE.captures(trimmed) {
        let kind = match &caps["dir"] {
            "plugin" => AssetKind::PluginZip,
            _ => AssetKind::ThemeZip,
        };
        let (slug, version) =
            split_archive_stem(&caps["stem"]).ok_or_else(|| ParseError::pattern(path))?;
        return AssetDescriptor::new(kind, Some(slug), &caps["file"], version, None)
            .map_err(|_| ParseError::pattern(path));
    }

    if let Some(caps) = IMAGE_RE.captures(trimmed) {
        let kind =
            AssetKind::from_image_prefix(&caps["prefix"]).ok_or_else(|| ParseError::pattern(path))?;
        let revision = revision_from_query(query)?;
        return AssetDescriptor::new(
            kind,
            Some(caps["slug"].to_string()),
            &caps["file"],
            None,
            revision,
        )
        .map_err(|_| ParseError::pattern(path));
    }

    if let Some(caps) = CORE_RE.captures(trimmed) {
        return AssetDescriptor::new(
            AssetKind::CoreZip,
            None,
            &caps["file"],
            Some(caps["version"].to_string()),
            None,
        )
        .map_err(|_| ParseError::pattern(path));
    }

    Err(ParseError::pattern(path))
}

/// Split an archive stem into `(slug, version)`.
///
/// The first segment always belongs to the slug. Returns `None` when the
/// resulting slug is not a valid slug.
pub fn split_archive_stem(stem: &str) -> Option<(String, Option<String>)> {
    let segments: Vec<&str> = stem.split('.').collect();
    let numeric_tail = segments
        .iter()
        .skip(1)
        .rev()
        .take_while(|s| is_numeric_segment(s))
        .count();
    let boundary = segments.len() - numeric_tail;
    let slug = segments[..boundary].join(".");
    if !is_valid_slug(&slug) {
        return None;
    }
    let version = (numeric_tail > 0).then(|| segments[boundary..].join("."));
    Some((slug, version))
}

/// Extract a version from an archive file name of the given kind.
///
/// Used by the population worker when the request carried no version and the
/// origin named the file (via `Content-Disposition` or a redirect).
pub fn version_from_file_name(kind: AssetKind, file_name: &str) -> Option<String> {
    match kind {
        AssetKind::CoreZip => CORE_RE
            .captures(file_name)
            .map(|caps| caps["version"].to_string()),
        AssetKind::PluginZip | AssetKind::ThemeZip => {
            let stem = file_name.strip_suffix(".zip")?;
            split_archive_stem(stem).and_then(|(_, version)| version)
        }
        AssetKind::Screenshot | AssetKind::Banner | AssetKind::Icon => None,
    }
}

fn revision_from_query(query: Option<&str>) -> Result<Option<String>, ParseError> {
    let Some(query) = query else {
        return Ok(None);
    };
    let rev = url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "rev")
        .map(|(_, value)| value.into_owned());
    match rev {
        None => Ok(None),
        Some(value) if value.is_empty() => Ok(None),
        Some(value) if is_valid_revision(&value) => Ok(Some(value)),
        Some(value) => Err(ParseError::InvalidRevision { value }),
    }
}

fn is_numeric_segment(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

pub(crate) fn is_valid_slug(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with('.')
        && !s.contains("..")
        && s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
}

pub(crate) fn is_valid_file_name(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with('.')
        && !s.contains("..")
        && !s.contains('/')
        && !s.contains('\\')
}

pub(crate) fn is_valid_revision(s: &str) -> bool {
    !s.is_empty() && s.len() <= 64 && s.bytes().all(|b| b.is_ascii_alphanumeric())
}
