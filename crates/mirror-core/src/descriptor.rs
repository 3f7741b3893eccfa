//! # Asset Descriptor
//!
//! The canonical description of a requested file. Storage path and origin
//! location are pure functions of the descriptor, so independent orchestrator
//! and worker processes agree on both without coordination.

use serde::{Deserialize, Serialize};

use crate::content_type::{content_type_for, DEFAULT_CONTENT_TYPE};
use crate::error::ParseError;
use crate::identify::{is_valid_file_name, is_valid_revision, is_valid_slug};
use crate::kind::AssetKind;

/// Which origin host serves a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OriginHost {
    /// Core releases (`wordpress.org`).
    Core,
    /// Plugin and theme archives (`downloads.wordpress.org`).
    Downloads,
    /// Plugin image assets (`ps.w.org`).
    Assets,
}

/// A request for one distributable file.
///
/// Serialized as the population task payload, so field names are part of the
/// queue's wire format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetDescriptor {
    pub kind: AssetKind,
    /// Plugin or theme slug. Absent for core archives.
    #[serde(default)]
    pub slug: Option<String>,
    /// File name as requested (`test-plugin.2.1.0.zip`, `banner-772x250.jpg`).
    pub file_name: String,
    /// Dotted version, when known.
    #[serde(default)]
    pub version: Option<String>,
    /// Origin revision marker for images (`?rev=`).
    #[serde(default)]
    pub revision: Option<String>,
}

impl AssetDescriptor {
    /// Build a descriptor and check its invariants.
    pub fn new(
        kind: AssetKind,
        slug: Option<String>,
        file_name: impl Into<String>,
        version: Option<String>,
        revision: Option<String>,
    ) -> Result<Self, ParseError> {
        let descriptor = Self {
            kind,
            slug,
            file_name: file_name.into(),
            version,
            revision,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Check the invariants a deserialized payload must satisfy before it is
    /// used to build paths or URLs.
    pub fn validate(&self) -> Result<(), ParseError> {
        if !is_valid_file_name(&self.file_name) {
            return Err(ParseError::InvalidDescriptor(format!(
                "invalid file name: {:?}",
                self.file_name
            )));
        }
        match (&self.slug, self.kind.requires_slug()) {
            (Some(slug), true) if is_valid_slug(slug) => {}
            (None, false) => {}
            (Some(slug), true) => {
                return Err(ParseError::InvalidDescriptor(format!("invalid slug: {slug:?}")))
            }
            (None, true) => {
                return Err(ParseError::InvalidDescriptor(format!(
                    "{} requires a slug",
                    self.kind
                )))
            }
            (Some(_), false) => {
                return Err(ParseError::InvalidDescriptor(format!(
                    "{} does not take a slug",
                    self.kind
                )))
            }
        }
        if let Some(rev) = &self.revision {
            if !is_valid_revision(rev) {
                return Err(ParseError::InvalidRevision { value: rev.clone() });
            }
        }
        Ok(())
    }

    /// Backend-relative storage path, derived from `(kind, slug, file_name)`.
    ///
    /// Version and revision are deliberately absent: a newer revision of an
    /// image lands on the same path and replaces the previous bytes.
    pub fn storage_path(&self) -> String {
        let prefix = self.kind.storage_prefix();
        match (&self.slug, self.kind.requires_slug()) {
            (Some(slug), true) => format!("{prefix}/{slug}/{}", self.file_name),
            _ => format!("{prefix}/{}", self.file_name),
        }
    }

    /// Host family serving this descriptor.
    pub fn origin_host(&self) -> OriginHost {
        match self.kind {
            AssetKind::CoreZip => OriginHost::Core,
            AssetKind::PluginZip | AssetKind::ThemeZip => OriginHost::Downloads,
            AssetKind::Screenshot | AssetKind::Banner | AssetKind::Icon => OriginHost::Assets,
        }
    }

    /// Path (and query) relative to the origin host's base URL.
    pub fn origin_path(&self) -> String {
        let slug = self.slug.as_deref().unwrap_or_default();
        match self.kind {
            AssetKind::CoreZip => self.file_name.clone(),
            AssetKind::PluginZip => format!("plugin/{}", self.file_name),
            AssetKind::ThemeZip => format!("theme/{}", self.file_name),
            AssetKind::Screenshot | AssetKind::Banner | AssetKind::Icon => {
                match &self.revision {
                    Some(rev) => format!("{slug}/assets/{}?rev={rev}", self.file_name),
                    None => format!("{slug}/assets/{}", self.file_name),
                }
            }
        }
    }

    /// MIME type inferred from the file name, if the extension is known.
    pub fn known_content_type(&self) -> Option<&'static str> {
        content_type_for(&self.file_name)
    }

    /// MIME type to serve: the inferred type, else the origin's, else
    /// `application/octet-stream`.
    pub fn content_type_or<'a>(&self, origin: Option<&'a str>) -> &'a str {
        match self.known_content_type() {
            Some(ct) => ct,
            None => origin.unwrap_or(DEFAULT_CONTENT_TYPE),
        }
    }

    /// `Content-Disposition` value for archives; `None` for inline images.
    pub fn content_disposition(&self) -> Option<String> {
        self.kind
            .is_archive()
            .then(|| format!("attachment; filename=\"{}\"", self.file_name))
    }

    /// Replace the version, keeping every other field.
    pub fn with_version(mut self, version: Option<String>) -> Self {
        self.version = version;
        self
    }
}
