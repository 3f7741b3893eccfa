//! # Asset Kinds
//!
//! A single enum for every distributable file the mirror knows about.
//! Exhaustive `match` everywhere: adding a kind forces every consumer
//! (storage layout, origin host, header policy) to handle it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// The kind of a mirrored file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// Core release archive (`wordpress-6.4.2.zip`, `.tar.gz`).
    CoreZip,
    /// Plugin archive (`plugin/<slug>.<version>.zip`).
    PluginZip,
    /// Theme archive (`theme/<slug>.<version>.zip`).
    ThemeZip,
    /// Plugin screenshot image.
    Screenshot,
    /// Plugin banner image.
    Banner,
    /// Plugin icon image.
    Icon,
}

impl AssetKind {
    /// Every kind, in declaration order.
    pub const ALL: [AssetKind; 6] = [
        Self::CoreZip,
        Self::PluginZip,
        Self::ThemeZip,
        Self::Screenshot,
        Self::Banner,
        Self::Icon,
    ];

    /// Stable string form, used in the database and in metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CoreZip => "core_zip",
            Self::PluginZip => "plugin_zip",
            Self::ThemeZip => "theme_zip",
            Self::Screenshot => "screenshot",
            Self::Banner => "banner",
            Self::Icon => "icon",
        }
    }

    /// Archives are served as downloads (`Content-Disposition: attachment`);
    /// images are served inline.
    pub fn is_archive(&self) -> bool {
        matches!(self, Self::CoreZip | Self::PluginZip | Self::ThemeZip)
    }

    /// Whether descriptors of this kind carry a slug.
    pub fn requires_slug(&self) -> bool {
        !matches!(self, Self::CoreZip)
    }

    /// The origin namespace the file is published under.
    ///
    /// Image assets live in the plugin repository's `assets/` directory.
    pub fn repository(&self) -> &'static str {
        match self {
            Self::CoreZip => "core",
            Self::PluginZip | Self::Screenshot | Self::Banner | Self::Icon => "plugin",
            Self::ThemeZip => "theme",
        }
    }

    /// Top-level directory in the storage backend.
    pub fn storage_prefix(&self) -> &'static str {
        match self {
            Self::CoreZip => "core",
            Self::PluginZip => "plugins",
            Self::ThemeZip => "themes",
            Self::Screenshot | Self::Banner | Self::Icon => "assets",
        }
    }

    /// Map an image filename prefix (`screenshot`, `banner`, `icon`) to its kind.
    pub(crate) fn from_image_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "screenshot" => Some(Self::Screenshot),
            "banner" => Some(Self::Banner),
            "icon" => Some(Self::Icon),
            _ => None,
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ParseError::UnknownKind(s.to_string()))
    }
}
