//! # Identify Subcommand
//!
//! Prints the descriptor a request path resolves to, with its storage path
//! and origin URL. Useful when a path unexpectedly returns 400.

use anyhow::Result;
use clap::Args;
use mirror_core::identify;
use mirror_origin::{OriginClient, OriginConfig};
use serde_json::{json, Value};

use crate::split_request;

/// Arguments for `mirror identify`.
#[derive(Args, Debug)]
pub struct IdentifyArgs {
    /// Request path, optionally with a query (e.g. "/akismet/assets/icon-128x128.png?rev=1").
    pub path: String,
}

pub fn run_identify(args: &IdentifyArgs) -> Result<u8> {
    let origin = OriginClient::new(OriginConfig::from_env()?)?;
    match describe(&args.path, &origin) {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(0)
        }
        Err(e) => {
            eprintln!("{}: {e}", args.path);
            Ok(2)
        }
    }
}

/// Descriptor plus derived locations as JSON.
pub fn describe(raw: &str, origin: &OriginClient) -> Result<Value> {
    let (path, query) = split_request(raw);
    let descriptor = identify(path, query)?;
    let origin_url = origin.url_for(&descriptor)?;
    Ok(json!({
        "descriptor": descriptor,
        "storage_path": descriptor.storage_path(),
        "origin_url": origin_url.as_str(),
        "content_type": descriptor.content_type_or(None),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> OriginClient {
        OriginClient::new(OriginConfig::from_lookup(|_| None).unwrap()).unwrap()
    }

    #[test]
    fn describes_plugin_archive() {
        let value = describe("/plugin/test-plugin.2.1.0.zip", &origin()).unwrap();
        assert_eq!(value["descriptor"]["kind"], "plugin_zip");
        assert_eq!(value["descriptor"]["slug"], "test-plugin");
        assert_eq!(value["descriptor"]["version"], "2.1.0");
        assert_eq!(
            value["storage_path"],
            "plugins/test-plugin/test-plugin.2.1.0.zip"
        );
        assert_eq!(
            value["origin_url"],
            "https://downloads.wordpress.org/plugin/test-plugin.2.1.0.zip"
        );
        assert_eq!(value["content_type"], "application/zip");
    }

    #[test]
    fn describes_image_with_revision() {
        let value = describe("/akismet/assets/banner-772x250.jpg?rev=3164133", &origin()).unwrap();
        assert_eq!(value["descriptor"]["kind"], "banner");
        assert_eq!(value["descriptor"]["revision"], "3164133");
        assert!(value["descriptor"]["version"].is_null());
        assert_eq!(
            value["origin_url"],
            "https://ps.w.org/akismet/assets/banner-772x250.jpg?rev=3164133"
        );
    }

    #[test]
    fn rejects_unknown_paths() {
        assert!(describe("/readme.txt", &origin()).is_err());
    }
}
