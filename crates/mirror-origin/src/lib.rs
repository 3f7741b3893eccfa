//! # mirror-origin: Typed Client for the Upstream Origin
//!
//! The origin publishes three host families:
//!
//! | Host | Serves |
//! |------|--------|
//! | core (`https://wordpress.org`) | core release archives |
//! | downloads (`https://downloads.wordpress.org`) | `plugin/` and `theme/` archives |
//! | assets (`https://ps.w.org`) | plugin `assets/` images |
//!
//! [`OriginClient::fetch`] resolves a descriptor to its origin URL, issues
//! the GET, and hands back an [`OriginResponse`] whose body is streamed
//! lazily. Non-2xx statuses, timeouts and transport failures become typed
//! [`OriginError`]s; the caller decides whether to retry.
//!
//! Time limits: the response head must arrive within the configured timeout,
//! and the body may not stall for longer than that between chunks.

pub mod client;
pub mod config;
pub mod error;

pub use client::{OriginClient, OriginResponse};
pub use config::{ConfigError, OriginConfig};
pub use error::OriginError;
