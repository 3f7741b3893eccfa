//! # mirror-core: Foundational Types for the Asset Mirror
//!
//! Every other crate in the workspace depends on `mirror-core`; it depends on
//! nothing internal.
//!
//! ## Key Types
//!
//! - [`AssetKind`]: the closed set of distributable file kinds (core
//!   archives, plugin/theme archives, plugin image assets).
//! - [`AssetDescriptor`]: what a request asks for. Derived per request by
//!   [`identify()`], never persisted except as a queue payload.
//! - [`AssetRecord`]: one registry row per uniquely cached file.
//! - [`ByteStream`]: the boxed byte stream shared by storage backends, the
//!   origin client, and response bodies.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `mirror-*` crates (this is the leaf of the DAG).
//! - No I/O. Parsing and path derivation are pure functions.
//! - No `.unwrap()` outside tests.

pub mod content_type;
pub mod descriptor;
pub mod error;
pub mod identify;
pub mod kind;
pub mod record;
pub mod stream;
pub mod version;

pub use content_type::{content_type_for, DEFAULT_CONTENT_TYPE};
pub use descriptor::{AssetDescriptor, OriginHost};
pub use error::ParseError;
pub use identify::{identify, split_archive_stem, version_from_file_name};
pub use kind::AssetKind;
pub use record::{AssetKey, AssetRecord};
pub use stream::{single_chunk, ByteStream};
pub use version::compare_versions;
