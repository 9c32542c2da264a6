//! # artifact-cave
//!
//! A filesystem-backed OSGi artifact repository exposing its content through
//! a `repository.xml` catalog.
//!
//! ## Architecture
//!
//! - **repository**: The `Repository` facade: construct, upload, scan, proxy, cleanup
//! - **catalog**: Lock-guarded, lazily loaded artifact index with its increment counter
//! - **codec**: `repository.xml` reader and writer
//! - **layout**: Storage root creation, initial catalog load and removal
//! - **record**: Artifact records and URI relativization
//! - **extract**: Bundle identity extraction from jar manifests
//! - **scan**: Local directory traversal for scans and filesystem proxies
//! - **proxy**: Recursive HTTP index-page mirroring
//! - **upload**: Single artifact download under its canonical name
//! - **fetch**: `file:` and HTTP byte sources
//! - **links**: Hyperlink extraction from index pages
//! - **cancel**: Cooperative cancellation of long traversals

pub mod cancel;
pub mod catalog;
pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod layout;
pub mod links;
pub mod proxy;
pub mod record;
pub mod repository;
pub mod scan;
pub mod upload;

pub use cancel::CancelToken;
pub use catalog::{Catalog, CatalogDocument};
pub use config::RepositoryOptions;
pub use error::{CaveError, Result};
pub use extract::{ManifestExtractor, MetadataExtractor};
pub use fetch::{Fetched, HttpTransport, Transport};
pub use links::{AnchorLister, LinkLister};
pub use record::ArtifactRecord;
pub use repository::{Repository, RepositoryBuilder};
