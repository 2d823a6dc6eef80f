//! winget-mirror core library — data model, manifest index, filter, and
//! config/state persistence.
//!
//! - [`types`] — package identity, catalog entries, persisted records
//! - [`version`] — version token ordering
//! - [`index`] — manifest tree → catalog
//! - [`filter`] — `Publisher[/Package]` matching
//! - [`store`] — `config.json` / `state.json` and the run context

pub mod error;
pub mod filter;
pub mod index;
pub mod manifest;
pub mod store;
pub mod types;
pub mod version;

pub use error::{IndexError, InvalidFilter, InvalidPackageId, StoreError};
pub use filter::PackageFilter;
pub use index::ManifestIndex;
pub use store::{MirrorContext, StateStore};
pub use types::{
    CatalogEntry, DownloadRecord, DownloadSettings, InstallerArtifact, ManifestLayout,
    MirrorConfig, PackageId, RetentionPolicy, SyncState,
};
pub use version::Version;
