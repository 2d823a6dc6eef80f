//! # winget-mirror-sync
//!
//! Download engine and the operations built on it.
//!
//! Call [`pipeline::run`] to sync a filtered set of packages (or refresh the
//! already-synced ones), [`validate::validate_hashes`] to re-check downloads,
//! [`purge`] to remove them and [`patch::patch_repo`] to emit manifests that
//! point at the mirror. [`repo::sync_repo`] updates the manifest checkout.

pub mod engine;
pub mod error;
pub mod fetch;
pub mod hash;
pub mod patch;
pub mod pipeline;
pub mod purge;
pub mod repo;
pub mod status;
pub mod validate;

pub use engine::{ArtifactOutcome, PackageReport, SyncEngine, SyncReport};
pub use error::SyncError;
pub use fetch::{FetchError, Fetcher, HttpFetcher, RetryPolicy};
pub use patch::{patch_repo, validate_server_url, PatchReport};
pub use pipeline::SyncScope;
pub use validate::{validate_hashes, ValidationReport};
