//! Error types for winget-mirror-sync.

use std::path::PathBuf;

use thiserror::Error;

use winget_mirror_core::{IndexError, StoreError};

/// Run-level errors from sync, purge, validate, patch and repo operations.
///
/// Per-artifact failures are not errors at this level; they are reported as
/// [`crate::ArtifactOutcome`] values inside a [`crate::SyncReport`].
#[derive(Debug, Error)]
pub enum SyncError {
    /// Config or state could not be loaded or persisted.
    #[error("state store error: {0}")]
    Store(#[from] StoreError),

    /// The manifest tree could not be indexed at all.
    #[error("manifest index error: {0}")]
    Index(#[from] IndexError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The patch target is not an absolute http(s) URL.
    #[error("invalid server URL '{url}': {reason}")]
    InvalidServerUrl { url: String, reason: String },

    /// A `git` invocation failed.
    #[error("git {command} failed: {message}")]
    Git { command: String, message: String },

    /// The download worker pool could not be created.
    #[error("failed to start download workers: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
