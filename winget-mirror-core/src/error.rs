//! Error types for winget-mirror-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or persisting `config.json` / `state.json`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failure, annotated with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error (write path).
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// JSON parse error on load — includes the file path and serde_json's line/column.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// `config.json` or `state.json` is missing from the mirror root.
    #[error("{path} not found; run `winget-mirror init <path>` first")]
    NotInitialized { path: PathBuf },
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}

/// Errors raised while indexing the manifest tree.
///
/// Only [`IndexError::RootNotFound`] aborts an index build; every other
/// variant is recorded against the version directory it came from.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The manifests root does not exist (repository never synced).
    #[error("manifest root {path} not found; run `winget-mirror sync-repo` first")]
    RootNotFound { path: PathBuf },

    /// A directory or manifest could not be read.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The directory walk itself failed below the root.
    #[error("failed to walk manifest tree: {0}")]
    Walk(#[from] walkdir::Error),

    /// A manifest file is not valid YAML or has the wrong shape.
    #[error("failed to parse manifest {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A required manifest field is absent.
    #[error("manifest {path} is missing required field `{field}`")]
    MissingField { path: PathBuf, field: &'static str },

    /// `ManifestVersion` is older than the oldest supported schema.
    #[error("manifest {path} has unsupported ManifestVersion {version}")]
    UnsupportedManifestVersion { path: PathBuf, version: String },
}

/// A `Publisher.Package` key that could not be split into its two halves.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid package id '{0}'; expected `Publisher.Package`")]
pub struct InvalidPackageId(pub String);

/// A filter string that is not `Publisher` or `Publisher/Package`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid filter '{0}'; expected `Publisher` or `Publisher/Package`")]
pub struct InvalidFilter(pub String);
