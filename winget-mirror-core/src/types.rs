//! Domain types for the mirror.
//!
//! All path fields use `PathBuf`; persisted maps are `BTreeMap` so that
//! `state.json` and `config.json` serialize in a stable order.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::InvalidPackageId;
use crate::version::Version;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Identity of a package lineage: `(publisher, name)`.
///
/// Serialized as the `Publisher.Package` key used in `state.json`. The
/// publisher is everything before the first `.`; the package name may itself
/// contain dots (`Microsoft.VisualStudio.2022.Community`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageId {
    pub publisher: String,
    pub name: String,
}

impl PackageId {
    pub fn new(publisher: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            publisher: publisher.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.publisher, self.name)
    }
}

impl FromStr for PackageId {
    type Err = InvalidPackageId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((publisher, name)) if !publisher.is_empty() && !name.is_empty() => {
                Ok(Self::new(publisher, name))
            }
            _ => Err(InvalidPackageId(s.to_owned())),
        }
    }
}

impl TryFrom<String> for PackageId {
    type Error = InvalidPackageId;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<PackageId> for String {
    fn from(id: PackageId) -> Self {
        id.to_string()
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// One downloadable installer referenced by a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallerArtifact {
    /// Original vendor URL from `InstallerUrl`.
    pub url: String,
    /// Lowercase hex SHA-256 from `InstallerSha256`.
    pub sha256: String,
    pub architecture: Option<String>,
    pub installer_type: Option<String>,
    /// Canonical on-disk name; unique within its catalog entry.
    pub file_name: String,
}

/// A single `(package, version)` from the manifest tree and its artifacts.
///
/// Built fresh by every index build and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: PackageId,
    pub version: Version,
    /// Version directory relative to the manifests root.
    pub manifest_dir: PathBuf,
    pub installers: Vec<InstallerArtifact>,
}

// ---------------------------------------------------------------------------
// Persisted state
// ---------------------------------------------------------------------------

/// Per-package sync record stored under `downloads` in `state.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub version: Version,
    pub timestamp: Option<DateTime<Utc>>,
    /// Artifact file name → verified lowercase hex SHA-256.
    #[serde(default)]
    pub files: BTreeMap<String, String>,
    /// Commit of the manifest tree the record was produced from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

/// Root of `state.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    /// Mirror root the state belongs to.
    pub path: PathBuf,
    pub last_sync: Option<DateTime<Utc>>,
    #[serde(default)]
    pub downloads: BTreeMap<PackageId, DownloadRecord>,
}

impl SyncState {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            last_sync: None,
            downloads: BTreeMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// How publisher directories are arranged below `manifests/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ManifestLayout {
    /// `manifests/<Publisher>/<Package>/<Version>/`
    #[default]
    Flat,
    /// `manifests/<letter>/<Publisher>/<Package>/<Version>/` (upstream winget-pkgs)
    Sharded,
}

/// What happens to an older version's files once a newer version is synced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RetentionPolicy {
    /// Old version directories stay on disk until purged.
    #[default]
    Keep,
    /// Old version directories are removed after a fully successful sync.
    Prune,
}

impl fmt::Display for RetentionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetentionPolicy::Keep => write!(f, "keep"),
            RetentionPolicy::Prune => write!(f, "prune"),
        }
    }
}

/// Download tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    /// Size of the per-package download worker pool.
    pub workers: usize,
    /// Extra attempts after the first failed transfer.
    pub retries: u32,
    /// Base delay for exponential backoff between attempts.
    pub backoff_ms: u64,
    pub timeout_secs: u64,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            workers: 4,
            retries: 3,
            backoff_ms: 500,
            timeout_secs: 300,
        }
    }
}

/// Root of `config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorConfig {
    pub repo_url: String,
    pub revision: String,
    /// Git checkout directory, relative to the mirror root.
    pub mirror_dir: PathBuf,
    pub server_url: Option<String>,
    #[serde(default)]
    pub manifest_layout: ManifestLayout,
    #[serde(default)]
    pub retention: RetentionPolicy,
    #[serde(default)]
    pub download: DownloadSettings,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            repo_url: "https://github.com/microsoft/winget-pkgs".to_string(),
            revision: "master".to_string(),
            mirror_dir: PathBuf::from("mirror"),
            server_url: None,
            manifest_layout: ManifestLayout::Sharded,
            retention: RetentionPolicy::Keep,
            download: DownloadSettings::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
