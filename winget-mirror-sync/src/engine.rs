//! Sync engine — reconciles the catalog against the state store and disk.
//!
//! ## Per-artifact protocol
//!
//! 1. Resolve `downloads/<Publisher>/<Package>/<Version>/<file>`.
//! 2. If that file exists and its SHA-256 matches the manifest → skip.
//! 3. Fetch to `<file>.winget-mirror.tmp` in the same directory (with retry).
//! 4. Hash the temporary file; on mismatch delete it and report.
//! 5. Rename into place (atomic on POSIX).
//!
//! Artifacts of one package are reconciled on a bounded worker pool. The
//! package's [`DownloadRecord`] is then checkpointed from the calling thread,
//! so the state store only ever has one writer.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use rayon::prelude::*;

use winget_mirror_core::{
    CatalogEntry, DownloadRecord, InstallerArtifact, ManifestIndex, MirrorContext, PackageFilter,
    PackageId, RetentionPolicy, Version,
};

use crate::error::{io_err, SyncError};
use crate::fetch::{fetch_with_retry, Fetcher, RetryPolicy};
use crate::hash::{verify_file, HashCheck};

const TMP_SUFFIX: &str = ".winget-mirror.tmp";

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Outcome for one installer artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactOutcome {
    /// Fetched, verified and moved into place.
    Downloaded {
        file_name: String,
        sha256: String,
        bytes: u64,
    },
    /// Already on disk with the expected hash; no network I/O.
    Skipped { file_name: String, sha256: String },
    /// Fetched bytes did not match the manifest hash; nothing was kept.
    HashMismatch {
        file_name: String,
        expected: String,
        computed: String,
    },
    /// Transport failed after the retry budget was spent.
    FetchFailed {
        file_name: String,
        url: String,
        attempts: u32,
        error: String,
    },
    /// A local filesystem step failed.
    WriteFailed { file_name: String, error: String },
}

impl ArtifactOutcome {
    pub fn file_name(&self) -> &str {
        match self {
            ArtifactOutcome::Downloaded { file_name, .. }
            | ArtifactOutcome::Skipped { file_name, .. }
            | ArtifactOutcome::HashMismatch { file_name, .. }
            | ArtifactOutcome::FetchFailed { file_name, .. }
            | ArtifactOutcome::WriteFailed { file_name, .. } => file_name,
        }
    }

    /// The verified digest, for outcomes that leave a good file on disk.
    pub fn verified_sha256(&self) -> Option<&str> {
        match self {
            ArtifactOutcome::Downloaded { sha256, .. } | ArtifactOutcome::Skipped { sha256, .. } => {
                Some(sha256)
            }
            _ => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.verified_sha256().is_none()
    }
}

/// Outcome for one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageReport {
    pub id: PackageId,
    pub version: Version,
    /// Version recorded before this run, if any.
    pub previous_version: Option<Version>,
    pub outcomes: Vec<ArtifactOutcome>,
}

impl PackageReport {
    pub fn failed(&self) -> bool {
        self.outcomes.iter().any(ArtifactOutcome::is_failure)
    }

    pub fn downloaded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ArtifactOutcome::Downloaded { .. }))
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ArtifactOutcome> {
        self.outcomes.iter().filter(|o| o.is_failure())
    }

    /// Nothing fetched, nothing failed.
    pub fn is_up_to_date(&self) -> bool {
        self.downloaded() == 0 && !self.failed()
    }
}

/// Outcome of a whole sync or refresh run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub packages: Vec<PackageReport>,
    /// Requested packages with no indexed version.
    pub unresolved: Vec<PackageId>,
}

impl SyncReport {
    pub fn has_failures(&self) -> bool {
        self.packages.iter().any(PackageReport::failed)
    }

    pub fn downloaded(&self) -> usize {
        self.packages.iter().map(PackageReport::downloaded).sum()
    }

    pub fn failed_packages(&self) -> impl Iterator<Item = &PackageReport> {
        self.packages.iter().filter(|p| p.failed())
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Drives downloads for one mirror run.
pub struct SyncEngine<'a> {
    ctx: &'a mut MirrorContext,
    index: &'a ManifestIndex,
    fetcher: &'a dyn Fetcher,
    revision: Option<String>,
    policy: RetryPolicy,
    pool: rayon::ThreadPool,
}

impl<'a> SyncEngine<'a> {
    pub fn new(
        ctx: &'a mut MirrorContext,
        index: &'a ManifestIndex,
        fetcher: &'a dyn Fetcher,
    ) -> Result<Self, SyncError> {
        let settings = &ctx.config.download;
        let policy = RetryPolicy::from(settings);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(settings.workers.max(1))
            .thread_name(|i| format!("download-{i}"))
            .build()?;
        Ok(Self {
            ctx,
            index,
            fetcher,
            revision: None,
            policy,
            pool,
        })
    }

    /// Record `revision` (manifest tree commit) on records written by this run.
    pub fn with_revision(mut self, revision: Option<String>) -> Self {
        self.revision = revision;
        self
    }

    /// Sync the latest version of every catalog package matching `filter`.
    pub fn sync_filtered(&mut self, filter: &PackageFilter) -> Result<SyncReport, SyncError> {
        let ids: Vec<PackageId> = self
            .index
            .package_ids()
            .into_iter()
            .filter(|id| filter.matches(id))
            .cloned()
            .collect();
        tracing::info!("{} package(s) match '{filter}'", ids.len());
        self.sync_ids(ids)
    }

    /// Re-resolve every package already in the state store to its latest
    /// indexed version, ignoring any filter.
    pub fn refresh_synced(&mut self) -> Result<SyncReport, SyncError> {
        let ids: Vec<PackageId> = self.ctx.store.state().downloads.keys().cloned().collect();
        tracing::info!("refreshing {} synced package(s)", ids.len());
        self.sync_ids(ids)
    }

    fn sync_ids(&mut self, ids: Vec<PackageId>) -> Result<SyncReport, SyncError> {
        self.ctx.store.begin_run();
        let mut report = SyncReport::default();
        for id in ids {
            let Some(entry) = self.index.latest(&id) else {
                tracing::warn!("{id}: no indexed version; skipping");
                report.unresolved.push(id);
                continue;
            };
            report.packages.push(self.sync_entry(entry)?);
        }
        self.ctx.store.end_run()?;
        Ok(report)
    }

    /// Reconcile one catalog entry and checkpoint its record.
    pub fn sync_entry(&mut self, entry: &CatalogEntry) -> Result<PackageReport, SyncError> {
        let previous = self.ctx.store.record(&entry.id).cloned();
        if let Some(prev) = previous.as_ref().filter(|p| p.version != entry.version) {
            tracing::info!("{}: {} → {}", entry.id, prev.version, entry.version);
        }

        let dir = self.ctx.artifact_dir(&entry.id, &entry.version);
        let outcomes: Vec<ArtifactOutcome> = match prepare_dir(&dir, &entry.installers) {
            Ok(()) => {
                let fetcher = self.fetcher;
                let policy = &self.policy;
                self.pool.install(|| {
                    entry
                        .installers
                        .par_iter()
                        .map(|artifact| reconcile_artifact(fetcher, policy, &dir, artifact))
                        .collect()
                })
            }
            Err(err) => {
                tracing::warn!("{}: {err}", entry.id);
                entry
                    .installers
                    .iter()
                    .map(|artifact| ArtifactOutcome::WriteFailed {
                        file_name: artifact.file_name.clone(),
                        error: err.to_string(),
                    })
                    .collect()
            }
        };

        let report = PackageReport {
            id: entry.id.clone(),
            version: entry.version.clone(),
            previous_version: previous.as_ref().map(|p| p.version.clone()),
            outcomes,
        };
        self.record_outcome(entry, previous, &report)?;
        Ok(report)
    }

    fn record_outcome(
        &mut self,
        entry: &CatalogEntry,
        previous: Option<DownloadRecord>,
        report: &PackageReport,
    ) -> Result<(), SyncError> {
        let files: BTreeMap<String, String> = report
            .outcomes
            .iter()
            .filter_map(|o| Some((o.file_name().to_string(), o.verified_sha256()?.to_string())))
            .collect();
        let nothing_verified = !report.outcomes.is_empty() && files.is_empty();

        match &previous {
            Some(prev) if prev.version == entry.version && prev.files == files => {
                tracing::debug!("{}: record unchanged", entry.id);
                return Ok(());
            }
            Some(prev) if prev.version != entry.version && nothing_verified => {
                tracing::warn!(
                    "{}: every artifact of {} failed; keeping record for {}",
                    entry.id,
                    entry.version,
                    prev.version
                );
                return Ok(());
            }
            _ => {}
        }

        let revision = self.revision.clone().or_else(|| {
            previous
                .as_ref()
                .filter(|p| p.version == entry.version)
                .and_then(|p| p.revision.clone())
        });
        let record = DownloadRecord {
            version: entry.version.clone(),
            timestamp: Some(Utc::now()),
            files,
            revision,
        };
        self.ctx.store.checkpoint(entry.id.clone(), record)?;

        if let Some(prev) = previous.filter(|p| p.version != entry.version) {
            if self.ctx.config.retention == RetentionPolicy::Prune && !report.failed() {
                let old_dir = self.ctx.artifact_dir(&entry.id, &prev.version);
                match remove_dir_if_present(&old_dir) {
                    Ok(()) => tracing::info!("{}: pruned {}", entry.id, old_dir.display()),
                    Err(err) => tracing::warn!("{}: prune failed: {err}", entry.id),
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Per-artifact work (runs on the worker pool)
// ---------------------------------------------------------------------------

fn prepare_dir(dir: &Path, installers: &[InstallerArtifact]) -> Result<(), SyncError> {
    if installers.is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))
}

fn reconcile_artifact(
    fetcher: &dyn Fetcher,
    policy: &RetryPolicy,
    dir: &Path,
    artifact: &InstallerArtifact,
) -> ArtifactOutcome {
    let target = dir.join(&artifact.file_name);
    if target.is_file() {
        match verify_file(&target, &artifact.sha256) {
            Ok(HashCheck::Match) => {
                tracing::debug!("up to date: {}", target.display());
                return ArtifactOutcome::Skipped {
                    file_name: artifact.file_name.clone(),
                    sha256: artifact.sha256.clone(),
                };
            }
            Ok(HashCheck::Mismatch { .. }) => {
                tracing::info!("on-disk copy differs, re-downloading: {}", target.display());
            }
            Err(err) => {
                tracing::warn!("cannot hash {}: {err}; re-downloading", target.display());
            }
        }
    }
    download_artifact(fetcher, policy, &target, artifact)
}

fn download_artifact(
    fetcher: &dyn Fetcher,
    policy: &RetryPolicy,
    target: &Path,
    artifact: &InstallerArtifact,
) -> ArtifactOutcome {
    let file_name = artifact.file_name.clone();
    let tmp = tmp_path(target);
    tracing::info!("downloading {} → {}", artifact.url, target.display());

    let bytes = match fetch_with_retry(fetcher, &artifact.url, &tmp, policy) {
        Ok(bytes) => bytes,
        Err(failure) => {
            let _ = std::fs::remove_file(&tmp);
            tracing::warn!("giving up on {}: {}", artifact.url, failure.error);
            return ArtifactOutcome::FetchFailed {
                file_name,
                url: artifact.url.clone(),
                attempts: failure.attempts,
                error: failure.error.to_string(),
            };
        }
    };

    match verify_file(&tmp, &artifact.sha256) {
        Ok(HashCheck::Match) => {}
        Ok(HashCheck::Mismatch { computed }) => {
            let _ = std::fs::remove_file(&tmp);
            tracing::warn!(
                "hash mismatch for {}: expected {}, got {computed}",
                artifact.url,
                artifact.sha256
            );
            return ArtifactOutcome::HashMismatch {
                file_name,
                expected: artifact.sha256.clone(),
                computed,
            };
        }
        Err(err) => {
            let _ = std::fs::remove_file(&tmp);
            return ArtifactOutcome::WriteFailed {
                file_name,
                error: format!("hashing {}: {err}", tmp.display()),
            };
        }
    }

    if let Err(err) = std::fs::rename(&tmp, target) {
        let _ = std::fs::remove_file(&tmp);
        return ArtifactOutcome::WriteFailed {
            file_name,
            error: format!("moving into {}: {err}", target.display()),
        };
    }

    ArtifactOutcome::Downloaded {
        file_name,
        sha256: artifact.sha256.clone(),
        bytes,
    }
}

fn tmp_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(TMP_SUFFIX);
    target.with_file_name(name)
}

pub(crate) fn remove_dir_if_present(dir: &Path) -> Result<(), SyncError> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(dir, err)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
