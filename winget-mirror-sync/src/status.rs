//! Download status of catalog packages, as listed by `search`.
//!
//! Status precedence for a package with a record:
//! 1. `Recorded` (record names no files)
//! 2. `Missing` (version directory gone)
//! 3. `Empty` (version directory has no files)
//! 4. `Downloaded`
//!
//! Packages without a record are `NotDownloaded`.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};

use winget_mirror_core::{
    DownloadRecord, ManifestIndex, MirrorContext, PackageFilter, PackageId, Version,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    Downloaded,
    Missing,
    Empty,
    Recorded,
    NotDownloaded,
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DownloadStatus::Downloaded => "Downloaded",
            DownloadStatus::Missing => "Downloaded (missing)",
            DownloadStatus::Empty => "Downloaded (empty)",
            DownloadStatus::Recorded => "Recorded",
            DownloadStatus::NotDownloaded => "Not downloaded",
        })
    }
}

/// One `search` result line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageStatus {
    pub id: PackageId,
    /// Newest indexed version; `None` when the package is only recorded.
    pub latest: Option<Version>,
    pub recorded: Option<Version>,
    pub timestamp: Option<DateTime<Utc>>,
    pub status: DownloadStatus,
}

impl PackageStatus {
    /// A newer version is indexed than the one downloaded.
    pub fn update_available(&self) -> bool {
        match (&self.latest, &self.recorded) {
            (Some(latest), Some(recorded)) => latest > recorded,
            _ => false,
        }
    }
}

/// Status of every package matching `filter`, in id order. Recorded packages
/// no longer in the index are included.
pub fn search(ctx: &MirrorContext, index: &ManifestIndex, filter: &PackageFilter) -> Vec<PackageStatus> {
    let state = ctx.store.state();
    let ids: BTreeSet<&PackageId> = index
        .package_ids()
        .into_iter()
        .chain(state.downloads.keys())
        .filter(|id| filter.matches(id))
        .collect();

    ids.into_iter()
        .map(|id| {
            let record = state.downloads.get(id);
            PackageStatus {
                id: id.clone(),
                latest: index.latest(id).map(|e| e.version.clone()),
                recorded: record.map(|r| r.version.clone()),
                timestamp: record.and_then(|r| r.timestamp),
                status: classify(ctx, id, record),
            }
        })
        .collect()
}

/// Status of one package against disk.
pub fn classify(ctx: &MirrorContext, id: &PackageId, record: Option<&DownloadRecord>) -> DownloadStatus {
    let Some(record) = record else {
        return DownloadStatus::NotDownloaded;
    };
    if record.files.is_empty() {
        return DownloadStatus::Recorded;
    }
    let dir = ctx.artifact_dir(id, &record.version);
    match std::fs::read_dir(&dir) {
        Err(_) => DownloadStatus::Missing,
        Ok(mut entries) => {
            if entries.next().is_none() {
                DownloadStatus::Empty
            } else {
                DownloadStatus::Downloaded
            }
        }
    }
}

/// Compact age of a timestamp: `42s`, `5m`, `3h`, `2d`.
pub fn format_age(timestamp: DateTime<Utc>) -> String {
    let seconds = Utc::now()
        .signed_duration_since(timestamp)
        .num_seconds()
        .max(0) as u64;
    if seconds < 60 {
        return format!("{seconds}s");
    }
    if seconds < 60 * 60 {
        return format!("{}m", seconds / 60);
    }
    if seconds < 60 * 60 * 24 {
        return format!("{}h", seconds / (60 * 60));
    }
    format!("{}d", seconds / (60 * 60 * 24))
}
