//! Removal of downloaded artifacts and their records.
//!
//! A purge deletes `downloads/<Publisher>/<Package>/` with every version
//! under it, including versions superseded under the `keep` retention
//! policy, prunes parent directories left empty, then drops the record. The
//! state file is persisted after each package so an interrupted purge never
//! references deleted files. Purging does not touch `last_sync`.

use std::path::{Path, PathBuf};

use winget_mirror_core::store::DOWNLOADS_DIR;
use winget_mirror_core::{MirrorContext, PackageFilter, PackageId, SyncState, Version};

use crate::engine::remove_dir_if_present;
use crate::error::io_err;
use crate::SyncError;

/// One purged package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgedPackage {
    pub id: PackageId,
    /// Recorded version at the time of the purge.
    pub version: Version,
    /// The package directory that was removed.
    pub dir: PathBuf,
}

/// Recorded packages whose id matches `filter`, in state order.
pub fn matching_records(state: &SyncState, filter: &PackageFilter) -> Vec<PackageId> {
    state
        .downloads
        .keys()
        .filter(|id| filter.matches(id))
        .cloned()
        .collect()
}

/// Purge one recorded package. Returns `None` if `id` has no record.
pub fn purge_package(
    ctx: &mut MirrorContext,
    id: &PackageId,
) -> Result<Option<PurgedPackage>, SyncError> {
    let Some(record) = ctx.store.record(id).cloned() else {
        return Ok(None);
    };
    let dir = package_dir(ctx, id);
    remove_dir_if_present(&dir)?;
    remove_empty_parents(&dir, &ctx.root.join(DOWNLOADS_DIR))?;
    ctx.store.remove(id)?;
    tracing::info!("purged {id} {}", record.version);
    Ok(Some(PurgedPackage {
        id: id.clone(),
        version: record.version,
        dir,
    }))
}

/// Purge every recorded package matching `filter`.
pub fn purge_matching(
    ctx: &mut MirrorContext,
    filter: &PackageFilter,
) -> Result<Vec<PurgedPackage>, SyncError> {
    let ids = matching_records(ctx.store.state(), filter);
    purge_ids(ctx, &ids)
}

/// Purge every record, then remove anything left under `downloads/`.
pub fn purge_all(ctx: &mut MirrorContext) -> Result<Vec<PurgedPackage>, SyncError> {
    let ids: Vec<PackageId> = ctx.store.state().downloads.keys().cloned().collect();
    let purged = purge_ids(ctx, &ids)?;
    let downloads = ctx.root.join(DOWNLOADS_DIR);
    remove_dir_if_present(&downloads)?;
    Ok(purged)
}

fn purge_ids(ctx: &mut MirrorContext, ids: &[PackageId]) -> Result<Vec<PurgedPackage>, SyncError> {
    let mut purged = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(p) = purge_package(ctx, id)? {
            purged.push(p);
        }
    }
    Ok(purged)
}

/// `downloads/<Publisher>/<Package>/`
fn package_dir(ctx: &MirrorContext, id: &PackageId) -> PathBuf {
    ctx.root.join(DOWNLOADS_DIR).join(&id.publisher).join(&id.name)
}

/// Remove `start`'s ancestors while they are empty, stopping at `stop`.
fn remove_empty_parents(start: &Path, stop: &Path) -> Result<(), SyncError> {
    let mut current = start.parent();
    while let Some(dir) = current {
        if dir == stop || !dir.starts_with(stop) {
            break;
        }
        let is_empty = match std::fs::read_dir(dir) {
            Ok(mut entries) => entries.next().is_none(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                current = dir.parent();
                continue;
            }
            Err(err) => return Err(io_err(dir, err)),
        };
        if !is_empty {
            break;
        }
        std::fs::remove_dir(dir).map_err(|e| io_err(dir, e))?;
        current = dir.parent();
    }
    Ok(())
}
