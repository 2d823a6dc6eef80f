//! Manifest index — turns a manifest tree into a catalog of packages.
//!
//! A *version directory* is any directory holding `*.yaml` files. Its path
//! relative to the manifests root (minus the shard letter in
//! [`ManifestLayout::Sharded`]) is `Publisher/<package segments…>/Version`;
//! nested package segments are joined with `.`, so
//! `Microsoft/VisualStudio/2022/Community/17.9.0` indexes as package
//! `Microsoft.VisualStudio.2022.Community` version `17.9.0`.
//!
//! A broken version directory is recorded in [`ManifestIndex::errors`] and
//! skipped; it never aborts the rest of the build.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::IndexError;
use crate::filter::PackageFilter;
use crate::manifest::ManifestDocument;
use crate::types::{CatalogEntry, ManifestLayout, PackageId};
use crate::version::Version;

/// In-memory catalog built from one manifest tree.
#[derive(Debug)]
pub struct ManifestIndex {
    root: PathBuf,
    entries: Vec<CatalogEntry>,
    errors: Vec<IndexError>,
}

impl ManifestIndex {
    /// Index every version directory under `root`.
    ///
    /// Returns `IndexError::RootNotFound` if `root` is missing; all other
    /// problems are collected per entry.
    pub fn build(root: &Path, layout: ManifestLayout) -> Result<Self, IndexError> {
        if !root.is_dir() {
            return Err(IndexError::RootNotFound {
                path: root.to_path_buf(),
            });
        }

        let mut errors = Vec::new();
        let mut version_dirs: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
        for item in WalkDir::new(root).min_depth(1).sort_by_file_name() {
            let item = match item {
                Ok(item) => item,
                Err(err) => {
                    tracing::warn!("skipping unreadable path: {err}");
                    errors.push(IndexError::Walk(err));
                    continue;
                }
            };
            if !item.file_type().is_file() || item.path().extension() != Some(OsStr::new("yaml")) {
                continue;
            }
            if let Some(parent) = item.path().parent() {
                version_dirs
                    .entry(parent.to_path_buf())
                    .or_default()
                    .push(item.path().to_path_buf());
            }
        }

        let mut entries = Vec::new();
        for (dir, files) in version_dirs {
            let Ok(relative) = dir.strip_prefix(root) else {
                continue;
            };
            let Some((id, version)) = identify(relative, layout) else {
                tracing::debug!("ignoring manifests outside a version directory: {}", dir.display());
                continue;
            };
            match load_entry(&dir, relative, &files, id, version) {
                Ok(entry) => entries.push(entry),
                Err(err) => {
                    tracing::warn!("skipping {}: {err}", relative.display());
                    errors.push(err);
                }
            }
        }

        entries.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.version.cmp(&b.version)));
        tracing::debug!(
            "indexed {} version(s), {} error(s) under {}",
            entries.len(),
            errors.len(),
            root.display()
        );
        Ok(Self {
            root: root.to_path_buf(),
            entries,
            errors,
        })
    }

    /// Manifests root this index was built from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every entry, ordered by package id then version ascending.
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Per-entry failures recorded during the build.
    pub fn errors(&self) -> &[IndexError] {
        &self.errors
    }

    /// Distinct package ids, in catalog order.
    pub fn package_ids(&self) -> Vec<&PackageId> {
        let mut ids: Vec<&PackageId> = self.entries.iter().map(|e| &e.id).collect();
        ids.dedup();
        ids
    }

    /// All indexed versions of `id`, oldest first.
    pub fn versions(&self, id: &PackageId) -> Vec<&CatalogEntry> {
        self.entries.iter().filter(|e| &e.id == id).collect()
    }

    /// The newest indexed version of `id`.
    pub fn latest(&self, id: &PackageId) -> Option<&CatalogEntry> {
        self.entries
            .iter()
            .filter(|e| &e.id == id)
            .max_by(|a, b| a.version.cmp(&b.version))
    }

    /// A specific `(id, version)` entry.
    pub fn find(&self, id: &PackageId, version: &Version) -> Option<&CatalogEntry> {
        self.entries
            .iter()
            .find(|e| &e.id == id && &e.version == version)
    }

    /// Entries whose package id matches `filter`, as a new sequence.
    pub fn filtered(&self, filter: &PackageFilter) -> Vec<&CatalogEntry> {
        self.entries.iter().filter(|e| filter.matches(&e.id)).collect()
    }
}

/// Map a version directory's relative path to `(PackageId, Version)`.
fn identify(relative: &Path, layout: ManifestLayout) -> Option<(PackageId, Version)> {
    let mut parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if layout == ManifestLayout::Sharded {
        if parts.is_empty() {
            return None;
        }
        parts.remove(0);
    }
    if parts.len() < 3 {
        return None;
    }
    let version = parts.pop()?;
    let publisher = parts.remove(0);
    Some((PackageId::new(publisher, parts.join(".")), Version::from(version)))
}

fn load_entry(
    dir: &Path,
    relative: &Path,
    files: &[PathBuf],
    id: PackageId,
    version: Version,
) -> Result<CatalogEntry, IndexError> {
    let mut installers = Vec::new();
    let mut seen_installer_manifest = false;
    for path in files {
        let text = std::fs::read_to_string(path).map_err(|e| IndexError::Io {
            path: path.clone(),
            source: e,
        })?;
        let doc = ManifestDocument::parse(path, &text)?;
        doc.validate(path)?;
        if doc.is_installer_manifest() && !seen_installer_manifest {
            seen_installer_manifest = true;
            installers = doc.artifacts(path, &id)?;
        }
    }
    if !seen_installer_manifest {
        tracing::debug!("no installer manifest in {}", dir.display());
    }
    Ok(CatalogEntry {
        id,
        version,
        manifest_dir: relative.to_path_buf(),
        installers,
    })
}
