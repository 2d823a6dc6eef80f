//! Read-only integrity check of downloaded artifacts.
//!
//! Every file named in every [`DownloadRecord`] is re-hashed and compared to
//! the digest stored in `state.json`, not to the live manifest. A digest that
//! changed upstream therefore never shows up here; local corruption does.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Serialize;

use winget_mirror_core::{DownloadRecord, MirrorContext, PackageId};

use crate::hash::{digests_equal, sha256_file};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileStatus {
    Match,
    Mismatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileCheck {
    pub status: FileStatus,
    pub expected: String,
    pub computed: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackageValidation {
    pub version: String,
    pub valid: bool,
    pub files: BTreeMap<String, FileCheck>,
    pub missing_files: Vec<String>,
    /// Present on disk but not named in the record. Reported only.
    pub unexpected_files: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub all_valid: bool,
    pub packages: BTreeMap<String, PackageValidation>,
}

impl ValidationReport {
    /// `(package, file)` pairs that failed, in report order.
    pub fn failures(&self) -> Vec<(&str, &str)> {
        let mut out = Vec::new();
        for (package, v) in &self.packages {
            for (file, check) in &v.files {
                if check.status == FileStatus::Mismatch {
                    out.push((package.as_str(), file.as_str()));
                }
            }
            for file in &v.missing_files {
                out.push((package.as_str(), file.as_str()));
            }
        }
        out
    }
}

/// Check every recorded package under `ctx`.
pub fn validate_hashes(ctx: &MirrorContext) -> ValidationReport {
    let packages: BTreeMap<String, PackageValidation> = ctx
        .store
        .state()
        .downloads
        .iter()
        .map(|(id, record)| (id.to_string(), validate_package(ctx, id, record)))
        .collect();
    let all_valid = packages.values().all(|p| p.valid);
    ValidationReport {
        all_valid,
        packages,
    }
}

/// Check one record against its version directory.
pub fn validate_package(
    ctx: &MirrorContext,
    id: &PackageId,
    record: &DownloadRecord,
) -> PackageValidation {
    let dir = ctx.artifact_dir(id, &record.version);
    let mut result = PackageValidation {
        version: record.version.to_string(),
        ..Default::default()
    };

    if !dir.is_dir() {
        if record.files.is_empty() {
            result.valid = true;
            return result;
        }
        result.error = Some(format!("directory not found: {}", dir.display()));
        result.missing_files = record.files.keys().cloned().collect();
        return result;
    }

    for (file, expected) in &record.files {
        let path = dir.join(file);
        if !path.is_file() {
            result.missing_files.push(file.clone());
            continue;
        }
        let check = match sha256_file(&path) {
            Ok(computed) => FileCheck {
                status: if digests_equal(&computed, expected) {
                    FileStatus::Match
                } else {
                    FileStatus::Mismatch
                },
                expected: expected.clone(),
                computed,
            },
            Err(err) => {
                tracing::warn!("cannot read {}: {err}", path.display());
                FileCheck {
                    status: FileStatus::Mismatch,
                    expected: expected.clone(),
                    computed: format!("unreadable: {err}"),
                }
            }
        };
        if check.status == FileStatus::Mismatch {
            tracing::warn!("{id}: {file} does not match its recorded hash");
        }
        result.files.insert(file.clone(), check);
    }

    let named: BTreeSet<&str> = record.files.keys().map(String::as_str).collect();
    result.unexpected_files = list_files(&dir)
        .into_iter()
        .filter(|name| !named.contains(name.as_str()))
        .collect();

    result.valid = result.missing_files.is_empty()
        && result.files.values().all(|c| c.status == FileStatus::Match);
    result
}

fn list_files(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
