//! Manifest patcher — rewrites installer URLs to point at the local mirror.
//!
//! Output is `<output_dir>/manifests/<same relative path as the source>`,
//! limited to package versions present in `state.json` whose every artifact
//! was downloaded and verified. Rewriting works on the raw text one line at a
//! time: only the value of each `InstallerUrl:` key changes, so comments,
//! key order, quoting and every other field stay byte-for-byte identical.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use winget_mirror_core::manifest::ManifestDocument;
use winget_mirror_core::store::{DOWNLOADS_DIR, MANIFESTS_DIR};
use winget_mirror_core::{
    CatalogEntry, DownloadRecord, InstallerArtifact, ManifestIndex, MirrorContext, PackageId,
    Version,
};

use crate::error::io_err;
use crate::hash::digests_equal;
use crate::SyncError;

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchedPackage {
    pub id: PackageId,
    pub version: Version,
    pub files_written: usize,
    pub urls_rewritten: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPackage {
    pub id: PackageId,
    pub version: Version,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchReport {
    pub patched: Vec<PatchedPackage>,
    pub skipped: Vec<SkippedPackage>,
}

impl PatchReport {
    pub fn urls_rewritten(&self) -> usize {
        self.patched.iter().map(|p| p.urls_rewritten).sum()
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Check that `raw` is an absolute http(s) URL with a host and return it
/// normalized, without a trailing `/`.
pub fn validate_server_url(raw: &str) -> Result<String, SyncError> {
    let invalid = |reason: &str| SyncError::InvalidServerUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };
    let url = Url::parse(raw.trim()).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host"));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("must not carry a query or fragment"));
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// Write patched manifests for every eligible recorded package.
///
/// The server URL is validated before anything is written.
pub fn patch_repo(
    ctx: &MirrorContext,
    index: &ManifestIndex,
    server_url: &str,
    output_dir: &Path,
) -> Result<PatchReport, SyncError> {
    let base = validate_server_url(server_url)?;
    let out_root = output_dir.join(MANIFESTS_DIR);
    let mut report = PatchReport::default();

    for (id, record) in &ctx.store.state().downloads {
        let skip = |reason: String| SkippedPackage {
            id: id.clone(),
            version: record.version.clone(),
            reason,
        };
        let Some(entry) = index.find(id, &record.version) else {
            tracing::warn!("{id} {}: not in the manifest index; skipping", record.version);
            report
                .skipped
                .push(skip("version not found in the manifest index".into()));
            continue;
        };
        if let Err(reason) = check_eligible(ctx, entry, record) {
            tracing::warn!("{id} {}: {reason}; skipping", record.version);
            report.skipped.push(skip(reason));
            continue;
        }

        let source_dir = index.root().join(&entry.manifest_dir);
        let files = match render_package(entry, &source_dir, &base) {
            Ok(files) => files,
            Err(PackageFailure::Reason(reason)) => {
                tracing::warn!("{id} {}: {reason}; skipping", record.version);
                report.skipped.push(skip(reason));
                continue;
            }
            Err(PackageFailure::Fatal(err)) => return Err(err),
        };

        let target_dir = out_root.join(&entry.manifest_dir);
        std::fs::create_dir_all(&target_dir).map_err(|e| io_err(&target_dir, e))?;
        let mut urls_rewritten = 0;
        for file in &files {
            let path = target_dir.join(&file.name);
            std::fs::write(&path, &file.text).map_err(|e| io_err(&path, e))?;
            urls_rewritten += file.rewritten;
        }
        tracing::info!("patched {id} {} ({urls_rewritten} URL(s))", record.version);
        report.patched.push(PatchedPackage {
            id: id.clone(),
            version: record.version.clone(),
            files_written: files.len(),
            urls_rewritten,
        });
    }
    Ok(report)
}

/// Mirror URL for one artifact:
/// `<base>/downloads/<Publisher>/<Package>/<Version>/<file>`.
pub fn mirror_url(base: &str, id: &PackageId, version: &Version, file_name: &str) -> String {
    let segments = [
        id.publisher.as_str(),
        id.name.as_str(),
        version.as_str(),
        file_name,
    ];
    let mut url = format!("{}/{DOWNLOADS_DIR}", base.trim_end_matches('/'));
    for segment in segments {
        url.push('/');
        url.push_str(&urlencoding::encode(segment));
    }
    url
}

// ---------------------------------------------------------------------------
// Eligibility
// ---------------------------------------------------------------------------

fn check_eligible(
    ctx: &MirrorContext,
    entry: &CatalogEntry,
    record: &DownloadRecord,
) -> Result<(), String> {
    let dir = ctx.artifact_dir(&entry.id, &entry.version);
    for artifact in &entry.installers {
        match record.files.get(&artifact.file_name) {
            Some(hash) if digests_equal(hash, &artifact.sha256) => {}
            Some(_) => {
                return Err(format!(
                    "recorded hash of {} differs from the manifest",
                    artifact.file_name
                ))
            }
            None => return Err(format!("{} was not downloaded", artifact.file_name)),
        }
        if !dir.join(&artifact.file_name).is_file() {
            return Err(format!("{} is missing on disk", artifact.file_name));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

struct RenderedFile {
    name: String,
    text: String,
    rewritten: usize,
}

enum PackageFailure {
    Reason(String),
    Fatal(SyncError),
}

fn render_package(
    entry: &CatalogEntry,
    source_dir: &Path,
    base: &str,
) -> Result<Vec<RenderedFile>, PackageFailure> {
    let urls: HashMap<String, String> = entry
        .installers
        .iter()
        .map(|a| (a.url.clone(), artifact_url(base, entry, a)))
        .collect();

    let mut rendered = Vec::new();
    for path in yaml_files(source_dir).map_err(PackageFailure::Fatal)? {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let text = std::fs::read_to_string(&path)
            .map_err(|e| PackageFailure::Fatal(io_err(&path, e)))?;
        let doc = ManifestDocument::parse(&path, &text)
            .map_err(|e| PackageFailure::Reason(e.to_string()))?;
        if !doc.is_installer_manifest() {
            rendered.push(RenderedFile {
                name,
                text,
                rewritten: 0,
            });
            continue;
        }

        let (patched, rewritten) =
            rewrite_installer_urls(&text, &urls).map_err(PackageFailure::Reason)?;
        verify_rewritten(&path, &patched, base).map_err(PackageFailure::Reason)?;
        rendered.push(RenderedFile {
            name,
            text: patched,
            rewritten,
        });
    }
    Ok(rendered)
}

fn artifact_url(base: &str, entry: &CatalogEntry, artifact: &InstallerArtifact) -> String {
    mirror_url(base, &entry.id, &entry.version, &artifact.file_name)
}

fn yaml_files(dir: &Path) -> Result<Vec<PathBuf>, SyncError> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| io_err(dir, e))?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension() == Some(OsStr::new("yaml")))
        .collect();
    files.sort();
    Ok(files)
}

/// `  - InstallerUrl: <value>  # comment`, value plain or quoted.
static INSTALLER_URL_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^([ \t]*(?:-[ \t]+)?InstallerUrl:[ \t]*)("[^"]*"|'(?:[^']|'')*'|[^ \t#'"](?:[^ \t]|[ \t]+[^ \t#])*)([ \t]*(?:#.*)?)$"#,
    )
    .expect("invalid InstallerUrl regex")
});

/// Replace each `InstallerUrl:` value found in `urls`, keeping line endings
/// and the value's quoting style. Returns the new text and the number of
/// values replaced; an URL with no mapping is an error.
fn rewrite_installer_urls(
    text: &str,
    urls: &HashMap<String, String>,
) -> Result<(String, usize), String> {
    let mut out = String::with_capacity(text.len());
    let mut rewritten = 0;

    for line in text.split_inclusive('\n') {
        let (body, ending) = split_line_ending(line);
        let Some(caps) = INSTALLER_URL_LINE.captures(body) else {
            out.push_str(line);
            continue;
        };
        let raw = &caps[2];
        let (value, quote) = unquote(raw);
        let Some(new_url) = urls.get(&value) else {
            return Err(format!("InstallerUrl {value} has no downloaded artifact"));
        };
        out.push_str(&caps[1]);
        out.push_str(&requote(new_url, quote));
        out.push_str(&caps[3]);
        out.push_str(ending);
        rewritten += 1;
    }
    Ok((out, rewritten))
}

fn verify_rewritten(path: &Path, patched: &str, base: &str) -> Result<(), String> {
    let doc = ManifestDocument::parse(path, patched).map_err(|e| e.to_string())?;
    let prefix = format!("{base}/{DOWNLOADS_DIR}/");
    for node in &doc.installers {
        if let Some(url) = &node.installer_url {
            if !url.starts_with(&prefix) {
                return Err(format!("InstallerUrl {url} could not be rewritten"));
            }
        }
    }
    Ok(())
}

fn split_line_ending(line: &str) -> (&str, &str) {
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}

fn unquote(raw: &str) -> (String, Option<char>) {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        (raw[1..raw.len() - 1].to_string(), Some('"'))
    } else if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        (raw[1..raw.len() - 1].replace("''", "'"), Some('\''))
    } else {
        (raw.to_string(), None)
    }
}

fn requote(url: &str, quote: Option<char>) -> String {
    match quote {
        Some(q) => format!("{q}{url}{q}"),
        None => url.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
