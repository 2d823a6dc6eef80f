//! Winget manifest documents and installer artifact derivation.
//!
//! Only the fields the mirror needs are modelled; everything else in a
//! manifest is ignored on read (and preserved verbatim by the patcher, which
//! works on the raw text).

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use serde::Deserialize;

use crate::error::IndexError;
use crate::types::{InstallerArtifact, PackageId};

/// Oldest manifest schema major version the mirror understands.
const MIN_MANIFEST_MAJOR: u64 = 1;

/// The subset of any manifest file (version, installer, locale or singleton)
/// that the index reads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ManifestDocument {
    pub package_identifier: Option<String>,
    pub package_version: Option<serde_yaml::Value>,
    pub manifest_type: Option<String>,
    pub manifest_version: Option<serde_yaml::Value>,
    /// Root-level default for installers that omit it.
    pub architecture: Option<String>,
    /// Root-level default for installers that omit it.
    pub installer_type: Option<String>,
    #[serde(default)]
    pub installers: Vec<InstallerNode>,
}

/// One element of `Installers:`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstallerNode {
    pub installer_url: Option<String>,
    pub installer_sha256: Option<String>,
    pub architecture: Option<String>,
    pub installer_type: Option<String>,
}

impl ManifestDocument {
    /// Parse a manifest file's text.
    pub fn parse(path: &Path, text: &str) -> Result<Self, IndexError> {
        serde_yaml::from_str(text).map_err(|e| IndexError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Whether this document carries the `Installers` list: `installer` and
    /// `singleton` manifests do, `version` and locale manifests do not.
    pub fn is_installer_manifest(&self) -> bool {
        match self.manifest_type.as_deref() {
            Some(kind) => {
                kind.eq_ignore_ascii_case("installer") || kind.eq_ignore_ascii_case("singleton")
            }
            None => !self.installers.is_empty(),
        }
    }

    /// Check the fields every manifest must declare.
    pub fn validate(&self, path: &Path) -> Result<(), IndexError> {
        if self.package_identifier.is_none() {
            return Err(missing(path, "PackageIdentifier"));
        }
        if self.package_version.is_none() {
            return Err(missing(path, "PackageVersion"));
        }
        let Some(raw) = self.manifest_version.as_ref().map(scalar_to_string) else {
            return Err(missing(path, "ManifestVersion"));
        };
        let major = raw
            .split('.')
            .next()
            .and_then(|m| m.trim().parse::<u64>().ok());
        match major {
            Some(m) if m >= MIN_MANIFEST_MAJOR => Ok(()),
            _ => Err(IndexError::UnsupportedManifestVersion {
                path: path.to_path_buf(),
                version: raw,
            }),
        }
    }

    /// Turn this document's installers into artifacts with unique file names.
    ///
    /// Installers that share a URL collapse into a single artifact.
    pub fn artifacts(
        &self,
        path: &Path,
        id: &PackageId,
    ) -> Result<Vec<InstallerArtifact>, IndexError> {
        let mut by_url: HashMap<&str, usize> = HashMap::new();
        let mut used_names = BTreeSet::new();
        let mut artifacts: Vec<InstallerArtifact> = Vec::new();

        for node in &self.installers {
            let url = node
                .installer_url
                .as_deref()
                .ok_or_else(|| missing(path, "InstallerUrl"))?;
            let sha256 = node
                .installer_sha256
                .as_deref()
                .ok_or_else(|| missing(path, "InstallerSha256"))?;
            if by_url.contains_key(url) {
                continue;
            }

            let architecture = node.architecture.clone().or_else(|| self.architecture.clone());
            let installer_type = node
                .installer_type
                .clone()
                .or_else(|| self.installer_type.clone());
            let base = file_name_from_url(url).unwrap_or_else(|| {
                fallback_file_name(id, architecture.as_deref(), installer_type.as_deref())
            });
            let file_name = disambiguate(&base, &used_names);
            used_names.insert(file_name.clone());

            by_url.insert(url, artifacts.len());
            artifacts.push(InstallerArtifact {
                url: url.to_string(),
                sha256: sha256.trim().to_ascii_lowercase(),
                architecture,
                installer_type,
                file_name,
            });
        }
        Ok(artifacts)
    }
}

fn missing(path: &Path, field: &'static str) -> IndexError {
    IndexError::MissingField {
        path: path.to_path_buf(),
        field,
    }
}

/// Render a YAML scalar (`1.6.0`, `1.0`, `"1.10"`) as text.
pub fn scalar_to_string(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

/// Last non-empty path segment of `url`, percent-decoded and made safe to
/// use as a single file name.
pub fn file_name_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let decoded = urlencoding::decode(segment).ok()?;
    let cleaned: String = decoded
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_matches('.').to_string();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

fn fallback_file_name(id: &PackageId, architecture: Option<&str>, installer_type: Option<&str>) -> String {
    let extension = match installer_type.map(|t| t.to_ascii_lowercase()).as_deref() {
        Some("msi") | Some("wix") => "msi",
        Some("msix") => "msix",
        Some("appx") => "appx",
        Some("zip") => "zip",
        _ => "exe",
    };
    format!("{id}-{}.{extension}", architecture.unwrap_or("neutral"))
}

/// `setup.exe` → `setup-2.exe`, `setup-3.exe`, … until unused.
fn disambiguate(base: &str, used: &BTreeSet<String>) -> String {
    if !used.contains(base) {
        return base.to_string();
    }
    let (stem, extension) = match base.rfind('.') {
        Some(idx) if idx > 0 => (&base[..idx], &base[idx..]),
        _ => (base, ""),
    };
    (2..)
        .map(|n| format!("{stem}-{n}{extension}"))
        .find(|candidate| !used.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
