//! Shared fixtures: a mirror root on disk with a flat manifest tree and an
//! in-memory fetcher standing in for the network.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use sha2::{Digest, Sha256};
use tempfile::TempDir;

use winget_mirror_core::store::{self, load_config_at, save_config_at};
use winget_mirror_core::{ManifestLayout, MirrorContext, RetentionPolicy};
use winget_mirror_sync::fetch::{FetchError, Fetcher};

pub fn sha256(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn url_for(publisher: &str, package: &str, version: &str, file: &str) -> String {
    format!("https://cdn.example.com/{publisher}/{package}/{version}/{file}")
}

/// An initialized mirror root in a temp directory.
pub struct Mirror {
    _tmp: TempDir,
    pub root: PathBuf,
}

impl Mirror {
    pub fn new() -> Self {
        Self::with_retention(RetentionPolicy::Keep)
    }

    pub fn with_retention(retention: RetentionPolicy) -> Self {
        let tmp = TempDir::new().expect("tempdir");
        let root = tmp.path().join("mirror-root");
        store::init_at(&root).expect("init");
        let root = std::fs::canonicalize(&root).expect("canonical root");

        let mut config = load_config_at(&root).expect("config");
        config.manifest_layout = ManifestLayout::Flat;
        config.retention = retention;
        config.download.workers = 2;
        config.download.retries = 2;
        config.download.backoff_ms = 0;
        save_config_at(&root, &config).expect("save config");

        Self { _tmp: tmp, root }
    }

    pub fn ctx(&self) -> MirrorContext {
        MirrorContext::open(&self.root).expect("open mirror")
    }

    pub fn manifests_dir(&self) -> PathBuf {
        self.root.join("mirror").join("manifests")
    }

    pub fn version_dir(&self, publisher: &str, package: &str, version: &str) -> PathBuf {
        self.manifests_dir().join(publisher).join(package).join(version)
    }

    pub fn download_path(&self, publisher: &str, package: &str, version: &str, file: &str) -> PathBuf {
        self.root
            .join("downloads")
            .join(publisher)
            .join(package)
            .join(version)
            .join(file)
    }

    /// Write a version + installer manifest pair and register each file's
    /// bytes with `fetcher`.
    pub fn add_package(
        &self,
        fetcher: &MemoryFetcher,
        publisher: &str,
        package: &str,
        version: &str,
        files: &[(&str, &str)],
    ) {
        let dir = self.version_dir(publisher, package, version);
        std::fs::create_dir_all(&dir).expect("mkdir manifests");
        let id = format!("{publisher}.{package}");

        std::fs::write(dir.join(format!("{id}.yaml")), version_manifest(&id, version))
            .expect("write version manifest");
        std::fs::write(
            dir.join(format!("{id}.locale.en-US.yaml")),
            locale_manifest(&id, version),
        )
        .expect("write locale manifest");

        let installers: Vec<(String, String)> = files
            .iter()
            .map(|(file, bytes)| {
                let url = url_for(publisher, package, version, file);
                fetcher.serve(&url, bytes.as_bytes());
                (url, sha256(bytes.as_bytes()).to_uppercase())
            })
            .collect();
        std::fs::write(
            dir.join(format!("{id}.installer.yaml")),
            installer_manifest(&id, version, &installers),
        )
        .expect("write installer manifest");
    }

    pub fn state_json(&self) -> serde_json::Value {
        let text = std::fs::read_to_string(self.root.join("state.json")).expect("read state");
        serde_json::from_str(&text).expect("parse state")
    }
}

pub fn version_manifest(id: &str, version: &str) -> String {
    format!(
        "# Created with WinGetCreate\nPackageIdentifier: {id}\nPackageVersion: {version}\nDefaultLocale: en-US\nManifestType: version\nManifestVersion: 1.6.0\n"
    )
}

pub fn locale_manifest(id: &str, version: &str) -> String {
    format!(
        "PackageIdentifier: {id}\nPackageVersion: {version}\nPackageLocale: en-US\nPublisherUrl: https://vendor.example.com\nLicense: MIT\nShortDescription: Example tool\nManifestType: defaultLocale\nManifestVersion: 1.6.0\n"
    )
}

pub fn installer_manifest(id: &str, version: &str, installers: &[(String, String)]) -> String {
    let mut out = format!(
        "# yaml-language-server: $schema=https://aka.ms/winget-manifest.installer.1.6.0.schema.json\n\nPackageIdentifier: {id}\nPackageVersion: {version}\nInstallerType: exe\n"
    );
    if installers.is_empty() {
        out.push_str("Installers: []\n");
    } else {
        out.push_str("Installers:\n");
    }
    for (url, sha) in installers {
        out.push_str(&format!(
            "- Architecture: x64\n  InstallerUrl: {url}\n  InstallerSha256: {sha}\n"
        ));
    }
    out.push_str("ManifestType: installer\nManifestVersion: 1.6.0\n");
    out
}

/// Serves registered URLs from memory and records every request.
#[derive(Default)]
pub struct MemoryFetcher {
    bodies: Mutex<HashMap<String, Vec<u8>>>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: &str, bytes: &[u8]) {
        self.bodies
            .lock()
            .unwrap()
            .insert(url.to_string(), bytes.to_vec());
    }

    /// Every request for `url` fails with a retryable transport error.
    pub fn fail(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        let mut calls = self.calls.lock().unwrap().clone();
        calls.sort();
        calls
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

impl Fetcher for MemoryFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        if self.failing.lock().unwrap().contains(url) {
            return Err(FetchError::Transport("connection reset".into()));
        }
        let body = self
            .bodies
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or(FetchError::Status { code: 404 })?;
        std::fs::write(dest, &body)?;
        Ok(body.len() as u64)
    }
}
