//! Config and state persistence for a mirror root.
//!
//! # Storage layout
//!
//! ```text
//! <mirror-root>/
//!   config.json
//!   state.json
//!   mirror/manifests/<Publisher>/<Package>/<Version>/*.yaml
//!   downloads/<Publisher>/<Package>/<Version>/<installer files>
//! ```
//!
//! # Run lifecycle
//!
//! [`StateStore`] owns `state.json`. Mutating operations call
//! [`StateStore::begin_run`], then [`StateStore::checkpoint`] after each
//! package (persisting immediately), then [`StateStore::end_run`] which stamps
//! `last_sync`. Every write goes to a `.tmp` sibling and is renamed into
//! place, so an interrupted run never leaves a half-written file.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{io_err, StoreError};
use crate::types::{DownloadRecord, MirrorConfig, PackageId, SyncState};
use crate::version::Version;

pub const CONFIG_FILE: &str = "config.json";
pub const STATE_FILE: &str = "state.json";
pub const DOWNLOADS_DIR: &str = "downloads";
pub const MANIFESTS_DIR: &str = "manifests";

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<root>/config.json` — pure, no I/O.
pub fn config_path_at(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// `<root>/state.json` — pure, no I/O.
pub fn state_path_at(root: &Path) -> PathBuf {
    root.join(STATE_FILE)
}

/// `<root>/downloads/<Publisher>/<Package>/<Version>/`
pub fn artifact_dir_at(root: &Path, id: &PackageId, version: &Version) -> PathBuf {
    root.join(DOWNLOADS_DIR)
        .join(&id.publisher)
        .join(&id.name)
        .join(version.as_str())
}

/// `<root>/<mirror_dir>/manifests/`
pub fn manifests_dir_at(root: &Path, config: &MirrorConfig) -> PathBuf {
    root.join(&config.mirror_dir).join(MANIFESTS_DIR)
}

// ---------------------------------------------------------------------------
// 2. Atomic JSON I/O
// ---------------------------------------------------------------------------

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    if !path.exists() {
        return Err(StoreError::NotInitialized {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    serde_json::from_str(&contents).map_err(|e| StoreError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Write flow: serialize → `<path>.tmp` sibling → `rename`.
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// 3. Config
// ---------------------------------------------------------------------------

/// Load `<root>/config.json`.
///
/// Returns `StoreError::NotInitialized` if absent, `StoreError::Parse` (with
/// path + line context) if malformed.
pub fn load_config_at(root: &Path) -> Result<MirrorConfig, StoreError> {
    read_json(&config_path_at(root))
}

/// Atomically save `<root>/config.json`.
pub fn save_config_at(root: &Path, config: &MirrorConfig) -> Result<(), StoreError> {
    write_json_atomic(&config_path_at(root), config)
}

// ---------------------------------------------------------------------------
// 4. Init
// ---------------------------------------------------------------------------

/// Result of [`init_at`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    Created { root: PathBuf },
    AlreadyInitialized { root: PathBuf },
}

/// Create `<root>` with a default `config.json` and an empty `state.json`.
///
/// Idempotent: if `config.json` already exists nothing is touched.
pub fn init_at(root: &Path) -> Result<InitOutcome, StoreError> {
    std::fs::create_dir_all(root).map_err(|e| io_err(root, e))?;
    let root = std::fs::canonicalize(root).map_err(|e| io_err(root, e))?;

    if config_path_at(&root).exists() {
        return Ok(InitOutcome::AlreadyInitialized { root });
    }

    save_config_at(&root, &MirrorConfig::default())?;
    let state_path = state_path_at(&root);
    if !state_path.exists() {
        write_json_atomic(&state_path, &SyncState::new(root.clone()))?;
    }
    Ok(InitOutcome::Created { root })
}

// ---------------------------------------------------------------------------
// 5. State store
// ---------------------------------------------------------------------------

/// Exclusive owner of `state.json` for the duration of a run.
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    state: SyncState,
    run_started_at: Option<DateTime<Utc>>,
}

impl StateStore {
    /// Load `<root>/state.json`.
    ///
    /// A missing file is `StoreError::NotInitialized`; an unreadable or
    /// invalid file is always an error and is never replaced.
    pub fn load_at(root: &Path) -> Result<Self, StoreError> {
        let path = state_path_at(root);
        let state = read_json(&path)?;
        Ok(Self {
            path,
            state,
            run_started_at: None,
        })
    }

    /// Like [`StateStore::load_at`], but starts from an empty state when the
    /// file does not exist yet. An existing invalid file is still an error.
    pub fn load_or_fresh_at(root: &Path) -> Result<Self, StoreError> {
        match Self::load_at(root) {
            Err(StoreError::NotInitialized { path }) => {
                tracing::debug!("no state at {}; starting fresh", path.display());
                Ok(Self {
                    path,
                    state: SyncState::new(root.to_path_buf()),
                    run_started_at: None,
                })
            }
            other => other,
        }
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self, id: &PackageId) -> Option<&DownloadRecord> {
        self.state.downloads.get(id)
    }

    /// Mark the start of a mutating run; `end_run` stamps this time as
    /// `last_sync`.
    pub fn begin_run(&mut self) {
        self.run_started_at = Some(Utc::now());
    }

    /// Store `record` for `id` and persist immediately.
    pub fn checkpoint(&mut self, id: PackageId, record: DownloadRecord) -> Result<(), StoreError> {
        self.state.downloads.insert(id, record);
        self.save()
    }

    /// Drop the record for `id` and persist immediately.
    pub fn remove(&mut self, id: &PackageId) -> Result<Option<DownloadRecord>, StoreError> {
        let removed = self.state.downloads.remove(id);
        if removed.is_some() {
            self.save()?;
        }
        Ok(removed)
    }

    /// Stamp `last_sync` and persist.
    pub fn end_run(&mut self) -> Result<(), StoreError> {
        let finished = self.run_started_at.take().unwrap_or_else(Utc::now);
        self.state.last_sync = Some(finished);
        self.save()
    }

    fn save(&self) -> Result<(), StoreError> {
        write_json_atomic(&self.path, &self.state)
    }
}

// ---------------------------------------------------------------------------
// 6. Context
// ---------------------------------------------------------------------------

/// Everything an operation needs about one mirror root: where it lives, its
/// immutable config for this run, and the state store.
#[derive(Debug)]
pub struct MirrorContext {
    pub root: PathBuf,
    pub config: MirrorConfig,
    pub store: StateStore,
}

impl MirrorContext {
    /// Open an initialized mirror. Both files must exist and parse.
    pub fn open(root: &Path) -> Result<Self, StoreError> {
        let config = load_config_at(root)?;
        let store = StateStore::load_at(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            config,
            store,
        })
    }

    /// Open a mirror whose `state.json` may not exist yet (a first sync).
    pub fn open_for_sync(root: &Path) -> Result<Self, StoreError> {
        let config = load_config_at(root)?;
        let store = StateStore::load_or_fresh_at(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            config,
            store,
        })
    }

    pub fn manifests_dir(&self) -> PathBuf {
        manifests_dir_at(&self.root, &self.config)
    }

    pub fn checkout_dir(&self) -> PathBuf {
        self.root.join(&self.config.mirror_dir)
    }

    pub fn artifact_dir(&self, id: &PackageId, version: &Version) -> PathBuf {
        artifact_dir_at(&self.root, id, version)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
