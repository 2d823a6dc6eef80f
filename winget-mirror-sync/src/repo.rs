//! Manifest repository sync through the system `git` binary.
//!
//! The first run clones without checkout, limits the working tree to
//! `manifests/` with sparse checkout, then checks out the configured
//! revision. Later runs fetch and check out again.

use std::path::Path;
use std::process::Command;

use winget_mirror_core::store::MANIFESTS_DIR;
use winget_mirror_core::MirrorContext;

use crate::SyncError;

/// What [`sync_repo`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoSync {
    Cloned { head: String },
    Updated { previous: Option<String>, head: String },
}

impl RepoSync {
    pub fn head(&self) -> &str {
        match self {
            RepoSync::Cloned { head } | RepoSync::Updated { head, .. } => head,
        }
    }
}

/// Bring `<root>/<mirror_dir>` to `config.revision` of `config.repo_url`.
pub fn sync_repo(ctx: &MirrorContext) -> Result<RepoSync, SyncError> {
    let dir = ctx.checkout_dir();
    let revision = &ctx.config.revision;

    if dir.join(".git").exists() {
        let previous = head_revision(&dir);
        tracing::info!("fetching {} into {}", ctx.config.repo_url, dir.display());
        git(&dir, &["fetch", "--prune", "origin"])?;
        checkout(&dir, revision)?;
        let head = current_head(&dir)?;
        return Ok(RepoSync::Updated { previous, head });
    }

    if let Some(parent) = dir.parent() {
        std::fs::create_dir_all(parent).map_err(|e| crate::error::io_err(parent, e))?;
    }
    tracing::info!("cloning {} into {}", ctx.config.repo_url, dir.display());
    run(
        Command::new("git")
            .args(["clone", "--no-checkout", ctx.config.repo_url.as_str()])
            .arg(&dir),
        "clone",
    )?;
    git(&dir, &["sparse-checkout", "set", MANIFESTS_DIR])?;
    checkout(&dir, revision)?;
    let head = current_head(&dir)?;
    Ok(RepoSync::Cloned { head })
}

/// HEAD commit of the checkout at `dir`, or `None` if it is not a git
/// checkout.
pub fn head_revision(dir: &Path) -> Option<String> {
    if !dir.join(".git").exists() {
        return None;
    }
    current_head(dir).ok()
}

fn current_head(dir: &Path) -> Result<String, SyncError> {
    git(dir, &["rev-parse", "HEAD"]).map(|out| out.trim().to_string())
}

/// Prefer the remote-tracking branch so a moved upstream branch is picked
/// up; fall back to the revision as given (tag or commit).
fn checkout(dir: &Path, revision: &str) -> Result<(), SyncError> {
    let remote = format!("origin/{revision}");
    let remote_exists = git(dir, &["rev-parse", "--verify", "--quiet", &remote]).is_ok();
    let target = if remote_exists { remote.as_str() } else { revision };
    git(dir, &["checkout", "--detach", "--force", target])?;
    Ok(())
}

fn git(dir: &Path, args: &[&str]) -> Result<String, SyncError> {
    let command = args.first().copied().unwrap_or_default();
    run(Command::new("git").arg("-C").arg(dir).args(args), command)
}

fn run(cmd: &mut Command, name: &str) -> Result<String, SyncError> {
    let output = cmd.output().map_err(|e| SyncError::Git {
        command: name.to_string(),
        message: format!("could not run git: {e}"),
    })?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SyncError::Git {
            command: name.to_string(),
            message: stderr.trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
