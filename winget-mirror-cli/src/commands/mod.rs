pub mod init;
pub mod patch;
pub mod purge;
pub mod search;
pub mod sync;
pub mod sync_repo;
pub mod validate;

use std::io::IsTerminal;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use dialoguer::Confirm;

use winget_mirror_core::{ManifestIndex, MirrorContext};

/// Open an initialized mirror at `root`.
pub(crate) fn open(root: &Path) -> Result<MirrorContext> {
    MirrorContext::open(root)
        .with_context(|| format!("failed to open mirror at {}", root.display()))
}

/// Index the mirror's manifest tree, warning about entries that failed.
pub(crate) fn build_index(ctx: &MirrorContext) -> Result<ManifestIndex> {
    let dir = ctx.manifests_dir();
    let index = ManifestIndex::build(&dir, ctx.config.manifest_layout).with_context(|| {
        format!(
            "failed to index manifests at {} — run `winget-mirror sync-repo` first",
            dir.display()
        )
    })?;
    for err in index.errors() {
        tracing::warn!("{err}");
    }
    Ok(index)
}

/// Ask before a destructive step. `--yes` skips the prompt; without a
/// terminal the prompt cannot be answered, so `--yes` is required.
pub(crate) fn confirm(prompt: &str, yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        bail!("refusing to continue without confirmation; pass --yes to proceed non-interactively");
    }
    Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .context("failed to read confirmation")
}

pub(crate) fn exit_code(failed: bool) -> ExitCode {
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
