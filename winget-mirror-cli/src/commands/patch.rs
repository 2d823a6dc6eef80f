//! `winget-mirror patch-repo` — manifests pointing at this mirror.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use winget_mirror_sync::{patch_repo, validate_server_url};

/// Arguments for `winget-mirror patch-repo`.
#[derive(Args, Debug)]
pub struct PatchRepoArgs {
    /// Base URL the mirror is served from; defaults to `server_url` in
    /// config.json.
    #[arg(long)]
    pub server_url: Option<String>,

    /// Where to write `manifests/…`.
    #[arg(long)]
    pub output_dir: PathBuf,
}

impl PatchRepoArgs {
    pub fn run(self, root: &Path) -> Result<ExitCode> {
        let ctx = super::open(root)?;
        let server_url = self
            .server_url
            .or_else(|| ctx.config.server_url.clone())
            .context("no server URL: pass --server-url or set server_url in config.json")?;
        validate_server_url(&server_url)?;

        let index = super::build_index(&ctx)?;
        let report = patch_repo(&ctx, &index, &server_url, &self.output_dir).with_context(|| {
            format!("failed to write patched manifests to {}", self.output_dir.display())
        })?;

        for skipped in &report.skipped {
            println!(
                "{} {} {} skipped: {}",
                "!".yellow(),
                skipped.id,
                skipped.version,
                skipped.reason
            );
        }
        println!(
            "✓ Patched {} package(s), {} installer URL(s) → {}",
            report.patched.len(),
            report.urls_rewritten(),
            self.output_dir.join("manifests").display()
        );
        if !report.skipped.is_empty() {
            println!("{} package(s) skipped", report.skipped.len());
        }
        Ok(ExitCode::SUCCESS)
    }
}
