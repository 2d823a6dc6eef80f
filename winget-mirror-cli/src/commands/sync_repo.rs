//! `winget-mirror sync-repo` — clone or update the manifest checkout.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;

use winget_mirror_sync::repo::{sync_repo, RepoSync};

#[derive(Args, Debug)]
pub struct SyncRepoArgs {}

impl SyncRepoArgs {
    pub fn run(self, root: &Path) -> Result<ExitCode> {
        let ctx = super::open(root)?;
        let result = sync_repo(&ctx).with_context(|| {
            format!(
                "failed to sync {} ({})",
                ctx.config.repo_url, ctx.config.revision
            )
        })?;

        match &result {
            RepoSync::Cloned { head } => {
                println!("✓ Cloned {} at {}", ctx.config.repo_url, short(head));
            }
            RepoSync::Updated { previous, head } if previous.as_deref() == Some(head.as_str()) => {
                println!("✓ Manifests already at {}", short(head));
            }
            RepoSync::Updated { previous, head } => {
                let from = previous.as_deref().map(short).unwrap_or("unknown");
                println!("✓ Updated manifests {from} → {}", short(head));
            }
        }
        Ok(ExitCode::SUCCESS)
    }
}

fn short(commit: &str) -> &str {
    commit.get(..12).unwrap_or(commit)
}
