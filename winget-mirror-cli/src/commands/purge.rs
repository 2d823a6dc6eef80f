//! `winget-mirror purge-package` and `winget-mirror purge-all-packages`.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;

use winget_mirror_core::PackageFilter;
use winget_mirror_sync::purge::{self, PurgedPackage};

/// Arguments for `winget-mirror purge-package`.
#[derive(Args, Debug)]
pub struct PurgePackageArgs {
    /// `Publisher` (prefix, case-insensitive) or `Publisher/Package`.
    pub filter: PackageFilter,

    /// Do not ask for confirmation.
    #[arg(long, short = 'y')]
    pub yes: bool,
}

impl PurgePackageArgs {
    pub fn run(self, root: &Path) -> Result<ExitCode> {
        let mut ctx = super::open(root)?;
        let ids = purge::matching_records(ctx.store.state(), &self.filter);
        if ids.is_empty() {
            println!("No downloaded packages match '{}'.", self.filter);
            return Ok(ExitCode::SUCCESS);
        }

        println!("Packages to purge:");
        for id in &ids {
            if let Some(record) = ctx.store.record(id) {
                println!("  {id} {}", record.version);
            }
        }
        if !super::confirm(&format!("Purge {} package(s)?", ids.len()), self.yes)? {
            println!("Aborted; nothing removed.");
            return Ok(ExitCode::SUCCESS);
        }

        let purged = purge::purge_matching(&mut ctx, &self.filter)
            .with_context(|| format!("purge '{}' failed", self.filter))?;
        print_purged(&purged);
        Ok(ExitCode::SUCCESS)
    }
}

/// Arguments for `winget-mirror purge-all-packages`.
#[derive(Args, Debug)]
pub struct PurgeAllArgs {
    /// Do not ask for confirmation.
    #[arg(long, short = 'y')]
    pub yes: bool,
}

impl PurgeAllArgs {
    pub fn run(self, root: &Path) -> Result<ExitCode> {
        let mut ctx = super::open(root)?;
        let count = ctx.store.state().downloads.len();
        let prompt = format!(
            "Remove all {count} downloaded package(s) and everything under {}?",
            root.join("downloads").display()
        );
        if !super::confirm(&prompt, self.yes)? {
            println!("Aborted; nothing removed.");
            return Ok(ExitCode::SUCCESS);
        }

        let purged = purge::purge_all(&mut ctx).context("purge-all-packages failed")?;
        print_purged(&purged);
        Ok(ExitCode::SUCCESS)
    }
}

fn print_purged(purged: &[PurgedPackage]) {
    for p in purged {
        println!("✓ Purged {} {}", p.id, p.version);
    }
    println!("{} package(s) purged", purged.len());
}
