//! `winget-mirror init <path>`

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;

use winget_mirror_core::store::{self, InitOutcome};

/// Create a mirror root.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize; created if missing.
    pub path: PathBuf,
}

impl InitArgs {
    pub fn run(self) -> Result<ExitCode> {
        let outcome = store::init_at(&self.path)
            .with_context(|| format!("failed to initialize '{}'", self.path.display()))?;

        match outcome {
            InitOutcome::Created { root } => {
                println!("✓ Initialized mirror at {}", root.display());
                println!("  Next: winget-mirror --root {} sync-repo", root.display());
            }
            InitOutcome::AlreadyInitialized { root } => {
                println!("✓ {} is already a mirror root; nothing changed", root.display());
            }
        }
        Ok(ExitCode::SUCCESS)
    }
}
