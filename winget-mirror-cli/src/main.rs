//! winget-mirror — offline mirror of Winget manifests and installers.
//!
//! # Usage
//!
//! ```text
//! winget-mirror init <path>
//! winget-mirror [--root <path>] sync-repo
//! winget-mirror [--root <path>] sync <Publisher[/Package]>
//! winget-mirror [--root <path>] refresh-synced
//! winget-mirror [--root <path>] search [Publisher[/Package]]
//! winget-mirror [--root <path>] validate-hash [--output text|json]
//! winget-mirror [--root <path>] purge-package <Publisher[/Package]> [--yes]
//! winget-mirror [--root <path>] purge-all-packages [--yes]
//! winget-mirror [--root <path>] patch-repo [--server-url <url>] --output-dir <dir>
//! ```
//!
//! Exit status is 0 on full success, 1 when any package or file failed (after
//! the whole batch ran) and 2 on configuration errors.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

use commands::{
    init::InitArgs,
    patch::PatchRepoArgs,
    purge::{PurgeAllArgs, PurgePackageArgs},
    search::SearchArgs,
    sync::{RefreshSyncedArgs, SyncArgs},
    sync_repo::SyncRepoArgs,
    validate::ValidateHashArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "winget-mirror",
    version,
    about = "Mirror Winget manifests and installers for offline use",
    long_about = None,
)]
struct Cli {
    /// Mirror root (the directory holding config.json).
    #[arg(long, global = true, env = "WINGET_MIRROR_ROOT", default_value = ".")]
    root: PathBuf,

    /// Log debug detail to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a mirror root with default config.json and state.json.
    Init(InitArgs),

    /// Clone or update the manifest repository (sparse, manifests/ only).
    SyncRepo(SyncRepoArgs),

    /// Download the latest installers of matching packages.
    Sync(SyncArgs),

    /// Re-sync every already-downloaded package to its latest version.
    RefreshSynced(RefreshSyncedArgs),

    /// List catalog packages with their download status.
    Search(SearchArgs),

    /// Re-hash downloaded files against state.json.
    ValidateHash(ValidateHashArgs),

    /// Remove downloads and records of matching packages.
    PurgePackage(PurgePackageArgs),

    /// Remove every download and record.
    PurgeAllPackages(PurgeAllArgs),

    /// Write manifests whose installer URLs point at this mirror.
    PatchRepo(PatchRepoArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let root = cli.root;
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::SyncRepo(args) => args.run(&root),
        Commands::Sync(args) => args.run(&root),
        Commands::RefreshSynced(args) => args.run(&root),
        Commands::Search(args) => args.run(&root),
        Commands::ValidateHash(args) => args.run(&root),
        Commands::PurgePackage(args) => args.run(&root),
        Commands::PurgeAllPackages(args) => args.run(&root),
        Commands::PatchRepo(args) => args.run(&root),
    }
}

/// Logs go to stderr so `--output json` stays clean on stdout.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
