//! `winget-mirror sync` and `winget-mirror refresh-synced`.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use winget_mirror_core::{MirrorContext, PackageFilter};
use winget_mirror_sync::{
    pipeline::{self, SyncScope},
    repo, ArtifactOutcome, HttpFetcher, PackageReport, SyncReport,
};

/// Arguments for `winget-mirror sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// `Publisher` (prefix, case-insensitive) or `Publisher/Package`.
    pub filter: PackageFilter,
}

impl SyncArgs {
    pub fn run(self, root: &Path) -> Result<ExitCode> {
        let ctx = MirrorContext::open_for_sync(root)
            .with_context(|| format!("failed to open mirror at {}", root.display()))?;
        let scope = SyncScope::Filter(self.filter.clone());
        run_scope(ctx, &scope).with_context(|| format!("sync '{}' failed", self.filter))
    }
}

/// Arguments for `winget-mirror refresh-synced`.
#[derive(Args, Debug)]
pub struct RefreshSyncedArgs {}

impl RefreshSyncedArgs {
    pub fn run(self, root: &Path) -> Result<ExitCode> {
        let ctx = super::open(root)?;
        run_scope(ctx, &SyncScope::Synced).context("refresh-synced failed")
    }
}

fn run_scope(mut ctx: MirrorContext, scope: &SyncScope) -> Result<ExitCode> {
    let index = super::build_index(&ctx)?;
    let revision = repo::head_revision(&ctx.checkout_dir());
    let fetcher = HttpFetcher::new(&ctx.config.download);
    let report = pipeline::run_with_index(&mut ctx, &index, scope, &fetcher, revision)?;

    print_report(&report);
    Ok(super::exit_code(report.has_failures()))
}

fn print_report(report: &SyncReport) {
    if report.packages.is_empty() && report.unresolved.is_empty() {
        println!("No matching packages.");
        return;
    }

    for package in &report.packages {
        print_package(package);
    }
    for id in &report.unresolved {
        println!("{} {id} — no indexed version", "?".yellow());
    }

    let failed = report.failed_packages().count();
    let summary = format!(
        "{} package(s): {} file(s) downloaded, {} failed",
        report.packages.len(),
        report.downloaded(),
        failed
    );
    if failed > 0 {
        println!("{}", summary.red());
    } else {
        println!("{}", summary.green());
    }
}

fn print_package(package: &PackageReport) {
    let label = match &package.previous_version {
        Some(prev) if *prev != package.version => {
            format!("{} {prev} → {}", package.id, package.version)
        }
        _ => format!("{} {}", package.id, package.version),
    };

    if package.failed() {
        println!("{} {label} — failed", "✗".red());
        for outcome in package.failures() {
            println!("    {}", describe_failure(outcome));
        }
    } else if package.is_up_to_date() {
        println!("{} {label} — up to date", "✓".green());
    } else {
        println!(
            "{} {label} — downloaded {} file(s)",
            "✓".green(),
            package.downloaded()
        );
    }
}

fn describe_failure(outcome: &ArtifactOutcome) -> String {
    match outcome {
        ArtifactOutcome::HashMismatch {
            file_name,
            expected,
            computed,
        } => format!("{file_name}: hash mismatch (expected {expected}, got {computed})"),
        ArtifactOutcome::FetchFailed {
            file_name,
            attempts,
            error,
            ..
        } => format!("{file_name}: {error} after {attempts} attempt(s)"),
        ArtifactOutcome::WriteFailed { file_name, error } => format!("{file_name}: {error}"),
        ArtifactOutcome::Downloaded { file_name, .. } | ArtifactOutcome::Skipped { file_name, .. } => {
            file_name.clone()
        }
    }
}
