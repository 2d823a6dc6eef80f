//! `winget-mirror search` — catalog packages and their download status.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use winget_mirror_core::{MirrorContext, PackageFilter};
use winget_mirror_sync::status::{self, DownloadStatus, PackageStatus};

/// Arguments for `winget-mirror search`.
#[derive(Args, Debug)]
pub struct SearchArgs {
    /// `Publisher` (prefix, case-insensitive) or `Publisher/Package`;
    /// omit to list everything.
    pub filter: Option<PackageFilter>,
}

#[derive(Tabled)]
struct SearchRow {
    #[tabled(rename = "package")]
    package: String,
    #[tabled(rename = "latest")]
    latest: String,
    #[tabled(rename = "downloaded")]
    downloaded: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "synced")]
    synced: String,
}

impl SearchArgs {
    pub fn run(self, root: &Path) -> Result<ExitCode> {
        let ctx = MirrorContext::open_for_sync(root)
            .with_context(|| format!("failed to open mirror at {}", root.display()))?;
        let index = super::build_index(&ctx)?;
        let filter = self.filter.unwrap_or_default();
        let results = status::search(&ctx, &index, &filter);

        if results.is_empty() {
            println!("No packages match '{filter}'.");
            return Ok(ExitCode::SUCCESS);
        }

        let downloaded = results
            .iter()
            .filter(|r| r.status != DownloadStatus::NotDownloaded)
            .count();
        let rows: Vec<SearchRow> = results.iter().map(row).collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        println!("{} package(s), {downloaded} downloaded", results.len());
        Ok(ExitCode::SUCCESS)
    }
}

fn row(result: &PackageStatus) -> SearchRow {
    let latest = match &result.latest {
        Some(v) if result.update_available() => format!("{v} (new)"),
        Some(v) => v.to_string(),
        None => "-".to_string(),
    };
    SearchRow {
        package: result.id.to_string(),
        latest,
        downloaded: result
            .recorded
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "-".to_string()),
        status: status_label(result.status),
        synced: result
            .timestamp
            .map(|ts| format!("{} ago", status::format_age(ts)))
            .unwrap_or_else(|| "-".to_string()),
    }
}

fn status_label(status: DownloadStatus) -> String {
    let text = status.to_string();
    match status {
        DownloadStatus::Downloaded => text.green().to_string(),
        DownloadStatus::Missing | DownloadStatus::Empty => text.red().to_string(),
        DownloadStatus::Recorded => text.yellow().to_string(),
        DownloadStatus::NotDownloaded => text.bright_black().to_string(),
    }
}
