//! `winget-mirror validate-hash` — re-hash downloads against state.json.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;

use winget_mirror_sync::validate::{validate_hashes, FileStatus, ValidationReport};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Arguments for `winget-mirror validate-hash`.
#[derive(Args, Debug)]
pub struct ValidateHashArgs {
    /// Report format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,
}

impl ValidateHashArgs {
    pub fn run(self, root: &Path) -> Result<ExitCode> {
        let ctx = super::open(root)?;
        let report = validate_hashes(&ctx);

        match self.output {
            OutputFormat::Json => println!(
                "{}",
                serde_json::to_string_pretty(&report)
                    .context("failed to serialize validation report")?
            ),
            OutputFormat::Text => print_text(&report),
        }
        Ok(super::exit_code(!report.all_valid))
    }
}

fn print_text(report: &ValidationReport) {
    if report.packages.is_empty() {
        println!("No downloaded packages recorded in state.json.");
        return;
    }

    for (id, package) in &report.packages {
        if let Some(error) = &package.error {
            println!("{} {id} {}: {error}", "✗".red(), package.version);
            continue;
        }
        if package.files.is_empty() && package.missing_files.is_empty() {
            println!("{} {id} {}: no files recorded", "!".yellow(), package.version);
            continue;
        }

        for (file, check) in &package.files {
            match check.status {
                FileStatus::Match => println!("{} {id}/{file}", "✓".green()),
                FileStatus::Mismatch => {
                    println!("{} {id}/{file}: MISMATCH", "✗".red());
                    println!("    recorded: {}", check.expected);
                    println!("    computed: {}", check.computed);
                }
            }
        }
        for file in &package.missing_files {
            println!("{} {id}/{file}: missing", "✗".red());
        }
        for file in &package.unexpected_files {
            println!("{} {id}/{file}: not in state.json", "!".yellow());
        }
    }

    if report.all_valid {
        println!("{}", "All downloaded files validated successfully.".green());
    } else {
        println!(
            "{}",
            format!("Validation failed: {} file(s) missing or corrupted.", report.failures().len())
                .red()
        );
    }
}
