//! Lint the resource definitions shipped with the Cloud Control provider
//!
//! Usage:
//!   cairn-lint
//!   cairn-lint --only S001,S002 --json
//!   cairn-lint --exclude D001
//!
//! Exits with status 1 when any diagnostic is reported.

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;

use cairn_lint::{Diagnostic, Selection, lint_all, parse_checks};
use cairn_provider_awscc::schemas;

#[derive(Parser, Debug)]
#[command(name = "cairn-lint")]
#[command(about = "Check Cairn resource definitions for schema mistakes")]
struct Args {
    /// Comma-separated check codes to run (default: all)
    #[arg(long, value_name = "CODES")]
    only: Option<String>,

    /// Comma-separated check codes to skip
    #[arg(long, value_name = "CODES")]
    exclude: Option<String>,

    /// Print diagnostics as a JSON array
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut selection = Selection::default();
    if let Some(only) = &args.only {
        selection.only = parse_checks(only).context("invalid --only")?;
    }
    if let Some(exclude) = &args.exclude {
        selection.exclude = parse_checks(exclude).context("invalid --exclude")?;
    }

    let definitions = schemas::definitions();
    let diagnostics = lint_all(&definitions, &selection);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&diagnostics)?);
    } else {
        print_diagnostics(&diagnostics, definitions.len());
    }

    if !diagnostics.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_diagnostics(diagnostics: &[Diagnostic], resource_count: usize) {
    for d in diagnostics {
        println!("{} {}", d.check.code().yellow().bold(), d);
    }

    if diagnostics.is_empty() {
        println!(
            "{}",
            format!("✓ {} resource definitions checked, no issues.", resource_count).green()
        );
    } else {
        println!();
        println!(
            "{}",
            format!("{} issue(s) found.", diagnostics.len()).red().bold()
        );
    }
}
