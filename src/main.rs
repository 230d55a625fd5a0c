//! ImageFerry CLI - Parallel Media Store Migration
//!
//! Migrates every image (and its metadata) of a source media store to a
//! destination store over a fixed pool of parallel workers.

use anyhow::Context;
use clap::Parser;
use imageferry::config::{CliArgs, MigrationConfig};
use imageferry::core::MigrationEngine;
use imageferry::progress::ProgressReporter;
use tracing_subscriber::EnvFilter;

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    // Parse CLI arguments
    let args = CliArgs::parse();

    // Handle result
    if let Err(e) = run(args) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: CliArgs) -> anyhow::Result<()> {
    let config = MigrationConfig::load(&args.config).context("failed to load configuration")?;

    // An unparseable --since value is ignored, like the original tool did
    let since = args.since_datetime().map(|dt| dt.timestamp());
    if args.since.is_some() && since.is_none() {
        tracing::warn!("--since timestamp out of range, migrating everything");
    }
    if let Some(since) = args.since_datetime() {
        println!("Migrating images added since {}", since);
    }

    // Create progress reporter
    let progress = if args.quiet {
        ProgressReporter::disabled()
    } else if args.verbose {
        ProgressReporter::verbose()
    } else {
        ProgressReporter::new()
    };

    // Create and run the migration engine
    let engine = MigrationEngine::new(config)
        .with_workers(args.workers)
        .with_since(since)
        .with_progress(progress);

    let rt = tokio::runtime::Runtime::new().context("failed to create runtime")?;
    let result = rt.block_on(engine.execute())?;

    // Print results
    if !args.quiet {
        result.print_summary();
    }

    if !result.is_success() {
        std::process::exit(1);
    }

    Ok(())
}
