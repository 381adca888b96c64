//! Product-Harvest main entry point
//!
//! This is the command-line interface for the Product-Harvest crawler.

use anyhow::Context;
use clap::Parser;
use product_harvest::config::{load_config_with_hash, Config, LoggingConfig};
use product_harvest::crawler::{plan_harvest, Coordinator, HarvestOptions};
use product_harvest::report::{load_statistics, print_statistics, print_summary};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Product-Harvest: a resumable product page crawler
///
/// Product-Harvest collects the products users interacted with from the
/// behaviour store, fetches each product page politely, and records the
/// extracted attributes. Progress is checkpointed so an interrupted run
/// resumes where it stopped.
#[derive(Parser, Debug)]
#[command(name = "product-harvest")]
#[command(version)]
#[command(about = "A resumable product page crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Start over, deleting processed ids and both ledgers
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    fresh: bool,

    /// Re-extract the product universe even if a cache exists
    #[arg(long, conflicts_with = "stats")]
    refresh_universe: bool,

    /// Plan the run and show what would be crawled without fetching
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the checkpoint files and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    setup_logging(cli.verbose, cli.quiet, &config.logging)?;
    tracing::info!(
        "Configuration loaded from {} (hash: {})",
        cli.config.display(),
        config_hash
    );

    let options = HarvestOptions {
        fresh: cli.fresh,
        refresh_universe: cli.refresh_universe,
    };

    if cli.stats {
        handle_stats(&config)
    } else if cli.dry_run {
        handle_dry_run(&config, options)
    } else {
        handle_harvest(config, options).await
    }
}

/// Sets up the console subscriber and the optional log files
fn setup_logging(verbose: u8, quiet: bool, logging: &LoggingConfig) -> anyhow::Result<()> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("product_harvest=info,warn"),
            1 => EnvFilter::new("product_harvest=debug,info"),
            2 => EnvFilter::new("product_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_filter(filter);

    let log_file = match &logging.log_file {
        Some(path) => Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(open_log_file(path)?))
                .with_filter(LevelFilter::INFO),
        ),
        None => None,
    };

    let error_log_file = match &logging.error_log_file {
        Some(path) => Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(open_log_file(path)?))
                .with_filter(LevelFilter::ERROR),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(log_file)
        .with(error_log_file)
        .init();

    Ok(())
}

fn open_log_file(path: &str) -> anyhow::Result<File> {
    let path = Path::new(path);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

/// Handles the --dry-run mode: plans the run and shows what would be crawled
///
/// Nothing is written; the universe cache and ledgers are only read.
fn handle_dry_run(config: &Config, options: HarvestOptions) -> anyhow::Result<()> {
    println!("=== Product-Harvest Dry Run ===\n");

    println!("Source:");
    println!("  Kind: {:?}", config.source.kind);
    println!("  Path: {}", config.source.path);
    println!(
        "  Event collections ({}): {}",
        config.source.event_collections.len(),
        config.source.event_collections.join(", ")
    );

    println!("\nCrawler Configuration:");
    println!("  Concurrency: {}", config.crawler.concurrency);
    println!(
        "  Politeness delay: {}-{}ms",
        config.crawler.delay_min_ms, config.crawler.delay_max_ms
    );
    println!("  Throttle back-off: {}ms", config.crawler.retry_delay_ms);
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);
    println!(
        "  Checkpoint every {} items",
        config.crawler.checkpoint_interval
    );
    println!("  Base URL: {}", config.crawler.base_url);

    println!("\nExtracted Fields ({}):", config.extract.fields.len());
    for field in &config.extract.fields {
        let marker = if field.name == config.extract.primary {
            " (primary)"
        } else {
            ""
        };
        println!("  - {}: {}{}", field.name, field.selector, marker);
    }

    let plan = plan_harvest(config, options)?;
    let work_list = &plan.work_list;

    println!("\n✓ Configuration is valid");
    println!("✓ {} products in universe", plan.universe_size);
    println!(
        "✓ {} already processed, would crawl {}",
        plan.universe_size - work_list.len(),
        work_list.len()
    );
    for item in work_list.iter().take(10) {
        println!("    * {} {}", item.id, item.url);
    }
    if work_list.len() > 10 {
        println!("    ... and {} more", work_list.len() - 10);
    }

    Ok(())
}

/// Handles the --stats mode: shows statistics from the checkpoint files
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Processed ids: {}", config.output.processed_ids_path);
    println!("Success ledger: {}", config.output.success_path);
    println!("Failure ledger: {}\n", config.output.failed_path);

    let stats = load_statistics(config)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config, options: HarvestOptions) -> anyhow::Result<()> {
    if options.fresh {
        tracing::info!("Starting fresh harvest (ignoring previous state)");
    } else {
        tracing::info!("Starting harvest (resuming from checkpoint files if present)");
    }

    let coordinator = match Coordinator::new(config, options) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Harvest aborted: {}", e);
            return Err(e.into());
        }
    };

    let summary = coordinator.run().await?;
    print_summary(&summary);
    tracing::info!("Harvest completed successfully");

    Ok(())
}
