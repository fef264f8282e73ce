//! Sumi-Crawl main entry point
//!
//! This is the command-line interface for the Sumi-Crawl crawler.

use clap::Parser;
use std::path::{Path, PathBuf};
use sumi_crawl::config::{load_config_with_hash, pipeline_sizing_warning, validate, Config};
use sumi_crawl::crawler::run_crawl;
use sumi_crawl::output::{load_statistics, print_statistics, print_summary};
use sumi_crawl::storage::SqliteStorage;
use sumi_crawl::{FrontierConfig, Termination};
use tracing_subscriber::EnvFilter;

/// Sumi-Crawl: a polite, concurrent web crawler
///
/// Sumi-Crawl follows links from a set of seed URLs, never fetching a URL
/// twice and never hitting one host faster than the configured crawl delay.
/// Page titles are recorded in a SQLite database.
#[derive(Parser, Debug)]
#[command(name = "sumi-crawl")]
#[command(version)]
#[command(about = "A polite, concurrent web crawler", long_about = None)]
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

    /// Additional seed URL (repeatable); added to the configured seeds
    #[arg(long = "seed", value_name = "URL")]
    seeds: Vec<String>,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if !cli.seeds.is_empty() {
        config.crawler.seeds.extend(cli.seeds);
        validate(&config)?;
    }

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(config).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_crawl=info,warn"),
            1 => EnvFilter::new("sumi_crawl=debug,info"),
            2 => EnvFilter::new("sumi_crawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the validated configuration
fn handle_dry_run(config: &Config) {
    let crawler = &config.crawler;
    let frontier = FrontierConfig::from(crawler);

    println!("=== Sumi-Crawl Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Fetch workers: {}", crawler.fetch_workers);
    println!("  Parse workers: {}", crawler.parse_workers);
    println!("  Crawl delay: {}ms", crawler.crawl_delay_ms);
    println!("  Pre-fetch delay: {}ms", crawler.pre_fetch_delay_ms);
    println!("  Fetch timeout: {}ms", crawler.fetch_timeout_ms);
    println!(
        "  Retries: {} (delay {}ms)",
        crawler.max_fetch_retries, crawler.retry_delay_ms
    );
    println!("  Queue capacity: {}", frontier.queue_capacity);
    println!("  Handoff capacity: {}", crawler.handoff_capacity);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\nSeeds ({}):", crawler.seeds.len());
    for seed in &crawler.seeds {
        println!("  - {}", seed);
    }

    if let Some(warning) = pipeline_sizing_warning(crawler) {
        println!("\n! {}", warning);
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would start crawling with {} seed URLs",
        crawler.seeds.len()
    );
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Total seed URLs: {}", config.crawler.seeds.len());

    match run_crawl(config).await {
        Ok(summary) => {
            match summary.termination {
                Termination::Completed => tracing::info!("Crawl completed successfully"),
                Termination::Interrupted => tracing::warn!("Crawl interrupted"),
            }
            print_summary(&summary);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
