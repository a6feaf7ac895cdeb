//! Listing-Sweep main entry point
//!
//! This is the command-line interface for the Listing-Sweep crawler.

use anyhow::Context;
use clap::Parser;
use listing_sweep::config::{load_config_with_hash, validate, Config};
use listing_sweep::crawler::{run_crawl, CrawlPlan};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Listing-Sweep: an adaptive listings-search crawler
///
/// Listing-Sweep splits a search by price until every partition fits under the upstream's
/// result ceiling, walks each partition's pages, fetches every listing's details, and stores
/// the listings not captured by the previous run.
#[derive(Parser, Debug)]
#[command(name = "listing-sweep")]
#[command(version)]
#[command(about = "An adaptive listings-search crawler", long_about = None)]
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

    /// Do not deduplicate against listings captured by the previous run
    #[arg(long)]
    fresh: bool,

    /// Validate config and show the root partitions without making any request
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics of the latest run from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,

    /// Search term, overriding the config file
    #[arg(long)]
    query: Option<String>,

    /// Check-in date (YYYY-MM-DD, optionally with a +N-M fuzz), overriding the config file
    #[arg(long)]
    checkin: Option<String>,

    /// Check-out date (YYYY-MM-DD, optionally with a +N-M fuzz), overriding the config file
    #[arg(long)]
    checkout: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if apply_overrides(&mut config, &cli) {
        validate(&config).context("Invalid command-line override")?;
    }

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config)
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_crawl(&config, &config_hash, cli.fresh).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("listing_sweep=info,warn"),
            1 => EnvFilter::new("listing_sweep=debug,info"),
            2 => EnvFilter::new("listing_sweep=trace,debug"),
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

/// Copies search flags over the loaded config; returns true if anything changed
fn apply_overrides(config: &mut Config, cli: &Cli) -> bool {
    let mut changed = false;
    if let Some(query) = &cli.query {
        config.search.query = query.clone();
        changed = true;
    }
    if let Some(checkin) = &cli.checkin {
        config.search.checkin = Some(checkin.clone());
        changed = true;
    }
    if let Some(checkout) = &cli.checkout {
        config.search.checkout = Some(checkout.clone());
        changed = true;
    }
    changed
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    let plan = CrawlPlan::from_config(config).context("Invalid search")?;

    println!("=== Listing-Sweep Dry Run ===\n");

    println!("Search:");
    println!("  Query: {}", config.search.query);
    println!("  Currency: {}", config.search.currency);
    if let (Some(checkin), Some(checkout)) = (&config.search.checkin, &config.search.checkout) {
        println!("  Dates: {} to {}", checkin, checkout);
    }
    if !config.search.room_types.is_empty() {
        println!("  Room types: {}", config.search.room_types.join(", "));
    }
    println!("  Page size: {}", config.search.page_size);

    println!("\nCrawler Configuration:");
    println!("  Result ceiling: {}", config.crawler.result_ceiling);
    println!(
        "  Max concurrent requests: {}",
        config.crawler.max_concurrent_requests
    );
    match config.crawler.max_rate_limit_pauses {
        Some(max) => println!(
            "  Rate-limit pause: {}s (at most {} per request)",
            config.crawler.rate_limit_pause_secs, max
        ),
        None => println!(
            "  Rate-limit pause: {}s",
            config.crawler.rate_limit_pause_secs
        ),
    }
    println!(
        "  Retries: {} ({}ms doubling, capped at {}ms)",
        config.crawler.max_retries,
        config.crawler.retry_base_delay_ms,
        config.crawler.retry_max_delay_ms
    );

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    if let Some(dedup) = &config.dedup {
        println!(
            "  Dedup sentinels: {} / {}",
            dedup.primary_sentinel, dedup.backup_sentinel
        );
    }

    println!("\nRoot Partitions ({}):", plan.roots.len());
    for query in &plan.roots {
        println!("  - {}", query);
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would start crawling with {} root partitions",
        plan.roots.len()
    );

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    use listing_sweep::output::{load_statistics, print_statistics};
    use listing_sweep::storage::open_storage;
    use std::path::Path;

    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))
        .context("Failed to open database")?;

    match load_statistics(&storage).context("Failed to load statistics")? {
        Some(report) => print_statistics(&report),
        None => println!("No crawl runs recorded yet"),
    }

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: &Config, config_hash: &str, fresh: bool) -> anyhow::Result<()> {
    if fresh {
        tracing::info!("Starting fresh crawl (ignoring previously captured listings)");
    } else {
        tracing::info!("Starting crawl (skipping listings captured by the previous run)");
    }

    let stats = run_crawl(config, config_hash, fresh)
        .await
        .context("Crawl failed")?;

    tracing::info!(
        "Crawl completed successfully: {} listings stored in {}",
        stats.accepted,
        config.output.database_path
    );
    Ok(())
}
