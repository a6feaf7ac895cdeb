//! Crawl statistics
//!
//! Counters are collected by the coordinator while a run is in progress, stored on the run
//! row when it completes, and read back for `--stats`.

use crate::storage::{RunRecord, Storage};
use crate::SweepError;
use serde::{Deserialize, Serialize};

/// Counters for one crawl run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlStatistics {
    /// Root queries seeded (price windows times date pairs)
    pub root_partitions: u64,

    /// Queries split because they exceeded the result ceiling
    pub splits: u64,

    /// Retrievable partitions whose pages were walked
    pub leaves_walked: u64,

    /// Search pages processed, first pages included
    pub pages_fetched: u64,

    /// Listing identifiers collected by the walkers
    pub listings_discovered: u64,

    /// Listings dropped by the monthly rate check
    pub rate_check_drops: u64,

    /// Listings accepted by the pipeline
    pub accepted: u64,

    /// Listings dropped as duplicates
    pub duplicates: u64,

    /// Listings dropped by other pipeline stages
    pub filtered: u64,

    /// Partitions abandoned after an error
    pub aborted_partitions: u64,

    /// Listings whose detail could not be fetched or validated
    pub skipped_listings: u64,

    /// Global rate-limit pauses
    pub rate_limit_pauses: u64,

    /// Local retries of transient failures
    pub retries: u64,
}

impl CrawlStatistics {
    /// Logs a one-line summary at the end of a crawl
    pub fn log_summary(&self) {
        tracing::info!(
            "Crawl finished: {} accepted, {} duplicates, {} filtered, {} skipped, {} partitions aborted \
             ({} leaves, {} splits, {} pages, {} rate-limit pauses, {} retries)",
            self.accepted,
            self.duplicates,
            self.filtered,
            self.skipped_listings,
            self.aborted_partitions,
            self.leaves_walked,
            self.splits,
            self.pages_fetched,
            self.rate_limit_pauses,
            self.retries
        );
    }
}

/// What `--stats` shows about one run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run: RunRecord,
    /// Counters, present once the run completed
    pub stats: Option<CrawlStatistics>,
    pub stored_listings: u64,
    pub drop_reasons: Vec<(String, u64)>,
}

/// Loads statistics of the latest run from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(Some(RunReport))` - The latest run and its statistics
/// * `Ok(None)` - No run has been recorded yet
/// * `Err(SweepError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<Option<RunReport>, SweepError> {
    let Some(run) = storage.get_latest_run()? else {
        return Ok(None);
    };

    let stats = storage.load_run_statistics(run.id)?;
    let stored_listings = storage.count_listings(run.id)?;
    let drop_reasons = storage.drop_reasons(run.id)?;

    Ok(Some(RunReport {
        run,
        stats,
        stored_listings,
        drop_reasons,
    }))
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `report` - The run report to display
pub fn print_statistics(report: &RunReport) {
    let run = &report.run;
    println!("=== Crawl Statistics ===\n");

    println!("Run {} ({}):", run.id, run.status.to_db_string());
    println!("  Search term: {}", run.search_term);
    println!("  Started: {}", run.started_at);
    if let Some(finished) = &run.finished_at {
        println!("  Finished: {}", finished);
    }
    println!("  Listings stored: {}", report.stored_listings);
    println!();

    if let Some(stats) = &report.stats {
        println!("Search Space:");
        println!("  Root partitions: {}", stats.root_partitions);
        println!("  Splits: {}", stats.splits);
        println!("  Leaves walked: {}", stats.leaves_walked);
        println!("  Pages fetched: {}", stats.pages_fetched);
        println!("  Aborted partitions: {}", stats.aborted_partitions);
        println!();

        println!("Listings:");
        println!("  Discovered: {}", stats.listings_discovered);
        println!("  Dropped by rate check: {}", stats.rate_check_drops);
        println!("  Accepted: {}", stats.accepted);
        println!("  Duplicates: {}", stats.duplicates);
        println!("  Filtered: {}", stats.filtered);
        println!("  Skipped: {}", stats.skipped_listings);
        println!();

        println!("Throttling:");
        println!("  Rate-limit pauses: {}", stats.rate_limit_pauses);
        println!("  Retries: {}", stats.retries);
        println!();
    } else {
        println!("No statistics recorded (run did not complete)\n");
    }

    if !report.drop_reasons.is_empty() {
        println!("Drop Reasons:");
        for (reason, count) in &report.drop_reasons {
            println!("  {}: {}", reason, count);
        }
        println!();
    }

    if let Some(stats) = &report.stats {
        let offered = stats.accepted + stats.duplicates + stats.filtered;
        let acceptance = if offered > 0 {
            (stats.accepted as f64 / offered as f64) * 100.0
        } else {
            0.0
        };
        println!(
            "Acceptance Rate: {:.1}% ({} / {} listings accepted)",
            acceptance, stats.accepted, offered
        );
    }
}
