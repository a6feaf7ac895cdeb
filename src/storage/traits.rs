//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::listing::{Listing, ListingId};
use crate::output::CrawlStatistics;
use crate::pipeline::Dropped;
use crate::storage::{RunRecord, RunStatus};
use std::collections::HashSet;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// The storage is the run's output artifact: every accepted listing and every drop is
/// recorded against the run that produced it. It is also where the next run looks for the
/// identifiers it should not capture again.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new crawl run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    /// * `search_term` - The free-text query being crawled
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str, search_term: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run, whatever its status
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Gets the most recent run that completed
    fn latest_completed_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Updates the status of a run
    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Marks a run as completed and stores its statistics
    fn complete_run(&mut self, run_id: i64, stats: &CrawlStatistics) -> StorageResult<()>;

    // ===== Listings =====

    /// Records an accepted listing
    ///
    /// Returns false if the run already holds this listing.
    fn insert_listing(&mut self, run_id: i64, listing: &Listing) -> StorageResult<bool>;

    /// Records a listing dropped by the pipeline
    fn record_drop(&mut self, run_id: i64, dropped: &Dropped) -> StorageResult<()>;

    /// All listing identifiers a run captured
    fn listing_ids_for_run(&self, run_id: i64) -> StorageResult<HashSet<ListingId>>;

    /// Loads one stored listing record
    fn get_listing(&self, run_id: i64, id: ListingId) -> StorageResult<Option<Listing>>;

    // ===== Statistics =====

    /// Counts the listings a run captured
    fn count_listings(&self, run_id: i64) -> StorageResult<u64>;

    /// Drop counts per reason, most frequent first
    fn drop_reasons(&self, run_id: i64) -> StorageResult<Vec<(String, u64)>>;

    /// Statistics stored when the run completed
    fn load_run_statistics(&self, run_id: i64) -> StorageResult<Option<CrawlStatistics>>;
}
