//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::dedup::{PriorError, PriorIdentifierSource};
use crate::listing::{Listing, ListingId};
use crate::output::CrawlStatistics;
use crate::pipeline::Dropped;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus};
use crate::SweepError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashSet;
use std::path::Path;

const RUN_COLUMNS: &str = "id, started_at, finished_at, config_hash, search_term, status";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(SweepError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, SweepError> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, SweepError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
        Ok(RunRecord {
            id: row.get(0)?,
            started_at: row.get(1)?,
            finished_at: row.get(2)?,
            config_hash: row.get(3)?,
            search_term: row.get(4)?,
            status: RunStatus::from_db_string(&row.get::<_, String>(5)?)
                .unwrap_or(RunStatus::Running),
        })
    }
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str, search_term: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, search_term, status) VALUES (?1, ?2, ?3, ?4)",
            params![now, config_hash, search_term, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let sql = format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&sql, params![run_id], Self::run_from_row)
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let sql = format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS);
        let run = self.conn.query_row(&sql, [], Self::run_from_row).optional()?;
        Ok(run)
    }

    fn latest_completed_run(&self) -> StorageResult<Option<RunRecord>> {
        let sql = format!(
            "SELECT {} FROM runs WHERE status = ?1 ORDER BY id DESC LIMIT 1",
            RUN_COLUMNS
        );
        let run = self
            .conn
            .query_row(
                &sql,
                params![RunStatus::Completed.to_db_string()],
                Self::run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1 WHERE id = ?2",
            params![status.to_db_string(), run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn complete_run(&mut self, run_id: i64, stats: &CrawlStatistics) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let stats_json = serde_json::to_string(stats)?;
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, stats_json = ?3 WHERE id = ?4",
            params![RunStatus::Completed.to_db_string(), now, stats_json, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Listings =====

    fn insert_listing(&mut self, run_id: i64, listing: &Listing) -> StorageResult<bool> {
        let record_json = serde_json::to_string(listing)?;
        let rate_type = listing
            .summary
            .as_ref()
            .map(|c| serde_json::to_value(&c.summary.pricing.rate_type))
            .transpose()?
            .map(|v| match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            });

        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO listings
             (run_id, listing_id, url, name, room_type, price_rate, price_rate_type,
              search_term, record_json, captured_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                run_id,
                listing.id.to_string(),
                listing.url,
                listing.detail.name,
                listing.detail.room_and_property_type,
                listing.price_rate(),
                rate_type,
                listing.search_term,
                record_json,
                listing.scraped_at.to_rfc3339(),
            ],
        )?;
        Ok(inserted > 0)
    }

    fn record_drop(&mut self, run_id: i64, dropped: &Dropped) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO drops (run_id, listing_id, stage, reason, dropped_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![run_id, dropped.id.to_string(), dropped.stage, dropped.reason, now],
        )?;
        Ok(())
    }

    fn listing_ids_for_run(&self, run_id: i64) -> StorageResult<HashSet<ListingId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT listing_id FROM listings WHERE run_id = ?1")?;
        let rows = stmt.query_map(params![run_id], |row| row.get::<_, String>(0))?;

        let mut ids = HashSet::new();
        for row in rows {
            let raw = row?;
            match raw.parse::<ListingId>() {
                Ok(id) => {
                    ids.insert(id);
                }
                Err(_) => tracing::warn!("Ignoring malformed listing id '{}' in run {}", raw, run_id),
            }
        }
        Ok(ids)
    }

    fn get_listing(&self, run_id: i64, id: ListingId) -> StorageResult<Option<Listing>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT record_json FROM listings WHERE run_id = ?1 AND listing_id = ?2",
                params![run_id, id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    // ===== Statistics =====

    fn count_listings(&self, run_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM listings WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn drop_reasons(&self, run_id: i64) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT reason, COUNT(*) AS n FROM drops WHERE run_id = ?1
             GROUP BY reason ORDER BY n DESC, reason ASC",
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?;

        let mut reasons = Vec::new();
        for row in rows {
            reasons.push(row?);
        }
        Ok(reasons)
    }

    fn load_run_statistics(&self, run_id: i64) -> StorageResult<Option<CrawlStatistics>> {
        let json: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT stats_json FROM runs WHERE id = ?1",
                params![run_id],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            None => Err(StorageError::RunNotFound(run_id)),
            Some(None) => Ok(None),
            Some(Some(json)) => Ok(Some(serde_json::from_str(&json)?)),
        }
    }
}

impl PriorIdentifierSource for SqliteStorage {
    /// Identifiers captured by the most recent completed run
    fn load_prior_ids(&self) -> Result<Option<HashSet<ListingId>>, PriorError> {
        let Some(run) = self.latest_completed_run()? else {
            return Ok(None);
        };

        let ids = self.listing_ids_for_run(run.id)?;
        if ids.is_empty() {
            Ok(None)
        } else {
            Ok(Some(ids))
        }
    }
}
