//! Database schema definitions and migrations
//!
//! This module contains all SQL schema definitions for the Listing-Sweep output artifact.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    search_term TEXT NOT NULL,
    status TEXT NOT NULL,
    stats_json TEXT
);

-- Accepted listings, one row per listing per run
CREATE TABLE IF NOT EXISTS listings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    listing_id TEXT NOT NULL,
    url TEXT NOT NULL,
    name TEXT NOT NULL,
    room_type TEXT NOT NULL,
    price_rate REAL,
    price_rate_type TEXT,
    search_term TEXT NOT NULL,
    record_json TEXT NOT NULL,
    captured_at TEXT NOT NULL,
    UNIQUE(run_id, listing_id)
);

CREATE INDEX IF NOT EXISTS idx_listings_run ON listings(run_id);
CREATE INDEX IF NOT EXISTS idx_listings_listing ON listings(listing_id);

-- Listings removed by a pipeline stage
CREATE TABLE IF NOT EXISTS drops (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    listing_id TEXT NOT NULL,
    stage TEXT NOT NULL,
    reason TEXT NOT NULL,
    dropped_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_drops_run ON drops(run_id);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
