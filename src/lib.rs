//! Listing-Sweep: an adaptive listings-search crawler
//!
//! This crate crawls a paginated listings search API that caps the number of results it will
//! page through per query. Price ranges are bisected until every partition is retrievable,
//! each partition's pages are walked, listing data seen along the way is cached, a global
//! backoff is applied whenever the upstream throttles, and listings captured by a previous run
//! are suppressed.

pub mod api;
pub mod config;
pub mod crawler;
pub mod dedup;
pub mod listing;
pub mod output;
pub mod pipeline;
pub mod query;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Listing-Sweep operations
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Malformed upstream payload: {0}")]
    Api(#[from] ApiError),

    #[error("HTTP error for {context}: {source}")]
    Http {
        context: String,
        source: reqwest::Error,
    },

    #[error("Network error for {context}: {message}")]
    Network { context: String, message: String },

    #[error("Unexpected HTTP status {status} for {context}")]
    UnexpectedStatus { context: String, status: u16 },

    #[error("Gave up on {context} after {attempts} attempts: {reason}")]
    RetriesExhausted {
        context: String,
        attempts: u32,
        reason: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SweepError {
    /// Returns true for transport-level failures worth retrying (timeouts, refused connections)
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),
}

/// Errors raised while validating upstream responses at the API boundary
#[derive(Debug, Error, PartialEq)]
pub enum ApiError {
    #[error("response body for {context} is not valid JSON: {message}")]
    Decode { context: String, message: String },

    #[error("missing pagination metadata for {context}")]
    MissingPagination { context: String },

    #[error("missing required field '{field}' for {context}")]
    MissingField { field: String, context: String },

    #[error("pagination cursor did not advance past offset {offset} for {context}")]
    StalledCursor { offset: u32, context: String },
}

/// Result type alias for Listing-Sweep operations
pub type Result<T> = std::result::Result<T, SweepError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use listing::{Listing, ListingId, ListingSummary};
pub use query::{PriceWindow, Query};
