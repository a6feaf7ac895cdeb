use crate::query::{BoundingBox, DateRange};
use crate::ConfigError;
use serde::Deserialize;

/// Main configuration structure for Listing-Sweep
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub search: SearchConfig,
    pub api: ApiConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub dedup: Option<DedupConfig>,
}

/// What to search for
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Free-text search term, e.g. a city or region
    pub query: String,

    /// Currency prices are expressed in
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Check-in date, optionally fuzzy (`2026-12-01+2-1`)
    #[serde(default)]
    pub checkin: Option<String>,

    /// Check-out date, optionally fuzzy
    #[serde(default)]
    pub checkout: Option<String>,

    /// Lower bound of the price budget
    #[serde(rename = "price-min", default)]
    pub price_min: Option<u32>,

    /// Upper bound of the price budget
    #[serde(rename = "price-max", default)]
    pub price_max: Option<u32>,

    #[serde(rename = "room-types", default)]
    pub room_types: Vec<String>,

    /// Listings requested per search page
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: u32,

    #[serde(default)]
    pub geography: Option<GeographyConfig>,
}

impl SearchConfig {
    /// Parses the configured check-in/check-out pair
    ///
    /// Both dates must be given together; neither means an undated search.
    pub fn date_range(&self) -> Result<Option<DateRange>, ConfigError> {
        match (&self.checkin, &self.checkout) {
            (Some(checkin), Some(checkout)) => DateRange::parse(checkin, checkout).map(Some),
            (None, None) => Ok(None),
            _ => Err(ConfigError::InvalidDateRange(
                "checkin and checkout must be given together".to_string(),
            )),
        }
    }
}

/// Bounding box restricting the search area
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct GeographyConfig {
    #[serde(rename = "ne-lat")]
    pub ne_lat: f64,
    #[serde(rename = "ne-lng")]
    pub ne_lng: f64,
    #[serde(rename = "sw-lat")]
    pub sw_lat: f64,
    #[serde(rename = "sw-lng")]
    pub sw_lng: f64,
}

impl From<GeographyConfig> for BoundingBox {
    fn from(g: GeographyConfig) -> Self {
        BoundingBox {
            ne_lat: g.ne_lat,
            ne_lng: g.ne_lng,
            sw_lat: g.sw_lat,
            sw_lng: g.sw_lng,
        }
    }
}

/// Upstream API endpoints and client settings
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Search endpoint
    #[serde(rename = "search-url")]
    pub search_url: String,

    /// Detail endpoint; the listing id is appended as a path segment
    #[serde(rename = "detail-url")]
    pub detail_url: String,

    /// Public listing page prefix used to build each record's URL
    #[serde(rename = "listing-url-base")]
    pub listing_url_base: String,

    #[serde(rename = "api-key")]
    pub api_key: String,

    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

/// Crawl behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Largest result count the upstream will page through for one query
    #[serde(rename = "result-ceiling", default = "default_result_ceiling")]
    pub result_ceiling: u32,

    /// Maximum number of requests in flight at once
    #[serde(
        rename = "max-concurrent-requests",
        default = "default_max_concurrent_requests"
    )]
    pub max_concurrent_requests: u32,

    /// Global cool-down after a 429 (seconds)
    #[serde(rename = "rate-limit-pause-secs", default = "default_rate_limit_pause_secs")]
    pub rate_limit_pause_secs: u64,

    /// Rate-limit pauses one request may sit through before giving up; unlimited if unset
    #[serde(rename = "max-rate-limit-pauses", default)]
    pub max_rate_limit_pauses: Option<u32>,

    /// Local retries for transient failures
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// First retry delay (milliseconds), doubled per attempt
    #[serde(rename = "retry-base-delay-ms", default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(rename = "retry-max-delay-ms", default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            result_ceiling: default_result_ceiling(),
            max_concurrent_requests: default_max_concurrent_requests(),
            rate_limit_pause_secs: default_rate_limit_pause_secs(),
            max_rate_limit_pauses: None,
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Sentinel files guarding prior-run deduplication
///
/// Prior identifiers are only trusted when the backup sentinel has fewer lines than the
/// primary one.
#[derive(Debug, Clone, Deserialize)]
pub struct DedupConfig {
    #[serde(rename = "primary-sentinel")]
    pub primary_sentinel: String,

    #[serde(rename = "backup-sentinel")]
    pub backup_sentinel: String,
}

fn default_currency() -> String {
    "NZD".to_string()
}

fn default_page_size() -> u32 {
    20
}

fn default_user_agent() -> String {
    format!("listing-sweep/{}", env!("CARGO_PKG_VERSION"))
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_result_ceiling() -> u32 {
    300
}

fn default_max_concurrent_requests() -> u32 {
    8
}

fn default_rate_limit_pause_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_retry_max_delay_ms() -> u64 {
    30_000
}
