use crate::config::types::{
    ApiConfig, Config, CrawlerConfig, DedupConfig, OutputConfig, SearchConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
///
/// Date ranges are only checked for syntax here; whether they lie in the past depends on the
/// day the crawl starts and is checked when root queries are built.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_search_config(&config.search)?;
    validate_api_config(&config.api)?;
    validate_crawler_config(&config.crawler)?;
    validate_output_config(&config.output)?;
    if let Some(dedup) = &config.dedup {
        validate_dedup_config(dedup)?;
    }
    Ok(())
}

/// Validates search configuration
fn validate_search_config(config: &SearchConfig) -> Result<(), ConfigError> {
    if config.query.trim().is_empty() {
        return Err(ConfigError::Validation("query cannot be empty".to_string()));
    }

    if config.currency.len() != 3 || !config.currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ConfigError::Validation(format!(
            "currency must be a three-letter code, got '{}'",
            config.currency
        )));
    }

    if let (Some(min), Some(max)) = (config.price_min, config.price_max) {
        if min >= max {
            return Err(ConfigError::Validation(format!(
                "price-min ({}) must be below price-max ({})",
                min, max
            )));
        }
    }

    if config.page_size < 1 || config.page_size > 50 {
        return Err(ConfigError::Validation(format!(
            "page-size must be between 1 and 50, got {}",
            config.page_size
        )));
    }

    if let Some(geo) = &config.geography {
        if geo.sw_lat >= geo.ne_lat || geo.sw_lng >= geo.ne_lng {
            return Err(ConfigError::Validation(
                "geography south-west corner must lie below and left of the north-east corner"
                    .to_string(),
            ));
        }
    }

    config.date_range()?;

    Ok(())
}

/// Validates API configuration
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("search-url", &config.search_url),
        ("detail-url", &config.detail_url),
        ("listing-url-base", &config.listing_url_base),
    ] {
        let url = Url::parse(value)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {}: {}", name, e)))?;
        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(ConfigError::InvalidUrl(format!(
                "{} must use http or https, got '{}'",
                name, value
            )));
        }
    }

    if config.api_key.trim().is_empty() {
        return Err(ConfigError::Validation("api-key cannot be empty".to_string()));
    }

    if config.request_timeout_secs == 0 || config.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request and connect timeouts must be at least one second".to_string(),
        ));
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.result_ceiling < 1 {
        return Err(ConfigError::Validation(format!(
            "result-ceiling must be >= 1, got {}",
            config.result_ceiling
        )));
    }

    if config.max_concurrent_requests < 1 || config.max_concurrent_requests > 100 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-requests must be between 1 and 100, got {}",
            config.max_concurrent_requests
        )));
    }

    if config.retry_base_delay_ms > config.retry_max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "retry-base-delay-ms ({}) cannot exceed retry-max-delay-ms ({})",
            config.retry_base_delay_ms, config.retry_max_delay_ms
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_dedup_config(config: &DedupConfig) -> Result<(), ConfigError> {
    if config.primary_sentinel.is_empty() || config.backup_sentinel.is_empty() {
        return Err(ConfigError::Validation(
            "dedup sentinel paths cannot be empty".to_string(),
        ));
    }

    if config.primary_sentinel == config.backup_sentinel {
        return Err(ConfigError::Validation(
            "primary-sentinel and backup-sentinel must differ".to_string(),
        ));
    }

    Ok(())
}
