//! reqwest-backed transport

use crate::api::{ApiRequest, RawResponse, Transport};
use crate::config::ApiConfig;
use crate::query::Query;
use crate::{Result, SweepError};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Builds an HTTP client with proper configuration
///
/// Every request carries an explicit overall timeout and connect timeout, so a stalled
/// upstream surfaces as a retryable network error instead of hanging the crawl.
pub fn build_http_client(config: &ApiConfig) -> std::result::Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Sends search and detail requests over HTTP
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    search_url: Url,
    detail_url: Url,
    api_key: String,
}

impl HttpTransport {
    pub fn new(client: Client, config: &ApiConfig) -> Result<Self> {
        Ok(Self {
            client,
            search_url: Url::parse(&config.search_url)?,
            detail_url: Url::parse(&config.detail_url)?,
            api_key: config.api_key.clone(),
        })
    }

    /// Builds a transport with a client configured from `config`
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        let client = build_http_client(config)?;
        Self::new(client, config)
    }

    /// Full search URL for one page of a query
    pub fn search_request_url(&self, query: &Query, offset: u32) -> Url {
        let mut url = self.search_url.clone();
        {
            let mut params = url.query_pairs_mut();
            params
                .append_pair("key", &self.api_key)
                .append_pair("query", &query.search_term)
                .append_pair("currency", &query.currency)
                .append_pair("priceMin", &query.window.min.to_string())
                .append_pair("priceMax", &query.window.max.to_string())
                .append_pair("itemsPerGrid", &query.page_size.to_string())
                .append_pair("itemsOffset", &offset.to_string());

            if let Some(dates) = &query.dates {
                params
                    .append_pair("checkin", &dates.checkin.format("%Y-%m-%d").to_string())
                    .append_pair("checkout", &dates.checkout.format("%Y-%m-%d").to_string());
            }

            if let Some(bbox) = &query.geography {
                params
                    .append_pair("neLat", &bbox.ne_lat.to_string())
                    .append_pair("neLng", &bbox.ne_lng.to_string())
                    .append_pair("swLat", &bbox.sw_lat.to_string())
                    .append_pair("swLng", &bbox.sw_lng.to_string())
                    .append_pair("searchByMap", "true");
            }

            for room_type in &query.room_types {
                params.append_pair("room_types[]", room_type);
            }
        }
        url
    }

    /// Full detail URL for one listing
    pub fn detail_request_url(&self, id: crate::ListingId) -> Url {
        let mut url = self.detail_url.clone();
        let path = format!("{}/{}", url.path().trim_end_matches('/'), id);
        url.set_path(&path);
        url.query_pairs_mut()
            .append_pair("key", &self.api_key)
            .append_pair("_format", "for_rooms_show");
        url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse> {
        let url = match request {
            ApiRequest::Search { query, offset } => self.search_request_url(query, *offset),
            ApiRequest::Detail { id } => self.detail_request_url(*id),
        };

        tracing::debug!("GET {}", request.describe());

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(e, request))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(e, request))?;

        Ok(RawResponse { status, body })
    }
}

/// Maps timeouts and connection failures to retryable network errors
fn classify_reqwest_error(error: reqwest::Error, request: &ApiRequest) -> SweepError {
    let context = request.describe();
    if error.is_timeout() {
        SweepError::Network {
            context,
            message: "Request timeout".to_string(),
        }
    } else if error.is_connect() {
        SweepError::Network {
            context,
            message: format!("Connection failed: {}", error),
        }
    } else {
        SweepError::Http {
            context,
            source: error,
        }
    }
}
