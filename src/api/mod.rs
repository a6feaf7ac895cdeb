//! Upstream API boundary
//!
//! Three layers, each behind its own seam:
//!
//! - `Transport`: sends one `ApiRequest` and returns the raw status and body
//! - `ApiClient`: wraps a transport with the rate-limit backoff controller and validates
//!   responses against the wire schemas
//! - `SearchSource` / `DetailSource`: the typed operations the crawl itself depends on

mod client;
mod http;
mod schema;

pub use client::ApiClient;
pub use http::{build_http_client, HttpTransport};
pub use schema::{parse_listing_detail, parse_search_page};

use crate::listing::{ListingDetail, ListingId, ListingSummary};
use crate::query::Query;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// One request to the upstream API
#[derive(Debug, Clone, PartialEq)]
pub enum ApiRequest {
    /// A search-results page at the given pagination offset
    Search { query: Query, offset: u32 },
    /// The detail record of one listing
    Detail { id: ListingId },
}

impl ApiRequest {
    /// Short description used in logs and error contexts
    pub fn describe(&self) -> String {
        match self {
            ApiRequest::Search { query, offset } => format!("search {} offset {}", query, offset),
            ApiRequest::Detail { id } => format!("detail {}", id),
        }
    }
}

/// Status and body of one upstream response
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends requests to the upstream
///
/// Transport-level failures (timeouts, refused connections) are reported as
/// `SweepError::Network` so the backoff controller can retry them.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse> {
        (**self).send(request).await
    }
}

/// One validated page of search results
#[derive(Debug, Clone, PartialEq)]
pub struct ResultPage {
    /// Authoritative result count for the query's current price window
    pub total_count: u32,
    pub has_next_page: bool,
    /// Offset of the next page
    pub items_offset: u32,
    pub items: Vec<ListingSummary>,
}

/// Search-results pages for a query
#[async_trait]
pub trait SearchSource: Send + Sync {
    async fn search(&self, query: &Query, offset: u32) -> Result<ResultPage>;
}

/// Per-listing detail records
#[async_trait]
pub trait DetailSource: Send + Sync {
    async fn listing_detail(&self, id: ListingId) -> Result<ListingDetail>;
}
