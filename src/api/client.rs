//! Typed API client over a backoff-controlled transport

use crate::api::schema::{parse_listing_detail, parse_search_page};
use crate::api::{ApiRequest, DetailSource, RawResponse, ResultPage, SearchSource, Transport};
use crate::crawler::{BackoffController, BackoffStats, RetryPolicy};
use crate::listing::{ListingDetail, ListingId};
use crate::query::Query;
use crate::{Result, SweepError};
use async_trait::async_trait;
use std::sync::Arc;

/// Search and detail operations against the upstream
///
/// Every request passes through the backoff controller. Responses that pass it but are not
/// 2xx are reported as `SweepError::UnexpectedStatus`.
pub struct ApiClient<T> {
    controller: BackoffController<T>,
}

impl<T: Transport> ApiClient<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self {
            controller: BackoffController::new(transport, policy),
        }
    }

    pub fn backoff_stats(&self) -> Arc<BackoffStats> {
        self.controller.stats()
    }

    async fn fetch(&self, request: &ApiRequest) -> Result<RawResponse> {
        let response = self.controller.execute(request).await?;
        if !response.is_success() {
            return Err(SweepError::UnexpectedStatus {
                context: request.describe(),
                status: response.status,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl<T: Transport> SearchSource for ApiClient<T> {
    async fn search(&self, query: &Query, offset: u32) -> Result<ResultPage> {
        let request = ApiRequest::Search {
            query: query.clone(),
            offset,
        };
        let response = self.fetch(&request).await?;
        let page = parse_search_page(&response.body, &request.describe())?;
        Ok(page)
    }
}

#[async_trait]
impl<T: Transport> DetailSource for ApiClient<T> {
    async fn listing_detail(&self, id: ListingId) -> Result<ListingDetail> {
        let response = self.fetch(&ApiRequest::Detail { id }).await?;
        let detail = parse_listing_detail(&response.body, id)?;
        Ok(detail)
    }
}
