//! Search-space partitioning
//!
//! The upstream only pages through a bounded number of results per query. A query whose
//! total count exceeds that ceiling is split at the floor midpoint of its price window, and
//! each half is resolved again as an independent unit of work. Splitting strictly shrinks the
//! window, and a width-1 window is always accepted, so resolution terminates.

use crate::api::{ResultPage, SearchSource};
use crate::query::{PriceWindow, Query};
use crate::Result;
use std::sync::Arc;

/// Outcome of resolving one query
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Too many results: resolve both halves instead
    Split(PriceWindow, PriceWindow),
    /// Retrievable as is; the first page is handed to the walker
    Retrievable(ResultPage),
}

/// Decides whether a query must be split
pub struct SearchSpacePartitioner {
    source: Arc<dyn SearchSource>,
    ceiling: u32,
}

impl SearchSpacePartitioner {
    pub fn new(source: Arc<dyn SearchSource>, ceiling: u32) -> Self {
        Self { source, ceiling }
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    /// Fetches the first page of `query` and decides how to proceed
    ///
    /// Errors (including missing pagination metadata) abort only this query; the caller
    /// logs them with the query's context and carries on with the rest of the crawl.
    pub async fn resolve(&self, query: &Query) -> Result<Resolution> {
        let page = self.source.search(query, 0).await?;

        if page.total_count > self.ceiling {
            if let Some((left, right)) = query.window.split() {
                tracing::info!(
                    "split: {} results for {}, into {} and {}",
                    page.total_count,
                    query,
                    left,
                    right
                );
                return Ok(Resolution::Split(left, right));
            }
            tracing::warn!(
                "{} reports {} results but cannot be split further, walking what is reachable",
                query,
                page.total_count
            );
        }

        Ok(Resolution::Retrievable(page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ApiError, SweepError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Reports a count derived from the price window
    struct CountingSource<F> {
        count_for: F,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl<F> SearchSource for CountingSource<F>
    where
        F: Fn(PriceWindow) -> Option<u32> + Send + Sync,
    {
        async fn search(&self, query: &Query, _offset: u32) -> Result<ResultPage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match (self.count_for)(query.window) {
                Some(total_count) => Ok(ResultPage {
                    total_count,
                    has_next_page: false,
                    items_offset: 0,
                    items: vec![],
                }),
                None => Err(ApiError::MissingPagination {
                    context: query.to_string(),
                }
                .into()),
            }
        }
    }

    fn partitioner<F>(count_for: F) -> (SearchSpacePartitioner, Arc<CountingSource<F>>)
    where
        F: Fn(PriceWindow) -> Option<u32> + Send + Sync + 'static,
    {
        let source = Arc::new(CountingSource {
            count_for,
            calls: AtomicUsize::new(0),
        });
        (SearchSpacePartitioner::new(source.clone(), 300), source)
    }

    fn query(min: u32, max: u32) -> Query {
        Query::new("Auckland", PriceWindow::new(min, max).unwrap())
    }

    #[tokio::test]
    async fn test_over_ceiling_splits_at_midpoint() {
        let (partitioner, _) = partitioner(|_| Some(500));
        let resolution = partitioner.resolve(&query(0, 1000)).await.unwrap();
        assert_eq!(
            resolution,
            Resolution::Split(
                PriceWindow { min: 0, max: 500 },
                PriceWindow {
                    min: 500,
                    max: 1000
                }
            )
        );
    }

    #[tokio::test]
    async fn test_at_ceiling_is_retrievable() {
        let (partitioner, source) = partitioner(|_| Some(300));
        let resolution = partitioner.resolve(&query(0, 1000)).await.unwrap();
        assert!(matches!(resolution, Resolution::Retrievable(ref page) if page.total_count == 300));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_width_one_window_is_always_retrievable() {
        let (partitioner, _) = partitioner(|_| Some(10_000));
        let resolution = partitioner.resolve(&query(41, 42)).await.unwrap();
        assert!(matches!(resolution, Resolution::Retrievable(_)));
    }

    #[tokio::test]
    async fn test_always_over_ceiling_terminates() {
        let (partitioner, source) = partitioner(|_| Some(10_000));

        // Drive resolution to the bottom along every branch
        let mut pending = vec![query(0, 64)];
        let mut leaves = Vec::new();
        while let Some(q) = pending.pop() {
            match partitioner.resolve(&q).await.unwrap() {
                Resolution::Split(left, right) => {
                    assert!(left.width() < q.window.width());
                    assert!(right.width() < q.window.width());
                    pending.push(q.with_window(left));
                    pending.push(q.with_window(right));
                }
                Resolution::Retrievable(_) => leaves.push(q.window),
            }
        }

        assert_eq!(leaves.len(), 64);
        assert!(leaves.iter().all(|w| w.width() == 1));
        // 63 internal nodes plus 64 leaves
        assert_eq!(source.calls.load(Ordering::SeqCst), 127);
    }

    #[tokio::test]
    async fn test_missing_pagination_is_returned() {
        let (partitioner, _) = partitioner(|_| None);
        let err = partitioner.resolve(&query(0, 1000)).await.unwrap_err();
        assert!(matches!(
            err,
            SweepError::Api(ApiError::MissingPagination { .. })
        ));
    }
}
