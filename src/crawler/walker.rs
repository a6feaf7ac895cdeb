//! Pagination walking for retrievable partitions

use crate::api::{ResultPage, SearchSource};
use crate::listing::{CachedListing, ListingId, PricingQuote};
use crate::query::Query;
use crate::state::ListingCache;
use crate::{ApiError, Result};
use std::collections::HashSet;
use std::sync::Arc;

/// Search budgets at or above this are read as monthly budgets
pub const MONTHLY_BUDGET_THRESHOLD: u32 = 1000;

/// Nights used to turn a nightly rate into a monthly one
pub const NIGHTS_PER_MONTH: f64 = 28.0;

/// Whether a listing's quoted rate fits the search's effective maximum price
///
/// When the maximum looks like a monthly budget but the listing quotes a non-monthly rate, the
/// rate is scaled to 28 nights and compared against the maximum. A missing rate counts as zero.
/// Callers pass the query's `price_budget`, so every window of a split tree applies the same
/// check.
pub fn passes_rate_check(max_price: u32, pricing: &PricingQuote) -> bool {
    if max_price < MONTHLY_BUDGET_THRESHOLD || pricing.rate_type.is_monthly() {
        return true;
    }
    let rate = pricing.rate.unwrap_or(0.0);
    rate * NIGHTS_PER_MONTH <= f64::from(max_price)
}

/// Result of walking one partition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WalkOutcome {
    /// Identifiers collected, in page order
    pub ids: Vec<ListingId>,
    /// Pages processed, including the first one
    pub pages: u32,
    /// Items dropped by the rate check
    pub rate_dropped: u32,
}

/// Walks the pages of a retrievable partition
pub struct PaginationWalker {
    source: Arc<dyn SearchSource>,
    cache: Arc<ListingCache>,
}

impl PaginationWalker {
    pub fn new(source: Arc<dyn SearchSource>, cache: Arc<ListingCache>) -> Self {
        Self { source, cache }
    }

    /// Processes `first_page` and every following page until `has_next_page` is false
    ///
    /// The first page is the one the partitioner already fetched; it is not requested again.
    /// An offset that was already consumed is never requested twice: a cursor that does not
    /// advance aborts the partition with `ApiError::StalledCursor`.
    pub async fn walk(&self, query: &Query, first_page: ResultPage) -> Result<WalkOutcome> {
        let mut outcome = WalkOutcome::default();
        let mut consumed: HashSet<u32> = HashSet::from([0]);
        let mut page = first_page;

        loop {
            outcome.pages += 1;
            self.collect(query, &page, &mut outcome);

            if !page.has_next_page {
                break;
            }

            let next = page.items_offset;
            if !consumed.insert(next) {
                return Err(ApiError::StalledCursor {
                    offset: next,
                    context: query.to_string(),
                }
                .into());
            }

            tracing::debug!("Fetching {} at offset {}", query, next);
            page = self.source.search(query, next).await?;
        }

        tracing::info!(
            "range: {} walked {} pages, found {} listings",
            query.window,
            outcome.pages,
            outcome.ids.len()
        );

        Ok(outcome)
    }

    fn collect(&self, query: &Query, page: &ResultPage, outcome: &mut WalkOutcome) {
        for summary in &page.items {
            if !passes_rate_check(query.price_budget, &summary.pricing) {
                tracing::debug!(
                    "Dropping listing {}: nightly rate {:?} exceeds monthly budget {}",
                    summary.id,
                    summary.pricing.rate,
                    query.price_budget
                );
                outcome.rate_dropped += 1;
                continue;
            }

            self.cache.insert(CachedListing::new(
                summary.clone(),
                &query.search_term,
                query.has_dates(),
            ));
            outcome.ids.push(summary.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::{ListingSummary, RateType};
    use crate::query::PriceWindow;
    use crate::SweepError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn quote(rate: Option<f64>, rate_type: RateType) -> PricingQuote {
        PricingQuote {
            rate,
            rate_type,
            total: None,
            monthly_price_factor: None,
            weekly_price_factor: None,
        }
    }

    fn summary(id: u64, rate: f64) -> ListingSummary {
        ListingSummary::new(ListingId(id), quote(Some(rate), RateType::Nightly))
    }

    fn page(ids: &[u64], has_next: bool, next_offset: u32) -> ResultPage {
        ResultPage {
            total_count: 100,
            has_next_page: has_next,
            items_offset: next_offset,
            items: ids.iter().map(|id| summary(*id, 50.0)).collect(),
        }
    }

    /// Serves pages by offset and records every offset requested
    struct PagedSource {
        pages: HashMap<u32, ResultPage>,
        requested: Mutex<Vec<u32>>,
    }

    #[async_trait]
    impl SearchSource for PagedSource {
        async fn search(&self, _query: &Query, offset: u32) -> Result<ResultPage> {
            self.requested.lock().unwrap().push(offset);
            Ok(self.pages.get(&offset).cloned().unwrap_or_else(|| page(&[], false, 0)))
        }
    }

    fn walker(pages: Vec<(u32, ResultPage)>) -> (PaginationWalker, Arc<PagedSource>, Arc<ListingCache>) {
        let source = Arc::new(PagedSource {
            pages: pages.into_iter().collect(),
            requested: Mutex::new(Vec::new()),
        });
        let cache = Arc::new(ListingCache::new());
        (
            PaginationWalker::new(source.clone(), cache.clone()),
            source,
            cache,
        )
    }

    fn query(min: u32, max: u32) -> Query {
        Query::new("Auckland", PriceWindow::new(min, max).unwrap())
    }

    #[test]
    fn test_rate_check_monthly_budget() {
        // 50 * 28 = 1400 > 1200
        assert!(!passes_rate_check(1200, &quote(Some(50.0), RateType::Nightly)));
        // 30 * 28 = 840
        assert!(passes_rate_check(1200, &quote(Some(30.0), RateType::Nightly)));
    }

    #[test]
    fn test_rate_check_skips_small_windows_and_monthly_rates() {
        assert!(passes_rate_check(999, &quote(Some(500.0), RateType::Nightly)));
        assert!(passes_rate_check(1200, &quote(Some(5000.0), RateType::Monthly)));
        // A missing rate counts as zero
        assert!(passes_rate_check(1200, &quote(None, RateType::Nightly)));
        // The threshold itself is a monthly budget
        assert!(!passes_rate_check(1000, &quote(Some(40.0), RateType::Nightly)));
    }

    #[tokio::test]
    async fn test_walks_until_no_next_page() {
        let (walker, source, cache) = walker(vec![
            (20, page(&[3, 4], true, 40)),
            (40, page(&[5], false, 0)),
        ]);

        let outcome = walker
            .walk(&query(0, 500), page(&[1, 2], true, 20))
            .await
            .unwrap();

        assert_eq!(
            outcome.ids,
            vec![ListingId(1), ListingId(2), ListingId(3), ListingId(4), ListingId(5)]
        );
        assert_eq!(outcome.pages, 3);
        // The first page is never requested again
        assert_eq!(*source.requested.lock().unwrap(), vec![20, 40]);
        assert_eq!(cache.len(), 5);
        assert_eq!(cache.get(ListingId(4)).unwrap().search_term, "Auckland");
    }

    #[tokio::test]
    async fn test_single_page_makes_no_requests() {
        let (walker, source, _) = walker(vec![]);
        let outcome = walker.walk(&query(0, 500), page(&[9], false, 0)).await.unwrap();

        assert_eq!(outcome.ids, vec![ListingId(9)]);
        assert!(source.requested.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stalled_cursor_aborts() {
        let (walker, source, _) = walker(vec![(20, page(&[2], true, 20))]);

        let err = walker
            .walk(&query(0, 500), page(&[1], true, 20))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SweepError::Api(ApiError::StalledCursor { offset: 20, .. })
        ));
        assert_eq!(*source.requested.lock().unwrap(), vec![20]);
    }

    #[tokio::test]
    async fn test_rate_check_drops_and_skips_cache() {
        let (walker, _, cache) = walker(vec![]);
        let first = ResultPage {
            total_count: 2,
            has_next_page: false,
            items_offset: 0,
            items: vec![summary(1, 50.0), summary(2, 30.0)],
        };

        let outcome = walker.walk(&query(600, 1200), first).await.unwrap();

        assert_eq!(outcome.ids, vec![ListingId(2)]);
        assert_eq!(outcome.rate_dropped, 1);
        assert!(!cache.contains(ListingId(1)));
        assert!(cache.contains(ListingId(2)));
    }

    #[tokio::test]
    async fn test_split_children_share_the_root_budget() {
        let (walker, _, cache) = walker(vec![]);
        let first = || ResultPage {
            total_count: 2,
            has_next_page: false,
            items_offset: 0,
            items: vec![summary(1, 50.0), summary(2, 30.0)],
        };

        // A narrow child of a 1200 budget still reads it as monthly
        let child = query(0, 1200).with_window(PriceWindow::new(500, 750).unwrap());
        assert_eq!(child.price_budget, 1200);
        let outcome = walker.walk(&child, first()).await.unwrap();
        assert_eq!(outcome.ids, vec![ListingId(2)]);
        assert_eq!(outcome.rate_dropped, 1);
        assert!(!cache.contains(ListingId(1)));

        // And a child reaching past 1000 under a nightly budget does not
        let child = query(0, 800).with_window(PriceWindow::new(400, 1200).unwrap());
        let outcome = walker.walk(&child, first()).await.unwrap();
        assert_eq!(outcome.rate_dropped, 0);
        assert_eq!(outcome.ids, vec![ListingId(1), ListingId(2)]);
    }
}
