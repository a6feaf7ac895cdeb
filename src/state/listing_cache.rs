//! Process-lifetime cache of listing data seen on search-results pages

use crate::listing::{CachedListing, ListingId};
use dashmap::DashMap;

/// Keyed store of partial listing data shared by every partition of one crawl
///
/// Writes replace the whole entry atomically, so a reader never observes a partially written
/// record. Revisiting a listing from an overlapping partition overwrites the previous entry.
#[derive(Debug, Default)]
pub struct ListingCache {
    entries: DashMap<ListingId, CachedListing>,
}

impl ListingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a listing, returning the entry it replaced if any
    pub fn insert(&self, listing: CachedListing) -> Option<CachedListing> {
        self.entries.insert(listing.summary.id, listing)
    }

    /// Returns a copy of the cached entry
    pub fn get(&self, id: ListingId) -> Option<CachedListing> {
        self.entries.get(&id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: ListingId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::{ListingSummary, PricingQuote, RateType};
    use std::sync::Arc;

    fn cached(id: u64, rate: f64, term: &str) -> CachedListing {
        let pricing = PricingQuote {
            rate: Some(rate),
            rate_type: RateType::Nightly,
            total: None,
            monthly_price_factor: None,
            weekly_price_factor: None,
        };
        CachedListing::new(ListingSummary::new(ListingId(id), pricing), term, false)
    }

    #[test]
    fn test_insert_and_get() {
        let cache = ListingCache::new();
        assert!(cache.is_empty());

        assert!(cache.insert(cached(1, 80.0, "Auckland")).is_none());
        assert!(cache.contains(ListingId(1)));
        assert!(!cache.contains(ListingId(2)));
        assert_eq!(cache.get(ListingId(1)).unwrap().summary.pricing.rate, Some(80.0));
    }

    #[test]
    fn test_revisit_overwrites() {
        let cache = ListingCache::new();
        cache.insert(cached(1, 80.0, "Auckland"));
        let previous = cache.insert(cached(1, 95.0, "Auckland"));

        assert_eq!(previous.unwrap().summary.pricing.rate, Some(80.0));
        assert_eq!(cache.get(ListingId(1)).unwrap().summary.pricing.rate, Some(95.0));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_writers() {
        let cache = Arc::new(ListingCache::new());
        let mut handles = Vec::new();

        for task in 0..8u64 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                for id in 0..100u64 {
                    cache.insert(cached(id, task as f64, "Auckland"));
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(cache.len(), 100);
        for id in 0..100u64 {
            let rate = cache.get(ListingId(id)).unwrap().summary.pricing.rate.unwrap();
            assert!((0.0..8.0).contains(&rate));
        }
    }
}
