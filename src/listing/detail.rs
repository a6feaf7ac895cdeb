//! Listing detail records and the assembled listing

use crate::listing::{CachedListing, ListingId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fields returned by the per-listing detail endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingDetail {
    pub name: String,
    pub location: String,
    pub room_and_property_type: String,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub rating: Option<String>,
    pub review_count: Option<u32>,
    pub host_name: Option<String>,
    pub host_id: Option<u64>,
    /// Description sections keyed by section name (description, access, transit, ...)
    pub description: BTreeMap<String, String>,
    pub guests: Option<String>,
    pub bathrooms: Option<String>,
    pub bedrooms: Option<String>,
    pub beds: Option<String>,
    pub photos: Vec<String>,
}

/// A fully assembled listing record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub url: String,
    pub search_term: String,
    /// Data cached from the search phase, if the listing was seen there
    pub summary: Option<CachedListing>,
    pub detail: ListingDetail,
    pub scraped_at: DateTime<Utc>,
}

impl Listing {
    /// Combines cached search data with a freshly fetched detail record
    pub fn assemble(
        id: ListingId,
        listing_url_base: &str,
        search_term: &str,
        summary: Option<CachedListing>,
        detail: ListingDetail,
    ) -> Self {
        Self {
            id,
            url: format!("{}/{}", listing_url_base.trim_end_matches('/'), id),
            search_term: search_term.to_string(),
            summary,
            detail,
            scraped_at: Utc::now(),
        }
    }

    /// Nightly or monthly rate from the search phase, if known
    pub fn price_rate(&self) -> Option<f64> {
        self.summary.as_ref().and_then(|c| c.summary.pricing.rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_detail() -> ListingDetail {
        ListingDetail {
            name: "Harbour view studio".to_string(),
            location: "Auckland, New Zealand".to_string(),
            room_and_property_type: "Entire apartment".to_string(),
            city: Some("Auckland".to_string()),
            latitude: None,
            longitude: None,
            rating: None,
            review_count: None,
            host_name: None,
            host_id: None,
            description: BTreeMap::new(),
            guests: None,
            bathrooms: None,
            bedrooms: None,
            beds: None,
            photos: vec![],
        }
    }

    #[test]
    fn test_assemble_builds_url() {
        let listing = Listing::assemble(
            ListingId(42),
            "https://www.airbnb.co.nz/rooms/",
            "Auckland",
            None,
            sample_detail(),
        );
        assert_eq!(listing.url, "https://www.airbnb.co.nz/rooms/42");
        assert_eq!(listing.price_rate(), None);
    }
}
