//! Listing summaries observed on search-results pages

use crate::listing::ListingId;
use serde::{Deserialize, Serialize};

/// Unit the upstream quoted a listing's rate in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateType {
    Nightly,
    Monthly,
    Other(String),
}

impl RateType {
    /// Parses the upstream `rateType` string
    pub fn from_api(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "nightly" | "daily" => Self::Nightly,
            "monthly" => Self::Monthly,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_monthly(&self) -> bool {
        matches!(self, Self::Monthly)
    }
}

/// Pricing quote attached to a search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingQuote {
    /// Rate including service fee. `None` when the upstream only shows rates for given dates.
    pub rate: Option<f64>,
    pub rate_type: RateType,
    /// Total price for the stay (only meaningful when dates were given)
    pub total: Option<f64>,
    pub monthly_price_factor: Option<f64>,
    pub weekly_price_factor: Option<f64>,
}

/// Denormalized listing fields from one search-results item
///
/// Only `id` and `pricing` are required; everything else is omitted when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingSummary {
    pub id: ListingId,
    pub pricing: PricingQuote,
    pub name: Option<String>,
    pub city: Option<String>,
    pub avg_rating: Option<f64>,
    pub star_rating: Option<f64>,
    pub review_count: Option<u32>,
    pub bathrooms: Option<f64>,
    pub bedrooms: Option<u32>,
    pub beds: Option<u32>,
    pub person_capacity: Option<u32>,
    pub business_travel_ready: Option<bool>,
    pub host_id: Option<u64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub neighborhood_overview: Option<String>,
    pub photo_count: Option<u32>,
    pub photos: Vec<String>,
    pub room_and_property_type: Option<String>,
    pub room_type: Option<String>,
    pub room_type_category: Option<String>,
}

impl ListingSummary {
    /// Creates a summary carrying only the mandatory fields
    pub fn new(id: ListingId, pricing: PricingQuote) -> Self {
        Self {
            id,
            pricing,
            name: None,
            city: None,
            avg_rating: None,
            star_rating: None,
            review_count: None,
            bathrooms: None,
            bedrooms: None,
            beds: None,
            person_capacity: None,
            business_travel_ready: None,
            host_id: None,
            latitude: None,
            longitude: None,
            neighborhood_overview: None,
            photo_count: None,
            photos: Vec::new(),
            room_and_property_type: None,
            room_type: None,
            room_type_category: None,
        }
    }
}

/// What the listing cache keeps per listing between the search and detail phases
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedListing {
    pub summary: ListingSummary,
    pub search_term: String,
    /// Total stay price, only kept when the query carried dates
    pub total_price: Option<f64>,
}

impl CachedListing {
    pub fn new(summary: ListingSummary, search_term: &str, has_dates: bool) -> Self {
        let total_price = if has_dates {
            summary.pricing.total
        } else {
            None
        };
        Self {
            summary,
            search_term: search_term.to_string(),
            total_price,
        }
    }
}
