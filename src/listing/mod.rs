//! Listing data model
//!
//! - `ListingId`: the stable external key used for caching and deduplication
//! - `ListingSummary`: what a search-results page tells us about a listing
//! - `ListingDetail`: what the per-listing detail endpoint tells us
//! - `Listing`: the assembled record handed to the item pipeline and persisted

mod detail;
mod summary;

pub use detail::{Listing, ListingDetail};
pub use summary::{CachedListing, ListingSummary, PricingQuote, RateType};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable external identifier of one real-world listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListingId(pub u64);

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ListingId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(ListingId)
    }
}

impl From<u64> for ListingId {
    fn from(id: u64) -> Self {
        ListingId(id)
    }
}
