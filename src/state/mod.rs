//! State shared across the tasks of one crawl run
//!
//! # Components
//!
//! - `ListingCache`: listing data observed on search pages, reused when details are assembled

mod listing_cache;

pub use listing_cache::ListingCache;
