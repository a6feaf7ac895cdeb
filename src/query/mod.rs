//! Search queries
//!
//! A `Query` is an immutable description of one search request: the free-text term, the price
//! window and the optional date and geography constraints. Partitioning never mutates a query;
//! it derives new ones with `Query::with_window`.

mod dates;
mod prices;

pub use dates::{DateRange, DateSpec, FuzzRange, StayDates};
pub use prices::{PriceRangeGenerator, PriceStep, PriceWindow};

use crate::config::SearchConfig;
use crate::ConfigError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Geographic bounding box constraint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub ne_lat: f64,
    pub ne_lng: f64,
    pub sw_lat: f64,
    pub sw_lng: f64,
}

/// One search request's parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub search_term: String,
    pub window: PriceWindow,
    /// Effective maximum price of the whole search; split children inherit it
    pub price_budget: u32,
    pub currency: String,
    pub dates: Option<StayDates>,
    pub geography: Option<BoundingBox>,
    pub room_types: Vec<String>,
    pub page_size: u32,
}

impl Query {
    pub fn new(search_term: impl Into<String>, window: PriceWindow) -> Self {
        Self {
            search_term: search_term.into(),
            window,
            price_budget: window.max,
            currency: "NZD".to_string(),
            dates: None,
            geography: None,
            room_types: Vec::new(),
            page_size: 20,
        }
    }

    /// Derives a query over a different price window
    pub fn with_window(&self, window: PriceWindow) -> Self {
        Self {
            window,
            ..self.clone()
        }
    }

    pub fn with_price_budget(self, price_budget: u32) -> Self {
        Self {
            price_budget,
            ..self
        }
    }

    pub fn with_dates(self, dates: Option<StayDates>) -> Self {
        Self { dates, ..self }
    }

    pub fn with_currency(self, currency: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
            ..self
        }
    }

    pub fn with_geography(self, geography: Option<BoundingBox>) -> Self {
        Self { geography, ..self }
    }

    pub fn with_room_types(self, room_types: Vec<String>) -> Self {
        Self { room_types, ..self }
    }

    pub fn with_page_size(self, page_size: u32) -> Self {
        Self { page_size, ..self }
    }

    pub fn has_dates(&self) -> bool {
        self.dates.is_some()
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' price {}", self.search_term, self.window)?;
        if let Some(dates) = &self.dates {
            write!(f, " stay {}..{}", dates.checkin, dates.checkout)?;
        }
        Ok(())
    }
}

/// Builds every root query for a crawl
///
/// Roots are the seed price windows (narrowed to the configured budget) crossed with every
/// check-in/check-out pair the date range expands to. An invalid date range is rejected here,
/// before any request is made.
pub fn root_queries(
    search: &SearchConfig,
    generator: &PriceRangeGenerator,
    today: NaiveDate,
) -> Result<Vec<Query>, ConfigError> {
    let stays: Vec<Option<StayDates>> = match search.date_range()? {
        Some(range) => {
            range.validate(today)?;
            let pairs = range.expand(today);
            if pairs.is_empty() {
                return Err(ConfigError::InvalidDateRange(
                    "Date range does not contain a single usable stay".to_string(),
                ));
            }
            pairs.into_iter().map(Some).collect()
        }
        None => vec![None],
    };

    let windows = generator.generate_within(search.price_min, search.price_max);
    if windows.is_empty() {
        return Err(ConfigError::Validation(format!(
            "No seed price window intersects the budget {:?}-{:?}",
            search.price_min, search.price_max
        )));
    }

    let template = Query::new(search.query.clone(), windows[0])
        .with_currency(search.currency.clone())
        .with_geography(search.geography.map(|g| g.into()))
        .with_room_types(search.room_types.clone())
        .with_page_size(search.page_size);

    let mut roots = Vec::with_capacity(windows.len() * stays.len());
    for stay in &stays {
        for window in &windows {
            let budget = search.price_max.unwrap_or(window.max);
            roots.push(
                template
                    .with_window(*window)
                    .with_price_budget(budget)
                    .with_dates(*stay),
            );
        }
    }

    Ok(roots)
}
