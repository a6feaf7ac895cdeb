//! Cross-run deduplication
//!
//! The filter starts from the identifiers captured by the previous run (when a prior source
//! trusts them) and then remembers every identifier it accepts, so a listing is passed
//! downstream at most once per run and not at all if an earlier run already captured it.

mod prior;

pub use prior::{count_lines, PriorError, PriorIdentifierSource, SentinelGuard};

use crate::listing::{Listing, ListingId};
use crate::pipeline::{Dropped, ItemStage, StageResult};
use dashmap::DashSet;
use std::collections::HashSet;

/// Reason recorded for every duplicate drop
pub const DUPLICATE_REASON: &str = "duplicate listing";

/// Identifiers already captured; only ever grows
#[derive(Debug, Default)]
pub struct SeenIdSet {
    ids: DashSet<ListingId>,
}

impl SeenIdSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `id`, returning false if it was already present
    pub fn insert(&self, id: ListingId) -> bool {
        self.ids.insert(id)
    }

    pub fn contains(&self, id: ListingId) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl FromIterator<ListingId> for SeenIdSet {
    fn from_iter<I: IntoIterator<Item = ListingId>>(iter: I) -> Self {
        let set = SeenIdSet::new();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

/// Result of checking one identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupDecision {
    Accept,
    Duplicate,
}

/// Drops listings already seen in this run or the previous one
#[derive(Debug, Default)]
pub struct DeduplicationFilter {
    seen: SeenIdSet,
    prior_count: usize,
}

impl DeduplicationFilter {
    /// Starts from a known set of identifiers
    pub fn new(prior: HashSet<ListingId>) -> Self {
        let prior_count = prior.len();
        Self {
            seen: prior.into_iter().collect(),
            prior_count,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Loads prior identifiers from `source`
    ///
    /// Never fails: a source error is logged and the filter starts empty.
    pub fn from_prior<S: PriorIdentifierSource>(source: S) -> Self {
        match source.load_prior_ids() {
            Ok(Some(ids)) => {
                tracing::info!("Loaded {} listing ids from the previous run", ids.len());
                Self::new(ids)
            }
            Ok(None) => {
                tracing::info!("No previous run to deduplicate against");
                Self::empty()
            }
            Err(e) => {
                tracing::warn!("Could not load previous listing ids, starting empty: {}", e);
                Self::empty()
            }
        }
    }

    /// Identifiers loaded at startup
    pub fn prior_count(&self) -> usize {
        self.prior_count
    }

    pub fn seen(&self) -> &SeenIdSet {
        &self.seen
    }

    /// Accepts `id` the first time it is offered, rejects it afterwards
    pub fn check(&self, id: ListingId) -> DedupDecision {
        if self.seen.insert(id) {
            DedupDecision::Accept
        } else {
            DedupDecision::Duplicate
        }
    }
}

impl ItemStage for DeduplicationFilter {
    fn name(&self) -> &str {
        "dedup"
    }

    fn process(&self, listing: Listing) -> StageResult {
        match self.check(listing.id) {
            DedupDecision::Accept => Ok(listing),
            DedupDecision::Duplicate => Err(Dropped {
                id: listing.id,
                stage: self.name().to_string(),
                reason: DUPLICATE_REASON.to_string(),
            }),
        }
    }
}
