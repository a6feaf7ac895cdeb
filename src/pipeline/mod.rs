//! Item pipeline
//!
//! Assembled listings pass through an ordered chain of stages. Each stage either hands the
//! listing on or drops it with a reason; the first drop ends the chain.

use crate::listing::{Listing, ListingId};
use std::fmt;
use std::sync::Arc;

/// A listing removed by a pipeline stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dropped {
    pub id: ListingId,
    pub stage: String,
    pub reason: String,
}

impl fmt::Display for Dropped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} dropped by {}: {}", self.id, self.stage, self.reason)
    }
}

/// Outcome of one stage
pub type StageResult = std::result::Result<Listing, Dropped>;

/// One step of the item pipeline
pub trait ItemStage: Send + Sync {
    /// Name recorded with every drop
    fn name(&self) -> &str;

    fn process(&self, listing: Listing) -> StageResult;
}

/// Ordered chain of stages
#[derive(Default, Clone)]
pub struct Pipeline {
    stages: Vec<Arc<dyn ItemStage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage to the end of the chain
    pub fn with_stage(mut self, stage: Arc<dyn ItemStage>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn process(&self, listing: Listing) -> StageResult {
        self.stages
            .iter()
            .try_fold(listing, |listing, stage| stage.process(listing))
    }
}
