//! Crawler module for partitioning, paging and fetching listings
//!
//! This module contains the core crawling logic, including:
//! - Global rate-limit pauses and capped retries around every request
//! - Splitting price windows until each is retrievable
//! - Walking the result pages of retrievable windows
//! - Overall crawl coordination

mod backoff;
mod coordinator;
mod partitioner;
mod walker;

pub use backoff::{
    classify, BackoffController, BackoffStats, PauseGate, RetryPolicy, Verdict,
    RETRYABLE_STATUSES, TOO_MANY_REQUESTS,
};
pub use coordinator::{run_crawl, Coordinator, CrawlPlan};
pub use partitioner::{Resolution, SearchSpacePartitioner};
pub use walker::{
    passes_rate_check, PaginationWalker, WalkOutcome, MONTHLY_BUDGET_THRESHOLD, NIGHTS_PER_MONTH,
};
