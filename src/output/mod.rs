//! Output module for crawl statistics and reports
//!
//! This module handles:
//! - Counting what happened during a crawl
//! - Reading a run's statistics back from the output artifact
//! - Printing them for the `--stats` command

pub mod stats;

pub use stats::{load_statistics, print_statistics, CrawlStatistics, RunReport};
