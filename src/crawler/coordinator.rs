//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the main crawl loop that coordinates all aspects of
//! the crawling process, including:
//! - Seeding root queries and opening the run
//! - Resolving partitions and spawning split children
//! - Walking retrievable partitions and fetching listing details
//! - Feeding assembled listings through the item pipeline into storage
//! - Collecting statistics for the run

use crate::api::{ApiClient, DetailSource, HttpTransport, SearchSource};
use crate::config::Config;
use crate::crawler::{
    BackoffStats, PaginationWalker, Resolution, RetryPolicy, SearchSpacePartitioner, WalkOutcome,
};
use crate::dedup::{DeduplicationFilter, SentinelGuard, DUPLICATE_REASON};
use crate::listing::{Listing, ListingDetail, ListingId};
use crate::output::CrawlStatistics;
use crate::pipeline::Pipeline;
use crate::query::{root_queries, PriceRangeGenerator, Query};
use crate::state::ListingCache;
use crate::storage::{open_storage, RunStatus, SqliteStorage, Storage};
use crate::Result;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinSet;

/// What a crawl covers, independent of where its data comes from
#[derive(Debug, Clone)]
pub struct CrawlPlan {
    pub search_term: String,
    pub listing_url_base: String,
    pub roots: Vec<Query>,
    pub result_ceiling: u32,
}

impl CrawlPlan {
    /// Builds the plan for `config`, validating its dates against today
    pub fn from_config(config: &Config) -> Result<Self> {
        let today = chrono::Local::now().date_naive();
        let roots = root_queries(&config.search, &PriceRangeGenerator::default(), today)?;
        Ok(Self {
            search_term: config.search.query.clone(),
            listing_url_base: config.api.listing_url_base.clone(),
            roots,
            result_ceiling: config.crawler.result_ceiling,
        })
    }
}

/// A finished unit of work reported back to the coordinator loop
enum Completion {
    Resolved {
        query: Query,
        result: Result<Resolution>,
    },
    Walked {
        query: Query,
        result: Result<WalkOutcome>,
    },
    Fetched {
        id: ListingId,
        result: Result<ListingDetail>,
    },
}

/// Main crawler coordinator structure
pub struct Coordinator {
    plan: CrawlPlan,
    partitioner: Arc<SearchSpacePartitioner>,
    walker: Arc<PaginationWalker>,
    details: Arc<dyn DetailSource>,
    cache: Arc<ListingCache>,
    pipeline: Pipeline,
    storage: SqliteStorage,
    backoff: Option<Arc<BackoffStats>>,
    run_id: i64,
    stats: CrawlStatistics,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `config_hash` - Hash of the configuration file, stored on the run
    /// * `fresh` - Skip loading identifiers captured by the previous run
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(SweepError)` - Invalid dates, unusable storage or HTTP client
    pub fn new(config: &Config, config_hash: &str, fresh: bool) -> Result<Self> {
        let plan = CrawlPlan::from_config(config)?;

        let storage = open_storage(Path::new(&config.output.database_path))?;

        let dedup = if fresh {
            tracing::info!("Fresh crawl, not deduplicating against the previous run");
            DeduplicationFilter::empty()
        } else if let Some(sentinels) = &config.dedup {
            DeduplicationFilter::from_prior(SentinelGuard::new(
                &sentinels.primary_sentinel,
                &sentinels.backup_sentinel,
                &storage,
            ))
        } else {
            DeduplicationFilter::from_prior(&storage)
        };

        let transport = HttpTransport::from_config(&config.api)?;
        let client = Arc::new(ApiClient::new(
            transport,
            RetryPolicy::from(&config.crawler),
        ));
        let backoff = client.backoff_stats();
        let search: Arc<dyn SearchSource> = client.clone();
        let details: Arc<dyn DetailSource> = client;

        let coordinator = Self::with_sources(plan, search, details, storage, dedup, config_hash)?;
        Ok(coordinator.with_backoff_stats(backoff))
    }

    /// Creates a coordinator over arbitrary sources and an open storage
    ///
    /// Opens a new run in `storage`. The dedup filter always runs first in the pipeline.
    pub fn with_sources(
        plan: CrawlPlan,
        search: Arc<dyn SearchSource>,
        details: Arc<dyn DetailSource>,
        mut storage: SqliteStorage,
        dedup: DeduplicationFilter,
        config_hash: &str,
    ) -> Result<Self> {
        let cache = Arc::new(ListingCache::new());
        let partitioner = Arc::new(SearchSpacePartitioner::new(
            Arc::clone(&search),
            plan.result_ceiling,
        ));
        let walker = Arc::new(PaginationWalker::new(search, Arc::clone(&cache)));
        let pipeline = Pipeline::new().with_stage(Arc::new(dedup));

        let run_id = storage.create_run(config_hash, &plan.search_term)?;
        tracing::info!("Starting new run {}", run_id);

        Ok(Self {
            plan,
            partitioner,
            walker,
            details,
            cache,
            pipeline,
            storage,
            backoff: None,
            run_id,
            stats: CrawlStatistics::default(),
        })
    }

    /// Reports pause and retry counts from this backoff controller in the run statistics
    pub fn with_backoff_stats(mut self, stats: Arc<BackoffStats>) -> Self {
        self.backoff = Some(stats);
        self
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }

    /// Runs the crawl to completion
    ///
    /// Partition failures, detail failures and pipeline drops are counted and logged; only
    /// storage failures end the crawl early, in which case the run is marked failed.
    pub async fn run(&mut self) -> Result<CrawlStatistics> {
        tracing::info!(
            "Crawling '{}' from {} root partitions (ceiling {})",
            self.plan.search_term,
            self.plan.roots.len(),
            self.partitioner.ceiling()
        );
        let start_time = std::time::Instant::now();

        if let Err(e) = self.drive().await {
            tracing::error!("Crawl run {} failed: {}", self.run_id, e);
            if let Err(status_err) = self.storage.update_run_status(self.run_id, RunStatus::Failed)
            {
                tracing::warn!("Could not mark run {} failed: {}", self.run_id, status_err);
            }
            return Err(e);
        }

        if let Some(backoff) = &self.backoff {
            self.stats.rate_limit_pauses = backoff.pauses();
            self.stats.retries = backoff.retries();
        }

        self.storage.complete_run(self.run_id, &self.stats)?;
        self.stats.log_summary();
        tracing::info!(
            "Run {} completed in {:?} ({} listings cached)",
            self.run_id,
            start_time.elapsed(),
            self.cache.len()
        );

        Ok(self.stats.clone())
    }

    async fn drive(&mut self) -> Result<()> {
        let mut tasks = JoinSet::new();

        for query in self.plan.roots.clone() {
            self.stats.root_partitions += 1;
            self.spawn_resolve(&mut tasks, query);
        }

        while let Some(joined) = tasks.join_next().await {
            let completion = match joined {
                Ok(completion) => completion,
                Err(e) => {
                    tracing::error!("Crawl task ended abnormally: {}", e);
                    continue;
                }
            };

            match completion {
                Completion::Resolved { query, result } => {
                    self.handle_resolved(&mut tasks, query, result)
                }
                Completion::Walked { query, result } => {
                    self.handle_walked(&mut tasks, query, result)
                }
                Completion::Fetched { id, result } => self.handle_fetched(id, result)?,
            }
        }

        Ok(())
    }

    fn spawn_resolve(&self, tasks: &mut JoinSet<Completion>, query: Query) {
        let partitioner = Arc::clone(&self.partitioner);
        tasks.spawn(async move {
            let result = partitioner.resolve(&query).await;
            Completion::Resolved { query, result }
        });
    }

    fn handle_resolved(
        &mut self,
        tasks: &mut JoinSet<Completion>,
        query: Query,
        result: Result<Resolution>,
    ) {
        match result {
            Ok(Resolution::Split(left, right)) => {
                self.stats.splits += 1;
                self.spawn_resolve(tasks, query.with_window(left));
                self.spawn_resolve(tasks, query.with_window(right));
            }
            Ok(Resolution::Retrievable(first_page)) => {
                let walker = Arc::clone(&self.walker);
                tasks.spawn(async move {
                    let result = walker.walk(&query, first_page).await;
                    Completion::Walked { query, result }
                });
            }
            Err(e) => {
                self.stats.aborted_partitions += 1;
                tracing::error!("Aborting partition {}: {}", query, e);
            }
        }
    }

    fn handle_walked(
        &mut self,
        tasks: &mut JoinSet<Completion>,
        query: Query,
        result: Result<WalkOutcome>,
    ) {
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                self.stats.aborted_partitions += 1;
                tracing::error!("Aborting partition {}: {}", query, e);
                return;
            }
        };

        self.stats.leaves_walked += 1;
        self.stats.pages_fetched += u64::from(outcome.pages);
        self.stats.rate_check_drops += u64::from(outcome.rate_dropped);
        self.stats.listings_discovered += outcome.ids.len() as u64;

        for id in outcome.ids {
            let details = Arc::clone(&self.details);
            tasks.spawn(async move {
                let result = details.listing_detail(id).await;
                Completion::Fetched { id, result }
            });
        }
    }

    fn handle_fetched(&mut self, id: ListingId, result: Result<ListingDetail>) -> Result<()> {
        let detail = match result {
            Ok(detail) => detail,
            Err(e) => {
                self.stats.skipped_listings += 1;
                tracing::warn!("Skipping listing {}: {}", id, e);
                return Ok(());
            }
        };

        let listing = Listing::assemble(
            id,
            &self.plan.listing_url_base,
            &self.plan.search_term,
            self.cache.get(id),
            detail,
        );

        match self.pipeline.process(listing) {
            Ok(listing) => {
                self.storage.insert_listing(self.run_id, &listing)?;
                self.stats.accepted += 1;
                tracing::debug!("Accepted listing {} ({})", listing.id, listing.detail.name);

                if self.stats.accepted % 100 == 0 {
                    tracing::info!(
                        "Progress: {} listings accepted, {} duplicates, {} skipped",
                        self.stats.accepted,
                        self.stats.duplicates,
                        self.stats.skipped_listings
                    );
                }
            }
            Err(dropped) => {
                if dropped.reason == DUPLICATE_REASON {
                    self.stats.duplicates += 1;
                } else {
                    self.stats.filtered += 1;
                }
                tracing::debug!("{}", dropped);
                self.storage.record_drop(self.run_id, &dropped)?;
            }
        }

        Ok(())
    }
}

/// Runs the main crawl operation
///
/// This function orchestrates the entire crawl process:
///
/// 1. Validate dates and build root partitions
/// 2. Open the output database and load prior identifiers
/// 3. Build the HTTP client behind the backoff controller
/// 4. Resolve, split and walk partitions concurrently
/// 5. Fetch details, deduplicate and store accepted listings
/// 6. Mark the run as completed with its statistics
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `config_hash` - Hash of the configuration file
/// * `fresh` - Skip deduplication against the previous run
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Crawl completed successfully
/// * `Err(SweepError)` - Crawl failed with an error
///
/// # Example
///
/// ```no_run
/// use listing_sweep::config::load_config_with_hash;
/// use listing_sweep::crawler::run_crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("sweep.toml"))?;
/// run_crawl(&config, &hash, false).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: &Config, config_hash: &str, fresh: bool) -> Result<CrawlStatistics> {
    let mut coordinator = Coordinator::new(config, config_hash, fresh)?;
    coordinator.run().await
}
