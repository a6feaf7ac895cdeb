//! Rate-limit backoff controller
//!
//! Every upstream exchange goes through `BackoffController::execute`, which classifies the
//! response and decides what happens next:
//!
//! | Condition | Action |
//! |-----------|--------|
//! | HTTP 429 | Pause every dispatch for the cool-down, then resubmit |
//! | HTTP 500, 502, 503, 504, 522, 524, 408, 404 | Retry this request with exponential backoff |
//! | Timeout / connection failure | Retry this request with exponential backoff |
//! | Anything else | Pass through unmodified |
//!
//! The pause is global: while it is active no request is dispatched by any task. Local
//! retries are capped and exhausting them yields `SweepError::RetriesExhausted`. Rate-limit
//! pauses are unlimited unless `max_pauses` is set.

use crate::api::{ApiRequest, RawResponse, Transport};
use crate::config::CrawlerConfig;
use crate::{Result, SweepError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;

/// Status codes retried locally without a global pause
pub const RETRYABLE_STATUSES: [u16; 8] = [500, 502, 503, 504, 522, 524, 408, 404];

/// Status code that triggers the global pause
pub const TOO_MANY_REQUESTS: u16 = 429;

/// What to do with one response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Hand the response to the caller
    Pass,
    /// Pause every dispatch, then resubmit
    Pause,
    /// Resubmit this request only
    Retry,
}

/// Classifies a response status
pub fn classify(status: u16) -> Verdict {
    if status == TOO_MANY_REQUESTS {
        Verdict::Pause
    } else if RETRYABLE_STATUSES.contains(&status) {
        Verdict::Retry
    } else {
        Verdict::Pass
    }
}

/// Limits applied by the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub pause_duration: Duration,
    /// Opt-in ceiling on rate-limit pauses per request
    pub max_pauses: Option<u32>,
    pub max_concurrent_requests: usize,
}

impl RetryPolicy {
    /// Delay before local retry number `attempt` (1-based), doubling and capped
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self.base_delay.saturating_mul(1u32 << exponent);
        delay.min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&CrawlerConfig::default())
    }
}

impl From<&CrawlerConfig> for RetryPolicy {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
            pause_duration: Duration::from_secs(config.rate_limit_pause_secs),
            max_pauses: config.max_rate_limit_pauses,
            max_concurrent_requests: config.max_concurrent_requests.max(1) as usize,
        }
    }
}

/// Process-wide gate consulted before every dispatch
///
/// The gate holds the instant the current pause ends, if any. The lock is never held across
/// an await.
#[derive(Debug, Default)]
pub struct PauseGate {
    resume_at: Mutex<Option<Instant>>,
}

impl PauseGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enters the paused state for `cool_down`
    ///
    /// Returns false if a pause was already running; the running pause is not extended, so
    /// a burst of 429s from in-flight requests costs one cool-down, not many.
    pub fn pause(&self, cool_down: Duration) -> bool {
        let now = Instant::now();
        let mut resume_at = self.lock();
        match *resume_at {
            Some(until) if until > now => false,
            _ => {
                *resume_at = Some(now + cool_down);
                true
            }
        }
    }

    pub fn is_paused(&self) -> bool {
        self.current_pause().is_some()
    }

    /// Waits until no pause is active
    pub async fn wait_ready(&self) {
        while let Some(until) = self.current_pause() {
            tokio::time::sleep_until(until).await;
        }
    }

    fn current_pause(&self) -> Option<Instant> {
        let now = Instant::now();
        let mut resume_at = self.lock();
        match *resume_at {
            Some(until) if until > now => Some(until),
            Some(_) => {
                *resume_at = None;
                None
            }
            None => None,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Instant>> {
        // A poisoned gate still holds a valid instant
        self.resume_at
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Counters exposed for crawl statistics
#[derive(Debug, Default)]
pub struct BackoffStats {
    pauses: AtomicU64,
    retries: AtomicU64,
}

impl BackoffStats {
    pub fn pauses(&self) -> u64 {
        self.pauses.load(Ordering::Relaxed)
    }

    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }
}

/// Wraps a transport with pause, retry and concurrency control
pub struct BackoffController<T> {
    transport: T,
    gate: Arc<PauseGate>,
    permits: Arc<Semaphore>,
    policy: RetryPolicy,
    stats: Arc<BackoffStats>,
}

impl<T: Transport> BackoffController<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        let permits = Arc::new(Semaphore::new(policy.max_concurrent_requests));
        Self {
            transport,
            gate: Arc::new(PauseGate::new()),
            permits,
            policy,
            stats: Arc::new(BackoffStats::default()),
        }
    }

    pub fn gate(&self) -> Arc<PauseGate> {
        Arc::clone(&self.gate)
    }

    pub fn stats(&self) -> Arc<BackoffStats> {
        Arc::clone(&self.stats)
    }

    /// Sends a request, applying the pause and retry rules until a response passes
    pub async fn execute(&self, request: &ApiRequest) -> Result<RawResponse> {
        let mut retries = 0u32;
        let mut pauses = 0u32;

        loop {
            self.gate.wait_ready().await;

            let outcome = {
                let _permit = self.permits.acquire().await.map_err(|_| SweepError::Network {
                    context: request.describe(),
                    message: "request permits closed".to_string(),
                })?;

                // A pause may have started while this task waited for a permit
                if self.gate.is_paused() {
                    continue;
                }

                self.transport.send(request).await
            };

            let reason = match outcome {
                Ok(response) => match classify(response.status) {
                    Verdict::Pass => return Ok(response),
                    Verdict::Pause => {
                        pauses += 1;
                        if let Some(max_pauses) = self.policy.max_pauses {
                            if pauses > max_pauses {
                                return Err(SweepError::RetriesExhausted {
                                    context: request.describe(),
                                    attempts: retries + pauses,
                                    reason: format!(
                                        "still rate limited after {} pauses",
                                        max_pauses
                                    ),
                                });
                            }
                        }
                        if self.gate.pause(self.policy.pause_duration) {
                            self.stats.pauses.fetch_add(1, Ordering::Relaxed);
                            tracing::warn!(
                                "Rate limited on {}, pausing all requests for {:?}",
                                request.describe(),
                                self.policy.pause_duration
                            );
                        }
                        continue;
                    }
                    Verdict::Retry => format!("HTTP {}", response.status),
                },
                Err(e) if e.is_transient() => e.to_string(),
                Err(e) => return Err(e),
            };

            retries += 1;
            if retries > self.policy.max_retries {
                return Err(SweepError::RetriesExhausted {
                    context: request.describe(),
                    attempts: retries + pauses,
                    reason,
                });
            }

            let delay = self.policy.delay_for(retries);
            self.stats.retries.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                "Retrying {} in {:?} ({}, attempt {}/{})",
                request.describe(),
                delay,
                reason,
                retries,
                self.policy.max_retries
            );
            tokio::time::sleep(delay).await;
        }
    }
}
