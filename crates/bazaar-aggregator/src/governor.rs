//! Rate and backoff governor.
//!
//! One token bucket per source (refilled at `max_per_second`, holding at most
//! one second of burst) plus a per-UTC-day call counter. State is shared by
//! every concurrent request and only touched under a mutex that is never held
//! across an await.
//!
//! The governor also owns retries: only `RateLimited` and `Timeout` failures
//! are retried, with exponential backoff, and only when the delay still fits
//! in the call's budget.

use bazaar_adapters::{AdapterResult, SourceFailure, TimeoutBudget};
use bazaar_core::{FailureKind, GovernorConfig, SourceId};
use bazaar_source::RateLimitPolicy;
use chrono::{NaiveDate, Utc};
use rand::Rng;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
    day: NaiveDate,
    calls_today: u32,
}

/// Result of one admission attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Admission {
    Granted,
    /// No token yet; one will be available after this delay
    Wait(Duration),
    /// The daily allowance is used up
    DailyLimit(u32),
}

/// Shared admission control and retry policy for all sources.
#[derive(Debug)]
pub struct RateGovernor {
    buckets: Mutex<HashMap<SourceId, Bucket>>,
    backoff: BackoffPolicy,
    max_retries: u32,
    max_queue_wait: Duration,
}

impl RateGovernor {
    /// Create a governor from configuration.
    #[must_use]
    pub fn new(config: &GovernorConfig) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            backoff: BackoffPolicy::from_config(config),
            max_retries: config.max_retries,
            max_queue_wait: Duration::from_millis(config.max_queue_wait_ms),
        }
    }

    /// Backoff policy used for retries.
    #[must_use]
    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    /// Wait for permission to call a source.
    ///
    /// Queues for at most the configured maximum wait, and never past the
    /// budget's deadline.
    ///
    /// # Errors
    /// `RateLimited` if no token becomes available in time or the daily limit
    /// is reached; `Timeout` ("request cancelled") if the budget is cancelled
    /// while queueing.
    pub async fn admit(
        &self,
        source_id: &SourceId,
        policy: &RateLimitPolicy,
        budget: &TimeoutBudget,
    ) -> Result<(), SourceFailure> {
        let mut waited = Duration::ZERO;

        loop {
            match self.try_acquire(source_id, policy) {
                Admission::Granted => return Ok(()),
                Admission::DailyLimit(limit) => {
                    debug!(source_id = %source_id, limit, "daily call limit reached");
                    return Err(SourceFailure::new(
                        FailureKind::RateLimited,
                        format!("daily limit of {limit} calls reached"),
                    ));
                }
                Admission::Wait(delay) => {
                    if waited.saturating_add(delay) > self.max_queue_wait || !budget.allows(delay)
                    {
                        debug!(
                            source_id = %source_id,
                            wait_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            "local rate limit, not queueing"
                        );
                        return Err(SourceFailure::new(
                            FailureKind::RateLimited,
                            "local rate limit reached",
                        ));
                    }

                    tokio::select! {
                        biased;
                        () = budget.cancel_token().cancelled() => return Err(SourceFailure::cancelled()),
                        () = tokio::time::sleep(delay) => {}
                    }
                    waited += delay;
                }
            }
        }
    }

    fn try_acquire(&self, source_id: &SourceId, policy: &RateLimitPolicy) -> Admission {
        let now = Instant::now();
        let today = Utc::now().date_naive();
        let rate = policy.max_per_second;
        let capacity = rate.max(1.0);

        let mut buckets = self.buckets.lock().expect("governor lock poisoned");
        let bucket = buckets.entry(source_id.clone()).or_insert_with(|| Bucket {
            tokens: capacity,
            last_refill: now,
            day: today,
            calls_today: 0,
        });

        if bucket.day != today {
            bucket.day = today;
            bucket.calls_today = 0;
        }
        if let Some(limit) = policy.max_per_day {
            if bucket.calls_today >= limit {
                return Admission::DailyLimit(limit);
            }
        }

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.last_refill = now;
        bucket.tokens = (bucket.tokens + elapsed * rate).min(capacity);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            bucket.calls_today += 1;
            Admission::Granted
        } else {
            // Rates too small to express as a wait never refill in practice
            let wait = Duration::try_from_secs_f64((1.0 - bucket.tokens) / rate)
                .unwrap_or(Duration::MAX);
            Admission::Wait(wait)
        }
    }

    /// Run a call under admission control, retrying transient failures.
    ///
    /// `call` is invoked once per attempt. Retries happen only for
    /// `RateLimited` and `Timeout`, at most `max_retries` times, and only when
    /// the backoff delay fits in the remaining budget.
    pub async fn run<F, Fut>(
        &self,
        source_id: &SourceId,
        policy: &RateLimitPolicy,
        budget: &TimeoutBudget,
        mut call: F,
    ) -> AdapterResult
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AdapterResult>,
    {
        let mut attempt = 0;

        loop {
            self.admit(source_id, policy, budget).await?;

            let failure = match call().await {
                Ok(listings) => return Ok(listings),
                Err(failure) => failure,
            };

            if !failure.kind.is_retryable() || attempt >= self.max_retries || budget.is_cancelled()
            {
                return Err(failure);
            }

            let delay = self.backoff.delay(attempt, &failure);
            if !budget.allows(delay) {
                debug!(
                    source_id = %source_id,
                    kind = %failure.kind,
                    "backoff does not fit the remaining budget, giving up"
                );
                return Err(failure);
            }

            warn!(
                source_id = %source_id,
                kind = %failure.kind,
                attempt = attempt + 1,
                max_retries = self.max_retries,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "retrying source call"
            );

            tokio::select! {
                biased;
                () = budget.cancel_token().cancelled() => return Err(SourceFailure::cancelled()),
                () = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }
}

/// Exponential backoff with an extra multiplier for rate limits.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    base: Duration,
    max: Duration,
    rate_limit_multiplier: u32,
    jitter: bool,
}

impl BackoffPolicy {
    /// Policy from governor configuration.
    #[must_use]
    pub fn from_config(config: &GovernorConfig) -> Self {
        Self {
            base: Duration::from_millis(config.base_backoff_ms),
            max: Duration::from_millis(config.max_backoff_ms),
            rate_limit_multiplier: config.rate_limit_multiplier.max(1),
            jitter: config.jitter,
        }
    }

    /// Delay before retry number `attempt + 1`.
    ///
    /// A server-sent `Retry-After` wins over the computed delay.
    #[must_use]
    pub fn delay(&self, attempt: u32, failure: &SourceFailure) -> Duration {
        if let Some(retry_after) = failure.retry_after {
            return retry_after;
        }

        let multiplier = if failure.kind == FailureKind::RateLimited {
            self.rate_limit_multiplier
        } else {
            1
        };
        let delay = self
            .base
            .saturating_mul(multiplier)
            .saturating_mul(2_u32.saturating_pow(attempt))
            .min(self.max);

        if self.jitter {
            delay.mul_f64(rand::thread_rng().gen_range(0.5..=1.0))
        } else {
            delay
        }
    }
}
