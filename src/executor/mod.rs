//! Resilience wrapper around remote store operations
//!
//! Every remote read/write goes through [`ResilientQueryExecutor::execute`],
//! which layers a cache fast path, a per-call timeout, health-aware logging
//! and bounded retry with exponential backoff over an opaque async
//! operation. The executor never substitutes fallback data: a failure that
//! survives the retry policy reaches the caller as-is.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time;
use tracing::{debug, warn};

use crate::cache::ResultCache;
use crate::health::HealthMonitor;

#[derive(Debug, Error)]
pub enum QueryError {
    /// The operation did not complete within its window. Never retried: a
    /// slow backend should not be hammered further.
    #[error("remote operation timed out after {0:?}")]
    Timeout(Duration),

    /// Any other remote failure, surfaced after the retry budget is spent.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type QueryResult<T> = Result<T, QueryError>;

/// Per-call resilience policy.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub use_cache: bool,
    pub cache_key: Option<String>,
    pub cache_ttl: Duration,
    pub skip_health_check: bool,
    pub max_retries: u32,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            use_cache: false,
            cache_key: None,
            cache_ttl: Duration::from_secs(300),
            skip_health_check: false,
            max_retries: 2,
        }
    }
}

impl QueryOptions {
    pub fn cached(key: impl Into<String>, ttl: Duration) -> Self {
        Self {
            use_cache: true,
            cache_key: Some(key.into()),
            cache_ttl: ttl,
            ..Default::default()
        }
    }

    pub fn uncached() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Outcome of a single attempt against the remote store.
enum Attempt<T> {
    Success(T),
    TimedOut,
    Failed(anyhow::Error),
}

/// What to do after a failed (non-timeout) attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetryStep {
    GiveUp,
    RetryAfter(Duration),
}

/// Retry decision, kept separate from the I/O so the policy is auditable
/// on its own: attempt `n` of a budget of `max_retries` retries either
/// schedules a backoff of `base_delay * 2^n` or gives up.
fn next_step(attempt: u32, max_retries: u32, base_delay: Duration) -> RetryStep {
    if attempt >= max_retries {
        RetryStep::GiveUp
    } else {
        RetryStep::RetryAfter(base_delay * 2u32.saturating_pow(attempt))
    }
}

pub struct ResilientQueryExecutor {
    cache: Arc<ResultCache>,
    health: Arc<HealthMonitor>,
    base_delay: Duration,
}

impl ResilientQueryExecutor {
    pub fn new(cache: Arc<ResultCache>, health: Arc<HealthMonitor>) -> Self {
        Self::with_base_delay(cache, health, Duration::from_millis(200))
    }

    pub fn with_base_delay(
        cache: Arc<ResultCache>,
        health: Arc<HealthMonitor>,
        base_delay: Duration,
    ) -> Self {
        Self {
            cache,
            health,
            base_delay,
        }
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    /// Execute one remote operation under the resilience policy.
    ///
    /// A live cache entry short-circuits everything else. A timeout fails
    /// the call after a single attempt; any other failure is retried with
    /// exponential backoff up to `max_retries` extra attempts, each
    /// re-raced against the same timeout window.
    pub async fn execute<T, F, Fut>(
        &self,
        name: &str,
        timeout: Duration,
        opts: QueryOptions,
        op: F,
    ) -> QueryResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: Fn() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        if opts.use_cache {
            if let Some(key) = opts.cache_key.as_deref() {
                if let Some(value) = self.cache.get(key) {
                    match serde_json::from_value::<T>(value) {
                        Ok(hit) => {
                            debug!(query = name, key, "cache hit");
                            return Ok(hit);
                        }
                        Err(err) => {
                            // An entry the caller cannot decode is as good
                            // as absent
                            warn!(query = name, key, error = %err, "dropping undecodable cache entry");
                            self.cache.invalidate(key);
                        }
                    }
                }
            }
        }

        if !opts.skip_health_check && !self.health.is_healthy().await {
            warn!(query = name, "remote store reported unhealthy, attempting anyway");
        }

        let mut attempt: u32 = 0;
        let value = loop {
            match run_attempt(timeout, &op).await {
                Attempt::Success(value) => break value,
                Attempt::TimedOut => {
                    warn!(query = name, attempt, timeout_ms = timeout.as_millis() as u64, "remote operation timed out");
                    return Err(QueryError::Timeout(timeout));
                }
                Attempt::Failed(err) => match next_step(attempt, opts.max_retries, self.base_delay)
                {
                    RetryStep::RetryAfter(delay) => {
                        warn!(
                            query = name,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "remote operation failed, retrying"
                        );
                        time::sleep(delay).await;
                        attempt += 1;
                    }
                    RetryStep::GiveUp => {
                        warn!(query = name, attempts = attempt + 1, error = %err, "remote operation failed, giving up");
                        return Err(QueryError::Backend(err));
                    }
                },
            }
        };

        if opts.use_cache {
            if let Some(key) = opts.cache_key.as_deref() {
                match serde_json::to_value(&value) {
                    Ok(json) => self.cache.set(key, json, opts.cache_ttl),
                    Err(err) => warn!(query = name, key, error = %err, "result not cacheable"),
                }
            }
        }

        Ok(value)
    }
}

async fn run_attempt<T, F, Fut>(timeout: Duration, op: &F) -> Attempt<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    match time::timeout(timeout, op()).await {
        Ok(Ok(value)) => Attempt::Success(value),
        Ok(Err(err)) => Attempt::Failed(err),
        Err(_) => Attempt::TimedOut,
    }
}
