//! Narrow data-access facade
//!
//! The handlers and the admin CLI only ever talk to [`MetricsStore`]:
//! fetch a timeframe report, fetch all-time totals, merge a day's metrics,
//! resolve a profile, and seed today's buckets. Every remote round trip
//! goes through the resilient executor; failures surface to the caller
//! unchanged so "no data yet" and "could not load" stay distinguishable.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use serde::{Deserialize, Serialize};

use crate::cache::ResultCache;
use crate::config::ResilienceConfig;
use crate::executor::{QueryError, QueryOptions, ResilientQueryExecutor};
use crate::models::{DayMetrics, DayMetricsPatch, Profile, ReportDocument};
use crate::report::{Report, ReportAggregator, ReportTotals, Timeframe};
use crate::store::ReportStore;
use crate::time::{parse_date_key, TimeProvider};

const REFERRAL_CODE_LEN: usize = 8;

/// Read-modify-write cycles re-run this many times when a concurrent
/// writer bumps the document version first.
const UPSERT_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum MetricsError {
    /// Rejected before any remote call is attempted.
    #[error("invalid date key '{0}', expected YYYY-MM-DD")]
    InvalidDateKey(String),

    /// Every read-modify-write attempt lost the version race.
    #[error("conflicting concurrent updates for user '{0}'")]
    WriteConflict(String),

    #[error(transparent)]
    Query(#[from] QueryError),
}

pub type MetricsResult<T> = Result<T, MetricsError>;

/// Outcome of a daily seeding batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedSummary {
    pub seeded: usize,
    pub failed: usize,
}

pub struct MetricsStore {
    store: Arc<dyn ReportStore>,
    executor: Arc<ResilientQueryExecutor>,
    cache: Arc<ResultCache>,
    aggregator: ReportAggregator,
    time: TimeProvider,
    query_timeout: Duration,
    cache_ttl: Duration,
    max_retries: u32,
}

impl MetricsStore {
    pub fn new(
        store: Arc<dyn ReportStore>,
        executor: Arc<ResilientQueryExecutor>,
        cache: Arc<ResultCache>,
        time: TimeProvider,
        resilience: &ResilienceConfig,
    ) -> Self {
        Self {
            store,
            executor,
            cache,
            aggregator: ReportAggregator::new(time),
            time,
            query_timeout: Duration::from_millis(resilience.query_timeout_ms),
            cache_ttl: Duration::from_secs(resilience.cache_ttl_secs),
            max_retries: resilience.max_retries,
        }
    }

    fn cached_opts(&self, key: String) -> QueryOptions {
        QueryOptions::cached(key, self.cache_ttl).with_max_retries(self.max_retries)
    }

    fn uncached_opts(&self) -> QueryOptions {
        QueryOptions::uncached().with_max_retries(self.max_retries)
    }

    async fn fetch_document(
        &self,
        user_id: &str,
        opts: QueryOptions,
    ) -> MetricsResult<Option<ReportDocument>> {
        let store = Arc::clone(&self.store);
        let user_id = user_id.to_string();
        let doc = self
            .executor
            .execute("fetch_report", self.query_timeout, opts, move || {
                let store = Arc::clone(&store);
                let user_id = user_id.clone();
                async move { store.fetch_report(&user_id).await }
            })
            .await?;
        Ok(doc)
    }

    /// Timeframe report for a user: raw day-bucket map fetched under the
    /// resilience policy, then densified and aggregated. `force` bypasses
    /// the cached fetch. An account with no document yet gets a zero-filled
    /// report, not an error.
    pub async fn get_report(
        &self,
        user_id: &str,
        timeframe: Timeframe,
        force: bool,
    ) -> MetricsResult<Report> {
        let key = report_cache_key(user_id, timeframe);
        if force {
            self.cache.invalidate(&key);
        }

        let doc = self.fetch_document(user_id, self.cached_opts(key)).await?;
        let daily = doc.map(|d| d.daily).unwrap_or_default();
        Ok(self.aggregator.run(&daily, timeframe))
    }

    /// All-time totals over every bucket, cached independently of
    /// `get_report`.
    pub async fn get_totals(&self, user_id: &str, force: bool) -> MetricsResult<ReportTotals> {
        let key = totals_cache_key(user_id);
        if force {
            self.cache.invalidate(&key);
        }

        let store = Arc::clone(&self.store);
        let uid = user_id.to_string();
        let totals = self
            .executor
            .execute(
                "fetch_totals",
                self.query_timeout,
                self.cached_opts(key),
                move || {
                    let store = Arc::clone(&store);
                    let uid = uid.clone();
                    async move {
                        let doc = store.fetch_report(&uid).await?;
                        Ok(doc.map(|d| ReportTotals::of(&d.daily)).unwrap_or_default())
                    }
                },
            )
            .await?;
        Ok(totals)
    }

    /// Merge a partial day's metrics into a user's document.
    ///
    /// Read-modify-write over the whole row, guarded by the document's
    /// version stamp: a write that loses the version race is re-run from
    /// a fresh read, so concurrent increments are never silently dropped.
    pub async fn upsert_day(
        &self,
        user_id: &str,
        date_key: &str,
        patch: DayMetricsPatch,
    ) -> MetricsResult<DayMetrics> {
        if parse_date_key(date_key).is_none() {
            return Err(MetricsError::InvalidDateKey(date_key.to_string()));
        }

        for attempt in 0..UPSERT_ATTEMPTS {
            let current = self.fetch_document(user_id, self.uncached_opts()).await?;
            let now = chrono::Utc::now().timestamp();
            let mut doc = current.unwrap_or_else(|| ReportDocument::empty(user_id, now));
            doc.updated_at = now;

            let bucket = doc.daily.entry(date_key.to_string()).or_default();
            bucket.apply(&patch);
            let updated = *bucket;

            let store = Arc::clone(&self.store);
            let written = self
                .executor
                .execute(
                    "put_report",
                    self.query_timeout,
                    self.uncached_opts(),
                    move || {
                        let store = Arc::clone(&store);
                        let doc = doc.clone();
                        async move { store.put_report(&doc).await }
                    },
                )
                .await?;

            if written {
                self.invalidate_user(user_id);
                return Ok(updated);
            }

            warn!(
                user = %user_id,
                attempt,
                "document version changed under us, re-reading"
            );
        }

        Err(MetricsError::WriteConflict(user_id.to_string()))
    }

    /// Resolve a user's profile, creating one with a fresh referral code
    /// on first access.
    pub async fn get_or_create_profile(
        &self,
        user_id: &str,
        email: Option<&str>,
    ) -> MetricsResult<Profile> {
        let store = Arc::clone(&self.store);
        let uid = user_id.to_string();
        let existing = self
            .executor
            .execute(
                "fetch_profile",
                self.query_timeout,
                self.uncached_opts(),
                move || {
                    let store = Arc::clone(&store);
                    let uid = uid.clone();
                    async move { store.fetch_profile(&uid).await }
                },
            )
            .await?;

        if let Some(profile) = existing {
            return Ok(profile);
        }

        let code = generate_referral_code();
        let store = Arc::clone(&self.store);
        let uid = user_id.to_string();
        let email = email.map(|e| e.to_string());
        let profile = self
            .executor
            .execute(
                "upsert_profile",
                self.query_timeout,
                self.uncached_opts(),
                move || {
                    let store = Arc::clone(&store);
                    let uid = uid.clone();
                    let email = email.clone();
                    let code = code.clone();
                    async move { store.upsert_profile(&uid, email.as_deref(), &code).await }
                },
            )
            .await?;
        info!(user = %user_id, "created profile");
        Ok(profile)
    }

    /// Ensure today's bucket exists for every known user. Individual
    /// failures are tolerated: they are logged and counted, and the batch
    /// continues.
    pub async fn ensure_daily_buckets(&self) -> MetricsResult<SeedSummary> {
        let store = Arc::clone(&self.store);
        let users = self
            .executor
            .execute(
                "list_user_ids",
                self.query_timeout,
                self.uncached_opts(),
                move || {
                    let store = Arc::clone(&store);
                    async move { store.list_user_ids().await }
                },
            )
            .await?;

        let today_key = self.time.today_key();
        let mut summary = SeedSummary::default();
        for user_id in users {
            match self
                .upsert_day(&user_id, &today_key, DayMetricsPatch::default())
                .await
            {
                Ok(_) => summary.seeded += 1,
                Err(err) => {
                    warn!(user = %user_id, error = %err, "failed to seed today's bucket");
                    summary.failed += 1;
                }
            }
        }

        info!(
            date = %today_key,
            seeded = summary.seeded,
            failed = summary.failed,
            "daily bucket seeding complete"
        );
        Ok(summary)
    }

    fn invalidate_user(&self, user_id: &str) {
        for timeframe in Timeframe::ALL {
            self.cache.invalidate(&report_cache_key(user_id, timeframe));
        }
        self.cache.invalidate(&totals_cache_key(user_id));
    }
}

/// Cache keys are composed from operation identity, user id and
/// parameters, so distinct logical queries never collide.
fn report_cache_key(user_id: &str, timeframe: Timeframe) -> String {
    format!("report:{user_id}:{timeframe}")
}

fn totals_cache_key(user_id: &str) -> String {
    format!("totals:{user_id}")
}

/// Generate a referral code. The alphabet excludes easily-confused
/// characters (0/O, 1/I/L).
fn generate_referral_code() -> String {
    use rand::RngExt;
    const CHARSET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
    let mut rng = rand::rng();
    (0..REFERRAL_CODE_LEN)
        .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
        .collect()
}
