//! Remote store connectivity monitor
//!
//! Issues lightweight periodic probes against the store and keeps a rolling
//! health signal. The signal is advisory: the query executor reads it for
//! logging but an unhealthy store never blocks an attempt.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, RwLock};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::store::ReportStore;

/// Probes failing this many times in a row mark the store unhealthy.
const MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// A health signal older than this is treated as unhealthy.
const STALE_AFTER: Duration = Duration::from_secs(120);

/// Upper bound on a single probe round trip.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Rolling connectivity state, mutated only by probes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectionHealthState {
    pub consecutive_failures: u32,
    pub last_check: Option<Instant>,
    pub latency: Duration,
}

impl ConnectionHealthState {
    /// Derived health signal: unhealthy on repeated failures or when the
    /// last probe is too old to trust (including before the first probe).
    pub fn is_healthy_at(&self, now: Instant) -> bool {
        if self.consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
            return false;
        }
        match self.last_check {
            Some(checked) => now.duration_since(checked) <= STALE_AFTER,
            None => false,
        }
    }
}

pub struct HealthMonitor {
    store: Arc<dyn ReportStore>,
    state: RwLock<ConnectionHealthState>,
    shutdown_tx: watch::Sender<bool>,
    running: AtomicBool,
}

impl HealthMonitor {
    pub fn new(store: Arc<dyn ReportStore>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            store,
            state: RwLock::new(ConnectionHealthState::default()),
            shutdown_tx,
            running: AtomicBool::new(false),
        }
    }

    /// Issue one bounded-latency probe. Failures become state transitions,
    /// never errors.
    pub async fn probe(&self) {
        let started = Instant::now();
        let outcome = time::timeout(PROBE_TIMEOUT, self.store.probe()).await;
        let latency = started.elapsed();

        match outcome {
            Ok(Ok(())) => self.record_success(latency).await,
            Ok(Err(err)) => self.record_failure(&format!("probe failed: {err}")).await,
            Err(_) => {
                self.record_failure(&format!("probe timed out after {PROBE_TIMEOUT:?}"))
                    .await
            }
        }
    }

    async fn record_success(&self, latency: Duration) {
        let now = Instant::now();
        let mut state = self.state.write().await;
        let was_healthy = state.is_healthy_at(now);

        state.consecutive_failures = 0;
        state.last_check = Some(now);
        state.latency = latency;

        if !was_healthy {
            info!(latency_ms = latency.as_millis() as u64, "remote store healthy");
        } else {
            debug!(latency_ms = latency.as_millis() as u64, "probe ok");
        }
    }

    async fn record_failure(&self, reason: &str) {
        let now = Instant::now();
        let mut state = self.state.write().await;
        let was_healthy = state.is_healthy_at(now);

        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        state.last_check = Some(now);

        if was_healthy && !state.is_healthy_at(now) {
            warn!(
                failures = state.consecutive_failures,
                "remote store unhealthy: {reason}"
            );
        } else {
            debug!(failures = state.consecutive_failures, "probe failed: {reason}");
        }
    }

    /// Current derived health signal.
    pub async fn is_healthy(&self) -> bool {
        self.state.read().await.is_healthy_at(Instant::now())
    }

    /// Copy of the current state, for the health endpoint.
    pub async fn snapshot(&self) -> ConnectionHealthState {
        *self.state.read().await
    }

    /// Begin periodic probing. Probes never overlap themselves: each tick
    /// awaits the in-flight probe, and missed ticks are delayed rather
    /// than bursted.
    pub fn start(self: &Arc<Self>, interval: Duration) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("health monitor already running");
            return;
        }

        let monitor = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        monitor.probe().await;
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!("health monitor stopping");
                            break;
                        }
                    }
                }
            }
            monitor.running.store(false, Ordering::SeqCst);
        });
    }

    /// End periodic probing. The probe task exits at its next suspension
    /// point; no timer survives the stop.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}
