//! Circuit breaker policy and its sliding-window statistics
//!
//! Failure counts are aggregated over a trailing time window via a ring of
//! fixed-duration buckets. A background rotation task advances the bucket
//! cursor every `window / slots` and zeroes the bucket being entered, so
//! observations fade out roughly one window after they were recorded —
//! whether or not any calls are in flight.
//!
//! One statistics instance exists per backend key, created lazily and
//! retained for the chain's lifetime. The key is `"single"` unless a
//! distribute policy upstream recorded the selected candidate's index in
//! the invocation context.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::call::{Call, CallContext, Policy};
use crate::error::FaultError;
use crate::timer::{self, TimerHandle};

/// Statistics key used when no distribute policy selected a backend
pub const DEFAULT_BACKEND_KEY: &str = "single";

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, calls pass through
    Closed,
    /// Circuit is open, calls are rejected without being attempted
    Open,
    /// Circuit is probing: the next call decides whether to close again
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Configuration for the circuit breaker policy
#[derive(Debug, Clone)]
pub struct CircuitBreakerOptions {
    /// Windowed failure count at which the circuit opens
    pub failure_count_threshold: u64,
    /// Windowed failure rate (in `[0, 1]`) at which the circuit opens
    pub failure_rate_threshold: f64,
    /// Length of the trailing observation window
    pub window: Duration,
    /// Number of buckets the window is divided into
    pub slots: usize,
    /// How long an open circuit waits before probing again
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerOptions {
    fn default() -> Self {
        Self {
            failure_count_threshold: 5,
            failure_rate_threshold: 0.5,
            window: Duration::from_secs(10),
            slots: 10,
            reset_timeout: Duration::from_secs(60),
        }
    }
}

struct StatsInner {
    totals: Vec<u64>,
    fails: Vec<u64>,
    cursor: usize,
    state: CircuitState,
}

/// Per-key sliding-window failure/total counters with a state value
///
/// Rotation runs on a background task for the lifetime of the instance and
/// stops when the instance is dropped.
pub struct CircuitBreakerStatistics {
    inner: Arc<Mutex<StatsInner>>,
    rotation: TimerHandle,
}

impl fmt::Debug for CircuitBreakerStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreakerStatistics")
            .field("total", &self.total())
            .field("fail", &self.fail())
            .field("state", &self.state())
            .finish()
    }
}

impl CircuitBreakerStatistics {
    /// Create statistics with a rotation schedule of `window / slots`
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(window: Duration, slots: usize) -> Self {
        // A zero-slot ring would make rotation degenerate.
        let slots = slots.max(1);
        let inner = Arc::new(Mutex::new(StatsInner {
            totals: vec![0; slots],
            fails: vec![0; slots],
            cursor: 0,
            state: CircuitState::Closed,
        }));

        let rotation_inner = Arc::clone(&inner);
        let rotation = timer::recurring(window / slots as u32, move || {
            let mut stats = rotation_inner.lock();
            stats.cursor = (stats.cursor + 1) % slots;
            let cursor = stats.cursor;
            stats.totals[cursor] = 0;
            stats.fails[cursor] = 0;
        });

        Self { inner, rotation }
    }

    /// Count a call in the current bucket
    pub fn inc_total(&self) {
        let mut stats = self.inner.lock();
        let cursor = stats.cursor;
        stats.totals[cursor] += 1;
    }

    /// Count a failure in the current bucket
    pub fn inc_fail(&self) {
        let mut stats = self.inner.lock();
        let cursor = stats.cursor;
        stats.fails[cursor] += 1;
    }

    /// Total calls observed within the trailing window
    pub fn total(&self) -> u64 {
        self.inner.lock().totals.iter().sum()
    }

    /// Failures observed within the trailing window
    pub fn fail(&self) -> u64 {
        self.inner.lock().fails.iter().sum()
    }

    /// Current circuit state
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Transition to a new state, logging the edge
    pub fn set_state(&self, new_state: CircuitState) {
        let mut stats = self.inner.lock();
        info!("circuit breaker state: {} ===> {}", stats.state, new_state);
        stats.state = new_state;
    }

    /// Zero every bucket immediately, without waiting for rotation
    pub fn reset_counts(&self) {
        let mut stats = self.inner.lock();
        stats.totals.fill(0);
        stats.fails.fill(0);
    }
}

impl Drop for CircuitBreakerStatistics {
    fn drop(&mut self) {
        self.rotation.cancel();
    }
}

/// Policy that gates calls on per-backend failure statistics
///
/// Clones share the statistics registry, so a caller can keep one clone for
/// inspection while appending another to a chain.
#[derive(Clone)]
pub struct CircuitBreakerPolicy {
    options: CircuitBreakerOptions,
    stats: Arc<DashMap<String, Arc<CircuitBreakerStatistics>>>,
    reset_timers: Arc<DashMap<String, TimerHandle>>,
}

impl CircuitBreakerPolicy {
    pub fn new(options: CircuitBreakerOptions) -> Self {
        Self { options, stats: Arc::new(DashMap::new()), reset_timers: Arc::new(DashMap::new()) }
    }

    /// Statistics for a backend key, if any call has reached it yet
    pub fn statistics(&self, key: &str) -> Option<Arc<CircuitBreakerStatistics>> {
        self.stats.get(key).map(|entry| Arc::clone(entry.value()))
    }

    fn statistics_for(&self, key: &str) -> Arc<CircuitBreakerStatistics> {
        let entry = self.stats.entry(key.to_string()).or_insert_with(|| {
            Arc::new(CircuitBreakerStatistics::new(self.options.window, self.options.slots))
        });
        Arc::clone(entry.value())
    }

    fn exceeds_threshold(&self, stats: &CircuitBreakerStatistics) -> bool {
        let fails = stats.fail();
        let total = stats.total();
        if fails >= self.options.failure_count_threshold {
            return true;
        }
        // Rate is undefined before any call lands in the window.
        total > 0 && fails as f64 / total as f64 >= self.options.failure_rate_threshold
    }

    /// Open the circuit for `key` and schedule the half-open probe
    fn transit_to_open(&self, key: &str, stats: &Arc<CircuitBreakerStatistics>) {
        stats.set_state(CircuitState::Open);

        let probe_stats = Arc::clone(stats);
        let handle = timer::oneshot(self.options.reset_timeout, move || {
            probe_stats.set_state(CircuitState::HalfOpen);
        });
        // A half-open failure reopens the circuit; drop the stale probe
        // timer before arming the new one.
        if let Some(stale) = self.reset_timers.insert(key.to_string(), handle) {
            stale.cancel();
        }
    }

    fn transit_to_closed(&self, stats: &Arc<CircuitBreakerStatistics>) {
        stats.set_state(CircuitState::Closed);
        stats.reset_counts();
    }
}

impl<A, T> Policy<A, T> for CircuitBreakerPolicy
where
    A: Clone + Send + Sync + 'static,
    T: Send + 'static,
{
    fn wrap(&self, next: Call<A, T>) -> Call<A, T> {
        let breaker = self.clone();
        Arc::new(move |cx: CallContext<A>| {
            let next = Arc::clone(&next);
            let breaker = breaker.clone();
            Box::pin(async move {
                let key =
                    cx.backend.clone().unwrap_or_else(|| DEFAULT_BACKEND_KEY.to_string());
                let stats = breaker.statistics_for(&key);

                if stats.state() == CircuitState::Open {
                    warn!(%key, "rejecting call: circuit is open");
                    return Err(FaultError::CircuitBreaker { key, causes: vec![] });
                }

                stats.inc_total();
                match next(cx).await {
                    Ok(value) => {
                        if stats.state() == CircuitState::HalfOpen {
                            breaker.transit_to_closed(&stats);
                        }
                        Ok(value)
                    }
                    Err(err) => {
                        debug!(%key, error = %err, "call failed under circuit breaker");
                        stats.inc_fail();
                        if breaker.exceeds_threshold(&stats) {
                            breaker.transit_to_open(&key, &stats);
                            // The failure that tripped the breaker is
                            // dropped; only the trip itself surfaces.
                            return Err(FaultError::CircuitBreaker { key, causes: vec![] });
                        }
                        Err(err)
                    }
                }
            })
        })
    }
}
