//! Per-dependency circuit breaker
//!
//! ```text
//! CLOSED --(failures >= threshold)--> OPEN --(cooldown elapsed, seen by is_open)--> HALF_OPEN
//! HALF_OPEN --(record_success)--> CLOSED
//! HALF_OPEN --(record_failure, failures >= threshold)--> OPEN
//! ```
//!
//! Every caller is admitted while HALF_OPEN; the first recorded outcome flips
//! the state for everyone.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

use crate::metrics::resilience::{CIRCUIT_BREAKER_STATE, CIRCUIT_BREAKER_TRANSITIONS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }

    const fn gauge_value(self) -> i64 {
        match self {
            Self::Closed => 0,
            Self::Open => 1,
            Self::HalfOpen => 2,
        }
    }
}

/// Read-only snapshot returned by [`CircuitBreaker::stats`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerStats {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub threshold: u32,
    pub cooldown_ms: u64,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub time_since_last_failure_ms: Option<u64>,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    last_failure_at: Option<DateTime<Utc>>,
}

impl BreakerState {
    const fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure: None,
            last_failure_at: None,
        }
    }
}

/// Failure-tracking guard for one downstream dependency.
///
/// All mutations happen under a single lock, so concurrent readers observe
/// either the state before or after a transition.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    threshold: u32,
    cooldown: Duration,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a closed breaker. A threshold of 0 is treated as 1.
    pub fn new(name: impl Into<String>, threshold: u32, cooldown: Duration) -> Self {
        let breaker = Self {
            name: name.into(),
            threshold: threshold.max(1),
            cooldown,
            inner: Mutex::new(BreakerState::closed()),
        };
        breaker.publish(CircuitState::Closed);
        breaker
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether calls must skip the dependency right now.
    ///
    /// An OPEN breaker whose cooldown has elapsed moves to HALF_OPEN here and
    /// lets the caller through.
    pub fn is_open(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != CircuitState::Open {
            return false;
        }

        let cooled_down = inner
            .last_failure
            .is_none_or(|last| last.elapsed() > self.cooldown);
        if !cooled_down {
            return true;
        }

        inner.state = CircuitState::HalfOpen;
        drop(inner);
        tracing::info!(dependency = %self.name, "Circuit breaker half-open, allowing probe");
        self.publish(CircuitState::HalfOpen);
        false
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.failure_count = 0;
        if inner.state != CircuitState::HalfOpen {
            return;
        }

        inner.state = CircuitState::Closed;
        drop(inner);
        tracing::info!(dependency = %self.name, "Circuit breaker closed after successful probe");
        self.publish(CircuitState::Closed);
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure = Some(Instant::now());
        inner.last_failure_at = Some(Utc::now());

        if inner.failure_count < self.threshold || inner.state == CircuitState::Open {
            return;
        }

        let failure_count = inner.failure_count;
        inner.state = CircuitState::Open;
        drop(inner);
        tracing::warn!(
            dependency = %self.name,
            failure_count,
            threshold = self.threshold,
            cooldown_secs = self.cooldown.as_secs(),
            "Circuit breaker opened"
        );
        self.publish(CircuitState::Open);
    }

    /// Administrative reset to CLOSED with no recorded failures
    pub fn reset(&self) {
        *self.inner.lock() = BreakerState::closed();
        tracing::info!(dependency = %self.name, "Circuit breaker reset");
        self.publish(CircuitState::Closed);
    }

    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Snapshot without side effects (never moves OPEN to HALF_OPEN)
    #[must_use]
    pub fn stats(&self) -> CircuitBreakerStats {
        let inner = self.inner.lock();
        CircuitBreakerStats {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            threshold: self.threshold,
            cooldown_ms: duration_ms(self.cooldown),
            last_failure_at: inner.last_failure_at,
            time_since_last_failure_ms: inner.last_failure.map(|last| duration_ms(last.elapsed())),
        }
    }

    fn publish(&self, state: CircuitState) {
        CIRCUIT_BREAKER_STATE
            .with_label_values(&[self.name.as_str()])
            .set(state.gauge_value());
        CIRCUIT_BREAKER_TRANSITIONS
            .with_label_values(&[self.name.as_str(), state.as_str()])
            .inc();
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
