//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: backend assumed down, calls fail fast
//! - Half-Open: testing if backend recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= threshold
//! Open → Half-Open: after recovery timeout
//! Half-Open → Closed: probe call succeeds
//! Half-Open → Open: probe call fails
//! ```
//!
//! # Design Decisions
//! - One breaker for the single backend link
//! - Fail fast in Open state (no waiting for the call deadline)
//! - Single probe in Half-Open (prevents hammering recovering backend)

use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::config::CircuitBreakerConfig;

/// Breaker state as observed by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Returned when the breaker refuses a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("circuit open")]
pub struct CircuitOpen;

struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    probe_started: Option<Instant>,
}

pub struct CircuitBreaker {
    enabled: bool,
    failure_threshold: u32,
    recovery: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(config: &CircuitBreakerConfig) -> Self {
        let mut breaker = Self::with_recovery(config.failure_threshold, config.recovery());
        breaker.enabled = config.enabled;
        breaker
    }

    /// Build an enabled breaker with an explicit recovery window.
    pub fn with_recovery(failure_threshold: u32, recovery: Duration) -> Self {
        Self {
            enabled: true,
            failure_threshold: failure_threshold.max(1),
            recovery,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                probe_started: None,
            }),
        }
    }

    /// Ask permission to issue a call.
    ///
    /// In Half-Open only one probe is admitted per recovery window.
    pub fn try_acquire(&self) -> Result<(), CircuitOpen> {
        if !self.enabled {
            return Ok(());
        }

        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        let now = Instant::now();
        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let elapsed = inner.opened_at.map_or(self.recovery, |t| now.duration_since(t));
                if elapsed >= self.recovery {
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_started = Some(now);
                    tracing::info!("Circuit half-open, admitting probe call");
                    Ok(())
                } else {
                    Err(CircuitOpen)
                }
            }
            CircuitState::HalfOpen => {
                // A probe that never reported back must not wedge the breaker.
                let stale = inner
                    .probe_started
                    .map_or(true, |t| now.duration_since(t) >= self.recovery);
                if stale {
                    inner.probe_started = Some(now);
                    Ok(())
                } else {
                    Err(CircuitOpen)
                }
            }
        }
    }

    /// Report a call that reached the backend and got an answer.
    pub fn record_success(&self) {
        if !self.enabled {
            return;
        }

        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        if inner.state != CircuitState::Closed {
            tracing::info!(previous = inner.state.as_str(), "Circuit closed");
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.probe_started = None;
    }

    /// Report a call that failed at the transport level.
    pub fn record_failure(&self) {
        if !self.enabled {
            return;
        }

        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);

        let trip = match inner.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => inner.consecutive_failures >= self.failure_threshold,
            CircuitState::Open => false,
        };

        if trip {
            tracing::warn!(
                consecutive_failures = inner.consecutive_failures,
                recovery_ms = self.recovery.as_millis() as u64,
                "Circuit opened"
            );
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
            inner.probe_started = None;
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().expect("circuit breaker mutex poisoned").state
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("enabled", &self.enabled)
            .field("failure_threshold", &self.failure_threshold)
            .field("recovery", &self.recovery)
            .field("state", &self.state())
            .finish()
    }
}
