//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to backend:
//!     → circuit_breaker.rs (fail fast while the backend is known bad)
//!     → timeouts.rs (enforce the call deadline)
//!     → outcome fed back into circuit_breaker.rs
//!
//! Link loss:
//!     → backoff.rs (jittered delay between reconnect attempts)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every backend call has a deadline
//! - Calls are never retried; a failed call is reported exactly once
//! - Reconnection, not retry, is where backoff applies

pub mod backoff;
pub mod circuit_breaker;
pub mod timeouts;

pub use backoff::{calculate_backoff, Backoff};
pub use circuit_breaker::{CircuitBreaker, CircuitOpen, CircuitState};
pub use timeouts::{with_deadline, DeadlineExceeded};
