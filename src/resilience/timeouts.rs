//! Deadline enforcement.
//!
//! # Responsibilities
//! - Wrap backend calls with a deadline
//! - Release the caller as soon as the deadline fires
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Deadline errors are a distinct type callers convert from

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// The deadline elapsed before the wrapped operation finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("deadline of {}ms exceeded", .0.as_millis())]
pub struct DeadlineExceeded(pub Duration);

/// Run `fut` to completion or until `deadline` elapses.
///
/// On expiry the inner future is dropped, which releases whatever it holds.
pub async fn with_deadline<F, T, E>(deadline: Duration, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<DeadlineExceeded>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(DeadlineExceeded(deadline).into()),
    }
}
