//! Gateway core.
//!
//! # Data Flow
//! ```text
//! HTTP handler
//!     → service.rs (one operation per endpoint)
//!     → fixtures.rs (deterministic short-circuit answers)
//!     → mapper.rs (deadline, circuit breaker, failure taxonomy)
//!     → rpc::Dispatcher → Transport
//! ```

pub mod error;
pub mod fixtures;
pub mod mapper;
pub mod service;

pub use error::GatewayError;
pub use fixtures::Fixtures;
pub use mapper::{CallMapper, CallShape, Routed, UNKNOWN_PATTERN};
pub use service::{EventReceipt, GatewayService, HealthReport};
