//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Reverse handlers → Connection manager → Initial connect
//!     → Reconnect supervisor → Gateway service → HTTP server
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain HTTP → Stop supervisor
//!     → Close backend link → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - A failed initial connect is logged, never fatal
//! - Listener binds last, so traffic only arrives once the service exists

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
pub use startup::{bootstrap, Gateway};
