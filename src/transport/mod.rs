//! Transport abstraction layer.
//!
//! # Data Flow
//! ```text
//! Dispatcher
//!     → Transport::send / Transport::emit
//!         → tcp.rs (production: live link owned by the ConnectionManager)
//!         → memory.rs (in-process fake for tests and local development)
//! ```
//!
//! # Design Decisions
//! - The dispatcher depends on the trait, never on sockets
//! - Correlating responses to callers is the transport's job
//! - Transport errors stop at the mapper; HTTP never sees them

pub mod memory;
pub mod tcp;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::net::codec::CodecError;
use crate::resilience::DeadlineExceeded;
use crate::rpc::packet::Pattern;

pub use memory::MemoryTransport;
pub use tcp::TcpTransport;

/// Errors raised below the mapper.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No live link to the backend.
    #[error("not connected to backend")]
    NotConnected,

    /// The link dropped while the call was in flight.
    #[error("connection closed")]
    ConnectionClosed,

    /// The writer is not draining; the outbound queue has no room.
    #[error("outbound queue full")]
    QueueFull,

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connecting to {0} timed out")]
    ConnectTimeout(String),

    #[error("framing error: {0}")]
    Codec(#[from] CodecError),

    #[error("request timed out: {0}")]
    Timeout(#[from] DeadlineExceeded),

    /// The backend answered with an error.
    #[error("backend error: {0}")]
    Remote(String),

    /// The backend completed the call without a value.
    #[error("backend completed without a response")]
    EmptyResponse,
}

impl TransportError {
    /// Whether the failure counts against the circuit breaker.
    ///
    /// A missing link is already visible through `is_connected`, and remote
    /// errors prove the backend is alive, so neither trips the breaker.
    pub fn trips_breaker(&self) -> bool {
        !matches!(
            self,
            TransportError::NotConnected
                | TransportError::Remote(_)
                | TransportError::EmptyResponse
        )
    }
}

/// Outbound half of the RPC channel.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and wait for its correlated response.
    async fn send(&self, pattern: &Pattern, data: Value) -> Result<Value, TransportError>;

    /// Hand an event to the link without waiting for any reply.
    async fn emit(&self, event: &str, data: Value) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;
}
