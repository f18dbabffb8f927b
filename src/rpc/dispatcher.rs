//! Request dispatcher.
//!
//! Issues request/response calls and fire-and-forget events over whatever
//! [`Transport`] it was built with. The dispatcher never reconnects or
//! closes anything; it only sends.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::resilience::with_deadline;
use crate::rpc::packet::Pattern;
use crate::transport::{Transport, TransportError};

#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Send a request and wait for its response, at most `deadline`.
    ///
    /// On expiry the correlation entry is dropped along with the send future,
    /// so a response arriving later is discarded.
    pub async fn call(
        &self,
        pattern: &Pattern,
        data: Value,
        deadline: Duration,
    ) -> Result<Value, TransportError> {
        tracing::debug!(
            pattern = %pattern,
            deadline_ms = deadline.as_millis() as u64,
            "Dispatching call"
        );
        with_deadline(deadline, self.transport.send(pattern, data)).await
    }

    /// Queue an event on the link. Returns once the transport accepted it.
    pub async fn emit(&self, event: &str, data: Value) -> Result<(), TransportError> {
        tracing::debug!(event = %event, "Emitting event");
        self.transport.emit(event, data).await
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("connected", &self.transport.is_connected())
            .finish()
    }
}
