//! Inbound command-dispatch table.
//!
//! Backend-initiated requests arrive on the same link as our responses. The
//! link's read loop hands them here; the matching handler computes a reply
//! synchronously and the loop writes it back under the request's id.

use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;

use crate::observability::metrics;
use crate::rpc::packet::{Packet, Pattern};

/// Reply sent for requests nobody registered a handler for.
pub const NO_HANDLER_MESSAGE: &str =
    "There is no matching message handler defined in the remote service.";

/// A synchronous handler for backend-initiated messages.
pub trait MessageHandler: Send + Sync {
    fn handle(&self, data: Value) -> Value;
}

impl<F> MessageHandler for F
where
    F: Fn(Value) -> Value + Send + Sync,
{
    fn handle(&self, data: Value) -> Value {
        self(data)
    }
}

#[derive(Default)]
pub struct HandlerRegistry {
    handlers: DashMap<String, Arc<dyn MessageHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `pattern`, replacing any previous one.
    pub fn register(&self, pattern: &Pattern, handler: impl MessageHandler + 'static) {
        let key = pattern.to_wire();
        tracing::debug!(pattern = %key, "Registered inbound message handler");
        self.handlers.insert(key, Arc::new(handler));
    }

    pub fn contains(&self, pattern: &str) -> bool {
        self.handlers.contains_key(pattern)
    }

    fn lookup(&self, pattern: &str) -> Option<Arc<dyn MessageHandler>> {
        self.handlers.get(pattern).map(|h| Arc::clone(h.value()))
    }

    /// Build the reply packet for an inbound request.
    pub fn answer(&self, id: &str, pattern: &str, data: Value) -> Packet {
        match self.lookup(pattern) {
            Some(handler) => {
                metrics::record_inbound(pattern, "handled");
                Packet::reply(id, handler.handle(data))
            }
            None => {
                tracing::warn!(pattern = %pattern, "No handler for inbound request");
                metrics::record_inbound(pattern, "unhandled");
                Packet::error_reply(id, NO_HANDLER_MESSAGE)
            }
        }
    }

    /// Deliver an inbound event; the handler's result is discarded.
    pub fn deliver(&self, pattern: &str, data: Value) {
        match self.lookup(pattern) {
            Some(handler) => {
                metrics::record_inbound(pattern, "handled");
                let _ = handler.handle(data);
            }
            None => {
                tracing::debug!(pattern = %pattern, "Ignoring inbound event without handler");
                metrics::record_inbound(pattern, "unhandled");
            }
        }
    }
}
