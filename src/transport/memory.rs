//! In-process transport.
//!
//! Stands in for the backend in tests and local runs: answers calls from a
//! programmable responder, records events, and counts every call that
//! reached it so callers can prove a path never touched the transport.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::rpc::packet::Pattern;
use crate::transport::{Transport, TransportError};

type Responder = Arc<dyn Fn(&Pattern, &Value) -> Result<Value, TransportError> + Send + Sync>;

#[derive(Clone)]
enum Behavior {
    Respond(Responder),
    /// Accept calls and never answer them.
    Hang,
}

pub struct MemoryTransport {
    behavior: Behavior,
    connected: AtomicBool,
    calls: AtomicUsize,
    sent: Mutex<Vec<(String, Value)>>,
    events: Mutex<Vec<(String, Value)>>,
}

impl MemoryTransport {
    /// Connected transport answering every call with a generic envelope
    /// echoing the pattern and payload.
    pub fn new() -> Self {
        Self::with_responder(|pattern, data| {
            Ok(json!({
                "success": true,
                "message": "Mock response",
                "pattern": pattern.to_wire(),
                "data": data,
            }))
        })
    }

    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&Pattern, &Value) -> Result<Value, TransportError> + Send + Sync + 'static,
    {
        Self::build(Behavior::Respond(Arc::new(responder)), true)
    }

    /// Connected transport whose calls never complete.
    pub fn unresponsive() -> Self {
        Self::build(Behavior::Hang, true)
    }

    /// Transport with no link; calls and events fail with `NotConnected`.
    pub fn disconnected() -> Self {
        let transport = Self::new();
        transport.set_connected(false);
        transport
    }

    fn build(behavior: Behavior, connected: bool) -> Self {
        Self {
            behavior,
            connected: AtomicBool::new(connected),
            calls: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Number of calls that reached the transport, including failed ones.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls seen so far as `(wire pattern, payload)`.
    pub fn sent(&self) -> Vec<(String, Value)> {
        self.sent.lock().expect("memory transport mutex poisoned").clone()
    }

    /// Events accepted so far.
    pub fn emitted(&self) -> Vec<(String, Value)> {
        self.events.lock().expect("memory transport mutex poisoned").clone()
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, pattern: &Pattern, data: Value) -> Result<Value, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sent
            .lock()
            .expect("memory transport mutex poisoned")
            .push((pattern.to_wire(), data.clone()));

        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        match self.behavior.clone() {
            Behavior::Respond(responder) => responder(pattern, &data),
            Behavior::Hang => std::future::pending().await,
        }
    }

    async fn emit(&self, event: &str, data: Value) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        self.events
            .lock()
            .expect("memory transport mutex poisoned")
            .push((event.to_string(), data));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("connected", &self.is_connected())
            .field("calls", &self.call_count())
            .finish()
    }
}
