//! Outbound correlation table.
//!
//! # Responsibilities
//! - Mint a correlation id per outbound call
//! - Route response packets to the waiting caller
//! - Drop entries whose caller gave up (deadline), so late replies vanish
//! - Fail every waiter when the link goes away

use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::rpc::packet::Packet;
use crate::transport::TransportError;

type Reply = Result<Value, TransportError>;

struct Inflight {
    tx: oneshot::Sender<Reply>,
    /// Last value of a streamed response, delivered on disposal.
    last: Option<Value>,
}

/// Calls awaiting a response on one link.
#[derive(Default)]
pub struct CorrelationTable {
    inflight: DashMap<String, Inflight>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new call and return the handle its caller waits on.
    pub fn register(self: &Arc<Self>) -> PendingCall {
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.inflight.insert(id.clone(), Inflight { tx, last: None });
        PendingCall {
            id,
            rx,
            table: Arc::clone(self),
        }
    }

    /// Route a response packet to its caller.
    pub fn resolve(&self, packet: Packet) {
        let Some(id) = packet.id.clone() else {
            return;
        };
        let id = id.as_str();

        if let Some(err) = packet.err {
            match self.inflight.remove(id) {
                Some((_, entry)) => {
                    let _ = entry.tx.send(Err(TransportError::Remote(describe_error(&err))));
                }
                None => tracing::debug!(correlation_id = %id, "Discarding late error response"),
            }
            return;
        }

        if packet.is_final() {
            match self.inflight.remove(id) {
                Some((_, entry)) => {
                    let reply = packet
                        .response
                        .or(entry.last)
                        .ok_or(TransportError::EmptyResponse);
                    let _ = entry.tx.send(reply);
                }
                None => tracing::debug!(correlation_id = %id, "Discarding late response"),
            }
        } else if let Some(mut entry) = self.inflight.get_mut(id) {
            if packet.response.is_some() {
                entry.last = packet.response;
            }
        }
    }

    /// Fail one waiting call, e.g. when its request could not be written.
    pub fn fail(&self, id: &str, error: TransportError) {
        if let Some((_, entry)) = self.inflight.remove(id) {
            let _ = entry.tx.send(Err(error));
        }
    }

    /// Fail every waiting call; used when the link is lost.
    pub fn fail_all(&self) -> usize {
        let ids: Vec<String> = self.inflight.iter().map(|e| e.key().clone()).collect();
        let mut failed = 0;
        for id in ids {
            if let Some((_, entry)) = self.inflight.remove(&id) {
                let _ = entry.tx.send(Err(TransportError::ConnectionClosed));
                failed += 1;
            }
        }
        failed
    }

    pub fn len(&self) -> usize {
        self.inflight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inflight.is_empty()
    }

    fn forget(&self, id: &str) {
        self.inflight.remove(id);
    }
}

fn describe_error(err: &Value) -> String {
    match err {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string()),
        other => other.to_string(),
    }
}

/// A registered call. Dropping it removes the table entry.
pub struct PendingCall {
    id: String,
    rx: oneshot::Receiver<Reply>,
    table: Arc<CorrelationTable>,
}

impl PendingCall {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the correlated reply.
    pub async fn wait(mut self) -> Reply {
        (&mut self.rx)
            .await
            .unwrap_or(Err(TransportError::ConnectionClosed))
    }
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        self.table.forget(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(id: &str, value: Value) -> Packet {
        Packet::reply(id, value)
    }

    #[tokio::test]
    async fn test_resolves_matching_call() {
        let table = Arc::new(CorrelationTable::new());
        let pending = table.register();
        let id = pending.id().to_string();

        table.resolve(response(&id, json!({"id": 2})));
        assert_eq!(pending.wait().await.unwrap(), json!({"id": 2}));
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_out_of_order_completion() {
        let table = Arc::new(CorrelationTable::new());
        let first = table.register();
        let second = table.register();
        let (first_id, second_id) = (first.id().to_string(), second.id().to_string());

        table.resolve(response(&second_id, json!("second")));
        table.resolve(response(&first_id, json!("first")));

        assert_eq!(second.wait().await.unwrap(), json!("second"));
        assert_eq!(first.wait().await.unwrap(), json!("first"));
    }

    #[tokio::test]
    async fn test_dropped_call_discards_late_reply() {
        let table = Arc::new(CorrelationTable::new());
        let pending = table.register();
        let id = pending.id().to_string();
        drop(pending);

        assert!(table.is_empty());
        table.resolve(response(&id, json!(1)));
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_streamed_response_keeps_last_value() {
        let table = Arc::new(CorrelationTable::new());
        let pending = table.register();
        let id = pending.id().to_string();

        for n in 1..=3 {
            table.resolve(Packet {
                id: Some(id.clone()),
                response: Some(json!(n)),
                is_disposed: Some(false),
                ..Default::default()
            });
        }
        table.resolve(Packet {
            id: Some(id.clone()),
            is_disposed: Some(true),
            ..Default::default()
        });

        assert_eq!(pending.wait().await.unwrap(), json!(3));
    }

    #[tokio::test]
    async fn test_disposal_without_value_is_empty() {
        let table = Arc::new(CorrelationTable::new());
        let pending = table.register();
        table.resolve(Packet {
            id: Some(pending.id().to_string()),
            is_disposed: Some(true),
            ..Default::default()
        });
        assert!(matches!(pending.wait().await, Err(TransportError::EmptyResponse)));
    }

    #[tokio::test]
    async fn test_remote_error() {
        let table = Arc::new(CorrelationTable::new());
        let pending = table.register();
        table.resolve(Packet {
            id: Some(pending.id().to_string()),
            err: Some(json!({"message": "user not found", "status": "error"})),
            ..Default::default()
        });

        match pending.wait().await {
            Err(TransportError::Remote(msg)) => assert_eq!(msg, "user not found"),
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fail_all() {
        let table = Arc::new(CorrelationTable::new());
        let a = table.register();
        let b = table.register();

        assert_eq!(table.fail_all(), 2);
        assert!(matches!(a.wait().await, Err(TransportError::ConnectionClosed)));
        assert!(matches!(b.wait().await, Err(TransportError::ConnectionClosed)));
    }
}
