//! Timeout and error mapper.
//!
//! # Responsibilities
//! - Apply the uniform call deadline
//! - Consult the circuit breaker before touching the transport
//! - Translate every transport failure into the external taxonomy
//!
//! # Failure mapping
//! ```text
//! EntityLookup  ─┐                      ┌─→ ServiceUnavailable (503)
//!                ├─ timeout / transport ┤
//! CustomRouted  ─┘   / circuit open     └─→ ProcessingError (500)
//! ```
//! The two shapes map to different statuses.

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::gateway::error::GatewayError;
use crate::observability::metrics;
use crate::resilience::CircuitBreaker;
use crate::rpc::dispatcher::Dispatcher;
use crate::rpc::packet::Pattern;
use crate::transport::TransportError;

/// Routed pattern answered locally with a fixed failure payload.
pub const UNKNOWN_PATTERN: &str = "unknown_pattern";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallShape {
    /// Fetch one entity by id.
    EntityLookup,
    /// Caller-supplied pattern and payload.
    CustomRouted,
}

impl CallShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallShape::EntityLookup => "entity_lookup",
            CallShape::CustomRouted => "custom_routed",
        }
    }

    /// The external error every failure of this shape becomes.
    pub fn failure(&self) -> GatewayError {
        match self {
            CallShape::EntityLookup => GatewayError::ServiceUnavailable,
            CallShape::CustomRouted => GatewayError::ProcessingError,
        }
    }
}

/// Outcome of a routed message.
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    /// Value produced by the backend or a fixture.
    Reply(Value),
    /// Fixed failure payload; rendered with the status it carries.
    Rejected(Value),
}

#[derive(Clone)]
pub struct CallMapper {
    dispatcher: Dispatcher,
    breaker: Arc<CircuitBreaker>,
    deadline: Duration,
}

impl CallMapper {
    pub fn new(dispatcher: Dispatcher, breaker: Arc<CircuitBreaker>, deadline: Duration) -> Self {
        Self {
            dispatcher,
            breaker,
            deadline,
        }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Issue one call and map its outcome for `shape`.
    pub async fn call(
        &self,
        shape: CallShape,
        pattern: &Pattern,
        data: Value,
    ) -> Result<Value, GatewayError> {
        let start = Instant::now();

        if self.breaker.try_acquire().is_err() {
            tracing::warn!(
                shape = shape.as_str(),
                pattern = %pattern,
                "Circuit open, failing fast"
            );
            metrics::record_call(shape.as_str(), "circuit_open", start);
            return Err(shape.failure());
        }

        match self.dispatcher.call(pattern, data, self.deadline).await {
            Ok(value) => {
                self.breaker.record_success();
                metrics::record_call(shape.as_str(), "ok", start);
                Ok(value)
            }
            Err(e) => {
                self.account(&e);
                metrics::record_call(shape.as_str(), outcome_label(&e), start);
                tracing::error!(
                    shape = shape.as_str(),
                    pattern = %pattern,
                    error = %e,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Backend call failed"
                );
                Err(shape.failure())
            }
        }
    }

    /// Route a caller-supplied pattern.
    pub async fn route(&self, pattern: &str, data: Value) -> Result<Routed, GatewayError> {
        if pattern == UNKNOWN_PATTERN {
            tracing::info!(pattern = %pattern, "Answering reserved pattern locally");
            metrics::record_short_circuit("unknown_pattern");
            return Ok(Routed::Rejected(json!({
                "error": "Processing Error",
                "statusCode": 500,
            })));
        }

        self.call(CallShape::CustomRouted, &Pattern::topic(pattern), data)
            .await
            .map(Routed::Reply)
    }

    fn account(&self, error: &TransportError) {
        if error.trips_breaker() {
            self.breaker.record_failure();
        } else if !matches!(error, TransportError::NotConnected) {
            // The backend answered, so it is alive.
            self.breaker.record_success();
        }
    }
}

fn outcome_label(error: &TransportError) -> &'static str {
    match error {
        TransportError::Timeout(_) => "timeout",
        TransportError::NotConnected => "not_connected",
        TransportError::ConnectionClosed => "connection_closed",
        TransportError::Remote(_) | TransportError::EmptyResponse => "remote_error",
        _ => "transport_error",
    }
}

impl std::fmt::Debug for CallMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallMapper")
            .field("deadline", &self.deadline)
            .field("breaker", &self.breaker)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::CircuitState;
    use crate::transport::MemoryTransport;

    fn mapper_over(transport: Arc<MemoryTransport>, threshold: u32) -> CallMapper {
        CallMapper::new(
            Dispatcher::new(transport),
            Arc::new(CircuitBreaker::with_recovery(threshold, Duration::from_secs(30))),
            Duration::from_millis(5000),
        )
    }

    #[tokio::test]
    async fn test_success_passes_value_through() {
        let transport = Arc::new(MemoryTransport::with_responder(|_, data| Ok(data.clone())));
        let mapper = mapper_over(transport, 5);

        let value = mapper
            .call(
                CallShape::EntityLookup,
                &Pattern::command("get_user_by_id"),
                json!({"userId": "7"}),
            )
            .await
            .unwrap();
        assert_eq!(value, json!({"userId": "7"}));
    }

    #[tokio::test]
    async fn test_failure_maps_by_shape() {
        let transport = Arc::new(MemoryTransport::disconnected());
        let mapper = mapper_over(transport, 5);

        let lookup = mapper
            .call(CallShape::EntityLookup, &Pattern::command("get_user_by_id"), json!({}))
            .await;
        assert_eq!(lookup, Err(GatewayError::ServiceUnavailable));

        let routed = mapper.route("anything", json!({})).await;
        assert_eq!(routed, Err(GatewayError::ProcessingError));
    }

    #[tokio::test]
    async fn test_remote_error_maps_by_shape() {
        let transport = Arc::new(MemoryTransport::with_responder(|_, _| {
            Err(TransportError::Remote("boom".into()))
        }));
        let mapper = mapper_over(transport, 1);

        assert_eq!(
            mapper.route("explode", json!({})).await,
            Err(GatewayError::ProcessingError)
        );
        assert_eq!(mapper.breaker().state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_maps_to_service_unavailable() {
        let transport = Arc::new(MemoryTransport::unresponsive());
        let mapper = mapper_over(transport, 5);

        let start = tokio::time::Instant::now();
        let result = mapper
            .call(
                CallShape::EntityLookup,
                &Pattern::command("get_user_by_id"),
                json!({"userId": "2"}),
            )
            .await;

        assert_eq!(result, Err(GatewayError::ServiceUnavailable));
        assert!(start.elapsed() >= Duration::from_millis(5000));
        assert!(start.elapsed() < Duration::from_millis(5100));
    }

    #[tokio::test]
    async fn test_unknown_pattern_never_touches_transport() {
        let transport = Arc::new(MemoryTransport::new());
        let mapper = mapper_over(transport.clone(), 5);

        let routed = mapper.route(UNKNOWN_PATTERN, json!({"a": 1})).await.unwrap();
        assert_eq!(
            routed,
            Routed::Rejected(json!({"error": "Processing Error", "statusCode": 500}))
        );
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_open_circuit_skips_transport() {
        let transport = Arc::new(MemoryTransport::with_responder(|_, _| {
            Err(TransportError::ConnectionClosed)
        }));
        let mapper = mapper_over(transport.clone(), 2);

        for _ in 0..2 {
            let _ = mapper.route("flaky", json!({})).await;
        }
        assert_eq!(mapper.breaker().state(), CircuitState::Open);
        assert_eq!(transport.call_count(), 2);

        let lookup = mapper
            .call(CallShape::EntityLookup, &Pattern::command("get_user_by_id"), json!({}))
            .await;
        assert_eq!(lookup, Err(GatewayError::ServiceUnavailable));
        assert_eq!(transport.call_count(), 2);
    }
}
