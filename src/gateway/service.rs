//! Gateway operations behind the HTTP endpoints.
//!
//! Each operation first consults the fixture layer, then hands the call to
//! the mapper on a task of its own. The HTTP handler awaits that task, but
//! dropping the handler (client went away) does not cancel the backend call.

use serde::Serialize;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;

use crate::clock::iso_timestamp;
use crate::config::GatewayConfig;
use crate::gateway::error::GatewayError;
use crate::gateway::fixtures::Fixtures;
use crate::gateway::mapper::{CallMapper, CallShape, Routed};
use crate::net::connection::ConnectionState;
use crate::net::manager::ConnectionManager;
use crate::observability::metrics;
use crate::resilience::CircuitBreaker;
use crate::rpc::dispatcher::Dispatcher;
use crate::rpc::packet::Pattern;
use crate::transport::Transport;

/// Backend command for entity lookups.
pub const GET_USER_BY_ID_CMD: &str = "get_user_by_id";

/// Event name used for every dispatched event.
pub const USER_EVENT: &str = "user_event";

/// Acknowledgement returned for a dispatched event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventReceipt {
    pub success: bool,
    pub message: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendHealth {
    pub connected: bool,
    pub state: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub backend: BackendHealth,
    pub circuit: &'static str,
}

pub struct GatewayService {
    mapper: CallMapper,
    dispatcher: Dispatcher,
    fixtures: Fixtures,
    manager: Option<Arc<ConnectionManager>>,
}

impl GatewayService {
    pub fn new(transport: Arc<dyn Transport>, config: &GatewayConfig) -> Self {
        let dispatcher = Dispatcher::new(transport);
        let breaker = Arc::new(CircuitBreaker::new(&config.circuit_breaker));
        Self {
            mapper: CallMapper::new(dispatcher.clone(), breaker, config.timeouts.call_deadline()),
            dispatcher,
            fixtures: Fixtures::new(&config.fixtures),
            manager: None,
        }
    }

    /// Attach the connection manager so health reports its state.
    pub fn with_manager(mut self, manager: Arc<ConnectionManager>) -> Self {
        self.manager = Some(manager);
        self
    }

    pub fn mapper(&self) -> &CallMapper {
        &self.mapper
    }

    /// Look up one user by id.
    pub async fn get_user(&self, id: &str) -> Result<Value, GatewayError> {
        tracing::info!(user_id = %id, "Request for user");

        if let Some(user) = self.fixtures.user(id) {
            tracing::info!(user_id = %id, "Returning fixture user");
            metrics::record_short_circuit("fixture");
            return Ok(user);
        }

        let mapper = self.mapper.clone();
        let data = json!({ "userId": id });
        detached(async move {
            mapper
                .call(CallShape::EntityLookup, &Pattern::command(GET_USER_BY_ID_CMD), data)
                .await
        })
        .await
    }

    /// Hand an event to the link without waiting for the backend.
    pub async fn dispatch_event(&self, data: Value) -> Result<EventReceipt, GatewayError> {
        tracing::info!(event = %data, "Emitting event");

        let dispatcher = self.dispatcher.clone();
        detached(async move {
            match dispatcher.emit(USER_EVENT, data).await {
                Ok(()) => {
                    metrics::record_event("dispatched");
                    Ok(EventReceipt {
                        success: true,
                        message: "Event dispatched".to_string(),
                        timestamp: iso_timestamp(),
                    })
                }
                Err(e) => {
                    metrics::record_event("rejected");
                    tracing::error!(error = %e, "Error emitting event");
                    Err(GatewayError::EventRejected)
                }
            }
        })
        .await
    }

    /// Route a validated message to the backend.
    pub async fn route_message(
        &self,
        pattern: String,
        data: Value,
    ) -> Result<Routed, GatewayError> {
        tracing::info!(pattern = %pattern, "Routing message");

        if let Some(reply) = self.fixtures.message(&pattern, &data) {
            tracing::info!(pattern = %pattern, "Returning fixture data");
            metrics::record_short_circuit("fixture");
            return Ok(Routed::Reply(reply));
        }

        let mapper = self.mapper.clone();
        detached(async move { mapper.route(&pattern, data).await }).await
    }

    pub fn health(&self) -> HealthReport {
        let state = match &self.manager {
            Some(manager) => manager.state(),
            None if self.dispatcher.is_connected() => ConnectionState::Connected,
            None => ConnectionState::Disconnected,
        };
        let connected = state == ConnectionState::Connected;

        HealthReport {
            status: if connected { "ok" } else { "degraded" },
            backend: BackendHealth {
                connected,
                state: state.as_str(),
            },
            circuit: self.mapper.breaker().state().as_str(),
        }
    }
}

impl std::fmt::Debug for GatewayService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayService")
            .field("mapper", &self.mapper)
            .field("fixtures", &self.fixtures)
            .finish()
    }
}

/// Run `fut` on its own task so dropping the caller does not cancel it.
async fn detached<F, T>(fut: F) -> Result<T, GatewayError>
where
    F: Future<Output = Result<T, GatewayError>> + Send + 'static,
    T: Send + 'static,
{
    match tokio::spawn(fut).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(error = %e, "Gateway task failed");
            Err(GatewayError::Internal)
        }
    }
}
