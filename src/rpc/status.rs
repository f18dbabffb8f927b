//! Reverse handler for backend status queries.

use serde_json::{json, Value};

use crate::clock::iso_timestamp;
use crate::rpc::handlers::{HandlerRegistry, MessageHandler};
use crate::rpc::packet::Pattern;

/// Command the backend uses to ask whether the gateway is alive.
pub const GATEWAY_STATUS_CMD: &str = "gateway_status";

/// Answers `{cmd: "gateway_status"}` with the gateway's liveness.
#[derive(Debug, Clone, Copy, Default)]
pub struct GatewayStatus;

impl MessageHandler for GatewayStatus {
    fn handle(&self, data: Value) -> Value {
        tracing::info!(request_data = %data, "Received status request from backend");
        json!({
            "status": "active",
            "timestamp": iso_timestamp(),
            "requestData": data,
        })
    }
}

/// Install every reverse handler the gateway serves.
pub fn register_reverse_handlers(registry: &HandlerRegistry) {
    registry.register(&Pattern::command(GATEWAY_STATUS_CMD), GatewayStatus);
}
