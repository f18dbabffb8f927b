//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): HTTP requests by endpoint, status
//! - `gateway_request_duration_seconds` (histogram): HTTP latency by endpoint
//! - `gateway_backend_calls_total` (counter): mapper calls by shape, outcome
//! - `gateway_backend_call_duration_seconds` (histogram): backend round trips
//! - `gateway_short_circuits_total` (counter): calls answered without the backend
//! - `gateway_events_total` (counter): emitted events by outcome
//! - `gateway_inbound_requests_total` (counter): backend-initiated requests
//! - `gateway_connect_attempts_total` (counter): dial attempts by outcome
//! - `gateway_backend_connected` (gauge): 1=link up, 0=down
//!
//! # Design Decisions
//! - Exporter is optional; without it every call below is a no-op
//! - Labels are low-cardinality: never ids or free-form patterns

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

use crate::net::connection::ConnectionState;

pub const REQUESTS_TOTAL: &str = "gateway_requests_total";
pub const REQUEST_DURATION_SECONDS: &str = "gateway_request_duration_seconds";
pub const BACKEND_CALLS_TOTAL: &str = "gateway_backend_calls_total";
pub const BACKEND_CALL_DURATION_SECONDS: &str = "gateway_backend_call_duration_seconds";
pub const SHORT_CIRCUITS_TOTAL: &str = "gateway_short_circuits_total";
pub const EVENTS_TOTAL: &str = "gateway_events_total";
pub const INBOUND_REQUESTS_TOTAL: &str = "gateway_inbound_requests_total";
pub const CONNECT_ATTEMPTS_TOTAL: &str = "gateway_connect_attempts_total";
pub const BACKEND_CONNECTED: &str = "gateway_backend_connected";

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter")
        }
    }
}

/// Record one finished HTTP request.
pub fn record_request(endpoint: &'static str, status: u16, start: Instant) {
    counter!(REQUESTS_TOTAL, "endpoint" => endpoint, "status" => status.to_string()).increment(1);
    histogram!(REQUEST_DURATION_SECONDS, "endpoint" => endpoint)
        .record(start.elapsed().as_secs_f64());
}

/// Record one call that went through the mapper to the backend.
pub fn record_call(shape: &'static str, outcome: &'static str, start: Instant) {
    counter!(BACKEND_CALLS_TOTAL, "shape" => shape, "outcome" => outcome).increment(1);
    histogram!(BACKEND_CALL_DURATION_SECONDS, "shape" => shape)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_short_circuit(reason: &'static str) {
    counter!(SHORT_CIRCUITS_TOTAL, "reason" => reason).increment(1);
}

pub fn record_event(outcome: &'static str) {
    counter!(EVENTS_TOTAL, "outcome" => outcome).increment(1);
}

/// Record a backend-initiated request. Only registered patterns are used as
/// labels; anything else is folded into `other`.
pub fn record_inbound(pattern: &str, outcome: &'static str) {
    let pattern = if outcome == "handled" { pattern.to_string() } else { "other".to_string() };
    counter!(INBOUND_REQUESTS_TOTAL, "pattern" => pattern, "outcome" => outcome).increment(1);
}

pub fn record_connect_attempt(outcome: &'static str) {
    counter!(CONNECT_ATTEMPTS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_connection_state(state: ConnectionState) {
    let up = if state == ConnectionState::Connected { 1.0 } else { 0.0 };
    gauge!(BACKEND_CONNECTED).set(up);
}
