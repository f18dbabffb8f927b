//! Endpoint handlers.
//!
//! Thin adapters: extract, validate, call the gateway, render. Each one
//! records its own request metric.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

use crate::gateway::{GatewayError, GatewayService, Routed};
use crate::http::request::{json_body, MessageRequest};
use crate::http::response::rejected;
use crate::observability::metrics;

pub type AppState = Arc<GatewayService>;

/// `GET /gateway/users/{id}`
pub async fn get_user(State(gateway): State<AppState>, Path(id): Path<String>) -> Response {
    let start = Instant::now();
    let response = match gateway.get_user(&id).await {
        Ok(user) => Json(user).into_response(),
        Err(e) => e.into_response(),
    };
    metrics::record_request("get_user", response.status().as_u16(), start);
    response
}

/// `POST /gateway/events`
pub async fn emit_event(
    State(gateway): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let start = Instant::now();
    let response = match event_payload(body) {
        Ok(data) => match gateway.dispatch_event(data).await {
            Ok(receipt) => (StatusCode::CREATED, Json(receipt)).into_response(),
            Err(e) => e.into_response(),
        },
        Err(e) => e.into_response(),
    };
    metrics::record_request("emit_event", response.status().as_u16(), start);
    response
}

fn event_payload(body: Result<Json<Value>, JsonRejection>) -> Result<Value, GatewayError> {
    let data = json_body(body)?;
    if !data.is_object() {
        return Err(GatewayError::BadRequest("event payload must be a JSON object".into()));
    }
    Ok(data)
}

/// `POST /gateway/message`
pub async fn route_message(
    State(gateway): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let start = Instant::now();
    let response = match json_body(body).and_then(|b| MessageRequest::from_body(&b)) {
        Ok(message) => match gateway.route_message(message.pattern, message.data).await {
            Ok(Routed::Reply(value)) => Json(value).into_response(),
            Ok(Routed::Rejected(payload)) => rejected(payload),
            Err(e) => e.into_response(),
        },
        Err(e) => {
            tracing::debug!(error = %e, "Rejected invalid message");
            e.into_response()
        }
    };
    metrics::record_request("route_message", response.status().as_u16(), start);
    response
}

/// `GET /health`
pub async fn health(State(gateway): State<AppState>) -> Response {
    Json(gateway.health()).into_response()
}
