//! Error rendering.
//!
//! Every failure leaves the gateway as JSON with `statusCode` and `message`.
//! Client errors add `error: "Bad Request"`. Diagnostic detail stays in the
//! logs.

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use crate::gateway::GatewayError;

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = match &self {
            GatewayError::Validation(messages) => json!({
                "statusCode": status.as_u16(),
                "message": messages,
                "error": "Bad Request",
            }),
            GatewayError::BadRequest(reason) => json!({
                "statusCode": status.as_u16(),
                "message": reason,
                "error": "Bad Request",
            }),
            other => json!({
                "statusCode": status.as_u16(),
                "message": other.message(),
            }),
        };
        (status, Json(body)).into_response()
    }
}

/// Render a fixed failure payload `{error, statusCode}` with the status it
/// names, echoing `error` as the message.
pub fn rejected(payload: Value) -> Response {
    let code = payload
        .get("statusCode")
        .and_then(Value::as_u64)
        .and_then(|c| u16::try_from(c).ok())
        .and_then(|c| StatusCode::from_u16(c).ok())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let message = payload
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("Internal Server Error")
        .to_string();

    let mut body = payload;
    if let Value::Object(map) = &mut body {
        map.insert("statusCode".into(), json!(code.as_u16()));
        map.insert("message".into(), json!(message));
    }
    (code, Json(body)).into_response()
}

/// Response for a handler that panicked.
pub fn panic_response(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "Handler panicked");
    GatewayError::Internal.into_response()
}

/// Rewrite error responses produced outside the handlers (body limit,
/// request timeout, unmatched routes) as `{statusCode, message}` JSON.
///
/// Responses that already carry a JSON body pass through untouched.
pub async fn structured_errors(response: Response) -> Response {
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) || is_json(&response) {
        return response;
    }

    let body = json!({
        "statusCode": status.as_u16(),
        "message": status.canonical_reason().unwrap_or("Error"),
    });
    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    Response::from_parts(parts, Body::from(body.to_string()))
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"))
}
