//! Request extraction and validation.
//!
//! # Responsibilities
//! - Read JSON bodies leniently (no content type means an empty object)
//! - Validate routed messages field by field, collecting every problem
//!
//! # Design Decisions
//! - Validation runs before the gateway sees the request; nothing invalid
//!   ever reaches the transport
//! - Messages name the offending field so clients can act on them

use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde_json::{Map, Value};

use crate::gateway::GatewayError;

/// Header carrying the per-request correlation id.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Turn a JSON extraction result into a body value.
///
/// A request without a JSON content type is read as `{}`; a body that is
/// not valid JSON is a client error.
pub fn json_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, GatewayError> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(Value::Object(Map::new())),
        Err(rejection) => Err(GatewayError::BadRequest(rejection.body_text())),
    }
}

/// A validated routed message.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRequest {
    pub pattern: String,
    pub data: Value,
}

impl MessageRequest {
    /// Validate a raw body. Non-object bodies are checked as if empty.
    pub fn from_body(body: &Value) -> Result<Self, GatewayError> {
        let empty = Map::new();
        let fields = body.as_object().unwrap_or(&empty);

        let mut problems = Vec::new();
        let pattern = check_pattern(fields.get("pattern"), &mut problems);
        let data = check_data(fields.get("data"), &mut problems);

        match (pattern, data) {
            (Some(pattern), Some(data)) if problems.is_empty() => Ok(Self { pattern, data }),
            _ => Err(GatewayError::Validation(problems)),
        }
    }
}

fn check_pattern(value: Option<&Value>, problems: &mut Vec<String>) -> Option<String> {
    match value {
        None | Some(Value::Null) => {
            problems.push("pattern should not be empty".into());
            problems.push("pattern must be a string".into());
            None
        }
        Some(Value::String(s)) if s.is_empty() => {
            problems.push("pattern should not be empty".into());
            None
        }
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            problems.push("pattern must be a string".into());
            None
        }
    }
}

fn check_data(value: Option<&Value>, problems: &mut Vec<String>) -> Option<Value> {
    match value {
        None | Some(Value::Null) => {
            problems.push("data should not be empty".into());
            problems.push("data must be an object".into());
            None
        }
        Some(Value::String(s)) if s.is_empty() => {
            problems.push("data should not be empty".into());
            problems.push("data must be an object".into());
            None
        }
        Some(obj @ Value::Object(_)) => Some(obj.clone()),
        Some(_) => {
            problems.push("data must be an object".into());
            None
        }
    }
}
