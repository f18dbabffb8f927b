//! RPC envelopes exchanged with the backend.
//!
//! One packet shape covers all traffic on the link:
//!
//! ```text
//! request   {id, pattern, data}             gateway ⇄ backend
//! event     {pattern, data}                 gateway ⇄ backend
//! response  {id, response?, err?, status?, isDisposed?}
//! ```
//!
//! Structured patterns travel as their canonical JSON text with sorted keys,
//! so `{cmd: "get_user_by_id"}` is routed as `{"cmd":"get_user_by_id"}`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier selecting the handler on the receiving side.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Pattern {
    /// A named command, sent as `{"cmd": name}`.
    Command(String),
    /// A free-form pattern string supplied by an HTTP caller.
    Topic(String),
}

impl Pattern {
    pub fn command(name: impl Into<String>) -> Self {
        Pattern::Command(name.into())
    }

    pub fn topic(name: impl Into<String>) -> Self {
        Pattern::Topic(name.into())
    }

    /// Routing key as it appears on the wire.
    pub fn to_wire(&self) -> String {
        match self {
            Pattern::Command(name) => json!({ "cmd": name }).to_string(),
            Pattern::Topic(name) => name.clone(),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

/// Normalize a pattern received from the peer into its routing key.
///
/// Strings pass through; structured values are rendered as compact JSON
/// with object keys sorted at every level.
pub fn normalize_pattern(pattern: &Value) -> String {
    match pattern {
        Value::String(s) => s.clone(),
        other => sorted(other).to_string(),
    }
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let ordered: BTreeMap<&String, Value> =
                map.iter().map(|(k, v)| (k, sorted(v))).collect();
            let mut out = Map::with_capacity(ordered.len());
            for (k, v) in ordered {
                out.insert(k.clone(), v);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

/// A single frame's payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Packet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_disposed: Option<bool>,
}

/// What a received packet asks of the gateway.
#[derive(Debug, Clone, PartialEq)]
pub enum PacketKind {
    /// The peer expects a correlated reply.
    Request { id: String, pattern: String },
    /// Fire-and-forget from the peer.
    Event { pattern: String },
    /// Reply to one of our calls.
    Response { id: String },
    /// Neither a pattern nor an id.
    Malformed,
}

impl Packet {
    pub fn request(id: impl Into<String>, pattern: &Pattern, data: Value) -> Self {
        Self {
            id: Some(id.into()),
            pattern: Some(Value::String(pattern.to_wire())),
            data: Some(data),
            ..Default::default()
        }
    }

    pub fn event(name: &str, data: Value) -> Self {
        Self {
            pattern: Some(Value::String(name.to_string())),
            data: Some(data),
            ..Default::default()
        }
    }

    /// Final reply carrying a value.
    pub fn reply(id: impl Into<String>, response: Value) -> Self {
        Self {
            id: Some(id.into()),
            response: Some(response),
            is_disposed: Some(true),
            ..Default::default()
        }
    }

    /// Final reply carrying an error.
    pub fn error_reply(id: impl Into<String>, message: &str) -> Self {
        Self {
            id: Some(id.into()),
            err: Some(Value::String(message.to_string())),
            status: Some("error".to_string()),
            is_disposed: Some(true),
            ..Default::default()
        }
    }

    pub fn kind(&self) -> PacketKind {
        match (&self.id, &self.pattern) {
            (Some(id), Some(pattern)) => PacketKind::Request {
                id: id.clone(),
                pattern: normalize_pattern(pattern),
            },
            (None, Some(pattern)) => PacketKind::Event {
                pattern: normalize_pattern(pattern),
            },
            (Some(id), None) => PacketKind::Response { id: id.clone() },
            (None, None) => PacketKind::Malformed,
        }
    }

    /// Whether this response closes its stream. Absent counts as final.
    pub fn is_final(&self) -> bool {
        self.is_disposed.unwrap_or(true)
    }
}
