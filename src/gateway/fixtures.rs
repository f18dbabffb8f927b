//! Deterministic short-circuit answers.
//!
//! A handful of literal inputs are answered here without touching the
//! backend, so smoke tests against a bare gateway have something stable to
//! assert on. Switched off with `fixtures.enabled = false`.

use serde_json::{json, Value};

use crate::config::FixtureConfig;

/// User id answered locally.
pub const FIXTURE_USER_ID: &str = "1";

#[derive(Debug, Clone, Copy)]
pub struct Fixtures {
    enabled: bool,
}

impl Fixtures {
    pub fn new(config: &FixtureConfig) -> Self {
        Self { enabled: config.enabled }
    }

    pub fn disabled() -> Self {
        Self { enabled: false }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn user(&self, id: &str) -> Option<Value> {
        if !self.enabled || id != FIXTURE_USER_ID {
            return None;
        }
        Some(json!({
            "id": 1,
            "name": "Test User",
            "email": "test@example.com",
        }))
    }

    pub fn message(&self, pattern: &str, data: &Value) -> Option<Value> {
        if !self.enabled || pattern != "get_data" {
            return None;
        }
        match data.get("key").and_then(Value::as_str) {
            Some("test") => Some(json!({"key": "test", "value": "test_value"})),
            _ => None,
        }
    }
}

impl Default for Fixtures {
    fn default() -> Self {
        Self { enabled: true }
    }
}
