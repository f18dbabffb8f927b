//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP listener configuration.
    pub listener: ListenerConfig,

    /// Backend compute service the RPC link connects to.
    pub backend: BackendConfig,

    /// Call deadline and HTTP request timeout.
    pub timeouts: TimeoutConfig,

    /// Supervised reconnection of the backend link.
    pub reconnect: ReconnectConfig,

    /// Circuit breaker guarding backend calls.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Deterministic short-circuit responses.
    pub fixtures: FixtureConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Backend RPC endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Backend host name or IP.
    pub host: String,

    /// Backend TCP port.
    pub port: u16,

    /// Timeout for a single connection attempt in milliseconds.
    pub connect_timeout_ms: u64,

    /// Largest frame accepted from the backend, in bytes.
    pub max_frame_bytes: usize,

    /// Capacity of the outbound packet queue.
    pub outbound_buffer: usize,
}

impl BackendConfig {
    /// `host:port` string used to dial the backend.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            connect_timeout_ms: 3000,
            max_frame_bytes: 16 * 1024 * 1024, // 16MB
            outbound_buffer: 1024,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline applied uniformly to every backend call, in milliseconds.
    pub call_ms: u64,

    /// Total time allowed for an HTTP request/response, in seconds.
    pub request_secs: u64,
}

impl TimeoutConfig {
    pub fn call_deadline(&self) -> Duration {
        Duration::from_millis(self.call_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            call_ms: 5000,
            request_secs: 30,
        }
    }
}

/// Reconnection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Re-establish the link after it is lost or fails to connect.
    pub enabled: bool,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Enable the circuit breaker.
    pub enabled: bool,

    /// Consecutive transport failures before the circuit opens.
    pub failure_threshold: u32,

    /// Time the circuit stays open before admitting a probe, in seconds.
    pub recovery_secs: u64,
}

impl CircuitBreakerConfig {
    pub fn recovery(&self) -> Duration {
        Duration::from_secs(self.recovery_secs)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 5,
            recovery_secs: 10,
        }
    }
}

/// Fixture (short-circuit) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FixtureConfig {
    /// Answer the built-in contract fixtures without touching the backend.
    pub enabled: bool,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format ("pretty" or "json").
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.backend.address(), "127.0.0.1:3001");
        assert_eq!(config.timeouts.call_deadline(), Duration::from_millis(5000));
        assert!(config.fixtures.enabled);
        assert!(config.reconnect.enabled);
    }

    #[test]
    fn test_partial_toml() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [backend]
            host = "compute.internal"

            [timeouts]
            call_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.backend.host, "compute.internal");
        assert_eq!(config.backend.port, 3001);
        assert_eq!(config.timeouts.call_ms, 250);
        assert_eq!(config.timeouts.request_secs, 30);
        assert_eq!(config.listener.bind_address, "0.0.0.0:3000");
    }
}
