//! HTTP → TCP RPC gateway library.

// Core subsystems
pub mod config;
pub mod gateway;
pub mod http;
pub mod net;
pub mod rpc;
pub mod transport;

// Cross-cutting concerns
pub mod clock;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::GatewayConfig;
pub use gateway::GatewayService;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
