//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → handlers.rs (one handler per endpoint)
//!     → request.rs (body extraction, message validation)
//!     → gateway::GatewayService
//!     → response.rs (error and rejection rendering)
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::{MessageRequest, X_REQUEST_ID};
pub use server::HttpServer;
