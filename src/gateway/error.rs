//! External error taxonomy.
//!
//! Everything that can go wrong while serving a gateway request ends up as
//! one of these variants. Transport errors never leak past the mapper; the
//! HTTP layer only ever sees a `GatewayError`.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Field-level validation failures, one message per problem.
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// The request body could not be read as JSON of the right shape.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// An entity lookup could not be completed.
    #[error("Service Unavailable")]
    ServiceUnavailable,

    /// A custom-routed call failed or was refused.
    #[error("Processing Error")]
    ProcessingError,

    /// The link did not accept an event.
    #[error("Failed to process event")]
    EventRejected,

    #[error("Internal Server Error")]
    Internal,
}

impl GatewayError {
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::Validation(_) | GatewayError::BadRequest(_) => 400,
            GatewayError::ServiceUnavailable => 503,
            GatewayError::ProcessingError
            | GatewayError::EventRejected
            | GatewayError::Internal => 500,
        }
    }

    /// Client-facing message. Never includes diagnostic detail.
    pub fn message(&self) -> String {
        match self {
            GatewayError::Validation(messages) => messages.join(", "),
            GatewayError::BadRequest(reason) => reason.clone(),
            other => other.to_string(),
        }
    }

    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Validation(_) => "validation",
            GatewayError::BadRequest(_) => "bad_request",
            GatewayError::ServiceUnavailable => "service_unavailable",
            GatewayError::ProcessingError => "processing_error",
            GatewayError::EventRejected => "event_rejected",
            GatewayError::Internal => "internal",
        }
    }
}
