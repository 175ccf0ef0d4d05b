//! services/api/src/error.rs
//!
//! Defines the primary error type for the API service, and the mapping from
//! core errors to HTTP responses.

use crate::config::ConfigError;
use axum::http::StatusCode;
use insight_core::ports::PortError;
use tracing::error;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a failure while applying the embedded migrations.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a failure to build one of the outbound HTTP clients.
    #[error("HTTP client Error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// Maps a core error to the status and body a handler responds with.
///
/// Unexpected errors are logged and answered with a generic message.
pub fn port_error_response(e: PortError) -> (StatusCode, String) {
    match e {
        PortError::NotFound(message) => (StatusCode::NOT_FOUND, message),
        PortError::InvalidInput(message) => (StatusCode::BAD_REQUEST, message),
        PortError::InvalidPeriod(period) => (
            StatusCode::BAD_REQUEST,
            format!("Invalid period '{}'. Use day, week or month.", period),
        ),
        PortError::DispatchFailure(message) => {
            error!("Summarization worker unreachable: {}", message);
            (
                StatusCode::BAD_GATEWAY,
                "Summarization service unavailable, please retry.".to_string(),
            )
        }
        PortError::Conflict(message) => (StatusCode::CONFLICT, message),
        PortError::Forbidden(message) => (StatusCode::FORBIDDEN, message),
        PortError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
        PortError::Unexpected(message) => {
            error!("Unexpected error: {}", message);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An unexpected error occurred".to_string(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_statuses() {
        let cases = [
            (PortError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (PortError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (PortError::InvalidPeriod("yesterday".into()), StatusCode::BAD_REQUEST),
            (PortError::DispatchFailure("down".into()), StatusCode::BAD_GATEWAY),
            (PortError::Conflict("x".into()), StatusCode::CONFLICT),
            (PortError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (PortError::Unauthorized, StatusCode::UNAUTHORIZED),
            (PortError::Unexpected("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(port_error_response(error).0, status);
        }
    }

    #[test]
    fn unexpected_errors_hide_details() {
        let (_, body) = port_error_response(PortError::Unexpected("password=hunter2".into()));
        assert!(!body.contains("hunter2"));
    }
}
