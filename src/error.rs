//! Error types for sublinks-federation
//!
//! Three families of errors live here:
//! - `AppError`: HTTP-facing errors, converted to JSON responses
//! - `QueueError`: broker connection, topology and acknowledgment failures
//! - `ProcessingError`: per-message worker failures (always recovered by a Nack)

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
///
/// Used by the HTTP layer, configuration loading and the database
/// collaborator. Implements `IntoResponse` so handlers can return it
/// directly.
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found (404)
    #[error("Resource not found")]
    NotFound,

    /// Validation error (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error (500)
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Message queue error (500)
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and JSON error body.
    fn into_response(self) -> Response {
        use axum::Json;

        let (status, error_message, error_type) = match &self {
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string(), "not_found"),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone(), "validation"),
            AppError::Database(_) | AppError::Migration(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error".to_string(),
                "database",
            ),
            AppError::Queue(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Queue error".to_string(),
                "queue",
            ),
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone(), "config"),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                "internal",
            ),
        };

        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[error_type]).inc();

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Broker-level errors raised by the queue client and consumer loop
#[derive(Debug, Error)]
pub enum QueueError {
    /// Broker unreachable or authentication refused
    #[error("Queue connection error: {0}")]
    Connection(#[source] lapin::Error),

    /// Exchange/queue declaration, QoS or binding failed
    #[error("Queue topology error ({context}): {source}")]
    Topology {
        context: String,
        #[source]
        source: lapin::Error,
    },

    /// Starting or draining a consumer failed
    #[error("Queue consume error: {0}")]
    Consume(#[source] lapin::Error),

    /// Ack/Nack could not be delivered to the broker
    #[error("Acknowledgment failed for delivery {delivery_tag}: {reason}")]
    Acknowledgment { delivery_tag: u64, reason: String },

    /// An operation needed an open channel but the client is not connected
    #[error("Queue client is not connected")]
    NotConnected,
}

impl QueueError {
    pub fn topology(context: impl Into<String>, source: lapin::Error) -> Self {
        Self::Topology {
            context: context.into(),
            source,
        }
    }
}

/// Failure of a single worker `process` call
///
/// The dispatcher treats every variant the same way (Nack with requeue);
/// the distinction only feeds logs and metrics.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Payload is not valid JSON for the expected event record
    #[error("Failed to decode payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// Payload decoded but is missing or has invalid required fields
    #[error("Invalid event: {0}")]
    Validation(String),

    /// Storage rejected the write
    #[error("Repository error: {0}")]
    Repository(#[source] AppError),
}

impl ProcessingError {
    /// Short label used for metrics and structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode",
            Self::Validation(_) => "validation",
            Self::Repository(_) => "repository",
        }
    }
}
