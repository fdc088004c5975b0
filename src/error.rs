//! Error types for Feedline
//!
//! Every fallible operation in the crate returns `AppError`.
//! Remote failures are split into three kinds so callers can tell
//! "the server said no" apart from "the server said something we
//! can't parse" and from "we never reached the server".

use thiserror::Error;

/// Boxed cause carried by transport failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Application-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Storage engine failure (I/O, corruption, constraint)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failure
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Remote server answered with a non-success status
    #[error("Server rejected request: HTTP {status}{}", describe_rejection(.error, .description))]
    ServerRejected {
        status: u16,
        /// Server-supplied error code, if the body was decodable
        error: Option<String>,
        /// Server-supplied human readable description
        description: Option<String>,
    },

    /// Remote server answered with a body we could not decode
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Request never completed (timeout, DNS, connection reset)
    #[error("Transport error: {0}")]
    Transport(#[source] BoxError),

    /// Request could not be built from the given parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Whether this error originated from the remote feed client
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            AppError::ServerRejected { .. } | AppError::MalformedResponse(_) | AppError::Transport(_)
        )
    }

    /// Short label used for metrics and structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database",
            AppError::Migration(_) => "migration",
            AppError::ServerRejected { .. } => "server_rejected",
            AppError::MalformedResponse(_) => "malformed_response",
            AppError::Transport(_) => "transport",
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::Config(_) => "config",
            AppError::Internal(_) => "internal",
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Transport(Box::new(err))
    }
}

fn describe_rejection(error: &Option<String>, description: &Option<String>) -> String {
    match (error, description) {
        (Some(error), Some(description)) => format!(" ({error}: {description})"),
        (Some(error), None) => format!(" ({error})"),
        (None, Some(description)) => format!(" ({description})"),
        (None, None) => String::new(),
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
