//! services/api/src/error.rs
//!
//! Defines the primary error type for the API service, and how core errors map
//! onto HTTP responses.

use axum::http::StatusCode;
use inkkeeper_core::library::LibraryError;
use inkkeeper_core::ports::PortError;
use inkkeeper_core::submission::SubmissionError;

use crate::config::ConfigError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from the backend port.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// The error shape every REST handler returns.
pub type HandlerError = (StatusCode, String);

/// Backend failures are shown to the user as-is; there is no automatic retry.
pub fn port_status(e: &PortError) -> HandlerError {
    match e {
        PortError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
        PortError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
        PortError::Backend(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
    }
}

pub fn submission_status(e: &SubmissionError) -> HandlerError {
    match e {
        SubmissionError::TooShort { .. }
        | SubmissionError::EndBeforeStart { .. }
        | SubmissionError::MissingPages => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
        SubmissionError::MissingPrerequisite(_) | SubmissionError::AlreadySubmitting => {
            (StatusCode::CONFLICT, e.to_string())
        }
        SubmissionError::Backend(port) => port_status(port),
    }
}

pub fn library_status(e: &LibraryError) -> HandlerError {
    match e {
        LibraryError::Port(port) => port_status(port),
        LibraryError::Duplicate(_) => (StatusCode::CONFLICT, e.to_string()),
        _ => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
    }
}
