//! Error types for the saga analysis pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using saga's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for saga operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Analysis task not found
    #[error("Task not found: {0}")]
    TaskNotFound(uuid::Uuid),

    /// Content unit not found
    #[error("Unit not found: {0}")]
    UnitNotFound(uuid::Uuid),

    /// The language-model service replied, but the payload violates the
    /// expected schema. Also raised when a cached raw result fails to re-parse.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Network, timeout, or quota failure talking to the language-model service.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Classify this error for callers that must branch on the failure type.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MalformedResponse(_) => ErrorKind::MalformedResponse,
            Error::ServiceUnavailable(_) => ErrorKind::ServiceUnavailable,
            Error::NotFound(_) | Error::TaskNotFound(_) | Error::UnitNotFound(_) => {
                ErrorKind::NotFound
            }
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::Database(_) => ErrorKind::Storage,
            Error::Serialization(_) | Error::Config(_) | Error::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::ServiceUnavailable(e.to_string())
    }
}

/// Failure classification surfaced through a Failed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MalformedResponse,
    ServiceUnavailable,
    NotFound,
    InvalidInput,
    Storage,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::MalformedResponse => "malformed_response",
            ErrorKind::ServiceUnavailable => "service_unavailable",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Storage => "storage",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}
