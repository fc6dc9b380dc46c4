//! Core error types for quiztimer-core.
//!
//! Every failure in the timer subsystem is recoverable: persistence
//! corruption is discarded, network failures fall back to manual submission.
//! The hierarchy below only describes what went wrong; callers decide how to
//! degrade.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for quiztimer-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Deadline store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Attempt service errors
    #[error("Attempt service error: {0}")]
    AttemptService(#[from] AttemptServiceError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Deadline store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite backend failure
    #[error("SQLite backend failed: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to open the SQLite database file
    #[error("Failed to open store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Any other backend failure
    #[error("Storage backend failed: {0}")]
    Backend(String),

    /// A record for a different attempt is already persisted
    #[error("Attempt '{active_attempt_id}' is already in progress")]
    AttemptAlreadyActive { active_attempt_id: String },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Key does not exist in the configuration tree
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Validation errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// Timer duration must be positive
    #[error("Timer duration must be a positive number of minutes")]
    NonPositiveDuration,

    /// Timestamp could not be parsed as an ISO-8601 instant
    #[error("Invalid timestamp '{value}': {message}")]
    InvalidTimestamp { value: String, message: String },

    /// Attempt identifier is empty
    #[error("Attempt identifier must not be empty")]
    EmptyAttemptId,
}

/// Errors raised by an attempt service.
#[derive(Error, Debug)]
pub enum AttemptServiceError {
    /// Network or client failure
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("Server responded with HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body could not be decoded
    #[error("Unexpected response body: {0}")]
    Decode(String),

    /// Base URL or attempt path is not a valid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Failure reported by a non-HTTP implementation
    #[error("{0}")]
    Other(String),
}

impl From<keyring::Error> for CoreError {
    fn from(err: keyring::Error) -> Self {
        CoreError::Custom(format!("Keyring error: {err}"))
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
