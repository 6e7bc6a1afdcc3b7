//! Error types for ocwatch-core

use thiserror::Error;

/// Main error type for the ocwatch-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed transport payload; the offending event is dropped and the
    /// pipeline keeps going
    #[error("parse error: {0}")]
    Parse(String),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Empty or missing message id handed to the store; a caller bug, fatal
    /// to that call
    #[error("invalid message key: {0}")]
    InvalidKey(String),

    /// Session not found on the server
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Event source (stream or history endpoint) unavailable; the store is
    /// left in its last-known-good state
    #[error("event source unavailable: {0}")]
    Source(String),
}

/// Result type alias for ocwatch-core
pub type Result<T> = std::result::Result<T, Error>;
