//! Error types for Strata

use thiserror::Error;

/// Main error type for Strata operations
#[derive(Error, Debug)]
pub enum StrataError {
    /// Malformed request, rejected immediately and never retried
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Fast tier unreachable, timed out, or over capacity
    #[error("Fast tier error: {0}")]
    FastTier(String),

    /// Cold tier write/read/enumerate error
    #[error("Cold tier error: {0}")]
    ColdTier(String),

    /// Payload serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Key not present in any tier
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Fatal startup failures (fail-fast)
    #[error("Startup error: {0}")]
    Startup(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Strata operations
pub type Result<T> = std::result::Result<T, StrataError>;
