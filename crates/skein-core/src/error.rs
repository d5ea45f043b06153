//! Error types for skein-core

use thiserror::Error;

/// Result type alias for skein operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the skein dispatcher
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid HTTP method
    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// Pattern rejected by the route table
    #[error("Invalid route pattern: {0}")]
    InvalidPattern(#[from] skein_router::InsertError),

    /// Unusable listen address
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Body too large
    #[error("Body too large: {size} bytes exceeds limit of {limit} bytes")]
    BodyTooLarge { size: usize, limit: usize },

    /// Form or query decoding failure
    #[error("Form error: {0}")]
    Form(String),

    /// Malformed multipart upload
    #[error("Multipart error: {0}")]
    Multipart(String),

    /// Requested form file field is absent
    #[error("No file uploaded for field: {0}")]
    MissingFile(String),

    /// JSON encode/decode failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration parse failure
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Hyper error (native only)
    #[cfg(feature = "native")]
    #[error("HTTP error: {0}")]
    Hyper(#[from] hyper::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
