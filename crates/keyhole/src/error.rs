//! Error types for Keyhole

use thiserror::Error;

/// Main error type for Keyhole operations
#[derive(Error, Debug)]
pub enum KeyholeError {
    /// Configuration errors (invalid file, bad values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The upstream credential is absent or unusable
    #[error("Credential error: {0}")]
    Credential(String),

    /// Server/HTTP errors
    #[error("Proxy error: {0}")]
    Proxy(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for Keyhole operations
pub type Result<T> = std::result::Result<T, KeyholeError>;
