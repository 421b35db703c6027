//! Error types for tourflow
//!
//! Defines crate-wide error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for the tour engine
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Positioning subsystem errors (permission denied, fix unavailable)
    #[error("Positioning error: {0}")]
    Positioning(String),

    /// Playback subsystem errors (load failure, transport failure)
    #[error("Playback error: {0}")]
    Playback(String),

    /// Progress snapshot persistence errors
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Snapshot serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid state for operation (e.g. starting a tour while one is active)
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Convenience Result type using the tourflow Error
pub type Result<T> = std::result::Result<T, Error>;
