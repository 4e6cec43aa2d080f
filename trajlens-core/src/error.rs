//! Error types for trajlens-core

use thiserror::Error;

/// Main error type for the trajlens-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Requested log file does not exist in the store
    #[error("log not found: {0}")]
    NotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Log store error (listing failure, invalid name, fetch timeout)
    #[error("log store error: {0}")]
    Store(String),
}

/// Result type alias for trajlens-core
pub type Result<T> = std::result::Result<T, Error>;
