//! Error types for ch-core

use thiserror::Error;

/// Main error type for ch-core
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Driver alias already registered: {0}")]
    DuplicateAlias(String),

    #[error("Driver not found: {0}")]
    DriverNotFound(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for ch-core
pub type Result<T> = std::result::Result<T, Error>;
