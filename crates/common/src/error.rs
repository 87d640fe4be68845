//! Common error types

use thiserror::Error;

/// Errors from logging setup and signal handling
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Logging error: {0}")]
    Logging(String),

    #[error("Signal handling error: {0}")]
    Signal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
