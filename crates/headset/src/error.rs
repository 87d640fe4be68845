//! Device error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by the device layer
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The shared library could not be opened at all
    #[error("failed to load dynamic library \"{}\": {source}", path.display())]
    LibraryLoad {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    /// The shared library opened but some functions could not be resolved
    #[error(
        "failed to import {} functions from dynamic library \"{}\"",
        missing.len(),
        path.display()
    )]
    MissingSymbols {
        path: PathBuf,
        missing: Vec<&'static str>,
    },

    /// The device API raised its error indicator after a call
    #[error("{}", message.as_deref().unwrap_or("device reported an error without a diagnostic message"))]
    Api { message: Option<String> },

    /// A call that should yield an object returned a null pointer
    #[error("device returned a null {0}")]
    NullHandle(&'static str),

    /// The handle was already released
    #[error("headset handle has already been released")]
    Released,

    /// A string argument could not be passed across the C boundary
    #[error("argument contains an interior NUL byte: {0:?}")]
    InvalidArgument(String),
}

impl DeviceError {
    /// Build an API error carrying a diagnostic message
    pub fn api(message: impl Into<String>) -> Self {
        DeviceError::Api {
            message: Some(message.into()),
        }
    }

    /// Diagnostic message reported by the device, if any
    pub fn message(&self) -> Option<&str> {
        match self {
            DeviceError::Api { message } => message.as_deref(),
            _ => None,
        }
    }

    /// Number of functions that could not be imported from the library
    pub fn missing_symbol_count(&self) -> usize {
        match self {
            DeviceError::MissingSymbols { missing, .. } => missing.len(),
            _ => 0,
        }
    }
}

/// Result of a device-facing call
pub type DeviceResult<T> = std::result::Result<T, DeviceError>;
