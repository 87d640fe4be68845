//! Bridge error types

use crate::session::SessionState;
use headset::DeviceError;
use thiserror::Error;

/// Errors raised by the stream outlet side
#[derive(Debug, Error)]
pub enum OutletError {
    /// This build has no streaming backend
    #[error("LSL support was not compiled in; rebuild with `--features lsl`")]
    Unsupported,

    /// The sink refused to create the outlet
    #[error("failed to create stream outlet: {0}")]
    Create(String),

    /// The sink refused a sample
    #[error("failed to push sample: {0}")]
    Push(String),

    /// A sample did not match the declared channel layout
    #[error("sample carries {actual} channels but the stream declares {expected}")]
    ChannelMismatch { expected: usize, actual: usize },
}

/// Errors raised while running the bridge
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The device library could not be loaded
    #[error("{0}")]
    InterfaceLoad(#[source] DeviceError),

    /// A device-facing call failed
    #[error("{operation} failed: {source}")]
    Device {
        operation: &'static str,
        #[source]
        source: DeviceError,
    },

    /// A session operation was called in the wrong state
    #[error("{operation} is not allowed while the session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    /// A forward-progress call after an earlier device failure
    #[error("{operation} refused: an earlier device call failed")]
    SessionFailed { operation: &'static str },

    /// The stream outlet failed
    #[error(transparent)]
    Outlet(#[from] OutletError),
}

impl BridgeError {
    pub fn device(operation: &'static str, source: DeviceError) -> Self {
        BridgeError::Device { operation, source }
    }

    /// Process exit status for this error
    ///
    /// A partially loaded library reports how many functions were missing.
    pub fn exit_code(&self) -> u8 {
        match self {
            BridgeError::InterfaceLoad(e) => match e.missing_symbol_count() {
                0 => 1,
                n => n.min(u8::MAX as usize) as u8,
            },
            _ => 1,
        }
    }
}

/// Type alias for bridge results
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_device_error_names_operation() {
        let err = BridgeError::device("connect", DeviceError::api("no response from COM4"));
        assert_eq!(err.to_string(), "connect failed: no response from COM4");
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_missing_symbols_exit_code() {
        let err = BridgeError::InterfaceLoad(DeviceError::MissingSymbols {
            path: PathBuf::from("libDSI.so"),
            missing: vec!["DSI_Headset_Idle", "DSI_Headset_New", "DSI_Error"],
        });
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_invalid_state_display() {
        let err = BridgeError::InvalidState {
            operation: "start acquisition",
            state: SessionState::Created,
        };
        assert_eq!(
            err.to_string(),
            "start acquisition is not allowed while the session is created"
        );
    }

    #[test]
    fn test_outlet_error_is_transparent() {
        let err: BridgeError = OutletError::Push("outlet closed".to_string()).into();
        assert_eq!(err.to_string(), "failed to push sample: outlet closed");
    }
}
