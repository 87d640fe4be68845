//! Common utilities for dsi2lsl
//!
//! This crate provides the ambient pieces shared by the bridge: the common
//! error type, tracing setup, and the cooperative shutdown token used to
//! stop the acquisition loop from a signal handler.

pub mod error;
pub mod logging;
pub mod shutdown;

pub use error::{Error, Result};
pub use logging::setup_logging;
pub use shutdown::{ShutdownToken, spawn_ctrl_c_listener};
