//! Device layer for Wearable Sensing DSI headsets
//!
//! This crate defines the device-facing interface used by the bridge:
//! every call returns a [`DeviceResult`] instead of raising a shared error
//! indicator, and sample delivery happens only inside [`Headset::idle`].
//!
//! The production implementation loads the vendor `libDSI` shared library at
//! runtime ([`DsiInterface`]); [`test_utils`] provides a scripted headset that
//! records every call for tests.

pub mod api;
pub mod dsi;
pub mod error;
pub mod test_utils;
pub mod types;

pub use api::{DsiApi, default_library_name};
pub use dsi::{DsiHeadset, DsiInterface};
pub use error::{DeviceError, DeviceResult};
pub use types::SampleFrame;

use std::time::Duration;

/// A loaded device interface, able to allocate headset handles
pub trait HeadsetInterface {
    /// Handle type produced by this interface
    type Headset: Headset;

    /// Version string of the loaded device API
    fn api_version(&self) -> String;

    /// Allocate a headset handle without connecting it
    ///
    /// Connection is deferred so diagnostics can be routed before any
    /// transport activity happens.
    fn create_headset(&self) -> DeviceResult<Self::Headset>;
}

/// Device-facing operations on one headset
///
/// Implementations are single-threaded: no call may overlap another.
pub trait Headset {
    /// Route device diagnostic messages into the log
    fn set_message_callback(&mut self) -> DeviceResult<()>;

    /// Set how chatty the device diagnostics are
    fn set_verbosity(&mut self, level: i32) -> DeviceResult<()>;

    /// Open the transport link
    ///
    /// `None` or an empty port lets the device layer pick its own default
    /// (the `DSISerialPort` environment variable for libDSI).
    fn connect(&mut self, port: Option<&str>) -> DeviceResult<()>;

    /// Select the active montage and reference; `None` keeps device defaults
    fn choose_channels(&mut self, montage: Option<&str>, reference: Option<&str>)
    -> DeviceResult<()>;

    /// Human-readable overview of the headset
    fn info_string(&self) -> DeviceResult<String>;

    /// Number of active channels
    fn channel_count(&self) -> DeviceResult<usize>;

    /// Sampling rate in Hz
    fn sampling_rate(&self) -> DeviceResult<f64>;

    /// Raw label of the channel at `index`, e.g. `"Cz-Pz"`
    fn channel_label(&self, index: usize) -> DeviceResult<String>;

    /// Label of the resolved reference
    fn reference_label(&self) -> DeviceResult<String>;

    /// Enable or disable device-side sample dispatch
    fn set_sample_callback(&mut self, enabled: bool) -> DeviceResult<()>;

    /// Ask the device to start streaming samples
    fn start_acquisition(&mut self) -> DeviceResult<()>;

    /// Ask the device to stop streaming samples
    fn stop_acquisition(&mut self) -> DeviceResult<()>;

    /// Pump pending transport I/O for up to `timeout`
    ///
    /// Every sample that becomes ready while sample dispatch is enabled is
    /// handed to `on_sample` before this call returns.
    fn idle(
        &mut self,
        timeout: Duration,
        on_sample: &mut dyn FnMut(&SampleFrame<'_>),
    ) -> DeviceResult<()>;

    /// Disconnect and free the handle; later calls fail with
    /// [`DeviceError::Released`]
    fn release(&mut self) -> DeviceResult<()>;
}
