//! Headset session state machine
//!
//! A [`HeadsetSession`] owns the device handle for one run and walks it
//! through `Uninitialized → Created → Connected → Configured → Acquiring →
//! Stopped → Disconnected`. Every device result is checked immediately. A
//! failed device call marks the session failed: forward-progress calls are
//! refused from then on, while the teardown calls (unregister, stop, idle,
//! disconnect) stay available.

use crate::error::{BridgeError, Result};
use crate::forwarder::SampleHandler;
use headset::{DeviceResult, Headset, HeadsetInterface};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Created,
    Connected,
    Configured,
    Acquiring,
    Stopped,
    Disconnected,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Created => "created",
            SessionState::Connected => "connected",
            SessionState::Configured => "configured",
            SessionState::Acquiring => "acquiring",
            SessionState::Stopped => "stopped",
            SessionState::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}

/// Exclusive owner of one headset handle
pub struct HeadsetSession<H: Headset> {
    headset: Option<H>,
    state: SessionState,
    handler: Option<Box<dyn SampleHandler>>,
    failed: bool,
    samples_dispatched: u64,
}

impl<H: Headset> Default for HeadsetSession<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Headset> HeadsetSession<H> {
    pub fn new() -> Self {
        Self {
            headset: None,
            state: SessionState::Uninitialized,
            handler: None,
            failed: false,
            samples_dispatched: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether a device call has failed during this session
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn has_sample_handler(&self) -> bool {
        self.handler.is_some()
    }

    /// Samples handed to the sample handler so far
    pub fn samples_dispatched(&self) -> u64 {
        self.samples_dispatched
    }

    /// Borrow the device handle, if one is held
    pub fn device(&self) -> Option<&H> {
        self.headset.as_ref()
    }

    /// Allocate the headset handle with the connection deferred
    pub fn create<I>(&mut self, interface: &I) -> Result<()>
    where
        I: HeadsetInterface<Headset = H>,
    {
        self.require("create headset", &[SessionState::Uninitialized])?;
        let result = interface.create_headset();
        let headset = self.track("create headset", result)?;
        self.headset = Some(headset);
        self.state = SessionState::Created;
        debug!("Headset handle created");
        Ok(())
    }

    /// Route device diagnostics to the log and set their verbosity
    pub fn register_diagnostics(&mut self, verbosity: i32) -> Result<()> {
        const OP: &str = "register diagnostics";
        self.require(OP, &[SessionState::Created])?;

        let result = self.headset_mut(OP)?.set_message_callback();
        self.track(OP, result)?;

        let result = self.headset_mut(OP)?.set_verbosity(verbosity);
        self.track(OP, result)
    }

    /// Open the transport link
    ///
    /// The port is passed through as given; `None` or `""` leaves the
    /// choice to the device layer.
    pub fn connect(&mut self, port: Option<&str>) -> Result<()> {
        const OP: &str = "connect";
        self.require(OP, &[SessionState::Created])?;

        let result = self.headset_mut(OP)?.connect(port);
        self.track(OP, result)?;
        self.state = SessionState::Connected;
        Ok(())
    }

    /// Select montage and reference
    pub fn configure(&mut self, montage: Option<&str>, reference: Option<&str>) -> Result<()> {
        const OP: &str = "choose channels";
        self.require(OP, &[SessionState::Connected, SessionState::Configured])?;

        let result = self.headset_mut(OP)?.choose_channels(montage, reference);
        self.track(OP, result)?;
        self.state = SessionState::Configured;
        Ok(())
    }

    pub fn info_string(&mut self) -> Result<String> {
        const OP: &str = "get info string";
        self.query(OP, |headset| headset.info_string())
    }

    pub fn channel_count(&mut self) -> Result<usize> {
        self.query("get number of channels", |headset| headset.channel_count())
    }

    pub fn sampling_rate(&mut self) -> Result<f64> {
        self.query("get sampling rate", |headset| headset.sampling_rate())
    }

    pub fn channel_label(&mut self, index: usize) -> Result<String> {
        self.query("get channel label", |headset| headset.channel_label(index))
    }

    pub fn reference_label(&mut self) -> Result<String> {
        self.query("get reference label", |headset| headset.reference_label())
    }

    /// Enable sample dispatch into `handler`
    ///
    /// A previously registered handler is replaced and dropped.
    pub fn register_sample_handler(&mut self, handler: Box<dyn SampleHandler>) -> Result<()> {
        const OP: &str = "register sample handler";
        self.require(
            OP,
            &[
                SessionState::Connected,
                SessionState::Configured,
                SessionState::Stopped,
            ],
        )?;

        let result = self.headset_mut(OP)?.set_sample_callback(true);
        self.track(OP, result)?;
        self.handler = Some(handler);
        Ok(())
    }

    /// Disable sample dispatch and hand the handler back
    ///
    /// On failure the handler stays with the session and is dropped with it.
    pub fn unregister_sample_handler(&mut self) -> Result<Option<Box<dyn SampleHandler>>> {
        const OP: &str = "unregister sample handler";
        if self.headset.is_none() {
            return Ok(self.handler.take());
        }

        let result = self.headset_mut(OP)?.set_sample_callback(false);
        self.track(OP, result)?;
        Ok(self.handler.take())
    }

    pub fn start_acquisition(&mut self) -> Result<()> {
        const OP: &str = "start data acquisition";
        self.require(
            OP,
            &[
                SessionState::Connected,
                SessionState::Configured,
                SessionState::Stopped,
            ],
        )?;

        let result = self.headset_mut(OP)?.start_acquisition();
        self.track(OP, result)?;
        self.state = SessionState::Acquiring;
        Ok(())
    }

    /// Stop streaming; a no-op unless acquisition is running
    pub fn stop_acquisition(&mut self) -> Result<()> {
        const OP: &str = "stop data acquisition";
        if self.state != SessionState::Acquiring {
            return Ok(());
        }

        let result = self.headset_mut(OP)?.stop_acquisition();
        self.track(OP, result)?;
        self.state = SessionState::Stopped;
        Ok(())
    }

    /// Pump device I/O for up to `timeout`
    ///
    /// Samples that become ready are handed to the registered handler before
    /// this returns. The first handler error is returned after the pump
    /// finishes; later samples in the same pump are dropped.
    pub fn idle(&mut self, timeout: Duration) -> Result<()> {
        const OP: &str = "idle";
        let state = self.state;
        let headset = self.headset.as_mut().ok_or(BridgeError::InvalidState {
            operation: OP,
            state,
        })?;

        let mut handler = self.handler.as_deref_mut();
        let mut handler_error = None;
        let mut dispatched = 0u64;

        let result = headset.idle(timeout, &mut |frame| {
            if handler_error.is_some() {
                return;
            }
            if let Some(handler) = handler.as_mut() {
                match handler.on_sample(frame) {
                    Ok(()) => dispatched += 1,
                    Err(e) => handler_error = Some(e),
                }
            }
        });

        self.samples_dispatched += dispatched;
        self.track(OP, result)?;
        match handler_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Release the device handle
    ///
    /// Refused while acquiring, unless a device call has already failed (a
    /// failed stop leaves the session acquiring). Calling it again after
    /// release is a no-op.
    pub fn disconnect(&mut self) -> Result<()> {
        const OP: &str = "release headset";
        match self.state {
            SessionState::Acquiring if self.failed => {
                warn!("Releasing headset while acquisition may still be running");
            }
            SessionState::Acquiring | SessionState::Uninitialized => {
                return Err(BridgeError::InvalidState {
                    operation: OP,
                    state: self.state,
                });
            }
            SessionState::Disconnected => return Ok(()),
            _ => {}
        }

        let Some(mut headset) = self.headset.take() else {
            return Ok(());
        };
        self.state = SessionState::Disconnected;
        let result = headset.release();
        self.track(OP, result)?;
        debug!("Headset handle released");
        Ok(())
    }

    /// Refuse forward progress after a failure or from the wrong state
    fn require(&self, operation: &'static str, allowed: &[SessionState]) -> Result<()> {
        if self.failed {
            return Err(BridgeError::SessionFailed { operation });
        }
        if !allowed.contains(&self.state) {
            return Err(BridgeError::InvalidState {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }

    fn headset_mut(&mut self, operation: &'static str) -> Result<&mut H> {
        let state = self.state;
        self.headset
            .as_mut()
            .ok_or(BridgeError::InvalidState { operation, state })
    }

    /// Run a read-only device query on a connected session
    fn query<T>(
        &mut self,
        operation: &'static str,
        call: impl FnOnce(&H) -> DeviceResult<T>,
    ) -> Result<T> {
        self.require(
            operation,
            &[SessionState::Connected, SessionState::Configured],
        )?;
        let result = call(self.headset_mut(operation)?);
        self.track(operation, result)
    }

    /// Check a device result, marking the session failed on error
    fn track<T>(&mut self, operation: &'static str, result: DeviceResult<T>) -> Result<T> {
        result.map_err(|source| {
            self.failed = true;
            BridgeError::device(operation, source)
        })
    }
}

impl<H: Headset> Drop for HeadsetSession<H> {
    fn drop(&mut self) {
        let Some(mut headset) = self.headset.take() else {
            return;
        };

        if self.state == SessionState::Acquiring {
            if let Err(e) = headset.stop_acquisition() {
                warn!("Failed to stop acquisition while dropping session: {}", e);
            }
        }
        if let Err(e) = headset.release() {
            warn!("Failed to release headset while dropping session: {}", e);
        }
    }
}
