//! Test utilities for the device layer
//!
//! Provides a scripted, in-memory headset that records every device-facing
//! call in order, emulates montage/reference selection, delivers
//! deterministic samples while acquiring, and can be told to fail a given
//! call.
//!
//! # Example
//!
//! ```
//! use headset::test_utils::{DeviceCall, HeadsetScript, ScriptedInterface};
//! use headset::{Headset, HeadsetInterface};
//!
//! let interface = ScriptedInterface::new(HeadsetScript::default());
//! let mut headset = interface.create_headset().unwrap();
//! headset.connect(None).unwrap();
//! assert_eq!(interface.calls().last(), Some(&DeviceCall::Connect(None)));
//! ```

use crate::error::{DeviceError, DeviceResult};
use crate::types::SampleFrame;
use crate::{Headset, HeadsetInterface};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

/// One recorded device-facing call
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    Create,
    SetMessageCallback,
    SetVerbosity(i32),
    Connect(Option<String>),
    ChooseChannels {
        montage: Option<String>,
        reference: Option<String>,
    },
    InfoString,
    ChannelCount,
    SamplingRate,
    ChannelLabel(usize),
    ReferenceLabel,
    SetSampleCallback(bool),
    StartAcquisition,
    StopAcquisition,
    Idle(Duration),
    Release,
}

impl DeviceCall {
    /// Stable name used to target injected failures
    pub fn name(&self) -> &'static str {
        match self {
            DeviceCall::Create => "create",
            DeviceCall::SetMessageCallback => "set_message_callback",
            DeviceCall::SetVerbosity(_) => "set_verbosity",
            DeviceCall::Connect(_) => "connect",
            DeviceCall::ChooseChannels { .. } => "choose_channels",
            DeviceCall::InfoString => "info_string",
            DeviceCall::ChannelCount => "channel_count",
            DeviceCall::SamplingRate => "sampling_rate",
            DeviceCall::ChannelLabel(_) => "channel_label",
            DeviceCall::ReferenceLabel => "reference_label",
            DeviceCall::SetSampleCallback(_) => "set_sample_callback",
            DeviceCall::StartAcquisition => "start_acquisition",
            DeviceCall::StopAcquisition => "stop_acquisition",
            DeviceCall::Idle(_) => "idle",
            DeviceCall::Release => "release",
        }
    }
}

/// Shared, ordered record of device calls
pub type CallLog = Rc<RefCell<Vec<DeviceCall>>>;

/// Hook run at the end of every idle pump with the number of pumps so far
pub type IdleHook = Rc<dyn Fn(u64)>;

/// Behaviour of a scripted headset
#[derive(Clone)]
pub struct HeadsetScript {
    /// Sensor names the headset physically carries
    pub sensors: Vec<String>,
    /// Reference used when none is requested
    pub default_reference: String,
    /// Sampling rate in Hz
    pub sampling_rate: f64,
    /// Samples delivered by each idle pump while acquiring
    pub samples_per_idle: usize,
    /// Call name and message of an injected failure
    pub fail_on: Option<(&'static str, String)>,
    /// Optional hook run after each idle pump
    pub idle_hook: Option<IdleHook>,
}

impl Default for HeadsetScript {
    /// A DSI-24 style layout: 19 scalp sensors plus ear clips, Pz reference
    fn default() -> Self {
        let sensors = [
            "Fp1", "Fp2", "Fz", "F3", "F4", "F7", "F8", "Cz", "C3", "C4", "T3", "T4", "T5", "T6",
            "P3", "P4", "O1", "O2", "A1", "A2",
        ];
        Self {
            sensors: sensors.iter().map(|s| s.to_string()).collect(),
            default_reference: "Pz".to_string(),
            sampling_rate: 300.0,
            samples_per_idle: 1,
            fail_on: None,
            idle_hook: None,
        }
    }
}

impl HeadsetScript {
    /// Fail the named call with a device diagnostic message
    pub fn failing(mut self, call: &'static str, message: impl Into<String>) -> Self {
        self.fail_on = Some((call, message.into()));
        self
    }

    /// Run `hook` after every idle pump
    pub fn on_idle(mut self, hook: impl Fn(u64) + 'static) -> Self {
        self.idle_hook = Some(Rc::new(hook));
        self
    }

    /// Deliver `count` samples per idle pump
    pub fn with_samples_per_idle(mut self, count: usize) -> Self {
        self.samples_per_idle = count;
        self
    }
}

/// Deterministic signal value of `channel` in the `sample`-th delivered sample
pub fn scripted_signal(sample: u64, channel: usize) -> f64 {
    sample as f64 * 10.0 + channel as f64 * 0.5
}

/// Interface producing [`ScriptedHeadset`]s that share one call log
pub struct ScriptedInterface {
    script: HeadsetScript,
    log: CallLog,
}

impl ScriptedInterface {
    pub fn new(script: HeadsetScript) -> Self {
        Self {
            script,
            log: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Snapshot of every call made so far, in order
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.log.borrow().clone()
    }

    /// Shared handle to the call log
    pub fn log(&self) -> CallLog {
        Rc::clone(&self.log)
    }
}

impl HeadsetInterface for ScriptedInterface {
    type Headset = ScriptedHeadset;

    fn api_version(&self) -> String {
        "1.18.2-scripted".to_string()
    }

    fn create_headset(&self) -> DeviceResult<ScriptedHeadset> {
        let mut headset = ScriptedHeadset {
            script: self.script.clone(),
            log: Rc::clone(&self.log),
            connected: false,
            acquiring: false,
            dispatching: false,
            released: false,
            channels: Vec::new(),
            reference: self.script.default_reference.clone(),
            samples_delivered: 0,
            idle_count: 0,
        };
        headset.record(DeviceCall::Create)?;
        Ok(headset)
    }
}

/// In-memory headset that follows a [`HeadsetScript`]
pub struct ScriptedHeadset {
    script: HeadsetScript,
    log: CallLog,
    connected: bool,
    acquiring: bool,
    dispatching: bool,
    released: bool,
    channels: Vec<String>,
    reference: String,
    samples_delivered: u64,
    idle_count: u64,
}

impl ScriptedHeadset {
    /// Record a call, then apply any injected failure for it
    fn record(&self, call: DeviceCall) -> DeviceResult<()> {
        let name = call.name();
        self.log.borrow_mut().push(call);
        if self.released && name != "create" {
            return Err(DeviceError::Released);
        }
        match &self.script.fail_on {
            Some((target, message)) if *target == name => Err(DeviceError::api(message.clone())),
            _ => Ok(()),
        }
    }

    fn require_connected(&self) -> DeviceResult<()> {
        if self.connected {
            Ok(())
        } else {
            Err(DeviceError::api("headset is not connected"))
        }
    }

    fn select(&mut self, montage: Option<&str>, reference: &str) -> DeviceResult<()> {
        let requested: Vec<String> = montage
            .unwrap_or_default()
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let selected = if requested.is_empty() {
            self.script
                .sensors
                .iter()
                .filter(|s| s.as_str() != reference)
                .cloned()
                .collect()
        } else {
            for sensor in &requested {
                if !self.script.sensors.contains(sensor) && *sensor != reference {
                    return Err(DeviceError::api(format!("unrecognized sensor \"{}\"", sensor)));
                }
            }
            requested
        };

        self.channels = selected
            .iter()
            .map(|sensor| format!("{}-{}", sensor, reference))
            .collect();
        self.reference = reference.to_string();
        Ok(())
    }
}

impl Headset for ScriptedHeadset {
    fn set_message_callback(&mut self) -> DeviceResult<()> {
        self.record(DeviceCall::SetMessageCallback)
    }

    fn set_verbosity(&mut self, level: i32) -> DeviceResult<()> {
        self.record(DeviceCall::SetVerbosity(level))
    }

    fn connect(&mut self, port: Option<&str>) -> DeviceResult<()> {
        self.record(DeviceCall::Connect(port.map(str::to_string)))?;
        self.connected = true;
        let reference = self.script.default_reference.clone();
        self.select(None, &reference)
    }

    fn choose_channels(
        &mut self,
        montage: Option<&str>,
        reference: Option<&str>,
    ) -> DeviceResult<()> {
        self.record(DeviceCall::ChooseChannels {
            montage: montage.map(str::to_string),
            reference: reference.map(str::to_string),
        })?;
        self.require_connected()?;
        let reference = reference
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.script.default_reference.clone());
        self.select(montage, &reference)
    }

    fn info_string(&self) -> DeviceResult<String> {
        self.record(DeviceCall::InfoString)?;
        self.require_connected()?;
        Ok(format!(
            "Scripted DSI headset, {} channels at {} Hz, reference {}",
            self.channels.len(),
            self.script.sampling_rate,
            self.reference
        ))
    }

    fn channel_count(&self) -> DeviceResult<usize> {
        self.record(DeviceCall::ChannelCount)?;
        Ok(self.channels.len())
    }

    fn sampling_rate(&self) -> DeviceResult<f64> {
        self.record(DeviceCall::SamplingRate)?;
        Ok(self.script.sampling_rate)
    }

    fn channel_label(&self, index: usize) -> DeviceResult<String> {
        self.record(DeviceCall::ChannelLabel(index))?;
        self.channels
            .get(index)
            .cloned()
            .ok_or_else(|| DeviceError::api(format!("channel index {} out of range", index)))
    }

    fn reference_label(&self) -> DeviceResult<String> {
        self.record(DeviceCall::ReferenceLabel)?;
        Ok(self.reference.clone())
    }

    fn set_sample_callback(&mut self, enabled: bool) -> DeviceResult<()> {
        self.record(DeviceCall::SetSampleCallback(enabled))?;
        self.dispatching = enabled;
        Ok(())
    }

    fn start_acquisition(&mut self) -> DeviceResult<()> {
        self.record(DeviceCall::StartAcquisition)?;
        self.require_connected()?;
        self.acquiring = true;
        Ok(())
    }

    fn stop_acquisition(&mut self) -> DeviceResult<()> {
        self.record(DeviceCall::StopAcquisition)?;
        self.acquiring = false;
        Ok(())
    }

    fn idle(
        &mut self,
        timeout: Duration,
        on_sample: &mut dyn FnMut(&SampleFrame<'_>),
    ) -> DeviceResult<()> {
        self.record(DeviceCall::Idle(timeout))?;

        if self.acquiring && self.dispatching {
            let period = 1.0 / self.script.sampling_rate;
            for _ in 0..self.script.samples_per_idle {
                let sample = self.samples_delivered;
                let signals: Vec<f64> = (0..self.channels.len())
                    .map(|channel| scripted_signal(sample, channel))
                    .collect();
                on_sample(&SampleFrame::new(sample as f64 * period, &signals));
                self.samples_delivered += 1;
            }
        }

        self.idle_count += 1;
        if let Some(hook) = &self.script.idle_hook {
            hook(self.idle_count);
        }
        Ok(())
    }

    fn release(&mut self) -> DeviceResult<()> {
        self.record(DeviceCall::Release)?;
        self.released = true;
        self.connected = false;
        self.acquiring = false;
        self.dispatching = false;
        Ok(())
    }
}
