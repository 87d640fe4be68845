//! Per-sample forwarding from the headset to the outlet

use crate::error::OutletError;
use crate::outlet::StreamOutlet;
use headset::SampleFrame;

/// Receives every sample the headset delivers while acquisition runs
///
/// Handlers run synchronously inside the session's idle pump. An error
/// stops the pump and triggers the shutdown sequence.
pub trait SampleHandler {
    fn on_sample(&mut self, frame: &SampleFrame<'_>) -> Result<(), OutletError>;
}

/// Copies each frame into a fixed buffer and pushes it to the outlet
pub struct Forwarder {
    outlet: Box<dyn StreamOutlet>,
    buffer: Vec<f32>,
    pushed: u64,
}

impl Forwarder {
    /// The buffer is sized once here and never resized
    pub fn new(outlet: Box<dyn StreamOutlet>, channel_count: usize) -> Self {
        Self {
            outlet,
            buffer: vec![0.0; channel_count],
            pushed: 0,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.buffer.len()
    }

    /// Samples pushed so far
    pub fn samples_pushed(&self) -> u64 {
        self.pushed
    }
}

impl SampleHandler for Forwarder {
    fn on_sample(&mut self, frame: &SampleFrame<'_>) -> Result<(), OutletError> {
        if frame.channel_count() != self.buffer.len() {
            return Err(OutletError::ChannelMismatch {
                expected: self.buffer.len(),
                actual: frame.channel_count(),
            });
        }

        for (slot, value) in self.buffer.iter_mut().zip(frame.signals()) {
            *slot = *value as f32;
        }

        self.outlet.push_sample(&self.buffer)?;
        self.pushed += 1;
        Ok(())
    }
}
