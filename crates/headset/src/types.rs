//! Shared device-layer types

/// One ready sample, as seen during an idle pump
///
/// Holds the instantaneous signal value of every active channel, in the
/// device's channel enumeration order.
#[derive(Debug, Clone, Copy)]
pub struct SampleFrame<'a> {
    packet_offset: f64,
    signals: &'a [f64],
}

impl<'a> SampleFrame<'a> {
    /// Create a frame over per-channel signal values
    pub fn new(packet_offset: f64, signals: &'a [f64]) -> Self {
        Self {
            packet_offset,
            signals,
        }
    }

    /// Offset of the originating packet, in seconds, as reported by the device
    pub fn packet_offset(&self) -> f64 {
        self.packet_offset
    }

    /// Number of channels carried by this frame
    pub fn channel_count(&self) -> usize {
        self.signals.len()
    }

    /// Signal value of one channel
    pub fn signal(&self, index: usize) -> Option<f64> {
        self.signals.get(index).copied()
    }

    /// All signal values in channel order
    pub fn signals(&self) -> &'a [f64] {
        self.signals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_accessors() {
        let values = [1.5, -2.0, 3.25];
        let frame = SampleFrame::new(0.004, &values);

        assert_eq!(frame.channel_count(), 3);
        assert_eq!(frame.signal(1), Some(-2.0));
        assert_eq!(frame.signal(3), None);
        assert_eq!(frame.packet_offset(), 0.004);
        assert_eq!(frame.signals(), &values);
    }
}
