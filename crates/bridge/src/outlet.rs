//! Stream outlet abstraction
//!
//! The bridge only needs two things from its sink: create an outlet from a
//! [`StreamDescriptor`], then push fixed-length float samples into it. The
//! LSL backend lives behind the `lsl` feature because liblsl is built from
//! source by its sys crate.

use crate::descriptor::StreamDescriptor;
use crate::error::OutletError;

/// A live stream outlet
pub trait StreamOutlet {
    /// Push one sample, timestamped by the sink at push time
    // matches the sink's `Pushable<Vec<f32>>`
    #[allow(clippy::ptr_arg)]
    fn push_sample(&mut self, sample: &Vec<f32>) -> Result<(), OutletError>;
}

/// Creates outlets from stream descriptors
pub trait OutletFactory {
    fn create(&mut self, descriptor: &StreamDescriptor)
    -> Result<Box<dyn StreamOutlet>, OutletError>;
}

/// Factory for builds without a streaming backend
///
/// Always fails, so a run gets as far as building the descriptor and then
/// reports that LSL support is missing.
#[derive(Debug, Default)]
pub struct UnavailableOutletFactory;

impl OutletFactory for UnavailableOutletFactory {
    fn create(
        &mut self,
        _descriptor: &StreamDescriptor,
    ) -> Result<Box<dyn StreamOutlet>, OutletError> {
        Err(OutletError::Unsupported)
    }
}

#[cfg(feature = "lsl")]
pub use self::lsl_backend::{LslOutlet, LslOutletFactory};

#[cfg(feature = "lsl")]
mod lsl_backend {
    use super::{OutletFactory, StreamOutlet};
    use crate::descriptor::StreamDescriptor;
    use crate::error::OutletError;
    use lsl::{ChannelFormat, Pushable, StreamInfo};
    use tracing::debug;

    /// Outlet publishing on the Lab Streaming Layer
    pub struct LslOutlet {
        outlet: lsl::StreamOutlet,
    }

    impl StreamOutlet for LslOutlet {
        fn push_sample(&mut self, sample: &Vec<f32>) -> Result<(), OutletError> {
            self.outlet
                .push_sample(sample)
                .map_err(|e| OutletError::Push(format!("{:?}", e)))
        }
    }

    #[derive(Debug, Default)]
    pub struct LslOutletFactory;

    impl OutletFactory for LslOutletFactory {
        fn create(
            &mut self,
            descriptor: &StreamDescriptor,
        ) -> Result<Box<dyn StreamOutlet>, OutletError> {
            let mut info = StreamInfo::new(
                &descriptor.name,
                &descriptor.content_type,
                descriptor.channel_count() as u32,
                descriptor.sampling_rate,
                ChannelFormat::Float32,
                &descriptor.source_id,
            )
            .map_err(|e| OutletError::Create(format!("{:?}", e)))?;

            let mut desc = info.desc();
            desc.append_child_value("manufacturer", &descriptor.manufacturer);

            let mut channels = desc.append_child("channels");
            for channel in &descriptor.channels {
                let mut node = channels.append_child("channel");
                node.append_child_value("label", &channel.label);
                node.append_child_value("unit", &channel.unit);
                node.append_child_value("type", &channel.kind);
            }

            let mut reference = desc.append_child("reference");
            reference.append_child_value("label", &descriptor.reference);

            let outlet = lsl::StreamOutlet::new(
                &info,
                descriptor.chunk_size,
                descriptor.max_buffered,
            )
            .map_err(|e| OutletError::Create(format!("{:?}", e)))?;

            debug!(
                "Created LSL outlet {} ({} channels, source {})",
                descriptor.name,
                descriptor.channel_count(),
                descriptor.source_id
            );
            Ok(Box::new(LslOutlet { outlet }))
        }
    }
}

/// Default factory for this build
#[cfg(feature = "lsl")]
pub fn default_factory() -> Box<dyn OutletFactory> {
    Box::new(LslOutletFactory)
}

/// Default factory for this build
#[cfg(not(feature = "lsl"))]
pub fn default_factory() -> Box<dyn OutletFactory> {
    Box::new(UnavailableOutletFactory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ChannelDescriptor, StreamDescriptor};

    #[test]
    fn test_unavailable_factory_refuses() {
        let descriptor = StreamDescriptor::new(
            "WS-default",
            300.0,
            "ABCDEFGHIJKLMNOP".to_string(),
            vec![ChannelDescriptor::eeg("Cz")],
            "Pz".to_string(),
        );
        let result = UnavailableOutletFactory.create(&descriptor);
        assert!(matches!(result, Err(OutletError::Unsupported)));
    }
}
