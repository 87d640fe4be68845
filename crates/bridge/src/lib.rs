//! Bridge from a Wearable Sensing DSI headset to a Lab Streaming Layer outlet
//!
//! The run is a single-threaded state machine: resolve options, connect and
//! configure the headset through a [`HeadsetSession`], describe the stream,
//! create the outlet, then pump the headset's idle loop. Each ready sample is
//! handed to a [`Forwarder`] which pushes it to the outlet.

pub mod config;
pub mod descriptor;
pub mod error;
pub mod forwarder;
pub mod lifecycle;
pub mod options;
pub mod outlet;
pub mod session;
pub mod test_utils;
pub mod usage;

pub use config::{BridgeConfig, Settings};
pub use descriptor::{ChannelDescriptor, StreamDescriptor, describe_stream, short_label};
pub use error::{BridgeError, OutletError, Result};
pub use forwarder::{Forwarder, SampleHandler};
pub use lifecycle::{RunSummary, run};
pub use options::{Options, ParseWarning, Resolution};
pub use outlet::{OutletFactory, StreamOutlet};
pub use session::{HeadsetSession, SessionState};
