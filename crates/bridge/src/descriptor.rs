//! Stream metadata built from the configured headset

use crate::error::Result;
use crate::session::HeadsetSession;
use headset::Headset;
use rand::Rng;
use tracing::info;

pub const CONTENT_TYPE: &str = "EEG";
pub const MANUFACTURER: &str = "WearableSensing";
pub const CHANNEL_UNIT: &str = "microvolts";

/// Seconds of samples the outlet keeps for late consumers
pub const MAX_BUFFERED_SECS: i32 = 360;

/// Length of the random source identifier
pub const SOURCE_ID_LEN: usize = 16;

const SOURCE_ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Metadata of one published channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDescriptor {
    pub label: String,
    pub unit: String,
    pub kind: String,
}

impl ChannelDescriptor {
    /// An EEG channel in microvolts
    pub fn eeg(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            unit: CHANNEL_UNIT.to_string(),
            kind: CONTENT_TYPE.to_string(),
        }
    }
}

/// Everything an outlet factory needs to publish the stream
///
/// Channel order matches the device's channel enumeration and stays fixed
/// for the rest of the run.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamDescriptor {
    pub name: String,
    pub content_type: String,
    pub sampling_rate: f64,
    pub source_id: String,
    pub manufacturer: String,
    pub channels: Vec<ChannelDescriptor>,
    /// Resolved reference label reported by the device
    pub reference: String,
    /// Lookback buffer in seconds
    pub max_buffered: i32,
    /// 0 lets the sink pick its chunking
    pub chunk_size: i32,
}

impl StreamDescriptor {
    pub fn new(
        name: impl Into<String>,
        sampling_rate: f64,
        source_id: String,
        channels: Vec<ChannelDescriptor>,
        reference: String,
    ) -> Self {
        Self {
            name: name.into(),
            content_type: CONTENT_TYPE.to_string(),
            sampling_rate,
            source_id,
            manufacturer: MANUFACTURER.to_string(),
            channels,
            reference,
            max_buffered: MAX_BUFFERED_SECS,
            chunk_size: 0,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.channels.iter().map(|c| c.label.as_str())
    }
}

/// Cut a raw channel name at its first `-`
///
/// `"Cz-Pz"` becomes `"Cz"`. Leading separators are skipped, so `"-Cz"`
/// also gives `"Cz"`; a name made only of separators is kept as is.
pub fn short_label(raw: &str) -> &str {
    raw.split('-').find(|part| !part.is_empty()).unwrap_or(raw)
}

/// Random alphabetic stream source identifier
pub fn random_source_id(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| SOURCE_ID_ALPHABET[rng.random_range(0..SOURCE_ID_ALPHABET.len())] as char)
        .collect()
}

/// Query the configured headset and build the stream description
pub fn describe_stream<H: Headset>(
    session: &mut HeadsetSession<H>,
    name: &str,
) -> Result<StreamDescriptor> {
    let channel_count = session.channel_count()?;
    let sampling_rate = session.sampling_rate()?;

    let mut channels = Vec::with_capacity(channel_count);
    for index in 0..channel_count {
        let raw = session.channel_label(index)?;
        channels.push(ChannelDescriptor::eeg(short_label(&raw)));
    }

    let reference = session.reference_label()?;
    info!("REF: {}", reference);

    Ok(StreamDescriptor::new(
        name,
        sampling_rate,
        random_source_id(SOURCE_ID_LEN),
        channels,
        reference,
    ))
}
