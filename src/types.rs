use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ScopeError;

/// Analog input channel of a four-channel DS1000Z
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Channel {
    Chan1,
    Chan2,
    Chan3,
    Chan4,
}

impl Channel {
    /// All channels in ascending channel-number order
    pub const ALL: [Channel; 4] = [
        Channel::Chan1,
        Channel::Chan2,
        Channel::Chan3,
        Channel::Chan4,
    ];

    /// Display name as used in commands, e.g. `CHAN1`
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Chan1 => "CHAN1",
            Channel::Chan2 => "CHAN2",
            Channel::Chan3 => "CHAN3",
            Channel::Chan4 => "CHAN4",
        }
    }

    pub fn number(&self) -> u8 {
        match self {
            Channel::Chan1 => 1,
            Channel::Chan2 => 2,
            Channel::Chan3 => 3,
            Channel::Chan4 => 4,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CHAN1" => Ok(Channel::Chan1),
            "CHAN2" => Ok(Channel::Chan2),
            "CHAN3" => Ok(Channel::Chan3),
            "CHAN4" => Ok(Channel::Chan4),
            _ => Err(ScopeError::InvalidChannel(s.to_string())),
        }
    }
}

/// State reported by `:TRIGger:STATus?`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerStatus {
    /// Triggered
    Td,
    Wait,
    Run,
    Auto,
    Stop,
}

impl TriggerStatus {
    pub fn is_stopped(&self) -> bool {
        matches!(self, TriggerStatus::Stop)
    }
}

impl FromStr for TriggerStatus {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "TD" => Ok(TriggerStatus::Td),
            "WAIT" => Ok(TriggerStatus::Wait),
            "RUN" => Ok(TriggerStatus::Run),
            "AUTO" => Ok(TriggerStatus::Auto),
            "STOP" => Ok(TriggerStatus::Stop),
            other => Err(ScopeError::Protocol(format!(
                "Unknown trigger status: {other:?}"
            ))),
        }
    }
}

/// What the acquisition controller is currently doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcquisitionMode {
    #[default]
    Idle,
    SingleInFlight,
    LoopInFlight,
}

/// Ordered 8-bit sample codes of one channel
pub type SampleBuffer = Vec<u8>;

/// One complete multi-channel waveform snapshot.
///
/// Only contains channels that were displayed when the capture was taken.
/// Channels iterate in ascending channel-number order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capture {
    acquired_at: DateTime<Utc>,
    channels: BTreeMap<Channel, SampleBuffer>,
}

impl Capture {
    /// Build a capture from per-channel sample buffers, stamped with the current time
    pub fn new(channels: impl IntoIterator<Item = (Channel, SampleBuffer)>) -> Self {
        Self::with_timestamp(Utc::now(), channels)
    }

    pub fn with_timestamp(
        acquired_at: DateTime<Utc>,
        channels: impl IntoIterator<Item = (Channel, SampleBuffer)>,
    ) -> Self {
        Self {
            acquired_at,
            channels: channels.into_iter().collect(),
        }
    }

    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    pub fn get(&self, channel: Channel) -> Option<&[u8]> {
        self.channels.get(&channel).map(Vec::as_slice)
    }

    /// Channels present in this capture
    pub fn channels(&self) -> impl Iterator<Item = Channel> + '_ {
        self.channels.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Channel, &[u8])> + '_ {
        self.channels.iter().map(|(ch, data)| (*ch, data.as_slice()))
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Longest sample buffer across all channels
    pub fn sample_count(&self) -> usize {
        self.channels.values().map(Vec::len).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// New capture with every channel sliced to `[start, end)`.
    ///
    /// Bounds are clamped to each buffer; an inverted range gives empty buffers.
    pub fn cut(&self, start: usize, end: usize) -> Capture {
        let channels = self.channels.iter().map(|(ch, data)| {
            let stop = end.min(data.len());
            let begin = start.min(stop);
            (*ch, data[begin..stop].to_vec())
        });
        Capture::with_timestamp(self.acquired_at, channels)
    }
}
