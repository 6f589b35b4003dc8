//! Channel count resolution policy.
//!
//! Every node carries a [`ChannelConfig`]: an explicit channel count, a
//! [`ChannelCountMode`] deciding how that count combines with the channel
//! counts of connected outputs, and a [`ChannelInterpretation`] deciding how
//! mismatched channel counts are up- or down-mixed.

use core::fmt;
use core::str::FromStr;

use crate::error::GraphError;

/// How a node input computes its channel count.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ChannelCountMode {
    /// Maximum channel count among connected outputs.
    #[default]
    Max,
    /// Like [`Max`](Self::Max), but never above the node's explicit count.
    ClampedMax,
    /// Always the node's explicit count.
    Explicit,
}

impl ChannelCountMode {
    /// Returns the mode's string form (`"max"`, `"clamped-max"`, `"explicit"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Max => "max",
            Self::ClampedMax => "clamped-max",
            Self::Explicit => "explicit",
        }
    }
}

impl fmt::Display for ChannelCountMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelCountMode {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "max" => Ok(Self::Max),
            "clamped-max" => Ok(Self::ClampedMax),
            "explicit" => Ok(Self::Explicit),
            other => Err(GraphError::invalid_state(format!(
                "unknown channel count mode '{other}'"
            ))),
        }
    }
}

/// How mismatched channel counts are converted when inputs are mixed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ChannelInterpretation {
    /// Standard speaker-layout up/down-mix (mono, stereo, quad, 5.1).
    #[default]
    Speakers,
    /// Channel-by-channel: extra channels are dropped, missing ones are silent.
    Discrete,
}

impl ChannelInterpretation {
    /// Returns the interpretation's string form (`"speakers"`, `"discrete"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Speakers => "speakers",
            Self::Discrete => "discrete",
        }
    }
}

impl fmt::Display for ChannelInterpretation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelInterpretation {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "speakers" => Ok(Self::Speakers),
            "discrete" => Ok(Self::Discrete),
            other => Err(GraphError::invalid_state(format!(
                "unknown channel interpretation '{other}'"
            ))),
        }
    }
}

/// A node's channel settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Explicit channel count, used verbatim in `Explicit` mode and as the
    /// ceiling in `ClampedMax` mode.
    pub count: usize,
    /// Count resolution mode.
    pub mode: ChannelCountMode,
    /// Up/down-mix policy.
    pub interpretation: ChannelInterpretation,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            count: 2,
            mode: ChannelCountMode::Max,
            interpretation: ChannelInterpretation::Speakers,
        }
    }
}

impl ChannelConfig {
    /// Creates an explicit configuration with the given count and interpretation.
    pub fn explicit(count: usize, interpretation: ChannelInterpretation) -> Self {
        Self {
            count,
            mode: ChannelCountMode::Explicit,
            interpretation,
        }
    }

    /// Computes an input's channel count from the channel counts of the
    /// outputs currently connected to it.
    ///
    /// With nothing connected, `Max` resolves to a single channel.
    pub fn computed_channels(&self, connected: impl IntoIterator<Item = usize>) -> usize {
        let max = || connected.into_iter().max().unwrap_or(1).max(1);
        match self.mode {
            ChannelCountMode::Explicit => self.count,
            ChannelCountMode::Max => max(),
            ChannelCountMode::ClampedMax => max().min(self.count),
        }
    }
}

/// Validates an explicit channel count against a ceiling.
pub fn validate_channel_count(count: usize, max_channels: usize) -> Result<usize, GraphError> {
    if count == 0 || count > max_channels {
        return Err(GraphError::InvalidChannelCount(count));
    }
    Ok(count)
}
