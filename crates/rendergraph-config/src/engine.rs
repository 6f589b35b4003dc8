//! Engine configuration file format and operations.

use serde::{Deserialize, Serialize};
use std::path::Path;

use rendergraph_core::{ContextOptions, MAX_CHANNELS};

use crate::error::ConfigError;

/// Configuration of a render context and the demo graph rendered on it.
///
/// Every section and field is optional in the file; missing values take
/// their defaults.
///
/// # TOML Format
///
/// ```toml
/// [context]
/// sample_rate = 48000.0
/// channels = 2
/// max_channels = 32
///
/// [render]
/// quanta = 375
/// realtime = false
///
/// [graph]
/// voices = 4
/// base_frequency = 220.0
/// gain = 0.2
/// feedback_delay = 0.25
/// feedback = 0.4
///
/// [logging]
/// filter = "info"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Render context construction parameters.
    pub context: ContextSection,
    /// How long and how fast to render.
    pub render: RenderSection,
    /// Shape of the demo graph.
    pub graph: GraphSection,
    /// Log filter.
    pub logging: LoggingSection,
}

/// `[context]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ContextSection {
    /// Sample rate in Hz.
    pub sample_rate: f32,
    /// Destination channel count.
    pub channels: usize,
    /// Ceiling for any node's channel count.
    pub max_channels: usize,
}

impl Default for ContextSection {
    fn default() -> Self {
        let options = ContextOptions::default();
        Self {
            sample_rate: options.sample_rate,
            channels: options.channels,
            max_channels: options.max_channels,
        }
    }
}

/// `[render]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderSection {
    /// Number of render quanta to produce.
    pub quanta: u64,
    /// Pace rendering to wall-clock time instead of running flat out.
    pub realtime: bool,
}

impl Default for RenderSection {
    fn default() -> Self {
        Self {
            // One second at 48 kHz.
            quanta: 375,
            realtime: false,
        }
    }
}

/// `[graph]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GraphSection {
    /// Oscillator voices fanned into the mix bus.
    pub voices: usize,
    /// Frequency of the first voice in Hz; further voices step up by fifths.
    pub base_frequency: f32,
    /// Mix bus gain.
    pub gain: f32,
    /// Feedback delay time in seconds. Zero removes the feedback loop.
    pub feedback_delay: f32,
    /// Gain of the feedback path.
    pub feedback: f32,
}

impl Default for GraphSection {
    fn default() -> Self {
        Self {
            voices: 4,
            base_frequency: 220.0,
            gain: 0.2,
            feedback_delay: 0.25,
            feedback: 0.4,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSection {
    /// `tracing_subscriber::EnvFilter` directive, overridden by `RUST_LOG`.
    pub filter: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml(&content)
    }

    /// Load a configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save the configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Convert the configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks every field the render context and demo graph depend on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let context = &self.context;
        if !context.sample_rate.is_finite() || context.sample_rate <= 0.0 {
            return Err(ConfigError::invalid(
                "context.sample_rate",
                format!("{} is not a positive sample rate", context.sample_rate),
            ));
        }
        if context.max_channels == 0 || context.max_channels > MAX_CHANNELS {
            return Err(ConfigError::invalid(
                "context.max_channels",
                format!("must be between 1 and {MAX_CHANNELS}"),
            ));
        }
        if context.channels == 0 || context.channels > context.max_channels {
            return Err(ConfigError::invalid(
                "context.channels",
                format!("must be between 1 and {}", context.max_channels),
            ));
        }
        if self.render.quanta == 0 {
            return Err(ConfigError::invalid("render.quanta", "must be at least 1"));
        }

        let graph = &self.graph;
        if graph.voices == 0 {
            return Err(ConfigError::invalid("graph.voices", "must be at least 1"));
        }
        let nyquist = context.sample_rate / 2.0;
        if !(graph.base_frequency > 0.0 && graph.base_frequency < nyquist) {
            return Err(ConfigError::invalid(
                "graph.base_frequency",
                format!("must be between 0 and {nyquist} Hz"),
            ));
        }
        if !graph.gain.is_finite() {
            return Err(ConfigError::invalid("graph.gain", "must be finite"));
        }
        if !(0.0..=10.0).contains(&graph.feedback_delay) {
            return Err(ConfigError::invalid(
                "graph.feedback_delay",
                "must be between 0 and 10 seconds",
            ));
        }
        if !(0.0..1.0).contains(&graph.feedback) {
            return Err(ConfigError::invalid(
                "graph.feedback",
                "must be at least 0 and below 1",
            ));
        }
        Ok(())
    }

    /// Validates the configuration and converts its `[context]` section.
    pub fn to_context_options(&self) -> Result<ContextOptions, ConfigError> {
        self.validate()?;
        let options = ContextOptions {
            sample_rate: self.context.sample_rate,
            channels: self.context.channels,
            max_channels: self.context.max_channels,
        };
        options.validate()?;
        Ok(options)
    }

    /// Rendered length in seconds.
    pub fn duration_seconds(&self) -> f64 {
        (self.render.quanta * rendergraph_core::RENDER_QUANTUM_FRAMES as u64) as f64
            / f64::from(self.context.sample_rate)
    }
}
