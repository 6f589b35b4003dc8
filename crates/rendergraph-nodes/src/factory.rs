//! Typed node constructors on [`RenderContext`].
//!
//! Each constructor registers the processor, adds its ports and sets its
//! channel policy, and returns a handle that derefs to [`AudioNode`] plus
//! whatever parameters the node exposes.

use core::ops::Deref;
use std::sync::Arc;

use rendergraph_core::channel::validate_channel_count;
use rendergraph_core::{
    AudioNode, ChannelCountMode, ChannelInterpretation, GraphError, NodeType, OutputChannels,
    RenderContext,
};

use crate::effect::{Delay, Gain};
use crate::inspector::{Inspector, InspectorState};
use crate::param::Param;
use crate::routing::{ChannelMerger, ChannelSplitter};
use crate::source::{ConstantSource, Oscillator};

/// Longest delay a delay node accepts, in seconds.
pub const MAX_DELAY_TIME: f64 = 180.0;

macro_rules! node_handle {
    ($(#[$meta:meta])* $name:ident { $($field:ident: $ty:ty),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Debug)]
        pub struct $name {
            node: AudioNode,
            $($field: $ty,)*
        }

        impl Deref for $name {
            type Target = AudioNode;

            fn deref(&self) -> &AudioNode {
                &self.node
            }
        }

        impl AsRef<AudioNode> for $name {
            fn as_ref(&self) -> &AudioNode {
                &self.node
            }
        }

        impl From<$name> for AudioNode {
            fn from(handle: $name) -> AudioNode {
                handle.node
            }
        }
    };
}

node_handle!(
    /// Handle to a constant source node.
    ConstantSourceNode { offset: Arc<Param> }
);

impl ConstantSourceNode {
    /// The emitted value.
    pub fn offset(&self) -> &Param {
        &self.offset
    }
}

node_handle!(
    /// Handle to a sine oscillator node.
    OscillatorNode { frequency: Arc<Param> }
);

impl OscillatorNode {
    /// Oscillator frequency in Hz.
    pub fn frequency(&self) -> &Param {
        &self.frequency
    }
}

node_handle!(
    /// Handle to a gain node.
    GainNode { gain: Arc<Param> }
);

impl GainNode {
    /// Linear gain factor.
    pub fn gain(&self) -> &Param {
        &self.gain
    }
}

node_handle!(
    /// Handle to a delay node.
    DelayNode { delay_time: Arc<Param> }
);

impl DelayNode {
    /// Delay in seconds.
    pub fn delay_time(&self) -> &Param {
        &self.delay_time
    }
}

node_handle!(
    /// Handle to an inspector node.
    InspectorNode { state: Arc<InspectorState> }
);

impl InspectorNode {
    /// Peak absolute sample of the most recent quantum.
    pub fn peak(&self) -> f32 {
        self.state.peak()
    }

    /// Number of quanta inspected so far.
    pub fn quanta(&self) -> u64 {
        self.state.quanta()
    }
}

/// Node constructors for a [`RenderContext`].
pub trait ContextExt {
    /// Creates a mono constant source. With `stop_after`, the source plays
    /// that many frames and then finishes.
    fn create_constant_source(
        &self,
        offset: f32,
        stop_after: Option<u64>,
    ) -> Result<ConstantSourceNode, GraphError>;

    /// Creates a mono sine oscillator. With `stop_after`, it plays that many
    /// frames and then finishes.
    fn create_oscillator(
        &self,
        frequency: f32,
        stop_after: Option<u64>,
    ) -> Result<OscillatorNode, GraphError>;

    /// Creates a gain node.
    fn create_gain(&self, gain: f32) -> Result<GainNode, GraphError>;

    /// Creates a delay node of `channels` channels holding up to
    /// `max_delay_time` seconds.
    fn create_delay(&self, max_delay_time: f64, channels: usize) -> Result<DelayNode, GraphError>;

    /// Creates a splitter with one mono output per input channel.
    fn create_channel_splitter(&self, outputs: usize) -> Result<AudioNode, GraphError>;

    /// Creates a merger with one mono input per output channel.
    fn create_channel_merger(&self, inputs: usize) -> Result<AudioNode, GraphError>;

    /// Creates a pass-through inspector that is processed every quantum.
    fn create_inspector(&self) -> Result<InspectorNode, GraphError>;
}

impl ContextExt for RenderContext {
    fn create_constant_source(
        &self,
        offset: f32,
        stop_after: Option<u64>,
    ) -> Result<ConstantSourceNode, GraphError> {
        let offset = Arc::new(Param::new(offset, f32::MIN, f32::MAX));
        let node = self.create_node(
            NodeType::ConstantSource,
            Box::new(ConstantSource::new(Arc::clone(&offset), stop_after)),
        );
        node.add_output(OutputChannels::Fixed(1))?;
        Ok(ConstantSourceNode { node, offset })
    }

    fn create_oscillator(
        &self,
        frequency: f32,
        stop_after: Option<u64>,
    ) -> Result<OscillatorNode, GraphError> {
        let nyquist = self.sample_rate() / 2.0;
        let frequency = Arc::new(Param::new(frequency, 0.0, nyquist));
        let node = self.create_node(
            NodeType::Oscillator,
            Box::new(Oscillator::new(Arc::clone(&frequency), stop_after)),
        );
        node.add_output(OutputChannels::Fixed(1))?;
        Ok(OscillatorNode { node, frequency })
    }

    fn create_gain(&self, gain: f32) -> Result<GainNode, GraphError> {
        let gain = Arc::new(Param::new(gain, f32::MIN, f32::MAX));
        let node = self.create_node(NodeType::Gain, Box::new(Gain::new(Arc::clone(&gain))));
        node.add_input()?;
        node.add_output(OutputChannels::FollowInput(0))?;
        Ok(GainNode { node, gain })
    }

    fn create_delay(&self, max_delay_time: f64, channels: usize) -> Result<DelayNode, GraphError> {
        if !(max_delay_time > 0.0 && max_delay_time <= MAX_DELAY_TIME) {
            return Err(GraphError::invalid_state(format!(
                "maximum delay time {max_delay_time} s is outside (0, {MAX_DELAY_TIME}]"
            )));
        }
        let channels = validate_channel_count(channels, self.options().max_channels)?;
        let delay_time = Arc::new(Param::new(0.0, 0.0, max_delay_time as f32));
        let node = self.create_node(
            NodeType::Delay,
            Box::new(Delay::new(Arc::clone(&delay_time), max_delay_time, channels)),
        );
        node.add_input()?;
        node.add_output(OutputChannels::FollowInput(0))?;
        node.set_channel_count(channels)?;
        node.set_internal_channel_count_mode(ChannelCountMode::Explicit)?;
        Ok(DelayNode { node, delay_time })
    }

    fn create_channel_splitter(&self, outputs: usize) -> Result<AudioNode, GraphError> {
        let outputs = validate_channel_count(outputs, self.options().max_channels)?;
        let node = self.create_node(NodeType::ChannelSplitter, Box::new(ChannelSplitter));
        node.add_input()?;
        for _ in 0..outputs {
            node.add_output(OutputChannels::Fixed(1))?;
        }
        node.set_channel_count(outputs)?;
        node.set_internal_channel_count_mode(ChannelCountMode::Explicit)?;
        node.set_internal_channel_interpretation(ChannelInterpretation::Discrete)?;
        Ok(node)
    }

    fn create_channel_merger(&self, inputs: usize) -> Result<AudioNode, GraphError> {
        let inputs = validate_channel_count(inputs, self.options().max_channels)?;
        let node = self.create_node(NodeType::ChannelMerger, Box::new(ChannelMerger));
        for _ in 0..inputs {
            node.add_input()?;
        }
        node.add_output(OutputChannels::Fixed(inputs))?;
        node.set_channel_count(1)?;
        node.set_internal_channel_count_mode(ChannelCountMode::Explicit)?;
        Ok(node)
    }

    fn create_inspector(&self) -> Result<InspectorNode, GraphError> {
        let state = Arc::new(InspectorState::default());
        let node = self.create_node(
            NodeType::BasicInspector,
            Box::new(Inspector::new(Arc::clone(&state))),
        );
        node.add_input()?;
        node.add_output(OutputChannels::FollowInput(0))?;
        Ok(InspectorNode { node, state })
    }
}
