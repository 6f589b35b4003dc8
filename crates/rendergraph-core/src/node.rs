//! Graph nodes: identity, per-node state, and the control-side handle.
//!
//! Each node in the graph is a [`NodeData`] owned by the graph registry behind
//! the graph lock. Callers never hold it directly; they hold an [`AudioNode`],
//! a reference-counted handle that locks the graph for every operation.
//!
//! Cloning an `AudioNode` adds a [`RefType::Normal`] reference and dropping it
//! releases one. Releasing never locks; once the node is also disconnected
//! from the graph it is queued for finalization under the lock.

use core::fmt;
use std::sync::Arc;

use crate::bus::AudioBus;
use crate::channel::{ChannelConfig, ChannelCountMode, ChannelInterpretation};
use crate::context::{ContextShared, RenderContext};
use crate::error::GraphError;
use crate::port::{NodeInput, NodeOutput, OutputChannels};
use crate::processor::AudioProcessor;
use crate::refcount::{DualRefCount, RefType};
use crate::RENDER_QUANTUM_FRAMES;

/// Unique identifier for a node in a render context.
///
/// Node IDs are assigned sequentially and never reused within a context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// The kind of a node, fixed at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeType {
    /// Unclassified node.
    Unknown,
    /// The context's final sink.
    Destination,
    /// Periodic waveform source.
    Oscillator,
    /// Plays a pre-rendered buffer.
    BufferSource,
    /// Emits a constant value.
    ConstantSource,
    /// Scales its input.
    Gain,
    /// Delays its input.
    Delay,
    /// Splits channels onto separate outputs.
    ChannelSplitter,
    /// Merges inputs into the channels of one output.
    ChannelMerger,
    /// Measures its input.
    Analyser,
    /// Passes audio through while observing it.
    BasicInspector,
    /// Application-defined node.
    Custom,
}

impl NodeType {
    /// Returns the node type's display name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "UnknownNode",
            Self::Destination => "AudioDestinationNode",
            Self::Oscillator => "OscillatorNode",
            Self::BufferSource => "AudioBufferSourceNode",
            Self::ConstantSource => "ConstantSourceNode",
            Self::Gain => "GainNode",
            Self::Delay => "DelayNode",
            Self::ChannelSplitter => "ChannelSplitterNode",
            Self::ChannelMerger => "ChannelMergerNode",
            Self::Analyser => "AnalyserNode",
            Self::BasicInspector => "BasicInspectorNode",
            Self::Custom => "CustomNode",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Internal state of one node. Only touched under the graph lock.
pub(crate) struct NodeData {
    pub node_type: NodeType,
    pub sample_rate: f32,
    pub refs: Arc<DualRefCount>,
    pub processor: Box<dyn AudioProcessor>,
    pub inputs: Vec<NodeInput>,
    pub outputs: Vec<NodeOutput>,
    pub channel_config: ChannelConfig,
    pub initialized: bool,
    /// Outputs read as silence and processing is skipped, but buffers stay
    /// allocated so the node can be re-enabled cheaply.
    pub disabled: bool,
    pub finished: bool,
    /// Quantum index of the last `process_if_necessary` visit.
    pub last_processed_quantum: Option<u64>,
    /// End time (seconds) of the last quantum with non-silent input.
    pub last_non_silent_time: f64,
}

impl NodeData {
    pub fn new(
        node_type: NodeType,
        sample_rate: f32,
        refs: Arc<DualRefCount>,
        processor: Box<dyn AudioProcessor>,
    ) -> Self {
        Self {
            node_type,
            sample_rate,
            refs,
            processor,
            inputs: Vec::new(),
            outputs: Vec::new(),
            channel_config: ChannelConfig::default(),
            initialized: false,
            disabled: false,
            finished: false,
            last_processed_quantum: None,
            last_non_silent_time: -1.0,
        }
    }

    pub fn add_input(&mut self) -> Result<usize, GraphError> {
        if self.initialized {
            return Err(GraphError::invalid_state(
                "inputs must be added before the node is initialized",
            ));
        }
        self.inputs.push(NodeInput::new());
        Ok(self.inputs.len() - 1)
    }

    pub fn add_output(&mut self, policy: OutputChannels) -> Result<usize, GraphError> {
        if self.initialized {
            return Err(GraphError::invalid_state(
                "outputs must be added before the node is initialized",
            ));
        }
        if let OutputChannels::FollowInput(input) = policy
            && input >= self.inputs.len()
        {
            return Err(GraphError::InputIndexOutOfRange {
                index: input,
                count: self.inputs.len(),
            });
        }
        self.outputs.push(NodeOutput::new(policy));
        Ok(self.outputs.len() - 1)
    }

    /// Allocates port buffers and initializes the processor.
    ///
    /// Input channel counts start from the node's configuration with nothing
    /// connected and are refined on the next resolution.
    pub fn initialize(&mut self) {
        if self.initialized {
            return;
        }
        let config = self.channel_config;
        for input in &mut self.inputs {
            input.channels = config.computed_channels(core::iter::empty());
            input.bus = AudioBus::new(input.channels, RENDER_QUANTUM_FRAMES);
            input.dirty = true;
        }
        for index in 0..self.outputs.len() {
            let channels = match self.outputs[index].policy {
                OutputChannels::Fixed(n) => n,
                OutputChannels::FollowInput(input) => self.inputs[input].channels,
            };
            let output = &mut self.outputs[index];
            output.channels = channels;
            output.bus = AudioBus::new(channels, RENDER_QUANTUM_FRAMES);
        }
        self.processor.initialize(self.sample_rate);
        self.last_processed_quantum = None;
        self.initialized = true;
    }

    /// Releases port buffers. Connections are kept.
    pub fn uninitialize(&mut self) {
        if !self.initialized {
            return;
        }
        self.processor.uninitialize();
        for input in &mut self.inputs {
            input.bus = AudioBus::empty();
        }
        for output in &mut self.outputs {
            output.bus = AudioBus::empty();
        }
        self.initialized = false;
    }

    /// Returns true if the node's outputs carry its processed signal.
    #[inline]
    pub fn is_producing(&self) -> bool {
        self.initialized && !self.disabled
    }

    pub fn inputs_are_silent(&self) -> bool {
        self.inputs.iter().all(|input| input.bus.is_silent())
    }

    pub fn silence_outputs(&mut self) {
        for output in &mut self.outputs {
            output.bus.zero();
        }
    }

    pub fn unsilence_outputs(&mut self) {
        for output in &mut self.outputs {
            output.bus.clear_silent_flag();
        }
    }

    /// Marks every input for channel re-resolution.
    pub fn update_channels_for_inputs(&mut self) {
        for input in &mut self.inputs {
            input.dirty = true;
        }
    }

    pub fn has_connections(&self) -> bool {
        self.inputs.iter().any(|i| !i.connections.is_empty())
            || self.outputs.iter().any(|o| !o.connections.is_empty())
    }
}

/// Control-side handle to a node.
///
/// Every method takes the graph lock for its duration, so calling one while
/// holding a [`GraphGuard`](crate::GraphGuard) on the same context deadlocks;
/// use the guard's methods instead.
pub struct AudioNode {
    pub(crate) shared: Arc<ContextShared>,
    pub(crate) id: NodeId,
    pub(crate) node_type: NodeType,
    pub(crate) refs: Arc<DualRefCount>,
}

impl AudioNode {
    /// Wraps a freshly registered node, taking one control-side reference.
    pub(crate) fn adopt(
        shared: Arc<ContextShared>,
        id: NodeId,
        node_type: NodeType,
        refs: Arc<DualRefCount>,
    ) -> Self {
        refs.add_ref(RefType::Normal);
        Self {
            shared,
            id,
            node_type,
            refs,
        }
    }

    /// Returns the node's identifier.
    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Returns the node's type.
    #[inline]
    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    /// Returns the owning context.
    pub fn context(&self) -> RenderContext {
        RenderContext::from_shared(Arc::clone(&self.shared))
    }

    /// Returns the node's sample rate in Hz.
    pub fn sample_rate(&self) -> f32 {
        self.shared.sample_rate()
    }

    /// Returns the current count of the given reference kind.
    pub fn ref_count(&self, ref_type: RefType) -> u32 {
        self.refs.count(ref_type)
    }

    /// Returns true once both reference counts have reached zero.
    pub fn is_marked_for_deletion(&self) -> bool {
        self.refs.is_marked_for_deletion()
    }

    // --- Topology ---

    /// Adds an input port. Fails once the node is initialized.
    pub fn add_input(&self) -> Result<usize, GraphError> {
        self.shared.lock().add_input(self)
    }

    /// Adds an output port. Fails once the node is initialized.
    pub fn add_output(&self, channels: OutputChannels) -> Result<usize, GraphError> {
        self.shared.lock().add_output(self, channels)
    }

    /// Connects output `output` of this node to input `input` of `target`.
    ///
    /// Connecting an already-connected pair is a no-op.
    pub fn connect(&self, target: &AudioNode, output: usize, input: usize) -> Result<(), GraphError> {
        self.shared.lock().connect(self, target, output, input)
    }

    /// Removes every edge leaving output `output`.
    pub fn disconnect(&self, output: usize) -> Result<(), GraphError> {
        self.shared.lock().disconnect(self, output)
    }

    /// Removes every edge leaving any output of this node.
    pub fn disconnect_all(&self) -> Result<(), GraphError> {
        self.shared.lock().disconnect_all(self)
    }

    /// Removes every edge from this node to `target`.
    pub fn disconnect_from(&self, target: &AudioNode) -> Result<(), GraphError> {
        self.shared.lock().disconnect_from(self, target)
    }

    /// Returns the number of input ports.
    pub fn number_of_inputs(&self) -> usize {
        self.shared.lock().number_of_inputs(self).unwrap_or(0)
    }

    /// Returns the number of output ports.
    pub fn number_of_outputs(&self) -> usize {
        self.shared.lock().number_of_outputs(self).unwrap_or(0)
    }

    // --- Lifecycle ---

    /// Allocates buffers and initializes the processor.
    pub fn initialize(&self) -> Result<(), GraphError> {
        self.shared.lock().initialize(self)
    }

    /// Releases buffers; the node renders silence until re-initialized.
    pub fn uninitialize(&self) -> Result<(), GraphError> {
        self.shared.lock().uninitialize(self)
    }

    /// Initializes the node unless it already is.
    pub fn lazy_initialize(&self) -> Result<(), GraphError> {
        self.shared.lock().initialize(self)
    }

    /// Returns true if the node is initialized.
    pub fn is_initialized(&self) -> bool {
        self.shared.lock().is_initialized(self).unwrap_or(false)
    }

    /// Returns true if the node's outputs are disabled.
    pub fn is_disabled(&self) -> bool {
        self.shared.lock().is_disabled(self).unwrap_or(false)
    }

    /// Clears the processor's DSP state.
    pub fn reset(&self) -> Result<(), GraphError> {
        self.shared.lock().reset(self)
    }

    // --- Channel configuration ---

    /// Returns the explicit channel count.
    pub fn channel_count(&self) -> usize {
        self.shared
            .lock()
            .channel_config(self)
            .map_or(0, |config| config.count)
    }

    /// Sets the explicit channel count.
    pub fn set_channel_count(&self, count: usize) -> Result<(), GraphError> {
        self.shared.lock().set_channel_count(self, count)
    }

    /// Returns the channel count mode.
    pub fn channel_count_mode(&self) -> ChannelCountMode {
        self.shared
            .lock()
            .channel_config(self)
            .map(|config| config.mode)
            .unwrap_or_default()
    }

    /// Sets the channel count mode from its string form
    /// (`"max"`, `"clamped-max"` or `"explicit"`).
    pub fn set_channel_count_mode(&self, mode: &str) -> Result<(), GraphError> {
        let mode = mode.parse()?;
        self.set_internal_channel_count_mode(mode)
    }

    /// Sets the channel count mode.
    pub fn set_internal_channel_count_mode(&self, mode: ChannelCountMode) -> Result<(), GraphError> {
        self.shared.lock().set_channel_count_mode(self, mode)
    }

    /// Returns the channel interpretation.
    pub fn channel_interpretation(&self) -> ChannelInterpretation {
        self.shared
            .lock()
            .channel_config(self)
            .map(|config| config.interpretation)
            .unwrap_or_default()
    }

    /// Sets the channel interpretation from its string form
    /// (`"speakers"` or `"discrete"`).
    pub fn set_channel_interpretation(&self, interpretation: &str) -> Result<(), GraphError> {
        let interpretation = interpretation.parse()?;
        self.set_internal_channel_interpretation(interpretation)
    }

    /// Sets the channel interpretation.
    pub fn set_internal_channel_interpretation(
        &self,
        interpretation: ChannelInterpretation,
    ) -> Result<(), GraphError> {
        self.shared
            .lock()
            .set_channel_interpretation(self, interpretation)
    }

    /// Returns the resolved channel count of input `input`.
    pub fn input_channel_count(&self, input: usize) -> Result<usize, GraphError> {
        self.shared.lock().input_channel_count(self, input)
    }

    /// Returns the resolved channel count of output `output`.
    pub fn output_channel_count(&self, output: usize) -> Result<usize, GraphError> {
        self.shared.lock().output_channel_count(self, output)
    }
}

impl Clone for AudioNode {
    fn clone(&self) -> Self {
        self.refs.add_ref(RefType::Normal);
        Self {
            shared: Arc::clone(&self.shared),
            id: self.id,
            node_type: self.node_type,
            refs: Arc::clone(&self.refs),
        }
    }
}

impl Drop for AudioNode {
    fn drop(&mut self) {
        self.shared.release(self.id, &self.refs, RefType::Normal);
    }
}

impl PartialEq for AudioNode {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared) && self.id == other.id
    }
}

impl Eq for AudioNode {}

impl fmt::Debug for AudioNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioNode")
            .field("id", &self.id)
            .field("node_type", &self.node_type)
            .field("script_refs", &self.refs.script_refs())
            .field("connection_refs", &self.refs.connection_refs())
            .finish()
    }
}
