//! Render context: graph lock, destination node and the render entry point.
//!
//! A [`RenderContext`] is cheap to clone and shared between the control
//! thread and the render thread. Both go through one `parking_lot::Mutex`:
//! the render thread holds it for a whole quantum in
//! [`render_quantum()`](RenderContext::render_quantum), the control thread
//! holds it for each topology mutation via [`lock()`](RenderContext::lock).
//!
//! Dropping the last handle of a node never locks. The node id goes onto a
//! lock-free queue and is finalized the next time anyone acquires the lock.

use std::collections::BTreeMap;
use std::sync::Arc;

use crossbeam_channel::{Sender, unbounded};
use parking_lot::{Mutex, MutexGuard};

use crate::bus::AudioBus;
use crate::channel::{ChannelConfig, ChannelCountMode, ChannelInterpretation};
use crate::error::GraphError;
use crate::graph::Graph;
use crate::node::{AudioNode, NodeId, NodeType};
use crate::port::OutputChannels;
use crate::processor::{AudioProcessor, ProcessScope};
use crate::refcount::{DualRefCount, RefType, Release};
use crate::{MAX_CHANNELS, RENDER_QUANTUM_FRAMES};

/// Construction parameters of a [`RenderContext`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextOptions {
    /// Sample rate in Hz shared by every node of the context.
    pub sample_rate: f32,
    /// Channel count of the destination node.
    pub channels: usize,
    /// Ceiling for any node's explicit channel count.
    pub max_channels: usize,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            channels: 2,
            max_channels: MAX_CHANNELS,
        }
    }
}

impl ContextOptions {
    /// Checks the options for consistency.
    pub fn validate(&self) -> Result<(), GraphError> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(GraphError::invalid_state(format!(
                "sample rate {} must be positive",
                self.sample_rate
            )));
        }
        if self.max_channels == 0 || self.max_channels > MAX_CHANNELS {
            return Err(GraphError::InvalidChannelCount(self.max_channels));
        }
        crate::channel::validate_channel_count(self.channels, self.max_channels)?;
        Ok(())
    }
}

/// Counters describing a context's rendering so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Render quanta completed.
    pub quanta: u64,
    /// Sample frames rendered.
    pub frames: u64,
    /// Nodes finalized and removed from the graph.
    pub finalized: u64,
    /// Nodes currently in the graph, destination included.
    pub live_nodes: usize,
}

/// State shared by a context and every node handle it created.
pub(crate) struct ContextShared {
    graph: Mutex<Graph>,
    pending_tx: Sender<NodeId>,
    destination: NodeId,
    destination_refs: Arc<DualRefCount>,
    options: ContextOptions,
}

impl ContextShared {
    /// Acquires the graph lock and finalizes every node queued since the
    /// last acquisition.
    pub(crate) fn lock(&self) -> GraphGuard<'_> {
        let mut graph = self.graph.lock();
        graph.finish_pending();
        GraphGuard {
            shared: self,
            graph,
        }
    }

    /// Releases a reference without taking the lock.
    pub(crate) fn release(&self, id: NodeId, refs: &DualRefCount, ref_type: RefType) {
        if refs.release(ref_type) == Release::Unreferenced {
            #[cfg(feature = "tracing")]
            tracing::debug!("node_release: {id} queued for finalization");
            let _ = self.pending_tx.send(id);
        }
    }

    pub(crate) fn sample_rate(&self) -> f32 {
        self.options.sample_rate
    }
}

/// Consumes the destination's input; the context reads it after traversal.
struct DestinationProcessor;

impl AudioProcessor for DestinationProcessor {
    fn process(&mut self, _scope: &mut ProcessScope<'_>) {}

    fn reset(&mut self) {}
}

/// Owner of a node graph and its render clock.
///
/// # Example
///
/// ```rust
/// use rendergraph_core::{AudioBus, ContextOptions, RenderContext, RENDER_QUANTUM_FRAMES};
///
/// let context = RenderContext::new(ContextOptions::default()).unwrap();
/// let mut out = AudioBus::new(2, RENDER_QUANTUM_FRAMES);
/// context.render_quantum(&mut out);
/// assert!(out.is_silent());
/// assert_eq!(context.current_sample_frame(), RENDER_QUANTUM_FRAMES as u64);
/// ```
#[derive(Clone)]
pub struct RenderContext {
    shared: Arc<ContextShared>,
}

impl RenderContext {
    /// Creates a context with an initialized destination node.
    pub fn new(options: ContextOptions) -> Result<Self, GraphError> {
        options.validate()?;
        let (tx, rx) = unbounded();
        let mut graph = Graph::new(options.sample_rate, options.max_channels, tx.clone(), rx);

        let (destination, refs) =
            graph.insert(NodeType::Destination, Box::new(DestinationProcessor));
        // The context's own reference; never released.
        refs.add_ref(RefType::Normal);
        graph.add_input(destination)?;
        graph.set_channel_config(
            destination,
            ChannelConfig::explicit(options.channels, ChannelInterpretation::Speakers),
        )?;
        graph.initialize(destination)?;
        graph.set_destination(destination);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "context_new: {} Hz, {} channels",
            options.sample_rate,
            options.channels
        );

        Ok(Self {
            shared: Arc::new(ContextShared {
                graph: Mutex::new(graph),
                pending_tx: tx,
                destination,
                destination_refs: refs,
                options,
            }),
        })
    }

    pub(crate) fn from_shared(shared: Arc<ContextShared>) -> Self {
        Self { shared }
    }

    /// Acquires the graph lock.
    ///
    /// Nodes whose last reference was dropped since the previous acquisition
    /// are finalized before this returns.
    pub fn lock(&self) -> GraphGuard<'_> {
        self.shared.lock()
    }

    /// Creates an uninitialized node. Add its ports before connecting it.
    pub fn create_node(&self, node_type: NodeType, processor: Box<dyn AudioProcessor>) -> AudioNode {
        let (id, refs) = self.shared.lock().graph.insert(node_type, processor);
        AudioNode::adopt(Arc::clone(&self.shared), id, node_type, refs)
    }

    /// Returns a handle to the destination node.
    pub fn destination(&self) -> AudioNode {
        AudioNode::adopt(
            Arc::clone(&self.shared),
            self.shared.destination,
            NodeType::Destination,
            Arc::clone(&self.shared.destination_refs),
        )
    }

    /// Renders one quantum of [`RENDER_QUANTUM_FRAMES`] frames into `out`.
    ///
    /// Holds the graph lock for the whole traversal and the post-render tasks
    /// that follow it.
    ///
    /// # Stack depth
    ///
    /// The traversal recurses once per node along the longest upstream path
    /// from the destination (or from an automatically pulled node). Chains of
    /// tens of thousands of nodes can exhaust a default-sized thread stack;
    /// run such graphs on a render thread spawned with a larger stack via
    /// [`std::thread::Builder::stack_size`].
    pub fn render_quantum(&self, out: &mut AudioBus) {
        self.shared.graph.lock().render(out);
    }

    /// Returns the context sample rate in Hz.
    pub fn sample_rate(&self) -> f32 {
        self.shared.options.sample_rate
    }

    /// Returns the options the context was created with.
    pub fn options(&self) -> ContextOptions {
        self.shared.options
    }

    /// Returns the number of frames rendered so far.
    pub fn current_sample_frame(&self) -> u64 {
        self.shared.graph.lock().current_frame()
    }

    /// Returns the render clock in seconds.
    pub fn current_time(&self) -> f64 {
        self.current_sample_frame() as f64 / f64::from(self.sample_rate())
    }

    /// Returns the number of live nodes per node type.
    pub fn node_counts(&self) -> BTreeMap<NodeType, usize> {
        self.lock().graph.node_counts()
    }

    /// Returns render and lifetime counters.
    pub fn stats(&self) -> RenderStats {
        let guard = self.lock();
        RenderStats {
            quanta: guard.graph.quantum(),
            frames: guard.graph.current_frame(),
            finalized: guard.graph.finalized(),
            live_nodes: guard.graph.live_nodes(),
        }
    }

    /// Returns the number of nodes waiting for the lock to be finalized.
    pub fn pending_finalization_count(&self) -> usize {
        self.shared.pending_tx.len()
    }

    /// Returns true if both handles refer to the same context.
    pub fn same_context(&self, other: &RenderContext) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl core::fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RenderContext")
            .field("options", &self.shared.options)
            .field("destination", &self.shared.destination)
            .finish()
    }
}

/// Scoped hold on the graph lock.
///
/// Every topology mutation and inspection goes through a guard. The
/// [`AudioNode`] methods acquire one per call; hold a guard yourself to batch
/// several changes so that the render thread observes them together.
///
/// Do not call `AudioNode` methods of the same context while a guard is
/// alive: they would try to take the lock again. Cloning and dropping handles
/// is fine.
pub struct GraphGuard<'a> {
    shared: &'a ContextShared,
    graph: MutexGuard<'a, Graph>,
}

impl GraphGuard<'_> {
    fn id_of(&self, node: &AudioNode) -> Result<NodeId, GraphError> {
        if !core::ptr::eq(self.shared, Arc::as_ptr(&node.shared)) {
            return Err(GraphError::ContextMismatch);
        }
        Ok(node.id)
    }

    /// Runs a mutation, then finalizes whatever it left unreferenced.
    fn mutate<T>(
        &mut self,
        f: impl FnOnce(&mut Graph) -> Result<T, GraphError>,
    ) -> Result<T, GraphError> {
        let result = f(&mut self.graph);
        self.graph.finish_pending();
        result
    }

    /// Connects output `output` of `source` to input `input` of `target`.
    pub fn connect(
        &mut self,
        source: &AudioNode,
        target: &AudioNode,
        output: usize,
        input: usize,
    ) -> Result<(), GraphError> {
        let source = self.id_of(source)?;
        let target = self.id_of(target)?;
        self.mutate(|graph| graph.connect(source, target, output, input))
    }

    /// Removes every edge leaving output `output` of `source`.
    pub fn disconnect(&mut self, source: &AudioNode, output: usize) -> Result<(), GraphError> {
        let source = self.id_of(source)?;
        self.mutate(|graph| graph.disconnect(source, output))
    }

    /// Removes every edge leaving any output of `source`.
    pub fn disconnect_all(&mut self, source: &AudioNode) -> Result<(), GraphError> {
        let source = self.id_of(source)?;
        self.mutate(|graph| graph.disconnect_all(source))
    }

    /// Removes every edge from `source` to `target`.
    pub fn disconnect_from(&mut self, source: &AudioNode, target: &AudioNode) -> Result<(), GraphError> {
        let source = self.id_of(source)?;
        let target = self.id_of(target)?;
        self.mutate(|graph| graph.disconnect_from(source, target))
    }

    /// Adds an input port to an uninitialized node.
    pub fn add_input(&mut self, node: &AudioNode) -> Result<usize, GraphError> {
        let id = self.id_of(node)?;
        self.graph.add_input(id)
    }

    /// Adds an output port to an uninitialized node.
    pub fn add_output(&mut self, node: &AudioNode, channels: OutputChannels) -> Result<usize, GraphError> {
        let id = self.id_of(node)?;
        self.graph.add_output(id, channels)
    }

    /// Initializes the node unless it already is.
    pub fn initialize(&mut self, node: &AudioNode) -> Result<(), GraphError> {
        let id = self.id_of(node)?;
        self.graph.initialize(id)
    }

    /// Releases the node's buffers. Its connections are kept.
    pub fn uninitialize(&mut self, node: &AudioNode) -> Result<(), GraphError> {
        let id = self.id_of(node)?;
        self.graph.uninitialize(id)
    }

    /// Clears the node's DSP state.
    pub fn reset(&mut self, node: &AudioNode) -> Result<(), GraphError> {
        let id = self.id_of(node)?;
        self.graph.reset(id)
    }

    /// Returns the node's channel configuration.
    pub fn channel_config(&self, node: &AudioNode) -> Result<ChannelConfig, GraphError> {
        let id = self.id_of(node)?;
        Ok(self.graph.node(id)?.channel_config)
    }

    /// Sets the explicit channel count.
    pub fn set_channel_count(&mut self, node: &AudioNode, count: usize) -> Result<(), GraphError> {
        let id = self.id_of(node)?;
        self.graph.set_channel_count(id, count)
    }

    /// Sets the channel count mode.
    pub fn set_channel_count_mode(
        &mut self,
        node: &AudioNode,
        mode: ChannelCountMode,
    ) -> Result<(), GraphError> {
        let id = self.id_of(node)?;
        self.graph.set_channel_count_mode(id, mode)
    }

    /// Sets the channel interpretation.
    pub fn set_channel_interpretation(
        &mut self,
        node: &AudioNode,
        interpretation: ChannelInterpretation,
    ) -> Result<(), GraphError> {
        let id = self.id_of(node)?;
        self.graph.set_channel_interpretation(id, interpretation)
    }

    /// Returns the resolved channel count of input `input`.
    pub fn input_channel_count(&mut self, node: &AudioNode, input: usize) -> Result<usize, GraphError> {
        let id = self.id_of(node)?;
        self.graph.input_channel_count(id, input)
    }

    /// Returns the resolved channel count of output `output`.
    pub fn output_channel_count(&mut self, node: &AudioNode, output: usize) -> Result<usize, GraphError> {
        let id = self.id_of(node)?;
        self.graph.output_channel_count(id, output)
    }

    /// Returns the number of edges arriving at input `input`.
    pub fn input_connection_count(&self, node: &AudioNode, input: usize) -> Result<usize, GraphError> {
        let id = self.id_of(node)?;
        let data = self.graph.node(id)?;
        data.inputs
            .get(input)
            .map(|port| port.connections.len())
            .ok_or(GraphError::InputIndexOutOfRange {
                index: input,
                count: data.inputs.len(),
            })
    }

    /// Returns the number of edges leaving output `output`.
    pub fn output_connection_count(&self, node: &AudioNode, output: usize) -> Result<usize, GraphError> {
        let id = self.id_of(node)?;
        let data = self.graph.node(id)?;
        data.outputs
            .get(output)
            .map(|port| port.connections.len())
            .ok_or(GraphError::OutputIndexOutOfRange {
                index: output,
                count: data.outputs.len(),
            })
    }

    /// Returns the number of input ports.
    pub fn number_of_inputs(&self, node: &AudioNode) -> Result<usize, GraphError> {
        let id = self.id_of(node)?;
        Ok(self.graph.node(id)?.inputs.len())
    }

    /// Returns the number of output ports.
    pub fn number_of_outputs(&self, node: &AudioNode) -> Result<usize, GraphError> {
        let id = self.id_of(node)?;
        Ok(self.graph.node(id)?.outputs.len())
    }

    /// Returns true if the node is initialized.
    pub fn is_initialized(&self, node: &AudioNode) -> Result<bool, GraphError> {
        let id = self.id_of(node)?;
        Ok(self.graph.node(id)?.initialized)
    }

    /// Returns true if the node's outputs are disabled.
    pub fn is_disabled(&self, node: &AudioNode) -> Result<bool, GraphError> {
        let id = self.id_of(node)?;
        Ok(self.graph.node(id)?.disabled)
    }

    /// Returns true if the node has played out (one-shot sources).
    pub fn is_finished(&self, node: &AudioNode) -> Result<bool, GraphError> {
        let id = self.id_of(node)?;
        Ok(self.graph.node(id)?.finished)
    }

    /// Returns true while the node is in the graph.
    pub fn contains(&self, id: NodeId) -> bool {
        self.graph.contains(id)
    }

    /// Returns the number of live nodes, destination included.
    pub fn node_count(&self) -> usize {
        self.graph.live_nodes()
    }

    /// Returns the number of completed render quanta.
    pub fn quantum(&self) -> u64 {
        self.graph.quantum()
    }

    /// Returns the number of frames rendered so far.
    pub fn current_sample_frame(&self) -> u64 {
        self.graph.current_frame()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sink;

    impl AudioProcessor for Sink {
        fn process(&mut self, _scope: &mut ProcessScope<'_>) {}
        fn reset(&mut self) {}
    }

    #[test]
    fn options_validation() {
        assert!(ContextOptions::default().validate().is_ok());
        let zero_rate = ContextOptions {
            sample_rate: 0.0,
            ..ContextOptions::default()
        };
        assert!(matches!(zero_rate.validate(), Err(GraphError::InvalidState(_))));
        let too_wide = ContextOptions {
            channels: 40,
            ..ContextOptions::default()
        };
        assert_eq!(too_wide.validate(), Err(GraphError::InvalidChannelCount(40)));
    }

    #[test]
    fn destination_is_initialized_and_pinned() {
        let context = RenderContext::new(ContextOptions::default()).unwrap();
        let destination = context.destination();
        assert_eq!(destination.node_type(), NodeType::Destination);
        assert!(destination.is_initialized());
        assert_eq!(destination.number_of_inputs(), 1);
        assert_eq!(destination.channel_count(), 2);
        assert_eq!(destination.channel_count_mode(), ChannelCountMode::Explicit);
        // Context reference plus this handle.
        assert_eq!(destination.ref_count(RefType::Normal), 2);
        drop(destination);
        assert_eq!(context.stats().live_nodes, 1);
    }

    #[test]
    fn nodes_from_other_contexts_are_rejected() {
        let a = RenderContext::new(ContextOptions::default()).unwrap();
        let b = RenderContext::new(ContextOptions::default()).unwrap();
        let node = a.create_node(NodeType::Custom, Box::new(Sink));
        node.add_output(OutputChannels::Fixed(1)).unwrap();
        assert_eq!(
            node.connect(&b.destination(), 0, 0),
            Err(GraphError::ContextMismatch)
        );
        assert!(!a.same_context(&b));
        assert!(a.same_context(&node.context()));
    }

    #[test]
    fn dropping_handle_defers_finalization_to_lock() {
        let context = RenderContext::new(ContextOptions::default()).unwrap();
        let node = context.create_node(NodeType::Gain, Box::new(Sink));
        let id = node.id();
        drop(node);
        assert_eq!(context.pending_finalization_count(), 1);

        let guard = context.lock();
        assert!(!guard.contains(id));
        drop(guard);
        assert_eq!(context.pending_finalization_count(), 0);
        assert_eq!(context.stats().finalized, 1);
    }

    #[test]
    fn render_advances_clock() {
        let context = RenderContext::new(ContextOptions::default()).unwrap();
        let mut out = AudioBus::new(2, RENDER_QUANTUM_FRAMES);
        context.render_quantum(&mut out);
        context.render_quantum(&mut out);
        let stats = context.stats();
        assert_eq!(stats.quanta, 2);
        assert_eq!(stats.frames, 2 * RENDER_QUANTUM_FRAMES as u64);
        assert!((context.current_time() - 256.0 / 48000.0).abs() < 1e-12);
    }
}
