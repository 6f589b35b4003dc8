//! Node registry, connection protocol and per-quantum scheduler.
//!
//! [`Graph`] lives behind the context's graph lock. Every method here runs
//! with that lock held, on either the control thread (topology mutation) or
//! the render thread (one traversal per quantum), never both at once.
//!
//! Nodes are stored in slots indexed by [`NodeId`]. A slot becomes `None` when
//! its node is finalized; ids are never reused.

use std::collections::BTreeMap;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};

use crate::bus::AudioBus;
use crate::channel::{ChannelConfig, ChannelCountMode, ChannelInterpretation, validate_channel_count};
use crate::error::GraphError;
use crate::node::{NodeData, NodeId, NodeType};
use crate::port::{Connection, OutputChannels};
use crate::processor::{AudioProcessor, ProcessScope};
use crate::refcount::{DualRefCount, RefType, Release};
use crate::RENDER_QUANTUM_FRAMES;

pub(crate) struct Graph {
    nodes: Vec<Option<NodeData>>,
    destination: NodeId,
    /// Nodes processed every quantum whether or not anything pulls them.
    automatic_pull: Vec<NodeId>,
    /// Nodes whose processor reported `is_finished`, awaiting release.
    finished: Vec<NodeId>,
    sample_rate: f32,
    max_channels: usize,
    quantum: u64,
    current_frame: u64,
    finalized: u64,
    pending_tx: Sender<NodeId>,
    pending_rx: Receiver<NodeId>,
}

impl Graph {
    pub fn new(
        sample_rate: f32,
        max_channels: usize,
        pending_tx: Sender<NodeId>,
        pending_rx: Receiver<NodeId>,
    ) -> Self {
        Self {
            nodes: Vec::new(),
            destination: NodeId(0),
            automatic_pull: Vec::new(),
            finished: Vec::new(),
            sample_rate,
            max_channels,
            quantum: 0,
            current_frame: 0,
            finalized: 0,
            pending_tx,
            pending_rx,
        }
    }

    // --- Registry ---

    /// Registers a new, uninitialized node with both counters at zero.
    pub fn insert(
        &mut self,
        node_type: NodeType,
        processor: Box<dyn AudioProcessor>,
    ) -> (NodeId, Arc<DualRefCount>) {
        let id = NodeId(self.nodes.len() as u32);
        let refs = Arc::new(DualRefCount::new());
        if processor.requires_automatic_pull() {
            self.automatic_pull.push(id);
        }
        self.nodes.push(Some(NodeData::new(
            node_type,
            self.sample_rate,
            Arc::clone(&refs),
            processor,
        )));
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_insert: {node_type} {id}");
        (id, refs)
    }

    pub fn set_destination(&mut self, id: NodeId) {
        self.destination = id;
    }

    #[inline]
    fn slot(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id.0 as usize).and_then(Option::as_ref)
    }

    #[inline]
    fn slot_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    pub fn node(&self, id: NodeId) -> Result<&NodeData, GraphError> {
        self.slot(id).ok_or(GraphError::NodeNotFound(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut NodeData, GraphError> {
        self.slot_mut(id).ok_or(GraphError::NodeNotFound(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.slot(id).is_some()
    }

    pub fn live_nodes(&self) -> usize {
        self.nodes.iter().flatten().count()
    }

    pub fn node_counts(&self) -> BTreeMap<NodeType, usize> {
        let mut counts = BTreeMap::new();
        for node in self.nodes.iter().flatten() {
            *counts.entry(node.node_type).or_insert(0) += 1;
        }
        counts
    }

    pub fn quantum(&self) -> u64 {
        self.quantum
    }

    pub fn current_frame(&self) -> u64 {
        self.current_frame
    }

    pub fn finalized(&self) -> u64 {
        self.finalized
    }

    // --- Ports and lifecycle ---

    pub fn add_input(&mut self, id: NodeId) -> Result<usize, GraphError> {
        self.node_mut(id)?.add_input()
    }

    pub fn add_output(&mut self, id: NodeId, policy: OutputChannels) -> Result<usize, GraphError> {
        self.node_mut(id)?.add_output(policy)
    }

    /// Initializes the node if it is not already.
    pub fn initialize(&mut self, id: NodeId) -> Result<(), GraphError> {
        let node = self.node_mut(id)?;
        if node.initialized {
            return Ok(());
        }
        node.initialize();
        self.mark_downstream_dirty(id);
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_initialize: {id}");
        Ok(())
    }

    pub fn uninitialize(&mut self, id: NodeId) -> Result<(), GraphError> {
        let node = self.node_mut(id)?;
        if !node.initialized {
            return Ok(());
        }
        node.uninitialize();
        self.mark_downstream_dirty(id);
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_uninitialize: {id}");
        Ok(())
    }

    pub fn reset(&mut self, id: NodeId) -> Result<(), GraphError> {
        let node = self.node_mut(id)?;
        debug_assert!(node.initialized, "reset called on uninitialized {id}");
        if node.initialized {
            node.processor.reset();
        }
        Ok(())
    }

    // --- Channel configuration ---

    pub fn set_channel_count(&mut self, id: NodeId, count: usize) -> Result<(), GraphError> {
        let count = validate_channel_count(count, self.max_channels)?;
        self.update_channel_config(id, |config| config.count = count)
    }

    pub fn set_channel_count_mode(
        &mut self,
        id: NodeId,
        mode: ChannelCountMode,
    ) -> Result<(), GraphError> {
        self.update_channel_config(id, |config| config.mode = mode)
    }

    pub fn set_channel_interpretation(
        &mut self,
        id: NodeId,
        interpretation: ChannelInterpretation,
    ) -> Result<(), GraphError> {
        self.update_channel_config(id, |config| config.interpretation = interpretation)
    }

    pub fn set_channel_config(&mut self, id: NodeId, config: ChannelConfig) -> Result<(), GraphError> {
        validate_channel_count(config.count, self.max_channels)?;
        self.update_channel_config(id, |current| *current = config)
    }

    fn update_channel_config(
        &mut self,
        id: NodeId,
        update: impl FnOnce(&mut ChannelConfig),
    ) -> Result<(), GraphError> {
        let node = self.node_mut(id)?;
        let before = node.channel_config;
        update(&mut node.channel_config);
        if node.channel_config != before {
            node.update_channels_for_inputs();
        }
        Ok(())
    }

    /// Returns the resolved channel count of an input, resolving first if the
    /// count is stale.
    pub fn input_channel_count(&mut self, id: NodeId, input: usize) -> Result<usize, GraphError> {
        let count = self.node(id)?.inputs.len();
        if input >= count {
            return Err(GraphError::InputIndexOutOfRange { index: input, count });
        }
        self.resolve_channels_upstream(id, &mut Vec::new());
        Ok(self.node(id)?.inputs[input].channels)
    }

    pub fn output_channel_count(&mut self, id: NodeId, output: usize) -> Result<usize, GraphError> {
        let count = self.node(id)?.outputs.len();
        if output >= count {
            return Err(GraphError::OutputIndexOutOfRange { index: output, count });
        }
        self.resolve_channels_upstream(id, &mut Vec::new());
        Ok(self.node(id)?.outputs[output].channels)
    }

    // --- Connection protocol ---

    pub fn connect(
        &mut self,
        source: NodeId,
        target: NodeId,
        output: usize,
        input: usize,
    ) -> Result<(), GraphError> {
        let outputs = self.node(source)?.outputs.len();
        if output >= outputs {
            return Err(GraphError::OutputIndexOutOfRange {
                index: output,
                count: outputs,
            });
        }
        let inputs = self.node(target)?.inputs.len();
        if input >= inputs {
            return Err(GraphError::InputIndexOutOfRange {
                index: input,
                count: inputs,
            });
        }

        self.initialize(source)?;
        self.initialize(target)?;

        if self.node(source)?.outputs[output].is_connected_to(target, input) {
            return Ok(());
        }

        self.node_mut(source)?.outputs[output].connections.push(Connection {
            node: target,
            port: input,
        });
        let port = &mut self.node_mut(target)?.inputs[input];
        port.connections.push(Connection {
            node: source,
            port: output,
        });
        port.dirty = true;

        self.ref_node(source, RefType::Connection);
        self.ref_node(target, RefType::Connection);

        #[cfg(feature = "tracing")]
        tracing::debug!("graph_connect: {source}[{output}] → {target}[{input}]");
        Ok(())
    }

    /// Removes every edge leaving output `output` of `source`.
    pub fn disconnect(&mut self, source: NodeId, output: usize) -> Result<(), GraphError> {
        let count = self.node(source)?.outputs.len();
        if output >= count {
            return Err(GraphError::OutputIndexOutOfRange {
                index: output,
                count,
            });
        }
        let edges = core::mem::take(&mut self.node_mut(source)?.outputs[output].connections);
        for edge in edges {
            self.unlink_input(edge.node, edge.port, source, output);
            self.deref_node(edge.node, RefType::Connection);
            self.deref_node(source, RefType::Connection);
        }
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_disconnect: {source}[{output}]");
        Ok(())
    }

    pub fn disconnect_all(&mut self, source: NodeId) -> Result<(), GraphError> {
        for output in 0..self.node(source)?.outputs.len() {
            self.disconnect(source, output)?;
        }
        Ok(())
    }

    /// Removes every edge from `source` to `target`.
    pub fn disconnect_from(&mut self, source: NodeId, target: NodeId) -> Result<(), GraphError> {
        self.node(target)?;
        let mut removed = 0;
        for output in 0..self.node(source)?.outputs.len() {
            let port = &mut self.node_mut(source)?.outputs[output];
            let (to_target, kept): (Vec<_>, Vec<_>) = core::mem::take(&mut port.connections)
                .into_iter()
                .partition(|edge| edge.node == target);
            port.connections = kept;
            for edge in to_target {
                self.unlink_input(target, edge.port, source, output);
                self.deref_node(target, RefType::Connection);
                self.deref_node(source, RefType::Connection);
                removed += 1;
            }
        }
        if removed == 0 {
            return Err(GraphError::invalid_state(format!(
                "{source} is not connected to {target}"
            )));
        }
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_disconnect: {source} → {target} ({removed} edges)");
        Ok(())
    }

    /// Drops every edge touching the node, incoming and outgoing.
    fn disconnect_node(&mut self, id: NodeId) {
        if self.disconnect_all(id).is_err() {
            return;
        }
        let Some(node) = self.slot(id) else { return };
        for input in 0..node.inputs.len() {
            let Some(node) = self.slot_mut(id) else { return };
            let edges = core::mem::take(&mut node.inputs[input].connections);
            node.inputs[input].dirty = true;
            for edge in edges {
                if let Some(upstream) = self.slot_mut(edge.node) {
                    upstream.outputs[edge.port]
                        .connections
                        .retain(|c| *c != Connection { node: id, port: input });
                }
                self.deref_node(edge.node, RefType::Connection);
                self.deref_node(id, RefType::Connection);
            }
        }
    }

    fn unlink_input(&mut self, target: NodeId, input: usize, source: NodeId, output: usize) {
        if let Some(node) = self.slot_mut(target) {
            let port = &mut node.inputs[input];
            port.connections.retain(|c| *c != Connection { node: source, port: output });
            port.dirty = true;
        }
    }

    fn mark_downstream_dirty(&mut self, id: NodeId) {
        let Some(node) = self.slot(id) else { return };
        for output in 0..node.outputs.len() {
            let mut k = 0;
            while let Some(edge) = self
                .slot(id)
                .and_then(|n| n.outputs[output].connections.get(k).copied())
            {
                if let Some(downstream) = self.slot_mut(edge.node) {
                    downstream.inputs[edge.port].dirty = true;
                }
                k += 1;
            }
        }
    }

    // --- Reference counting ---

    pub fn ref_node(&mut self, id: NodeId, ref_type: RefType) {
        let Some(node) = self.slot(id) else { return };
        node.refs.add_ref(ref_type);
        if ref_type == RefType::Connection {
            self.enable_outputs_if_necessary(id);
        }
    }

    pub fn deref_node(&mut self, id: NodeId, ref_type: RefType) {
        let Some(node) = self.slot(id) else { return };
        match node.refs.release(ref_type) {
            Release::Unreferenced => {
                let _ = self.pending_tx.send(id);
            }
            Release::Referenced if ref_type == RefType::Connection => {
                self.disable_outputs_if_necessary(id);
            }
            Release::Referenced => {}
        }
    }

    fn disable_outputs_if_necessary(&mut self, id: NodeId) {
        let Some(node) = self.slot_mut(id) else { return };
        if node.refs.connection_refs() == 0 && !node.disabled && node.processor.tail_time() == 0.0 {
            node.disabled = true;
            self.mark_downstream_dirty(id);
            #[cfg(feature = "tracing")]
            tracing::debug!("graph_disable: {id}");
        }
    }

    fn enable_outputs_if_necessary(&mut self, id: NodeId) {
        let Some(node) = self.slot_mut(id) else { return };
        if node.disabled {
            node.disabled = false;
            self.mark_downstream_dirty(id);
            #[cfg(feature = "tracing")]
            tracing::debug!("graph_enable: {id}");
        }
    }

    /// Finalizes every node queued for deletion, including nodes whose
    /// finalization is triggered by an earlier one in the same drain.
    pub fn finish_pending(&mut self) {
        while let Ok(id) = self.pending_rx.try_recv() {
            self.finish_deref(id);
        }
    }

    fn finish_deref(&mut self, id: NodeId) {
        let Some(node) = self.slot(id) else { return };
        if !node.refs.is_unreferenced() {
            return;
        }
        if node.has_connections() {
            self.disconnect_node(id);
        }
        let Some(mut node) = self.nodes.get_mut(id.0 as usize).and_then(Option::take) else {
            return;
        };
        node.uninitialize();
        node.processor.did_become_marked_for_deletion();
        self.automatic_pull.retain(|&n| n != id);
        self.finished.retain(|&n| n != id);
        self.finalized += 1;
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_finalize: {} {id}", node.node_type);
    }

    // --- Rendering ---

    /// Recomputes stale input channel counts and the outputs that follow them.
    fn resolve_channels(&mut self, id: NodeId) {
        let Some(node) = self.slot(id) else { return };
        let config = node.channel_config;
        let (inputs, outputs) = (node.inputs.len(), node.outputs.len());

        for input in 0..inputs {
            let Some(node) = self.slot(id) else { return };
            if !node.inputs[input].dirty {
                continue;
            }
            let channels = config.computed_channels(
                node.inputs[input]
                    .connections
                    .iter()
                    .filter_map(|edge| self.producing_output_channels(*edge)),
            );
            let Some(node) = self.slot_mut(id) else { return };
            let port = &mut node.inputs[input];
            port.dirty = false;
            if port.channels != channels {
                port.channels = channels;
                if node.initialized {
                    port.bus.set_number_of_channels(channels);
                }
            }
        }

        for output in 0..outputs {
            let Some(node) = self.slot_mut(id) else { return };
            let OutputChannels::FollowInput(input) = node.outputs[output].policy else {
                continue;
            };
            let channels = node.inputs[input].channels;
            let initialized = node.initialized;
            let port = &mut node.outputs[output];
            if port.channels == channels {
                continue;
            }
            port.channels = channels;
            if initialized {
                port.bus.set_number_of_channels(channels);
            }
            let edges = port.connections.len();
            for k in 0..edges {
                let Some(edge) = self.slot(id).map(|n| n.outputs[output].connections[k]) else {
                    return;
                };
                if let Some(downstream) = self.slot_mut(edge.node) {
                    downstream.inputs[edge.port].dirty = true;
                }
            }
        }
    }

    /// Resolves every node feeding `id`, depth first, then `id` itself, so an
    /// upstream `FollowInput` output is never read before its input is
    /// resolved. `visited` stops at cycles.
    fn resolve_channels_upstream(&mut self, id: NodeId, visited: &mut Vec<NodeId>) {
        if visited.contains(&id) {
            return;
        }
        visited.push(id);
        let Some(node) = self.slot(id) else { return };
        let upstream: Vec<NodeId> = node
            .inputs
            .iter()
            .flat_map(|input| input.connections.iter().map(|edge| edge.node))
            .collect();
        for source in upstream {
            self.resolve_channels_upstream(source, visited);
        }
        self.resolve_channels(id);
    }

    fn producing_output_channels(&self, edge: Connection) -> Option<usize> {
        self.slot(edge.node)
            .filter(|upstream| upstream.is_producing())
            .map(|upstream| upstream.outputs[edge.port].channels)
    }

    /// Processes the node once for the current quantum, pulling its inputs
    /// first. Further calls in the same quantum return immediately.
    ///
    /// Recursion depth equals the length of the longest upstream path.
    pub fn process_if_necessary(&mut self, id: NodeId, frames: usize) {
        let quantum = self.quantum;
        let inputs = {
            let Some(node) = self.slot_mut(id) else { return };
            if !node.initialized || node.last_processed_quantum == Some(quantum) {
                return;
            }
            // Set before pulling so that a cycle back to this node stops here.
            node.last_processed_quantum = Some(quantum);
            node.inputs.len()
        };

        for input in 0..inputs {
            let mut k = 0;
            while let Some(edge) = self
                .slot(id)
                .and_then(|n| n.inputs[input].connections.get(k).copied())
            {
                self.process_if_necessary(edge.node, frames);
                k += 1;
            }
        }

        self.resolve_channels(id);

        let Some(mut node) = self.nodes.get_mut(id.0 as usize).and_then(Option::take) else {
            return;
        };
        self.pull_inputs(id, &mut node);

        let sample_rate = f64::from(self.sample_rate);
        let current_time = self.current_frame as f64 / sample_rate;
        let was_finished = node.finished;

        if node.disabled {
            node.silence_outputs();
        } else {
            let silent_inputs = !node.inputs.is_empty() && node.inputs_are_silent();
            if !silent_inputs {
                node.last_non_silent_time = (self.current_frame + frames as u64) as f64 / sample_rate;
            }
            if silent_inputs
                && node
                    .processor
                    .propagates_silence(node.last_non_silent_time, current_time)
            {
                node.silence_outputs();
            } else {
                let NodeData {
                    processor,
                    inputs,
                    outputs,
                    sample_rate,
                    ..
                } = &mut node;
                let mut scope = ProcessScope::new(inputs, outputs, frames, current_time, *sample_rate);
                processor.process(&mut scope);
                node.unsilence_outputs();
                node.finished = node.processor.is_finished();
            }
        }

        let newly_finished = node.finished && !was_finished;
        self.nodes[id.0 as usize] = Some(node);
        if newly_finished {
            self.finished.push(id);
        }
    }

    /// Sums every producing upstream output into the node's input buses.
    ///
    /// The node is out of its slot here, so a self-connection reads its own
    /// outputs from the previous quantum.
    fn pull_inputs(&self, id: NodeId, node: &mut NodeData) {
        let interpretation = node.channel_config.interpretation;
        let NodeData {
            inputs, outputs, ..
        } = node;
        for input in inputs.iter_mut() {
            input.bus.zero();
            for edge in &input.connections {
                let source = if edge.node == id {
                    Some(&outputs[edge.port].bus)
                } else {
                    self.slot(edge.node)
                        .filter(|upstream| upstream.is_producing())
                        .map(|upstream| &upstream.outputs[edge.port].bus)
                };
                if let Some(bus) = source {
                    input.bus.sum_from(bus, interpretation);
                }
            }
        }
    }

    /// Renders one quantum into `out` and runs post-render tasks.
    pub fn render(&mut self, out: &mut AudioBus) {
        self.finish_pending();
        self.quantum += 1;

        let frames = RENDER_QUANTUM_FRAMES;
        self.process_if_necessary(self.destination, frames);
        for k in 0..self.automatic_pull.len() {
            let id = self.automatic_pull[k];
            self.process_if_necessary(id, frames);
        }

        match self.slot(self.destination) {
            Some(destination) if destination.initialized && !destination.inputs.is_empty() => {
                out.copy_from(&destination.inputs[0].bus, ChannelInterpretation::Speakers);
            }
            _ => out.zero(),
        }
        self.current_frame += frames as u64;

        self.handle_post_render_tasks();
    }

    /// Disconnects finished nodes nobody holds a handle to, then finalizes
    /// whatever became unreferenced.
    fn handle_post_render_tasks(&mut self) {
        let mut k = 0;
        while k < self.finished.len() {
            let id = self.finished[k];
            let releasable = self.slot(id).is_none_or(|node| node.refs.script_refs() == 0);
            if releasable {
                self.finished.swap_remove(k);
                self.disconnect_node(id);
            } else {
                k += 1;
            }
        }
        self.finish_pending();
    }
}
