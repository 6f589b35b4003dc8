//! Node input and output ports.
//!
//! A [`NodeOutput`] fans out to any number of inputs; a [`NodeInput`] sums
//! every enabled output connected to it. Ports live inside their node and are
//! only touched under the graph lock. The edge itself is stored twice, once on
//! each side, as a [`Connection`] naming the port on the other node.

use crate::bus::AudioBus;
use crate::node::NodeId;

/// How an output decides its channel count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputChannels {
    /// A fixed channel count (sources, channel splitter outputs).
    Fixed(usize),
    /// Same count as the resolved count of the given input (gain, delay).
    FollowInput(usize),
}

/// One end of an edge, as seen from the other end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Connection {
    /// Node on the other side of the edge.
    pub node: NodeId,
    /// Port index on that node.
    pub port: usize,
}

/// An input port: the summing point of all outputs connected to it.
#[derive(Debug)]
pub(crate) struct NodeInput {
    /// Upstream outputs feeding this input.
    pub connections: Vec<Connection>,
    /// Resolved channel count.
    pub channels: usize,
    /// Set when the connection set or channel policy changed since the last
    /// resolution.
    pub dirty: bool,
    pub bus: AudioBus,
}

impl NodeInput {
    pub fn new() -> Self {
        Self {
            connections: Vec::new(),
            channels: 1,
            dirty: true,
            bus: AudioBus::empty(),
        }
    }

    pub fn is_connected_to(&self, node: NodeId, output: usize) -> bool {
        self.connections.contains(&Connection { node, port: output })
    }
}

/// An output port: written once per quantum by its node, read by every
/// connected input during that same quantum.
#[derive(Debug)]
pub(crate) struct NodeOutput {
    pub policy: OutputChannels,
    /// Downstream inputs fed by this output.
    pub connections: Vec<Connection>,
    /// Resolved channel count.
    pub channels: usize,
    pub bus: AudioBus,
}

impl NodeOutput {
    pub fn new(policy: OutputChannels) -> Self {
        let channels = match policy {
            OutputChannels::Fixed(n) => n,
            OutputChannels::FollowInput(_) => 1,
        };
        Self {
            policy,
            connections: Vec::new(),
            channels,
            bus: AudioBus::empty(),
        }
    }

    pub fn is_connected_to(&self, node: NodeId, input: usize) -> bool {
        self.connections.contains(&Connection { node, port: input })
    }
}
