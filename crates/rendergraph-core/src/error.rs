//! Error types for graph operations.
//!
//! Every variant is a synchronous API-misuse signal: the operation that
//! produced it left the graph in its last valid state, so callers can report
//! the error and carry on rendering.

use thiserror::Error;

use crate::node::NodeId;

/// Errors that can occur during graph operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// An output index beyond the node's output count.
    #[error("output index {index} is out of range (node has {count} outputs)")]
    OutputIndexOutOfRange {
        /// Requested output index.
        index: usize,
        /// Number of outputs on the node.
        count: usize,
    },

    /// An input index beyond the target node's input count.
    #[error("input index {index} is out of range (node has {count} inputs)")]
    InputIndexOutOfRange {
        /// Requested input index.
        index: usize,
        /// Number of inputs on the node.
        count: usize,
    },

    /// An explicit channel count of zero or above the context's ceiling.
    #[error("channel count {0} is not supported")]
    InvalidChannelCount(usize),

    /// The operation is not valid in the node's or context's current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The two nodes belong to different render contexts.
    #[error("nodes belong to different render contexts")]
    ContextMismatch,

    /// The node is no longer present in the graph.
    #[error("node {0} not found")]
    NodeNotFound(NodeId),
}

impl GraphError {
    /// Create an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        GraphError::InvalidState(message.into())
    }
}
