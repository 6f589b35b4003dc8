//! Rendergraph Core - pull-based audio rendering graph
//!
//! This crate provides the node graph underneath a Web Audio–style engine: the
//! node abstraction, the connection protocol between node ports, and the
//! concurrency discipline that lets a render thread pull audio through the
//! graph while a control thread mutates it.
//!
//! # Core Abstractions
//!
//! - [`RenderContext`] - Owns the graph lock, the destination node and the
//!   render-quantum entry point ([`render_quantum()`](RenderContext::render_quantum))
//! - [`AudioNode`] - Control-side node handle; connect, disconnect, channel setup
//! - [`AudioProcessor`] - Trait implemented once per node kind (oscillator, gain, ...)
//! - [`AudioBus`] - One render quantum of audio per channel, with up/down-mixing
//! - [`DualRefCount`] - Script-side and connection-side reference counters
//!
//! # Node Lifetime
//!
//! A node stays alive while it is referenced by a handle *or* by a graph
//! connection. When both counters reach zero the node is marked for deletion
//! and queued; the queue is drained, and the node torn down, only while the
//! graph lock is held. The render thread therefore never observes a node that
//! is half-destroyed.
//!
//! # Scheduling
//!
//! Once per quantum the render thread calls
//! [`render_quantum()`](RenderContext::render_quantum), which processes the
//! destination node. Each node pulls its inputs depth-first and runs its
//! processor at most once per quantum, however many consumers it fans out to.
//!
//! # Example
//!
//! ```rust
//! use rendergraph_core::{
//!     AudioBus, AudioProcessor, ContextOptions, NodeType, OutputChannels, ProcessScope,
//!     RenderContext,
//! };
//!
//! struct Ones;
//!
//! impl AudioProcessor for Ones {
//!     fn process(&mut self, scope: &mut ProcessScope<'_>) {
//!         scope.output_mut(0).channel_mut(0).fill(1.0);
//!     }
//!     fn reset(&mut self) {}
//! }
//!
//! let context = RenderContext::new(ContextOptions::default()).unwrap();
//! let source = context.create_node(NodeType::ConstantSource, Box::new(Ones));
//! source.add_output(OutputChannels::Fixed(1)).unwrap();
//! source.connect(&context.destination(), 0, 0).unwrap();
//!
//! let mut out = AudioBus::new(2, rendergraph_core::RENDER_QUANTUM_FRAMES);
//! context.render_quantum(&mut out);
//! assert_eq!(out.channel(0)[0], 1.0); // mono up-mixed to both speakers
//! assert_eq!(out.channel(1)[0], 1.0);
//! ```

pub mod bus;
pub mod channel;
pub mod context;
pub mod error;
mod graph;
pub mod node;
pub mod port;
pub mod processor;
pub mod refcount;

pub use bus::AudioBus;
pub use channel::{ChannelConfig, ChannelCountMode, ChannelInterpretation};
pub use context::{ContextOptions, GraphGuard, RenderContext, RenderStats};
pub use error::GraphError;
pub use node::{AudioNode, NodeId, NodeType};
pub use port::OutputChannels;
pub use processor::{AudioProcessor, ProcessScope};
pub use refcount::{DualRefCount, RefType, Release};

/// Number of frames rendered per quantum.
pub const RENDER_QUANTUM_FRAMES: usize = 128;

/// Upper bound for any node's channel count.
pub const MAX_CHANNELS: usize = 32;
