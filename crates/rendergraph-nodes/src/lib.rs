//! Rendergraph Nodes - concrete processors for the render graph
//!
//! This crate provides node kinds built on rendergraph-core:
//!
//! - [`ConstantSource`] / [`Oscillator`] - Sources, endless or one-shot
//! - [`Gain`] - Scales its input
//! - [`Delay`] - Fixed-channel delay line, usable inside feedback loops
//! - [`ChannelSplitter`] / [`ChannelMerger`] - Channel routing
//! - [`Inspector`] - Pass-through meter, processed every quantum
//!
//! The [`ContextExt`] trait adds typed constructors to
//! [`RenderContext`](rendergraph_core::RenderContext). Parameters are
//! lock-free [`Param`]s shared between the returned handle and the processor.
//!
//! ## Example
//!
//! ```rust
//! use rendergraph_core::{AudioBus, ContextOptions, RenderContext, RENDER_QUANTUM_FRAMES};
//! use rendergraph_nodes::ContextExt;
//!
//! let context = RenderContext::new(ContextOptions::default()).unwrap();
//! let source = context.create_constant_source(1.0, None).unwrap();
//! let gain = context.create_gain(0.5).unwrap();
//! source.connect(&gain, 0, 0).unwrap();
//! gain.connect(&context.destination(), 0, 0).unwrap();
//!
//! let mut out = AudioBus::new(2, RENDER_QUANTUM_FRAMES);
//! context.render_quantum(&mut out);
//! assert_eq!(out.channel(0)[0], 0.5);
//!
//! gain.gain().set(0.25);
//! context.render_quantum(&mut out);
//! assert_eq!(out.channel(1)[0], 0.25);
//! ```

pub mod effect;
pub mod factory;
pub mod inspector;
pub mod param;
pub mod routing;
pub mod source;

pub use effect::{Delay, Gain};
pub use factory::{
    ContextExt, ConstantSourceNode, DelayNode, GainNode, InspectorNode, MAX_DELAY_TIME,
    OscillatorNode,
};
pub use inspector::{Inspector, InspectorState};
pub use param::Param;
pub use routing::{ChannelMerger, ChannelSplitter};
pub use source::{ConstantSource, Oscillator};
