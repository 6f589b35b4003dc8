//! Configuration for rendergraph render contexts.
//!
//! An [`EngineConfig`] describes the render context (sample rate, channel
//! counts), how many quanta to render, the demo graph the CLI builds, and the
//! default log filter. It is stored as TOML.
//!
//! # Example
//!
//! ```rust
//! use rendergraph_config::EngineConfig;
//! use rendergraph_core::RenderContext;
//!
//! let config = EngineConfig::from_toml(
//!     r#"
//!     [context]
//!     sample_rate = 44100.0
//!     channels = 1
//!     "#,
//! )
//! .unwrap();
//!
//! let context = RenderContext::new(config.to_context_options().unwrap()).unwrap();
//! assert_eq!(context.sample_rate(), 44100.0);
//! ```

mod engine;
mod error;

pub use engine::{ContextSection, EngineConfig, GraphSection, LoggingSection, RenderSection};
pub use error::ConfigError;
