//! Display the effective configuration and the demo graph.

use clap::Args;
use rendergraph_core::{NodeType, RenderContext};
use std::path::PathBuf;

use super::common::{init_tracing, load_config};
use crate::demo::DemoGraph;

/// Node kinds the demo can create, with their constructors.
const NODE_KINDS: [(NodeType, &str); 7] = [
    (NodeType::ConstantSource, "create_constant_source"),
    (NodeType::Oscillator, "create_oscillator"),
    (NodeType::Gain, "create_gain"),
    (NodeType::Delay, "create_delay"),
    (NodeType::ChannelSplitter, "create_channel_splitter"),
    (NodeType::ChannelMerger, "create_channel_merger"),
    (NodeType::BasicInspector, "create_inspector"),
];

/// Show configuration and graph information.
#[derive(Args)]
pub struct InfoArgs {
    /// Engine configuration file (TOML)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Run the info command.
pub fn run(args: InfoArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    init_tracing(&config);

    let context = RenderContext::new(config.to_context_options()?)?;
    let _demo = DemoGraph::build(&context, &config.graph)?;

    println!("Configuration:");
    for line in config.to_toml()?.lines() {
        println!("  {line}");
    }
    println!();
    println!("Duration:    {:.3}s", config.duration_seconds());
    println!();

    println!("Node Kinds:");
    for (kind, constructor) in NODE_KINDS {
        println!("  {:<24} {constructor}", kind.as_str());
    }
    println!();

    println!("Demo Graph:");
    for (kind, count) in context.node_counts() {
        println!("  {:<24} {count}", kind.as_str());
    }

    Ok(())
}
