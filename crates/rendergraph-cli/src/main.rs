//! rendergraph CLI - renders a demo graph while mutating it from another thread.

mod commands;
mod demo;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rendergraph")]
#[command(author, version, about = "Render graph driver", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the demo graph, optionally to a WAV file
    Render(commands::render::RenderArgs),

    /// Show the effective configuration and the demo graph's nodes
    Info(commands::info::InfoArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Render(args) => commands::render::run(args),
        Commands::Info(args) => commands::info::run(args),
    }
}
