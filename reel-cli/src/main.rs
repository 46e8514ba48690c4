//! Reel CLI
//!
//! Drives the compositor with synthetic sources on the software backend.
//!
//! # Usage
//!
//! ```bash
//! # Show backend capabilities and the effective configuration
//! reel info
//!
//! # Composite a full-screen source with a webcam-sized overlay
//! reel compose -s 1920x1080@0,0,1,1 -s 640x360@0.7,0.05,0.25,0.25:rgba -o out.png
//!
//! # Create a config file
//! reel config init
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Reel - multi-source video compositor
#[derive(Parser)]
#[command(name = "reel")]
#[command(version)]
#[command(about = "Composite capture streams into preview and recording canvases", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show backend capabilities and the effective configuration
    Info(commands::InfoArgs),

    /// Composite synthetic sources and optionally save the canvases
    Compose(commands::ComposeArgs),

    /// Manage the configuration file
    Config(commands::ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("reel_core={}", level).parse()?)
                .add_directive(format!("reel={}", level).parse()?),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Info(args) => commands::info(args).await?,
        Commands::Compose(args) => commands::compose(args).await?,
        Commands::Config(args) => commands::config(args).await?,
    }

    Ok(())
}
