//! Config command - manage configuration files

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use reel_core::config::{sample_config, ConfigFile};

/// Arguments for the config command
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the path to the config file
    Path,

    /// Show the current configuration file
    Show,

    /// Parse and validate the config file
    Check,

    /// Generate a default config file
    Init {
        /// Force overwrite if file exists
        #[arg(short, long)]
        force: bool,
    },

    /// Print a sample configuration to stdout
    Sample,
}

/// Run config subcommand
pub async fn config(args: ConfigArgs) -> Result<()> {
    let path = ConfigFile::default_path();

    match args.command {
        ConfigCommand::Path => {
            let state = if path.exists() { "exists" } else { "does not exist" };
            println!("{} ({})", path.display(), state);
        }
        ConfigCommand::Show => {
            if !path.exists() {
                println!("No configuration file at {}", path.display());
                println!("Defaults are in effect. Create one with: reel config init");
                return Ok(());
            }

            let content = std::fs::read_to_string(&path).context("Failed to read config file")?;
            println!("# {}\n", path.display());
            println!("{}", content);
        }
        ConfigCommand::Check => {
            let (path, config) = super::load_config(Some(&path))?;
            println!("{}: ok", path.display());
            println!(
                "  canvas {} / unscaled {}, {} streams, {} sources",
                config.canvas, config.unscaled_canvas, config.max_streams, config.max_draw_contexts
            );
        }
        ConfigCommand::Init { force } => {
            if ConfigFile::create_default_at(&path, force)
                .context("Failed to create config file")?
            {
                println!("Created configuration file: {}", path.display());
            } else {
                println!("Configuration file already exists: {}", path.display());
                println!("Use --force to overwrite, or edit the existing file.");
            }
        }
        ConfigCommand::Sample => {
            print!("{}", sample_config());
        }
    }

    Ok(())
}
