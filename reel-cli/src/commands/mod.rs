//! CLI command implementations

mod compose;
mod config;
mod info;

pub use compose::{compose, ComposeArgs};
pub use config::{config, ConfigArgs};
pub use info::{info, InfoArgs};

use std::path::PathBuf;

use anyhow::{Context, Result};
use reel_core::{CompositorConfig, ConfigFile};

/// Load the compositor configuration from `path`, or the default location
pub(crate) fn load_config(path: Option<&PathBuf>) -> Result<(PathBuf, CompositorConfig)> {
    let path = path.cloned().unwrap_or_else(ConfigFile::default_path);
    let file = ConfigFile::load_from(&path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    let config = file
        .to_compositor_config()
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;
    Ok((path, config))
}
