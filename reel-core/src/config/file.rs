//! Configuration file loading and merging
//!
//! Loads user configuration from `~/.config/reel/config.toml`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use super::{
    CompositorConfig, FilterPreference, DEFAULT_CANVAS, DEFAULT_MAX_DRAW_CONTEXTS,
    DEFAULT_MAX_STREAM_DIMENSION, DEFAULT_MAX_STREAMS, DEFAULT_UNSCALED_CANVAS,
};
use crate::error::{ReelError, Result};
use crate::types::{Extent2D, Rgba8};

/// Configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Canvas settings
    #[serde(default)]
    pub canvas: CanvasSettings,

    /// Stream and draw context limits
    #[serde(default)]
    pub streams: StreamSettings,

    /// GPU synchronization settings
    #[serde(default)]
    pub sync: SyncSettings,
}

/// Canvas settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasSettings {
    /// Initial preview canvas size, "WIDTHxHEIGHT"
    #[serde(default = "default_canvas")]
    pub size: String,

    /// Recording canvas size, "WIDTHxHEIGHT"
    #[serde(default = "default_unscaled_canvas")]
    pub unscaled_size: String,

    /// Clear color as RGBA bytes
    #[serde(default = "default_background")]
    pub background: [u8; 4],

    /// Blit filter (auto, nearest)
    #[serde(default)]
    pub filter: FilterPreference,
}

/// Stream table settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSettings {
    /// Maximum live streams
    #[serde(default = "default_max_streams")]
    pub max_streams: usize,

    /// Maximum placed sources
    #[serde(default = "default_max_draw_contexts")]
    pub max_draw_contexts: usize,

    /// Largest stream width or height
    #[serde(default = "default_max_stream_dimension")]
    pub max_dimension: u32,
}

/// Fence settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Fence wait timeout in milliseconds (0 = wait indefinitely)
    #[serde(default)]
    pub fence_timeout_ms: u64,
}

// Default value functions
fn default_canvas() -> String {
    DEFAULT_CANVAS.to_string()
}

fn default_unscaled_canvas() -> String {
    DEFAULT_UNSCALED_CANVAS.to_string()
}

fn default_background() -> [u8; 4] {
    Rgba8::OPAQUE_BLACK.0
}

fn default_max_streams() -> usize {
    DEFAULT_MAX_STREAMS
}

fn default_max_draw_contexts() -> usize {
    DEFAULT_MAX_DRAW_CONTEXTS
}

fn default_max_stream_dimension() -> u32 {
    DEFAULT_MAX_STREAM_DIMENSION
}

impl Default for CanvasSettings {
    fn default() -> Self {
        Self {
            size: default_canvas(),
            unscaled_size: default_unscaled_canvas(),
            background: default_background(),
            filter: FilterPreference::Auto,
        }
    }
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            max_streams: default_max_streams(),
            max_draw_contexts: default_max_draw_contexts(),
            max_dimension: default_max_stream_dimension(),
        }
    }
}

fn parse_extent(field: &str, value: &str) -> Result<Extent2D> {
    Extent2D::parse(value).ok_or_else(|| {
        ReelError::config(format!(
            "{} must look like WIDTHxHEIGHT, got '{}'",
            field, value
        ))
    })
}

impl ConfigFile {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("reel").join("config.toml")
        } else if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("reel")
                .join("config.toml")
        } else {
            PathBuf::from("/etc/reel/config.toml")
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ReelError::Config(format!("Failed to read config file: {}", e)))?;

        let config: ConfigFile = toml::from_str(&content)?;

        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ReelError::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)?;

        std::fs::write(path, content)
            .map_err(|e| ReelError::Config(format!("Failed to write config file: {}", e)))?;

        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Write the commented sample configuration to `path`
    ///
    /// An existing file is kept unless `overwrite` is set. Returns whether
    /// the file was written.
    pub fn create_default_at(path: impl AsRef<Path>, overwrite: bool) -> Result<bool> {
        let path = path.as_ref();
        if path.exists() && !overwrite {
            debug!("Keeping existing config file at {:?}", path);
            return Ok(false);
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ReelError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }
        std::fs::write(path, sample_config())
            .map_err(|e| ReelError::Config(format!("Failed to write config file: {}", e)))?;

        info!("Wrote default configuration to {:?}", path);
        Ok(true)
    }

    /// Build and validate a compositor configuration from this file
    pub fn to_compositor_config(&self) -> Result<CompositorConfig> {
        let config = CompositorConfig {
            max_streams: self.streams.max_streams,
            max_draw_contexts: self.streams.max_draw_contexts,
            canvas: parse_extent("canvas.size", &self.canvas.size)?,
            unscaled_canvas: parse_extent("canvas.unscaled_size", &self.canvas.unscaled_size)?,
            background: Rgba8(self.canvas.background),
            filter: self.canvas.filter,
            max_stream_dimension: self.streams.max_dimension,
            fence_timeout: match self.sync.fence_timeout_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
        };
        config.validate()?;
        Ok(config)
    }
}

/// Generate a sample configuration file
pub fn sample_config() -> String {
    r#"# Reel Configuration

[canvas]
# Initial preview canvas size; the preview follows the window afterwards
size = "1280x720"

# Recording canvas size, independent of the preview window
unscaled_size = "1920x1080"

# Background color as [R, G, B, A]
background = [0, 0, 0, 255]

# Blit filter: "auto" (linear when supported) or "nearest"
filter = "auto"

[streams]
# Maximum number of live video streams (screen captures, webcams)
max_streams = 8

# Maximum number of placed sources on the canvas
max_draw_contexts = 32

# Largest stream width or height accepted from a capture source
max_dimension = 4096

[sync]
# Fence wait timeout in milliseconds (0 = wait indefinitely)
fence_timeout_ms = 0
"#
    .to_string()
}
