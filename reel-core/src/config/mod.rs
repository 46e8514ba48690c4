//! Configuration types for Reel
//!
//! Provides compositor capacities, canvas sizes, and synchronization settings.

mod file;

pub use file::{sample_config, ConfigFile};

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ReelError, Result};
use crate::types::{Extent2D, Rgba8};

/// Default number of concurrently live streams
pub const DEFAULT_MAX_STREAMS: usize = 8;

/// Default number of placed sources
pub const DEFAULT_MAX_DRAW_CONTEXTS: usize = 32;

/// Default preview canvas size
pub const DEFAULT_CANVAS: Extent2D = Extent2D::new(1280, 720);

/// Reference resolution of the unscaled (recording) canvas
pub const DEFAULT_UNSCALED_CANVAS: Extent2D = Extent2D::new(1920, 1080);

/// Largest stream width/height a capture producer may negotiate
pub const DEFAULT_MAX_STREAM_DIMENSION: u32 = 4096;

/// Largest canvas width/height
pub const MAX_CANVAS_DIMENSION: u32 = 8192;

/// Blit filter preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FilterPreference {
    /// Linear when the backend supports it, nearest otherwise
    #[default]
    Auto,
    /// Always nearest-neighbor
    Nearest,
}

impl std::fmt::Display for FilterPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Nearest => write!(f, "nearest"),
        }
    }
}

impl std::str::FromStr for FilterPreference {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" | "linear" => Ok(Self::Auto),
            "nearest" | "point" => Ok(Self::Nearest),
            _ => Err(format!("Unknown filter: {}", s)),
        }
    }
}

/// Compositor configuration
#[derive(Debug, Clone, PartialEq)]
pub struct CompositorConfig {
    /// Stream table capacity
    pub max_streams: usize,
    /// Draw context table capacity
    pub max_draw_contexts: usize,
    /// Initial preview canvas size
    pub canvas: Extent2D,
    /// Fixed size of the canvas handed to recording encoders
    pub unscaled_canvas: Extent2D,
    /// Canvas clear color
    pub background: Rgba8,
    /// Blit filter preference
    pub filter: FilterPreference,
    /// Largest stream width/height accepted by `create_stream`
    pub max_stream_dimension: u32,
    /// Fence wait bound (`None` waits indefinitely)
    pub fence_timeout: Option<Duration>,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            max_streams: DEFAULT_MAX_STREAMS,
            max_draw_contexts: DEFAULT_MAX_DRAW_CONTEXTS,
            canvas: DEFAULT_CANVAS,
            unscaled_canvas: DEFAULT_UNSCALED_CANVAS,
            background: Rgba8::OPAQUE_BLACK,
            filter: FilterPreference::Auto,
            max_stream_dimension: DEFAULT_MAX_STREAM_DIMENSION,
            fence_timeout: None,
        }
    }
}

impl CompositorConfig {
    /// Set the stream table capacity
    pub fn with_max_streams(mut self, max: usize) -> Self {
        self.max_streams = max;
        self
    }

    /// Set the draw context table capacity
    pub fn with_max_draw_contexts(mut self, max: usize) -> Self {
        self.max_draw_contexts = max;
        self
    }

    /// Set the initial preview canvas size
    pub fn with_canvas(mut self, width: u32, height: u32) -> Self {
        self.canvas = Extent2D::new(width, height);
        self
    }

    /// Set the unscaled canvas size
    pub fn with_unscaled_canvas(mut self, width: u32, height: u32) -> Self {
        self.unscaled_canvas = Extent2D::new(width, height);
        self
    }

    /// Set the clear color
    pub fn with_background(mut self, color: Rgba8) -> Self {
        self.background = color;
        self
    }

    /// Set the blit filter preference
    pub fn with_filter(mut self, filter: FilterPreference) -> Self {
        self.filter = filter;
        self
    }

    /// Set the largest accepted stream side
    pub fn with_max_stream_dimension(mut self, max: u32) -> Self {
        self.max_stream_dimension = max;
        self
    }

    /// Bound fence waits
    pub fn with_fence_timeout(mut self, timeout: Duration) -> Self {
        self.fence_timeout = Some(timeout);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_streams == 0 {
            return Err(ReelError::config("max_streams must be at least 1"));
        }
        if self.max_draw_contexts == 0 {
            return Err(ReelError::config("max_draw_contexts must be at least 1"));
        }
        if self.max_stream_dimension == 0 {
            return Err(ReelError::config("max_stream_dimension must be at least 1"));
        }
        for (name, extent) in [("canvas", self.canvas), ("unscaled_canvas", self.unscaled_canvas)] {
            if extent.is_empty() {
                return Err(ReelError::config(format!("{} size must be non-zero", name)));
            }
            if extent.width > MAX_CANVAS_DIMENSION || extent.height > MAX_CANVAS_DIMENSION {
                return Err(ReelError::config(format!(
                    "{} size {} exceeds the maximum image dimension",
                    name, extent
                )));
            }
        }
        if self.fence_timeout == Some(Duration::ZERO) {
            return Err(ReelError::config("fence_timeout must be non-zero"));
        }
        Ok(())
    }
}
