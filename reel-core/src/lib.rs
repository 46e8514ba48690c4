//! Reel Core Library
//!
//! Multi-source video compositing for screen recording and streaming.
//!
//! This library provides:
//! - Handle-based stream lifecycle (create, write frames, deferred removal)
//! - Normalized placement of sources on a shared canvas
//! - Per-frame blit composition into a preview canvas and a fixed-size
//!   recording canvas
//! - A narrow GPU backend trait with a CPU implementation
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────┐    ┌─────────────────┐
//! │ Capture streams │───▶│  Compositor  │───▶│ Preview canvas  │
//! │ (CPU frames)    │    │ (GPU blits)  │───▶│ Unscaled canvas │
//! └─────────────────┘    └──────────────┘    └─────────────────┘
//!                               ▲
//!                        placement commands
//! ```

pub mod blit;
pub mod canvas;
pub mod compositor;
pub mod config;
pub mod error;
pub mod formats;
pub mod gpu;
pub mod handle;
pub mod metrics;
pub mod placement;
pub mod stream;
pub mod sync;
pub mod types;

pub use compositor::{Compositor, FrameReport};
pub use config::{CompositorConfig, ConfigFile, FilterPreference};
pub use error::{ReelError, Result, ResultExt};
pub use formats::PixelFormat;
pub use gpu::{GpuBackend, SoftwareBackend};
pub use handle::{DrawHandle, StreamHandle};
pub use placement::{DrawContext, Edge};
pub use types::{Extent2D, NormalizedRect, PixelCoord, PixelRect, Rgba8};
