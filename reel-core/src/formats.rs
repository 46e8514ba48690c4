//! Pixel formats accepted from capture producers
//!
//! Streams are always 4 bytes per pixel; canvases are always RGBA8.
//! Blits convert channel order and force alpha to opaque for padded formats.

use serde::{Deserialize, Serialize};

use crate::error::{ReelError, Result};

/// DRM format fourcc constants
///
/// See: <https://github.com/torvalds/linux/blob/master/include/uapi/drm/drm_fourcc.h>
pub mod fourcc {
    /// ABGR8888 - bytes R, G, B, A in memory
    pub const ABGR8888: u32 = 0x34324241; // AB24
    /// XBGR8888 - bytes R, G, B, X in memory
    pub const XBGR8888: u32 = 0x34324258; // XB24
    /// ARGB8888 - bytes B, G, R, A in memory
    pub const ARGB8888: u32 = 0x34325241; // AR24
    /// XRGB8888 - bytes B, G, R, X in memory
    pub const XRGB8888: u32 = 0x34325258; // XR24
    /// RGB888 - 24-bit
    pub const RGB888: u32 = 0x34324752; // RG24
    /// BGR888 - 24-bit
    pub const BGR888: u32 = 0x34324742; // BG24
}

/// Bytes per pixel for every stream and canvas image
pub const BYTES_PER_PIXEL: usize = 4;

/// Memory layout of a stream's pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// R, G, B, A
    #[default]
    Rgba8,
    /// R, G, B, padding
    Rgbx8,
    /// B, G, R, A
    Bgra8,
    /// B, G, R, padding
    Bgrx8,
}

impl PixelFormat {
    pub const ALL: [PixelFormat; 4] = [Self::Rgba8, Self::Rgbx8, Self::Bgra8, Self::Bgrx8];

    pub fn bytes_per_pixel(&self) -> usize {
        BYTES_PER_PIXEL
    }

    /// Whether the fourth byte carries alpha (otherwise it is padding)
    pub fn has_alpha(&self) -> bool {
        matches!(self, Self::Rgba8 | Self::Bgra8)
    }

    /// Whether blue is stored first
    pub fn is_bgr_order(&self) -> bool {
        matches!(self, Self::Bgra8 | Self::Bgrx8)
    }

    /// DRM fourcc code with the same memory layout
    pub fn fourcc(&self) -> u32 {
        match self {
            Self::Rgba8 => fourcc::ABGR8888,
            Self::Rgbx8 => fourcc::XBGR8888,
            Self::Bgra8 => fourcc::ARGB8888,
            Self::Bgrx8 => fourcc::XRGB8888,
        }
    }

    /// Look up a format by DRM fourcc
    pub fn from_fourcc(code: u32) -> Result<Self> {
        match code {
            fourcc::ABGR8888 => Ok(Self::Rgba8),
            fourcc::XBGR8888 => Ok(Self::Rgbx8),
            fourcc::ARGB8888 => Ok(Self::Bgra8),
            fourcc::XRGB8888 => Ok(Self::Bgrx8),
            fourcc::RGB888 | fourcc::BGR888 => Err(ReelError::unsupported(format!(
                "24-bit format 0x{:08x}; streams require 4 bytes per pixel",
                code
            ))),
            _ => Err(ReelError::unsupported(format!("fourcc 0x{:08x}", code))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Rgba8 => "rgba",
            Self::Rgbx8 => "rgbx",
            Self::Bgra8 => "bgra",
            Self::Bgrx8 => "bgrx",
        }
    }

    /// Convert one pixel of this format to RGBA8
    ///
    /// Padding bytes read as opaque.
    #[inline]
    pub fn to_rgba(&self, px: [u8; 4]) -> [u8; 4] {
        let [r, g, b, a] = if self.is_bgr_order() {
            [px[2], px[1], px[0], px[3]]
        } else {
            px
        };
        [r, g, b, if self.has_alpha() { a } else { 255 }]
    }

    /// Convert one RGBA8 pixel to this format
    ///
    /// Alpha is written into the padding byte of formats without alpha.
    #[inline]
    pub fn from_rgba(&self, px: [u8; 4]) -> [u8; 4] {
        if self.is_bgr_order() {
            [px[2], px[1], px[0], px[3]]
        } else {
            px
        }
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for PixelFormat {
    type Err = ReelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "rgba" | "rgba8" | "abgr8888" => Ok(Self::Rgba8),
            "rgbx" | "rgbx8" | "xbgr8888" => Ok(Self::Rgbx8),
            "bgra" | "bgra8" | "argb8888" => Ok(Self::Bgra8),
            "bgrx" | "bgrx8" | "xrgb8888" => Ok(Self::Bgrx8),
            "rgb" | "bgr" => Err(ReelError::unsupported(format!(
                "24-bit format '{}'; streams require 4 bytes per pixel",
                s
            ))),
            _ => Err(ReelError::unsupported(format!("pixel format '{}'", s))),
        }
    }
}
