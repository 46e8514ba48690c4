//! Core types for Reel
//!
//! Geometry shared by the placement API and the compositor. Normalized
//! rectangles use a bottom-left origin; pixel rectangles use the canvas'
//! top-left origin.

use serde::{Deserialize, Serialize};

/// Float slack accepted when validating normalized rectangles
pub const PLACEMENT_EPSILON: f32 = 1e-6;

/// Width and height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels covered
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Size in bytes at the given pixel size
    pub fn byte_size(&self, bytes_per_pixel: usize) -> usize {
        self.pixel_count() * bytes_per_pixel
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Parse "WIDTHxHEIGHT"
    pub fn parse(s: &str) -> Option<Self> {
        let (w, h) = s.trim().split_once(['x', 'X'])?;
        Some(Self::new(w.trim().parse().ok()?, h.trim().parse().ok()?))
    }
}

impl std::fmt::Display for Extent2D {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl From<(u32, u32)> for Extent2D {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

/// Placement rectangle as fractions of the canvas, origin bottom-left
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl NormalizedRect {
    pub const FULL: Self = Self::new(0.0, 0.0, 1.0, 1.0);

    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn top(&self) -> f32 {
        self.y + self.height
    }

    /// Whether every field is in [0, 1] and the rectangle does not overflow
    /// the unit square (within [`PLACEMENT_EPSILON`])
    pub fn is_within_unit(&self) -> bool {
        let in_unit = |v: f32| v.is_finite() && (0.0..=1.0).contains(&v);
        in_unit(self.x)
            && in_unit(self.y)
            && in_unit(self.width)
            && in_unit(self.height)
            && self.right() <= 1.0 + PLACEMENT_EPSILON
            && self.top() <= 1.0 + PLACEMENT_EPSILON
    }

    /// Trim width/height so `x + width` and `y + height` never exceed 1.0
    pub fn clamped(mut self) -> Self {
        self.x = self.x.clamp(0.0, 1.0);
        self.y = self.y.clamp(0.0, 1.0);
        self.width = self.width.clamp(0.0, 1.0 - self.x);
        self.height = self.height.clamp(0.0, 1.0 - self.y);
        self
    }

    /// Parse "x,y,w,h"
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.split(',').map(|p| p.trim().parse::<f32>());
        let rect = Self::new(
            parts.next()?.ok()?,
            parts.next()?.ok()?,
            parts.next()?.ok()?,
            parts.next()?.ok()?,
        );
        if parts.next().is_some() {
            return None;
        }
        Some(rect)
    }
}

impl std::fmt::Display for NormalizedRect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({:.3}, {:.3}) {:.3}x{:.3}",
            self.x, self.y, self.width, self.height
        )
    }
}

/// Pixel rectangle in top-left-origin canvas space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle covering a whole image
    pub const fn full(extent: Extent2D) -> Self {
        Self::new(0, 0, extent.width, extent.height)
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether the rectangle lies fully inside an image of `extent`
    pub fn fits_within(&self, extent: Extent2D) -> bool {
        self.right() <= extent.width && self.bottom() <= extent.height
    }

    pub fn extent(&self) -> Extent2D {
        Extent2D::new(self.width, self.height)
    }
}

impl std::fmt::Display for PixelRect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Pixel coordinate in top-left-origin canvas space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PixelCoord {
    pub x: f32,
    pub y: f32,
}

impl PixelCoord {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Per-axis scale factor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scale2D {
    pub horizontal: f32,
    pub vertical: f32,
}

impl Scale2D {
    /// Ratio `numerator / denominator` per axis
    pub fn ratio(numerator: Extent2D, denominator: Extent2D) -> Self {
        Self {
            horizontal: numerator.width as f32 / denominator.width as f32,
            vertical: numerator.height as f32 / denominator.height as f32,
        }
    }
}

/// RGBA8 color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba8(pub [u8; 4]);

impl Rgba8 {
    pub const OPAQUE_BLACK: Self = Self([0, 0, 0, 255]);
}

impl Default for Rgba8 {
    fn default() -> Self {
        Self::OPAQUE_BLACK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extent_parse() {
        assert_eq!(Extent2D::parse("1920x1080"), Some(Extent2D::new(1920, 1080)));
        assert_eq!(Extent2D::parse(" 640X480 "), Some(Extent2D::new(640, 480)));
        assert_eq!(Extent2D::parse("1920"), None);
        assert_eq!(Extent2D::parse("ax1"), None);
    }

    #[test]
    fn test_unit_validation() {
        assert!(NormalizedRect::FULL.is_within_unit());
        assert!(NormalizedRect::new(0.5, 0.5, 0.5, 0.5).is_within_unit());
        assert!(!NormalizedRect::new(0.6, 0.0, 0.5, 0.5).is_within_unit());
        assert!(!NormalizedRect::new(-0.1, 0.0, 0.5, 0.5).is_within_unit());
        assert!(!NormalizedRect::new(0.0, 0.0, f32::NAN, 0.5).is_within_unit());
    }

    #[test]
    fn test_clamped_never_overflows() {
        let rect = NormalizedRect::new(0.7, 0.7, 0.3000001, 0.3000001).clamped();
        assert!(rect.right() <= 1.0);
        assert!(rect.top() <= 1.0);
    }

    #[test]
    fn test_rect_parse() {
        assert_eq!(
            NormalizedRect::parse("0,0.5,0.25,0.5"),
            Some(NormalizedRect::new(0.0, 0.5, 0.25, 0.5))
        );
        assert_eq!(NormalizedRect::parse("0,0,1"), None);
        assert_eq!(NormalizedRect::parse("0,0,1,1,1"), None);
    }
}
