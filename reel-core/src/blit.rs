//! Per-source blit geometry
//!
//! The destination keeps the stream's native pixel density: its size is the
//! placement fraction of the canvas scaled by `stream / canvas`, anchored at
//! the placement's top-left corner. Whatever falls outside the canvas is
//! clipped, and the source region is cropped by the same proportion.

use crate::error::{ReelError, Result};
use crate::types::{Extent2D, NormalizedRect, PixelRect, Scale2D};

/// Source and destination regions of one blit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlitRegion {
    pub src: PixelRect,
    pub dst: PixelRect,
    /// The destination ran past the canvas and was cut
    pub clipped: bool,
}

/// Tolerance before a destination edge counts as past the canvas
const CLIP_SLACK: f64 = 1e-3;

/// Compute the blit of a whole stream placed at `extent` on `canvas`
///
/// Returns `Ok(None)` when nothing of the source lands on the canvas.
pub fn plan_blit(
    extent: NormalizedRect,
    stream: Extent2D,
    canvas: Extent2D,
) -> Result<Option<BlitRegion>> {
    if stream.is_empty() || canvas.is_empty() {
        return Ok(None);
    }

    let scale = Scale2D::ratio(stream, canvas);
    let (cw, ch) = (canvas.width as f64, canvas.height as f64);

    let left = cw * extent.x as f64;
    let top = ch * (1.0 - (extent.y as f64 + extent.height as f64));
    let width = cw * extent.width as f64 * scale.horizontal as f64;
    let height = ch * extent.height as f64 * scale.vertical as f64;
    if width <= 0.0 || height <= 0.0 {
        return Ok(None);
    }

    let vis_left = left.max(0.0);
    let vis_top = top.max(0.0);
    let vis_right = (left + width).min(cw);
    let vis_bottom = (top + height).min(ch);
    let clipped = left + width > cw + CLIP_SLACK || top + height > ch + CLIP_SLACK;

    let dst = edges_to_rect(vis_left, vis_top, vis_right, vis_bottom, canvas);
    if dst.is_empty() {
        return Ok(None);
    }

    // Source pixels per destination pixel
    let (sx, sy) = (stream.width as f64 / width, stream.height as f64 / height);
    let src = edges_to_rect(
        (vis_left - left) * sx,
        (vis_top - top) * sy,
        (vis_right - left) * sx,
        (vis_bottom - top) * sy,
        stream,
    );
    if src.is_empty() {
        return Ok(None);
    }

    if dst.width > src.width || dst.height > src.height {
        return Err(ReelError::UpscaleUnsupported(format!(
            "source region {} into destination {}",
            src, dst
        )));
    }

    Ok(Some(BlitRegion { src, dst, clipped }))
}

fn edges_to_rect(left: f64, top: f64, right: f64, bottom: f64, bounds: Extent2D) -> PixelRect {
    let snap = |v: f64, max: u32| v.round().clamp(0.0, max as f64) as u32;
    let (l, r) = (snap(left, bounds.width), snap(right, bounds.width));
    let (t, b) = (snap(top, bounds.height), snap(bottom, bounds.height));
    PixelRect::new(l, t, r.saturating_sub(l), b.saturating_sub(t))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HD: Extent2D = Extent2D::new(1920, 1080);

    #[test]
    fn test_native_stream_quadrant() {
        let region = plan_blit(NormalizedRect::new(0.0, 0.0, 0.5, 0.5), HD, HD)
            .unwrap()
            .unwrap();
        assert_eq!(region.dst, PixelRect::new(0, 540, 960, 540));
        assert_eq!(region.src, PixelRect::full(HD));
        assert!(!region.clipped);
    }

    #[test]
    fn test_small_stream_keeps_density() {
        // 640x360 stream on 1920x1080, full placement: drawn at 640x360 top-left
        let region = plan_blit(NormalizedRect::FULL, Extent2D::new(640, 360), HD)
            .unwrap()
            .unwrap();
        assert_eq!(region.dst, PixelRect::new(0, 0, 640, 360));
        assert_eq!(region.src, PixelRect::new(0, 0, 640, 360));
    }

    #[test]
    fn test_large_stream_is_clipped_and_cropped() {
        let canvas = Extent2D::new(1280, 720);
        let region = plan_blit(NormalizedRect::FULL, HD, canvas).unwrap().unwrap();
        assert!(region.clipped);
        assert_eq!(region.dst, PixelRect::full(canvas));
        assert_eq!(region.src, PixelRect::new(0, 0, 1280, 720));
    }

    #[test]
    fn test_clipped_half_scale() {
        // Placed at the right half with 0.5 width: drawn 1920 * 0.5 = 960 wide
        // starting at x=640, so 320 px are cut
        let canvas = Extent2D::new(1280, 720);
        let region = plan_blit(NormalizedRect::new(0.5, 0.0, 0.5, 1.0), HD, canvas)
            .unwrap()
            .unwrap();
        assert!(region.clipped);
        assert_eq!(region.dst, PixelRect::new(640, 0, 640, 720));
        assert_eq!(region.src, PixelRect::new(0, 0, 1280, 720));
    }

    #[test]
    fn test_zero_size_placement_skipped() {
        assert_eq!(
            plan_blit(NormalizedRect::new(0.5, 0.5, 0.0, 0.5), HD, HD).unwrap(),
            None
        );
    }

    #[test]
    fn test_never_upscales() {
        for (w, h) in [(1, 1), (3, 7), (1919, 1081), (4096, 2160)] {
            let stream = Extent2D::new(w, h);
            for extent in [
                NormalizedRect::FULL,
                NormalizedRect::new(0.1, 0.2, 0.33, 0.41),
                NormalizedRect::new(0.9, 0.9, 0.1, 0.1),
            ] {
                if let Some(region) = plan_blit(extent, stream, HD).unwrap() {
                    assert!(region.dst.width <= region.src.width);
                    assert!(region.dst.height <= region.src.height);
                    assert!(region.dst.fits_within(HD));
                    assert!(region.src.fits_within(stream));
                }
            }
        }
    }
}
