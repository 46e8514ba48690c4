//! Placement of sources on the canvas
//!
//! Placements are stored as normalized rectangles (bottom-left origin) so a
//! canvas resize never rewrites them. The UI layer talks in canvas pixels
//! with a top-left origin; the functions here convert between the two and
//! keep every stored rectangle inside the unit square.

use serde::Serialize;

use crate::error::{ReelError, Result};
use crate::handle::{DrawHandle, StreamHandle};
use crate::types::{Extent2D, NormalizedRect, PixelCoord, PixelRect, PLACEMENT_EPSILON};

/// One placed source
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DrawContext {
    pub(crate) handle: DrawHandle,
    pub(crate) stream: StreamHandle,
    pub(crate) extent: NormalizedRect,
}

impl DrawContext {
    pub fn handle(&self) -> DrawHandle {
        self.handle
    }

    /// Stream this context draws from
    pub fn stream(&self) -> StreamHandle {
        self.stream
    }

    /// Normalized placement, origin bottom-left
    pub fn relative_extent(&self) -> NormalizedRect {
        self.extent
    }
}

/// Rectangle edge targeted by an interactive resize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    Left,
    Right,
    Top,
    Bottom,
}

impl Edge {
    /// Canvas dimension the edge's pixel value is measured against
    fn span(&self, canvas: Extent2D) -> u32 {
        match self {
            Edge::Left | Edge::Right => canvas.width,
            Edge::Top | Edge::Bottom => canvas.height,
        }
    }
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Edge::Left => write!(f, "left"),
            Edge::Right => write!(f, "right"),
            Edge::Top => write!(f, "top"),
            Edge::Bottom => write!(f, "bottom"),
        }
    }
}

/// Accept a rectangle inside the unit square and snap float slack away
pub fn validate_extent(extent: NormalizedRect) -> Result<NormalizedRect> {
    if !extent.is_within_unit() {
        return Err(ReelError::placement(format!(
            "{} is not inside the unit square",
            extent
        )));
    }
    Ok(extent.clamped())
}

/// Pixel rectangle covered by `extent` on a canvas, top-left origin
pub fn to_pixel_rect(extent: NormalizedRect, canvas: Extent2D) -> PixelRect {
    let (w, h) = (canvas.width as f32, canvas.height as f32);
    let px = |v: f32, max: f32| (v.clamp(0.0, 1.0) * max).round() as u32;

    let left = px(extent.x, w);
    let right = px(extent.right(), w);
    let top = px(1.0 - extent.top(), h);
    let bottom = px(1.0 - extent.y, h);

    PixelRect::new(
        left,
        top,
        right.saturating_sub(left),
        bottom.saturating_sub(top),
    )
}

/// Top-left corner of `extent` in canvas pixels
pub fn to_pixel_coord(extent: NormalizedRect, canvas: Extent2D) -> PixelCoord {
    PixelCoord::new(
        extent.x * canvas.width as f32,
        (1.0 - extent.top()) * canvas.height as f32,
    )
}

/// Move the rectangle so its top-left corner sits at `position`, keeping
/// its size and clamping it inside the canvas
pub fn moved(
    extent: NormalizedRect,
    position: PixelCoord,
    canvas: Extent2D,
) -> Result<NormalizedRect> {
    if !position.x.is_finite() || !position.y.is_finite() {
        return Err(ReelError::placement(format!(
            "non-finite position ({}, {})",
            position.x, position.y
        )));
    }

    let x = position.x / canvas.width as f32;
    let y = 1.0 - position.y / canvas.height as f32 - extent.height;

    Ok(NormalizedRect {
        x: x.clamp(0.0, (1.0 - extent.width).max(0.0)),
        y: y.clamp(0.0, (1.0 - extent.height).max(0.0)),
        ..extent
    }
    .clamped())
}

/// Drag one edge to `value` canvas pixels while the opposite edge stays put
///
/// Returns `Ok(None)` for values outside `[0, canvas dimension]`, which are
/// ignored. A drag that would invert the rectangle is an error and leaves
/// nothing changed.
pub fn moved_edge(
    extent: NormalizedRect,
    edge: Edge,
    value: f32,
    canvas: Extent2D,
) -> Result<Option<NormalizedRect>> {
    let span = edge.span(canvas) as f32;
    if !value.is_finite() || value < 0.0 || value > span {
        return Ok(None);
    }
    let v = value / span;

    let mut next = extent;
    match edge {
        Edge::Left => {
            next.x = v;
            next.width = extent.right() - v;
        }
        Edge::Right => {
            next.width = v - extent.x;
        }
        Edge::Top => {
            next.height = (1.0 - v) - extent.y;
        }
        Edge::Bottom => {
            next.y = 1.0 - v;
            next.height = extent.top() - next.y;
        }
    }

    if next.width < -PLACEMENT_EPSILON || next.height < -PLACEMENT_EPSILON {
        return Err(ReelError::placement(format!(
            "dragging the {} edge to {} would invert {}",
            edge, value, extent
        )));
    }
    next.width = next.width.max(0.0);
    next.height = next.height.max(0.0);

    validate_extent(next).map(Some)
}
