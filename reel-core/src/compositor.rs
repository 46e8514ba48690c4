//! Multi-source compositor
//!
//! Owns the stream and draw context tables, both canvases, and the GPU
//! backend. Producers write frames into streams, the UI layer places
//! streams on the canvas, and [`Compositor::compose_frame`] records and
//! submits one frame of blits.
//!
//! ```text
//!  capture producers ──write_stream_frame──▶ Stream table ─┐
//!                                                           ├─▶ compose_frame ─▶ preview canvas
//!  UI layer ──add/move/move_edge────────▶ Draw contexts ───┘                └─▶ unscaled canvas
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::blit::plan_blit;
use crate::canvas::Canvas;
use crate::config::{CompositorConfig, FilterPreference, MAX_CANVAS_DIMENSION};
use crate::error::{ReelError, Result};
use crate::formats::PixelFormat;
use crate::gpu::{
    BackendCapabilities, CommandBuffer, Filter, GpuBackend, ImageLayout, SampledBinding,
};
use crate::handle::{DrawHandle, HandleTable, StreamHandle, TableHandle};
use crate::metrics::{create_metrics, CompositorMetrics, CompositorStats};
use crate::placement::{self, DrawContext, Edge};
use crate::stream::Stream;
use crate::sync::FrameSync;
use crate::types::{Extent2D, NormalizedRect, PixelCoord, PixelRect};

/// Outcome of one [`Compositor::compose_frame`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FrameReport {
    /// Index of the submitted frame, or of the last one when nothing was submitted
    pub frame: u64,
    /// Whether a command buffer was submitted
    pub submitted: bool,
    /// Blits recorded across both canvases
    pub blits: usize,
    /// Blits cut at the canvas edge
    pub clipped_blits: usize,
    /// Streams destroyed at the start of the pass
    pub removals_applied: usize,
}

/// The compositor
pub struct Compositor<B: GpuBackend> {
    backend: B,
    config: CompositorConfig,
    capabilities: BackendCapabilities,
    filter: Filter,

    stream_table: HandleTable<StreamHandle>,
    streams: Vec<Stream>,
    draw_table: HandleTable<DrawHandle>,
    draws: Vec<DrawContext>,
    pending_removals: VecDeque<StreamHandle>,

    canvas: Canvas,
    unscaled: Canvas,
    sync: FrameSync,
    metrics: Arc<CompositorMetrics>,
}

impl<B: GpuBackend> Compositor<B> {
    /// Create a compositor and allocate both canvases
    ///
    /// Fails when the configuration is invalid or the backend cannot scale
    /// blits; both are fatal at startup.
    pub fn new(mut backend: B, config: CompositorConfig) -> Result<Self> {
        config.validate()?;

        let capabilities = backend.capabilities();
        if !capabilities.scaled_blit {
            return Err(ReelError::unsupported(format!(
                "backend '{}' cannot perform scaled blits",
                capabilities.name
            )));
        }
        for extent in [config.canvas, config.unscaled_canvas] {
            check_extent(extent, canvas_limit(&capabilities))?;
        }

        let filter = match config.filter {
            FilterPreference::Auto if capabilities.linear_blit => Filter::Linear,
            _ => Filter::Nearest,
        };

        let sync = FrameSync::new(config.fence_timeout);
        let canvas = Canvas::allocate(
            &mut backend,
            SampledBinding::PreviewCanvas,
            config.canvas,
            config.background,
            &sync,
        )?;
        let unscaled = Canvas::allocate(
            &mut backend,
            SampledBinding::UnscaledCanvas,
            config.unscaled_canvas,
            config.background,
            &sync,
        )?;

        info!(
            "Compositor ready on {} backend: canvas {}, unscaled {}, {:?} filtering, {} streams / {} sources",
            capabilities.name,
            config.canvas,
            config.unscaled_canvas,
            filter,
            config.max_streams,
            config.max_draw_contexts
        );

        Ok(Self {
            backend,
            capabilities,
            filter,
            stream_table: HandleTable::new(config.max_streams),
            streams: Vec::with_capacity(config.max_streams),
            draw_table: HandleTable::new(config.max_draw_contexts),
            draws: Vec::with_capacity(config.max_draw_contexts),
            pending_removals: VecDeque::new(),
            canvas,
            unscaled,
            sync,
            metrics: create_metrics(),
            config,
        })
    }

    // Stream lifecycle

    /// Create a stream of `width`x`height` pixels
    pub fn create_stream(
        &mut self,
        format: PixelFormat,
        width: u32,
        height: u32,
    ) -> Result<StreamHandle> {
        let extent = Extent2D::new(width, height);
        let max = self
            .config
            .max_stream_dimension
            .min(self.capabilities.max_image_dimension);
        check_extent(extent, max)?;

        let limit = ReelError::StreamLimitReached {
            max: self.stream_table.capacity(),
        };
        let handle = match self.stream_table.allocate(self.streams.len()) {
            Some(handle) => handle,
            None => {
                warn!("Refusing {} stream: {}", extent, limit);
                return Err(limit);
            }
        };

        match Stream::create(&mut self.backend, handle, format, extent, &self.sync) {
            Ok(stream) => {
                self.streams.push(stream);
                self.metrics.record_stream_created();
                Ok(handle)
            }
            Err(e) => {
                self.stream_table.free(handle)?;
                Err(e)
            }
        }
    }

    /// Copy one frame into a stream; `pixels` must be exactly
    /// `width * height * 4` bytes
    pub fn write_stream_frame(&mut self, handle: StreamHandle, pixels: &[u8]) -> Result<()> {
        let position = self.stream_table.resolve(handle)?;
        self.streams[position].write_frame(&mut self.backend, pixels)
    }

    /// Queue a stream for destruction at the start of the next frame
    ///
    /// Every draw context that uses the stream goes with it.
    pub fn remove_stream(&mut self, handle: StreamHandle) -> Result<()> {
        self.stream_table.resolve(handle)?;
        if self.pending_removals.contains(&handle) {
            return Err(ReelError::RemovalPending(handle.to_string()));
        }
        self.pending_removals.push_back(handle);
        debug!(
            "Queued removal of {} ({} pending)",
            handle,
            self.pending_removals.len()
        );
        Ok(())
    }

    /// Destroy every queued stream and its draw contexts
    fn apply_pending_removals(&mut self) -> Result<usize> {
        if self.pending_removals.is_empty() {
            return Ok(0);
        }
        self.sync.wait_idle(&mut self.backend)?;

        let mut applied = 0;
        while let Some(handle) = self.pending_removals.pop_front() {
            let position = self.stream_table.resolve(handle)?;

            // Back to front so removing one entry never skips the next
            let mut dropped = 0;
            for i in (0..self.draws.len()).rev() {
                if self.draws[i].stream == handle {
                    let context = self.draws.remove(i);
                    self.draw_table.free(context.handle)?;
                    dropped += 1;
                }
            }
            rebind(&mut self.draw_table, &self.draws, 0, |c: &DrawContext| c.handle)?;

            let stream = self.streams.remove(position);
            stream.destroy(&mut self.backend);
            self.stream_table.free(handle)?;
            rebind(&mut self.stream_table, &self.streams, position, |s: &Stream| {
                s.handle()
            })?;

            self.metrics.record_stream_removed();
            info!("Removed {} and {} draw contexts", handle, dropped);
            applied += 1;
        }
        Ok(applied)
    }

    // Placement

    /// Place a stream on the canvas
    pub fn add_video_source(
        &mut self,
        stream: StreamHandle,
        extent: NormalizedRect,
    ) -> Result<DrawHandle> {
        self.stream_table.resolve(stream)?;
        if self.pending_removals.contains(&stream) {
            return Err(ReelError::RemovalPending(stream.to_string()));
        }
        let extent = placement::validate_extent(extent)?;

        let handle = self
            .draw_table
            .allocate(self.draws.len())
            .ok_or(ReelError::DrawLimitReached {
                max: self.draw_table.capacity(),
            })?;
        self.draws.push(DrawContext {
            handle,
            stream,
            extent,
        });
        debug!("Placed {} at {} as {}", stream, extent, handle);
        Ok(handle)
    }

    /// Remove one placed source, keeping the draw order of the rest
    pub fn remove_video_source(&mut self, handle: DrawHandle) -> Result<()> {
        let position = self.draw_table.resolve(handle)?;
        self.draws.remove(position);
        self.draw_table.free(handle)?;
        rebind(&mut self.draw_table, &self.draws, position, |c: &DrawContext| c.handle)?;
        debug!("Removed {}", handle);
        Ok(())
    }

    /// Draw a source last, above every other source
    pub fn raise_source(&mut self, handle: DrawHandle) -> Result<()> {
        let position = self.draw_table.resolve(handle)?;
        let context = self.draws.remove(position);
        self.draws.push(context);
        rebind(&mut self.draw_table, &self.draws, position, |c: &DrawContext| c.handle)
    }

    /// Move a source so its top-left corner sits at (`x`, `y`) canvas pixels
    ///
    /// The size is kept; the position is clamped so the source stays on the
    /// canvas.
    pub fn move_source(&mut self, handle: DrawHandle, x: f32, y: f32) -> Result<()> {
        let canvas = self.canvas.extent();
        let context = self.context_mut(handle)?;
        context.extent = placement::moved(context.extent, PixelCoord::new(x, y), canvas)?;
        debug!("Moved {} to {}", handle, context.extent);
        Ok(())
    }

    pub fn move_edge_left(&mut self, handle: DrawHandle, x: f32) -> Result<()> {
        self.move_edge(handle, Edge::Left, x)
    }

    pub fn move_edge_right(&mut self, handle: DrawHandle, x: f32) -> Result<()> {
        self.move_edge(handle, Edge::Right, x)
    }

    pub fn move_edge_top(&mut self, handle: DrawHandle, y: f32) -> Result<()> {
        self.move_edge(handle, Edge::Top, y)
    }

    pub fn move_edge_bottom(&mut self, handle: DrawHandle, y: f32) -> Result<()> {
        self.move_edge(handle, Edge::Bottom, y)
    }

    /// Drag one edge to a canvas pixel value, holding the opposite edge
    ///
    /// Values off the canvas are ignored. A drag that would invert the
    /// rectangle fails with [`ReelError::InvalidPlacement`] and changes nothing.
    pub fn move_edge(&mut self, handle: DrawHandle, edge: Edge, value: f32) -> Result<()> {
        let canvas = self.canvas.extent();
        let context = self.context_mut(handle)?;
        match placement::moved_edge(context.extent, edge, value, canvas)? {
            Some(extent) => {
                context.extent = extent;
                debug!("Dragged {} edge of {} to {}: {}", edge, handle, value, extent);
            }
            None => warn!(
                "Ignoring {} edge drag of {} to {} outside {}",
                edge, handle, value, canvas
            ),
        }
        Ok(())
    }

    /// Pixel rectangle a source covers on the preview canvas, top-left origin
    pub fn source_relative_extent(&self, handle: DrawHandle) -> Result<PixelRect> {
        let context = self.draw_context(handle)?;
        Ok(placement::to_pixel_rect(context.extent, self.canvas.extent()))
    }

    /// Top-left corner of a source on the preview canvas
    pub fn source_relative_placement(&self, handle: DrawHandle) -> Result<PixelCoord> {
        let context = self.draw_context(handle)?;
        Ok(placement::to_pixel_coord(context.extent, self.canvas.extent()))
    }

    /// Normalized placement of a source
    pub fn relative_extent(&self, handle: DrawHandle) -> Result<NormalizedRect> {
        Ok(self.draw_context(handle)?.extent)
    }

    pub fn draw_context(&self, handle: DrawHandle) -> Result<&DrawContext> {
        let position = self.draw_table.resolve(handle)?;
        Ok(&self.draws[position])
    }

    fn context_mut(&mut self, handle: DrawHandle) -> Result<&mut DrawContext> {
        let position = self.draw_table.resolve(handle)?;
        Ok(&mut self.draws[position])
    }

    // Canvas

    /// Resize the preview canvas; equal dimensions are a no-op
    pub fn resize_canvas(&mut self, width: u32, height: u32) -> Result<()> {
        let extent = Extent2D::new(width, height);
        check_extent(extent, canvas_limit(&self.capabilities))?;

        let grew = self.canvas.resize(
            &mut self.backend,
            extent,
            self.config.background,
            &mut self.sync,
        )?;
        if grew {
            self.metrics.record_canvas_reallocation();
        }
        Ok(())
    }

    /// Preview canvas pixels (RGBA8), after the last frame has retired
    pub fn canvas_pixels(&mut self) -> Result<&[u8]> {
        self.sync.wait_idle(&mut self.backend)?;
        self.canvas.pixels(&self.backend)
    }

    /// Unscaled canvas pixels (RGBA8) for recording encoders
    pub fn unscaled_canvas_pixels(&mut self) -> Result<&[u8]> {
        self.sync.wait_idle(&mut self.backend)?;
        self.unscaled.pixels(&self.backend)
    }

    // Composition

    /// Record and submit one frame
    ///
    /// Applies queued stream removals, clears both canvases, blits every
    /// placed source into each of them, and leaves both canvases ready for
    /// sampling behind a single barrier. Does nothing else when no source
    /// is placed.
    pub fn compose_frame(&mut self) -> Result<FrameReport> {
        let started = Instant::now();
        let removals_applied = self.apply_pending_removals()?;

        if self.draws.is_empty() {
            return Ok(FrameReport {
                frame: self.sync.frames_submitted(),
                removals_applied,
                ..Default::default()
            });
        }

        // The previous frame may still be reading the canvases
        self.sync.wait_idle(&mut self.backend)?;

        let mut cmd = CommandBuffer::new();
        for canvas in [&self.canvas, &self.unscaled] {
            if canvas.layout() != ImageLayout::General {
                cmd.transition(canvas.image(), canvas.layout(), ImageLayout::General);
            }
            cmd.clear(canvas.image(), self.config.background);
        }

        let mut blits = 0;
        let mut clipped_blits = 0;
        for context in &self.draws {
            let stream = &self.streams[self.stream_table.resolve(context.stream)?];
            for canvas in [&self.canvas, &self.unscaled] {
                let region = plan_blit(context.extent, stream.extent(), canvas.extent())?;
                let Some(region) = region else {
                    trace!("{} lands outside {:?}", context.handle, canvas.binding());
                    continue;
                };
                if region.clipped {
                    clipped_blits += 1;
                    trace!(
                        "{} clipped to {} on {:?}",
                        context.handle,
                        region.dst,
                        canvas.binding()
                    );
                }
                trace!(
                    "Blit {} {} -> {:?} {}",
                    context.handle,
                    region.src,
                    canvas.binding(),
                    region.dst
                );
                cmd.blit(
                    stream.image(),
                    region.src,
                    canvas.image(),
                    region.dst,
                    self.filter,
                );
                blits += 1;
            }
        }

        cmd.barrier(
            vec![self.canvas.image(), self.unscaled.image()],
            ImageLayout::General,
            ImageLayout::ShaderReadOnly,
        );

        let fence = self.backend.submit(cmd)?;
        let frame = self.sync.submitted(fence);
        self.canvas.set_layout(ImageLayout::ShaderReadOnly);
        self.unscaled.set_layout(ImageLayout::ShaderReadOnly);

        self.metrics
            .record_frame(started.elapsed(), blits, clipped_blits);
        trace!("Submitted frame {} with {} blits", frame, blits);

        Ok(FrameReport {
            frame,
            submitted: true,
            blits,
            clipped_blits,
            removals_applied,
        })
    }

    /// Block until the last submitted frame has retired
    pub fn wait_idle(&mut self) -> Result<()> {
        self.sync.wait_idle(&mut self.backend)
    }

    // Queries

    /// Live streams, including ones queued for removal
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    pub fn draw_context_count(&self) -> usize {
        self.draws.len()
    }

    /// Streams queued for removal
    pub fn pending_removal_count(&self) -> usize {
        self.pending_removals.len()
    }

    /// Placed sources in draw order (first drawn first)
    pub fn draw_contexts(&self) -> impl Iterator<Item = &DrawContext> + '_ {
        self.draws.iter()
    }

    /// Live streams in creation order
    pub fn streams(&self) -> impl Iterator<Item = &Stream> + '_ {
        self.streams.iter()
    }

    pub fn stream(&self, handle: StreamHandle) -> Result<&Stream> {
        let position = self.stream_table.resolve(handle)?;
        Ok(&self.streams[position])
    }

    pub fn canvas_dimensions(&self) -> Extent2D {
        self.canvas.extent()
    }

    pub fn unscaled_canvas_dimensions(&self) -> Extent2D {
        self.unscaled.extent()
    }

    /// Bytes reserved for the preview canvas (high-water mark)
    pub fn canvas_capacity(&self) -> usize {
        self.canvas.capacity()
    }

    /// Filter used for every blit
    pub fn filter(&self) -> Filter {
        self.filter
    }

    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    pub fn capabilities(&self) -> &BackendCapabilities {
        &self.capabilities
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Shared metrics handle
    pub fn metrics(&self) -> Arc<CompositorMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn stats(&self) -> CompositorStats {
        self.metrics.stats()
    }
}

impl<B: GpuBackend> Drop for Compositor<B> {
    fn drop(&mut self) {
        if let Err(e) = self.sync.wait_idle(&mut self.backend) {
            warn!("Releasing compositor resources without a retired frame: {}", e);
        }
        for stream in std::mem::take(&mut self.streams) {
            stream.destroy(&mut self.backend);
        }
        self.canvas.release(&mut self.backend);
        self.unscaled.release(&mut self.backend);
        debug!("Compositor resources released");
    }
}

impl<B: GpuBackend> std::fmt::Debug for Compositor<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("backend", &self.capabilities.name)
            .field("streams", &self.streams.len())
            .field("draw_contexts", &self.draws.len())
            .field("pending_removals", &self.pending_removals.len())
            .field("canvas", &self.canvas.extent())
            .field("unscaled_canvas", &self.unscaled.extent())
            .finish()
    }
}

fn check_extent(extent: Extent2D, max: u32) -> Result<()> {
    if extent.is_empty() || extent.width > max || extent.height > max {
        return Err(ReelError::InvalidDimensions {
            width: extent.width,
            height: extent.height,
        });
    }
    Ok(())
}

/// Largest canvas side the configuration and the backend both accept
fn canvas_limit(capabilities: &BackendCapabilities) -> u32 {
    MAX_CANVAS_DIMENSION.min(capabilities.max_image_dimension)
}

/// Point every handle at or after `from` at its record's new position
fn rebind<H, T>(
    table: &mut HandleTable<H>,
    records: &[T],
    from: usize,
    handle_of: impl Fn(&T) -> H,
) -> Result<()>
where
    H: TableHandle,
{
    for (position, record) in records.iter().enumerate().skip(from) {
        table.rebind(handle_of(record), position)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::SoftwareBackend;

    fn compositor() -> Compositor<SoftwareBackend> {
        let config = CompositorConfig::default()
            .with_max_streams(2)
            .with_canvas(64, 36)
            .with_unscaled_canvas(96, 54);
        Compositor::new(SoftwareBackend::new(), config).unwrap()
    }

    #[test]
    fn test_new_allocates_both_canvases() {
        let compositor = compositor();
        assert_eq!(compositor.canvas_dimensions(), Extent2D::new(64, 36));
        assert_eq!(compositor.unscaled_canvas_dimensions(), Extent2D::new(96, 54));
        assert_eq!(compositor.backend().image_count(), 2);
        assert_eq!(compositor.filter(), Filter::Linear);
    }

    #[test]
    fn test_nearest_without_linear_support() {
        let compositor =
            Compositor::new(SoftwareBackend::with_linear_blit(false), CompositorConfig::default())
                .unwrap();
        assert_eq!(compositor.filter(), Filter::Nearest);
    }

    #[test]
    fn test_stream_dimensions_checked() {
        let mut compositor = compositor();
        assert!(matches!(
            compositor.create_stream(PixelFormat::Rgba8, 0, 10),
            Err(ReelError::InvalidDimensions { .. })
        ));
        assert!(compositor.create_stream(PixelFormat::Rgba8, 5000, 10).is_err());
        assert_eq!(compositor.stream_count(), 0);
    }

    #[test]
    fn test_empty_frame_submits_nothing() {
        let mut compositor = compositor();
        let before = compositor.backend().submissions();
        let report = compositor.compose_frame().unwrap();
        assert!(!report.submitted);
        assert_eq!(report.blits, 0);
        assert_eq!(compositor.backend().submissions(), before);
    }

    #[test]
    fn test_frame_leaves_canvases_sampleable() {
        let mut compositor = compositor();
        let stream = compositor.create_stream(PixelFormat::Rgba8, 32, 18).unwrap();
        compositor
            .add_video_source(stream, NormalizedRect::FULL)
            .unwrap();

        let report = compositor.compose_frame().unwrap();
        assert!(report.submitted);
        assert_eq!(report.frame, 1);
        assert_eq!(report.blits, 2);
        assert_eq!(
            compositor.backend().image_layout(compositor.canvas.image()),
            Some(ImageLayout::ShaderReadOnly)
        );
        assert_eq!(
            compositor.backend().image_layout(compositor.unscaled.image()),
            Some(ImageLayout::ShaderReadOnly)
        );

        // A second frame transitions back before clearing
        assert_eq!(compositor.compose_frame().unwrap().frame, 2);
    }
}
