//! Composition targets
//!
//! A canvas owns one image plus the memory behind it. Memory only grows:
//! a resize to a footprint that still fits the current allocation recreates
//! the image over the same memory, so dragging a window edge does not
//! reallocate on every step.

use tracing::{debug, info};

use crate::error::{ReelError, Result};
use crate::formats::PixelFormat;
use crate::gpu::{
    CommandBuffer, GpuBackend, ImageDesc, ImageId, ImageLayout, ImageUsage, MemoryId,
    SampledBinding,
};
use crate::sync::FrameSync;
use crate::types::{Extent2D, Rgba8};

/// Canvases are always RGBA8
pub const CANVAS_FORMAT: PixelFormat = PixelFormat::Rgba8;

#[derive(Debug)]
pub struct Canvas {
    binding: SampledBinding,
    extent: Extent2D,
    image: ImageId,
    layout: ImageLayout,
    memory: MemoryId,
    /// Bytes held by `memory`
    capacity: usize,
}

fn canvas_desc(extent: Extent2D) -> ImageDesc {
    ImageDesc {
        extent,
        format: CANVAS_FORMAT,
        usage: ImageUsage::Canvas,
    }
}

impl Canvas {
    /// First allocation
    pub(crate) fn allocate<B: GpuBackend + ?Sized>(
        backend: &mut B,
        binding: SampledBinding,
        extent: Extent2D,
        background: Rgba8,
        sync: &FrameSync,
    ) -> Result<Self> {
        let desc = canvas_desc(extent);
        let capacity = desc.byte_size();
        let memory = backend.allocate_memory(capacity)?;
        let image = match backend.create_image(&desc, memory) {
            Ok(image) => image,
            Err(e) => {
                backend.free_memory(memory);
                return Err(e);
            }
        };

        let mut canvas = Self {
            binding,
            extent,
            image,
            layout: ImageLayout::Undefined,
            memory,
            capacity,
        };
        canvas.prepare(backend, background, sync)?;
        info!("Allocated {:?} canvas at {}", binding, extent);
        Ok(canvas)
    }

    pub fn extent(&self) -> Extent2D {
        self.extent
    }

    pub fn binding(&self) -> SampledBinding {
        self.binding
    }

    /// Bytes currently reserved for the canvas
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn image(&self) -> ImageId {
        self.image
    }

    pub(crate) fn layout(&self) -> ImageLayout {
        self.layout
    }

    pub(crate) fn set_layout(&mut self, layout: ImageLayout) {
        self.layout = layout;
    }

    /// Replace the image with one of `extent`
    ///
    /// Returns `Ok(true)` when the backing memory was reallocated. Waits for
    /// the last submitted frame before destroying the old image. On error the
    /// canvas keeps its previous image and memory.
    pub(crate) fn resize<B: GpuBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        extent: Extent2D,
        background: Rgba8,
        sync: &mut FrameSync,
    ) -> Result<bool> {
        if extent == self.extent {
            debug!("{:?} canvas already {}, nothing to do", self.binding, extent);
            return Ok(false);
        }
        if extent.is_empty() {
            return Err(ReelError::InvalidDimensions {
                width: extent.width,
                height: extent.height,
            });
        }

        sync.wait_idle(backend)?;

        // Build the replacement first so a failure leaves the old image intact
        let desc = canvas_desc(extent);
        let needed = desc.byte_size();
        let grow = needed > self.capacity;
        let memory = if grow {
            backend.allocate_memory(needed)?
        } else {
            self.memory
        };
        let image = match backend.create_image(&desc, memory) {
            Ok(image) => image,
            Err(e) => {
                if grow {
                    backend.free_memory(memory);
                }
                return Err(e);
            }
        };

        backend.destroy_image(self.image);
        if grow {
            backend.free_memory(self.memory);
            self.memory = memory;
            self.capacity = needed;
            info!(
                "Reallocated {:?} canvas memory for {} ({} bytes)",
                self.binding, extent, needed
            );
        } else {
            debug!(
                "Reusing {} bytes of {:?} canvas memory for {}",
                self.capacity, self.binding, extent
            );
        }

        self.image = image;
        self.extent = extent;
        self.layout = ImageLayout::Undefined;
        self.prepare(backend, background, sync)?;
        Ok(grow)
    }

    /// Move a fresh image to `General`, clear it, and point the sampling
    /// descriptor at it
    fn prepare<B: GpuBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        background: Rgba8,
        sync: &FrameSync,
    ) -> Result<()> {
        let mut cmd = CommandBuffer::new();
        cmd.transition(self.image, ImageLayout::Undefined, ImageLayout::General);
        cmd.clear(self.image, background);
        sync.submit_blocking(backend, cmd)?;
        self.layout = ImageLayout::General;

        backend.rebind_sampled_image(self.binding, self.image)
    }

    /// Mapped pixels; the caller has already waited for the last frame
    pub(crate) fn pixels<'a, B: GpuBackend + ?Sized>(&self, backend: &'a B) -> Result<&'a [u8]> {
        let len = self.extent.byte_size(CANVAS_FORMAT.bytes_per_pixel());
        let mapped = backend.map_memory(self.memory)?;
        mapped.get(..len).ok_or_else(|| {
            ReelError::backend(format!(
                "{:?} canvas mapping is shorter than {} bytes",
                self.binding, len
            ))
        })
    }

    /// Destroy the image and free its memory
    pub(crate) fn release<B: GpuBackend + ?Sized>(&self, backend: &mut B) {
        backend.destroy_image(self.image);
        backend.free_memory(self.memory);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::SoftwareBackend;

    fn canvas(backend: &mut SoftwareBackend, extent: Extent2D) -> Canvas {
        Canvas::allocate(
            backend,
            SampledBinding::PreviewCanvas,
            extent,
            Rgba8([10, 20, 30, 255]),
            &FrameSync::new(None),
        )
        .unwrap()
    }

    #[test]
    fn test_allocate_clears_and_binds() {
        let mut backend = SoftwareBackend::new();
        let canvas = canvas(&mut backend, Extent2D::new(4, 4));

        assert_eq!(canvas.layout(), ImageLayout::General);
        assert_eq!(
            backend.sampled_image(SampledBinding::PreviewCanvas),
            Some(canvas.image())
        );
        let pixels = canvas.pixels(&backend).unwrap();
        assert_eq!(pixels.len(), 64);
        assert_eq!(&pixels[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn test_shrink_reuses_memory() {
        let mut backend = SoftwareBackend::new();
        let mut sync = FrameSync::new(None);
        let mut canvas = canvas(&mut backend, Extent2D::new(8, 8));
        let old_image = canvas.image();

        let grew = canvas
            .resize(&mut backend, Extent2D::new(4, 4), Rgba8::OPAQUE_BLACK, &mut sync)
            .unwrap();
        assert!(!grew);
        assert_eq!(canvas.capacity(), 256);
        assert_ne!(canvas.image(), old_image);
        assert_eq!(backend.image_count(), 1);
        assert_eq!(backend.memory_count(), 1);
        assert_eq!(canvas.pixels(&backend).unwrap().len(), 64);
    }

    #[test]
    fn test_grow_reallocates() {
        let mut backend = SoftwareBackend::new();
        let mut sync = FrameSync::new(None);
        let mut canvas = canvas(&mut backend, Extent2D::new(4, 4));

        let grew = canvas
            .resize(&mut backend, Extent2D::new(8, 4), Rgba8::OPAQUE_BLACK, &mut sync)
            .unwrap();
        assert!(grew);
        assert_eq!(canvas.capacity(), 128);
        assert_eq!(backend.memory_count(), 1);
        assert_eq!(
            backend.sampled_image(SampledBinding::PreviewCanvas),
            Some(canvas.image())
        );
    }

    #[test]
    fn test_same_size_is_noop() {
        let mut backend = SoftwareBackend::new();
        let mut sync = FrameSync::new(None);
        let mut canvas = canvas(&mut backend, Extent2D::new(4, 4));
        let image = canvas.image();
        let submissions = backend.submissions();

        assert!(!canvas
            .resize(&mut backend, Extent2D::new(4, 4), Rgba8::OPAQUE_BLACK, &mut sync)
            .unwrap());
        assert_eq!(canvas.image(), image);
        assert_eq!(backend.submissions(), submissions);
    }

    #[test]
    fn test_failed_resize_keeps_canvas() {
        let mut backend = SoftwareBackend::new();
        let mut sync = FrameSync::new(None);
        let mut canvas = canvas(&mut backend, Extent2D::new(4, 4));
        let image = canvas.image();

        // Memory allocates but the backend refuses an image this wide
        let result = canvas.resize(
            &mut backend,
            Extent2D::new(20_000, 1),
            Rgba8::OPAQUE_BLACK,
            &mut sync,
        );
        assert!(matches!(result, Err(ReelError::InvalidDimensions { .. })));
        assert_eq!(canvas.image(), image);
        assert_eq!(canvas.extent(), Extent2D::new(4, 4));
        assert_eq!(canvas.capacity(), 64);
        assert_eq!(backend.image_count(), 1);
        assert_eq!(backend.memory_count(), 1);
        assert_eq!(&canvas.pixels(&backend).unwrap()[..4], &[10, 20, 30, 255]);

        // Shrinking afterwards reuses the memory that is still live
        let grew = canvas
            .resize(&mut backend, Extent2D::new(2, 2), Rgba8::OPAQUE_BLACK, &mut sync)
            .unwrap();
        assert!(!grew);
        assert_eq!(canvas.pixels(&backend).unwrap().len(), 16);
        assert_eq!(
            backend.sampled_image(SampledBinding::PreviewCanvas),
            Some(canvas.image())
        );
    }
}
