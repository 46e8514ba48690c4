//! Stream resources
//!
//! A stream is one ingested video source: CPU-visible memory written by the
//! capture producer, and an image over that memory that blits read from.

use tracing::{debug, info};

use crate::error::{ReelError, Result};
use crate::formats::PixelFormat;
use crate::gpu::{
    CommandBuffer, GpuBackend, ImageDesc, ImageId, ImageLayout, ImageUsage, MemoryId,
};
use crate::handle::StreamHandle;
use crate::sync::FrameSync;
use crate::types::{Extent2D, PixelRect};

/// One live stream
#[derive(Debug)]
pub struct Stream {
    handle: StreamHandle,
    format: PixelFormat,
    extent: Extent2D,
    memory: MemoryId,
    image: ImageId,
}

impl Stream {
    /// Allocate memory and an image, and move the image into the blit-source
    /// layout before returning
    pub(crate) fn create<B: GpuBackend + ?Sized>(
        backend: &mut B,
        handle: StreamHandle,
        format: PixelFormat,
        extent: Extent2D,
        sync: &FrameSync,
    ) -> Result<Self> {
        let desc = ImageDesc {
            extent,
            format,
            usage: ImageUsage::StreamSource,
        };

        let memory = backend.allocate_memory(desc.byte_size())?;
        let image = match backend.create_image(&desc, memory) {
            Ok(image) => image,
            Err(e) => {
                backend.free_memory(memory);
                return Err(e);
            }
        };

        let mut cmd = CommandBuffer::new();
        cmd.transition(image, ImageLayout::Undefined, ImageLayout::TransferSrc);
        if let Err(e) = sync.submit_blocking(backend, cmd) {
            backend.destroy_image(image);
            backend.free_memory(memory);
            return Err(e);
        }

        info!("Created {} {} stream as {}", extent, format, handle);
        Ok(Self {
            handle,
            format,
            extent,
            memory,
            image,
        })
    }

    pub fn handle(&self) -> StreamHandle {
        self.handle
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Native resolution of the source
    pub fn extent(&self) -> Extent2D {
        self.extent
    }

    /// Exact byte length a frame must have
    pub fn frame_size(&self) -> usize {
        self.extent.byte_size(self.format.bytes_per_pixel())
    }

    /// Whole-stream source rectangle
    pub fn rect(&self) -> PixelRect {
        PixelRect::full(self.extent)
    }

    pub(crate) fn image(&self) -> ImageId {
        self.image
    }

    /// Copy one frame into the stream's mapped memory
    ///
    /// Blits already in flight may observe a partially written frame.
    pub(crate) fn write_frame<B: GpuBackend + ?Sized>(
        &self,
        backend: &mut B,
        pixels: &[u8],
    ) -> Result<()> {
        let expected = self.frame_size();
        if pixels.len() != expected {
            return Err(ReelError::FrameSizeMismatch {
                expected,
                actual: pixels.len(),
            });
        }

        let mapped = backend.map_memory_mut(self.memory)?;
        let mapped_len = mapped.len();
        let dst = mapped.get_mut(..expected).ok_or_else(|| {
            ReelError::backend(format!(
                "{} mapping holds {} bytes, frame needs {}",
                self.handle, mapped_len, expected
            ))
        })?;
        dst.copy_from_slice(pixels);
        Ok(())
    }

    /// Release the image and its memory; the caller has already waited for
    /// every submission that read from it
    pub(crate) fn destroy<B: GpuBackend + ?Sized>(self, backend: &mut B) {
        backend.destroy_image(self.image);
        backend.free_memory(self.memory);
        debug!("Released resources of {}", self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::SoftwareBackend;
    use crate::handle::TableHandle;

    fn stream(backend: &mut SoftwareBackend, format: PixelFormat) -> Stream {
        Stream::create(
            backend,
            StreamHandle::from_parts(0, 0),
            format,
            Extent2D::new(4, 2),
            &FrameSync::new(None),
        )
        .unwrap()
    }

    #[test]
    fn test_create_transitions_to_blit_source() {
        let mut backend = SoftwareBackend::new();
        let stream = stream(&mut backend, PixelFormat::Bgrx8);
        assert_eq!(
            backend.image_layout(stream.image()),
            Some(ImageLayout::TransferSrc)
        );
        assert_eq!(stream.frame_size(), 32);
        assert_eq!(stream.rect(), PixelRect::new(0, 0, 4, 2));
    }

    #[test]
    fn test_write_frame_checks_length() {
        let mut backend = SoftwareBackend::new();
        let stream = stream(&mut backend, PixelFormat::Rgba8);

        let err = stream.write_frame(&mut backend, &[0; 31]).unwrap_err();
        assert!(matches!(
            err,
            ReelError::FrameSizeMismatch {
                expected: 32,
                actual: 31
            }
        ));

        stream.write_frame(&mut backend, &[9; 32]).unwrap();
        assert!(backend.map_memory(stream.memory).unwrap().iter().all(|&b| b == 9));
    }

    #[test]
    fn test_destroy_releases_everything() {
        let mut backend = SoftwareBackend::new();
        let stream = stream(&mut backend, PixelFormat::Rgba8);
        assert_eq!(backend.image_count(), 1);
        stream.destroy(&mut backend);
        assert_eq!(backend.image_count(), 0);
        assert_eq!(backend.memory_count(), 0);
    }
}
