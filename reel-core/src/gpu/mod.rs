//! GPU backend abstraction
//!
//! The compositor only needs a narrow slice of a GPU API: allocate memory,
//! create images on top of it, map memory for CPU access, submit recorded
//! command buffers with a fence, and wait on that fence. Everything else
//! (device selection, queues, descriptor pools) stays behind the backend.
//!
//! Command buffers are recorded as plain [`GpuCommand`] lists so the
//! compositor's output can be inspected without a device.

mod software;

pub use software::SoftwareBackend;

use std::time::Duration;

use serde::Serialize;

use crate::error::Result;
use crate::formats::PixelFormat;
use crate::types::{Extent2D, PixelRect, Rgba8};

/// Backend memory allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemoryId(pub u64);

/// Backend image object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(pub u64);

/// Submission fence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fence(pub u64);

/// Image layouts the compositor moves images through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    /// Contents undefined (freshly created)
    Undefined,
    /// Read/write from any stage
    General,
    /// Blit source
    TransferSrc,
    /// Blit/clear destination
    TransferDst,
    /// Sampled by shaders or read back by encoders
    ShaderReadOnly,
}

impl ImageLayout {
    /// Layouts a blit may read from
    pub fn is_blit_source(&self) -> bool {
        matches!(self, Self::TransferSrc | Self::General)
    }

    /// Layouts a blit or clear may write to
    pub fn is_blit_destination(&self) -> bool {
        matches!(self, Self::TransferDst | Self::General)
    }
}

/// What an image is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageUsage {
    /// CPU-written stream image, read by blits
    StreamSource,
    /// Blit target that is sampled and read back afterwards
    Canvas,
}

/// Image creation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDesc {
    pub extent: Extent2D,
    pub format: PixelFormat,
    pub usage: ImageUsage,
}

impl ImageDesc {
    /// Bytes the image needs from its backing memory
    pub fn byte_size(&self) -> usize {
        self.extent.byte_size(self.format.bytes_per_pixel())
    }
}

/// Blit filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    Nearest,
    Linear,
}

/// Descriptor bindings that sample a canvas image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampledBinding {
    /// Live preview canvas, sampled by the screen-space draw pass
    PreviewCanvas,
    /// Fixed-resolution canvas, read by recording encoders
    UnscaledCanvas,
}

/// What the backend can do, queried once at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendCapabilities {
    /// Human-readable backend name
    pub name: String,
    /// Linear filtering is supported for scaled blits
    pub linear_blit: bool,
    /// Scaled blits are supported at all
    pub scaled_blit: bool,
    /// Largest width or height of an image
    pub max_image_dimension: u32,
}

/// A recorded GPU command
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCommand {
    /// Layout transition / pipeline barrier over one or more images
    Barrier {
        images: Vec<ImageId>,
        from: ImageLayout,
        to: ImageLayout,
    },
    /// Fill a whole image with a color
    Clear { image: ImageId, color: Rgba8 },
    /// Copy a region, scaling with `filter` when sizes differ
    Blit {
        src: ImageId,
        src_rect: PixelRect,
        dst: ImageId,
        dst_rect: PixelRect,
        filter: Filter,
    },
}

/// Ordered list of commands submitted as one unit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandBuffer {
    commands: Vec<GpuCommand>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: GpuCommand) {
        self.commands.push(command);
    }

    /// Transition a single image
    pub fn transition(&mut self, image: ImageId, from: ImageLayout, to: ImageLayout) {
        self.push(GpuCommand::Barrier {
            images: vec![image],
            from,
            to,
        });
    }

    /// One barrier covering several images
    pub fn barrier(&mut self, images: Vec<ImageId>, from: ImageLayout, to: ImageLayout) {
        self.push(GpuCommand::Barrier { images, from, to });
    }

    pub fn clear(&mut self, image: ImageId, color: Rgba8) {
        self.push(GpuCommand::Clear { image, color });
    }

    pub fn blit(
        &mut self,
        src: ImageId,
        src_rect: PixelRect,
        dst: ImageId,
        dst_rect: PixelRect,
        filter: Filter,
    ) {
        self.push(GpuCommand::Blit {
            src,
            src_rect,
            dst,
            dst_rect,
            filter,
        });
    }

    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Number of blit commands recorded
    pub fn blit_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, GpuCommand::Blit { .. }))
            .count()
    }
}

/// GPU capability the compositor depends on
///
/// Implementations execute command buffers asynchronously; a returned
/// [`Fence`] signals once the GPU has finished with every resource the
/// submission referenced.
pub trait GpuBackend {
    /// Capabilities, queried once at startup
    fn capabilities(&self) -> BackendCapabilities;

    /// Allocate host-visible memory of `size` bytes
    fn allocate_memory(&mut self, size: usize) -> Result<MemoryId>;

    /// Release memory; images bound to it must already be destroyed
    fn free_memory(&mut self, memory: MemoryId);

    /// Create an image bound to `memory` at offset 0, in `Undefined` layout
    fn create_image(&mut self, desc: &ImageDesc, memory: MemoryId) -> Result<ImageId>;

    /// Destroy an image that no pending submission references
    fn destroy_image(&mut self, image: ImageId);

    /// CPU view of mapped memory
    fn map_memory(&self, memory: MemoryId) -> Result<&[u8]>;

    /// Writable CPU view of mapped memory
    fn map_memory_mut(&mut self, memory: MemoryId) -> Result<&mut [u8]>;

    /// Submit recorded commands; the fence signals on completion
    fn submit(&mut self, commands: CommandBuffer) -> Result<Fence>;

    /// Block until `fence` signals; `None` waits without bound
    fn wait_for_fence(&mut self, fence: Fence, timeout: Option<Duration>) -> Result<()>;

    /// Point a sampling descriptor at a new image view
    fn rebind_sampled_image(&mut self, _binding: SampledBinding, _image: ImageId) -> Result<()> {
        Ok(())
    }
}

impl<B: GpuBackend + ?Sized> GpuBackend for Box<B> {
    fn capabilities(&self) -> BackendCapabilities {
        (**self).capabilities()
    }

    fn allocate_memory(&mut self, size: usize) -> Result<MemoryId> {
        (**self).allocate_memory(size)
    }

    fn free_memory(&mut self, memory: MemoryId) {
        (**self).free_memory(memory)
    }

    fn create_image(&mut self, desc: &ImageDesc, memory: MemoryId) -> Result<ImageId> {
        (**self).create_image(desc, memory)
    }

    fn destroy_image(&mut self, image: ImageId) {
        (**self).destroy_image(image)
    }

    fn map_memory(&self, memory: MemoryId) -> Result<&[u8]> {
        (**self).map_memory(memory)
    }

    fn map_memory_mut(&mut self, memory: MemoryId) -> Result<&mut [u8]> {
        (**self).map_memory_mut(memory)
    }

    fn submit(&mut self, commands: CommandBuffer) -> Result<Fence> {
        (**self).submit(commands)
    }

    fn wait_for_fence(&mut self, fence: Fence, timeout: Option<Duration>) -> Result<()> {
        (**self).wait_for_fence(fence, timeout)
    }

    fn rebind_sampled_image(&mut self, binding: SampledBinding, image: ImageId) -> Result<()> {
        (**self).rebind_sampled_image(binding, image)
    }
}
