//! CPU implementation of [`GpuBackend`]
//!
//! Executes command buffers synchronously at submit time, so every fence is
//! already signaled when it is returned. Layouts are tracked and validated
//! the way a GPU validation layer would, which catches compositor bugs
//! (blitting from an image that was never transitioned, writing to a
//! canvas that is still in its sampling layout) in tests.

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, trace};

use super::{
    BackendCapabilities, CommandBuffer, Fence, Filter, GpuBackend, GpuCommand, ImageDesc,
    ImageId, ImageLayout, MemoryId, SampledBinding,
};
use crate::error::{ReelError, Result};
use crate::types::{PixelRect, Rgba8};

/// Largest image side the software backend accepts
const MAX_IMAGE_DIMENSION: u32 = 16384;

#[derive(Debug)]
struct SoftImage {
    desc: ImageDesc,
    memory: MemoryId,
    layout: ImageLayout,
}

/// Software GPU backend
#[derive(Debug)]
pub struct SoftwareBackend {
    memories: HashMap<MemoryId, Vec<u8>>,
    images: HashMap<ImageId, SoftImage>,
    bindings: HashMap<SampledBinding, ImageId>,
    next_id: u64,
    last_fence: u64,
    linear_blit: bool,
}

impl Default for SoftwareBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareBackend {
    /// Backend with linear blit filtering
    pub fn new() -> Self {
        Self::with_linear_blit(true)
    }

    /// Backend that reports (or hides) linear filtering support
    pub fn with_linear_blit(linear_blit: bool) -> Self {
        Self {
            memories: HashMap::new(),
            images: HashMap::new(),
            bindings: HashMap::new(),
            next_id: 1,
            last_fence: 0,
            linear_blit,
        }
    }

    /// Number of live memory allocations
    pub fn memory_count(&self) -> usize {
        self.memories.len()
    }

    /// Number of live images
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Current layout of an image
    pub fn image_layout(&self, image: ImageId) -> Option<ImageLayout> {
        self.images.get(&image).map(|i| i.layout)
    }

    /// Image currently bound to a sampling descriptor
    pub fn sampled_image(&self, binding: SampledBinding) -> Option<ImageId> {
        self.bindings.get(&binding).copied()
    }

    /// Fences submitted so far
    pub fn submissions(&self) -> u64 {
        self.last_fence
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn image(&self, image: ImageId) -> Result<&SoftImage> {
        self.images
            .get(&image)
            .ok_or_else(|| ReelError::backend(format!("unknown image {:?}", image)))
    }

    fn execute(&mut self, command: &GpuCommand) -> Result<()> {
        match command {
            GpuCommand::Barrier { images, from, to } => {
                for id in images {
                    let image = self
                        .images
                        .get_mut(id)
                        .ok_or_else(|| ReelError::backend(format!("unknown image {:?}", id)))?;
                    if *from != ImageLayout::Undefined && image.layout != *from {
                        return Err(ReelError::backend(format!(
                            "barrier on {:?} expects {:?} but image is in {:?}",
                            id, from, image.layout
                        )));
                    }
                    image.layout = *to;
                }
                Ok(())
            }
            GpuCommand::Clear { image, color } => self.clear(*image, *color),
            GpuCommand::Blit {
                src,
                src_rect,
                dst,
                dst_rect,
                filter,
            } => self.blit(*src, *src_rect, *dst, *dst_rect, *filter),
        }
    }

    fn clear(&mut self, id: ImageId, color: Rgba8) -> Result<()> {
        let image = self.image(id)?;
        if !image.layout.is_blit_destination() {
            return Err(ReelError::backend(format!(
                "clear of {:?} in layout {:?}",
                id, image.layout
            )));
        }

        let len = image.desc.byte_size();
        let pixel = image.desc.format.from_rgba(color.0);
        let memory = image.memory;
        let bytes = self.map_memory_mut(memory)?;
        let pixels: &mut [[u8; 4]] = bytemuck::try_cast_slice_mut(&mut bytes[..len])
            .map_err(|e| ReelError::backend(format!("unaligned image memory: {}", e)))?;
        pixels.fill(pixel);
        Ok(())
    }

    fn blit(
        &mut self,
        src_id: ImageId,
        src_rect: PixelRect,
        dst_id: ImageId,
        dst_rect: PixelRect,
        filter: Filter,
    ) -> Result<()> {
        if src_id == dst_id {
            return Err(ReelError::backend("blit source and destination alias"));
        }
        if filter == Filter::Linear && !self.linear_blit {
            return Err(ReelError::unsupported("linear blit filtering"));
        }

        let src = self.image(src_id)?;
        let dst = self.image(dst_id)?;
        if !src.layout.is_blit_source() {
            return Err(ReelError::backend(format!(
                "blit source {:?} in layout {:?}",
                src_id, src.layout
            )));
        }
        if !dst.layout.is_blit_destination() {
            return Err(ReelError::backend(format!(
                "blit destination {:?} in layout {:?}",
                dst_id, dst.layout
            )));
        }
        if !src_rect.fits_within(src.desc.extent) || !dst_rect.fits_within(dst.desc.extent) {
            return Err(ReelError::backend(format!(
                "blit region out of bounds: {} of {} -> {} of {}",
                src_rect, src.desc.extent, dst_rect, dst.desc.extent
            )));
        }
        if src_rect.is_empty() || dst_rect.is_empty() {
            return Ok(());
        }
        if src.memory == dst.memory {
            return Err(ReelError::backend("blit source and destination share memory"));
        }

        let (src_desc, dst_desc) = (src.desc, dst.desc);
        let (src_mem, dst_mem) = (src.memory, dst.memory);

        // Take the destination out of the map so the source can stay borrowed.
        let mut dst_bytes = std::mem::take(
            self.memories
                .get_mut(&dst_mem)
                .ok_or_else(|| ReelError::backend(format!("unknown memory {:?}", dst_mem)))?,
        );
        let result = match self.memories.get(&src_mem) {
            Some(src_bytes) => blit_pixels(
                src_bytes,
                &src_desc,
                src_rect,
                &mut dst_bytes,
                &dst_desc,
                dst_rect,
                filter,
            ),
            None => Err(ReelError::backend(format!("unknown memory {:?}", src_mem))),
        };

        if let Some(slot) = self.memories.get_mut(&dst_mem) {
            *slot = dst_bytes;
        }
        trace!("Blit {:?} {} -> {:?} {} ({:?})", src_id, src_rect, dst_id, dst_rect, filter);
        result
    }
}

/// Scale `src_rect` of `src_bytes` into `dst_rect` of `dst_bytes`
fn blit_pixels(
    src_bytes: &[u8],
    src_desc: &ImageDesc,
    src_rect: PixelRect,
    dst_bytes: &mut [u8],
    dst_desc: &ImageDesc,
    dst_rect: PixelRect,
    filter: Filter,
) -> Result<()> {
    let src_pixels: &[[u8; 4]] = bytemuck::try_cast_slice(&src_bytes[..src_desc.byte_size()])
        .map_err(|e| ReelError::backend(format!("unaligned image memory: {}", e)))?;
    let dst_pixels: &mut [[u8; 4]] =
        bytemuck::try_cast_slice_mut(&mut dst_bytes[..dst_desc.byte_size()])
            .map_err(|e| ReelError::backend(format!("unaligned image memory: {}", e)))?;

    let src_stride = src_desc.extent.width as usize;
    let dst_stride = dst_desc.extent.width as usize;
    let sample = |x: usize, y: usize| src_desc.format.to_rgba(src_pixels[y * src_stride + x]);

    let scale_x = src_rect.width as f32 / dst_rect.width as f32;
    let scale_y = src_rect.height as f32 / dst_rect.height as f32;
    let max_x = (src_rect.right() - 1) as f32;
    let max_y = (src_rect.bottom() - 1) as f32;

    for dy in 0..dst_rect.height {
        let v = src_rect.y as f32 + (dy as f32 + 0.5) * scale_y;
        let row = (dst_rect.y + dy) as usize * dst_stride;
        for dx in 0..dst_rect.width {
            let u = src_rect.x as f32 + (dx as f32 + 0.5) * scale_x;
            let rgba = match filter {
                Filter::Nearest => {
                    let sx = u.floor().clamp(src_rect.x as f32, max_x) as usize;
                    let sy = v.floor().clamp(src_rect.y as f32, max_y) as usize;
                    sample(sx, sy)
                }
                Filter::Linear => {
                    let fx = (u - 0.5).clamp(src_rect.x as f32, max_x);
                    let fy = (v - 0.5).clamp(src_rect.y as f32, max_y);
                    let (x0, y0) = (fx.floor() as usize, fy.floor() as usize);
                    let x1 = (x0 + 1).min(max_x as usize);
                    let y1 = (y0 + 1).min(max_y as usize);
                    let (tx, ty) = (fx - x0 as f32, fy - y0 as f32);
                    bilinear(
                        [sample(x0, y0), sample(x1, y0), sample(x0, y1), sample(x1, y1)],
                        tx,
                        ty,
                    )
                }
            };
            dst_pixels[row + (dst_rect.x + dx) as usize] = dst_desc.format.from_rgba(rgba);
        }
    }
    Ok(())
}

/// Weighted mix of four texels: top-left, top-right, bottom-left, bottom-right
fn bilinear(texels: [[u8; 4]; 4], tx: f32, ty: f32) -> [u8; 4] {
    let mut out = [0u8; 4];
    for (c, channel) in out.iter_mut().enumerate() {
        let top = texels[0][c] as f32 * (1.0 - tx) + texels[1][c] as f32 * tx;
        let bottom = texels[2][c] as f32 * (1.0 - tx) + texels[3][c] as f32 * tx;
        *channel = (top * (1.0 - ty) + bottom * ty).round().clamp(0.0, 255.0) as u8;
    }
    out
}

impl GpuBackend for SoftwareBackend {
    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            name: "software".to_string(),
            linear_blit: self.linear_blit,
            scaled_blit: true,
            max_image_dimension: MAX_IMAGE_DIMENSION,
        }
    }

    fn allocate_memory(&mut self, size: usize) -> Result<MemoryId> {
        if size == 0 || size % 4 != 0 {
            return Err(ReelError::backend(format!(
                "memory size {} must be a non-zero multiple of 4",
                size
            )));
        }
        let id = MemoryId(self.next_id());
        self.memories.insert(id, vec![0; size]);
        debug!("Allocated {} bytes as {:?}", size, id);
        Ok(id)
    }

    fn free_memory(&mut self, memory: MemoryId) {
        if self.images.values().any(|image| image.memory == memory) {
            debug!("Freeing {:?} while images are still bound to it", memory);
        }
        self.memories.remove(&memory);
    }

    fn create_image(&mut self, desc: &ImageDesc, memory: MemoryId) -> Result<ImageId> {
        if desc.extent.is_empty()
            || desc.extent.width > MAX_IMAGE_DIMENSION
            || desc.extent.height > MAX_IMAGE_DIMENSION
        {
            return Err(ReelError::InvalidDimensions {
                width: desc.extent.width,
                height: desc.extent.height,
            });
        }
        let available = self
            .memories
            .get(&memory)
            .map(Vec::len)
            .ok_or_else(|| ReelError::backend(format!("unknown memory {:?}", memory)))?;
        if available < desc.byte_size() {
            return Err(ReelError::backend(format!(
                "image needs {} bytes but {:?} holds {}",
                desc.byte_size(),
                memory,
                available
            )));
        }

        let id = ImageId(self.next_id());
        self.images.insert(
            id,
            SoftImage {
                desc: *desc,
                memory,
                layout: ImageLayout::Undefined,
            },
        );
        Ok(id)
    }

    fn destroy_image(&mut self, image: ImageId) {
        self.images.remove(&image);
        self.bindings.retain(|_, bound| *bound != image);
    }

    fn map_memory(&self, memory: MemoryId) -> Result<&[u8]> {
        self.memories
            .get(&memory)
            .map(Vec::as_slice)
            .ok_or_else(|| ReelError::backend(format!("cannot map unknown memory {:?}", memory)))
    }

    fn map_memory_mut(&mut self, memory: MemoryId) -> Result<&mut [u8]> {
        self.memories
            .get_mut(&memory)
            .map(Vec::as_mut_slice)
            .ok_or_else(|| ReelError::backend(format!("cannot map unknown memory {:?}", memory)))
    }

    fn submit(&mut self, commands: CommandBuffer) -> Result<Fence> {
        for command in commands.commands() {
            self.execute(command)?;
        }
        self.last_fence += 1;
        Ok(Fence(self.last_fence))
    }

    fn wait_for_fence(&mut self, fence: Fence, _timeout: Option<Duration>) -> Result<()> {
        if fence.0 == 0 || fence.0 > self.last_fence {
            return Err(ReelError::backend(format!("wait on unknown fence {:?}", fence)));
        }
        Ok(())
    }

    fn rebind_sampled_image(&mut self, binding: SampledBinding, image: ImageId) -> Result<()> {
        self.image(image)?;
        self.bindings.insert(binding, image);
        Ok(())
    }
}
