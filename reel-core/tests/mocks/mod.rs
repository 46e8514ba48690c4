//! Mock infrastructure for testing
//!
//! Provides a recording backend and frame generators.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reel_core::error::{ReelError, Result};
use reel_core::gpu::{
    BackendCapabilities, CommandBuffer, Fence, GpuBackend, GpuCommand, ImageDesc, ImageId,
    ImageLayout, MemoryId, SampledBinding, SoftwareBackend,
};
use reel_core::types::PixelRect;
use reel_core::{Compositor, CompositorConfig};

/// Software backend that keeps every submitted command buffer and fence wait
pub struct RecordingBackend {
    inner: SoftwareBackend,
    submitted: Vec<CommandBuffer>,
    waits: Vec<Fence>,
    stalled: Arc<AtomicBool>,
    scaled_blit: bool,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            inner: SoftwareBackend::new(),
            submitted: Vec::new(),
            waits: Vec::new(),
            stalled: Arc::new(AtomicBool::new(false)),
            scaled_blit: true,
        }
    }

    /// Backend that reports no scaled blit support
    pub fn without_scaled_blit() -> Self {
        Self {
            scaled_blit: false,
            ..Self::new()
        }
    }

    /// Switch that makes every later fence wait time out
    pub fn stall_switch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stalled)
    }

    pub fn inner(&self) -> &SoftwareBackend {
        &self.inner
    }

    pub fn submitted(&self) -> &[CommandBuffer] {
        &self.submitted
    }

    pub fn last_submission(&self) -> Option<&CommandBuffer> {
        self.submitted.last()
    }

    /// Fences waited on, in order
    pub fn waits(&self) -> &[Fence] {
        &self.waits
    }

    /// Blits of the last submission as (src, src_rect, dst, dst_rect)
    pub fn last_blits(&self) -> Vec<(ImageId, PixelRect, ImageId, PixelRect)> {
        self.last_submission()
            .map(|cmd| {
                cmd.commands()
                    .iter()
                    .filter_map(|c| match c {
                        GpuCommand::Blit {
                            src,
                            src_rect,
                            dst,
                            dst_rect,
                            ..
                        } => Some((*src, *src_rect, *dst, *dst_rect)),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Barriers into the sampling layout in the last submission
    pub fn last_sampling_barriers(&self) -> Vec<Vec<ImageId>> {
        self.last_submission()
            .map(|cmd| {
                cmd.commands()
                    .iter()
                    .filter_map(|c| match c {
                        GpuCommand::Barrier { images, to, .. }
                            if *to == ImageLayout::ShaderReadOnly =>
                        {
                            Some(images.clone())
                        }
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuBackend for RecordingBackend {
    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            name: "recording".to_string(),
            scaled_blit: self.scaled_blit,
            ..self.inner.capabilities()
        }
    }

    fn allocate_memory(&mut self, size: usize) -> Result<MemoryId> {
        self.inner.allocate_memory(size)
    }

    fn free_memory(&mut self, memory: MemoryId) {
        self.inner.free_memory(memory)
    }

    fn create_image(&mut self, desc: &ImageDesc, memory: MemoryId) -> Result<ImageId> {
        self.inner.create_image(desc, memory)
    }

    fn destroy_image(&mut self, image: ImageId) {
        self.inner.destroy_image(image)
    }

    fn map_memory(&self, memory: MemoryId) -> Result<&[u8]> {
        self.inner.map_memory(memory)
    }

    fn map_memory_mut(&mut self, memory: MemoryId) -> Result<&mut [u8]> {
        self.inner.map_memory_mut(memory)
    }

    fn submit(&mut self, commands: CommandBuffer) -> Result<Fence> {
        self.submitted.push(commands.clone());
        self.inner.submit(commands)
    }

    fn wait_for_fence(&mut self, fence: Fence, timeout: Option<Duration>) -> Result<()> {
        self.waits.push(fence);
        if self.stalled.load(Ordering::SeqCst) {
            return Err(ReelError::FenceTimeout(
                timeout.unwrap_or(Duration::from_secs(u64::MAX)),
            ));
        }
        self.inner.wait_for_fence(fence, timeout)
    }

    fn rebind_sampled_image(&mut self, binding: SampledBinding, image: ImageId) -> Result<()> {
        self.inner.rebind_sampled_image(binding, image)
    }
}

/// Small canvases so software blits stay quick
pub fn small_config() -> CompositorConfig {
    CompositorConfig::default()
        .with_canvas(64, 36)
        .with_unscaled_canvas(128, 72)
}

pub fn recording_compositor(config: CompositorConfig) -> Compositor<RecordingBackend> {
    Compositor::new(RecordingBackend::new(), config).expect("compositor")
}

pub fn software_compositor(config: CompositorConfig) -> Compositor<SoftwareBackend> {
    Compositor::new(SoftwareBackend::new(), config).expect("compositor")
}

/// Frame filled with one pixel value (already in the stream's byte order)
pub fn solid_frame(width: u32, height: u32, pixel: [u8; 4]) -> Vec<u8> {
    pixel
        .iter()
        .copied()
        .cycle()
        .take((width * height * 4) as usize)
        .collect()
}

/// Frame with a diagonal gradient, RGBA order
pub fn gradient_frame(width: u32, height: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let r = ((x as f32 / width as f32) * 255.0) as u8;
            let g = ((y as f32 / height as f32) * 255.0) as u8;
            let b = (((x + y) as f32 / (width + height) as f32) * 255.0) as u8;
            data.extend_from_slice(&[r, g, b, 255]);
        }
    }
    data
}

/// RGBA pixel of a tightly packed canvas
pub fn pixel_at(pixels: &[u8], width: u32, x: u32, y: u32) -> [u8; 4] {
    let offset = ((y * width + x) * 4) as usize;
    [
        pixels[offset],
        pixels[offset + 1],
        pixels[offset + 2],
        pixels[offset + 3],
    ]
}
