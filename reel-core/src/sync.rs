//! Frame fences
//!
//! The compositor keeps the fence of the last submitted frame. Anything that
//! is about to destroy or re-record a resource the GPU may still be reading
//! waits on it first.

use std::time::Duration;

use tracing::trace;

use crate::error::Result;
use crate::gpu::{CommandBuffer, Fence, GpuBackend};

/// Tracks the most recent submission
#[derive(Debug)]
pub struct FrameSync {
    in_flight: Option<Fence>,
    timeout: Option<Duration>,
    frames_submitted: u64,
}

impl FrameSync {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            in_flight: None,
            timeout,
            frames_submitted: 0,
        }
    }

    /// Remember a new submission; returns its frame index (1-based)
    pub fn submitted(&mut self, fence: Fence) -> u64 {
        self.in_flight = Some(fence);
        self.frames_submitted += 1;
        self.frames_submitted
    }

    /// Fence of a submission that has not been waited on yet
    pub fn in_flight(&self) -> Option<Fence> {
        self.in_flight
    }

    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }

    /// Submit setup work outside the frame sequence and wait for it
    pub fn submit_blocking<B: GpuBackend + ?Sized>(
        &self,
        backend: &mut B,
        commands: CommandBuffer,
    ) -> Result<()> {
        let fence = backend.submit(commands)?;
        backend.wait_for_fence(fence, self.timeout)
    }

    /// Block until the last submitted frame has retired
    ///
    /// A no-op when nothing is in flight. A timeout is returned as
    /// [`crate::ReelError::FenceTimeout`] by the backend and must be treated as fatal.
    pub fn wait_idle<B: GpuBackend + ?Sized>(&mut self, backend: &mut B) -> Result<()> {
        if let Some(fence) = self.in_flight {
            trace!("Waiting on {:?} (frame {})", fence, self.frames_submitted);
            backend.wait_for_fence(fence, self.timeout)?;
            self.in_flight = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::SoftwareBackend;

    #[test]
    fn test_wait_idle_clears_in_flight() {
        let mut backend = SoftwareBackend::new();
        let mut sync = FrameSync::new(None);
        sync.wait_idle(&mut backend).unwrap();

        let fence = backend.submit(CommandBuffer::new()).unwrap();
        assert_eq!(sync.submitted(fence), 1);
        assert_eq!(sync.in_flight(), Some(fence));

        sync.wait_idle(&mut backend).unwrap();
        assert_eq!(sync.in_flight(), None);
        assert_eq!(sync.frames_submitted(), 1);
    }

    #[test]
    fn test_wait_error_keeps_fence() {
        let mut backend = SoftwareBackend::new();
        let mut sync = FrameSync::new(Some(Duration::from_millis(5)));
        sync.submitted(Fence(42));
        assert!(sync.wait_idle(&mut backend).is_err());
        assert_eq!(sync.in_flight(), Some(Fence(42)));
    }

    #[test]
    fn test_submit_blocking_does_not_count_as_frame() {
        let mut backend = SoftwareBackend::new();
        let sync = FrameSync::new(None);
        sync.submit_blocking(&mut backend, CommandBuffer::new()).unwrap();
        assert_eq!(sync.frames_submitted(), 0);
        assert_eq!(backend.submissions(), 1);
    }
}
