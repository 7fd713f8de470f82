//! Per-in-flight-frame resource sets.
//!
//! The shell currently flushes the queue at the end of every frame, which
//! serializes CPU and GPU: while the GPU drains, the CPU idles, and the
//! single command pool is always safe to reset. The upgrade path is a
//! ring of [`FrameResources`] - each in-flight frame gets its own command
//! allocator and constant-buffer slots, and the CPU only waits when the
//! ring wraps onto a frame whose fence value has not completed yet.
//!
//! The shell does not drive this type yet; it exists so the rotation can
//! be introduced without reshaping the frame loop's resource ownership.

use std::sync::Arc;

use glint_rhi::RhiResult;
use glint_rhi::command::{CommandBuffer, CommandPool};
use glint_rhi::device::Device;

/// Resources owned by one in-flight frame.
///
/// The command pool must not be reset until the queue fence has reached
/// `fence_value` - the value signaled by the submission that last used
/// this frame's commands.
pub struct FrameResources {
    command_pool: CommandPool,
    command_buffer: CommandBuffer,
    /// Fence value signaled by this frame's last submission; zero before
    /// first use.
    pub fence_value: u64,
}

impl FrameResources {
    /// Creates a frame's command allocator and recording context.
    ///
    /// # Errors
    ///
    /// Returns an error if pool or buffer creation fails.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let family = device
            .queue_families()
            .graphics_family
            .expect("device was created with a graphics family");
        let command_pool = CommandPool::new(device.clone(), family)?;
        let command_buffer = CommandBuffer::new(device, &command_pool)?;

        Ok(Self {
            command_pool,
            command_buffer,
            fence_value: 0,
        })
    }

    /// This frame's command allocator.
    #[inline]
    pub fn command_pool(&self) -> &CommandPool {
        &self.command_pool
    }

    /// This frame's recording context.
    #[inline]
    pub fn command_buffer(&self) -> &CommandBuffer {
        &self.command_buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_resources_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<FrameResources>();
    }
}
