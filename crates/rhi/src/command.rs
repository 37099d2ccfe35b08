//! Command pool management and one-shot submission.
//!
//! # Overview
//!
//! - [`CommandPool`] owns a VkCommandPool on the single queue family
//! - [`CommandPool::one_shot`] records a throwaway command buffer, submits it,
//!   waits for the queue to go idle and frees it again
//!
//! The idle wait after every one-shot submission keeps transfers trivially
//! ordered with respect to everything that follows; no fences are tracked.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use minirender_rhi::backend::VulkanBackend;
//! use minirender_rhi::command::CommandPool;
//!
//! # fn example(backend: Arc<VulkanBackend>) -> Result<(), minirender_rhi::RhiError> {
//! let pool = CommandPool::new(backend)?;
//! pool.one_shot(|cmd| {
//!     // ... record transfer commands into `cmd` ...
//!     Ok(())
//! })?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::backend::GpuBackend;
use crate::error::{RhiError, RhiResult};

/// Vulkan command pool wrapper.
///
/// The pool allows individual command buffers to be reset, and is tied to the
/// queue family of the backend.
pub struct CommandPool<B: GpuBackend> {
    /// Backend the pool was created through.
    backend: Arc<B>,
    /// Vulkan command pool handle.
    pool: vk::CommandPool,
}

impl<B: GpuBackend> CommandPool<B> {
    /// Creates a new command pool for the backend's queue family.
    ///
    /// # Errors
    ///
    /// Returns an error if command pool creation fails.
    pub fn new(backend: Arc<B>) -> RhiResult<Self> {
        let queue_family_index = backend.queue_family_index();
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family_index)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        let pool = backend.create_command_pool(&create_info)?;

        info!(
            "Command pool created for queue family {}",
            queue_family_index
        );

        Ok(Self { backend, pool })
    }

    /// Returns the Vulkan command pool handle.
    #[inline]
    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }

    /// Returns the backend the pool belongs to.
    #[inline]
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Allocates `count` primary command buffers from this pool.
    ///
    /// # Errors
    ///
    /// Returns an error if allocation fails.
    pub fn allocate_command_buffers(&self, count: u32) -> RhiResult<Vec<vk::CommandBuffer>> {
        self.backend.allocate_command_buffers(self.pool, count)
    }

    /// Returns command buffers to the pool.
    pub fn free_command_buffers(&self, command_buffers: &[vk::CommandBuffer]) {
        if !command_buffers.is_empty() {
            self.backend.free_command_buffers(self.pool, command_buffers);
        }
    }

    /// Records, submits and retires a single-use command buffer.
    ///
    /// `record` receives the command buffer between begin and end. The
    /// submission has no semaphores; the call returns after the queue has
    /// gone idle. The command buffer is freed on every path.
    ///
    /// # Errors
    ///
    /// Returns the first error from allocation, recording, submission or the
    /// idle wait.
    pub fn one_shot<F>(&self, record: F) -> RhiResult<()>
    where
        F: FnOnce(vk::CommandBuffer) -> RhiResult<()>,
    {
        let command_buffer = self
            .allocate_command_buffers(1)?
            .into_iter()
            .next()
            .ok_or_else(|| RhiError::MemoryError("no command buffer allocated".to_string()))?;

        let result = self.record_and_submit(command_buffer, record);
        self.free_command_buffers(&[command_buffer]);
        result
    }

    fn record_and_submit<F>(&self, command_buffer: vk::CommandBuffer, record: F) -> RhiResult<()>
    where
        F: FnOnce(vk::CommandBuffer) -> RhiResult<()>,
    {
        self.backend
            .begin_command_buffer(command_buffer, vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)?;
        record(command_buffer)?;
        self.backend.end_command_buffer(command_buffer)?;

        self.backend.queue_submit(command_buffer, &[], &[])?;
        self.backend.queue_wait_idle()?;

        debug!("One-shot command buffer completed");
        Ok(())
    }
}

impl<B: GpuBackend> Drop for CommandPool<B> {
    fn drop(&mut self) {
        // Destroying the pool frees every command buffer allocated from it
        self.backend.destroy_command_pool(self.pool);
        info!("Command pool destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Call, RecordingBackend};

    #[test]
    fn test_one_shot_submits_then_waits_then_frees() {
        let backend = Arc::new(RecordingBackend::new());
        let pool = CommandPool::new(backend.clone()).unwrap();
        backend.clear();

        pool.one_shot(|_| Ok(())).unwrap();

        let calls: Vec<Call> = backend
            .calls()
            .into_iter()
            .filter(|c| !matches!(c, Call::Other(_)))
            .collect();
        assert!(matches!(calls[0], Call::BeginCommandBuffer(_)));
        assert!(matches!(calls[1], Call::EndCommandBuffer(_)));
        assert!(matches!(
            &calls[2],
            Call::QueueSubmit { waits, signals, .. } if waits.is_empty() && signals.is_empty()
        ));
        assert_eq!(calls[3], Call::QueueWaitIdle);
        assert_eq!(calls[4], Call::FreeCommandBuffers(1));
    }

    #[test]
    fn test_one_shot_frees_on_record_error() {
        let backend = Arc::new(RecordingBackend::new());
        let pool = CommandPool::new(backend.clone()).unwrap();
        backend.clear();

        let result = pool.one_shot(|_| Err(RhiError::MemoryError("boom".to_string())));

        assert!(result.is_err());
        assert_eq!(backend.count(|c| matches!(c, Call::QueueSubmit { .. })), 0);
        assert_eq!(backend.count(|c| *c == Call::FreeCommandBuffers(1)), 1);
    }
}
