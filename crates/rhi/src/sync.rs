//! Synchronization primitives.
//!
//! The renderer orders GPU work with binary semaphores only. Host-side
//! waits go through [`crate::backend::GpuBackend::queue_wait_idle`]; there
//! are no fences.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::backend::GpuBackend;
use crate::error::RhiResult;

/// Binary semaphore wrapper.
///
/// Used for GPU-to-GPU ordering between queue operations, for example
/// acquire → submit and submit → present.
pub struct Semaphore<B: GpuBackend> {
    /// Backend the semaphore was created through.
    backend: Arc<B>,
    /// Vulkan semaphore handle.
    semaphore: vk::Semaphore,
}

impl<B: GpuBackend> Semaphore<B> {
    /// Creates a new semaphore in the unsignaled state.
    ///
    /// # Errors
    ///
    /// Returns an error if semaphore creation fails.
    pub fn new(backend: Arc<B>) -> RhiResult<Self> {
        let semaphore = backend.create_semaphore()?;
        debug!("Semaphore created");
        Ok(Self { backend, semaphore })
    }

    /// Returns the Vulkan semaphore handle.
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl<B: GpuBackend> Drop for Semaphore<B> {
    fn drop(&mut self) {
        self.backend.destroy_semaphore(self.semaphore);
        debug!("Semaphore destroyed");
    }
}
