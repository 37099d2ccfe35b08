//! GPU buffer management.
//!
//! This module handles vertex, index, uniform, and staging buffers.
//!
//! # Overview
//!
//! - [`BufferUsage`] defines how a buffer will be used (vertex, index, uniform, staging)
//! - [`Buffer`] wraps VkBuffer together with its dedicated memory
//!
//! Creation follows a fixed protocol: create the buffer object, query its
//! memory requirements, pick a memory type matching both the type filter and
//! the requested property flags, allocate, and bind at offset 0.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use minirender_rhi::backend::VulkanBackend;
//! use minirender_rhi::buffer::{Buffer, BufferUsage};
//! use minirender_rhi::memory::HOST_VISIBLE_COHERENT;
//!
//! # fn example(backend: Arc<VulkanBackend>) -> Result<(), minirender_rhi::RhiError> {
//! let vertices: [f32; 6] = [0.0, 0.5, -0.5, -0.5, 0.5, -0.5];
//! let data: &[u8] = bytemuck::cast_slice(&vertices);
//! let vertex_buffer = Buffer::new(
//!     backend,
//!     BufferUsage::Vertex,
//!     data.len() as u64,
//!     HOST_VISIBLE_COHERENT,
//! )?;
//! vertex_buffer.write(0, data)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, error};

use crate::backend::{AllocationTarget, DeviceAllocation, GpuBackend, MemoryRequest};
use crate::error::{RhiError, RhiResult};
use crate::memory::find_memory_type;

/// Buffer usage type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    /// Vertex buffer - stores vertex data
    Vertex,
    /// Index buffer - stores index data
    Index,
    /// Uniform buffer - stores shader uniform data
    Uniform,
    /// Staging buffer - host-written copy source
    Staging,
}

impl BufferUsage {
    /// Converts to Vulkan buffer usage flags.
    ///
    /// Everything except staging buffers can also be a copy destination.
    pub fn to_vk_usage(self) -> vk::BufferUsageFlags {
        match self {
            BufferUsage::Vertex => {
                vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Index => {
                vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Uniform => {
                vk::BufferUsageFlags::UNIFORM_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Staging => vk::BufferUsageFlags::TRANSFER_SRC,
        }
    }

    /// Returns a human-readable name for the buffer type.
    pub fn name(self) -> &'static str {
        match self {
            BufferUsage::Vertex => "vertex",
            BufferUsage::Index => "index",
            BufferUsage::Uniform => "uniform",
            BufferUsage::Staging => "staging",
        }
    }
}

/// GPU buffer with its own dedicated memory.
///
/// The buffer is exclusively owned; dropping it destroys the buffer object
/// and then frees the memory.
pub struct Buffer<B: GpuBackend> {
    /// Backend the buffer was created through.
    backend: Arc<B>,
    /// Vulkan buffer handle.
    buffer: vk::Buffer,
    /// Bound memory.
    allocation: Option<B::Allocation>,
    /// Requested size in bytes.
    size: vk::DeviceSize,
    /// Buffer usage type.
    usage: BufferUsage,
    /// Property flags the memory was chosen for.
    properties: vk::MemoryPropertyFlags,
}

impl<B: GpuBackend> Buffer<B> {
    /// Creates a buffer of `size` bytes backed by memory with `properties`.
    ///
    /// # Arguments
    ///
    /// * `backend` - The GPU backend
    /// * `usage` - The intended buffer usage
    /// * `size` - Buffer size in bytes
    /// * `properties` - Required memory property flags
    ///
    /// # Errors
    ///
    /// Returns an error if the size is zero, if no memory type satisfies
    /// the requirements, or if creation, allocation or binding fails.
    pub fn new(
        backend: Arc<B>,
        usage: BufferUsage,
        size: vk::DeviceSize,
        properties: vk::MemoryPropertyFlags,
    ) -> RhiResult<Self> {
        if size == 0 {
            return Err(RhiError::MemoryError(
                "Buffer size must be greater than 0".to_string(),
            ));
        }

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage.to_vk_usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = backend.create_buffer(&buffer_info)?;

        let allocation = match Self::allocate_and_bind(&backend, buffer, usage, properties) {
            Ok(allocation) => allocation,
            Err(e) => {
                backend.destroy_buffer(buffer);
                return Err(e);
            }
        };

        debug!(
            "Created {} buffer: {} bytes ({} allocated)",
            usage.name(),
            size,
            allocation.size()
        );

        Ok(Self {
            backend,
            buffer,
            allocation: Some(allocation),
            size,
            usage,
            properties,
        })
    }

    fn allocate_and_bind(
        backend: &B,
        buffer: vk::Buffer,
        usage: BufferUsage,
        properties: vk::MemoryPropertyFlags,
    ) -> RhiResult<B::Allocation> {
        let requirements = backend.buffer_memory_requirements(buffer);
        let memory_type_index = find_memory_type(
            backend.memory_properties(),
            requirements.memory_type_bits,
            properties,
        )?;

        let allocation = backend.allocate_memory(&MemoryRequest {
            name: usage.name(),
            requirements,
            memory_type_index,
            properties,
            linear: true,
            target: AllocationTarget::Buffer(buffer),
        })?;

        if let Err(e) = backend.bind_buffer_memory(buffer, &allocation) {
            if let Err(free_err) = backend.free_memory(allocation) {
                error!("Failed to free buffer allocation: {:?}", free_err);
            }
            return Err(e);
        }

        Ok(allocation)
    }

    /// Writes data into the buffer at the specified offset.
    ///
    /// The buffer must have been created with host-visible memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the write would exceed the buffer size or the
    /// memory is not host-visible.
    pub fn write(&self, offset: vk::DeviceSize, data: &[u8]) -> RhiResult<()> {
        if data.is_empty() {
            return Ok(());
        }

        let fits = offset
            .checked_add(data.len() as vk::DeviceSize)
            .is_some_and(|end| end <= self.size);
        if !fits {
            return Err(RhiError::MemoryError(format!(
                "Write exceeds buffer size: offset {} + data {} > buffer {}",
                offset,
                data.len(),
                self.size
            )));
        }

        if !self
            .properties
            .contains(vk::MemoryPropertyFlags::HOST_VISIBLE)
        {
            return Err(RhiError::MemoryError(format!(
                "{} buffer is not host-visible",
                self.usage.name()
            )));
        }

        let allocation = self.allocation()?;
        self.backend.write_memory(allocation, offset, data)
    }

    /// Returns the bound allocation.
    ///
    /// # Errors
    ///
    /// Returns an error only while the buffer is being dropped.
    pub fn allocation(&self) -> RhiResult<&B::Allocation> {
        self.allocation
            .as_ref()
            .ok_or_else(|| RhiError::MemoryError("Buffer allocation is not available".to_string()))
    }

    /// Returns the Vulkan buffer handle.
    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Returns the buffer size in bytes.
    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Returns the buffer usage type.
    #[inline]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// Returns the property flags of the backing memory.
    #[inline]
    pub fn memory_properties(&self) -> vk::MemoryPropertyFlags {
        self.properties
    }
}

impl<B: GpuBackend> Drop for Buffer<B> {
    fn drop(&mut self) {
        // Destroy buffer first, then free the memory it was bound to
        self.backend.destroy_buffer(self.buffer);

        if let Some(allocation) = self.allocation.take()
            && let Err(e) = self.backend.free_memory(allocation)
        {
            error!("Failed to free buffer allocation: {:?}", e);
        }

        debug!("Destroyed {} buffer", self.usage.name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::HOST_VISIBLE_COHERENT;
    use crate::mock::{Call, MOCK_ALIGNMENT, RecordingBackend};

    #[test]
    fn test_buffer_usage_to_vk_usage() {
        assert!(
            BufferUsage::Vertex
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::VERTEX_BUFFER)
        );
        assert!(
            BufferUsage::Index
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::INDEX_BUFFER)
        );
        assert!(
            BufferUsage::Uniform
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::UNIFORM_BUFFER | vk::BufferUsageFlags::TRANSFER_DST)
        );
        assert_eq!(
            BufferUsage::Staging.to_vk_usage(),
            vk::BufferUsageFlags::TRANSFER_SRC
        );
    }

    #[test]
    fn test_buffer_usage_name() {
        assert_eq!(BufferUsage::Vertex.name(), "vertex");
        assert_eq!(BufferUsage::Index.name(), "index");
        assert_eq!(BufferUsage::Uniform.name(), "uniform");
        assert_eq!(BufferUsage::Staging.name(), "staging");
    }

    #[test]
    fn test_buffer_bound_at_offset_zero_with_enough_memory() {
        let backend = Arc::new(RecordingBackend::new());
        let cases = [
            (1, BufferUsage::Uniform, HOST_VISIBLE_COHERENT),
            (192, BufferUsage::Uniform, vk::MemoryPropertyFlags::DEVICE_LOCAL),
            (MOCK_ALIGNMENT, BufferUsage::Staging, HOST_VISIBLE_COHERENT),
            (MOCK_ALIGNMENT + 1, BufferUsage::Vertex, vk::MemoryPropertyFlags::DEVICE_LOCAL),
            (1 << 20, BufferUsage::Index, HOST_VISIBLE_COHERENT),
        ];

        for (size, usage, properties) in cases {
            backend.clear();
            let buffer = Buffer::new(backend.clone(), usage, size, properties).unwrap();
            let allocation = buffer.allocation().unwrap();

            assert_eq!(allocation.offset(), 0);
            assert!(allocation.size() >= size);

            let calls = backend.calls();
            assert!(calls.contains(&Call::BindBufferMemory {
                buffer: buffer.handle(),
                allocation: allocation.id(),
                offset: 0,
            }));
        }
    }

    #[test]
    fn test_buffer_picks_memory_type_for_properties() {
        let backend = Arc::new(RecordingBackend::new());
        let _local = Buffer::new(
            backend.clone(),
            BufferUsage::Vertex,
            64,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )
        .unwrap();
        let _host = Buffer::new(backend.clone(), BufferUsage::Staging, 64, HOST_VISIBLE_COHERENT)
            .unwrap();

        let types: Vec<u32> = backend
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::AllocateMemory {
                    memory_type_index, ..
                } => Some(memory_type_index),
                _ => None,
            })
            .collect();
        assert_eq!(types, vec![0, 1]);
    }

    #[test]
    fn test_buffer_unsatisfiable_properties_fail_and_clean_up() {
        let backend = Arc::new(RecordingBackend::new());
        let result = Buffer::new(
            backend.clone(),
            BufferUsage::Uniform,
            64,
            vk::MemoryPropertyFlags::HOST_CACHED,
        );

        assert!(matches!(
            result,
            Err(RhiError::NoSuitableMemoryType { .. })
        ));
        assert_eq!(
            backend.count(|c| matches!(c, Call::CreateBuffer { .. })),
            backend.count(|c| matches!(c, Call::DestroyBuffer(_)))
        );
    }

    #[test]
    fn test_buffer_rejects_zero_size() {
        let backend = Arc::new(RecordingBackend::new());
        assert!(Buffer::new(backend, BufferUsage::Vertex, 0, HOST_VISIBLE_COHERENT).is_err());
    }

    #[test]
    fn test_buffer_write_bounds_and_visibility() {
        let backend = Arc::new(RecordingBackend::new());
        let host = Buffer::new(backend.clone(), BufferUsage::Uniform, 16, HOST_VISIBLE_COHERENT)
            .unwrap();
        assert!(host.write(0, &[0u8; 16]).is_ok());
        assert!(host.write(8, &[0u8; 16]).is_err());
        assert!(matches!(
            host.write(u64::MAX, &[0u8; 1]),
            Err(RhiError::MemoryError(_))
        ));

        let local = Buffer::new(
            backend.clone(),
            BufferUsage::Uniform,
            16,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )
        .unwrap();
        assert!(local.write(0, &[0u8; 4]).is_err());
    }

    #[test]
    fn test_buffer_drop_destroys_then_frees() {
        let backend = Arc::new(RecordingBackend::new());
        let buffer =
            Buffer::new(backend.clone(), BufferUsage::Index, 32, HOST_VISIBLE_COHERENT).unwrap();
        let handle = buffer.handle();
        let id = buffer.allocation().unwrap().id();
        backend.clear();

        drop(buffer);

        assert_eq!(
            backend.calls(),
            vec![Call::DestroyBuffer(handle), Call::FreeMemory { allocation: id }]
        );
    }
}
