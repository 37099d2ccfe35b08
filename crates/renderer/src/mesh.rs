//! Vertex and index buffers for one indexed mesh.

use ash::vk;
use tracing::debug;

use minirender_rhi::backend::GpuBackend;
use minirender_rhi::buffer::{Buffer, BufferUsage};
use minirender_rhi::command::CommandPool;
use minirender_rhi::memory::HOST_VISIBLE_COHERENT;
use minirender_rhi::transfer::upload_via_staging;
use minirender_rhi::vertex::Vertex;
use minirender_rhi::{RhiError, RhiResult};

/// How mesh data reaches its buffers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadMode {
    /// Device-local buffers filled through a staging copy.
    Staging,
    /// Host-visible buffers written in place.
    Direct,
}

impl UploadMode {
    /// Maps the `use_staging` setting to a mode.
    pub fn from_use_staging(use_staging: bool) -> Self {
        if use_staging {
            UploadMode::Staging
        } else {
            UploadMode::Direct
        }
    }
}

/// GPU-resident vertex and `u32` index buffers.
pub struct Mesh<B: GpuBackend> {
    vertex_buffer: Buffer<B>,
    index_buffer: Buffer<B>,
    index_count: u32,
}

impl<B: GpuBackend> Mesh<B> {
    /// Creates both buffers and fills them according to `mode`.
    ///
    /// # Errors
    ///
    /// Returns an error if either slice is empty, or if buffer creation or
    /// the upload fails.
    pub fn new(
        pool: &CommandPool<B>,
        vertices: &[Vertex],
        indices: &[u32],
        mode: UploadMode,
    ) -> RhiResult<Self> {
        if vertices.is_empty() || indices.is_empty() {
            return Err(RhiError::Resource(
                "Mesh needs at least one vertex and one index".to_string(),
            ));
        }

        let vertex_buffer = upload(
            pool,
            BufferUsage::Vertex,
            bytemuck::cast_slice(vertices),
            mode,
        )?;
        let index_buffer = upload(pool, BufferUsage::Index, bytemuck::cast_slice(indices), mode)?;

        debug!(
            "Mesh uploaded ({:?}): {} vertices, {} indices",
            mode,
            vertices.len(),
            indices.len()
        );

        Ok(Self {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
        })
    }

    /// Returns the vertex buffer handle.
    #[inline]
    pub fn vertex_buffer(&self) -> vk::Buffer {
        self.vertex_buffer.handle()
    }

    /// Returns the index buffer handle.
    #[inline]
    pub fn index_buffer(&self) -> vk::Buffer {
        self.index_buffer.handle()
    }

    /// Number of indices drawn per frame.
    #[inline]
    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}

fn upload<B: GpuBackend>(
    pool: &CommandPool<B>,
    usage: BufferUsage,
    data: &[u8],
    mode: UploadMode,
) -> RhiResult<Buffer<B>> {
    let size = data.len() as vk::DeviceSize;
    match mode {
        UploadMode::Staging => {
            let buffer = Buffer::new(
                pool.backend().clone(),
                usage,
                size,
                vk::MemoryPropertyFlags::DEVICE_LOCAL,
            )?;
            upload_via_staging(pool, data, &buffer)?;
            Ok(buffer)
        }
        UploadMode::Direct => {
            let buffer = Buffer::new(pool.backend().clone(), usage, size, HOST_VISIBLE_COHERENT)?;
            buffer.write(0, data)?;
            Ok(buffer)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use glam::{Vec2, Vec3};
    use minirender_rhi::mock::{Call, RecordingBackend};

    fn quad() -> (Vec<Vertex>, Vec<u32>) {
        let vertices = vec![
            Vertex::new(Vec3::new(-0.5, -0.5, 0.0), Vec3::ONE, Vec2::new(0.0, 0.0)),
            Vertex::new(Vec3::new(0.5, -0.5, 0.0), Vec3::ONE, Vec2::new(1.0, 0.0)),
            Vertex::new(Vec3::new(0.5, 0.5, 0.0), Vec3::ONE, Vec2::new(1.0, 1.0)),
            Vertex::new(Vec3::new(-0.5, 0.5, 0.0), Vec3::ONE, Vec2::new(0.0, 1.0)),
        ];
        (vertices, vec![0, 1, 2, 2, 3, 0])
    }

    #[test]
    fn test_upload_mode_from_flag() {
        assert_eq!(UploadMode::from_use_staging(true), UploadMode::Staging);
        assert_eq!(UploadMode::from_use_staging(false), UploadMode::Direct);
    }

    #[test]
    fn test_mesh_staging_copies_into_device_local() {
        let backend = Arc::new(RecordingBackend::new());
        let pool = CommandPool::new(backend.clone()).unwrap();
        backend.clear();

        let (vertices, indices) = quad();
        let mesh = Mesh::new(&pool, &vertices, &indices, UploadMode::Staging).unwrap();
        assert_eq!(mesh.index_count(), 6);

        let copies: Vec<(vk::Buffer, vk::DeviceSize)> = backend
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::CopyBuffer { dst, size, .. } => Some((dst, size)),
                _ => None,
            })
            .collect();
        assert_eq!(
            copies,
            vec![
                (mesh.vertex_buffer(), (4 * Vertex::size()) as vk::DeviceSize),
                (mesh.index_buffer(), 24),
            ]
        );
        // Device-local memory is type 0 in the mock.
        assert_eq!(
            backend.count(|c| matches!(
                c,
                Call::AllocateMemory {
                    memory_type_index: 0,
                    ..
                }
            )),
            2
        );
    }

    #[test]
    fn test_mesh_direct_writes_without_copy() {
        let backend = Arc::new(RecordingBackend::new());
        let pool = CommandPool::new(backend.clone()).unwrap();
        backend.clear();

        let (vertices, indices) = quad();
        Mesh::new(&pool, &vertices, &indices, UploadMode::Direct).unwrap();

        assert_eq!(backend.count(|c| matches!(c, Call::CopyBuffer { .. })), 0);
        assert_eq!(backend.count(|c| matches!(c, Call::WriteMemory { .. })), 2);
        assert_eq!(backend.count(|c| matches!(c, Call::QueueSubmit { .. })), 0);
    }

    #[test]
    fn test_mesh_rejects_empty_indices() {
        let backend = Arc::new(RecordingBackend::new());
        let pool = CommandPool::new(backend.clone()).unwrap();

        let (vertices, _) = quad();
        let result = Mesh::new(&pool, &vertices, &[], UploadMode::Staging);
        assert!(matches!(result, Err(RhiError::Resource(_))));
    }
}
