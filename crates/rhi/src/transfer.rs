//! Staging uploads and image copies.
//!
//! Every transfer runs in a one-shot command buffer from
//! [`CommandPool::one_shot`], which waits for the queue to go idle before
//! returning. Staging buffers therefore never outlive the call that
//! created them.

use ash::vk;
use tracing::debug;

use crate::backend::GpuBackend;
use crate::buffer::{Buffer, BufferUsage};
use crate::command::CommandPool;
use crate::error::{RhiError, RhiResult};
use crate::image::Image;
use crate::memory::HOST_VISIBLE_COHERENT;

/// Copies `data` into `dst` through a temporary host-visible staging buffer.
///
/// # Errors
///
/// Returns an error if `data` is empty or larger than `dst`, or if staging
/// buffer creation, recording or submission fails.
pub fn upload_via_staging<B: GpuBackend>(
    pool: &CommandPool<B>,
    data: &[u8],
    dst: &Buffer<B>,
) -> RhiResult<()> {
    let size = data.len() as vk::DeviceSize;
    if size > dst.size() {
        return Err(RhiError::MemoryError(format!(
            "Upload of {} bytes exceeds {} byte {} buffer",
            size,
            dst.size(),
            dst.usage().name()
        )));
    }

    let staging = Buffer::new(
        pool.backend().clone(),
        BufferUsage::Staging,
        size,
        HOST_VISIBLE_COHERENT,
    )?;
    staging.write(0, data)?;

    let backend = pool.backend();
    pool.one_shot(|cmd| {
        let region = vk::BufferCopy::default().size(size);
        backend.cmd_copy_buffer(cmd, staging.handle(), dst.handle(), &[region]);
        Ok(())
    })?;

    debug!(
        "Uploaded {} bytes to {} buffer via staging",
        size,
        dst.usage().name()
    );
    Ok(())
}

/// Records a full-extent 2D color copy from `src` to `dst`.
///
/// # Errors
///
/// Returns an error unless `src` is in TRANSFER_SRC_OPTIMAL and `dst` in
/// TRANSFER_DST_OPTIMAL, or if the extents differ.
pub fn copy_image<B: GpuBackend>(
    backend: &B,
    command_buffer: vk::CommandBuffer,
    src: &Image<B>,
    dst: &Image<B>,
) -> RhiResult<()> {
    if src.layout() != vk::ImageLayout::TRANSFER_SRC_OPTIMAL
        || dst.layout() != vk::ImageLayout::TRANSFER_DST_OPTIMAL
    {
        return Err(RhiError::Resource(format!(
            "Image copy needs TRANSFER_SRC -> TRANSFER_DST, got {:?} -> {:?}",
            src.layout(),
            dst.layout()
        )));
    }
    if src.extent() != dst.extent() {
        return Err(RhiError::Resource(format!(
            "Image copy extent mismatch: {:?} vs {:?}",
            src.extent(),
            dst.extent()
        )));
    }

    let layers = vk::ImageSubresourceLayers::default()
        .aspect_mask(vk::ImageAspectFlags::COLOR)
        .mip_level(0)
        .base_array_layer(0)
        .layer_count(1);
    let extent = src.extent();
    let region = vk::ImageCopy::default()
        .src_subresource(layers)
        .dst_subresource(layers)
        .extent(vk::Extent3D {
            width: extent.width,
            height: extent.height,
            depth: 1,
        });

    backend.cmd_copy_image(command_buffer, src.handle(), dst.handle(), &[region]);
    Ok(())
}
