//! Depth buffer management.
//!
//! This module handles depth buffer creation for depth testing. It picks a
//! depth format the adapter supports, creates a device-local image with an
//! associated view, and moves it into the attachment layout once.
//!
//! # Overview
//!
//! - [`DepthBuffer`] wraps an [`Image`] and [`ImageView`] used as attachment 1
//! - The format is the first supported entry of [`DEPTH_FORMAT_CANDIDATES`]
//! - The UNDEFINED → DEPTH_STENCIL_ATTACHMENT_OPTIMAL transition runs in a
//!   one-shot command buffer

use std::sync::Arc;

use ash::vk;
use tracing::info;

use minirender_rhi::RhiResult;
use minirender_rhi::backend::GpuBackend;
use minirender_rhi::command::CommandPool;
use minirender_rhi::image::{Image, ImageDesc, ImageView};
use minirender_rhi::render_pass::{DEPTH_FORMAT_CANDIDATES, find_depth_format};

/// Depth attachment shared by every framebuffer.
///
/// # Resource Destruction
///
/// The view is destroyed before the image; the image then frees its memory.
pub struct DepthBuffer<B: GpuBackend> {
    /// View over the whole image; dropped first.
    view: ImageView<B>,
    image: Image<B>,
}

impl<B: GpuBackend> DepthBuffer<B> {
    /// Creates a depth buffer of `extent` and transitions it for use as an
    /// attachment.
    ///
    /// # Errors
    ///
    /// Returns [`minirender_rhi::RhiError::NoSupportedFormat`] if no depth
    /// format qualifies, or an error from image creation, view creation or
    /// the transition submission.
    pub fn new(pool: &CommandPool<B>, extent: vk::Extent2D) -> RhiResult<Self> {
        let backend = pool.backend().clone();
        let format = find_depth_format(backend.as_ref(), &DEPTH_FORMAT_CANDIDATES)?;

        let mut image = Image::new(
            Arc::clone(&backend),
            &ImageDesc {
                name: "depth_buffer",
                width: extent.width,
                height: extent.height,
                format,
                tiling: vk::ImageTiling::OPTIMAL,
                usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
                properties: vk::MemoryPropertyFlags::DEVICE_LOCAL,
                initial_layout: vk::ImageLayout::UNDEFINED,
            },
        )?;
        let view = image.create_view()?;

        pool.one_shot(|cmd| {
            image.transition(cmd, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
        })?;

        info!(
            "Depth buffer created: {}x{}, format {:?}",
            extent.width, extent.height, format
        );

        Ok(Self { view, image })
    }

    /// Returns the view bound as the depth attachment.
    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view.handle()
    }

    /// Returns the chosen depth format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.image.format()
    }

    /// Returns the depth buffer dimensions.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.image.extent()
    }

    /// Returns the layout after setup.
    #[inline]
    pub fn layout(&self) -> vk::ImageLayout {
        self.image.layout()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minirender_rhi::mock::{Call, MockConfig, RecordingBackend};

    fn extent() -> vk::Extent2D {
        vk::Extent2D {
            width: 800,
            height: 600,
        }
    }

    #[test]
    fn test_depth_buffer_transitions_in_one_shot() {
        let backend = Arc::new(RecordingBackend::new());
        let pool = CommandPool::new(backend.clone()).unwrap();
        backend.clear();

        let depth = DepthBuffer::new(&pool, extent()).unwrap();
        assert_eq!(depth.format(), vk::Format::D32_SFLOAT);
        assert_eq!(depth.layout(), vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

        let calls = backend.calls();
        let barrier = calls
            .iter()
            .position(|c| {
                matches!(
                    c,
                    Call::ImageBarrier {
                        old_layout: vk::ImageLayout::UNDEFINED,
                        new_layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
                        ..
                    }
                )
            })
            .unwrap();
        let begin = calls
            .iter()
            .position(|c| matches!(c, Call::BeginCommandBuffer(_)))
            .unwrap();
        let idle = calls
            .iter()
            .position(|c| matches!(c, Call::QueueWaitIdle))
            .unwrap();
        assert!(begin < barrier && barrier < idle);
    }

    #[test]
    fn test_depth_buffer_uses_next_candidate() {
        let backend = Arc::new(RecordingBackend::with_config(MockConfig {
            depth_formats: vec![vk::Format::D24_UNORM_S8_UINT],
            ..MockConfig::default()
        }));
        let pool = CommandPool::new(backend.clone()).unwrap();

        let depth = DepthBuffer::new(&pool, extent()).unwrap();
        assert_eq!(depth.format(), vk::Format::D24_UNORM_S8_UINT);
    }

    #[test]
    fn test_depth_buffer_without_format_fails() {
        let backend = Arc::new(RecordingBackend::with_config(MockConfig {
            depth_formats: Vec::new(),
            ..MockConfig::default()
        }));
        let pool = CommandPool::new(backend.clone()).unwrap();
        backend.clear();

        assert!(DepthBuffer::new(&pool, extent()).is_err());
        assert_eq!(backend.count(|c| matches!(c, Call::CreateImage { .. })), 0);
    }

    #[test]
    fn test_depth_buffer_drop_order() {
        let backend = Arc::new(RecordingBackend::new());
        let pool = CommandPool::new(backend.clone()).unwrap();
        let depth = DepthBuffer::new(&pool, extent()).unwrap();
        backend.clear();

        drop(depth);

        let calls = backend.calls();
        assert!(matches!(calls[0], Call::DestroyImageView(_)));
        assert!(matches!(calls[1], Call::DestroyImage(_)));
        assert!(matches!(calls[2], Call::FreeMemory { .. }));
    }
}
