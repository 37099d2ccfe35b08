//! Render pass, framebuffers and depth format selection.
//!
//! The renderer draws through a single classic render pass:
//! - attachment 0: color, the swapchain format, cleared and stored, ending in PRESENT_SRC
//! - attachment 1: depth, cleared and discarded
//!
//! One [`Framebuffer`] is created per swapchain image view, each paired with
//! the shared depth view.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::backend::GpuBackend;
use crate::error::{RhiError, RhiResult};

/// Depth formats tried in order of preference.
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// Returns the first candidate supporting depth attachments under optimal tiling.
///
/// # Errors
///
/// Returns [`RhiError::NoSupportedFormat`] if no candidate qualifies.
pub fn find_depth_format<B: GpuBackend>(
    backend: &B,
    candidates: &[vk::Format],
) -> RhiResult<vk::Format> {
    candidates
        .iter()
        .copied()
        .find(|&format| {
            backend
                .format_properties(format)
                .optimal_tiling_features
                .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        })
        .inspect(|format| debug!("Selected depth format {:?}", format))
        .ok_or_else(|| {
            RhiError::NoSupportedFormat(format!("no depth format among {:?}", candidates))
        })
}

/// Color + depth render pass wrapper.
pub struct RenderPass<B: GpuBackend> {
    backend: Arc<B>,
    render_pass: vk::RenderPass,
}

impl<B: GpuBackend> RenderPass<B> {
    /// Creates the render pass for a color format and a depth format.
    ///
    /// # Errors
    ///
    /// Returns an error if render pass creation fails.
    pub fn new(backend: Arc<B>, color_format: vk::Format, depth_format: vk::Format) -> RhiResult<Self> {
        let attachments = [
            vk::AttachmentDescription::default()
                .format(color_format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::PRESENT_SRC_KHR),
            vk::AttachmentDescription::default()
                .format(depth_format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::DONT_CARE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
        ];

        let color_refs = [vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }];
        let depth_ref = vk::AttachmentReference {
            attachment: 1,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };

        let subpasses = [vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)
            .depth_stencil_attachment(&depth_ref)];

        let stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
            | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;
        let dependencies = [vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(stages)
            .dst_stage_mask(stages)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_access_mask(
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                    | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            )];

        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        let render_pass = backend.create_render_pass(&create_info)?;

        info!(
            "Render pass created (color {:?}, depth {:?})",
            color_format, depth_format
        );

        Ok(Self {
            backend,
            render_pass,
        })
    }

    /// Returns the Vulkan render pass handle.
    #[inline]
    pub fn handle(&self) -> vk::RenderPass {
        self.render_pass
    }
}

impl<B: GpuBackend> Drop for RenderPass<B> {
    fn drop(&mut self) {
        self.backend.destroy_render_pass(self.render_pass);
        debug!("Render pass destroyed");
    }
}

/// Framebuffer binding one color view and the depth view.
pub struct Framebuffer<B: GpuBackend> {
    backend: Arc<B>,
    framebuffer: vk::Framebuffer,
}

impl<B: GpuBackend> Framebuffer<B> {
    /// Creates a framebuffer for `render_pass` at `extent`.
    ///
    /// # Errors
    ///
    /// Returns an error if framebuffer creation fails.
    pub fn new(
        backend: Arc<B>,
        render_pass: &RenderPass<B>,
        color_view: vk::ImageView,
        depth_view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> RhiResult<Self> {
        let attachments = [color_view, depth_view];
        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass.handle())
            .attachments(&attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = backend.create_framebuffer(&create_info)?;
        Ok(Self {
            backend,
            framebuffer,
        })
    }

    /// Creates one framebuffer per color view.
    ///
    /// # Errors
    ///
    /// Returns an error if any framebuffer cannot be created; the ones
    /// already created are destroyed.
    pub fn for_views(
        backend: &Arc<B>,
        render_pass: &RenderPass<B>,
        color_views: &[vk::ImageView],
        depth_view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> RhiResult<Vec<Self>> {
        let framebuffers = color_views
            .iter()
            .map(|&view| Self::new(backend.clone(), render_pass, view, depth_view, extent))
            .collect::<RhiResult<Vec<_>>>()?;

        debug!("Created {} framebuffers", framebuffers.len());
        Ok(framebuffers)
    }

    /// Returns the Vulkan framebuffer handle.
    #[inline]
    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }
}

impl<B: GpuBackend> Drop for Framebuffer<B> {
    fn drop(&mut self) {
        self.backend.destroy_framebuffer(self.framebuffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Call, MockConfig, RecordingBackend};

    fn backend_with_depth(formats: Vec<vk::Format>) -> RecordingBackend {
        RecordingBackend::with_config(MockConfig {
            depth_formats: formats,
            ..Default::default()
        })
    }

    #[test]
    fn test_find_depth_format_prefers_first_candidate() {
        let backend = backend_with_depth(vec![
            vk::Format::D24_UNORM_S8_UINT,
            vk::Format::D32_SFLOAT,
        ]);
        assert_eq!(
            find_depth_format(&backend, &DEPTH_FORMAT_CANDIDATES).unwrap(),
            vk::Format::D32_SFLOAT
        );
    }

    #[test]
    fn test_find_depth_format_falls_through() {
        let backend = backend_with_depth(vec![vk::Format::D24_UNORM_S8_UINT]);
        assert_eq!(
            find_depth_format(&backend, &DEPTH_FORMAT_CANDIDATES).unwrap(),
            vk::Format::D24_UNORM_S8_UINT
        );
    }

    #[test]
    fn test_find_depth_format_none() {
        let backend = backend_with_depth(vec![]);
        assert!(matches!(
            find_depth_format(&backend, &DEPTH_FORMAT_CANDIDATES),
            Err(RhiError::NoSupportedFormat(_))
        ));
    }

    #[test]
    fn test_render_pass_has_color_and_depth() {
        let backend = Arc::new(RecordingBackend::new());
        let _render_pass = RenderPass::new(
            backend.clone(),
            vk::Format::B8G8R8A8_SRGB,
            vk::Format::D32_SFLOAT,
        )
        .unwrap();

        assert_eq!(
            backend.calls(),
            vec![Call::CreateRenderPass {
                attachments: vec![vk::Format::B8G8R8A8_SRGB, vk::Format::D32_SFLOAT],
                dependencies: 1,
            }]
        );
    }

    #[test]
    fn test_framebuffer_per_view() {
        let backend = Arc::new(RecordingBackend::new());
        let render_pass = RenderPass::new(
            backend.clone(),
            vk::Format::B8G8R8A8_SRGB,
            vk::Format::D32_SFLOAT,
        )
        .unwrap();
        let views = [vk::ImageView::null(); 3];
        let framebuffers = Framebuffer::for_views(
            &backend,
            &render_pass,
            &views,
            vk::ImageView::null(),
            vk::Extent2D {
                width: 800,
                height: 600,
            },
        )
        .unwrap();

        assert_eq!(framebuffers.len(), 3);
        drop(framebuffers);
        assert_eq!(
            backend.count(|c| *c == Call::Other("destroy_framebuffer")),
            3
        );
    }
}
