//! Backend-independent renderer state.
//!
//! [`FrameRenderer`] owns every GPU object between the surface and the frame
//! loop and builds them in dependency order:
//!
//! 1. presentation (swapchain and image views)
//! 2. command pool
//! 3. depth buffer
//! 4. render pass and one framebuffer per swapchain image
//! 5. mesh, uniform buffer and texture
//! 6. descriptor set layout, pipeline layout and pipeline
//! 7. descriptor pool and the single descriptor set
//! 8. frame loop with its prerecorded command buffers
//!
//! Teardown waits for the device to go idle and then releases everything in
//! the reverse order.

use std::mem::ManuallyDrop;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, error, info};

use minirender_resources::TextureData;
use minirender_rhi::backend::GpuBackend;
use minirender_rhi::buffer::{Buffer, BufferUsage};
use minirender_rhi::command::CommandPool;
use minirender_rhi::descriptor::{
    DescriptorPool, DescriptorSetLayout, model_pool_sizes, write_uniform_and_texture,
};
use minirender_rhi::pipeline::{
    CompareOp, CullMode, FrontFace, GraphicsPipelineBuilder, Pipeline, PipelineLayout,
};
use minirender_rhi::render_pass::{Framebuffer, RenderPass};
use minirender_rhi::shader::{Shader, ShaderStage};
use minirender_rhi::swapchain::Presentation;
use minirender_rhi::transfer::upload_via_staging;
use minirender_rhi::vertex::Vertex;
use minirender_rhi::RhiResult;

use crate::depth_buffer::DepthBuffer;
use crate::frame_loop::{DrawState, FrameLoop};
use crate::mesh::{Mesh, UploadMode};
use crate::texture::Texture;
use crate::ubo::UniformBufferObject;

/// CPU-side inputs for building a [`FrameRenderer`].
#[derive(Clone, Copy, Debug)]
pub struct SceneAssets<'a> {
    /// Vertex stage SPIR-V bytecode.
    pub vertex_spirv: &'a [u8],
    /// Fragment stage SPIR-V bytecode.
    pub fragment_spirv: &'a [u8],
    pub vertices: &'a [Vertex],
    pub indices: &'a [u32],
    pub texture: &'a TextureData,
    /// How vertex and index data reach the GPU.
    pub upload_mode: UploadMode,
}

/// Everything needed to draw the scene into a surface.
///
/// # Resource Destruction Order
///
/// 1. Wait for the device to go idle
/// 2. Frame semaphores and command pool
/// 3. Descriptor pool and set layout
/// 4. Pipeline and pipeline layout
/// 5. Framebuffers, then the render pass
/// 6. Texture, uniform buffer and mesh
/// 7. Depth buffer
/// 8. Presentation (views, swapchain, surface)
///
/// ManuallyDrop is used to ensure correct destruction order.
pub struct FrameRenderer<B: GpuBackend> {
    backend: Arc<B>,

    presentation: ManuallyDrop<Presentation<B>>,
    command_pool: ManuallyDrop<CommandPool<B>>,
    depth_buffer: ManuallyDrop<DepthBuffer<B>>,
    render_pass: ManuallyDrop<RenderPass<B>>,
    framebuffers: ManuallyDrop<Vec<Framebuffer<B>>>,

    mesh: ManuallyDrop<Mesh<B>>,
    uniform_buffer: ManuallyDrop<Buffer<B>>,
    texture: ManuallyDrop<Texture<B>>,

    descriptor_set_layout: ManuallyDrop<DescriptorSetLayout<B>>,
    pipeline_layout: ManuallyDrop<PipelineLayout<B>>,
    pipeline: ManuallyDrop<Pipeline<B>>,
    descriptor_pool: ManuallyDrop<DescriptorPool<B>>,

    frame_loop: ManuallyDrop<FrameLoop<B>>,
}

impl<B: GpuBackend> FrameRenderer<B> {
    /// Builds the renderer for `surface`, which it takes ownership of.
    ///
    /// # Arguments
    ///
    /// * `backend` - The GPU backend
    /// * `surface` - Surface created for the window
    /// * `width` - Window width, used when the surface has no current extent
    /// * `height` - Window height, used when the surface has no current extent
    /// * `assets` - Shaders, geometry and texture to upload
    ///
    /// # Errors
    ///
    /// Returns the first error from any creation step. Objects created
    /// before the failure are released.
    pub fn new(
        backend: Arc<B>,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
        assets: &SceneAssets<'_>,
    ) -> RhiResult<Self> {
        let presentation = Presentation::new(Arc::clone(&backend), surface, width, height)?;
        let extent = presentation.extent();

        let command_pool = CommandPool::new(Arc::clone(&backend))?;
        let depth_buffer = DepthBuffer::new(&command_pool, extent)?;

        let render_pass = RenderPass::new(
            Arc::clone(&backend),
            presentation.format(),
            depth_buffer.format(),
        )?;
        let framebuffers = Framebuffer::for_views(
            &backend,
            &render_pass,
            &presentation.image_views(),
            depth_buffer.view(),
            extent,
        )?;

        let mesh = Mesh::new(
            &command_pool,
            assets.vertices,
            assets.indices,
            assets.upload_mode,
        )?;
        let uniform_buffer = Buffer::new(
            Arc::clone(&backend),
            BufferUsage::Uniform,
            UniformBufferObject::SIZE as vk::DeviceSize,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;
        let texture = Texture::from_rgba8(
            &command_pool,
            &assets.texture.pixels,
            assets.texture.width,
            assets.texture.height,
        )?;

        let descriptor_set_layout = DescriptorSetLayout::for_model(Arc::clone(&backend))?;
        let pipeline_layout =
            PipelineLayout::new(Arc::clone(&backend), &[descriptor_set_layout.handle()])?;
        let pipeline = Self::create_model_pipeline(
            &backend,
            assets,
            &pipeline_layout,
            &render_pass,
            extent,
        )?;

        let descriptor_pool = DescriptorPool::new(Arc::clone(&backend), 1, &model_pool_sizes())?;
        let descriptor_set = descriptor_pool.allocate_one(descriptor_set_layout.handle())?;
        write_uniform_and_texture(
            backend.as_ref(),
            descriptor_set,
            uniform_buffer.handle(),
            UniformBufferObject::SIZE as vk::DeviceSize,
            texture.view(),
            texture.sampler(),
        );

        let mut frame_loop = FrameLoop::new(Arc::clone(&backend))?;
        frame_loop.record(
            &command_pool,
            &render_pass,
            &framebuffers,
            extent,
            &DrawState {
                pipeline: pipeline.handle(),
                pipeline_layout: pipeline_layout.handle(),
                descriptor_set,
                vertex_buffer: mesh.vertex_buffer(),
                index_buffer: mesh.index_buffer(),
                index_count: mesh.index_count(),
            },
        )?;

        info!(
            "Renderer ready: {}x{}, {} swapchain images, {} indices",
            extent.width,
            extent.height,
            presentation.image_count(),
            mesh.index_count()
        );

        Ok(Self {
            backend,
            presentation: ManuallyDrop::new(presentation),
            command_pool: ManuallyDrop::new(command_pool),
            depth_buffer: ManuallyDrop::new(depth_buffer),
            render_pass: ManuallyDrop::new(render_pass),
            framebuffers: ManuallyDrop::new(framebuffers),
            mesh: ManuallyDrop::new(mesh),
            uniform_buffer: ManuallyDrop::new(uniform_buffer),
            texture: ManuallyDrop::new(texture),
            descriptor_set_layout: ManuallyDrop::new(descriptor_set_layout),
            pipeline_layout: ManuallyDrop::new(pipeline_layout),
            pipeline: ManuallyDrop::new(pipeline),
            descriptor_pool: ManuallyDrop::new(descriptor_pool),
            frame_loop: ManuallyDrop::new(frame_loop),
        })
    }

    /// Creates the model pipeline. The shader modules are released once the
    /// pipeline exists.
    fn create_model_pipeline(
        backend: &Arc<B>,
        assets: &SceneAssets<'_>,
        layout: &PipelineLayout<B>,
        render_pass: &RenderPass<B>,
        extent: vk::Extent2D,
    ) -> RhiResult<Pipeline<B>> {
        let vertex_shader =
            Shader::from_spirv_bytes(Arc::clone(backend), assets.vertex_spirv, ShaderStage::Vertex)?;
        let fragment_shader = Shader::from_spirv_bytes(
            Arc::clone(backend),
            assets.fragment_spirv,
            ShaderStage::Fragment,
        )?;

        let attributes = Vertex::attribute_descriptions();
        let pipeline = GraphicsPipelineBuilder::new()
            .vertex_shader(&vertex_shader)
            .fragment_shader(&fragment_shader)
            .vertex_binding(Vertex::binding_description())
            .vertex_attributes(&attributes)
            .cull_mode(CullMode::Back)
            .front_face(FrontFace::CounterClockwise)
            .depth_test_enable(true)
            .depth_write_enable(true)
            .depth_compare_op(CompareOp::Less)
            .extent(extent)
            .build(Arc::clone(backend), layout, render_pass)?;

        info!("Model pipeline created with depth testing");
        Ok(pipeline)
    }

    /// Updates the transforms for `elapsed` seconds and renders one frame.
    ///
    /// The uniform upload goes through a staging copy and completes before
    /// the image is acquired.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload or any step of the frame fails.
    pub fn draw_frame(&mut self, elapsed: f32) -> RhiResult<u32> {
        let extent = self.presentation.extent();
        let aspect = extent.width as f32 / extent.height.max(1) as f32;
        let ubo = UniformBufferObject::for_elapsed(elapsed, aspect);
        upload_via_staging(&self.command_pool, ubo.as_bytes(), &self.uniform_buffer)?;

        self.frame_loop.tick(&mut self.presentation)
    }

    /// Returns the presentation surface.
    #[inline]
    pub fn presentation(&self) -> &Presentation<B> {
        &self.presentation
    }

    /// Returns the render pass.
    #[inline]
    pub fn render_pass(&self) -> &RenderPass<B> {
        &self.render_pass
    }

    /// Returns the frame loop.
    #[inline]
    pub fn frame_loop(&self) -> &FrameLoop<B> {
        &self.frame_loop
    }
}

impl<B: GpuBackend> Drop for FrameRenderer<B> {
    fn drop(&mut self) {
        // Wait for all GPU work to complete before destroying resources
        if let Err(e) = self.backend.device_wait_idle() {
            error!(
                "Failed to wait for device idle during renderer drop: {:?}",
                e
            );
        }

        // SAFETY: Each field is dropped exactly once, here, and never used
        // afterwards.
        unsafe {
            ManuallyDrop::drop(&mut self.frame_loop);
            ManuallyDrop::drop(&mut self.command_pool);
            ManuallyDrop::drop(&mut self.descriptor_pool);
            ManuallyDrop::drop(&mut self.descriptor_set_layout);
            ManuallyDrop::drop(&mut self.pipeline);
            ManuallyDrop::drop(&mut self.pipeline_layout);
            ManuallyDrop::drop(&mut self.framebuffers);
            ManuallyDrop::drop(&mut self.render_pass);
            ManuallyDrop::drop(&mut self.texture);
            ManuallyDrop::drop(&mut self.uniform_buffer);
            ManuallyDrop::drop(&mut self.mesh);
            ManuallyDrop::drop(&mut self.depth_buffer);
            ManuallyDrop::drop(&mut self.presentation);
        }

        debug!("Frame renderer destroyed");
    }
}
