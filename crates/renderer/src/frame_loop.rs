//! Per-frame acquire → submit → present cycle.
//!
//! This module provides the [`FrameLoop`] struct, which owns the two binary
//! semaphores reused every frame and one prerecorded command buffer per
//! swapchain image.
//!
//! # Overview
//!
//! Each tick runs:
//!
//! 1. acquire the next image, signaling `image_acquired`
//! 2. submit that image's command buffer, waiting on `image_acquired` at
//!    COLOR_ATTACHMENT_OUTPUT and signaling `render_finished`
//! 3. present the image, waiting on `render_finished`
//! 4. wait for the queue to go idle
//!
//! Only one frame is ever in flight. The idle wait at the end is what makes
//! reusing the two semaphores safe without fences.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use minirender_rhi::backend::VulkanBackend;
//! use minirender_rhi::command::CommandPool;
//! use minirender_rhi::render_pass::{Framebuffer, RenderPass};
//! use minirender_rhi::swapchain::Presentation;
//! use minirender_renderer::frame_loop::{DrawState, FrameLoop};
//!
//! # fn example(
//! #     backend: Arc<VulkanBackend>,
//! #     pool: &CommandPool<VulkanBackend>,
//! #     presentation: &mut Presentation<VulkanBackend>,
//! #     render_pass: &RenderPass<VulkanBackend>,
//! #     framebuffers: &[Framebuffer<VulkanBackend>],
//! #     draw: &DrawState,
//! # ) -> Result<(), minirender_rhi::RhiError> {
//! let mut frame_loop = FrameLoop::new(backend)?;
//! frame_loop.record(pool, render_pass, framebuffers, presentation.extent(), draw)?;
//!
//! loop {
//!     frame_loop.tick(presentation)?;
//!     # break;
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use minirender_rhi::backend::GpuBackend;
use minirender_rhi::command::CommandPool;
use minirender_rhi::render_pass::{Framebuffer, RenderPass};
use minirender_rhi::swapchain::Presentation;
use minirender_rhi::sync::Semaphore;
use minirender_rhi::{RhiError, RhiResult};

/// Color the color attachment is cleared to.
pub const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Depth the depth attachment is cleared to.
pub const CLEAR_DEPTH: f32 = 1.0;

/// Handles bound by every prerecorded command buffer.
#[derive(Clone, Copy, Debug)]
pub struct DrawState {
    pub pipeline: vk::Pipeline,
    pub pipeline_layout: vk::PipelineLayout,
    pub descriptor_set: vk::DescriptorSet,
    pub vertex_buffer: vk::Buffer,
    pub index_buffer: vk::Buffer,
    pub index_count: u32,
}

/// Synchronization and command buffers for the single in-flight frame.
///
/// # Resource Destruction
///
/// The semaphores are destroyed on drop. Command buffers belong to the pool
/// passed to [`FrameLoop::record`] and are released with it.
pub struct FrameLoop<B: GpuBackend> {
    backend: Arc<B>,
    /// Signaled by acquire, waited on by submit.
    image_acquired: Semaphore<B>,
    /// Signaled by submit, waited on by present.
    render_finished: Semaphore<B>,
    /// One per swapchain image, indexed by image index.
    command_buffers: Vec<vk::CommandBuffer>,
    frame_count: u64,
}

impl<B: GpuBackend> FrameLoop<B> {
    /// Creates the two frame semaphores.
    ///
    /// # Errors
    ///
    /// Returns an error if semaphore creation fails.
    pub fn new(backend: Arc<B>) -> RhiResult<Self> {
        let image_acquired = Semaphore::new(Arc::clone(&backend))?;
        let render_finished = Semaphore::new(Arc::clone(&backend))?;

        debug!("Frame semaphores created");

        Ok(Self {
            backend,
            image_acquired,
            render_finished,
            command_buffers: Vec::new(),
            frame_count: 0,
        })
    }

    /// Records one command buffer per framebuffer.
    ///
    /// Each buffer begins the render pass with [`CLEAR_COLOR`] and
    /// [`CLEAR_DEPTH`], binds the pipeline, buffers and descriptor set,
    /// draws indexed, and ends the render pass. Buffers from an earlier
    /// recording are freed first.
    ///
    /// # Errors
    ///
    /// Returns an error if allocation or recording fails.
    pub fn record(
        &mut self,
        pool: &CommandPool<B>,
        render_pass: &RenderPass<B>,
        framebuffers: &[Framebuffer<B>],
        extent: vk::Extent2D,
        draw: &DrawState,
    ) -> RhiResult<()> {
        if !self.command_buffers.is_empty() {
            pool.free_command_buffers(&self.command_buffers);
            self.command_buffers.clear();
        }

        let command_buffers = pool.allocate_command_buffers(framebuffers.len() as u32)?;
        for (&cmd, framebuffer) in command_buffers.iter().zip(framebuffers) {
            if let Err(e) = self.record_one(cmd, render_pass, framebuffer, extent, draw) {
                pool.free_command_buffers(&command_buffers);
                return Err(e);
            }
        }

        info!(
            "Recorded {} command buffers ({} indices each)",
            command_buffers.len(),
            draw.index_count
        );
        self.command_buffers = command_buffers;
        Ok(())
    }

    fn record_one(
        &self,
        cmd: vk::CommandBuffer,
        render_pass: &RenderPass<B>,
        framebuffer: &Framebuffer<B>,
        extent: vk::Extent2D,
        draw: &DrawState,
    ) -> RhiResult<()> {
        self.backend
            .begin_command_buffer(cmd, vk::CommandBufferUsageFlags::SIMULTANEOUS_USE)?;

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: CLEAR_COLOR,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: CLEAR_DEPTH,
                    stencil: 0,
                },
            },
        ];
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(render_pass.handle())
            .framebuffer(framebuffer.handle())
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(&clear_values);

        self.backend.cmd_begin_render_pass(cmd, &begin_info);
        self.backend.cmd_bind_pipeline(cmd, draw.pipeline);
        self.backend.cmd_bind_vertex_buffer(cmd, draw.vertex_buffer);
        self.backend.cmd_bind_index_buffer(cmd, draw.index_buffer);
        self.backend
            .cmd_bind_descriptor_set(cmd, draw.pipeline_layout, draw.descriptor_set);
        self.backend.cmd_draw_indexed(cmd, draw.index_count);
        self.backend.cmd_end_render_pass(cmd);

        self.backend.end_command_buffer(cmd)
    }

    /// Runs one acquire → submit → present cycle and waits for the queue.
    ///
    /// Returns the presented image index.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::SwapchainError`] if the swapchain is out of date,
    /// or an error if nothing was recorded for the acquired image or any
    /// queue operation fails.
    pub fn tick(&mut self, presentation: &mut Presentation<B>) -> RhiResult<u32> {
        let image_index = presentation.acquire(self.image_acquired.handle())?;

        let cmd = self
            .command_buffers
            .get(image_index as usize)
            .copied()
            .ok_or_else(|| {
                RhiError::SwapchainError(format!(
                    "No command buffer recorded for image {} ({} recorded)",
                    image_index,
                    self.command_buffers.len()
                ))
            })?;

        self.backend.queue_submit(
            cmd,
            &[(
                self.image_acquired.handle(),
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            )],
            &[self.render_finished.handle()],
        )?;

        presentation.present(image_index, self.render_finished.handle())?;

        self.backend.queue_wait_idle()?;

        self.frame_count += 1;
        Ok(image_index)
    }

    /// Number of completed ticks.
    #[inline]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Number of recorded command buffers.
    #[inline]
    pub fn command_buffer_count(&self) -> usize {
        self.command_buffers.len()
    }

    /// Semaphore signaled when an image is acquired.
    #[inline]
    pub fn image_acquired(&self) -> vk::Semaphore {
        self.image_acquired.handle()
    }

    /// Semaphore signaled when rendering finishes.
    #[inline]
    pub fn render_finished(&self) -> vk::Semaphore {
        self.render_finished.handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minirender_rhi::mock::{Call, RecordingBackend};

    struct Fixture {
        backend: Arc<RecordingBackend>,
        pool: CommandPool<RecordingBackend>,
        presentation: Presentation<RecordingBackend>,
        render_pass: RenderPass<RecordingBackend>,
        framebuffers: Vec<Framebuffer<RecordingBackend>>,
    }

    fn fixture() -> Fixture {
        let backend = Arc::new(RecordingBackend::new());
        let surface = backend.fake_surface();
        let presentation = Presentation::new(backend.clone(), surface, 800, 600).unwrap();
        let pool = CommandPool::new(backend.clone()).unwrap();
        let render_pass = RenderPass::new(
            backend.clone(),
            presentation.format(),
            vk::Format::D32_SFLOAT,
        )
        .unwrap();
        let framebuffers = Framebuffer::for_views(
            &backend,
            &render_pass,
            &presentation.image_views(),
            vk::ImageView::null(),
            presentation.extent(),
        )
        .unwrap();

        Fixture {
            backend,
            pool,
            presentation,
            render_pass,
            framebuffers,
        }
    }

    fn draw_state() -> DrawState {
        DrawState {
            pipeline: vk::Pipeline::null(),
            pipeline_layout: vk::PipelineLayout::null(),
            descriptor_set: vk::DescriptorSet::null(),
            vertex_buffer: vk::Buffer::null(),
            index_buffer: vk::Buffer::null(),
            index_count: 36,
        }
    }

    #[test]
    fn test_record_one_buffer_per_image() {
        let f = fixture();
        let mut frame_loop = FrameLoop::new(f.backend.clone()).unwrap();
        f.backend.clear();

        frame_loop
            .record(
                &f.pool,
                &f.render_pass,
                &f.framebuffers,
                f.presentation.extent(),
                &draw_state(),
            )
            .unwrap();

        assert_eq!(frame_loop.command_buffer_count(), f.presentation.image_count());
        assert_eq!(
            f.backend.count(|c| matches!(c, Call::BeginRenderPass { .. })),
            f.presentation.image_count()
        );
        assert_eq!(
            f.backend
                .count(|c| *c == Call::DrawIndexed { index_count: 36 }),
            f.presentation.image_count()
        );
    }

    #[test]
    fn test_record_draws_inside_render_pass() {
        let f = fixture();
        let mut frame_loop = FrameLoop::new(f.backend.clone()).unwrap();
        f.backend.clear();

        frame_loop
            .record(
                &f.pool,
                &f.render_pass,
                &f.framebuffers[..1],
                f.presentation.extent(),
                &draw_state(),
            )
            .unwrap();

        let calls = f.backend.calls();
        let begin = calls
            .iter()
            .position(|c| matches!(c, Call::BeginRenderPass { .. }))
            .unwrap();
        let draw = calls
            .iter()
            .position(|c| matches!(c, Call::DrawIndexed { .. }))
            .unwrap();
        let end = calls
            .iter()
            .position(|c| *c == Call::EndRenderPass)
            .unwrap();
        assert!(begin < draw && draw < end);
        assert_eq!(
            calls[begin],
            Call::BeginRenderPass {
                render_pass: f.render_pass.handle(),
                framebuffer: f.framebuffers[0].handle(),
            }
        );
    }

    #[test]
    fn test_tick_submits_between_acquire_and_present() {
        let mut f = fixture();
        let mut frame_loop = FrameLoop::new(f.backend.clone()).unwrap();
        frame_loop
            .record(
                &f.pool,
                &f.render_pass,
                &f.framebuffers,
                f.presentation.extent(),
                &draw_state(),
            )
            .unwrap();
        f.backend.clear();

        let image_index = frame_loop.tick(&mut f.presentation).unwrap();

        let acquired = frame_loop.image_acquired();
        let finished = frame_loop.render_finished();
        let calls = f.backend.calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(
            calls[0],
            Call::AcquireNextImage {
                swapchain: f.presentation.handle(),
                signal: acquired,
            }
        );
        assert!(matches!(
            &calls[1],
            Call::QueueSubmit { waits, signals, .. }
                if *waits == vec![(acquired, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)]
                    && *signals == vec![finished]
        ));
        assert_eq!(
            calls[2],
            Call::QueuePresent {
                swapchain: f.presentation.handle(),
                image_index,
                wait: finished,
            }
        );
        assert_eq!(calls[3], Call::QueueWaitIdle);
        assert_eq!(frame_loop.frame_count(), 1);
    }

    #[test]
    fn test_tick_without_recording_fails() {
        let mut f = fixture();
        let mut frame_loop = FrameLoop::new(f.backend.clone()).unwrap();
        f.backend.clear();

        let result = frame_loop.tick(&mut f.presentation);
        assert!(matches!(result, Err(RhiError::SwapchainError(_))));
        assert_eq!(f.backend.count(|c| matches!(c, Call::QueueSubmit { .. })), 0);
    }

    #[test]
    fn test_rerecord_frees_previous_buffers() {
        let f = fixture();
        let mut frame_loop = FrameLoop::new(f.backend.clone()).unwrap();
        let extent = f.presentation.extent();
        frame_loop
            .record(&f.pool, &f.render_pass, &f.framebuffers, extent, &draw_state())
            .unwrap();
        f.backend.clear();

        frame_loop
            .record(&f.pool, &f.render_pass, &f.framebuffers, extent, &draw_state())
            .unwrap();

        assert_eq!(
            f.backend.calls()[0],
            Call::FreeCommandBuffers(f.presentation.image_count())
        );
    }
}
