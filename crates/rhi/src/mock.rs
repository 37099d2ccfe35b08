//! A [`GpuBackend`] that fabricates handles and records what was called.
//!
//! Used to check call ordering (frame protocol, teardown) without a GPU.
//! Only the calls tests care about are recorded as distinct [`Call`]
//! variants; bookkeeping calls are recorded as [`Call::Other`].

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use ash::vk::{self, Handle};

use crate::backend::{DeviceAllocation, GpuBackend, MemoryRequest};
use crate::error::{RhiError, RhiResult};
use crate::memory::HOST_VISIBLE_COHERENT;

/// Allocation granularity the mock rounds requirement sizes up to.
pub const MOCK_ALIGNMENT: vk::DeviceSize = 256;

/// One recorded backend call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    CreateBuffer {
        buffer: vk::Buffer,
        size: vk::DeviceSize,
    },
    AllocateMemory {
        id: u64,
        size: vk::DeviceSize,
        memory_type_index: u32,
    },
    BindBufferMemory {
        buffer: vk::Buffer,
        allocation: u64,
        offset: vk::DeviceSize,
    },
    BindImageMemory {
        image: vk::Image,
        allocation: u64,
        offset: vk::DeviceSize,
    },
    WriteMemory {
        allocation: u64,
        offset: vk::DeviceSize,
        len: usize,
    },
    FreeMemory {
        allocation: u64,
    },
    DestroyBuffer(vk::Buffer),
    CreateImage {
        image: vk::Image,
        format: vk::Format,
        initial_layout: vk::ImageLayout,
    },
    DestroyImage(vk::Image),
    CreateImageView(vk::ImageView),
    DestroyImageView(vk::ImageView),
    ImageBarrier {
        image: vk::Image,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
        src_access: vk::AccessFlags,
        dst_access: vk::AccessFlags,
    },
    CopyBuffer {
        src: vk::Buffer,
        dst: vk::Buffer,
        size: vk::DeviceSize,
    },
    CopyImage {
        src: vk::Image,
        dst: vk::Image,
    },
    BeginCommandBuffer(vk::CommandBuffer),
    EndCommandBuffer(vk::CommandBuffer),
    FreeCommandBuffers(usize),
    BeginRenderPass {
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
    },
    EndRenderPass,
    DrawIndexed {
        index_count: u32,
    },
    CreateRenderPass {
        attachments: Vec<vk::Format>,
        dependencies: u32,
    },
    CreateGraphicsPipeline {
        render_pass: vk::RenderPass,
        depth_test: bool,
    },
    AcquireNextImage {
        swapchain: vk::SwapchainKHR,
        signal: vk::Semaphore,
    },
    QueueSubmit {
        command_buffer: vk::CommandBuffer,
        waits: Vec<(vk::Semaphore, vk::PipelineStageFlags)>,
        signals: Vec<vk::Semaphore>,
    },
    QueuePresent {
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    },
    QueueWaitIdle,
    DeviceWaitIdle,
    CreateSwapchain {
        swapchain: vk::SwapchainKHR,
        min_image_count: u32,
        present_mode: vk::PresentModeKHR,
        format: vk::Format,
    },
    DestroySwapchain(vk::SwapchainKHR),
    DestroySurface(vk::SurfaceKHR),
    Other(&'static str),
}

/// Memory handed out by [`RecordingBackend`].
#[derive(Debug)]
pub struct MockAllocation {
    id: u64,
    size: vk::DeviceSize,
}

impl MockAllocation {
    /// Identifier matching the `allocation` fields of recorded calls.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl DeviceAllocation for MockAllocation {
    fn size(&self) -> vk::DeviceSize {
        self.size
    }

    fn offset(&self) -> vk::DeviceSize {
        0
    }
}

/// What the fake adapter and surface report.
#[derive(Clone, Debug)]
pub struct MockConfig {
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub surface_capabilities: vk::SurfaceCapabilitiesKHR,
    pub surface_formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
    pub present_supported: bool,
    /// Formats reporting depth attachment support under optimal tiling.
    pub depth_formats: Vec<vk::Format>,
}

impl Default for MockConfig {
    fn default() -> Self {
        let mut memory_properties = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: 2,
            memory_heap_count: 2,
            ..Default::default()
        };
        memory_properties.memory_types[0] = vk::MemoryType {
            property_flags: vk::MemoryPropertyFlags::DEVICE_LOCAL,
            heap_index: 0,
        };
        memory_properties.memory_types[1] = vk::MemoryType {
            property_flags: HOST_VISIBLE_COHERENT,
            heap_index: 1,
        };

        Self {
            memory_properties,
            surface_capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 8,
                current_extent: vk::Extent2D {
                    width: 800,
                    height: 600,
                },
                min_image_extent: vk::Extent2D {
                    width: 1,
                    height: 1,
                },
                max_image_extent: vk::Extent2D {
                    width: 4096,
                    height: 4096,
                },
                max_image_array_layers: 1,
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                ..Default::default()
            },
            surface_formats: vec![vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }],
            present_modes: vec![vk::PresentModeKHR::FIFO],
            present_supported: true,
            depth_formats: vec![vk::Format::D32_SFLOAT],
        }
    }
}

/// Recording backend for tests.
pub struct RecordingBackend {
    config: MockConfig,
    next_handle: AtomicU64,
    calls: Mutex<Vec<Call>>,
    buffer_sizes: Mutex<HashMap<vk::Buffer, vk::DeviceSize>>,
    image_extents: Mutex<HashMap<vk::Image, vk::Extent3D>>,
    swapchain_image_count: Mutex<u32>,
    acquire_counter: AtomicU64,
}

impl RecordingBackend {
    /// Creates a backend reporting the default adapter and surface.
    pub fn new() -> Self {
        Self::with_config(MockConfig::default())
    }

    /// Creates a backend reporting `config`.
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config,
            next_handle: AtomicU64::new(0x1000),
            calls: Mutex::new(Vec::new()),
            buffer_sizes: Mutex::new(HashMap::new()),
            image_extents: Mutex::new(HashMap::new()),
            swapchain_image_count: Mutex::new(0),
            acquire_counter: AtomicU64::new(0),
        }
    }

    /// A surface handle to hand to the presentation layer.
    pub fn fake_surface(&self) -> vk::SurfaceKHR {
        self.handle()
    }

    /// Every call recorded so far.
    pub fn calls(&self) -> Vec<Call> {
        self.lock_calls().clone()
    }

    /// Forgets recorded calls.
    pub fn clear(&self) {
        self.lock_calls().clear();
    }

    /// Number of recorded calls matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.lock_calls().iter().filter(|call| predicate(call)).count()
    }

    fn lock_calls(&self) -> std::sync::MutexGuard<'_, Vec<Call>> {
        // A test that panicked mid-record leaves a poisoned lock; the data is still usable.
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, call: Call) {
        self.lock_calls().push(call);
    }

    fn handle<H: Handle>(&self) -> H {
        H::from_raw(self.next_handle.fetch_add(1, Ordering::Relaxed))
    }

    /// Rows are padded so callers have to honor the pitch.
    fn row_pitch(width: u32) -> vk::DeviceSize {
        (u64::from(width) * 4).div_ceil(64) * 64
    }

    fn requirements(size: vk::DeviceSize) -> vk::MemoryRequirements {
        let aligned = size.div_ceil(MOCK_ALIGNMENT).max(1) * MOCK_ALIGNMENT;
        vk::MemoryRequirements {
            size: aligned,
            alignment: MOCK_ALIGNMENT,
            memory_type_bits: (1 << 2) - 1,
        }
    }
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuBackend for RecordingBackend {
    type Allocation = MockAllocation;

    fn queue_family_index(&self) -> u32 {
        0
    }

    fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.config.memory_properties
    }

    fn format_properties(&self, format: vk::Format) -> vk::FormatProperties {
        let optimal = if self.config.depth_formats.contains(&format) {
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT
        } else {
            vk::FormatFeatureFlags::empty()
        };
        vk::FormatProperties {
            optimal_tiling_features: optimal,
            ..Default::default()
        }
    }

    fn queue_wait_idle(&self) -> RhiResult<()> {
        self.record(Call::QueueWaitIdle);
        Ok(())
    }

    fn device_wait_idle(&self) -> RhiResult<()> {
        self.record(Call::DeviceWaitIdle);
        Ok(())
    }

    fn allocate_memory(&self, request: &MemoryRequest<'_>) -> RhiResult<MockAllocation> {
        let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
        let size = request.requirements.size;
        self.record(Call::AllocateMemory {
            id,
            size,
            memory_type_index: request.memory_type_index,
        });
        Ok(MockAllocation { id, size })
    }

    fn free_memory(&self, allocation: MockAllocation) -> RhiResult<()> {
        self.record(Call::FreeMemory {
            allocation: allocation.id,
        });
        Ok(())
    }

    fn write_memory(
        &self,
        allocation: &MockAllocation,
        offset: vk::DeviceSize,
        data: &[u8],
    ) -> RhiResult<()> {
        if offset + data.len() as vk::DeviceSize > allocation.size {
            return Err(RhiError::MemoryError("mock write out of bounds".to_string()));
        }
        self.record(Call::WriteMemory {
            allocation: allocation.id,
            offset,
            len: data.len(),
        });
        Ok(())
    }

    fn create_buffer(&self, info: &vk::BufferCreateInfo<'_>) -> RhiResult<vk::Buffer> {
        let buffer = self.handle();
        self.buffer_sizes
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(buffer, info.size);
        self.record(Call::CreateBuffer {
            buffer,
            size: info.size,
        });
        Ok(buffer)
    }

    fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements {
        let size = self
            .buffer_sizes
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(&buffer)
            .copied()
            .unwrap_or(0);
        Self::requirements(size)
    }

    fn bind_buffer_memory(&self, buffer: vk::Buffer, allocation: &MockAllocation) -> RhiResult<()> {
        self.record(Call::BindBufferMemory {
            buffer,
            allocation: allocation.id,
            offset: allocation.offset(),
        });
        Ok(())
    }

    fn destroy_buffer(&self, buffer: vk::Buffer) {
        self.record(Call::DestroyBuffer(buffer));
    }

    fn create_image(&self, info: &vk::ImageCreateInfo<'_>) -> RhiResult<vk::Image> {
        let image = self.handle();
        self.image_extents
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(image, info.extent);
        self.record(Call::CreateImage {
            image,
            format: info.format,
            initial_layout: info.initial_layout,
        });
        Ok(image)
    }

    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements {
        let extent = self
            .image_extents
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(&image)
            .copied()
            .unwrap_or_default();
        Self::requirements(Self::row_pitch(extent.width) * u64::from(extent.height))
    }

    fn bind_image_memory(&self, image: vk::Image, allocation: &MockAllocation) -> RhiResult<()> {
        self.record(Call::BindImageMemory {
            image,
            allocation: allocation.id,
            offset: allocation.offset(),
        });
        Ok(())
    }

    fn image_subresource_layout(
        &self,
        image: vk::Image,
        _subresource: vk::ImageSubresource,
    ) -> vk::SubresourceLayout {
        let extent = self
            .image_extents
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(&image)
            .copied()
            .unwrap_or_default();
        let row_pitch = Self::row_pitch(extent.width);
        vk::SubresourceLayout {
            offset: 0,
            size: row_pitch * u64::from(extent.height),
            row_pitch,
            ..Default::default()
        }
    }

    fn destroy_image(&self, image: vk::Image) {
        self.record(Call::DestroyImage(image));
    }

    fn create_image_view(&self, _info: &vk::ImageViewCreateInfo<'_>) -> RhiResult<vk::ImageView> {
        let view = self.handle();
        self.record(Call::CreateImageView(view));
        Ok(view)
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        self.record(Call::DestroyImageView(view));
    }

    fn create_sampler(&self, _info: &vk::SamplerCreateInfo<'_>) -> RhiResult<vk::Sampler> {
        self.record(Call::Other("create_sampler"));
        Ok(self.handle())
    }

    fn destroy_sampler(&self, _sampler: vk::Sampler) {
        self.record(Call::Other("destroy_sampler"));
    }

    fn create_command_pool(
        &self,
        _info: &vk::CommandPoolCreateInfo<'_>,
    ) -> RhiResult<vk::CommandPool> {
        self.record(Call::Other("create_command_pool"));
        Ok(self.handle())
    }

    fn destroy_command_pool(&self, _pool: vk::CommandPool) {
        self.record(Call::Other("destroy_command_pool"));
    }

    fn allocate_command_buffers(
        &self,
        _pool: vk::CommandPool,
        count: u32,
    ) -> RhiResult<Vec<vk::CommandBuffer>> {
        self.record(Call::Other("allocate_command_buffers"));
        Ok((0..count).map(|_| self.handle()).collect())
    }

    fn free_command_buffers(&self, _pool: vk::CommandPool, command_buffers: &[vk::CommandBuffer]) {
        self.record(Call::FreeCommandBuffers(command_buffers.len()));
    }

    fn begin_command_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
        _flags: vk::CommandBufferUsageFlags,
    ) -> RhiResult<()> {
        self.record(Call::BeginCommandBuffer(command_buffer));
        Ok(())
    }

    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> RhiResult<()> {
        self.record(Call::EndCommandBuffer(command_buffer));
        Ok(())
    }

    fn cmd_copy_buffer(
        &self,
        _command_buffer: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Buffer,
        regions: &[vk::BufferCopy],
    ) {
        self.record(Call::CopyBuffer {
            src,
            dst,
            size: regions.iter().map(|r| r.size).sum(),
        });
    }

    fn cmd_copy_image(
        &self,
        _command_buffer: vk::CommandBuffer,
        src: vk::Image,
        dst: vk::Image,
        _regions: &[vk::ImageCopy],
    ) {
        self.record(Call::CopyImage { src, dst });
    }

    fn cmd_image_barrier(
        &self,
        _command_buffer: vk::CommandBuffer,
        _src_stage: vk::PipelineStageFlags,
        _dst_stage: vk::PipelineStageFlags,
        barrier: &vk::ImageMemoryBarrier<'_>,
    ) {
        self.record(Call::ImageBarrier {
            image: barrier.image,
            old_layout: barrier.old_layout,
            new_layout: barrier.new_layout,
            src_access: barrier.src_access_mask,
            dst_access: barrier.dst_access_mask,
        });
    }

    fn cmd_begin_render_pass(
        &self,
        _command_buffer: vk::CommandBuffer,
        info: &vk::RenderPassBeginInfo<'_>,
    ) {
        self.record(Call::BeginRenderPass {
            render_pass: info.render_pass,
            framebuffer: info.framebuffer,
        });
    }

    fn cmd_end_render_pass(&self, _command_buffer: vk::CommandBuffer) {
        self.record(Call::EndRenderPass);
    }

    fn cmd_bind_pipeline(&self, _command_buffer: vk::CommandBuffer, _pipeline: vk::Pipeline) {
        self.record(Call::Other("cmd_bind_pipeline"));
    }

    fn cmd_bind_descriptor_set(
        &self,
        _command_buffer: vk::CommandBuffer,
        _layout: vk::PipelineLayout,
        _set: vk::DescriptorSet,
    ) {
        self.record(Call::Other("cmd_bind_descriptor_set"));
    }

    fn cmd_bind_vertex_buffer(&self, _command_buffer: vk::CommandBuffer, _buffer: vk::Buffer) {
        self.record(Call::Other("cmd_bind_vertex_buffer"));
    }

    fn cmd_bind_index_buffer(&self, _command_buffer: vk::CommandBuffer, _buffer: vk::Buffer) {
        self.record(Call::Other("cmd_bind_index_buffer"));
    }

    fn cmd_draw_indexed(&self, _command_buffer: vk::CommandBuffer, index_count: u32) {
        self.record(Call::DrawIndexed { index_count });
    }

    fn create_semaphore(&self) -> RhiResult<vk::Semaphore> {
        self.record(Call::Other("create_semaphore"));
        Ok(self.handle())
    }

    fn destroy_semaphore(&self, _semaphore: vk::Semaphore) {
        self.record(Call::Other("destroy_semaphore"));
    }

    fn queue_submit(
        &self,
        command_buffer: vk::CommandBuffer,
        waits: &[(vk::Semaphore, vk::PipelineStageFlags)],
        signals: &[vk::Semaphore],
    ) -> RhiResult<()> {
        self.record(Call::QueueSubmit {
            command_buffer,
            waits: waits.to_vec(),
            signals: signals.to_vec(),
        });
        Ok(())
    }

    fn create_shader_module(&self, code: &[u32]) -> RhiResult<vk::ShaderModule> {
        if code.is_empty() {
            return Err(RhiError::ShaderError("empty shader module".to_string()));
        }
        self.record(Call::Other("create_shader_module"));
        Ok(self.handle())
    }

    fn destroy_shader_module(&self, _module: vk::ShaderModule) {
        self.record(Call::Other("destroy_shader_module"));
    }

    fn create_descriptor_set_layout(
        &self,
        _info: &vk::DescriptorSetLayoutCreateInfo<'_>,
    ) -> RhiResult<vk::DescriptorSetLayout> {
        self.record(Call::Other("create_descriptor_set_layout"));
        Ok(self.handle())
    }

    fn destroy_descriptor_set_layout(&self, _layout: vk::DescriptorSetLayout) {
        self.record(Call::Other("destroy_descriptor_set_layout"));
    }

    fn create_descriptor_pool(
        &self,
        _info: &vk::DescriptorPoolCreateInfo<'_>,
    ) -> RhiResult<vk::DescriptorPool> {
        self.record(Call::Other("create_descriptor_pool"));
        Ok(self.handle())
    }

    fn destroy_descriptor_pool(&self, _pool: vk::DescriptorPool) {
        self.record(Call::Other("destroy_descriptor_pool"));
    }

    fn allocate_descriptor_sets(
        &self,
        info: &vk::DescriptorSetAllocateInfo<'_>,
    ) -> RhiResult<Vec<vk::DescriptorSet>> {
        self.record(Call::Other("allocate_descriptor_sets"));
        Ok((0..info.descriptor_set_count)
            .map(|_| self.handle())
            .collect())
    }

    fn update_descriptor_sets(&self, _writes: &[vk::WriteDescriptorSet<'_>]) {
        self.record(Call::Other("update_descriptor_sets"));
    }

    fn create_pipeline_layout(
        &self,
        _info: &vk::PipelineLayoutCreateInfo<'_>,
    ) -> RhiResult<vk::PipelineLayout> {
        self.record(Call::Other("create_pipeline_layout"));
        Ok(self.handle())
    }

    fn destroy_pipeline_layout(&self, _layout: vk::PipelineLayout) {
        self.record(Call::Other("destroy_pipeline_layout"));
    }

    fn create_render_pass(&self, info: &vk::RenderPassCreateInfo<'_>) -> RhiResult<vk::RenderPass> {
        let attachments = if info.p_attachments.is_null() {
            Vec::new()
        } else {
            // SAFETY: the builder keeps the attachment slice alive for the call
            unsafe {
                std::slice::from_raw_parts(info.p_attachments, info.attachment_count as usize)
            }
            .iter()
            .map(|attachment| attachment.format)
            .collect()
        };
        self.record(Call::CreateRenderPass {
            attachments,
            dependencies: info.dependency_count,
        });
        Ok(self.handle())
    }

    fn destroy_render_pass(&self, _render_pass: vk::RenderPass) {
        self.record(Call::Other("destroy_render_pass"));
    }

    fn create_graphics_pipeline(
        &self,
        info: &vk::GraphicsPipelineCreateInfo<'_>,
    ) -> RhiResult<vk::Pipeline> {
        let depth_test = !info.p_depth_stencil_state.is_null()
            // SAFETY: non-null pointers come from a live builder borrow
            && unsafe { (*info.p_depth_stencil_state).depth_test_enable } == vk::TRUE;
        self.record(Call::CreateGraphicsPipeline {
            render_pass: info.render_pass,
            depth_test,
        });
        Ok(self.handle())
    }

    fn destroy_pipeline(&self, _pipeline: vk::Pipeline) {
        self.record(Call::Other("destroy_pipeline"));
    }

    fn create_framebuffer(
        &self,
        _info: &vk::FramebufferCreateInfo<'_>,
    ) -> RhiResult<vk::Framebuffer> {
        self.record(Call::Other("create_framebuffer"));
        Ok(self.handle())
    }

    fn destroy_framebuffer(&self, _framebuffer: vk::Framebuffer) {
        self.record(Call::Other("destroy_framebuffer"));
    }

    fn surface_support(&self, _surface: vk::SurfaceKHR) -> RhiResult<bool> {
        Ok(self.config.present_supported)
    }

    fn surface_capabilities(
        &self,
        _surface: vk::SurfaceKHR,
    ) -> RhiResult<vk::SurfaceCapabilitiesKHR> {
        Ok(self.config.surface_capabilities)
    }

    fn surface_formats(&self, _surface: vk::SurfaceKHR) -> RhiResult<Vec<vk::SurfaceFormatKHR>> {
        Ok(self.config.surface_formats.clone())
    }

    fn surface_present_modes(
        &self,
        _surface: vk::SurfaceKHR,
    ) -> RhiResult<Vec<vk::PresentModeKHR>> {
        Ok(self.config.present_modes.clone())
    }

    fn create_swapchain(
        &self,
        info: &vk::SwapchainCreateInfoKHR<'_>,
    ) -> RhiResult<vk::SwapchainKHR> {
        let swapchain = self.handle();
        *self
            .swapchain_image_count
            .lock()
            .unwrap_or_else(|p| p.into_inner()) = info.min_image_count;
        self.record(Call::CreateSwapchain {
            swapchain,
            min_image_count: info.min_image_count,
            present_mode: info.present_mode,
            format: info.image_format,
        });
        Ok(swapchain)
    }

    fn swapchain_images(&self, _swapchain: vk::SwapchainKHR) -> RhiResult<Vec<vk::Image>> {
        let count = *self
            .swapchain_image_count
            .lock()
            .unwrap_or_else(|p| p.into_inner());
        Ok((0..count).map(|_| self.handle()).collect())
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        signal: vk::Semaphore,
    ) -> RhiResult<(u32, bool)> {
        self.record(Call::AcquireNextImage { swapchain, signal });
        let count = u64::from(
            (*self
                .swapchain_image_count
                .lock()
                .unwrap_or_else(|p| p.into_inner()))
            .max(1),
        );
        let index = self.acquire_counter.fetch_add(1, Ordering::Relaxed) % count;
        Ok((index as u32, false))
    }

    fn queue_present(
        &self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> RhiResult<bool> {
        self.record(Call::QueuePresent {
            swapchain,
            image_index,
            wait,
        });
        Ok(false)
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        self.record(Call::DestroySwapchain(swapchain));
    }

    fn destroy_surface(&self, surface: vk::SurfaceKHR) {
        self.record(Call::DestroySurface(surface));
    }
}
