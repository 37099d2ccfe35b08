//! The seam between renderer orchestration and the GPU.
//!
//! Every device-level call the renderer makes (object creation and
//! destruction, memory binding, command recording, submission and
//! presentation) goes through [`GpuBackend`]. The RAII wrappers in this crate
//! hold an `Arc<B>` and issue their destroy call through it on drop.
//!
//! Two implementations exist:
//! - [`VulkanBackend`], which forwards to `ash` and allocates through gpu-allocator
//! - `mock::RecordingBackend` (feature `mock`), which fabricates handles and
//!   records the order of calls for tests

mod vulkan;

pub use vulkan::VulkanBackend;

use ash::vk;

use crate::error::RhiResult;

/// A block of device memory handed out by a backend.
pub trait DeviceAllocation: Send + Sync {
    /// Size of the allocation in bytes.
    fn size(&self) -> vk::DeviceSize;

    /// Offset of the allocation inside its device memory object.
    fn offset(&self) -> vk::DeviceSize;
}

/// The object an allocation is dedicated to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AllocationTarget {
    Buffer(vk::Buffer),
    Image(vk::Image),
}

/// Everything a backend needs to allocate memory for one object.
#[derive(Clone, Copy, Debug)]
pub struct MemoryRequest<'a> {
    /// Debug name of the allocation.
    pub name: &'a str,
    /// Requirements queried from the object.
    pub requirements: vk::MemoryRequirements,
    /// Memory type chosen by [`crate::memory::find_memory_type`].
    pub memory_type_index: u32,
    /// Property flags the memory type was chosen for.
    pub properties: vk::MemoryPropertyFlags,
    /// Whether the object is linear (buffers, linear images).
    pub linear: bool,
    /// The buffer or image the allocation will be bound to.
    pub target: AllocationTarget,
}

/// Device-level operations used by the renderer.
///
/// Handles passed in must have been created by the same backend. Destroy
/// calls assume the GPU no longer uses the handle; callers wait for the
/// queue to go idle before tearing anything down.
pub trait GpuBackend: Send + Sync {
    /// Memory handed out by [`GpuBackend::allocate_memory`].
    type Allocation: DeviceAllocation;

    // Device

    /// Index of the queue family all work is submitted to.
    fn queue_family_index(&self) -> u32;

    /// Memory types and heaps of the adapter.
    fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties;

    /// Format capabilities of the adapter.
    fn format_properties(&self, format: vk::Format) -> vk::FormatProperties;

    /// Blocks until the queue has drained.
    fn queue_wait_idle(&self) -> RhiResult<()>;

    /// Blocks until the whole device has drained.
    fn device_wait_idle(&self) -> RhiResult<()>;

    // Memory

    fn allocate_memory(&self, request: &MemoryRequest<'_>) -> RhiResult<Self::Allocation>;
    fn free_memory(&self, allocation: Self::Allocation) -> RhiResult<()>;

    /// Copies `data` into a host-visible allocation at `offset`.
    fn write_memory(
        &self,
        allocation: &Self::Allocation,
        offset: vk::DeviceSize,
        data: &[u8],
    ) -> RhiResult<()>;

    // Buffers and images

    fn create_buffer(&self, info: &vk::BufferCreateInfo<'_>) -> RhiResult<vk::Buffer>;
    fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements;
    fn bind_buffer_memory(&self, buffer: vk::Buffer, allocation: &Self::Allocation)
    -> RhiResult<()>;
    fn destroy_buffer(&self, buffer: vk::Buffer);

    fn create_image(&self, info: &vk::ImageCreateInfo<'_>) -> RhiResult<vk::Image>;
    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements;
    fn bind_image_memory(&self, image: vk::Image, allocation: &Self::Allocation) -> RhiResult<()>;
    fn image_subresource_layout(
        &self,
        image: vk::Image,
        subresource: vk::ImageSubresource,
    ) -> vk::SubresourceLayout;
    fn destroy_image(&self, image: vk::Image);

    fn create_image_view(&self, info: &vk::ImageViewCreateInfo<'_>) -> RhiResult<vk::ImageView>;
    fn destroy_image_view(&self, view: vk::ImageView);

    fn create_sampler(&self, info: &vk::SamplerCreateInfo<'_>) -> RhiResult<vk::Sampler>;
    fn destroy_sampler(&self, sampler: vk::Sampler);

    // Command buffers

    fn create_command_pool(&self, info: &vk::CommandPoolCreateInfo<'_>)
    -> RhiResult<vk::CommandPool>;
    fn destroy_command_pool(&self, pool: vk::CommandPool);
    fn allocate_command_buffers(
        &self,
        pool: vk::CommandPool,
        count: u32,
    ) -> RhiResult<Vec<vk::CommandBuffer>>;
    fn free_command_buffers(&self, pool: vk::CommandPool, command_buffers: &[vk::CommandBuffer]);
    fn begin_command_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
        flags: vk::CommandBufferUsageFlags,
    ) -> RhiResult<()>;
    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> RhiResult<()>;

    fn cmd_copy_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Buffer,
        regions: &[vk::BufferCopy],
    );
    fn cmd_copy_image(
        &self,
        command_buffer: vk::CommandBuffer,
        src: vk::Image,
        dst: vk::Image,
        regions: &[vk::ImageCopy],
    );
    fn cmd_image_barrier(
        &self,
        command_buffer: vk::CommandBuffer,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        barrier: &vk::ImageMemoryBarrier<'_>,
    );
    fn cmd_begin_render_pass(
        &self,
        command_buffer: vk::CommandBuffer,
        info: &vk::RenderPassBeginInfo<'_>,
    );
    fn cmd_end_render_pass(&self, command_buffer: vk::CommandBuffer);
    fn cmd_bind_pipeline(&self, command_buffer: vk::CommandBuffer, pipeline: vk::Pipeline);
    fn cmd_bind_descriptor_set(
        &self,
        command_buffer: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        set: vk::DescriptorSet,
    );
    fn cmd_bind_vertex_buffer(&self, command_buffer: vk::CommandBuffer, buffer: vk::Buffer);
    fn cmd_bind_index_buffer(&self, command_buffer: vk::CommandBuffer, buffer: vk::Buffer);
    fn cmd_draw_indexed(&self, command_buffer: vk::CommandBuffer, index_count: u32);

    // Synchronization and submission

    fn create_semaphore(&self) -> RhiResult<vk::Semaphore>;
    fn destroy_semaphore(&self, semaphore: vk::Semaphore);

    /// Submits one command buffer to the queue.
    ///
    /// `waits` pairs each semaphore with the stage that waits on it.
    fn queue_submit(
        &self,
        command_buffer: vk::CommandBuffer,
        waits: &[(vk::Semaphore, vk::PipelineStageFlags)],
        signals: &[vk::Semaphore],
    ) -> RhiResult<()>;

    // Pipeline objects

    fn create_shader_module(&self, code: &[u32]) -> RhiResult<vk::ShaderModule>;
    fn destroy_shader_module(&self, module: vk::ShaderModule);

    fn create_descriptor_set_layout(
        &self,
        info: &vk::DescriptorSetLayoutCreateInfo<'_>,
    ) -> RhiResult<vk::DescriptorSetLayout>;
    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout);

    fn create_descriptor_pool(
        &self,
        info: &vk::DescriptorPoolCreateInfo<'_>,
    ) -> RhiResult<vk::DescriptorPool>;
    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool);
    fn allocate_descriptor_sets(
        &self,
        info: &vk::DescriptorSetAllocateInfo<'_>,
    ) -> RhiResult<Vec<vk::DescriptorSet>>;
    fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet<'_>]);

    fn create_pipeline_layout(
        &self,
        info: &vk::PipelineLayoutCreateInfo<'_>,
    ) -> RhiResult<vk::PipelineLayout>;
    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout);

    fn create_render_pass(&self, info: &vk::RenderPassCreateInfo<'_>) -> RhiResult<vk::RenderPass>;
    fn destroy_render_pass(&self, render_pass: vk::RenderPass);

    fn create_graphics_pipeline(
        &self,
        info: &vk::GraphicsPipelineCreateInfo<'_>,
    ) -> RhiResult<vk::Pipeline>;
    fn destroy_pipeline(&self, pipeline: vk::Pipeline);

    fn create_framebuffer(&self, info: &vk::FramebufferCreateInfo<'_>)
    -> RhiResult<vk::Framebuffer>;
    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer);

    // Presentation

    /// Whether the queue family can present to `surface`.
    fn surface_support(&self, surface: vk::SurfaceKHR) -> RhiResult<bool>;
    fn surface_capabilities(&self, surface: vk::SurfaceKHR)
    -> RhiResult<vk::SurfaceCapabilitiesKHR>;
    fn surface_formats(&self, surface: vk::SurfaceKHR) -> RhiResult<Vec<vk::SurfaceFormatKHR>>;
    fn surface_present_modes(&self, surface: vk::SurfaceKHR)
    -> RhiResult<Vec<vk::PresentModeKHR>>;

    fn create_swapchain(
        &self,
        info: &vk::SwapchainCreateInfoKHR<'_>,
    ) -> RhiResult<vk::SwapchainKHR>;
    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> RhiResult<Vec<vk::Image>>;

    /// Acquires the next image with an unbounded timeout.
    ///
    /// Returns the image index and whether the swapchain is suboptimal.
    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        signal: vk::Semaphore,
    ) -> RhiResult<(u32, bool)>;

    /// Queues `image_index` for presentation once `wait` is signaled.
    ///
    /// Returns whether the swapchain is suboptimal.
    fn queue_present(
        &self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> RhiResult<bool>;

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR);
    fn destroy_surface(&self, surface: vk::SurfaceKHR);
}
