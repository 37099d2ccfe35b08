//! [`GpuBackend`] implementation on top of `ash` and gpu-allocator.

use std::sync::Arc;

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::debug;

use super::{AllocationTarget, DeviceAllocation, GpuBackend, MemoryRequest};
use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;
use crate::memory::{ensure_properties, memory_location};

impl DeviceAllocation for Allocation {
    fn size(&self) -> vk::DeviceSize {
        Allocation::size(self)
    }

    fn offset(&self) -> vk::DeviceSize {
        Allocation::offset(self)
    }
}

/// The production backend.
///
/// Holds the logical device together with the instance-level and
/// device-level extension loaders needed for presentation.
pub struct VulkanBackend {
    device: Arc<Device>,
    instance: ash::Instance,
    surface_loader: ash::khr::surface::Instance,
    swapchain_loader: ash::khr::swapchain::Device,
}

impl VulkanBackend {
    /// Creates the backend for `device`.
    ///
    /// The instance must outlive the backend and every object created through it.
    pub fn new(instance: &Instance, device: Arc<Device>) -> Arc<Self> {
        let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());
        let swapchain_loader = ash::khr::swapchain::Device::new(instance.handle(), device.handle());

        Arc::new(Self {
            device,
            instance: instance.handle().clone(),
            surface_loader,
            swapchain_loader,
        })
    }

    /// Returns the underlying device context.
    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    #[inline]
    fn raw(&self) -> &ash::Device {
        self.device.handle()
    }
}

impl GpuBackend for VulkanBackend {
    type Allocation = Allocation;

    fn queue_family_index(&self) -> u32 {
        self.device.queue_family_index()
    }

    fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        self.device.memory_properties()
    }

    fn format_properties(&self, format: vk::Format) -> vk::FormatProperties {
        unsafe {
            self.instance
                .get_physical_device_format_properties(self.device.physical_device(), format)
        }
    }

    fn queue_wait_idle(&self) -> RhiResult<()> {
        self.device.queue_wait_idle()
    }

    fn device_wait_idle(&self) -> RhiResult<()> {
        self.device.wait_idle()
    }

    fn allocate_memory(&self, request: &MemoryRequest<'_>) -> RhiResult<Allocation> {
        let allocation_scheme = match request.target {
            AllocationTarget::Buffer(buffer) => AllocationScheme::DedicatedBuffer(buffer),
            AllocationTarget::Image(image) => AllocationScheme::DedicatedImage(image),
        };

        let allocation = self.device.lock_allocator()?.allocate(&AllocationCreateDesc {
            name: request.name,
            requirements: request.requirements,
            location: memory_location(request.properties),
            linear: request.linear,
            allocation_scheme,
        })?;

        if let Err(e) = ensure_properties(
            allocation.memory_properties(),
            request.properties,
            request.requirements.memory_type_bits,
        ) {
            self.device.lock_allocator()?.free(allocation)?;
            return Err(e);
        }

        debug!(
            "Allocated '{}': {} bytes (memory type {})",
            request.name,
            allocation.size(),
            request.memory_type_index
        );

        Ok(allocation)
    }

    fn free_memory(&self, allocation: Allocation) -> RhiResult<()> {
        self.device.lock_allocator()?.free(allocation)?;
        Ok(())
    }

    fn write_memory(
        &self,
        allocation: &Allocation,
        offset: vk::DeviceSize,
        data: &[u8],
    ) -> RhiResult<()> {
        let fits = offset
            .checked_add(data.len() as vk::DeviceSize)
            .is_some_and(|end| end <= allocation.size());
        if !fits {
            return Err(RhiError::MemoryError(format!(
                "write of {} bytes at offset {} exceeds allocation of {} bytes",
                data.len(),
                offset,
                allocation.size()
            )));
        }

        let mapped = allocation.mapped_ptr().ok_or_else(|| {
            RhiError::MemoryError("allocation is not host-visible".to_string())
        })?;

        // Host-visible allocations stay mapped for their whole lifetime;
        // the coherent memory type makes the write visible without a flush.
        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr(),
                mapped.as_ptr().cast::<u8>().add(offset as usize),
                data.len(),
            );
        }

        Ok(())
    }

    fn create_buffer(&self, info: &vk::BufferCreateInfo<'_>) -> RhiResult<vk::Buffer> {
        Ok(unsafe { self.raw().create_buffer(info, None)? })
    }

    fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements {
        unsafe { self.raw().get_buffer_memory_requirements(buffer) }
    }

    fn bind_buffer_memory(&self, buffer: vk::Buffer, allocation: &Allocation) -> RhiResult<()> {
        unsafe {
            self.raw()
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())?;
        }
        Ok(())
    }

    fn destroy_buffer(&self, buffer: vk::Buffer) {
        unsafe { self.raw().destroy_buffer(buffer, None) };
    }

    fn create_image(&self, info: &vk::ImageCreateInfo<'_>) -> RhiResult<vk::Image> {
        Ok(unsafe { self.raw().create_image(info, None)? })
    }

    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements {
        unsafe { self.raw().get_image_memory_requirements(image) }
    }

    fn bind_image_memory(&self, image: vk::Image, allocation: &Allocation) -> RhiResult<()> {
        unsafe {
            self.raw()
                .bind_image_memory(image, allocation.memory(), allocation.offset())?;
        }
        Ok(())
    }

    fn image_subresource_layout(
        &self,
        image: vk::Image,
        subresource: vk::ImageSubresource,
    ) -> vk::SubresourceLayout {
        unsafe { self.raw().get_image_subresource_layout(image, subresource) }
    }

    fn destroy_image(&self, image: vk::Image) {
        unsafe { self.raw().destroy_image(image, None) };
    }

    fn create_image_view(&self, info: &vk::ImageViewCreateInfo<'_>) -> RhiResult<vk::ImageView> {
        Ok(unsafe { self.raw().create_image_view(info, None)? })
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        unsafe { self.raw().destroy_image_view(view, None) };
    }

    fn create_sampler(&self, info: &vk::SamplerCreateInfo<'_>) -> RhiResult<vk::Sampler> {
        Ok(unsafe { self.raw().create_sampler(info, None)? })
    }

    fn destroy_sampler(&self, sampler: vk::Sampler) {
        unsafe { self.raw().destroy_sampler(sampler, None) };
    }

    fn create_command_pool(
        &self,
        info: &vk::CommandPoolCreateInfo<'_>,
    ) -> RhiResult<vk::CommandPool> {
        Ok(unsafe { self.raw().create_command_pool(info, None)? })
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        unsafe { self.raw().destroy_command_pool(pool, None) };
    }

    fn allocate_command_buffers(
        &self,
        pool: vk::CommandPool,
        count: u32,
    ) -> RhiResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);
        Ok(unsafe { self.raw().allocate_command_buffers(&alloc_info)? })
    }

    fn free_command_buffers(&self, pool: vk::CommandPool, command_buffers: &[vk::CommandBuffer]) {
        unsafe { self.raw().free_command_buffers(pool, command_buffers) };
    }

    fn begin_command_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
        flags: vk::CommandBufferUsageFlags,
    ) -> RhiResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::default().flags(flags);
        unsafe { self.raw().begin_command_buffer(command_buffer, &begin_info)? };
        Ok(())
    }

    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> RhiResult<()> {
        unsafe { self.raw().end_command_buffer(command_buffer)? };
        Ok(())
    }

    fn cmd_copy_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Buffer,
        regions: &[vk::BufferCopy],
    ) {
        unsafe { self.raw().cmd_copy_buffer(command_buffer, src, dst, regions) };
    }

    fn cmd_copy_image(
        &self,
        command_buffer: vk::CommandBuffer,
        src: vk::Image,
        dst: vk::Image,
        regions: &[vk::ImageCopy],
    ) {
        unsafe {
            self.raw().cmd_copy_image(
                command_buffer,
                src,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                dst,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                regions,
            );
        }
    }

    fn cmd_image_barrier(
        &self,
        command_buffer: vk::CommandBuffer,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        barrier: &vk::ImageMemoryBarrier<'_>,
    ) {
        unsafe {
            self.raw().cmd_pipeline_barrier(
                command_buffer,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                std::slice::from_ref(barrier),
            );
        }
    }

    fn cmd_begin_render_pass(
        &self,
        command_buffer: vk::CommandBuffer,
        info: &vk::RenderPassBeginInfo<'_>,
    ) {
        unsafe {
            self.raw()
                .cmd_begin_render_pass(command_buffer, info, vk::SubpassContents::INLINE);
        }
    }

    fn cmd_end_render_pass(&self, command_buffer: vk::CommandBuffer) {
        unsafe { self.raw().cmd_end_render_pass(command_buffer) };
    }

    fn cmd_bind_pipeline(&self, command_buffer: vk::CommandBuffer, pipeline: vk::Pipeline) {
        unsafe {
            self.raw()
                .cmd_bind_pipeline(command_buffer, vk::PipelineBindPoint::GRAPHICS, pipeline);
        }
    }

    fn cmd_bind_descriptor_set(
        &self,
        command_buffer: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        set: vk::DescriptorSet,
    ) {
        unsafe {
            self.raw().cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                0,
                &[set],
                &[],
            );
        }
    }

    fn cmd_bind_vertex_buffer(&self, command_buffer: vk::CommandBuffer, buffer: vk::Buffer) {
        unsafe {
            self.raw()
                .cmd_bind_vertex_buffers(command_buffer, 0, &[buffer], &[0]);
        }
    }

    fn cmd_bind_index_buffer(&self, command_buffer: vk::CommandBuffer, buffer: vk::Buffer) {
        unsafe {
            self.raw()
                .cmd_bind_index_buffer(command_buffer, buffer, 0, vk::IndexType::UINT32);
        }
    }

    fn cmd_draw_indexed(&self, command_buffer: vk::CommandBuffer, index_count: u32) {
        unsafe {
            self.raw()
                .cmd_draw_indexed(command_buffer, index_count, 1, 0, 0, 0);
        }
    }

    fn create_semaphore(&self) -> RhiResult<vk::Semaphore> {
        let info = vk::SemaphoreCreateInfo::default();
        Ok(unsafe { self.raw().create_semaphore(&info, None)? })
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        unsafe { self.raw().destroy_semaphore(semaphore, None) };
    }

    fn queue_submit(
        &self,
        command_buffer: vk::CommandBuffer,
        waits: &[(vk::Semaphore, vk::PipelineStageFlags)],
        signals: &[vk::Semaphore],
    ) -> RhiResult<()> {
        let (wait_semaphores, wait_stages): (Vec<_>, Vec<_>) = waits.iter().copied().unzip();
        let command_buffers = [command_buffer];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(signals);

        unsafe {
            self.raw()
                .queue_submit(self.device.queue(), &[submit_info], vk::Fence::null())?;
        }
        Ok(())
    }

    fn create_shader_module(&self, code: &[u32]) -> RhiResult<vk::ShaderModule> {
        let info = vk::ShaderModuleCreateInfo::default().code(code);
        Ok(unsafe { self.raw().create_shader_module(&info, None)? })
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        unsafe { self.raw().destroy_shader_module(module, None) };
    }

    fn create_descriptor_set_layout(
        &self,
        info: &vk::DescriptorSetLayoutCreateInfo<'_>,
    ) -> RhiResult<vk::DescriptorSetLayout> {
        Ok(unsafe { self.raw().create_descriptor_set_layout(info, None)? })
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        unsafe { self.raw().destroy_descriptor_set_layout(layout, None) };
    }

    fn create_descriptor_pool(
        &self,
        info: &vk::DescriptorPoolCreateInfo<'_>,
    ) -> RhiResult<vk::DescriptorPool> {
        Ok(unsafe { self.raw().create_descriptor_pool(info, None)? })
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        unsafe { self.raw().destroy_descriptor_pool(pool, None) };
    }

    fn allocate_descriptor_sets(
        &self,
        info: &vk::DescriptorSetAllocateInfo<'_>,
    ) -> RhiResult<Vec<vk::DescriptorSet>> {
        Ok(unsafe { self.raw().allocate_descriptor_sets(info)? })
    }

    fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet<'_>]) {
        unsafe { self.raw().update_descriptor_sets(writes, &[]) };
    }

    fn create_pipeline_layout(
        &self,
        info: &vk::PipelineLayoutCreateInfo<'_>,
    ) -> RhiResult<vk::PipelineLayout> {
        Ok(unsafe { self.raw().create_pipeline_layout(info, None)? })
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        unsafe { self.raw().destroy_pipeline_layout(layout, None) };
    }

    fn create_render_pass(&self, info: &vk::RenderPassCreateInfo<'_>) -> RhiResult<vk::RenderPass> {
        Ok(unsafe { self.raw().create_render_pass(info, None)? })
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        unsafe { self.raw().destroy_render_pass(render_pass, None) };
    }

    fn create_graphics_pipeline(
        &self,
        info: &vk::GraphicsPipelineCreateInfo<'_>,
    ) -> RhiResult<vk::Pipeline> {
        let pipelines = unsafe {
            self.raw()
                .create_graphics_pipelines(
                    vk::PipelineCache::null(),
                    std::slice::from_ref(info),
                    None,
                )
                .map_err(|(_, result)| result)?
        };

        pipelines
            .into_iter()
            .next()
            .ok_or_else(|| RhiError::PipelineError("driver returned no pipeline".to_string()))
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        unsafe { self.raw().destroy_pipeline(pipeline, None) };
    }

    fn create_framebuffer(
        &self,
        info: &vk::FramebufferCreateInfo<'_>,
    ) -> RhiResult<vk::Framebuffer> {
        Ok(unsafe { self.raw().create_framebuffer(info, None)? })
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        unsafe { self.raw().destroy_framebuffer(framebuffer, None) };
    }

    fn surface_support(&self, surface: vk::SurfaceKHR) -> RhiResult<bool> {
        Ok(unsafe {
            self.surface_loader.get_physical_device_surface_support(
                self.device.physical_device(),
                self.device.queue_family_index(),
                surface,
            )?
        })
    }

    fn surface_capabilities(
        &self,
        surface: vk::SurfaceKHR,
    ) -> RhiResult<vk::SurfaceCapabilitiesKHR> {
        Ok(unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(self.device.physical_device(), surface)?
        })
    }

    fn surface_formats(&self, surface: vk::SurfaceKHR) -> RhiResult<Vec<vk::SurfaceFormatKHR>> {
        Ok(unsafe {
            self.surface_loader
                .get_physical_device_surface_formats(self.device.physical_device(), surface)?
        })
    }

    fn surface_present_modes(
        &self,
        surface: vk::SurfaceKHR,
    ) -> RhiResult<Vec<vk::PresentModeKHR>> {
        Ok(unsafe {
            self.surface_loader
                .get_physical_device_surface_present_modes(self.device.physical_device(), surface)?
        })
    }

    fn create_swapchain(
        &self,
        info: &vk::SwapchainCreateInfoKHR<'_>,
    ) -> RhiResult<vk::SwapchainKHR> {
        Ok(unsafe { self.swapchain_loader.create_swapchain(info, None)? })
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> RhiResult<Vec<vk::Image>> {
        Ok(unsafe { self.swapchain_loader.get_swapchain_images(swapchain)? })
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        signal: vk::Semaphore,
    ) -> RhiResult<(u32, bool)> {
        Ok(unsafe {
            self.swapchain_loader
                .acquire_next_image(swapchain, u64::MAX, signal, vk::Fence::null())?
        })
    }

    fn queue_present(
        &self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> RhiResult<bool> {
        let wait_semaphores = [wait];
        let swapchains = [swapchain];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        Ok(unsafe {
            self.swapchain_loader
                .queue_present(self.device.queue(), &present_info)?
        })
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        unsafe { self.swapchain_loader.destroy_swapchain(swapchain, None) };
    }

    fn destroy_surface(&self, surface: vk::SurfaceKHR) {
        unsafe { self.surface_loader.destroy_surface(surface, None) };
    }
}
