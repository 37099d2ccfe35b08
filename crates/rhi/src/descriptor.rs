//! Descriptor set management for shader resource binding.
//!
//! The renderer reads resources through one fixed descriptor set:
//! - binding 0: uniform buffer, vertex stage
//! - binding 1: combined image sampler, fragment stage
//!
//! # Overview
//!
//! - [`DescriptorSetLayout`] defines the layout of shader bindings
//! - [`DescriptorPool`] manages allocation of descriptor sets
//! - [`write_uniform_and_texture`] points a set at its resources

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::backend::GpuBackend;
use crate::error::{RhiError, RhiResult};

/// Binding slot of the uniform buffer.
pub const UNIFORM_BINDING: u32 = 0;
/// Binding slot of the texture sampler.
pub const SAMPLER_BINDING: u32 = 1;

/// Returns the two bindings of the model descriptor set.
pub fn model_bindings() -> [vk::DescriptorSetLayoutBinding<'static>; 2] {
    [
        vk::DescriptorSetLayoutBinding::default()
            .binding(UNIFORM_BINDING)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::VERTEX),
        vk::DescriptorSetLayoutBinding::default()
            .binding(SAMPLER_BINDING)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::FRAGMENT),
    ]
}

/// Pool sizes covering one model descriptor set.
pub fn model_pool_sizes() -> [vk::DescriptorPoolSize; 2] {
    [
        vk::DescriptorPoolSize::default()
            .ty(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(1),
        vk::DescriptorPoolSize::default()
            .ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(1),
    ]
}

/// Descriptor set layout wrapper.
pub struct DescriptorSetLayout<B: GpuBackend> {
    /// Backend the layout was created through.
    backend: Arc<B>,
    /// Vulkan descriptor set layout handle.
    layout: vk::DescriptorSetLayout,
}

impl<B: GpuBackend> DescriptorSetLayout<B> {
    /// Creates a new descriptor set layout.
    ///
    /// # Errors
    ///
    /// Returns an error if descriptor set layout creation fails.
    pub fn new(
        backend: Arc<B>,
        bindings: &[vk::DescriptorSetLayoutBinding<'_>],
    ) -> RhiResult<Self> {
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(bindings);
        let layout = backend.create_descriptor_set_layout(&create_info)?;

        debug!(
            "Created descriptor set layout with {} binding(s)",
            bindings.len()
        );

        Ok(Self { backend, layout })
    }

    /// Creates the layout with [`model_bindings`].
    ///
    /// # Errors
    ///
    /// Returns an error if descriptor set layout creation fails.
    pub fn for_model(backend: Arc<B>) -> RhiResult<Self> {
        Self::new(backend, &model_bindings())
    }

    /// Returns the Vulkan descriptor set layout handle.
    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl<B: GpuBackend> Drop for DescriptorSetLayout<B> {
    fn drop(&mut self) {
        self.backend.destroy_descriptor_set_layout(self.layout);
        debug!("Descriptor set layout destroyed");
    }
}

/// Descriptor pool wrapper.
///
/// Sets allocated from the pool are freed with it.
pub struct DescriptorPool<B: GpuBackend> {
    /// Backend the pool was created through.
    backend: Arc<B>,
    /// Vulkan descriptor pool handle.
    pool: vk::DescriptorPool,
    /// Maximum number of sets that can be allocated.
    max_sets: u32,
}

impl<B: GpuBackend> DescriptorPool<B> {
    /// Creates a new descriptor pool.
    ///
    /// # Errors
    ///
    /// Returns an error if descriptor pool creation fails.
    pub fn new(
        backend: Arc<B>,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> RhiResult<Self> {
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(pool_sizes);

        let pool = backend.create_descriptor_pool(&create_info)?;

        debug!("Created descriptor pool with max {} sets", max_sets);

        Ok(Self {
            backend,
            pool,
            max_sets,
        })
    }

    /// Allocates one descriptor set per layout.
    ///
    /// # Errors
    ///
    /// Returns an error if allocation fails (for example, the pool is exhausted).
    pub fn allocate(
        &self,
        layouts: &[vk::DescriptorSetLayout],
    ) -> RhiResult<Vec<vk::DescriptorSet>> {
        let allocate_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(layouts);

        let sets = self.backend.allocate_descriptor_sets(&allocate_info)?;
        debug!("Allocated {} descriptor set(s)", sets.len());
        Ok(sets)
    }

    /// Allocates a single descriptor set.
    ///
    /// # Errors
    ///
    /// Returns an error if allocation fails.
    pub fn allocate_one(&self, layout: vk::DescriptorSetLayout) -> RhiResult<vk::DescriptorSet> {
        self.allocate(&[layout])?
            .into_iter()
            .next()
            .ok_or_else(|| RhiError::Resource("descriptor set allocation returned nothing".into()))
    }

    /// Returns the Vulkan descriptor pool handle.
    #[inline]
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }

    /// Returns the maximum number of sets.
    #[inline]
    pub fn max_sets(&self) -> u32 {
        self.max_sets
    }
}

impl<B: GpuBackend> Drop for DescriptorPool<B> {
    fn drop(&mut self) {
        self.backend.destroy_descriptor_pool(self.pool);
        debug!("Descriptor pool destroyed");
    }
}

/// Writes the uniform buffer and texture into `set`.
pub fn write_uniform_and_texture<B: GpuBackend>(
    backend: &B,
    set: vk::DescriptorSet,
    uniform_buffer: vk::Buffer,
    uniform_size: vk::DeviceSize,
    texture_view: vk::ImageView,
    sampler: vk::Sampler,
) {
    let buffer_info = [vk::DescriptorBufferInfo::default()
        .buffer(uniform_buffer)
        .offset(0)
        .range(uniform_size)];
    let image_info = [vk::DescriptorImageInfo::default()
        .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
        .image_view(texture_view)
        .sampler(sampler)];

    let writes = [
        vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(UNIFORM_BINDING)
            .dst_array_element(0)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(&buffer_info),
        vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(SAMPLER_BINDING)
            .dst_array_element(0)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(&image_info),
    ];

    backend.update_descriptor_sets(&writes);
}
