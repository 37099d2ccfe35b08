//! 2D images, image views and samplers.
//!
//! # Overview
//!
//! - [`ImageDesc`] describes a 2D image (size, format, tiling, usage, memory, initial layout)
//! - [`Image`] wraps VkImage with dedicated memory and tracks its current layout
//! - [`ImageView`] and [`Sampler`] are the objects shaders read through
//!
//! Layout changes go through [`Image::transition`], which only accepts the
//! pairs listed by [`layout_transition`].

use std::sync::Arc;

use ash::vk;
use tracing::{debug, error};

use crate::backend::{AllocationTarget, GpuBackend, MemoryRequest};
use crate::error::{RhiError, RhiResult};
use crate::memory::find_memory_type;

/// Access masks and pipeline stages for one layout change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayoutTransition {
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
}

/// Returns the barrier parameters for `old` → `new`.
///
/// | old → new | src access | dst access |
/// |---|---|---|
/// | PREINITIALIZED → TRANSFER_SRC | HOST_WRITE | TRANSFER_READ |
/// | PREINITIALIZED → TRANSFER_DST | HOST_WRITE | TRANSFER_WRITE |
/// | TRANSFER_DST → SHADER_READ_ONLY | TRANSFER_WRITE | SHADER_READ |
/// | UNDEFINED → DEPTH_STENCIL_ATTACHMENT | none | DEPTH_STENCIL_ATTACHMENT_READ/WRITE |
///
/// # Errors
///
/// Any other pair returns [`RhiError::UnsupportedLayoutTransition`].
pub fn layout_transition(
    old: vk::ImageLayout,
    new: vk::ImageLayout,
) -> RhiResult<LayoutTransition> {
    use vk::ImageLayout as L;

    let transition = match (old, new) {
        (L::PREINITIALIZED, L::TRANSFER_SRC_OPTIMAL) => LayoutTransition {
            src_access: vk::AccessFlags::HOST_WRITE,
            dst_access: vk::AccessFlags::TRANSFER_READ,
            src_stage: vk::PipelineStageFlags::HOST,
            dst_stage: vk::PipelineStageFlags::TRANSFER,
        },
        (L::PREINITIALIZED, L::TRANSFER_DST_OPTIMAL) => LayoutTransition {
            src_access: vk::AccessFlags::HOST_WRITE,
            dst_access: vk::AccessFlags::TRANSFER_WRITE,
            src_stage: vk::PipelineStageFlags::HOST,
            dst_stage: vk::PipelineStageFlags::TRANSFER,
        },
        (L::TRANSFER_DST_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL) => LayoutTransition {
            src_access: vk::AccessFlags::TRANSFER_WRITE,
            dst_access: vk::AccessFlags::SHADER_READ,
            src_stage: vk::PipelineStageFlags::TRANSFER,
            dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
        },
        (L::UNDEFINED, L::DEPTH_STENCIL_ATTACHMENT_OPTIMAL) => LayoutTransition {
            src_access: vk::AccessFlags::empty(),
            dst_access: vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
            dst_stage: vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        },
        _ => return Err(RhiError::UnsupportedLayoutTransition { old, new }),
    };

    Ok(transition)
}

/// Returns true if the format carries a stencil component.
pub fn has_stencil_component(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D32_SFLOAT_S8_UINT
            | vk::Format::D24_UNORM_S8_UINT
            | vk::Format::D16_UNORM_S8_UINT
            | vk::Format::S8_UINT
    )
}

/// Returns true if the format is a depth (or depth/stencil) format.
pub fn is_depth_format(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D32_SFLOAT
            | vk::Format::D32_SFLOAT_S8_UINT
            | vk::Format::D24_UNORM_S8_UINT
            | vk::Format::D16_UNORM
            | vk::Format::D16_UNORM_S8_UINT
            | vk::Format::X8_D24_UNORM_PACK32
    )
}

/// Image aspect matching a format.
pub fn aspect_for_format(format: vk::Format) -> vk::ImageAspectFlags {
    if is_depth_format(format) {
        if has_stencil_component(format) {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        } else {
            vk::ImageAspectFlags::DEPTH
        }
    } else {
        vk::ImageAspectFlags::COLOR
    }
}

/// Description of a single-mip, single-layer 2D image.
#[derive(Clone, Copy, Debug)]
pub struct ImageDesc<'a> {
    /// Debug name of the memory allocation.
    pub name: &'a str,
    pub width: u32,
    pub height: u32,
    pub format: vk::Format,
    pub tiling: vk::ImageTiling,
    pub usage: vk::ImageUsageFlags,
    /// Required memory property flags.
    pub properties: vk::MemoryPropertyFlags,
    /// UNDEFINED or PREINITIALIZED.
    pub initial_layout: vk::ImageLayout,
}

/// 2D image with its own dedicated memory.
///
/// # Resource Destruction
///
/// Dropping the image destroys the image object and then frees its memory.
/// Views created from it must be dropped first.
pub struct Image<B: GpuBackend> {
    backend: Arc<B>,
    image: vk::Image,
    allocation: Option<B::Allocation>,
    format: vk::Format,
    extent: vk::Extent2D,
    tiling: vk::ImageTiling,
    properties: vk::MemoryPropertyFlags,
    /// Layout after the last recorded transition.
    layout: vk::ImageLayout,
}

impl<B: GpuBackend> Image<B> {
    /// Creates the image, allocates memory for it and binds at offset 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the extent is empty, if no memory type satisfies
    /// the requirements, or if creation, allocation or binding fails.
    pub fn new(backend: Arc<B>, desc: &ImageDesc<'_>) -> RhiResult<Self> {
        if desc.width == 0 || desc.height == 0 {
            return Err(RhiError::MemoryError(
                "Image dimensions must be greater than 0".to_string(),
            ));
        }

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(desc.format)
            .extent(vk::Extent3D {
                width: desc.width,
                height: desc.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(desc.tiling)
            .usage(desc.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(desc.initial_layout);

        let image = backend.create_image(&image_info)?;

        let allocation = match Self::allocate_and_bind(&backend, image, desc) {
            Ok(allocation) => allocation,
            Err(e) => {
                backend.destroy_image(image);
                return Err(e);
            }
        };

        debug!(
            "Created {} image: {}x{} ({:?}, {:?})",
            desc.name, desc.width, desc.height, desc.format, desc.tiling
        );

        Ok(Self {
            backend,
            image,
            allocation: Some(allocation),
            format: desc.format,
            extent: vk::Extent2D {
                width: desc.width,
                height: desc.height,
            },
            tiling: desc.tiling,
            properties: desc.properties,
            layout: desc.initial_layout,
        })
    }

    fn allocate_and_bind(
        backend: &B,
        image: vk::Image,
        desc: &ImageDesc<'_>,
    ) -> RhiResult<B::Allocation> {
        let requirements = backend.image_memory_requirements(image);
        let memory_type_index = find_memory_type(
            backend.memory_properties(),
            requirements.memory_type_bits,
            desc.properties,
        )?;

        let allocation = backend.allocate_memory(&MemoryRequest {
            name: desc.name,
            requirements,
            memory_type_index,
            properties: desc.properties,
            linear: desc.tiling == vk::ImageTiling::LINEAR,
            target: AllocationTarget::Image(image),
        })?;

        if let Err(e) = backend.bind_image_memory(image, &allocation) {
            if let Err(free_err) = backend.free_memory(allocation) {
                error!("Failed to free image allocation: {:?}", free_err);
            }
            return Err(e);
        }

        Ok(allocation)
    }

    /// Records a layout transition barrier into `command_buffer`.
    ///
    /// The tracked layout is updated only when the pair is supported.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::UnsupportedLayoutTransition`] without recording
    /// anything if the pair is not supported.
    pub fn transition(
        &mut self,
        command_buffer: vk::CommandBuffer,
        new_layout: vk::ImageLayout,
    ) -> RhiResult<()> {
        let old_layout = self.layout;
        let transition = layout_transition(old_layout, new_layout)?;

        let barrier = vk::ImageMemoryBarrier::default()
            .old_layout(old_layout)
            .new_layout(new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(self.image)
            .subresource_range(self.subresource_range())
            .src_access_mask(transition.src_access)
            .dst_access_mask(transition.dst_access);

        self.backend.cmd_image_barrier(
            command_buffer,
            transition.src_stage,
            transition.dst_stage,
            &barrier,
        );

        debug!(
            "Image layout transition: {:?} -> {:?}",
            old_layout, new_layout
        );
        self.layout = new_layout;
        Ok(())
    }

    /// Writes tightly packed rows of `bytes_per_pixel` pixels into a linear
    /// host-visible image, honoring the driver's row pitch.
    ///
    /// # Errors
    ///
    /// Returns an error if the image is not linear and host-visible, or if
    /// `pixels` does not cover the full extent.
    pub fn write_pixels(&self, pixels: &[u8], bytes_per_pixel: u32) -> RhiResult<()> {
        if self.tiling != vk::ImageTiling::LINEAR
            || !self
                .properties
                .contains(vk::MemoryPropertyFlags::HOST_VISIBLE)
        {
            return Err(RhiError::MemoryError(
                "Only linear host-visible images can be written directly".to_string(),
            ));
        }

        let row_bytes = self.extent.width as usize * bytes_per_pixel as usize;
        let expected = row_bytes * self.extent.height as usize;
        if pixels.len() != expected {
            return Err(RhiError::MemoryError(format!(
                "Pixel data is {} bytes, image needs {}",
                pixels.len(),
                expected
            )));
        }

        let layout = self.backend.image_subresource_layout(
            self.image,
            vk::ImageSubresource {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                array_layer: 0,
            },
        );

        let allocation = self.allocation()?;
        if layout.row_pitch as usize == row_bytes {
            return self.backend.write_memory(allocation, layout.offset, pixels);
        }

        for (y, row) in pixels.chunks_exact(row_bytes).enumerate() {
            let offset = layout.offset + y as vk::DeviceSize * layout.row_pitch;
            self.backend.write_memory(allocation, offset, row)?;
        }
        Ok(())
    }

    /// Creates a 2D view over the whole image, with the aspect derived from
    /// the format.
    ///
    /// # Errors
    ///
    /// Returns an error if view creation fails.
    pub fn create_view(&self) -> RhiResult<ImageView<B>> {
        ImageView::new(self.backend.clone(), self.image, self.format)
    }

    fn subresource_range(&self) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange::default()
            .aspect_mask(aspect_for_format(self.format))
            .base_mip_level(0)
            .level_count(1)
            .base_array_layer(0)
            .layer_count(1)
    }

    fn allocation(&self) -> RhiResult<&B::Allocation> {
        self.allocation
            .as_ref()
            .ok_or_else(|| RhiError::MemoryError("Image allocation is not available".to_string()))
    }

    /// Returns the Vulkan image handle.
    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Returns the layout after the last recorded transition.
    #[inline]
    pub fn layout(&self) -> vk::ImageLayout {
        self.layout
    }
}

impl<B: GpuBackend> Drop for Image<B> {
    fn drop(&mut self) {
        self.backend.destroy_image(self.image);

        if let Some(allocation) = self.allocation.take()
            && let Err(e) = self.backend.free_memory(allocation)
        {
            error!("Failed to free image allocation: {:?}", e);
        }

        debug!(
            "Destroyed image: {}x{}",
            self.extent.width, self.extent.height
        );
    }
}

/// 2D image view.
pub struct ImageView<B: GpuBackend> {
    backend: Arc<B>,
    view: vk::ImageView,
}

impl<B: GpuBackend> ImageView<B> {
    /// Creates a 2D identity-swizzled view over one mip and one layer of `image`.
    ///
    /// # Errors
    ///
    /// Returns an error if view creation fails.
    pub fn new(backend: Arc<B>, image: vk::Image, format: vk::Format) -> RhiResult<Self> {
        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            })
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(aspect_for_format(format))
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );

        let view = backend.create_image_view(&view_info)?;
        Ok(Self { backend, view })
    }

    /// Returns the Vulkan image view handle.
    #[inline]
    pub fn handle(&self) -> vk::ImageView {
        self.view
    }
}

impl<B: GpuBackend> Drop for ImageView<B> {
    fn drop(&mut self) {
        self.backend.destroy_image_view(self.view);
    }
}

/// Texture sampler: linear filtering, repeat addressing, no anisotropy.
pub struct Sampler<B: GpuBackend> {
    backend: Arc<B>,
    sampler: vk::Sampler,
}

impl<B: GpuBackend> Sampler<B> {
    /// Creates the sampler.
    ///
    /// # Errors
    ///
    /// Returns an error if sampler creation fails.
    pub fn new(backend: Arc<B>) -> RhiResult<Self> {
        let sampler_info = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(false)
            .max_anisotropy(1.0)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS);

        let sampler = backend.create_sampler(&sampler_info)?;
        debug!("Sampler created");
        Ok(Self { backend, sampler })
    }

    /// Returns the Vulkan sampler handle.
    #[inline]
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

impl<B: GpuBackend> Drop for Sampler<B> {
    fn drop(&mut self) {
        self.backend.destroy_sampler(self.sampler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::HOST_VISIBLE_COHERENT;
    use crate::mock::{Call, RecordingBackend};

    const LAYOUTS: [vk::ImageLayout; 8] = [
        vk::ImageLayout::UNDEFINED,
        vk::ImageLayout::PREINITIALIZED,
        vk::ImageLayout::GENERAL,
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    ];

    fn texture_desc(initial_layout: vk::ImageLayout) -> ImageDesc<'static> {
        ImageDesc {
            name: "test",
            width: 4,
            height: 3,
            format: vk::Format::R8G8B8A8_SRGB,
            tiling: vk::ImageTiling::LINEAR,
            usage: vk::ImageUsageFlags::TRANSFER_SRC,
            properties: HOST_VISIBLE_COHERENT,
            initial_layout,
        }
    }

    #[test]
    fn test_layout_transition_allow_list() {
        use vk::ImageLayout as L;
        let allowed = [
            (L::PREINITIALIZED, L::TRANSFER_SRC_OPTIMAL),
            (L::PREINITIALIZED, L::TRANSFER_DST_OPTIMAL),
            (L::TRANSFER_DST_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL),
            (L::UNDEFINED, L::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
        ];

        for old in LAYOUTS {
            for new in LAYOUTS {
                let result = layout_transition(old, new);
                if allowed.contains(&(old, new)) {
                    assert!(result.is_ok(), "{:?} -> {:?} should be allowed", old, new);
                } else {
                    assert!(matches!(
                        result,
                        Err(RhiError::UnsupportedLayoutTransition { old: o, new: n })
                            if o == old && n == new
                    ));
                }
            }
        }
    }

    #[test]
    fn test_layout_transition_masks() {
        let t = layout_transition(
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )
        .unwrap();
        assert_eq!(t.src_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(t.dst_access, vk::AccessFlags::SHADER_READ);
        assert_eq!(t.dst_stage, vk::PipelineStageFlags::FRAGMENT_SHADER);

        let depth = layout_transition(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        )
        .unwrap();
        assert!(depth.src_access.is_empty());
        assert_eq!(depth.src_stage, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(depth.dst_stage, vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS);
    }

    #[test]
    fn test_aspect_for_format() {
        assert_eq!(
            aspect_for_format(vk::Format::D32_SFLOAT),
            vk::ImageAspectFlags::DEPTH
        );
        assert_eq!(
            aspect_for_format(vk::Format::D24_UNORM_S8_UINT),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
        assert_eq!(
            aspect_for_format(vk::Format::B8G8R8A8_SRGB),
            vk::ImageAspectFlags::COLOR
        );
    }

    #[test]
    fn test_unsupported_transition_records_no_barrier() {
        let backend = Arc::new(RecordingBackend::new());
        let mut image = Image::new(backend.clone(), &texture_desc(vk::ImageLayout::UNDEFINED))
            .unwrap();

        let result = image.transition(
            vk::CommandBuffer::null(),
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        );

        assert!(result.is_err());
        assert_eq!(image.layout(), vk::ImageLayout::UNDEFINED);
        assert_eq!(backend.count(|c| matches!(c, Call::ImageBarrier { .. })), 0);
    }

    #[test]
    fn test_transition_tracks_layout() {
        let backend = Arc::new(RecordingBackend::new());
        let mut image =
            Image::new(backend.clone(), &texture_desc(vk::ImageLayout::PREINITIALIZED)).unwrap();

        image
            .transition(
                vk::CommandBuffer::null(),
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            )
            .unwrap();
        image
            .transition(
                vk::CommandBuffer::null(),
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            )
            .unwrap();

        assert_eq!(image.layout(), vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        assert_eq!(backend.count(|c| matches!(c, Call::ImageBarrier { .. })), 2);
    }

    #[test]
    fn test_write_pixels_honors_row_pitch() {
        let backend = Arc::new(RecordingBackend::new());
        let image =
            Image::new(backend.clone(), &texture_desc(vk::ImageLayout::PREINITIALIZED)).unwrap();
        backend.clear();

        // 4 pixels * 4 bytes = 16 byte rows, padded to 64 by the mock
        image.write_pixels(&[0xff; 4 * 3 * 4], 4).unwrap();

        let offsets: Vec<vk::DeviceSize> = backend
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::WriteMemory { offset, len, .. } => {
                    assert_eq!(len, 16);
                    Some(offset)
                }
                _ => None,
            })
            .collect();
        assert_eq!(offsets, vec![0, 64, 128]);
    }

    #[test]
    fn test_write_pixels_rejects_short_data() {
        let backend = Arc::new(RecordingBackend::new());
        let image = Image::new(backend, &texture_desc(vk::ImageLayout::PREINITIALIZED)).unwrap();
        assert!(image.write_pixels(&[0; 8], 4).is_err());
    }

    #[test]
    fn test_image_drop_destroys_then_frees() {
        let backend = Arc::new(RecordingBackend::new());
        let image = Image::new(backend.clone(), &texture_desc(vk::ImageLayout::UNDEFINED))
            .unwrap();
        let handle = image.handle();
        backend.clear();

        drop(image);

        let calls = backend.calls();
        assert_eq!(calls[0], Call::DestroyImage(handle));
        assert!(matches!(calls[1], Call::FreeMemory { .. }));
    }
}
