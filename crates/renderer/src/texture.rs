//! Sampled texture upload.
//!
//! RGBA8 pixels go through a linear, host-visible staging image into an
//! optimal-tiling, device-local image:
//!
//! 1. staging image written row by row (honoring the row pitch)
//! 2. staging → TRANSFER_SRC, texture → TRANSFER_DST
//! 3. image-to-image copy
//! 4. texture → SHADER_READ_ONLY
//!
//! Each step runs in its own one-shot command buffer and waits for the queue
//! to go idle. The staging image is dropped once the copy completes.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use minirender_rhi::backend::GpuBackend;
use minirender_rhi::command::CommandPool;
use minirender_rhi::image::{Image, ImageDesc, ImageView, Sampler};
use minirender_rhi::memory::HOST_VISIBLE_COHERENT;
use minirender_rhi::transfer::copy_image;
use minirender_rhi::{RhiError, RhiResult};

/// Format of uploaded textures.
pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

/// Bytes per RGBA8 pixel.
const BYTES_PER_PIXEL: u32 = 4;

/// A device-local texture ready for sampling in the fragment shader.
pub struct Texture<B: GpuBackend> {
    sampler: Sampler<B>,
    view: ImageView<B>,
    image: Image<B>,
}

impl<B: GpuBackend> Texture<B> {
    /// Uploads `pixels` (tightly packed RGBA8, `width` × `height`).
    ///
    /// # Errors
    ///
    /// Returns an error if the pixel data does not match the extent, or if
    /// any image, transition, copy, view or sampler step fails.
    pub fn from_rgba8(
        pool: &CommandPool<B>,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> RhiResult<Self> {
        let expected = width as usize * height as usize * BYTES_PER_PIXEL as usize;
        if pixels.len() != expected {
            return Err(RhiError::Resource(format!(
                "Texture {}x{} needs {} bytes, got {}",
                width,
                height,
                expected,
                pixels.len()
            )));
        }

        let backend = pool.backend();

        let mut staging = Image::new(
            Arc::clone(backend),
            &ImageDesc {
                name: "texture_staging",
                width,
                height,
                format: TEXTURE_FORMAT,
                tiling: vk::ImageTiling::LINEAR,
                usage: vk::ImageUsageFlags::TRANSFER_SRC,
                properties: HOST_VISIBLE_COHERENT,
                initial_layout: vk::ImageLayout::PREINITIALIZED,
            },
        )?;
        staging.write_pixels(pixels, BYTES_PER_PIXEL)?;

        let mut image = Image::new(
            Arc::clone(backend),
            &ImageDesc {
                name: "texture",
                width,
                height,
                format: TEXTURE_FORMAT,
                tiling: vk::ImageTiling::OPTIMAL,
                usage: vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
                properties: vk::MemoryPropertyFlags::DEVICE_LOCAL,
                initial_layout: vk::ImageLayout::PREINITIALIZED,
            },
        )?;

        pool.one_shot(|cmd| staging.transition(cmd, vk::ImageLayout::TRANSFER_SRC_OPTIMAL))?;
        pool.one_shot(|cmd| image.transition(cmd, vk::ImageLayout::TRANSFER_DST_OPTIMAL))?;
        pool.one_shot(|cmd| copy_image(backend.as_ref(), cmd, &staging, &image))?;
        pool.one_shot(|cmd| image.transition(cmd, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL))?;
        drop(staging);
        debug!("Texture staging image released");

        let view = image.create_view()?;
        let sampler = Sampler::new(Arc::clone(backend))?;

        info!("Texture uploaded: {}x{}", width, height);

        Ok(Self {
            sampler,
            view,
            image,
        })
    }

    /// Returns the view sampled at binding 1.
    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view.handle()
    }

    /// Returns the sampler paired with the view.
    #[inline]
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler.handle()
    }

    /// Returns the texture dimensions.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.image.extent()
    }

    /// Returns the current layout of the texture image.
    #[inline]
    pub fn layout(&self) -> vk::ImageLayout {
        self.image.layout()
    }
}
