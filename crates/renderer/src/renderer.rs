//! Main renderer orchestration.
//!
//! This module provides the [`Renderer`] struct that brings up Vulkan for a
//! window and drives a [`FrameRenderer`] on the Vulkan backend.

use std::mem::ManuallyDrop;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use minirender_core::RendererConfig;
use minirender_platform::Window;
use minirender_resources::{Model, TextureData};
use minirender_rhi::backend::VulkanBackend;
use minirender_rhi::device::Device;
use minirender_rhi::instance::Instance;
use minirender_rhi::physical_device::select_physical_device;
use minirender_rhi::shader::read_spirv;
use minirender_rhi::{RhiError, RhiResult};

use crate::frame_renderer::{FrameRenderer, SceneAssets};
use crate::mesh::UploadMode;

/// Vulkan renderer for a single window.
///
/// # Resource Destruction Order
///
/// 1. Frame renderer (waits for the device, then releases every GPU object
///    down to the surface)
/// 2. Backend, which releases the last reference to the device
/// 3. Instance (destroyed last)
///
/// ManuallyDrop is used to ensure correct destruction order.
pub struct Renderer {
    frame_renderer: ManuallyDrop<FrameRenderer<VulkanBackend>>,
    backend: ManuallyDrop<Arc<VulkanBackend>>,
    instance: ManuallyDrop<Instance>,
}

impl Renderer {
    /// Creates a new renderer for the given window.
    ///
    /// Loads the model, texture and shaders named in `config`, then builds
    /// every Vulkan object in dependency order.
    ///
    /// # Errors
    ///
    /// Returns an error if an asset cannot be loaded or any Vulkan resource
    /// creation fails.
    pub fn new(config: &RendererConfig, window: &Window) -> RhiResult<Self> {
        info!(
            "Initializing Vulkan renderer ({}x{})",
            window.width(),
            window.height()
        );

        let model = Model::load(&config.model_path).map_err(resource_error)?;
        let texture = TextureData::load(&config.texture_path).map_err(resource_error)?;
        let vertex_spirv = read_spirv(&config.vertex_shader_path)?;
        let fragment_spirv = read_spirv(&config.fragment_shader_path)?;

        let surface_extensions = window
            .required_surface_extensions()
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;
        let instance = Instance::new(config.enable_validation, &surface_extensions)?;

        let physical_device_info = select_physical_device(instance.handle())?;
        let device = Device::new(&instance, &physical_device_info)?;
        let backend = VulkanBackend::new(&instance, device);

        let surface = window
            .create_surface(instance.entry(), instance.handle())
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;

        let assets = SceneAssets {
            vertex_spirv: &vertex_spirv,
            fragment_spirv: &fragment_spirv,
            vertices: &model.vertices,
            indices: &model.indices,
            texture: &texture,
            upload_mode: UploadMode::from_use_staging(config.use_staging),
        };
        let frame_renderer = FrameRenderer::new(
            Arc::clone(&backend),
            surface,
            window.width(),
            window.height(),
            &assets,
        )?;

        Ok(Self {
            frame_renderer: ManuallyDrop::new(frame_renderer),
            backend: ManuallyDrop::new(backend),
            instance: ManuallyDrop::new(instance),
        })
    }

    /// Renders a frame with the model rotated for `elapsed` seconds.
    ///
    /// # Errors
    ///
    /// Returns an error if any Vulkan operation fails, including an
    /// out-of-date swapchain.
    pub fn draw_frame(&mut self, elapsed: f32) -> RhiResult<()> {
        self.frame_renderer.draw_frame(elapsed)?;
        Ok(())
    }

    /// Logs a window resize. The swapchain keeps its original extent.
    pub fn resize(&mut self, width: u32, height: u32) {
        let extent = self.extent();
        if width != extent.width || height != extent.height {
            debug!(
                "Resize to {}x{} observed; swapchain stays at {}x{}",
                width, height, extent.width, extent.height
            );
        }
    }

    /// Returns the current swapchain extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.frame_renderer.presentation().extent()
    }

    /// Number of frames presented so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_renderer.frame_loop().frame_count()
    }

    /// Whether the validation layer is active.
    pub fn has_validation(&self) -> bool {
        self.instance.has_validation()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        // SAFETY: Each field is dropped exactly once, here, and never used
        // afterwards. Every object holding the device is gone before the
        // instance.
        unsafe {
            ManuallyDrop::drop(&mut self.frame_renderer);
            ManuallyDrop::drop(&mut self.backend);
            ManuallyDrop::drop(&mut self.instance);
        }

        info!("Renderer destroyed");
    }
}

fn resource_error(error: minirender_resources::ResourceError) -> RhiError {
    RhiError::Resource(error.to_string())
}
