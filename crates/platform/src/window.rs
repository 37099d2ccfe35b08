//! Window management using winit.
//!
//! This module provides the window wrapper and Vulkan surface creation.

use std::ffi::CStr;
use std::sync::Arc;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;
use winit::window::{Window as WinitWindow, WindowAttributes};

use minirender_core::{Error, Result};

/// Attributes of the renderer window: fixed size, not resizable.
pub fn window_attributes(width: u32, height: u32, title: &str) -> WindowAttributes {
    WindowAttributes::default()
        .with_title(title)
        .with_inner_size(PhysicalSize::new(width, height))
        .with_resizable(false)
}

/// A window wrapper that provides access to the underlying winit window
/// and raw handles for Vulkan surface creation.
pub struct Window {
    window: Arc<WinitWindow>,
    width: u32,
    height: u32,
}

impl Window {
    pub(crate) fn new(window: Arc<WinitWindow>, width: u32, height: u32) -> Self {
        Self {
            window,
            width,
            height,
        }
    }

    /// Get the width the window was opened with.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Get the height the window was opened with.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Instance extensions needed to create a surface for this window.
    ///
    /// The names point at static strings owned by ash-window.
    ///
    /// # Errors
    /// Returns an error if the display handle is unavailable or the platform
    /// is not supported.
    pub fn required_surface_extensions(&self) -> Result<Vec<&'static CStr>> {
        let display_handle = self
            .window
            .display_handle()
            .map_err(|e| Error::Window(format!("Failed to get display handle: {}", e)))?;

        let extensions = ash_window::enumerate_required_extensions(display_handle.as_raw())
            .map_err(|e| {
                Error::Vulkan(format!("Failed to enumerate required extensions: {}", e))
            })?;

        let names: Vec<&'static CStr> = extensions
            .iter()
            // SAFETY: ash_window returns pointers to static, null-terminated
            // extension names.
            .map(|&ext| unsafe { CStr::from_ptr(ext) })
            .collect();

        tracing::debug!("Required Vulkan extensions for surface: {:?}", names);
        Ok(names)
    }

    /// Create a Vulkan surface for this window.
    ///
    /// Ownership of the returned handle passes to the caller, which must
    /// destroy it before the instance.
    ///
    /// # Errors
    /// Returns an error if surface creation fails due to:
    /// - Invalid window or display handles
    /// - Vulkan surface creation failure
    pub fn create_surface(
        &self,
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> Result<vk::SurfaceKHR> {
        let display_handle = self
            .window
            .display_handle()
            .map_err(|e| Error::Window(format!("Failed to get display handle: {}", e)))?;

        let window_handle = self
            .window
            .window_handle()
            .map_err(|e| Error::Window(format!("Failed to get window handle: {}", e)))?;

        // SAFETY: The entry and instance are valid references provided by the caller.
        // The display and window handles are valid as they come from the winit window.
        let surface = unsafe {
            ash_window::create_surface(
                entry,
                instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| Error::Vulkan(format!("Failed to create Vulkan surface: {}", e)))?
        };

        tracing::info!("Vulkan surface created successfully");
        Ok(surface)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::dpi::Size;

    #[test]
    fn test_window_attributes_fixed_size() {
        let attributes = window_attributes(800, 600, "Vulkan Renderer");
        assert!(!attributes.resizable);
        assert_eq!(attributes.title, "Vulkan Renderer");
        assert_eq!(
            attributes.inner_size,
            Some(Size::Physical(PhysicalSize::new(800, 600)))
        );
    }
}
