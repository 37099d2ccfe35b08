//! Presentation surface and swapchain management.
//!
//! This module owns the window surface, the swapchain built on it and one
//! image view per swapchain image.
//!
//! # Overview
//!
//! [`Presentation`] moves through a fixed sequence of states:
//!
//! ```text
//! SurfaceCreated → SwapchainCreated → ImageViewsCreated → Running → TornDown
//! ```
//!
//! - [`Presentation::open`] takes ownership of a surface, checks that the
//!   graphics queue family can present to it and snapshots its capabilities,
//!   extent and format
//! - [`Presentation::build_swapchain`] creates the swapchain
//! - [`Presentation::build_image_views`] fetches the images and creates the views
//! - the first [`Presentation::acquire`] moves it to `Running`
//!
//! Dropping it enters `TornDown` and destroys the views, then the swapchain,
//! then the surface.
//!
//! The swapchain is never recreated: the window is not resizable, and an
//! out-of-date swapchain is reported as [`RhiError::SwapchainError`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use minirender_rhi::backend::VulkanBackend;
//! use minirender_rhi::swapchain::Presentation;
//!
//! # fn example(backend: Arc<VulkanBackend>, surface: vk::SurfaceKHR) -> Result<(), minirender_rhi::RhiError> {
//! let presentation = Presentation::new(backend, surface, 800, 600)?;
//! println!("{} images at {:?}", presentation.image_count(), presentation.extent());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use crate::backend::GpuBackend;
use crate::error::{RhiError, RhiResult};
use crate::image::ImageView;

/// Number of swapchain images asked for before clamping.
pub const DEFAULT_IMAGE_COUNT: u32 = 2;

/// Format used when the surface accepts any format.
pub const FALLBACK_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Where a [`Presentation`] is in its build sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum PresentationState {
    /// Surface owned and queried, no swapchain yet.
    SurfaceCreated,
    /// Swapchain exists, images not yet wrapped in views.
    SwapchainCreated,
    /// Views exist; the presentation can acquire.
    ImageViewsCreated,
    /// At least one image has been acquired.
    Running,
    /// Views, swapchain and surface are being released.
    TornDown,
}

/// Window surface plus swapchain plus per-image views.
///
/// # Resource Destruction
///
/// Resources are destroyed in the following order:
/// 1. Image views
/// 2. Swapchain (its images go with it)
/// 3. Surface
pub struct Presentation<B: GpuBackend> {
    backend: Arc<B>,
    surface: vk::SurfaceKHR,
    /// Capability snapshot taken at open.
    capabilities: vk::SurfaceCapabilitiesKHR,
    surface_format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    extent: vk::Extent2D,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<ImageView<B>>,
    state: PresentationState,
}

impl<B: GpuBackend> Presentation<B> {
    /// Opens the surface and builds the swapchain and its image views.
    ///
    /// # Errors
    ///
    /// Returns an error from any of the three build steps.
    pub fn new(
        backend: Arc<B>,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
    ) -> RhiResult<Self> {
        let mut presentation = Self::open(backend, surface, width, height)?;
        presentation.build_swapchain()?;
        presentation.build_image_views()?;
        Ok(presentation)
    }

    /// Takes ownership of `surface` and snapshots what it supports.
    ///
    /// The surface is destroyed if opening fails.
    ///
    /// # Arguments
    ///
    /// * `backend` - The GPU backend
    /// * `surface` - A surface created for the window
    /// * `width` - Requested width, used when the surface has no current extent
    /// * `height` - Requested height, used when the surface has no current extent
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::PresentNotSupported`] if the queue family cannot
    /// present to the surface, or [`RhiError::NoSupportedFormat`] if the
    /// surface reports no formats.
    pub fn open(
        backend: Arc<B>,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
    ) -> RhiResult<Self> {
        match Self::query_surface(&backend, surface) {
            Ok((capabilities, surface_format, present_mode)) => {
                let extent = choose_extent(&capabilities, width, height);
                info!(
                    "Surface opened: {}x{}, format {:?}, color space {:?}",
                    extent.width,
                    extent.height,
                    surface_format.format,
                    surface_format.color_space
                );

                Ok(Self {
                    backend,
                    surface,
                    capabilities,
                    surface_format,
                    present_mode,
                    extent,
                    swapchain: vk::SwapchainKHR::null(),
                    images: Vec::new(),
                    image_views: Vec::new(),
                    state: PresentationState::SurfaceCreated,
                })
            }
            Err(e) => {
                backend.destroy_surface(surface);
                Err(e)
            }
        }
    }

    fn query_surface(
        backend: &B,
        surface: vk::SurfaceKHR,
    ) -> RhiResult<(
        vk::SurfaceCapabilitiesKHR,
        vk::SurfaceFormatKHR,
        vk::PresentModeKHR,
    )> {
        if !backend.surface_support(surface)? {
            return Err(RhiError::PresentNotSupported(backend.queue_family_index()));
        }

        let capabilities = backend.surface_capabilities(surface)?;
        let surface_format = choose_surface_format(&backend.surface_formats(surface)?)?;
        let present_mode = choose_present_mode(&backend.surface_present_modes(surface)?);

        Ok((capabilities, surface_format, present_mode))
    }

    /// Creates the swapchain.
    ///
    /// # Errors
    ///
    /// Returns an error if called out of order or if creation fails.
    pub fn build_swapchain(&mut self) -> RhiResult<()> {
        self.expect_state(PresentationState::SurfaceCreated)?;

        let image_count = clamp_image_count(DEFAULT_IMAGE_COUNT, &self.capabilities);

        info!(
            "Creating swapchain: {}x{}, present mode {:?}, {} images",
            self.extent.width, self.extent.height, self.present_mode, image_count
        );

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface)
            .min_image_count(image_count)
            .image_format(self.surface_format.format)
            .image_color_space(self.surface_format.color_space)
            .image_extent(self.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(vk::SurfaceTransformFlagsKHR::IDENTITY)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(self.present_mode)
            .clipped(true);

        self.swapchain = self.backend.create_swapchain(&create_info)?;
        self.state = PresentationState::SwapchainCreated;
        Ok(())
    }

    /// Fetches the swapchain images and creates one color view per image.
    ///
    /// # Errors
    ///
    /// Returns an error if called out of order or if a view cannot be created.
    pub fn build_image_views(&mut self) -> RhiResult<()> {
        self.expect_state(PresentationState::SwapchainCreated)?;

        self.images = self.backend.swapchain_images(self.swapchain)?;
        info!("Swapchain created with {} images", self.images.len());

        let mut image_views = Vec::with_capacity(self.images.len());
        for (i, &image) in self.images.iter().enumerate() {
            let view = ImageView::new(self.backend.clone(), image, self.surface_format.format)
                .map_err(|e| {
                    RhiError::SwapchainError(format!("Failed to create image view {}: {}", i, e))
                })?;
            image_views.push(view);
        }

        debug!("Created {} image views", image_views.len());
        self.image_views = image_views;
        self.state = PresentationState::ImageViewsCreated;
        Ok(())
    }

    /// Acquires the next image, signaling `signal` when it is ready.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::SwapchainError`] if the swapchain is out of date
    /// or not built yet.
    pub fn acquire(&mut self, signal: vk::Semaphore) -> RhiResult<u32> {
        if self.state != PresentationState::Running {
            self.expect_state(PresentationState::ImageViewsCreated)?;
        }

        let (image_index, suboptimal) = self
            .backend
            .acquire_next_image(self.swapchain, signal)
            .map_err(out_of_date_to_swapchain_error)?;
        if suboptimal {
            warn!("Swapchain is suboptimal for the surface");
        }
        self.state = PresentationState::Running;
        Ok(image_index)
    }

    /// Presents `image_index` once `wait` is signaled.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::SwapchainError`] if the swapchain is out of date
    /// or nothing was acquired yet.
    pub fn present(&self, image_index: u32, wait: vk::Semaphore) -> RhiResult<()> {
        self.expect_state(PresentationState::Running)?;

        let suboptimal = self
            .backend
            .queue_present(self.swapchain, image_index, wait)
            .map_err(out_of_date_to_swapchain_error)?;
        if suboptimal {
            warn!("Swapchain is suboptimal for the surface");
        }
        Ok(())
    }

    fn expect_state(&self, expected: PresentationState) -> RhiResult<()> {
        if self.state != expected {
            return Err(RhiError::SwapchainError(format!(
                "Presentation is {:?}, expected {:?}",
                self.state, expected
            )));
        }
        Ok(())
    }

    /// Returns the swapchain handle.
    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    #[inline]
    pub fn state(&self) -> PresentationState {
        self.state
    }

    /// Returns the swapchain image format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.surface_format.format
    }

    /// Returns the working extent chosen at open.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Returns the number of swapchain images.
    #[inline]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Returns the view handles, in image order.
    pub fn image_views(&self) -> Vec<vk::ImageView> {
        self.image_views.iter().map(ImageView::handle).collect()
    }
}

impl<B: GpuBackend> Drop for Presentation<B> {
    fn drop(&mut self) {
        debug!("Presentation torn down from {:?}", self.state);
        self.state = PresentationState::TornDown;

        // Views first, in image order
        self.image_views.clear();

        if self.swapchain != vk::SwapchainKHR::null() {
            self.backend.destroy_swapchain(self.swapchain);
            info!(
                "Swapchain destroyed (was {}x{}, {} images)",
                self.extent.width,
                self.extent.height,
                self.images.len()
            );
        }

        self.backend.destroy_surface(self.surface);
        debug!("Surface destroyed");
    }
}

fn out_of_date_to_swapchain_error(error: RhiError) -> RhiError {
    match error {
        RhiError::VulkanError(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
            RhiError::SwapchainError("Swapchain is out of date".to_string())
        }
        other => other,
    }
}

/// Chooses the surface format.
///
/// An UNDEFINED first entry means the surface accepts anything, in which case
/// [`FALLBACK_SURFACE_FORMAT`] is used. Otherwise the first entry wins.
///
/// # Errors
///
/// Returns [`RhiError::NoSupportedFormat`] for an empty list.
pub fn choose_surface_format(
    formats: &[vk::SurfaceFormatKHR],
) -> RhiResult<vk::SurfaceFormatKHR> {
    match formats {
        [] => Err(RhiError::NoSupportedFormat(
            "surface reports no formats".to_string(),
        )),
        [first, ..] if first.format == vk::Format::UNDEFINED => {
            debug!("Surface accepts any format, using B8G8R8A8_UNORM");
            Ok(FALLBACK_SURFACE_FORMAT)
        }
        [first, ..] => Ok(*first),
    }
}

/// Chooses MAILBOX when available, FIFO otherwise.
pub fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if present_modes.contains(&vk::PresentModeKHR::MAILBOX) {
        debug!("Selected MAILBOX present mode");
        return vk::PresentModeKHR::MAILBOX;
    }

    // FIFO is always available
    debug!("Selected FIFO present mode");
    vk::PresentModeKHR::FIFO
}

/// Chooses the swapchain extent.
///
/// Uses the current extent when the surface defines one, otherwise clamps
/// the requested size to the surface's min/max extents.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    width: u32,
    height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// Clamps `requested` into the surface's image count range.
///
/// A `max_image_count` of 0 means there is no upper bound.
pub fn clamp_image_count(requested: u32, capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = requested.max(capabilities.min_image_count);
    if capabilities.max_image_count > 0 {
        count.min(capabilities.max_image_count)
    } else {
        count
    }
}
