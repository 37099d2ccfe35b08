//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! This crate provides a safe abstraction over Vulkan using the `ash` crate.
//! It handles:
//! - Instance, physical device and logical device creation
//! - The [`backend::GpuBackend`] seam every device-level call goes through
//! - Presentation (surface, swapchain, image views)
//! - Buffers, images, staging transfers and layout transitions
//! - Render pass, framebuffers, descriptors and the graphics pipeline
//! - Command pools and semaphores

mod error;

pub mod backend;
pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod image;
pub mod instance;
pub mod memory;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod physical_device;
pub mod pipeline;
pub mod render_pass;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod transfer;
pub mod vertex;

pub use error::{RhiError, RhiResult};

// Re-export ash types that users might need
pub use ash::vk;
