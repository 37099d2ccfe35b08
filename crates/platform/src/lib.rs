//! Platform abstraction layer for the Vulkan renderer.
//!
//! This crate provides platform-specific functionality:
//! - Window management via winit
//! - A non-blocking event pump for the render loop
//! - Raw window handles for Vulkan surface creation

mod platform;
mod window;

pub use platform::Platform;
pub use window::{Window, window_attributes};
