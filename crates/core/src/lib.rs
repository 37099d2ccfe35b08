//! Core utilities for the Vulkan renderer.
//!
//! This crate provides foundational types and utilities used across the renderer:
//! - Error types and result aliases
//! - Logging initialization
//! - Timer utilities
//! - Renderer configuration

mod config;
mod error;
mod logging;
mod timer;

pub use config::RendererConfig;
pub use error::{Error, Result};
pub use logging::{DEFAULT_FILTER, build_filter, init_logging};
pub use timer::{FrameStats, Timer};
