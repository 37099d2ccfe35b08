//! Main rendering pipeline.
//!
//! This crate orchestrates the rendering process:
//! - Resource setup in dependency order
//! - Prerecorded render pass execution
//! - The per-frame acquire, submit and present cycle

pub mod depth_buffer;
pub mod frame_loop;
pub mod frame_renderer;
pub mod mesh;
pub mod renderer;
pub mod texture;
pub mod ubo;

pub use frame_renderer::{FrameRenderer, SceneAssets};
pub use mesh::UploadMode;
pub use renderer::Renderer;
