//! Resource loading.
//!
//! This crate handles loading of external assets:
//! - OBJ model loading with vertex deduplication
//! - Image/texture loading

pub mod error;
pub mod model;
pub mod texture;

pub use error::{ResourceError, ResourceResult};
pub use model::{FaceVertex, Model, dedup_vertices};
pub use texture::TextureData;
