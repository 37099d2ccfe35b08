//! Texture decoding.

use std::path::Path;

use tracing::info;

use crate::error::{ResourceError, ResourceResult};

/// Decoded image pixels, always expanded to RGBA8.
#[derive(Clone, Debug)]
pub struct TextureData {
    /// Tightly packed rows of RGBA8 pixels.
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Channels per pixel in `pixels`; always 4.
    pub channels: u32,
}

impl TextureData {
    /// Channels per pixel after decoding.
    pub const CHANNELS: u32 = 4;

    /// Decodes an image file into RGBA8.
    ///
    /// # Errors
    /// Returns an error if the file is missing or cannot be decoded.
    pub fn load(path: &Path) -> ResourceResult<Self> {
        if !path.exists() {
            return Err(ResourceError::FileNotFound(path.to_path_buf()));
        }

        let rgba = image::open(path)?.into_rgba8();
        let (width, height) = rgba.dimensions();

        info!("Texture '{}' loaded: {}x{}", path.display(), width, height);

        Ok(Self {
            pixels: rgba.into_raw(),
            width,
            height,
            channels: Self::CHANNELS,
        })
    }
}
