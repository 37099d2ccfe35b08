//! Renderer configuration.

use std::path::PathBuf;

/// Everything the renderer needs to know before it starts.
///
/// The binary fills this from command-line flags; every field has a default.
#[derive(Clone, Debug, PartialEq)]
pub struct RendererConfig {
    /// Window width in pixels.
    pub width: u32,
    /// Window height in pixels.
    pub height: u32,
    /// Window title.
    pub title: String,
    /// Enable the Khronos validation layer and debug messenger.
    pub enable_validation: bool,
    /// Upload mesh data through staging buffers into device-local memory.
    pub use_staging: bool,
    /// OBJ model to draw.
    pub model_path: PathBuf,
    /// Texture sampled by the fragment shader.
    pub texture_path: PathBuf,
    /// Precompiled vertex shader.
    pub vertex_shader_path: PathBuf,
    /// Precompiled fragment shader.
    pub fragment_shader_path: PathBuf,
    /// Stop after this many presented frames; `None` runs until closed.
    pub max_frames: Option<u64>,
}

impl RendererConfig {
    pub const DEFAULT_WIDTH: u32 = 800;
    pub const DEFAULT_HEIGHT: u32 = 600;
    pub const DEFAULT_TITLE: &'static str = "Vulkan Renderer";
    pub const DEFAULT_MODEL_PATH: &'static str = "assets/models/viking_room.obj";
    pub const DEFAULT_TEXTURE_PATH: &'static str = "assets/textures/viking_room.png";
    pub const DEFAULT_VERTEX_SHADER_PATH: &'static str = "shaders/spirv/model.vert.spv";
    pub const DEFAULT_FRAGMENT_SHADER_PATH: &'static str = "shaders/spirv/model.frag.spv";

    /// Checks that the window has a usable size.
    pub fn validate(&self) -> crate::Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(crate::Error::Config(format!(
                "Window size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.max_frames == Some(0) {
            return Err(crate::Error::Config(
                "Frame limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            width: Self::DEFAULT_WIDTH,
            height: Self::DEFAULT_HEIGHT,
            title: Self::DEFAULT_TITLE.to_string(),
            enable_validation: cfg!(debug_assertions),
            use_staging: true,
            model_path: PathBuf::from(Self::DEFAULT_MODEL_PATH),
            texture_path: PathBuf::from(Self::DEFAULT_TEXTURE_PATH),
            vertex_shader_path: PathBuf::from(Self::DEFAULT_VERTEX_SHADER_PATH),
            fragment_shader_path: PathBuf::from(Self::DEFAULT_FRAGMENT_SHADER_PATH),
            max_frames: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = RendererConfig::default();
        assert_eq!(config.width, 800);
        assert_eq!(config.height, 600);
        assert_eq!(config.title, "Vulkan Renderer");
        assert_eq!(config.enable_validation, cfg!(debug_assertions));
        assert!(config.use_staging);
        assert_eq!(config.max_frames, None);
        assert_eq!(
            config.model_path,
            PathBuf::from("assets/models/viking_room.obj")
        );
        assert_eq!(
            config.texture_path,
            PathBuf::from("assets/textures/viking_room.png")
        );
        assert_eq!(
            config.vertex_shader_path,
            PathBuf::from("shaders/spirv/model.vert.spv")
        );
        assert_eq!(
            config.fragment_shader_path,
            PathBuf::from("shaders/spirv/model.frag.spv")
        );
    }

    #[test]
    fn test_config_rejects_zero_size() {
        let config = RendererConfig {
            height: 0,
            ..RendererConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(RendererConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_frame_limit() {
        let zero = RendererConfig {
            max_frames: Some(0),
            ..RendererConfig::default()
        };
        assert!(zero.validate().is_err());

        let three = RendererConfig {
            max_frames: Some(3),
            ..RendererConfig::default()
        };
        assert!(three.validate().is_ok());
    }
}
