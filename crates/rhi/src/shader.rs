//! Shader module management.
//!
//! Shaders ship as precompiled SPIR-V. This module reads the bytecode and
//! wraps the resulting VkShaderModule together with its stage and entry point.
//!
//! # Overview
//!
//! - [`ShaderStage`] is the pipeline stage a module is bound to
//! - [`Shader`] wraps VkShaderModule
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::path::Path;
//! use minirender_rhi::backend::VulkanBackend;
//! use minirender_rhi::shader::{Shader, ShaderStage};
//!
//! # fn example(backend: Arc<VulkanBackend>) -> Result<(), minirender_rhi::RhiError> {
//! let vertex_shader = Shader::from_spirv_file(
//!     backend,
//!     Path::new("shaders/spirv/model.vert.spv"),
//!     ShaderStage::Vertex,
//! )?;
//! let _stage_info = vertex_shader.stage_create_info();
//! # Ok(())
//! # }
//! ```

use std::ffi::CStr;
use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::backend::GpuBackend;
use crate::error::{RhiError, RhiResult};

/// Entry point every module is expected to export.
pub const ENTRY_POINT: &CStr = c"main";

/// Shader stage type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex shader stage - processes each vertex
    Vertex,
    /// Fragment (pixel) shader stage - processes each fragment
    Fragment,
}

impl ShaderStage {
    /// Converts the shader stage to Vulkan shader stage flags.
    pub fn to_vk_stage(self) -> vk::ShaderStageFlags {
        match self {
            ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
            ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
        }
    }

    /// Returns a human-readable name for the shader stage.
    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Converts SPIR-V bytes to little-endian code words.
///
/// # Errors
///
/// Returns [`RhiError::ShaderError`] if the byte length is empty or not a
/// multiple of 4.
pub fn spirv_words(bytes: &[u8]) -> RhiResult<Vec<u32>> {
    if bytes.is_empty() || !bytes.len().is_multiple_of(4) {
        return Err(RhiError::ShaderError(format!(
            "SPIR-V code must be a non-empty multiple of 4 bytes, got {} bytes",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Reads a SPIR-V file into memory without creating a module.
///
/// # Errors
///
/// Returns [`RhiError::ShaderError`] if the file cannot be read.
pub fn read_spirv(path: &Path) -> RhiResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        RhiError::ShaderError(format!("Failed to read shader file {:?}: {}", path, e))
    })
}

/// Vulkan shader module wrapper.
///
/// Modules are only needed while the pipeline is being created and can be
/// dropped right after.
pub struct Shader<B: GpuBackend> {
    /// Backend the module was created through.
    backend: Arc<B>,
    /// Vulkan shader module handle.
    module: vk::ShaderModule,
    /// Shader stage type.
    stage: ShaderStage,
}

impl<B: GpuBackend> Shader<B> {
    /// Creates a shader module from a SPIR-V file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, its length is not a
    /// multiple of 4, or module creation fails.
    pub fn from_spirv_file(backend: Arc<B>, path: &Path, stage: ShaderStage) -> RhiResult<Self> {
        debug!("Loading {} shader from {:?}", stage, path);

        let bytes = read_spirv(path)?;
        Self::from_spirv_bytes(backend, &bytes, stage)
    }

    /// Creates a shader module from SPIR-V bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the byte length is not a multiple of 4 or module
    /// creation fails.
    pub fn from_spirv_bytes(backend: Arc<B>, bytes: &[u8], stage: ShaderStage) -> RhiResult<Self> {
        let code = spirv_words(bytes)?;
        let module = backend.create_shader_module(&code)?;

        info!("Created {} shader module ({} bytes)", stage, bytes.len());

        Ok(Self {
            backend,
            module,
            stage,
        })
    }

    /// Returns the Vulkan shader module handle.
    #[inline]
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    /// Returns the shader stage.
    #[inline]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// Creates a pipeline shader stage create info structure.
    ///
    /// The returned structure borrows from this shader and must not outlive it.
    pub fn stage_create_info(&self) -> vk::PipelineShaderStageCreateInfo<'_> {
        vk::PipelineShaderStageCreateInfo::default()
            .stage(self.stage.to_vk_stage())
            .module(self.module)
            .name(ENTRY_POINT)
    }
}

impl<B: GpuBackend> Drop for Shader<B> {
    fn drop(&mut self) {
        self.backend.destroy_shader_module(self.module);
        debug!("Destroyed {} shader module", self.stage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RecordingBackend;

    #[test]
    fn test_shader_stage_to_vk_stage() {
        assert_eq!(
            ShaderStage::Vertex.to_vk_stage(),
            vk::ShaderStageFlags::VERTEX
        );
        assert_eq!(
            ShaderStage::Fragment.to_vk_stage(),
            vk::ShaderStageFlags::FRAGMENT
        );
    }

    #[test]
    fn test_shader_stage_display() {
        assert_eq!(format!("{}", ShaderStage::Vertex), "vertex");
        assert_eq!(format!("{}", ShaderStage::Fragment), "fragment");
    }

    #[test]
    fn test_spirv_words_little_endian() {
        let words = spirv_words(&[0x03, 0x02, 0x23, 0x07, 1, 0, 0, 0]).unwrap();
        assert_eq!(words, vec![0x0723_0203, 1]);
    }

    #[test]
    fn test_invalid_spirv_alignment() {
        for len in [0, 1, 5, 7, 13] {
            assert!(matches!(
                spirv_words(&vec![0u8; len]),
                Err(RhiError::ShaderError(_))
            ));
        }
    }

    #[test]
    fn test_misaligned_bytes_create_no_module() {
        let backend = Arc::new(RecordingBackend::new());
        let result = Shader::from_spirv_bytes(backend.clone(), &[0u8; 6], ShaderStage::Vertex);
        assert!(result.is_err());
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_missing_shader_file() {
        let backend = Arc::new(RecordingBackend::new());
        let result = Shader::from_spirv_file(
            backend,
            Path::new("does/not/exist.spv"),
            ShaderStage::Fragment,
        );
        assert!(matches!(result, Err(RhiError::ShaderError(_))));
    }

    #[test]
    fn test_read_spirv_returns_file_bytes() {
        let path =
            std::env::temp_dir().join(format!("minirender_read_{}.spv", std::process::id()));
        std::fs::write(&path, [0x03, 0x02, 0x23, 0x07]).unwrap();

        let bytes = read_spirv(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(bytes, vec![0x03, 0x02, 0x23, 0x07]);
        assert!(matches!(
            read_spirv(&path),
            Err(RhiError::ShaderError(_))
        ));
    }
}
