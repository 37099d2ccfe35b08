//! RHI-specific error types.

use ash::vk;
use thiserror::Error;

/// RHI-specific error type.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error
    #[error("Vulkan error: {0}")]
    VulkanError(#[from] vk::Result),

    /// Failed to load Vulkan
    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    /// GPU allocator error
    #[error("Allocator error: {0}")]
    AllocatorError(#[from] gpu_allocator::AllocationError),

    /// I/O error while reading shader bytecode or other binary inputs
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The instance does not expose an extension the renderer cannot run without
    #[error("Required instance extension not available: {0}")]
    MissingExtension(String),

    /// No physical device was enumerated
    #[error("No Vulkan-capable GPU found")]
    NoSuitableGpu,

    /// The selected adapter has no graphics-capable queue family
    #[error("No queue family with graphics support")]
    NoGraphicsQueue,

    /// The graphics queue family cannot present to the window surface
    #[error("Queue family {0} cannot present to the window surface")]
    PresentNotSupported(u32),

    /// None of the candidate formats is usable
    #[error("No supported format: {0}")]
    NoSupportedFormat(String),

    /// No memory type satisfies both the type filter and the property flags
    #[error("No memory type matches filter {type_bits:#b} with properties {properties:?}")]
    NoSuitableMemoryType {
        type_bits: u32,
        properties: vk::MemoryPropertyFlags,
    },

    /// The layout transition is not in the allow-list
    #[error("Unsupported image layout transition: {old:?} -> {new:?}")]
    UnsupportedLayoutTransition {
        old: vk::ImageLayout,
        new: vk::ImageLayout,
    },

    /// Memory mapping failed or the write did not fit
    #[error("Memory error: {0}")]
    MemoryError(String),

    /// Shader module error
    #[error("Shader error: {0}")]
    ShaderError(String),

    /// Surface creation error
    #[error("Surface error: {0}")]
    SurfaceError(String),

    /// Swapchain error
    #[error("Swapchain error: {0}")]
    SwapchainError(String),

    /// Pipeline creation error
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// Asset loading failed upstream of the GPU
    #[error("Resource error: {0}")]
    Resource(String),
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;
