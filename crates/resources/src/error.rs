//! Error types for resource loading.

use std::path::PathBuf;
use thiserror::Error;

/// Error type for resource loading operations.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// Failed to parse an OBJ file.
    #[error("Failed to load OBJ '{path}': {message}")]
    ObjLoad {
        /// Path (or source name) of the model that failed to load.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// The model contains no triangles.
    #[error("Model '{0}' contains no triangles")]
    EmptyModel(PathBuf),

    /// A face references a vertex attribute that does not exist.
    #[error("Face index {index} out of range for {attribute} ({len} entries)")]
    IndexOutOfRange {
        /// Attribute array the index points into.
        attribute: &'static str,
        /// The offending index.
        index: u32,
        /// Number of entries in the attribute array.
        len: usize,
    },

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding error.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
}

/// Result type alias for resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;
