//! Error types for the application layer.

use thiserror::Error;

/// Application-level error shared by the platform layer and the binary.
#[derive(Error, Debug)]
pub enum Error {
    /// Vulkan-related errors
    #[error("Vulkan error: {0}")]
    Vulkan(String),

    /// Window creation or management errors
    #[error("Window error: {0}")]
    Window(String),

    /// Resource loading errors
    #[error("Resource error: {0}")]
    Resource(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<String> for Error {
    fn from(message: String) -> Self {
        Error::Internal(message)
    }
}

impl From<&str> for Error {
    fn from(message: &str) -> Self {
        Error::Internal(message.to_string())
    }
}

/// Result type alias using the application's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_from_str() {
        let error: Error = "event loop gone".into();
        assert!(matches!(error, Error::Internal(_)));
        assert_eq!(error.to_string(), "Internal error: event loop gone");
    }

    #[test]
    fn test_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.spv");
        let error: Error = io.into();
        assert!(error.to_string().starts_with("IO error:"));
    }
}
