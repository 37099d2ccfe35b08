//! Logging initialization and configuration.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str =
    "info,minirender=debug,minirender_rhi=debug,minirender_renderer=debug";

/// Builds the filter from `RUST_LOG`, falling back to [`DEFAULT_FILTER`].
pub fn build_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initialize the logging system with tracing.
///
/// This sets up tracing-subscriber with:
/// - Environment-based filtering (RUST_LOG)
/// - Targets and thread ids on every line
///
/// Calling it twice is harmless; the second call logs nothing new.
///
/// # Example
/// ```
/// minirender_core::init_logging();
/// tracing::info!("Renderer initialized");
/// ```
pub fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(build_filter())
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .try_init();
}
