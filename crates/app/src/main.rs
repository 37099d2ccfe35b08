//! Vulkan Renderer - Main Entry Point
//!
//! Opens a window, draws a textured, depth-tested model spinning about +Z,
//! and runs until the window is closed.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info};

use minirender_core::{FrameStats, RendererConfig, Timer};
use minirender_platform::Platform;
use minirender_renderer::Renderer;

#[derive(clap::Parser, Debug)]
#[command(version, about = "Minimal Vulkan model viewer")]
struct CliArgs {
    /// Enable the Khronos validation layer (on by default in debug builds)
    #[arg(long)]
    validation: bool,
    /// Write vertex and index data into host-visible buffers instead of
    /// copying through a staging buffer
    #[arg(long)]
    no_staging: bool,
    /// Window width in pixels
    #[arg(long, default_value_t = RendererConfig::DEFAULT_WIDTH)]
    width: u32,
    /// Window height in pixels
    #[arg(long, default_value_t = RendererConfig::DEFAULT_HEIGHT)]
    height: u32,
    /// OBJ model to draw
    #[arg(long, default_value = RendererConfig::DEFAULT_MODEL_PATH)]
    model: PathBuf,
    /// Texture sampled by the fragment shader
    #[arg(long, default_value = RendererConfig::DEFAULT_TEXTURE_PATH)]
    texture: PathBuf,
    /// Precompiled vertex shader
    #[arg(long, default_value = RendererConfig::DEFAULT_VERTEX_SHADER_PATH)]
    vertex_shader: PathBuf,
    /// Precompiled fragment shader
    #[arg(long, default_value = RendererConfig::DEFAULT_FRAGMENT_SHADER_PATH)]
    fragment_shader: PathBuf,
    /// Close the window after presenting this many frames
    #[arg(long)]
    frames: Option<u64>,
}

impl From<CliArgs> for RendererConfig {
    fn from(args: CliArgs) -> Self {
        let defaults = RendererConfig::default();
        Self {
            width: args.width,
            height: args.height,
            enable_validation: args.validation || defaults.enable_validation,
            use_staging: !args.no_staging,
            model_path: args.model,
            texture_path: args.texture,
            vertex_shader_path: args.vertex_shader,
            fragment_shader_path: args.fragment_shader,
            max_frames: args.frames,
            ..defaults
        }
    }
}

fn run(config: &RendererConfig) -> Result<()> {
    config.validate()?;

    let mut platform = Platform::open(config.width, config.height, &config.title)
        .context("Failed to open window")?;
    let mut renderer =
        Renderer::new(config, platform.window()).context("Failed to create renderer")?;

    info!(
        "Initialization complete (validation: {}), entering main loop",
        renderer.has_validation()
    );

    let mut timer = Timer::new();
    let mut stats = FrameStats::default();

    while platform.update() {
        if let Some((width, height)) = platform.take_resize() {
            renderer.resize(width, height);
        }

        renderer
            .draw_frame(timer.elapsed_secs())
            .context("Failed to render frame")?;

        if let Some(fps) = stats.record(timer.tick()) {
            debug!("{:.1} fps ({} frames)", fps, stats.total_frames());
        }

        if config
            .max_frames
            .is_some_and(|limit| renderer.frame_count() >= limit)
        {
            platform.close();
        }
    }

    info!(
        "Close requested after {} frames, shutting down",
        renderer.frame_count()
    );
    Ok(())
}

fn main() -> Result<()> {
    minirender_core::init_logging();
    info!("Starting Vulkan Renderer");

    let config = RendererConfig::from(CliArgs::parse());
    debug!("Configuration: {:?}", config);

    if let Err(e) = run(&config) {
        error!("Fatal error: {:#}", e);
        return Err(e);
    }

    Ok(())
}
