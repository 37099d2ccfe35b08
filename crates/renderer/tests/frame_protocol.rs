//! End-to-end frame protocol on the recording backend.

use std::sync::Arc;

use ash::vk;
use glam::{Vec2, Vec3};

use minirender_renderer::{FrameRenderer, SceneAssets, UploadMode};
use minirender_resources::TextureData;
use minirender_rhi::mock::{Call, RecordingBackend};
use minirender_rhi::swapchain::Presentation;
use minirender_rhi::vertex::Vertex;

/// SPIR-V magic number followed by a version word.
const SPIRV: [u8; 8] = [0x03, 0x02, 0x23, 0x07, 0x00, 0x00, 0x01, 0x00];

fn quad() -> (Vec<Vertex>, Vec<u32>) {
    let vertices = vec![
        Vertex::new(Vec3::new(-0.5, -0.5, 0.0), Vec3::ONE, Vec2::new(0.0, 0.0)),
        Vertex::new(Vec3::new(0.5, -0.5, 0.0), Vec3::ONE, Vec2::new(1.0, 0.0)),
        Vertex::new(Vec3::new(0.5, 0.5, 0.0), Vec3::ONE, Vec2::new(1.0, 1.0)),
        Vertex::new(Vec3::new(-0.5, 0.5, 0.0), Vec3::ONE, Vec2::new(0.0, 1.0)),
    ];
    (vertices, vec![0, 1, 2, 2, 3, 0])
}

fn texture() -> TextureData {
    TextureData {
        pixels: vec![255; 2 * 2 * 4],
        width: 2,
        height: 2,
        channels: 4,
    }
}

fn build(backend: &Arc<RecordingBackend>) -> FrameRenderer<RecordingBackend> {
    let (vertices, indices) = quad();
    let texture = texture();
    let assets = SceneAssets {
        vertex_spirv: &SPIRV,
        fragment_spirv: &SPIRV,
        vertices: &vertices,
        indices: &indices,
        texture: &texture,
        upload_mode: UploadMode::Staging,
    };
    FrameRenderer::new(backend.clone(), backend.fake_surface(), 800, 600, &assets)
        .expect("renderer should build on the recording backend")
}

#[test]
fn test_setup_builds_two_attachment_render_pass_and_pipeline() {
    let backend = Arc::new(RecordingBackend::new());
    let renderer = build(&backend);

    let calls = backend.calls();
    assert!(calls.contains(&Call::CreateRenderPass {
        attachments: vec![vk::Format::B8G8R8A8_SRGB, vk::Format::D32_SFLOAT],
        dependencies: 1,
    }));
    assert!(calls.contains(&Call::CreateGraphicsPipeline {
        render_pass: renderer.render_pass().handle(),
        depth_test: true,
    }));

    // One prerecorded draw per swapchain image.
    let image_count = renderer.presentation().image_count();
    assert_eq!(renderer.frame_loop().command_buffer_count(), image_count);
    assert_eq!(
        backend.count(|c| *c == Call::DrawIndexed { index_count: 6 }),
        image_count
    );
}

#[test]
fn test_frame_tick_orders_acquire_submit_present() {
    let backend = Arc::new(RecordingBackend::new());
    let mut renderer = build(&backend);
    backend.clear();

    let image_index = renderer.draw_frame(0.5).unwrap();

    let acquired = renderer.frame_loop().image_acquired();
    let finished = renderer.frame_loop().render_finished();
    let swapchain = renderer.presentation().handle();
    let calls = backend.calls();

    let acquire = calls
        .iter()
        .position(|c| matches!(c, Call::AcquireNextImage { .. }))
        .expect("frame should acquire an image");

    // The uniform upload finishes before the image is acquired.
    let upload_idle = calls[..acquire]
        .iter()
        .rposition(|c| *c == Call::QueueWaitIdle);
    assert!(upload_idle.is_some());
    assert!(calls[..acquire]
        .iter()
        .any(|c| matches!(c, Call::CopyBuffer { size: 192, .. })));

    assert_eq!(
        calls[acquire],
        Call::AcquireNextImage {
            swapchain,
            signal: acquired,
        }
    );
    assert!(matches!(
        &calls[acquire + 1],
        Call::QueueSubmit { waits, signals, .. }
            if *waits == vec![(acquired, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)]
                && *signals == vec![finished]
    ));
    assert_eq!(
        calls[acquire + 2],
        Call::QueuePresent {
            swapchain,
            image_index,
            wait: finished,
        }
    );
    assert_eq!(calls[acquire + 3], Call::QueueWaitIdle);
    assert_eq!(calls.len(), acquire + 4);
}

#[test]
fn test_frames_cycle_through_swapchain_images() {
    let backend = Arc::new(RecordingBackend::new());
    let mut renderer = build(&backend);

    let first = renderer.draw_frame(0.0).unwrap();
    let second = renderer.draw_frame(0.016).unwrap();

    assert_ne!(first, second);
    assert_eq!(renderer.frame_loop().frame_count(), 2);
}

#[test]
fn test_shutdown_releases_in_reverse_order() {
    let backend = Arc::new(RecordingBackend::new());
    let renderer = build(&backend);
    backend.clear();

    drop(renderer);

    let calls = backend.calls();
    assert_eq!(calls[0], Call::DeviceWaitIdle);

    let position = |name: &'static str| {
        calls
            .iter()
            .position(|c| *c == Call::Other(name))
            .unwrap_or_else(|| panic!("missing {}", name))
    };
    let semaphore = position("destroy_semaphore");
    let command_pool = position("destroy_command_pool");
    let descriptor_pool = position("destroy_descriptor_pool");
    let pipeline = position("destroy_pipeline");
    let framebuffer = position("destroy_framebuffer");
    let render_pass = position("destroy_render_pass");
    let sampler = position("destroy_sampler");
    let swapchain = calls
        .iter()
        .position(|c| matches!(c, Call::DestroySwapchain(_)))
        .unwrap();
    let surface = calls
        .iter()
        .position(|c| matches!(c, Call::DestroySurface(_)))
        .unwrap();

    assert!(semaphore < command_pool);
    assert!(command_pool < descriptor_pool);
    assert!(descriptor_pool < pipeline);
    assert!(pipeline < framebuffer);
    assert!(framebuffer < render_pass);
    assert!(render_pass < sampler);
    assert!(sampler < swapchain);
    assert_eq!(surface, calls.len() - 1);
}

#[test]
fn test_presentation_teardown_order() {
    let backend = Arc::new(RecordingBackend::new());
    let presentation = Presentation::new(backend.clone(), backend.fake_surface(), 800, 600).unwrap();
    let views = presentation.image_views();
    let swapchain = presentation.handle();
    backend.clear();

    drop(presentation);

    let calls = backend.calls();
    let n = views.len();
    assert_eq!(calls.len(), n + 2);
    for (call, view) in calls[..n].iter().zip(&views) {
        assert_eq!(*call, Call::DestroyImageView(*view));
    }
    assert_eq!(calls[n], Call::DestroySwapchain(swapchain));
    assert!(matches!(calls[n + 1], Call::DestroySurface(_)));
}
