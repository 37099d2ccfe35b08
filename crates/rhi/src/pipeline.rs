//! Graphics pipeline management.
//!
//! # Overview
//!
//! - [`PipelineLayout`] wraps VkPipelineLayout (descriptor set layouts only)
//! - [`Pipeline`] wraps the graphics VkPipeline
//! - [`GraphicsPipelineBuilder`] collects shader stages, vertex input and
//!   fixed-function state, then builds against a render pass
//!
//! Viewport and scissor are baked into the pipeline at the extent given to
//! the builder; there is no dynamic state.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::path::Path;
//! use ash::vk;
//! use minirender_rhi::backend::VulkanBackend;
//! use minirender_rhi::pipeline::{GraphicsPipelineBuilder, PipelineLayout};
//! use minirender_rhi::render_pass::RenderPass;
//! use minirender_rhi::shader::{Shader, ShaderStage};
//! use minirender_rhi::vertex::Vertex;
//!
//! # fn example(backend: Arc<VulkanBackend>, render_pass: &RenderPass<VulkanBackend>) -> Result<(), minirender_rhi::RhiError> {
//! let vert = Shader::from_spirv_file(backend.clone(), Path::new("a.vert.spv"), ShaderStage::Vertex)?;
//! let frag = Shader::from_spirv_file(backend.clone(), Path::new("a.frag.spv"), ShaderStage::Fragment)?;
//! let layout = PipelineLayout::new(backend.clone(), &[])?;
//!
//! let pipeline = GraphicsPipelineBuilder::new()
//!     .vertex_shader(&vert)
//!     .fragment_shader(&frag)
//!     .vertex_binding(Vertex::binding_description())
//!     .vertex_attributes(&Vertex::attribute_descriptions())
//!     .extent(vk::Extent2D { width: 800, height: 600 })
//!     .build(backend, &layout, render_pass)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::backend::GpuBackend;
use crate::error::{RhiError, RhiResult};
use crate::render_pass::RenderPass;
use crate::shader::Shader;

/// Vulkan pipeline layout wrapper.
///
/// The layout lists the descriptor set layouts the pipeline reads through.
/// Push constants are not used.
pub struct PipelineLayout<B: GpuBackend> {
    /// Backend the layout was created through.
    backend: Arc<B>,
    /// Vulkan pipeline layout handle.
    layout: vk::PipelineLayout,
}

impl<B: GpuBackend> PipelineLayout<B> {
    /// Creates a new pipeline layout.
    ///
    /// # Errors
    ///
    /// Returns an error if pipeline layout creation fails.
    pub fn new(
        backend: Arc<B>,
        descriptor_set_layouts: &[vk::DescriptorSetLayout],
    ) -> RhiResult<Self> {
        let create_info =
            vk::PipelineLayoutCreateInfo::default().set_layouts(descriptor_set_layouts);

        let layout = backend.create_pipeline_layout(&create_info)?;

        debug!(
            "Created pipeline layout with {} descriptor set layout(s)",
            descriptor_set_layouts.len()
        );

        Ok(Self { backend, layout })
    }

    /// Returns the Vulkan pipeline layout handle.
    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl<B: GpuBackend> Drop for PipelineLayout<B> {
    fn drop(&mut self) {
        self.backend.destroy_pipeline_layout(self.layout);
        debug!("Pipeline layout destroyed");
    }
}

/// Graphics pipeline wrapper. Immutable once built.
pub struct Pipeline<B: GpuBackend> {
    /// Backend the pipeline was created through.
    backend: Arc<B>,
    /// Vulkan pipeline handle.
    pipeline: vk::Pipeline,
}

impl<B: GpuBackend> Pipeline<B> {
    /// Returns the Vulkan pipeline handle.
    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }
}

impl<B: GpuBackend> Drop for Pipeline<B> {
    fn drop(&mut self) {
        self.backend.destroy_pipeline(self.pipeline);
        info!("Graphics pipeline destroyed");
    }
}

/// Face culling mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CullMode {
    /// Do not cull any faces.
    None,
    /// Cull front-facing triangles.
    Front,
    /// Cull back-facing triangles.
    #[default]
    Back,
}

impl CullMode {
    /// Converts to Vulkan cull mode flags.
    pub fn to_vk(self) -> vk::CullModeFlags {
        match self {
            CullMode::None => vk::CullModeFlags::NONE,
            CullMode::Front => vk::CullModeFlags::FRONT,
            CullMode::Back => vk::CullModeFlags::BACK,
        }
    }
}

/// Front face winding order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FrontFace {
    /// Counter-clockwise winding is front-facing.
    #[default]
    CounterClockwise,
    /// Clockwise winding is front-facing.
    Clockwise,
}

impl FrontFace {
    /// Converts to Vulkan front face.
    pub fn to_vk(self) -> vk::FrontFace {
        match self {
            FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
            FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
        }
    }
}

/// Depth comparison operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CompareOp {
    /// Passes if less than.
    #[default]
    Less,
    /// Passes if less than or equal.
    LessOrEqual,
    /// Always passes.
    Always,
}

impl CompareOp {
    /// Converts to Vulkan compare op.
    pub fn to_vk(self) -> vk::CompareOp {
        match self {
            CompareOp::Less => vk::CompareOp::LESS,
            CompareOp::LessOrEqual => vk::CompareOp::LESS_OR_EQUAL,
            CompareOp::Always => vk::CompareOp::ALWAYS,
        }
    }
}

/// Builder for the graphics pipeline.
///
/// Defaults: triangle list, fill, back-face culling, counter-clockwise front
/// face, depth test and write with LESS, no blending.
pub struct GraphicsPipelineBuilder<'a, B: GpuBackend> {
    // Shader stages
    vertex_shader: Option<&'a Shader<B>>,
    fragment_shader: Option<&'a Shader<B>>,

    // Vertex input state
    vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    vertex_attributes: Vec<vk::VertexInputAttributeDescription>,

    // Rasterization state
    cull_mode: CullMode,
    front_face: FrontFace,

    // Depth state
    depth_test_enable: bool,
    depth_write_enable: bool,
    depth_compare_op: CompareOp,

    // Fixed viewport and scissor
    extent: Option<vk::Extent2D>,
}

impl<B: GpuBackend> Default for GraphicsPipelineBuilder<'_, B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, B: GpuBackend> GraphicsPipelineBuilder<'a, B> {
    /// Creates a new graphics pipeline builder with default settings.
    pub fn new() -> Self {
        Self {
            vertex_shader: None,
            fragment_shader: None,
            vertex_bindings: Vec::new(),
            vertex_attributes: Vec::new(),
            cull_mode: CullMode::Back,
            front_face: FrontFace::CounterClockwise,
            depth_test_enable: true,
            depth_write_enable: true,
            depth_compare_op: CompareOp::Less,
            extent: None,
        }
    }

    /// Sets the vertex shader.
    pub fn vertex_shader(mut self, shader: &'a Shader<B>) -> Self {
        self.vertex_shader = Some(shader);
        self
    }

    /// Sets the fragment shader.
    pub fn fragment_shader(mut self, shader: &'a Shader<B>) -> Self {
        self.fragment_shader = Some(shader);
        self
    }

    /// Adds a vertex input binding description.
    pub fn vertex_binding(mut self, binding: vk::VertexInputBindingDescription) -> Self {
        self.vertex_bindings.push(binding);
        self
    }

    /// Adds vertex input attribute descriptions.
    pub fn vertex_attributes(mut self, attributes: &[vk::VertexInputAttributeDescription]) -> Self {
        self.vertex_attributes.extend_from_slice(attributes);
        self
    }

    /// Sets the face culling mode.
    pub fn cull_mode(mut self, mode: CullMode) -> Self {
        self.cull_mode = mode;
        self
    }

    /// Sets the front face winding order.
    pub fn front_face(mut self, face: FrontFace) -> Self {
        self.front_face = face;
        self
    }

    /// Enables or disables depth testing.
    pub fn depth_test_enable(mut self, enable: bool) -> Self {
        self.depth_test_enable = enable;
        self
    }

    /// Enables or disables depth writing.
    pub fn depth_write_enable(mut self, enable: bool) -> Self {
        self.depth_write_enable = enable;
        self
    }

    /// Sets the depth comparison operation.
    pub fn depth_compare_op(mut self, op: CompareOp) -> Self {
        self.depth_compare_op = op;
        self
    }

    /// Sets the extent the viewport and scissor are fixed to.
    pub fn extent(mut self, extent: vk::Extent2D) -> Self {
        self.extent = Some(extent);
        self
    }

    /// Builds the graphics pipeline for subpass 0 of `render_pass`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Vertex shader is not set
    /// - Fragment shader is not set
    /// - No extent is set
    /// - Pipeline creation fails
    pub fn build(
        self,
        backend: Arc<B>,
        layout: &PipelineLayout<B>,
        render_pass: &RenderPass<B>,
    ) -> RhiResult<Pipeline<B>> {
        let vertex_shader = self
            .vertex_shader
            .ok_or_else(|| RhiError::PipelineError("Vertex shader is required".to_string()))?;

        let fragment_shader = self
            .fragment_shader
            .ok_or_else(|| RhiError::PipelineError("Fragment shader is required".to_string()))?;

        let extent = self
            .extent
            .ok_or_else(|| RhiError::PipelineError("Viewport extent is required".to_string()))?;

        let shader_stages = [
            vertex_shader.stage_create_info(),
            fragment_shader.stage_create_info(),
        ];

        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&self.vertex_bindings)
            .vertex_attribute_descriptions(&self.vertex_attributes);

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        // Static viewport and scissor
        let viewports = [vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }];
        let scissors = [vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        }];
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewports(&viewports)
            .scissors(&scissors);

        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(self.cull_mode.to_vk())
            .front_face(self.front_face.to_vk())
            .depth_bias_enable(false);

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(self.depth_test_enable)
            .depth_write_enable(self.depth_write_enable)
            .depth_compare_op(self.depth_compare_op.to_vk())
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        // Blending off, all channels written
        let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::default()
            .blend_enable(false)
            .color_write_mask(vk::ColorComponentFlags::RGBA)];
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .depth_stencil_state(&depth_stencil_state)
            .color_blend_state(&color_blend_state)
            .layout(layout.handle())
            .render_pass(render_pass.handle())
            .subpass(0);

        let pipeline = backend.create_graphics_pipeline(&pipeline_info)?;

        info!(
            "Graphics pipeline created ({}x{})",
            extent.width, extent.height
        );

        Ok(Pipeline { backend, pipeline })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Call, RecordingBackend};
    use crate::shader::ShaderStage;
    use crate::vertex::Vertex;

    const SPIRV: [u8; 8] = [0x03, 0x02, 0x23, 0x07, 0, 0, 1, 0];

    #[test]
    fn test_cull_mode_to_vk() {
        assert_eq!(CullMode::None.to_vk(), vk::CullModeFlags::NONE);
        assert_eq!(CullMode::Front.to_vk(), vk::CullModeFlags::FRONT);
        assert_eq!(CullMode::Back.to_vk(), vk::CullModeFlags::BACK);
    }

    #[test]
    fn test_front_face_to_vk() {
        assert_eq!(
            FrontFace::CounterClockwise.to_vk(),
            vk::FrontFace::COUNTER_CLOCKWISE
        );
        assert_eq!(FrontFace::Clockwise.to_vk(), vk::FrontFace::CLOCKWISE);
    }

    #[test]
    fn test_compare_op_to_vk() {
        assert_eq!(CompareOp::Less.to_vk(), vk::CompareOp::LESS);
        assert_eq!(CompareOp::LessOrEqual.to_vk(), vk::CompareOp::LESS_OR_EQUAL);
        assert_eq!(CompareOp::Always.to_vk(), vk::CompareOp::ALWAYS);
    }

    #[test]
    fn test_build_requires_shaders_and_extent() {
        let backend = Arc::new(RecordingBackend::new());
        let render_pass = RenderPass::new(
            backend.clone(),
            vk::Format::B8G8R8A8_SRGB,
            vk::Format::D32_SFLOAT,
        )
        .unwrap();
        let layout = PipelineLayout::new(backend.clone(), &[]).unwrap();
        let vert =
            Shader::from_spirv_bytes(backend.clone(), &SPIRV, ShaderStage::Vertex).unwrap();

        let missing_fragment = GraphicsPipelineBuilder::new()
            .vertex_shader(&vert)
            .extent(vk::Extent2D {
                width: 1,
                height: 1,
            })
            .build(backend.clone(), &layout, &render_pass);
        assert!(matches!(missing_fragment, Err(RhiError::PipelineError(_))));

        let frag =
            Shader::from_spirv_bytes(backend.clone(), &SPIRV, ShaderStage::Fragment).unwrap();
        let missing_extent = GraphicsPipelineBuilder::new()
            .vertex_shader(&vert)
            .fragment_shader(&frag)
            .build(backend.clone(), &layout, &render_pass);
        assert!(matches!(missing_extent, Err(RhiError::PipelineError(_))));
    }

    #[test]
    fn test_build_targets_render_pass_with_depth_test() {
        let backend = Arc::new(RecordingBackend::new());
        let render_pass = RenderPass::new(
            backend.clone(),
            vk::Format::B8G8R8A8_SRGB,
            vk::Format::D32_SFLOAT,
        )
        .unwrap();
        let layout = PipelineLayout::new(backend.clone(), &[]).unwrap();
        let vert =
            Shader::from_spirv_bytes(backend.clone(), &SPIRV, ShaderStage::Vertex).unwrap();
        let frag =
            Shader::from_spirv_bytes(backend.clone(), &SPIRV, ShaderStage::Fragment).unwrap();

        let _pipeline = GraphicsPipelineBuilder::new()
            .vertex_shader(&vert)
            .fragment_shader(&frag)
            .vertex_binding(Vertex::binding_description())
            .vertex_attributes(&Vertex::attribute_descriptions())
            .extent(vk::Extent2D {
                width: 800,
                height: 600,
            })
            .build(backend.clone(), &layout, &render_pass)
            .unwrap();

        assert!(backend.calls().contains(&Call::CreateGraphicsPipeline {
            render_pass: render_pass.handle(),
            depth_test: true,
        }));
    }
}
