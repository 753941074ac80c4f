//! The 2D graphics pipeline.
//!
//! There is exactly one pipeline shape: a triangle list over [`Vertex`]
//! positions, rasterized into the single color attachment of a
//! [`RenderPass`]. Viewport and scissor are baked in from the swapchain
//! extent since the window never resizes.
//!
//! [`Vertex`]: crate::vertex::Vertex
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use toy2d_rhi::device::Device;
//! use toy2d_rhi::shader::Shader;
//! use toy2d_rhi::pipeline::{PipelineBuilder, PipelineLayout};
//! use toy2d_rhi::render_pass::RenderPass;
//!
//! # fn example(device: Arc<Device>, vs: &Shader, fs: &Shader, pass: &RenderPass, extent: vk::Extent2D) -> Result<(), toy2d_rhi::RhiError> {
//! let layout = PipelineLayout::new(device.clone(), &[])?;
//! let pipeline = PipelineBuilder::new(vs, fs, extent).build(device, &layout, pass)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::render_pass::RenderPass;
use crate::shader::{Shader, ShaderStage};
use crate::vertex::Vertex;

/// Pipeline layout over a list of descriptor set layouts, no push constants.
pub struct PipelineLayout {
    device: Arc<Device>,
    layout: vk::PipelineLayout,
}

impl PipelineLayout {
    /// # Errors
    ///
    /// Returns [`RhiError::ResourceCreationError`] if creation fails.
    pub fn new(device: Arc<Device>, set_layouts: &[vk::DescriptorSetLayout]) -> RhiResult<Self> {
        let create_info = vk::PipelineLayoutCreateInfo::default().set_layouts(set_layouts);

        let layout = unsafe { device.handle().create_pipeline_layout(&create_info, None) }
            .map_err(|e| {
                RhiError::ResourceCreationError(format!("pipeline layout creation failed: {}", e))
            })?;

        debug!("Pipeline layout over {} set layout(s)", set_layouts.len());
        Ok(Self { device, layout })
    }

    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_pipeline_layout(self.layout, None);
        }
        debug!("Pipeline layout destroyed");
    }
}

/// An owned graphics pipeline.
pub struct Pipeline {
    device: Arc<Device>,
    pipeline: vk::Pipeline,
}

impl Pipeline {
    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_pipeline(self.pipeline, None);
        }
        info!("Graphics pipeline destroyed");
    }
}

/// Assembles the 2D pipeline.
///
/// Fixed state: triangle list without primitive restart, fill mode,
/// counter-clockwise front face, one sample, blending off and a full RGBA
/// write mask. Back faces are culled unless [`PipelineBuilder::cull_back_faces`]
/// turns it off.
pub struct PipelineBuilder<'a> {
    vertex: &'a Shader,
    fragment: &'a Shader,
    extent: vk::Extent2D,
    cull_back_faces: bool,
}

impl<'a> PipelineBuilder<'a> {
    pub fn new(vertex: &'a Shader, fragment: &'a Shader, extent: vk::Extent2D) -> Self {
        Self {
            vertex,
            fragment,
            extent,
            cull_back_faces: true,
        }
    }

    pub fn cull_back_faces(mut self, enabled: bool) -> Self {
        self.cull_back_faces = enabled;
        self
    }

    /// Builds the pipeline for subpass 0 of `render_pass`.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::ResourceCreationError`] if the shaders are bound
    /// to the wrong stages or the driver rejects the pipeline.
    pub fn build(
        self,
        device: Arc<Device>,
        layout: &PipelineLayout,
        render_pass: &RenderPass,
    ) -> RhiResult<Pipeline> {
        check_stage(self.vertex, ShaderStage::Vertex)?;
        check_stage(self.fragment, ShaderStage::Fragment)?;

        let stages = [
            self.vertex.stage_create_info(),
            self.fragment.stage_create_info(),
        ];

        let bindings = [Vertex::binding_description()];
        let attributes = Vertex::attribute_descriptions();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let input_assembly = input_assembly_state();

        let (viewport, scissor) = full_viewport(self.extent);
        let viewports = [viewport];
        let scissors = [scissor];
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewports(&viewports)
            .scissors(&scissors);

        let rasterizer = rasterization_state(self.cull_back_faces);
        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let blend_attachments = [opaque_color_attachment()];
        let color_blend = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&blend_attachments);

        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisample)
            .color_blend_state(&color_blend)
            .layout(layout.handle())
            .render_pass(render_pass.handle())
            .subpass(0);

        let created = unsafe {
            device.handle().create_graphics_pipelines(
                vk::PipelineCache::null(),
                std::slice::from_ref(&create_info),
                None,
            )
        }
        .map_err(|(_, e)| {
            RhiError::ResourceCreationError(format!("graphics pipeline creation failed: {}", e))
        })?;

        let pipeline = created.into_iter().next().ok_or_else(|| {
            RhiError::ResourceCreationError("driver returned no pipeline".to_string())
        })?;

        info!(
            "Graphics pipeline created for a {}x{} target",
            self.extent.width, self.extent.height
        );
        Ok(Pipeline { device, pipeline })
    }
}

fn check_stage(shader: &Shader, expected: ShaderStage) -> RhiResult<()> {
    if shader.stage() == expected {
        Ok(())
    } else {
        Err(RhiError::ResourceCreationError(format!(
            "{} shader bound to the {} stage",
            shader.stage(),
            expected
        )))
    }
}

fn input_assembly_state() -> vk::PipelineInputAssemblyStateCreateInfo<'static> {
    vk::PipelineInputAssemblyStateCreateInfo::default()
        .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
        .primitive_restart_enable(false)
}

/// Viewport and scissor covering the whole of `extent`.
fn full_viewport(extent: vk::Extent2D) -> (vk::Viewport, vk::Rect2D) {
    let viewport = vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    };
    let scissor = vk::Rect2D {
        offset: vk::Offset2D::default(),
        extent,
    };
    (viewport, scissor)
}

fn rasterization_state(cull_back_faces: bool) -> vk::PipelineRasterizationStateCreateInfo<'static> {
    let cull = if cull_back_faces {
        vk::CullModeFlags::BACK
    } else {
        vk::CullModeFlags::NONE
    };
    vk::PipelineRasterizationStateCreateInfo::default()
        .polygon_mode(vk::PolygonMode::FILL)
        .cull_mode(cull)
        .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
        .line_width(1.0)
}

fn opaque_color_attachment() -> vk::PipelineColorBlendAttachmentState {
    vk::PipelineColorBlendAttachmentState::default()
        .blend_enable(false)
        .color_write_mask(vk::ColorComponentFlags::RGBA)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_assembly_is_plain_triangle_list() {
        let state = input_assembly_state();
        assert_eq!(state.topology, vk::PrimitiveTopology::TRIANGLE_LIST);
        assert_eq!(state.primitive_restart_enable, vk::FALSE);
    }

    #[test]
    fn test_viewport_covers_extent() {
        let (viewport, scissor) = full_viewport(vk::Extent2D {
            width: 1280,
            height: 720,
        });
        assert_eq!((viewport.width, viewport.height), (1280.0, 720.0));
        assert_eq!((viewport.min_depth, viewport.max_depth), (0.0, 1.0));
        assert_eq!((scissor.offset.x, scissor.offset.y), (0, 0));
        assert_eq!(scissor.extent.width, 1280);
        assert_eq!(scissor.extent.height, 720);
    }

    #[test]
    fn test_rasterizer_culls_clockwise_back_faces() {
        let state = rasterization_state(true);
        assert_eq!(state.polygon_mode, vk::PolygonMode::FILL);
        assert_eq!(state.cull_mode, vk::CullModeFlags::BACK);
        assert_eq!(state.front_face, vk::FrontFace::COUNTER_CLOCKWISE);
        assert_eq!(state.line_width, 1.0);

        assert_eq!(rasterization_state(false).cull_mode, vk::CullModeFlags::NONE);
    }

    #[test]
    fn test_color_attachment_is_opaque() {
        let attachment = opaque_color_attachment();
        assert_eq!(attachment.blend_enable, vk::FALSE);
        assert_eq!(attachment.color_write_mask, vk::ColorComponentFlags::RGBA);
    }
}
