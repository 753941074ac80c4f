//! Main renderer orchestration.
//!
//! This module provides the [`Renderer`], which owns the frame loop and
//! every GPU object the 2D draw calls read: the pipeline, descriptor sets,
//! per-slot uniform buffers, the bound texture and the uploaded geometry.
//!
//! Updates (`set_*`) block until the device is idle before touching GPU
//! memory, so no in-flight frame reads a resource while it is replaced.

use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, error, info, warn};

use toy2d_core::RendererConfig;
use toy2d_resources::{RgbaImage, read_spirv_file};
use toy2d_rhi::buffer::Buffer;
use toy2d_rhi::command_manager::CommandManager;
use toy2d_rhi::descriptor::{
    Binding, DescriptorPool, DescriptorSetLayout, write_texture, write_uniform_buffer,
};
use toy2d_rhi::device::Device;
use toy2d_rhi::instance::Instance;
use toy2d_rhi::pipeline::{Pipeline, PipelineBuilder, PipelineLayout};
use toy2d_rhi::shader::{Shader, ShaderStage};
use toy2d_rhi::surface::Surface;
use toy2d_rhi::swapchain::{Swapchain, SwapchainOptions};
use toy2d_rhi::texture::{Sampler, Texture};
use toy2d_rhi::vertex::Vertex;

use crate::backend::VulkanFrameBackend;
use crate::error::RendererResult;
use crate::frame_loop::{FrameIndices, FrameLoop};
use crate::geometry::{
    RECTANGLE_INDEX_COUNT, RectangleGeometry, TRIANGLE_VERTEX_COUNT, TriangleGeometry,
};
use crate::uniform::{UniformObject, UniformSet};

/// Draw calls made before their geometry existed, reported once each.
#[derive(Default)]
struct MissingGeometryWarnings {
    triangle: bool,
    rectangle: bool,
}

/// The 2D frame orchestrator.
///
/// # Resource Destruction Order
///
/// `Drop` waits for the device to go idle, then fields drop top to bottom:
/// pipeline objects, geometry, texture, uniforms, descriptors, the frame
/// loop (sync objects, framebuffers, render pass, swapchain) and finally
/// the command pool.
pub struct Renderer {
    // Pipeline resources
    /// Graphics pipeline for both shapes.
    pipeline: Pipeline,
    /// Layout over the single descriptor set layout.
    pipeline_layout: PipelineLayout,

    // Geometry
    triangle: Option<TriangleGeometry>,
    rectangle: Option<RectangleGeometry>,

    // Texture bound at binding 1
    texture: Texture,
    sampler: Sampler,

    // Descriptor resources
    /// One uniform buffer per frame slot.
    uniforms: UniformSet<Buffer>,
    /// One descriptor set per frame slot.
    descriptor_sets: Vec<vk::DescriptorSet>,
    descriptor_pool: DescriptorPool,
    descriptor_set_layout: DescriptorSetLayout,

    // Frame cycle
    frame_loop: FrameLoop<VulkanFrameBackend>,
    commands: CommandManager,

    device: Arc<Device>,
    uniform: UniformObject,
    warnings: MissingGeometryWarnings,
}

impl Renderer {
    /// Creates the renderer for a window of `width` x `height` pixels.
    ///
    /// Builds the swapchain, render pass, framebuffers, frame slots,
    /// descriptors, uniform buffers, a 1x1 white texture and the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if a shader file cannot be read or any Vulkan
    /// object cannot be created.
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: &Surface,
        width: u32,
        height: u32,
        config: &RendererConfig,
    ) -> RendererResult<Self> {
        info!("Initializing renderer ({}x{})", width, height);

        let swapchain = Swapchain::new(
            instance,
            device.clone(),
            surface,
            width,
            height,
            SwapchainOptions {
                preferred_image_count: config.preferred_image_count,
                prefer_mailbox: config.prefer_mailbox,
            },
        )?;

        let commands = CommandManager::new(device.clone(), device.graphics_family())?;
        let backend = VulkanFrameBackend::new(
            device.clone(),
            swapchain,
            &commands,
            config.max_frames_in_flight,
            config.clear_color,
        )?;
        let frame_loop = FrameLoop::new(backend);
        let slot_count = frame_loop.frames_in_flight();

        // One set per slot: binding 0 uniform object, binding 1 texture
        let descriptor_set_layout = DescriptorSetLayout::new(device.clone(), &Binding::ALL)?;
        let descriptor_pool =
            DescriptorPool::new(device.clone(), &Binding::ALL, slot_count as u32)?;
        let descriptor_sets = descriptor_pool.allocate(&descriptor_set_layout, slot_count)?;

        let uniform = UniformObject::default();
        let uniforms = UniformSet::allocate(device.clone(), slot_count)?;

        let texture = Texture::white(device.clone(), &commands)?;
        let sampler = Sampler::linear_repeat(device.clone())?;

        for (set, buffer) in descriptor_sets.iter().zip(uniforms.iter()) {
            write_uniform_buffer(
                &device,
                *set,
                buffer.handle(),
                UniformObject::SIZE as vk::DeviceSize,
            );
            write_texture(&device, *set, texture.view(), sampler.handle());
        }
        debug!("Wrote {} descriptor set(s)", descriptor_sets.len());

        let pipeline_layout =
            PipelineLayout::new(device.clone(), &[descriptor_set_layout.handle()])?;
        let pipeline = Self::create_pipeline(
            &device,
            &pipeline_layout,
            frame_loop.backend(),
            config.vertex_shader.as_path(),
            config.fragment_shader.as_path(),
        )?;

        info!("Renderer initialized with {} frame slot(s)", slot_count);

        Ok(Self {
            pipeline,
            pipeline_layout,
            triangle: None,
            rectangle: None,
            texture,
            sampler,
            uniforms,
            descriptor_sets,
            descriptor_pool,
            descriptor_set_layout,
            frame_loop,
            commands,
            device,
            uniform,
            warnings: MissingGeometryWarnings::default(),
        })
    }

    /// Loads both shader stages and builds the pipeline for the backend's
    /// render pass and extent.
    fn create_pipeline(
        device: &Arc<Device>,
        layout: &PipelineLayout,
        backend: &VulkanFrameBackend,
        vertex_path: &Path,
        fragment_path: &Path,
    ) -> RendererResult<Pipeline> {
        let vertex_shader = Shader::new(
            device.clone(),
            ShaderStage::Vertex,
            &read_spirv_file(vertex_path)?,
        )?;
        let fragment_shader = Shader::new(
            device.clone(),
            ShaderStage::Fragment,
            &read_spirv_file(fragment_path)?,
        )?;

        let pipeline = PipelineBuilder::new(&vertex_shader, &fragment_shader, backend.extent())
            .build(device.clone(), layout, backend.render_pass())?;

        Ok(pipeline)
    }

    /// Writes `uniform` into every frame slot's uniform buffer.
    pub fn set_uniform_object(&mut self, uniform: UniformObject) -> RendererResult<()> {
        self.uniforms.update(&self.device, &uniform)?;
        self.uniform = uniform;
        debug!("Uniform object updated: opacity {}", uniform.opacity);
        Ok(())
    }

    /// The value last written by [`Renderer::set_uniform_object`].
    #[inline]
    pub fn uniform_object(&self) -> UniformObject {
        self.uniform
    }

    /// Uploads the triangle drawn by [`Renderer::draw_triangle`].
    pub fn set_triangle_geometry(&mut self, vertices: &[Vertex; 3]) -> RendererResult<()> {
        self.device.wait_idle()?;
        match &self.triangle {
            Some(triangle) => triangle.update(&self.commands, vertices)?,
            None => {
                self.triangle = Some(TriangleGeometry::new(
                    self.device.clone(),
                    &self.commands,
                    vertices,
                )?)
            }
        }
        Ok(())
    }

    /// Uploads the rectangle drawn by [`Renderer::draw_rectangle`].
    ///
    /// # Errors
    ///
    /// [`crate::RendererError::InvalidGeometry`] unless `indices` holds
    /// exactly six values below four.
    pub fn set_rectangle_geometry(
        &mut self,
        vertices: &[Vertex; 4],
        indices: &[u32],
    ) -> RendererResult<()> {
        crate::geometry::validate_rectangle_indices(indices)?;
        self.device.wait_idle()?;
        match &self.rectangle {
            Some(rectangle) => rectangle.update(&self.commands, vertices, indices)?,
            None => {
                self.rectangle = Some(RectangleGeometry::new(
                    self.device.clone(),
                    &self.commands,
                    vertices,
                    indices,
                )?)
            }
        }
        Ok(())
    }

    /// Decodes the image at `path` and binds it as the texture.
    pub fn set_texture(&mut self, path: &Path) -> RendererResult<()> {
        let image = RgbaImage::load(path)?;
        self.set_texture_image(&image)?;
        info!("Texture set from {}", path.display());
        Ok(())
    }

    /// Uploads `image` and rebinds every slot's descriptor set to it.
    pub fn set_texture_image(&mut self, image: &RgbaImage) -> RendererResult<()> {
        self.device.wait_idle()?;

        let texture = Texture::from_rgba(
            self.device.clone(),
            &self.commands,
            image.width(),
            image.height(),
            image.pixels(),
        )?;
        for &set in &self.descriptor_sets {
            write_texture(&self.device, set, texture.view(), self.sampler.handle());
        }
        // Old texture drops here, after no set references it
        self.texture = texture;
        Ok(())
    }

    /// Runs one frame that draws the triangle.
    ///
    /// Before [`Renderer::set_triangle_geometry`] the frame only clears.
    pub fn draw_triangle(&mut self) -> RendererResult<FrameIndices> {
        let vertex_buffer = self.triangle.as_ref().map(TriangleGeometry::vertex_buffer);
        if vertex_buffer.is_none() && !self.warnings.triangle {
            warn!("draw_triangle called before set_triangle_geometry; drawing nothing");
            self.warnings.triangle = true;
        }

        let pipeline = self.pipeline.handle();
        let layout = self.pipeline_layout.handle();
        let descriptor_sets = &self.descriptor_sets;

        let frame = self.frame_loop.run_frame(|cmd, frame| {
            let (Some(vertex_buffer), Some(&set)) =
                (vertex_buffer, descriptor_sets.get(frame.slot))
            else {
                return;
            };
            cmd.bind_pipeline(pipeline);
            cmd.bind_descriptor_set(layout, set);
            cmd.bind_vertex_buffer(vertex_buffer);
            cmd.draw(TRIANGLE_VERTEX_COUNT);
        })?;
        Ok(frame)
    }

    /// Runs one frame that draws the rectangle with indexed drawing.
    ///
    /// Before [`Renderer::set_rectangle_geometry`] the frame only clears.
    pub fn draw_rectangle(&mut self) -> RendererResult<FrameIndices> {
        let buffers = self
            .rectangle
            .as_ref()
            .map(|r| (r.vertex_buffer(), r.index_buffer()));
        if buffers.is_none() && !self.warnings.rectangle {
            warn!("draw_rectangle called before set_rectangle_geometry; drawing nothing");
            self.warnings.rectangle = true;
        }

        let pipeline = self.pipeline.handle();
        let layout = self.pipeline_layout.handle();
        let descriptor_sets = &self.descriptor_sets;

        let frame = self.frame_loop.run_frame(|cmd, frame| {
            let (Some((vertex_buffer, index_buffer)), Some(&set)) =
                (buffers, descriptor_sets.get(frame.slot))
            else {
                return;
            };
            cmd.bind_pipeline(pipeline);
            cmd.bind_descriptor_set(layout, set);
            cmd.bind_vertex_buffer(vertex_buffer);
            cmd.bind_index_buffer(index_buffer);
            cmd.draw_indexed(RECTANGLE_INDEX_COUNT);
        })?;
        Ok(frame)
    }

    /// Blocks until all submitted frames have retired.
    pub fn wait_idle(&self) -> RendererResult<()> {
        self.device.wait_idle()?;
        Ok(())
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.frame_loop.backend().extent()
    }

    #[inline]
    pub fn frames_in_flight(&self) -> usize {
        self.frame_loop.frames_in_flight()
    }

    /// Number of frames presented so far.
    #[inline]
    pub fn frames_presented(&self) -> u64 {
        self.frame_loop.frames_presented()
    }

    /// Size of the currently bound texture.
    #[inline]
    pub fn texture_extent(&self) -> vk::Extent2D {
        self.texture.extent()
    }

    /// Layout shared by every slot's descriptor set.
    #[inline]
    pub fn descriptor_set_layout(&self) -> vk::DescriptorSetLayout {
        self.descriptor_set_layout.handle()
    }

    /// Borrowed only, so no handle can outlive the engine's teardown order.
    #[inline]
    pub fn device(&self) -> &Device {
        &self.device
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        // Wait for all GPU work to complete before destroying resources
        if let Err(e) = self.device.wait_idle() {
            error!("Failed to wait for device idle during renderer drop: {}", e);
        }

        debug!(
            "Releasing {} descriptor set(s) from pool of {}",
            self.descriptor_sets.len(),
            self.descriptor_pool.capacity()
        );
        info!("Renderer destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_accessor_only_borrows() {
        // An owned Arc here would let callers keep the device past Engine drop
        let accessor: fn(&Renderer) -> &Device = Renderer::device;
        let _ = accessor;
    }
}
