//! Triangle and rectangle geometry held in device-local buffers.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use toy2d_rhi::buffer::BufferUsage;
use toy2d_rhi::command_manager::CommandManager;
use toy2d_rhi::device::Device;
use toy2d_rhi::transfer::StagedBuffer;
use toy2d_rhi::vertex::Vertex;

use crate::error::{RendererError, RendererResult};

/// Vertices drawn by a triangle.
pub const TRIANGLE_VERTEX_COUNT: u32 = 3;

/// Corners of a rectangle.
pub const RECTANGLE_VERTEX_COUNT: u32 = 4;

/// Indices drawn by a rectangle: two triangles.
pub const RECTANGLE_INDEX_COUNT: u32 = 6;

/// Indices splitting the quad `[v0, v1, v2, v3]` along the v0-v2 diagonal.
pub const RECTANGLE_INDICES: [u32; 6] = [0, 1, 2, 2, 3, 0];

/// Checks that `indices` describe two triangles over four corners.
///
/// # Errors
///
/// Returns [`RendererError::InvalidGeometry`] unless there are exactly six
/// indices, each below four.
pub fn validate_rectangle_indices(indices: &[u32]) -> RendererResult<()> {
    if indices.len() != RECTANGLE_INDEX_COUNT as usize {
        return Err(RendererError::InvalidGeometry(format!(
            "a rectangle needs {} indices, got {}",
            RECTANGLE_INDEX_COUNT,
            indices.len()
        )));
    }

    if let Some(&bad) = indices.iter().find(|&&i| i >= RECTANGLE_VERTEX_COUNT) {
        return Err(RendererError::InvalidGeometry(format!(
            "rectangle index {} out of range (0..{})",
            bad, RECTANGLE_VERTEX_COUNT
        )));
    }

    Ok(())
}

/// Three vertices in a device-local vertex buffer.
pub struct TriangleGeometry {
    vertices: StagedBuffer,
}

impl TriangleGeometry {
    pub fn new(
        device: Arc<Device>,
        commands: &CommandManager,
        vertices: &[Vertex; 3],
    ) -> RendererResult<Self> {
        let vertices = StagedBuffer::with_data(
            device,
            commands,
            BufferUsage::Vertex,
            bytemuck::cast_slice(vertices),
        )?;
        debug!("Triangle geometry uploaded");
        Ok(Self { vertices })
    }

    /// Replaces the vertices in place. No frame may be reading them.
    pub fn update(&self, commands: &CommandManager, vertices: &[Vertex; 3]) -> RendererResult<()> {
        self.vertices
            .upload(commands, bytemuck::cast_slice(vertices))?;
        Ok(())
    }

    #[inline]
    pub fn vertex_buffer(&self) -> vk::Buffer {
        self.vertices.device_local().handle()
    }
}

/// Four corners plus six 32-bit indices, both device-local.
pub struct RectangleGeometry {
    vertices: StagedBuffer,
    indices: StagedBuffer,
}

impl RectangleGeometry {
    pub fn new(
        device: Arc<Device>,
        commands: &CommandManager,
        vertices: &[Vertex; 4],
        indices: &[u32],
    ) -> RendererResult<Self> {
        validate_rectangle_indices(indices)?;

        let vertex_buffer = StagedBuffer::with_data(
            device.clone(),
            commands,
            BufferUsage::Vertex,
            bytemuck::cast_slice(vertices),
        )?;
        let index_buffer = StagedBuffer::with_data(
            device,
            commands,
            BufferUsage::Index,
            bytemuck::cast_slice(indices),
        )?;

        debug!("Rectangle geometry uploaded");
        Ok(Self {
            vertices: vertex_buffer,
            indices: index_buffer,
        })
    }

    /// Replaces vertices and indices in place. No frame may be reading them.
    pub fn update(
        &self,
        commands: &CommandManager,
        vertices: &[Vertex; 4],
        indices: &[u32],
    ) -> RendererResult<()> {
        validate_rectangle_indices(indices)?;
        self.vertices
            .upload(commands, bytemuck::cast_slice(vertices))?;
        self.indices.upload(commands, bytemuck::cast_slice(indices))?;
        Ok(())
    }

    #[inline]
    pub fn vertex_buffer(&self) -> vk::Buffer {
        self.vertices.device_local().handle()
    }

    #[inline]
    pub fn index_buffer(&self) -> vk::Buffer {
        self.indices.device_local().handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rectangle_indices_are_valid() {
        assert!(validate_rectangle_indices(&RECTANGLE_INDICES).is_ok());
    }

    #[test]
    fn test_rectangle_index_count_is_checked() {
        let err = validate_rectangle_indices(&[0, 1, 2]).unwrap_err();
        assert!(matches!(err, RendererError::InvalidGeometry(_)));

        let err = validate_rectangle_indices(&[0, 1, 2, 2, 3, 0, 1]).unwrap_err();
        assert!(matches!(err, RendererError::InvalidGeometry(_)));
    }

    #[test]
    fn test_rectangle_index_range_is_checked() {
        let err = validate_rectangle_indices(&[0, 1, 2, 2, 4, 0]).unwrap_err();
        assert!(err.to_string().contains("index 4"));
    }

    #[test]
    fn test_rectangle_indices_cover_quad_once() {
        // Both triangles share the v0-v2 diagonal and nothing else
        let (first, second) = RECTANGLE_INDICES.split_at(3);
        let shared: Vec<u32> = first
            .iter()
            .copied()
            .filter(|i| second.contains(i))
            .collect();
        assert_eq!(shared, vec![0, 2]);

        let mut all: Vec<u32> = RECTANGLE_INDICES.to_vec();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all, vec![0, 1, 2, 3]);
    }
}
