//! Vertex format and input description.
//!
//! The engine draws flat 2D geometry, so a vertex is a single clip-space
//! position. Rectangles use 32-bit indices.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::Vec2;

/// 2D vertex in clip space.
///
/// # Memory Layout
///
/// - Offset 0: position (8 bytes)
/// - Total size: 8 bytes
///
/// # Shader Locations
///
/// - location 0: position (vec2)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Clip-space position.
    pub position: Vec2,
}

impl Vertex {
    /// Creates a vertex at `(x, y)`.
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self {
            position: Vec2::new(x, y),
        }
    }

    /// Returns the size of the vertex in bytes.
    #[inline]
    pub const fn size() -> usize {
        std::mem::size_of::<Self>()
    }

    /// Get the vertex input binding description.
    ///
    /// Returns a binding description for binding 0 with per-vertex input rate.
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Self>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Get the vertex attribute descriptions.
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 1] {
        [vk::VertexInputAttributeDescription {
            binding: 0,
            location: 0,
            format: vk::Format::R32G32_SFLOAT,
            offset: std::mem::offset_of!(Vertex, position) as u32,
        }]
    }
}

impl From<Vec2> for Vertex {
    fn from(position: Vec2) -> Self {
        Self { position }
    }
}

impl From<[f32; 2]> for Vertex {
    fn from([x, y]: [f32; 2]) -> Self {
        Self::new(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_size() {
        assert_eq!(std::mem::size_of::<Vertex>(), 8);
        assert_eq!(Vertex::size(), 8);
    }

    #[test]
    fn test_vertex_binding_description() {
        let binding = Vertex::binding_description();
        assert_eq!(binding.binding, 0);
        assert_eq!(binding.stride, 8);
        assert_eq!(binding.input_rate, vk::VertexInputRate::VERTEX);
    }

    #[test]
    fn test_vertex_attribute_descriptions() {
        let attrs = Vertex::attribute_descriptions();
        assert_eq!(attrs[0].binding, 0);
        assert_eq!(attrs[0].location, 0);
        assert_eq!(attrs[0].format, vk::Format::R32G32_SFLOAT);
        assert_eq!(attrs[0].offset, 0);
    }

    #[test]
    fn test_vertex_bytes_are_tightly_packed() {
        let vertices = [Vertex::new(-0.5, -0.5), Vertex::from([0.5, 0.5])];
        let bytes: &[u8] = bytemuck::cast_slice(&vertices);
        assert_eq!(bytes.len(), 16);

        let back: &[f32] = bytemuck::cast_slice(bytes);
        assert_eq!(back, &[-0.5, -0.5, 0.5, 0.5]);
    }
}
