//! Vertex formats and input descriptions.
//!
//! The cube geometry arrives in two parallel streams - positions and
//! colors in separate GPU buffers - so the pipeline declares two vertex
//! input bindings, one per stream. Keeping the streams separate lets a
//! mesh swap its color data without touching position bytes.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};

/// Position stream element: binding 0, shader location 0.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct PositionVertex {
    /// 3D position in object space.
    pub position: Vec3,
}

impl PositionVertex {
    /// Creates a new position vertex.
    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            position: Vec3::new(x, y, z),
        }
    }
}

/// Color stream element: binding 1, shader location 1.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct ColorVertex {
    /// RGBA color.
    pub color: Vec4,
}

impl ColorVertex {
    /// Creates a new color vertex.
    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self {
            color: Vec4::new(r, g, b, a),
        }
    }
}

/// Vertex input bindings for the dual-stream layout.
///
/// Binding 0 carries positions, binding 1 carries colors; both advance
/// per vertex.
pub fn dual_stream_bindings() -> [vk::VertexInputBindingDescription; 2] {
    [
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<PositionVertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        },
        vk::VertexInputBindingDescription {
            binding: 1,
            stride: std::mem::size_of::<ColorVertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        },
    ]
}

/// Vertex attributes for the dual-stream layout.
pub fn dual_stream_attributes() -> [vk::VertexInputAttributeDescription; 2] {
    [
        // Position at location 0, from binding 0
        vk::VertexInputAttributeDescription {
            binding: 0,
            location: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: 0,
        },
        // Color at location 1, from binding 1
        vk::VertexInputAttributeDescription {
            binding: 1,
            location: 1,
            format: vk::Format::R32G32B32A32_SFLOAT,
            offset: 0,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_strides() {
        assert_eq!(std::mem::size_of::<PositionVertex>(), 12);
        assert_eq!(std::mem::size_of::<ColorVertex>(), 16);

        let bindings = dual_stream_bindings();
        assert_eq!(bindings[0].stride, 12);
        assert_eq!(bindings[1].stride, 16);
    }

    #[test]
    fn test_streams_use_distinct_bindings() {
        let bindings = dual_stream_bindings();
        assert_eq!(bindings[0].binding, 0);
        assert_eq!(bindings[1].binding, 1);

        let attributes = dual_stream_attributes();
        assert_eq!(attributes[0].binding, 0);
        assert_eq!(attributes[1].binding, 1);
        assert_eq!(attributes[0].location, 0);
        assert_eq!(attributes[1].location, 1);
    }

    #[test]
    fn test_vertices_are_pod() {
        let pos = PositionVertex::new(1.0, 2.0, 3.0);
        let bytes: &[u8] = bytemuck::bytes_of(&pos);
        assert_eq!(bytes.len(), 12);

        let color = ColorVertex::new(1.0, 0.0, 0.0, 1.0);
        let bytes: &[u8] = bytemuck::bytes_of(&color);
        assert_eq!(bytes.len(), 16);
    }
}
