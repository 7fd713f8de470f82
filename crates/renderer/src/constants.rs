//! Constant-buffer structs written every frame.
//!
//! These structures must match the shader uniform block layouts exactly.
//! All use `#[repr(C)]` for predictable memory layout and implement `Pod`
//! and `Zeroable` for safe byte casting into upload buffers. When placed
//! in a constant [`UploadBuffer`](glint_rhi::buffer::UploadBuffer), each
//! element is rounded up to the 256-byte stride boundary by that layer.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Per-object constants.
///
/// # Memory Layout
///
/// - Offset 0: combined world-view-projection matrix (64 bytes)
/// - Total size: 64 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct ObjectConstants {
    /// Object space straight to clip space.
    pub world_view_proj: Mat4,
}

impl ObjectConstants {
    /// Size of the struct in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Creates object constants from a world matrix and the camera's
    /// view-projection.
    #[inline]
    pub fn new(world: Mat4, view_proj: Mat4) -> Self {
        Self {
            world_view_proj: view_proj * world,
        }
    }

    /// Identity transform constants.
    #[inline]
    pub fn identity() -> Self {
        Self {
            world_view_proj: Mat4::IDENTITY,
        }
    }
}

/// Per-pass constants: camera matrices and frame timing.
///
/// # Memory Layout
///
/// - Offset 0: view matrix (64 bytes)
/// - Offset 64: projection matrix (64 bytes)
/// - Offset 128: viewProjection matrix (64 bytes)
/// - Offset 192: eye position (12 bytes) + padding (4 bytes)
/// - Offset 208: total time (4), delta time (4), padding (8)
/// - Total size: 224 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct PassConstants {
    /// View matrix (world to view space).
    pub view: Mat4,
    /// Projection matrix (view to clip space).
    pub proj: Mat4,
    /// Combined view-projection matrix.
    pub view_proj: Mat4,
    /// Camera world position.
    pub eye_position: Vec3,
    /// Padding for 16-byte alignment.
    pub _padding: f32,
    /// Seconds since the clock was reset, excluding paused time.
    pub total_time: f32,
    /// Seconds since the previous frame.
    pub delta_time: f32,
    /// Padding to a 16-byte multiple.
    pub _padding2: [f32; 2],
}

impl PassConstants {
    /// Size of the struct in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Creates pass constants from camera matrices and frame timing.
    pub fn new(view: Mat4, proj: Mat4, eye_position: Vec3, total_time: f32, delta_time: f32) -> Self {
        Self {
            view,
            proj,
            view_proj: proj * view,
            eye_position,
            _padding: 0.0,
            total_time,
            delta_time,
            _padding2: [0.0; 2],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_object_constants_size() {
        assert_eq!(ObjectConstants::SIZE, 64);
    }

    #[test]
    fn test_pass_constants_size() {
        // 3 Mat4 (192) + Vec3 + pad (16) + 2 floats + pad (16)
        assert_eq!(PassConstants::SIZE, 224);
    }

    #[test]
    fn test_constants_alignment() {
        assert_eq!(std::mem::align_of::<ObjectConstants>(), 16);
        assert_eq!(std::mem::align_of::<PassConstants>(), 16);
    }

    #[test]
    fn test_object_constants_combines_matrices() {
        let world = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let view_proj = Mat4::from_scale(Vec3::splat(2.0));

        let constants = ObjectConstants::new(world, view_proj);
        assert_eq!(constants.world_view_proj, view_proj * world);
    }

    #[test]
    fn test_pass_constants_view_proj() {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        let proj = Mat4::perspective_rh(45.0_f32.to_radians(), 16.0 / 9.0, 0.1, 100.0);

        let constants = PassConstants::new(view, proj, Vec3::new(0.0, 0.0, 5.0), 1.0, 0.016);
        assert_eq!(constants.view_proj, proj * view);
        assert_eq!(constants.total_time, 1.0);
    }

    #[test]
    fn test_constants_pod_round_trip() {
        let original = ObjectConstants::new(
            Mat4::from_rotation_y(0.5),
            Mat4::perspective_rh(1.0, 1.5, 0.1, 100.0),
        );

        let bytes: &[u8] = bytemuck::bytes_of(&original);
        assert_eq!(bytes.len(), ObjectConstants::SIZE);

        let restored: ObjectConstants = *bytemuck::from_bytes(bytes);
        assert_eq!(restored.world_view_proj, original.world_view_proj);
    }
}
