//! Orbit camera.
//!
//! The camera sits on a sphere around the origin, described by spherical
//! coordinates: `radius` (distance), `theta` (azimuth around Y), `phi`
//! (polar angle from +Y). Left-drag rotates at a quarter degree per
//! pixel; right-drag zooms. Phi is clamped away from the poles so the
//! view basis never degenerates, and radius is clamped to a sane range.

use glam::{Mat4, Vec3};

/// Rotation applied per pixel of left-drag, in radians.
const RADIANS_PER_PIXEL: f32 = 0.25_f32 * std::f32::consts::PI / 180.0;

/// Zoom applied per pixel of right-drag, in world units.
const ZOOM_PER_PIXEL: f32 = 0.005;

/// Camera orbiting the origin on a spherical track.
#[derive(Clone, Copy, Debug)]
pub struct OrbitCamera {
    /// Distance from the origin.
    radius: f32,
    /// Azimuth angle around +Y, in radians.
    theta: f32,
    /// Polar angle from +Y, in radians, clamped to (0.1, pi - 0.1).
    phi: f32,
    /// Closest allowed radius.
    min_radius: f32,
    /// Farthest allowed radius.
    max_radius: f32,
    /// Width over height of the viewport.
    aspect: f32,
    /// Vertical field of view, in radians.
    fov_y: f32,
    /// Near clip distance.
    z_near: f32,
    /// Far clip distance.
    z_far: f32,
}

impl OrbitCamera {
    /// Creates a camera at the given distance with a quarter-pi vertical
    /// field of view.
    pub fn new(radius: f32, aspect: f32) -> Self {
        Self {
            radius,
            theta: 1.5 * std::f32::consts::PI,
            phi: std::f32::consts::FRAC_PI_4,
            min_radius: 3.0,
            max_radius: 15.0,
            aspect,
            fov_y: std::f32::consts::FRAC_PI_4,
            z_near: 0.1,
            z_far: 1000.0,
        }
    }

    /// Updates the viewport aspect ratio (call on resize).
    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    /// Rotates the orbit by a mouse-drag delta in pixels.
    pub fn rotate(&mut self, dx_pixels: f32, dy_pixels: f32) {
        self.theta += dx_pixels * RADIANS_PER_PIXEL;
        self.phi += dy_pixels * RADIANS_PER_PIXEL;
        // Keep the camera off the poles
        self.phi = self.phi.clamp(0.1, std::f32::consts::PI - 0.1);
    }

    /// Zooms by a mouse-drag delta in pixels.
    pub fn zoom(&mut self, d_pixels: f32) {
        self.radius += d_pixels * ZOOM_PER_PIXEL;
        self.radius = self.radius.clamp(self.min_radius, self.max_radius);
    }

    /// Camera position in world space (spherical to cartesian).
    pub fn position(&self) -> Vec3 {
        Vec3::new(
            self.radius * self.phi.sin() * self.theta.cos(),
            self.radius * self.phi.cos(),
            self.radius * self.phi.sin() * self.theta.sin(),
        )
    }

    /// View matrix looking at the origin.
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), Vec3::ZERO, Vec3::Y)
    }

    /// Projection matrix (zero-to-one depth range).
    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.z_near, self.z_far)
    }

    /// Combined view-projection matrix.
    pub fn view_projection(&self) -> Mat4 {
        self.projection() * self.view()
    }

    /// Current orbit radius.
    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_position_on_sphere() {
        let camera = OrbitCamera::new(5.0, 16.0 / 9.0);
        let position = camera.position();
        assert!(approx_eq(position.length(), 5.0));
    }

    #[test]
    fn test_position_at_known_angles() {
        let mut camera = OrbitCamera::new(2.0, 1.0);
        // Point straight along +X: phi = pi/2, theta = 0
        camera.phi = std::f32::consts::FRAC_PI_2;
        camera.theta = 0.0;

        let position = camera.position();
        assert!(approx_eq(position.x, 2.0));
        assert!(approx_eq(position.y, 0.0));
        assert!(approx_eq(position.z, 0.0));
    }

    #[test]
    fn test_rotate_clamps_phi() {
        let mut camera = OrbitCamera::new(5.0, 1.0);
        // Drag far past the pole
        camera.rotate(0.0, -100000.0);
        assert!(camera.phi >= 0.1);

        camera.rotate(0.0, 100000.0);
        assert!(camera.phi <= std::f32::consts::PI - 0.1);
    }

    #[test]
    fn test_zoom_clamps_radius() {
        let mut camera = OrbitCamera::new(5.0, 1.0);
        camera.zoom(-100000.0);
        assert_eq!(camera.radius(), 3.0);

        camera.zoom(100000.0);
        assert_eq!(camera.radius(), 15.0);
    }

    #[test]
    fn test_view_keeps_origin_centered() {
        let camera = OrbitCamera::new(5.0, 1.0);
        let origin_in_view = camera.view().transform_point3(Vec3::ZERO);
        // The origin sits straight ahead at the orbit distance
        assert!(approx_eq(origin_in_view.x, 0.0));
        assert!(approx_eq(origin_in_view.y, 0.0));
        assert!(approx_eq(origin_in_view.z, -5.0));
    }
}
