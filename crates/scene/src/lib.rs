//! Scene-side types for the glint renderer.
//!
//! Currently just the orbit camera the demo applications steer with the
//! mouse.

mod camera;

pub use camera::OrbitCamera;
