//! Platform abstraction layer for the glint renderer.
//!
//! This crate provides platform-specific functionality:
//! - Window management via winit
//! - Vulkan surface creation through raw window handles
//! - Mouse input tracking for camera controls

mod input;
mod window;

pub use input::{MouseButton, MouseState};
pub use window::{Surface, Window, required_surface_extensions};
