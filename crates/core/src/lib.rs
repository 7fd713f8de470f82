//! Core utilities for the glint renderer.
//!
//! This crate provides foundational types used across the workspace:
//! - Error types and result aliases
//! - Logging initialization
//! - The pausable frame clock driving the render loop

mod error;
mod logging;
mod timer;

pub use error::{Error, Result};
pub use logging::init_logging;
pub use timer::FrameClock;
