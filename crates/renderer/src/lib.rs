//! Frame lifecycle orchestration.
//!
//! This crate owns the application shell: initialization order, the
//! per-frame record/submit/present/flush cycle, resize handling, and the
//! callback trait concrete applications implement. It also provides the
//! GPU-side building blocks the shell's applications consume: the depth
//! buffer, mesh geometry with submesh addressing, and the constant
//! structs written every frame.

pub mod constants;
pub mod depth_buffer;
pub mod frame_resources;
pub mod mesh;
pub mod shell;

pub use constants::{ObjectConstants, PassConstants};
pub use depth_buffer::{DEFAULT_DEPTH_FORMAT, DepthBuffer};
pub use frame_resources::FrameResources;
pub use mesh::{IndexData, MeshGeometry, Submesh, VertexStreamDesc};
pub use shell::{FrameContext, Shell, ShellApp};
