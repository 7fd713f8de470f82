//! The colored-cube demo application.
//!
//! Eight corner vertices in two parallel streams (positions and colors),
//! thirty-six 16-bit indices, one submesh, and an orbit camera steered by
//! mouse drag. Constant data flows through two upload-buffer slots: pass
//! constants (camera matrices and timing) and object constants (the
//! cube's combined world-view-projection).

use std::path::Path;

use glam::Mat4;
use tracing::{error, info};

use glint_platform::MouseButton;
use glint_renderer::constants::{ObjectConstants, PassConstants};
use glint_renderer::mesh::{IndexData, MeshGeometry, Submesh, VertexStreamDesc};
use glint_renderer::shell::{FrameContext, Shell, ShellApp};
use glint_rhi::RhiResult;
use glint_rhi::buffer::UploadBuffer;
use glint_rhi::descriptor::{
    DescriptorPool, DescriptorSetLayout, uniform_buffer_binding, write_uniform_buffer,
};
use glint_rhi::pipeline::{GraphicsPipelineBuilder, Pipeline, PipelineLayout};
use glint_rhi::shader::{Shader, ShaderStage};
use glint_rhi::vertex::{
    ColorVertex, PositionVertex, dual_stream_attributes, dual_stream_bindings,
};
use glint_rhi::vk;
use glint_scene::OrbitCamera;

/// Corner positions of a unit-radius cube centered at the origin.
const CUBE_POSITIONS: [PositionVertex; 8] = [
    PositionVertex::new(-1.0, -1.0, -1.0),
    PositionVertex::new(-1.0, 1.0, -1.0),
    PositionVertex::new(1.0, 1.0, -1.0),
    PositionVertex::new(1.0, -1.0, -1.0),
    PositionVertex::new(-1.0, -1.0, 1.0),
    PositionVertex::new(-1.0, 1.0, 1.0),
    PositionVertex::new(1.0, 1.0, 1.0),
    PositionVertex::new(1.0, -1.0, 1.0),
];

/// One color per corner, in the same order as the position stream.
const CUBE_COLORS: [ColorVertex; 8] = [
    ColorVertex::new(1.0, 1.0, 1.0, 1.0), // white
    ColorVertex::new(0.0, 0.0, 0.0, 1.0), // black
    ColorVertex::new(1.0, 0.0, 0.0, 1.0), // red
    ColorVertex::new(0.0, 1.0, 0.0, 1.0), // green
    ColorVertex::new(0.0, 0.0, 1.0, 1.0), // blue
    ColorVertex::new(1.0, 1.0, 0.0, 1.0), // yellow
    ColorVertex::new(0.0, 1.0, 1.0, 1.0), // cyan
    ColorVertex::new(1.0, 0.0, 1.0, 1.0), // magenta
];

/// Twelve triangles, two per face. Small enough for 16-bit indices.
const CUBE_INDICES: [u16; 36] = [
    // front
    0, 1, 2, 0, 2, 3,
    // back
    4, 6, 5, 4, 7, 6,
    // left
    4, 5, 1, 4, 1, 0,
    // right
    3, 2, 6, 3, 6, 7,
    // top
    1, 5, 6, 1, 6, 2,
    // bottom
    4, 0, 3, 4, 3, 7,
];

/// GPU resources built during setup.
struct GpuResources {
    pipeline: Pipeline,
    pipeline_layout: PipelineLayout,
    descriptor_set: vk::DescriptorSet,
    // Keep-alive owners: the set above stays valid as long as these live
    _descriptor_pool: DescriptorPool,
    _descriptor_set_layout: DescriptorSetLayout,
    pass_constants: UploadBuffer<PassConstants>,
    object_constants: UploadBuffer<ObjectConstants>,
    mesh: MeshGeometry,
}

/// The demo application: one cube, one orbit camera.
pub struct CubeDemo {
    camera: OrbitCamera,
    world: Mat4,
    left_held: bool,
    right_held: bool,
    gpu: Option<GpuResources>,
}

impl CubeDemo {
    /// Creates the demo in its pre-setup state.
    pub fn new() -> Self {
        Self {
            camera: OrbitCamera::new(5.0, 1.0),
            world: Mat4::IDENTITY,
            left_held: false,
            right_held: false,
            gpu: None,
        }
    }
}

impl Default for CubeDemo {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellApp for CubeDemo {
    fn setup(&mut self, shell: &mut Shell) -> RhiResult<()> {
        let device = shell.device().clone();
        self.camera.set_aspect(shell.aspect_ratio());

        // Upload the cube through staging; the shell flushes before the
        // staging buffers are released
        let cmd = shell.begin_upload()?;
        let mut mesh = MeshGeometry::new(
            device.clone(),
            cmd,
            "box",
            &[
                VertexStreamDesc {
                    data: bytemuck::cast_slice(&CUBE_POSITIONS),
                    stride: std::mem::size_of::<PositionVertex>() as u32,
                },
                VertexStreamDesc {
                    data: bytemuck::cast_slice(&CUBE_COLORS),
                    stride: std::mem::size_of::<ColorVertex>() as u32,
                },
            ],
            IndexData::U16(&CUBE_INDICES),
        )?;
        mesh.add_submesh("box", Submesh::new(CUBE_INDICES.len() as u32, 0, 0));

        shell.finish_upload()?;
        mesh.dispose_uploaders();

        // One constant slot each for the pass and the cube
        let pass_constants: UploadBuffer<PassConstants> =
            UploadBuffer::new(device.clone(), 1, true)?;
        let object_constants: UploadBuffer<ObjectConstants> =
            UploadBuffer::new(device.clone(), 1, true)?;

        let bindings = [uniform_buffer_binding(0), uniform_buffer_binding(1)];
        let descriptor_set_layout = DescriptorSetLayout::new(device.clone(), &bindings)?;
        let descriptor_pool = DescriptorPool::new(device.clone(), 1, 2)?;
        let descriptor_set = descriptor_pool.allocate(&descriptor_set_layout)?;

        write_uniform_buffer(
            &device,
            descriptor_set,
            0,
            pass_constants.handle(),
            0,
            PassConstants::SIZE as vk::DeviceSize,
        );
        write_uniform_buffer(
            &device,
            descriptor_set,
            1,
            object_constants.handle(),
            0,
            ObjectConstants::SIZE as vk::DeviceSize,
        );

        // Opaque compiled-shader blobs from disk
        let vertex_shader = Shader::from_spirv_file(
            device.clone(),
            Path::new("shaders/cube.vert.spv"),
            ShaderStage::Vertex,
        )?;
        let fragment_shader = Shader::from_spirv_file(
            device.clone(),
            Path::new("shaders/cube.frag.spv"),
            ShaderStage::Fragment,
        )?;

        let pipeline_layout =
            PipelineLayout::new(device.clone(), &[descriptor_set_layout.handle()])?;

        let pipeline = GraphicsPipelineBuilder::new()
            .vertex_shader(&vertex_shader)
            .fragment_shader(&fragment_shader)
            .vertex_bindings(&dual_stream_bindings())
            .vertex_attributes(&dual_stream_attributes())
            // A single closed cube never shows its inside
            .cull_mode(vk::CullModeFlags::NONE)
            .color_format(shell.back_buffer_format())
            .depth_format(shell.depth_format())
            .build(device, &pipeline_layout)?;

        self.gpu = Some(GpuResources {
            pipeline,
            pipeline_layout,
            descriptor_set,
            _descriptor_pool: descriptor_pool,
            _descriptor_set_layout: descriptor_set_layout,
            pass_constants,
            object_constants,
            mesh,
        });

        info!("Cube demo resources created");
        Ok(())
    }

    fn update(&mut self, delta_time: f32, total_time: f32) {
        let Some(gpu) = &self.gpu else {
            return;
        };

        // The previous frame's flush guarantees the GPU is done reading
        // these slots
        let pass = PassConstants::new(
            self.camera.view(),
            self.camera.projection(),
            self.camera.position(),
            total_time,
            delta_time,
        );
        let object = ObjectConstants::new(self.world, self.camera.view_projection());

        if let Err(e) = gpu.pass_constants.copy_data(0, &pass) {
            error!("Pass constant write failed: {:?}", e);
        }
        if let Err(e) = gpu.object_constants.copy_data(0, &object) {
            error!("Object constant write failed: {:?}", e);
        }
    }

    fn draw(&mut self, frame: &FrameContext<'_>) -> RhiResult<()> {
        let Some(gpu) = &self.gpu else {
            return Ok(());
        };

        let cmd = frame.cmd();
        cmd.bind_graphics_pipeline(gpu.pipeline.handle());
        cmd.bind_descriptor_sets(
            gpu.pipeline_layout.handle(),
            0,
            &[gpu.descriptor_set],
            &[],
        );
        gpu.mesh.record_draw(cmd, "box");

        Ok(())
    }

    fn on_resize(&mut self, width: u32, height: u32) {
        if height > 0 {
            self.camera.set_aspect(width as f32 / height as f32);
        }
    }

    fn on_mouse_down(&mut self, button: MouseButton, _x: f32, _y: f32) {
        match button {
            MouseButton::Left => self.left_held = true,
            MouseButton::Right => self.right_held = true,
            MouseButton::Middle => {}
        }
    }

    fn on_mouse_up(&mut self, button: MouseButton, _x: f32, _y: f32) {
        match button {
            MouseButton::Left => self.left_held = false,
            MouseButton::Right => self.right_held = false,
            MouseButton::Middle => {}
        }
    }

    fn on_mouse_move(&mut self, _x: f32, _y: f32, dx: f32, dy: f32) {
        if self.left_held {
            self.camera.rotate(dx, dy);
        } else if self.right_held {
            self.camera.zoom(dx - dy);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_tables_are_consistent() {
        assert_eq!(CUBE_POSITIONS.len(), CUBE_COLORS.len());
        assert_eq!(CUBE_INDICES.len(), 36);

        // Every index addresses a corner
        assert!(
            CUBE_INDICES
                .iter()
                .all(|&i| (i as usize) < CUBE_POSITIONS.len())
        );
    }

    #[test]
    fn test_cube_submesh_covers_all_indices() {
        let submesh = Submesh::new(CUBE_INDICES.len() as u32, 0, 0);
        let indices: Vec<u32> = CUBE_INDICES.iter().map(|&i| u32::from(i)).collect();

        let resolved = submesh.resolve_indices(&indices);
        assert_eq!(resolved.len(), 36);

        // All eight corners are referenced
        let mut seen = [false; 8];
        for &v in &resolved {
            seen[v as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_mouse_buttons_gate_camera_motion() {
        let mut demo = CubeDemo::new();
        let before = demo.camera.position();

        // No button held: the camera stays put
        demo.on_mouse_move(10.0, 10.0, 5.0, 5.0);
        assert_eq!(demo.camera.position(), before);

        demo.on_mouse_down(MouseButton::Left, 10.0, 10.0);
        demo.on_mouse_move(15.0, 15.0, 5.0, 5.0);
        assert_ne!(demo.camera.position(), before);

        demo.on_mouse_up(MouseButton::Left, 15.0, 15.0);
        assert!(!demo.left_held);
    }
}
