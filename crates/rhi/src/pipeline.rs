//! Graphics pipeline creation.
//!
//! One pipeline draws everything in this renderer, so the builder covers
//! exactly what that pipeline needs: two shader stages, vertex input,
//! depth test configuration, and the attachment formats dynamic rendering
//! wants declared up front. Viewport and scissor are dynamic state set at
//! record time.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use glint_rhi::device::Device;
//! use glint_rhi::pipeline::{GraphicsPipelineBuilder, PipelineLayout};
//! use glint_rhi::shader::Shader;
//! use glint_rhi::vertex::{dual_stream_attributes, dual_stream_bindings};
//! use ash::vk;
//!
//! # fn example(
//! #     device: Arc<Device>,
//! #     vs: &Shader,
//! #     fs: &Shader,
//! #     layout: &PipelineLayout,
//! # ) -> Result<(), glint_rhi::RhiError> {
//! let pipeline = GraphicsPipelineBuilder::new()
//!     .vertex_shader(vs)
//!     .fragment_shader(fs)
//!     .vertex_bindings(&dual_stream_bindings())
//!     .vertex_attributes(&dual_stream_attributes())
//!     .color_format(vk::Format::B8G8R8A8_UNORM)
//!     .depth_format(vk::Format::D32_SFLOAT)
//!     .build(device, layout)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::shader::Shader;

/// Pipeline layout wrapper.
pub struct PipelineLayout {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan layout handle.
    layout: vk::PipelineLayout,
}

impl PipelineLayout {
    /// Creates a pipeline layout over the given descriptor set layouts.
    ///
    /// # Errors
    ///
    /// Returns an error if layout creation fails.
    pub fn new(device: Arc<Device>, set_layouts: &[vk::DescriptorSetLayout]) -> RhiResult<Self> {
        let create_info = vk::PipelineLayoutCreateInfo::default().set_layouts(set_layouts);

        let layout = unsafe { device.handle().create_pipeline_layout(&create_info, None)? };

        debug!(
            "Created pipeline layout with {} set layout(s)",
            set_layouts.len()
        );

        Ok(Self { device, layout })
    }

    /// Returns the Vulkan layout handle.
    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_pipeline_layout(self.layout, None);
        }
        debug!("Destroyed pipeline layout");
    }
}

/// Graphics pipeline wrapper.
pub struct Pipeline {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan pipeline handle.
    pipeline: vk::Pipeline,
}

impl Pipeline {
    /// Returns the Vulkan pipeline handle.
    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_pipeline(self.pipeline, None);
        }
        debug!("Destroyed graphics pipeline");
    }
}

/// Builder for the renderer's graphics pipeline.
///
/// Defaults: triangle list, filled polygons, back-face culling with
/// counter-clockwise front faces, depth test and write enabled with
/// LESS comparison.
pub struct GraphicsPipelineBuilder<'a> {
    vertex_shader: Option<&'a Shader>,
    fragment_shader: Option<&'a Shader>,
    vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    cull_mode: vk::CullModeFlags,
    front_face: vk::FrontFace,
    depth_test: bool,
    depth_write: bool,
    color_format: vk::Format,
    depth_format: vk::Format,
}

impl<'a> GraphicsPipelineBuilder<'a> {
    /// Creates a builder with the renderer's defaults.
    pub fn new() -> Self {
        Self {
            vertex_shader: None,
            fragment_shader: None,
            vertex_bindings: Vec::new(),
            vertex_attributes: Vec::new(),
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            depth_test: true,
            depth_write: true,
            color_format: vk::Format::UNDEFINED,
            depth_format: vk::Format::UNDEFINED,
        }
    }

    /// Sets the vertex shader.
    pub fn vertex_shader(mut self, shader: &'a Shader) -> Self {
        self.vertex_shader = Some(shader);
        self
    }

    /// Sets the fragment shader.
    pub fn fragment_shader(mut self, shader: &'a Shader) -> Self {
        self.fragment_shader = Some(shader);
        self
    }

    /// Sets the vertex input bindings.
    pub fn vertex_bindings(mut self, bindings: &[vk::VertexInputBindingDescription]) -> Self {
        self.vertex_bindings = bindings.to_vec();
        self
    }

    /// Sets the vertex attributes.
    pub fn vertex_attributes(mut self, attributes: &[vk::VertexInputAttributeDescription]) -> Self {
        self.vertex_attributes = attributes.to_vec();
        self
    }

    /// Sets the cull mode.
    pub fn cull_mode(mut self, mode: vk::CullModeFlags) -> Self {
        self.cull_mode = mode;
        self
    }

    /// Sets which winding is front-facing.
    pub fn front_face(mut self, front_face: vk::FrontFace) -> Self {
        self.front_face = front_face;
        self
    }

    /// Enables or disables the depth test and depth writes together.
    pub fn depth(mut self, test: bool, write: bool) -> Self {
        self.depth_test = test;
        self.depth_write = write;
        self
    }

    /// Sets the color attachment format (required for dynamic rendering).
    pub fn color_format(mut self, format: vk::Format) -> Self {
        self.color_format = format;
        self
    }

    /// Sets the depth attachment format (required for dynamic rendering).
    pub fn depth_format(mut self, format: vk::Format) -> Self {
        self.depth_format = format;
        self
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if shaders or attachment formats are missing, or
    /// pipeline creation fails.
    pub fn build(self, device: Arc<Device>, layout: &PipelineLayout) -> RhiResult<Pipeline> {
        let vertex_shader = self
            .vertex_shader
            .ok_or_else(|| RhiError::PipelineError("Vertex shader not set".to_string()))?;
        let fragment_shader = self
            .fragment_shader
            .ok_or_else(|| RhiError::PipelineError("Fragment shader not set".to_string()))?;

        if self.color_format == vk::Format::UNDEFINED {
            return Err(RhiError::PipelineError(
                "Color attachment format not set".to_string(),
            ));
        }

        let stages = [
            vertex_shader.stage_create_info(),
            fragment_shader.stage_create_info(),
        ];

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&self.vertex_bindings)
            .vertex_attribute_descriptions(&self.vertex_attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST);

        // Viewport and scissor are dynamic; only the counts matter here
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(self.cull_mode)
            .front_face(self.front_face)
            .line_width(1.0);

        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(self.depth_test)
            .depth_write_enable(self.depth_write)
            .depth_compare_op(vk::CompareOp::LESS);

        let color_attachment = vk::PipelineColorBlendAttachmentState::default()
            .blend_enable(false)
            .color_write_mask(vk::ColorComponentFlags::RGBA);

        let color_blend = vk::PipelineColorBlendStateCreateInfo::default()
            .attachments(std::slice::from_ref(&color_attachment));

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let color_formats = [self.color_format];
        let mut rendering_info = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(&color_formats)
            .depth_attachment_format(self.depth_format);

        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic_state)
            .layout(layout.handle())
            .push_next(&mut rendering_info);

        let pipelines = unsafe {
            device
                .handle()
                .create_graphics_pipelines(
                    vk::PipelineCache::null(),
                    std::slice::from_ref(&create_info),
                    None,
                )
                .map_err(|(_, e)| RhiError::VulkanError(e))?
        };

        info!("Graphics pipeline created");

        Ok(Pipeline {
            device,
            pipeline: pipelines[0],
        })
    }
}

impl Default for GraphicsPipelineBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let builder = GraphicsPipelineBuilder::new();
        assert_eq!(builder.cull_mode, vk::CullModeFlags::BACK);
        assert_eq!(builder.front_face, vk::FrontFace::COUNTER_CLOCKWISE);
        assert!(builder.depth_test);
        assert!(builder.depth_write);
        assert_eq!(builder.color_format, vk::Format::UNDEFINED);
    }
}
