//! Shader module management.
//!
//! Compiled shader byte code is an opaque blob to this layer: it is
//! validated only for the SPIR-V magic and word alignment, then wrapped in
//! a VkShaderModule. No format contract exists beyond "valid for the
//! pipeline it is bound to".
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::path::Path;
//! use glint_rhi::device::Device;
//! use glint_rhi::shader::{Shader, ShaderStage};
//!
//! # fn example(device: Arc<Device>) -> Result<(), glint_rhi::RhiError> {
//! let vertex = Shader::from_spirv_file(
//!     device.clone(),
//!     Path::new("shaders/cube.vert.spv"),
//!     ShaderStage::Vertex,
//! )?;
//! let _stage_info = vertex.stage_create_info();
//! # Ok(())
//! # }
//! ```

use std::ffi::CString;
use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// SPIR-V magic number, first word of every valid module.
const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Shader stage type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex shader stage
    Vertex,
    /// Fragment shader stage
    Fragment,
}

impl ShaderStage {
    /// Converts the shader stage to Vulkan shader stage flags.
    pub fn to_vk_stage(self) -> vk::ShaderStageFlags {
        match self {
            ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
            ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
        }
    }

    /// Returns a human-readable name for the shader stage.
    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }
}

/// Vulkan shader module wrapper.
///
/// Immutable after creation; holds the entry point name so pipeline
/// creation can reference it without re-allocating.
pub struct Shader {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan shader module handle.
    module: vk::ShaderModule,
    /// Stage this module is bound to.
    stage: ShaderStage,
    /// Entry point name.
    entry_point: CString,
}

impl Shader {
    /// Creates a shader module from raw SPIR-V bytes with entry point
    /// `main`.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob is not plausibly SPIR-V (length or
    /// magic) or module creation fails.
    pub fn from_spirv_bytes(
        device: Arc<Device>,
        bytes: &[u8],
        stage: ShaderStage,
    ) -> RhiResult<Self> {
        if bytes.len() < 4 || bytes.len() % 4 != 0 {
            return Err(RhiError::ShaderError(format!(
                "{} shader blob length {} is not a multiple of 4",
                stage.name(),
                bytes.len()
            )));
        }

        let words: Vec<u32> = bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        if words[0] != SPIRV_MAGIC {
            return Err(RhiError::ShaderError(format!(
                "{} shader blob has invalid SPIR-V magic {:#010x}",
                stage.name(),
                words[0]
            )));
        }

        let create_info = vk::ShaderModuleCreateInfo::default().code(&words);

        let module = unsafe { device.handle().create_shader_module(&create_info, None)? };

        debug!(
            "Created {} shader module ({} bytes)",
            stage.name(),
            bytes.len()
        );

        Ok(Self {
            device,
            module,
            stage,
            entry_point: CString::new("main").unwrap(),
        })
    }

    /// Loads a SPIR-V file and creates a shader module from it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the blob is
    /// invalid.
    pub fn from_spirv_file(device: Arc<Device>, path: &Path, stage: ShaderStage) -> RhiResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            RhiError::ShaderError(format!(
                "Failed to read {} shader {}: {}",
                stage.name(),
                path.display(),
                e
            ))
        })?;

        Self::from_spirv_bytes(device, &bytes, stage)
    }

    /// Returns the Vulkan shader module handle.
    #[inline]
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    /// Returns the stage this module is bound to.
    #[inline]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// Pipeline stage create info referencing this module.
    pub fn stage_create_info(&self) -> vk::PipelineShaderStageCreateInfo<'_> {
        vk::PipelineShaderStageCreateInfo::default()
            .stage(self.stage.to_vk_stage())
            .module(self.module)
            .name(&self.entry_point)
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_shader_module(self.module, None);
        }
        debug!("Destroyed {} shader module", self.stage.name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_flags() {
        assert_eq!(
            ShaderStage::Vertex.to_vk_stage(),
            vk::ShaderStageFlags::VERTEX
        );
        assert_eq!(
            ShaderStage::Fragment.to_vk_stage(),
            vk::ShaderStageFlags::FRAGMENT
        );
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(ShaderStage::Vertex.name(), "vertex");
        assert_eq!(ShaderStage::Fragment.name(), "fragment");
    }
}
