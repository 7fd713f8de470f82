//! RHI-specific error types.
//!
//! Every GPU call either succeeds or is unrecoverable: errors propagate to
//! the application entry point with no intermediate retry. Device loss is
//! classified separately from ordinary call failures so a fuller
//! implementation could attempt device recreation.

use thiserror::Error;

/// RHI-specific error type.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error
    #[error("Vulkan error: {0}")]
    VulkanError(#[from] ash::vk::Result),

    /// Failed to load Vulkan library
    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    /// GPU allocator error
    #[error("Allocator error: {0}")]
    AllocatorError(#[from] gpu_allocator::AllocationError),

    /// No suitable GPU found
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// The device was lost: a fence wait or queue operation failed after
    /// the queue had been working. Fatal; not retried.
    #[error("Device lost during {0}")]
    DeviceLost(&'static str),

    /// Shader module creation error
    #[error("Shader error: {0}")]
    ShaderError(String),

    /// Surface creation error
    #[error("Surface error: {0}")]
    SurfaceError(String),

    /// Swapchain error
    #[error("Swapchain error: {0}")]
    SwapchainError(String),

    /// Invalid handle or argument error
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    /// Pipeline creation error
    #[error("Pipeline error: {0}")]
    PipelineError(String),
}

impl RhiError {
    /// Classify a raw Vulkan result from a queue or wait operation,
    /// mapping device loss to the dedicated variant.
    pub fn from_queue_result(result: ash::vk::Result, context: &'static str) -> Self {
        match result {
            ash::vk::Result::ERROR_DEVICE_LOST => RhiError::DeviceLost(context),
            other => RhiError::VulkanError(other),
        }
    }
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_lost_is_classified() {
        let err = RhiError::from_queue_result(ash::vk::Result::ERROR_DEVICE_LOST, "fence wait");
        assert!(matches!(err, RhiError::DeviceLost("fence wait")));
    }

    #[test]
    fn test_other_results_stay_vulkan_errors() {
        let err =
            RhiError::from_queue_result(ash::vk::Result::ERROR_OUT_OF_DEVICE_MEMORY, "submit");
        assert!(matches!(err, RhiError::VulkanError(_)));
    }
}
