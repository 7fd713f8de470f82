//! Depth buffer management.
//!
//! The depth buffer is a GPU-only image whose dimensions must always
//! match the back buffers, so the shell destroys and recreates it
//! alongside the swapchain on every resize.

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::debug;

use glint_rhi::device::Device;
use glint_rhi::{RhiError, RhiResult};

/// Default depth buffer format (32-bit floating point).
pub const DEFAULT_DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

/// Depth image and view for depth testing.
///
/// Immutable after creation. Destruction order: view, then image, then
/// the memory allocation.
pub struct DepthBuffer {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan image handle.
    image: vk::Image,
    /// Vulkan image view handle.
    image_view: vk::ImageView,
    /// GPU memory allocation.
    allocation: Option<Allocation>,
    /// Depth format.
    format: vk::Format,
    /// Depth buffer dimensions.
    extent: vk::Extent2D,
}

impl DepthBuffer {
    /// Creates a new depth buffer with the specified dimensions.
    ///
    /// # Errors
    ///
    /// Returns an error if image creation, memory allocation, or view
    /// creation fails.
    pub fn new(
        device: Arc<Device>,
        width: u32,
        height: u32,
        format: vk::Format,
    ) -> RhiResult<Self> {
        let extent = vk::Extent2D { width, height };

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width,
                height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { device.handle().create_image(&image_info, None)? };

        let requirements = unsafe { device.handle().get_image_memory_requirements(image) };

        let allocation = {
            let mut allocator = device.allocator().lock().unwrap();
            allocator.allocate(&AllocationCreateDesc {
                name: "depth buffer",
                requirements,
                location: MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })?
        };

        unsafe {
            device
                .handle()
                .bind_image_memory(image, allocation.memory(), allocation.offset())?;
        }

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::DEPTH)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );

        let image_view = unsafe {
            device
                .handle()
                .create_image_view(&view_info, None)
                .map_err(RhiError::VulkanError)?
        };

        debug!("Created depth buffer: {}x{} {:?}", width, height, format);

        Ok(Self {
            device,
            image,
            image_view,
            allocation: Some(allocation),
            format,
            extent,
        })
    }

    /// Returns the depth image handle.
    #[inline]
    pub fn image(&self) -> vk::Image {
        self.image
    }

    /// Returns the depth image view handle.
    #[inline]
    pub fn image_view(&self) -> vk::ImageView {
        self.image_view
    }

    /// Returns the depth format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Returns the depth buffer dimensions.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for DepthBuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_image_view(self.image_view, None);
            self.device.handle().destroy_image(self.image, None);
        }

        if let Some(allocation) = self.allocation.take() {
            let mut allocator = self.device.allocator().lock().unwrap();
            if let Err(e) = allocator.free(allocation) {
                tracing::error!("Failed to free depth buffer allocation: {:?}", e);
            }
        }

        debug!(
            "Destroyed depth buffer ({}x{})",
            self.extent.width, self.extent.height
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_depth_format() {
        assert_eq!(DEFAULT_DEPTH_FORMAT, vk::Format::D32_SFLOAT);
    }

    #[test]
    fn test_depth_buffer_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<DepthBuffer>();
    }
}
