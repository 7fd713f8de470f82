//! Vulkan logical device and queue management.
//!
//! This module handles VkDevice creation, queue retrieval, and
//! gpu-allocator initialization. The device is the exclusive owner of all
//! GPU-side resources: created once at startup, destroyed at shutdown
//! after a final queue flush.

use std::sync::{Arc, Mutex};

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use tracing::{debug, info};

use crate::error::RhiError;
use crate::instance::Instance;
use crate::physical_device::{PhysicalDeviceInfo, QueueFamilyIndices};

/// Required device extensions.
pub const DEVICE_EXTENSIONS: &[&std::ffi::CStr] =
    &[ash::khr::swapchain::NAME, ash::khr::dynamic_rendering::NAME];

/// Vulkan logical device wrapper.
///
/// Manages the lifetime of the logical device, its queues, and the memory
/// allocator.
///
/// # Thread Safety
///
/// The [`Device`] is shared across owners using `Arc`. The internal
/// allocator is protected by a `Mutex`.
pub struct Device {
    /// Vulkan logical device handle.
    device: ash::Device,
    /// Physical device handle.
    physical_device: vk::PhysicalDevice,
    /// GPU memory allocator (thread-safe via Mutex).
    allocator: Mutex<Allocator>,
    /// Graphics queue handle. All command submission in this core goes
    /// through this single queue, giving FIFO execution of submits.
    graphics_queue: vk::Queue,
    /// Presentation queue handle (may equal the graphics queue).
    present_queue: vk::Queue,
    /// Queue family indices.
    queue_families: QueueFamilyIndices,
    /// Minimum alignment for uniform-buffer offsets, from device limits.
    min_uniform_offset_alignment: u64,
}

impl Device {
    /// Creates a new logical device.
    ///
    /// Enables the swapchain and dynamic-rendering extensions, Vulkan 1.2
    /// timeline semaphores (the queue synchronizer's fence primitive), and
    /// Vulkan 1.3 dynamic rendering + synchronization2. Also initializes
    /// the gpu-allocator.
    ///
    /// # Errors
    ///
    /// Returns an error if device creation or allocator initialization
    /// fails.
    pub fn new(
        instance: &Instance,
        physical_device_info: &PhysicalDeviceInfo,
    ) -> Result<Arc<Self>, RhiError> {
        let queue_families = &physical_device_info.queue_families;

        let unique_families = queue_families.unique_families();
        let queue_priorities = [1.0f32];

        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
            })
            .collect();

        debug!(
            "Creating {} queue(s) for families: {:?}",
            queue_create_infos.len(),
            unique_families
        );

        // Timeline semaphores back the monotonic queue fence
        let mut features_1_2 =
            vk::PhysicalDeviceVulkan12Features::default().timeline_semaphore(true);

        let mut features_1_3 = vk::PhysicalDeviceVulkan13Features::default()
            .dynamic_rendering(true)
            .synchronization2(true);

        let features = vk::PhysicalDeviceFeatures::default();

        let extension_names: Vec<*const i8> =
            DEVICE_EXTENSIONS.iter().map(|ext| ext.as_ptr()).collect();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&features)
            .push_next(&mut features_1_2)
            .push_next(&mut features_1_3);

        let device = unsafe {
            instance
                .handle()
                .create_device(physical_device_info.device, &create_info, None)?
        };

        info!(
            "Logical device created with {} extension(s)",
            DEVICE_EXTENSIONS.len()
        );

        let graphics_queue =
            unsafe { device.get_device_queue(queue_families.graphics_family.unwrap(), 0) };
        let present_queue =
            unsafe { device.get_device_queue(queue_families.present_family.unwrap(), 0) };
        debug!(
            "Queues retrieved (graphics family {}, present family {})",
            queue_families.graphics_family.unwrap(),
            queue_families.present_family.unwrap()
        );

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.handle().clone(),
            device: device.clone(),
            physical_device: physical_device_info.device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })?;

        info!("GPU memory allocator initialized");

        let min_uniform_offset_alignment = physical_device_info
            .properties
            .limits
            .min_uniform_buffer_offset_alignment;

        Ok(Arc::new(Self {
            device,
            physical_device: physical_device_info.device,
            allocator: Mutex::new(allocator),
            graphics_queue,
            present_queue,
            queue_families: physical_device_info.queue_families,
            min_uniform_offset_alignment,
        }))
    }

    /// Returns the Vulkan logical device handle.
    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    /// Returns the physical device handle.
    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Returns the graphics queue handle.
    #[inline]
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Returns the presentation queue handle.
    #[inline]
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Returns the queue family indices.
    #[inline]
    pub fn queue_families(&self) -> &QueueFamilyIndices {
        &self.queue_families
    }

    /// Returns a reference to the GPU memory allocator.
    #[inline]
    pub fn allocator(&self) -> &Mutex<Allocator> {
        &self.allocator
    }

    /// Minimum uniform-buffer offset alignment reported by the device.
    #[inline]
    pub fn min_uniform_offset_alignment(&self) -> u64 {
        self.min_uniform_offset_alignment
    }

    /// Waits for the device to become idle.
    ///
    /// Blocks until all outstanding operations on all queues have
    /// completed.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait fails; device loss is classified.
    pub fn wait_idle(&self) -> Result<(), RhiError> {
        unsafe {
            self.device
                .device_wait_idle()
                .map_err(|e| RhiError::from_queue_result(e, "device wait idle"))?;
        }
        Ok(())
    }

    /// Submits command batches to the graphics queue.
    ///
    /// Batches submitted together execute in slice order; separate calls
    /// execute strictly FIFO on the queue.
    ///
    /// # Safety
    ///
    /// The caller must ensure all command buffers are valid and fully
    /// recorded, and that synchronization primitives referenced by the
    /// submit infos are not in conflicting use.
    ///
    /// # Errors
    ///
    /// Returns an error if the submission fails; device loss is
    /// classified.
    pub unsafe fn submit_graphics(
        &self,
        submit_infos: &[vk::SubmitInfo],
        fence: vk::Fence,
    ) -> Result<(), RhiError> {
        unsafe {
            self.device
                .queue_submit(self.graphics_queue, submit_infos, fence)
                .map_err(|e| RhiError::from_queue_result(e, "queue submit"))?;
        }
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            // All queues must retire before the device goes away
            if let Err(e) = self.device.device_wait_idle() {
                tracing::error!("Failed to wait for device idle during drop: {:?}", e);
            }

            // Allocator is dropped with the Mutex; all allocations must
            // already have been freed by their owners

            self.device.destroy_device(None);
        }
        info!("Logical device destroyed");
    }
}

// Safety: ash::Device is Send+Sync, queue/physical-device handles are Copy,
// the allocator is behind a Mutex, and QueueFamilyIndices is Copy.
unsafe impl Send for Device {}
unsafe impl Sync for Device {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_extensions_defined() {
        assert!(DEVICE_EXTENSIONS.contains(&ash::khr::swapchain::NAME));
        assert!(DEVICE_EXTENSIONS.contains(&ash::khr::dynamic_rendering::NAME));
    }

    #[test]
    fn test_device_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Device>();
    }
}
