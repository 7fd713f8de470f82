//! Physical device (GPU) selection.
//!
//! Enumerates available GPUs and selects one that can render and present:
//! graphics + present queue families, the required device extensions, and
//! timeline semaphore support. Discrete GPUs are preferred.

use std::ffi::CStr;

use ash::vk;
use tracing::{debug, info};

use crate::error::RhiError;

/// Queue family indices for the queue types this renderer uses.
#[derive(Clone, Copy, Debug, Default)]
pub struct QueueFamilyIndices {
    /// Index of the queue family that supports graphics operations.
    pub graphics_family: Option<u32>,
    /// Index of the queue family that supports presentation to a surface.
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    /// Checks if the minimum required queue families are available.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    /// Returns the unique queue family indices.
    ///
    /// Avoids creating duplicate queues when graphics and present share a
    /// family.
    pub fn unique_families(&self) -> Vec<u32> {
        let mut families = Vec::with_capacity(2);

        if let Some(graphics) = self.graphics_family {
            families.push(graphics);
        }
        if let Some(present) = self.present_family
            && !families.contains(&present)
        {
            families.push(present);
        }

        families
    }
}

/// Information about a selected physical device.
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle.
    pub device: vk::PhysicalDevice,
    /// Device properties (name, limits, API version).
    pub properties: vk::PhysicalDeviceProperties,
    /// Queue family indices.
    pub queue_families: QueueFamilyIndices,
}

impl PhysicalDeviceInfo {
    /// Returns the device name as a string.
    pub fn device_name(&self) -> &str {
        unsafe {
            CStr::from_ptr(self.properties.device_name.as_ptr())
                .to_str()
                .unwrap_or("Unknown Device")
        }
    }

    /// Returns a human-readable string for the device type.
    pub fn device_type_name(&self) -> &'static str {
        match self.properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
            vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
            vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
            vk::PhysicalDeviceType::CPU => "CPU",
            _ => "Other",
        }
    }
}

/// Selects the most suitable physical device for rendering to `surface`.
///
/// Candidates must provide graphics and present queue families, the device
/// extensions in [`crate::device::DEVICE_EXTENSIONS`], and timeline
/// semaphore support. Among suitable candidates, discrete GPUs win.
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableGpu`] if no candidate qualifies.
pub fn select_physical_device(
    instance: &ash::Instance,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Result<PhysicalDeviceInfo, RhiError> {
    let devices = unsafe { instance.enumerate_physical_devices()? };

    if devices.is_empty() {
        return Err(RhiError::NoSuitableGpu);
    }

    debug!("Found {} physical device(s)", devices.len());

    let mut best: Option<PhysicalDeviceInfo> = None;

    for &device in &devices {
        let properties = unsafe { instance.get_physical_device_properties(device) };

        let queue_families = find_queue_families(instance, device, surface, surface_loader)?;
        if !queue_families.is_complete() {
            continue;
        }
        if !supports_required_extensions(instance, device)? {
            continue;
        }
        if !supports_timeline_semaphores(instance, device) {
            continue;
        }

        let info = PhysicalDeviceInfo {
            device,
            properties,
            queue_families,
        };

        let is_discrete = properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU;
        let replace = match &best {
            None => true,
            Some(current) => {
                is_discrete
                    && current.properties.device_type != vk::PhysicalDeviceType::DISCRETE_GPU
            }
        };

        if replace {
            best = Some(info);
        }
    }

    match best {
        Some(info) => {
            info!(
                "Selected GPU: {} ({})",
                info.device_name(),
                info.device_type_name()
            );
            Ok(info)
        }
        None => Err(RhiError::NoSuitableGpu),
    }
}

/// Finds graphics and present queue families on a device.
fn find_queue_families(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Result<QueueFamilyIndices, RhiError> {
    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };

    let mut indices = QueueFamilyIndices::default();

    for (i, family) in families.iter().enumerate() {
        let index = i as u32;

        if indices.graphics_family.is_none()
            && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
        {
            indices.graphics_family = Some(index);
        }

        if indices.present_family.is_none() {
            let supported = unsafe {
                surface_loader.get_physical_device_surface_support(device, index, surface)?
            };
            if supported {
                indices.present_family = Some(index);
            }
        }

        if indices.is_complete() {
            break;
        }
    }

    Ok(indices)
}

/// Checks that all required device extensions are available.
fn supports_required_extensions(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
) -> Result<bool, RhiError> {
    let available = unsafe { instance.enumerate_device_extension_properties(device)? };

    let supported = crate::device::DEVICE_EXTENSIONS.iter().all(|&required| {
        available.iter().any(|ext| {
            let name = unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) };
            name == required
        })
    });

    Ok(supported)
}

/// Checks for timeline semaphore support (Vulkan 1.2 feature the queue
/// synchronizer depends on).
fn supports_timeline_semaphores(instance: &ash::Instance, device: vk::PhysicalDevice) -> bool {
    let mut timeline = vk::PhysicalDeviceTimelineSemaphoreFeatures::default();
    let mut features2 = vk::PhysicalDeviceFeatures2::default().push_next(&mut timeline);

    unsafe {
        instance.get_physical_device_features2(device, &mut features2);
    }

    timeline.timeline_semaphore == vk::TRUE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incomplete_queue_families() {
        let indices = QueueFamilyIndices::default();
        assert!(!indices.is_complete());

        let graphics_only = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: None,
        };
        assert!(!graphics_only.is_complete());
    }

    #[test]
    fn test_unique_families_deduplicates_shared_family() {
        let shared = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(0),
        };
        assert_eq!(shared.unique_families(), vec![0]);

        let split = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(2),
        };
        assert_eq!(split.unique_families(), vec![0, 2]);
    }
}
