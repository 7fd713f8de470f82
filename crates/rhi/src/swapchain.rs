//! Swapchain and back-buffer ring management.
//!
//! The swapchain owns a fixed ring of presentable back buffers (two, the
//! classic double-buffered flip) plus their image views. Exactly one
//! buffer is the current render target at a time; ownership rotates
//! round-robin after each present.
//!
//! Resize protocol: the owning shell flushes the queue, then calls
//! [`Swapchain::recreate`], which releases the per-buffer views exactly
//! once, rebuilds the swapchain reusing the old handle, recreates the
//! views, and resets the ring to buffer zero. The depth buffer is
//! recreated alongside by the shell since its dimensions must always
//! match.
//!
//! # Example
//!
//! ```no_run
//! # use glint_rhi::swapchain::Swapchain;
//! # use ash::vk;
//! # fn example(swapchain: &mut Swapchain, queue: vk::Queue, sem: vk::Semaphore) {
//! // In the render loop:
//! // let (image_index, suboptimal) = swapchain.acquire_next_image(acquire_sem)?;
//! // ... render to swapchain.image(image_index as usize) ...
//! // let needs_resize = swapchain.present(queue, image_index, render_done_sem)?;
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::RhiError;
use crate::instance::Instance;

/// Number of back buffers in the presentation ring.
pub const BACK_BUFFER_COUNT: u32 = 2;

/// Advances a back-buffer ring index after a present.
#[inline]
pub fn next_back_buffer(current: u32, count: u32) -> u32 {
    (current + 1) % count
}

/// Swapchain surface support details.
#[derive(Debug, Clone)]
pub struct SwapchainSupportDetails {
    /// Surface capabilities (image count bounds, extents, transforms)
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface formats
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupportDetails {
    /// Queries swapchain support for a physical device and surface.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the queries fail.
    pub fn query(
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
    ) -> Result<Self, RhiError> {
        let capabilities = unsafe {
            surface_loader.get_physical_device_surface_capabilities(physical_device, surface)?
        };

        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(physical_device, surface)?
        };

        let present_modes = unsafe {
            surface_loader.get_physical_device_surface_present_modes(physical_device, surface)?
        };

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// True if at least one format and one present mode are available.
    #[inline]
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Vulkan swapchain wrapper owning the back-buffer ring.
///
/// # Thread Safety
///
/// Not thread-safe; driven from the single render thread.
pub struct Swapchain {
    /// Reference to the logical device
    device: Arc<Device>,
    /// Swapchain extension loader
    swapchain_loader: ash::khr::swapchain::Device,
    /// Swapchain handle
    swapchain: vk::SwapchainKHR,
    /// Back-buffer images (owned by the swapchain)
    images: Vec<vk::Image>,
    /// Image views for the back buffers
    image_views: Vec<vk::ImageView>,
    /// Back-buffer format
    format: vk::Format,
    /// Swapchain extent (resolution)
    extent: vk::Extent2D,
    /// Present mode
    present_mode: vk::PresentModeKHR,
    /// Ring index of the buffer currently being rendered into
    current_back_buffer: u32,
}

impl Swapchain {
    /// Creates a new swapchain.
    ///
    /// Selection policy:
    /// - Format: prefer `B8G8R8A8_UNORM` with SRGB_NONLINEAR color space
    /// - Present mode: FIFO (vsync'd double-buffered flip)
    /// - Image count: [`BACK_BUFFER_COUNT`], clamped to surface limits
    ///
    /// # Errors
    ///
    /// Returns an error if surface queries fail, no format or present
    /// mode is available, or swapchain/view creation fails.
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
    ) -> Result<Self, RhiError> {
        Self::create_internal(
            instance,
            device,
            surface,
            width,
            height,
            vk::SwapchainKHR::null(),
        )
    }

    /// Shared creation path for initial creation and resize recreation.
    fn create_internal(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
        old_swapchain: vk::SwapchainKHR,
    ) -> Result<Self, RhiError> {
        let swapchain_loader = ash::khr::swapchain::Device::new(instance.handle(), device.handle());
        let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());

        let support =
            SwapchainSupportDetails::query(device.physical_device(), surface, &surface_loader)?;

        if !support.is_adequate() {
            return Err(RhiError::SwapchainError(
                "Inadequate swapchain support (no formats or present modes)".to_string(),
            ));
        }

        let surface_format = choose_surface_format(&support.formats);
        let present_mode = choose_present_mode(&support.present_modes);
        let extent = choose_extent(&support.capabilities, width, height);
        let image_count = clamp_image_count(&support.capabilities, BACK_BUFFER_COUNT);

        info!(
            "Creating swapchain: {}x{}, format {:?}, present mode {:?}, {} back buffers",
            extent.width, extent.height, surface_format.format, present_mode, image_count
        );

        // Queue family sharing between graphics and present
        let queue_families = device.queue_families();
        let graphics_family = queue_families.graphics_family.unwrap();
        let present_family = queue_families.present_family.unwrap();
        let family_indices = [graphics_family, present_family];

        let (sharing_mode, family_indices_slice) = if graphics_family != present_family {
            (vk::SharingMode::CONCURRENT, family_indices.as_slice())
        } else {
            (vk::SharingMode::EXCLUSIVE, &[][..])
        };

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(family_indices_slice)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain = unsafe { swapchain_loader.create_swapchain(&create_info, None)? };

        let images = unsafe { swapchain_loader.get_swapchain_images(swapchain)? };
        info!("Swapchain created with {} images", images.len());

        let image_views = create_image_views(&device, &images, surface_format.format)?;

        Ok(Self {
            device,
            swapchain_loader,
            swapchain,
            images,
            image_views,
            format: surface_format.format,
            extent,
            present_mode,
            current_back_buffer: 0,
        })
    }

    /// Recreates the swapchain for a new window size.
    ///
    /// The caller must have flushed the queue first: no command referencing
    /// the old back buffers may still be in flight. Old image views are
    /// released exactly once; the old swapchain handle is passed to the
    /// driver for resource reuse, then destroyed. The ring restarts at
    /// buffer zero.
    ///
    /// # Errors
    ///
    /// Returns an error if recreation fails.
    pub fn recreate(
        &mut self,
        instance: &Instance,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
    ) -> Result<(), RhiError> {
        info!("Recreating swapchain for new size: {}x{}", width, height);

        // Views must go before the swapchain that owns their images
        self.destroy_image_views();

        let old_swapchain = self.swapchain;
        let mut new_swapchain = Self::create_internal(
            instance,
            self.device.clone(),
            surface,
            width,
            height,
            old_swapchain,
        )?;

        unsafe {
            self.swapchain_loader.destroy_swapchain(old_swapchain, None);
        }

        self.swapchain = new_swapchain.swapchain;
        self.images = std::mem::take(&mut new_swapchain.images);
        self.image_views = std::mem::take(&mut new_swapchain.image_views);
        self.format = new_swapchain.format;
        self.extent = new_swapchain.extent;
        self.present_mode = new_swapchain.present_mode;
        self.current_back_buffer = 0;

        // Null out the temporary's handle so its Drop does not double-free
        new_swapchain.swapchain = vk::SwapchainKHR::null();

        Ok(())
    }

    /// Acquires the next back buffer for rendering.
    ///
    /// Reconciles the tracked ring index with the index the driver hands
    /// back; with a two-image FIFO chain they agree.
    ///
    /// # Arguments
    ///
    /// * `semaphore` - Signaled when the image is ready to render into
    ///
    /// # Returns
    ///
    /// `(image_index, suboptimal)`; a suboptimal result means the caller
    /// should recreate after this frame.
    ///
    /// # Errors
    ///
    /// Returns the raw Vulkan result so the caller can treat
    /// `ERROR_OUT_OF_DATE_KHR` as a recreate request rather than a
    /// failure.
    pub fn acquire_next_image(
        &mut self,
        semaphore: vk::Semaphore,
    ) -> Result<(u32, bool), vk::Result> {
        let result = unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        };

        if let Ok((index, _)) = result {
            self.current_back_buffer = index;
        }

        result
    }

    /// Presents the current back buffer and advances the ring.
    ///
    /// Must only be called after all render commands targeting the buffer
    /// have been submitted (the GPU serializes against `wait_semaphore`);
    /// the CPU-side guarantee that the command allocator is reusable is
    /// the fence synchronizer's job, not this method's.
    ///
    /// # Returns
    ///
    /// `true` if the swapchain is out of date or suboptimal and should be
    /// recreated.
    ///
    /// # Errors
    ///
    /// Returns an error if presentation fails for a reason other than an
    /// out-of-date swapchain.
    pub fn present(
        &mut self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> Result<bool, RhiError> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe { self.swapchain_loader.queue_present(queue, &present_info) };

        // Ownership of the presented buffer rotates to the display;
        // rendering moves to the next buffer in the ring
        self.current_back_buffer = next_back_buffer(image_index, self.images.len() as u32);

        match result {
            Ok(suboptimal) => Ok(suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("Swapchain out of date during present");
                Ok(true)
            }
            Err(vk::Result::SUBOPTIMAL_KHR) => {
                debug!("Swapchain suboptimal during present");
                Ok(true)
            }
            Err(e) => Err(RhiError::from_queue_result(e, "present")),
        }
    }

    /// Returns the swapchain handle.
    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Returns the back-buffer format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Returns the swapchain extent (resolution).
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Returns the present mode.
    #[inline]
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// Returns the number of back buffers.
    #[inline]
    pub fn image_count(&self) -> u32 {
        self.images.len() as u32
    }

    /// Ring index of the current back buffer.
    #[inline]
    pub fn current_back_buffer(&self) -> u32 {
        self.current_back_buffer
    }

    /// The image currently being rendered into.
    #[inline]
    pub fn current_image(&self) -> vk::Image {
        self.images[self.current_back_buffer as usize]
    }

    /// The view of the current back buffer.
    #[inline]
    pub fn current_image_view(&self) -> vk::ImageView {
        self.image_views[self.current_back_buffer as usize]
    }

    /// Returns the back-buffer image at the given ring index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn image(&self, index: usize) -> vk::Image {
        self.images[index]
    }

    /// Returns the image view at the given ring index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn image_view(&self, index: usize) -> vk::ImageView {
        self.image_views[index]
    }

    /// Destroys all image views (exactly once per view).
    fn destroy_image_views(&mut self) {
        for &image_view in &self.image_views {
            unsafe {
                self.device.handle().destroy_image_view(image_view, None);
            }
        }
        self.image_views.clear();
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.destroy_image_views();

        // Images are owned by the swapchain. A null handle means recreate
        // already moved ownership elsewhere.
        if self.swapchain != vk::SwapchainKHR::null() {
            unsafe {
                self.swapchain_loader
                    .destroy_swapchain(self.swapchain, None);
            }

            info!(
                "Swapchain destroyed (was {}x{}, {} images)",
                self.extent.width,
                self.extent.height,
                self.images.len()
            );
        }
    }
}

/// Chooses the back-buffer format.
///
/// Prefers B8G8R8A8_UNORM with SRGB_NONLINEAR color space, then the SRGB
/// variant, then whatever the surface offers first.
fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    let preferred = formats.iter().find(|f| {
        f.format == vk::Format::B8G8R8A8_UNORM
            && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
    });

    if let Some(&format) = preferred {
        return format;
    }

    let alternative = formats.iter().find(|f| {
        f.format == vk::Format::B8G8R8A8_SRGB && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
    });

    if let Some(&format) = alternative {
        return format;
    }

    warn!(
        "Using first available surface format: {:?}",
        formats[0].format
    );
    formats[0]
}

/// Chooses the present mode.
///
/// FIFO is the double-buffered vsync flip this renderer is built around
/// and is guaranteed available by the Vulkan spec.
fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    debug_assert!(present_modes.contains(&vk::PresentModeKHR::FIFO));
    vk::PresentModeKHR::FIFO
}

/// Chooses the swapchain extent.
///
/// If the surface pins the extent, that wins; otherwise the requested size
/// is clamped to the surface's limits. Deterministic: the same request
/// against the same capabilities yields the same extent.
fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    width: u32,
    height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// Clamps the requested back-buffer count to the surface's limits.
///
/// A `max_image_count` of zero means no upper bound.
fn clamp_image_count(capabilities: &vk::SurfaceCapabilitiesKHR, requested: u32) -> u32 {
    let mut count = requested.max(capabilities.min_image_count);
    if capabilities.max_image_count > 0 {
        count = count.min(capabilities.max_image_count);
    }
    count
}

/// Creates image views for the back buffers.
fn create_image_views(
    device: &Device,
    images: &[vk::Image],
    format: vk::Format,
) -> Result<Vec<vk::ImageView>, RhiError> {
    let mut image_views = Vec::with_capacity(images.len());

    for (i, &image) in images.iter().enumerate() {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );

        let image_view = unsafe {
            device
                .handle()
                .create_image_view(&create_info, None)
                .map_err(|e| {
                    RhiError::SwapchainError(format!("Failed to create image view {}: {:?}", i, e))
                })?
        };

        image_views.push(image_view);
    }

    debug!("Created {} back-buffer views", image_views.len());
    Ok(image_views)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_back_buffer_ring_cycles() {
        // Two presents bring the ring back to where it started
        let mut index = 0;
        index = next_back_buffer(index, BACK_BUFFER_COUNT);
        assert_eq!(index, 1);
        index = next_back_buffer(index, BACK_BUFFER_COUNT);
        assert_eq!(index, 0);
    }

    #[test]
    fn test_choose_surface_format_prefers_unorm() {
        let formats = vec![
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];

        let selected = choose_surface_format(&formats);
        assert_eq!(selected.format, vk::Format::B8G8R8A8_UNORM);
    }

    #[test]
    fn test_choose_surface_format_fallback() {
        let formats = vec![vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }];

        let selected = choose_surface_format(&formats);
        assert_eq!(selected.format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn test_choose_present_mode_is_fifo() {
        let modes = vec![
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::IMMEDIATE,
        ];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_choose_extent_uses_current() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 1920,
                height: 1080,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        };

        let extent = choose_extent(&capabilities, 800, 600);
        assert_eq!(extent.width, 1920);
        assert_eq!(extent.height, 1080);
    }

    #[test]
    fn test_choose_extent_clamps_and_is_idempotent() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 100,
                height: 100,
            },
            max_image_extent: vk::Extent2D {
                width: 2000,
                height: 2000,
            },
            ..Default::default()
        };

        let extent = choose_extent(&capabilities, 3000, 3000);
        assert_eq!(extent.width, 2000);
        assert_eq!(extent.height, 2000);

        let extent = choose_extent(&capabilities, 50, 50);
        assert_eq!(extent.width, 100);
        assert_eq!(extent.height, 100);

        // Same request twice: same decision (resize idempotence)
        let first = choose_extent(&capabilities, 800, 600);
        let second = choose_extent(&capabilities, 800, 600);
        assert_eq!(first.width, second.width);
        assert_eq!(first.height, second.height);
    }

    #[test]
    fn test_clamp_image_count() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 8,
            ..Default::default()
        };
        assert_eq!(clamp_image_count(&capabilities, BACK_BUFFER_COUNT), 2);

        // Surface minimum above the request wins
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 3,
            max_image_count: 8,
            ..Default::default()
        };
        assert_eq!(clamp_image_count(&capabilities, BACK_BUFFER_COUNT), 3);

        // Zero max means unbounded
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(clamp_image_count(&capabilities, BACK_BUFFER_COUNT), 2);
    }

    #[test]
    fn test_swapchain_support_details_is_adequate() {
        let adequate = SwapchainSupportDetails {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![vk::SurfaceFormatKHR::default()],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        assert!(adequate.is_adequate());

        let no_formats = SwapchainSupportDetails {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        assert!(!no_formats.is_adequate());
    }
}
