//! Descriptor set management for constant-buffer bindings.
//!
//! The frame path binds exactly one descriptor set holding the per-pass
//! and per-object constant buffers, so this module stays narrow: a layout
//! of uniform-buffer bindings, a pool, and helpers for writing buffer
//! regions into a set.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Descriptor set layout wrapper.
pub struct DescriptorSetLayout {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan layout handle.
    layout: vk::DescriptorSetLayout,
}

impl DescriptorSetLayout {
    /// Creates a layout from the given bindings.
    ///
    /// # Errors
    ///
    /// Returns an error if layout creation fails.
    pub fn new(
        device: Arc<Device>,
        bindings: &[vk::DescriptorSetLayoutBinding],
    ) -> RhiResult<Self> {
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(bindings);

        let layout = unsafe {
            device
                .handle()
                .create_descriptor_set_layout(&create_info, None)?
        };

        debug!(
            "Created descriptor set layout with {} binding(s)",
            bindings.len()
        );

        Ok(Self { device, layout })
    }

    /// Returns the Vulkan layout handle.
    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_set_layout(self.layout, None);
        }
        debug!("Destroyed descriptor set layout");
    }
}

/// Describes a uniform-buffer binding visible to the vertex stage.
pub fn uniform_buffer_binding(binding: u32) -> vk::DescriptorSetLayoutBinding<'static> {
    vk::DescriptorSetLayoutBinding::default()
        .binding(binding)
        .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
        .descriptor_count(1)
        .stage_flags(vk::ShaderStageFlags::VERTEX)
}

/// Descriptor pool wrapper.
///
/// Sets allocated from the pool are freed when the pool is destroyed.
pub struct DescriptorPool {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan pool handle.
    pool: vk::DescriptorPool,
}

impl DescriptorPool {
    /// Creates a pool able to hold `max_sets` sets of up to
    /// `uniform_buffer_count` uniform-buffer descriptors total.
    ///
    /// # Errors
    ///
    /// Returns an error if pool creation fails.
    pub fn new(device: Arc<Device>, max_sets: u32, uniform_buffer_count: u32) -> RhiResult<Self> {
        let pool_sizes = [vk::DescriptorPoolSize::default()
            .ty(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(uniform_buffer_count)];

        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(&pool_sizes);

        let pool = unsafe { device.handle().create_descriptor_pool(&create_info, None)? };

        debug!(
            "Created descriptor pool ({} sets, {} uniform buffers)",
            max_sets, uniform_buffer_count
        );

        Ok(Self { device, pool })
    }

    /// Allocates one descriptor set with the given layout.
    ///
    /// # Errors
    ///
    /// Returns an error if allocation fails.
    pub fn allocate(&self, layout: &DescriptorSetLayout) -> RhiResult<vk::DescriptorSet> {
        let layouts = [layout.handle()];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);

        let sets = unsafe { self.device.handle().allocate_descriptor_sets(&alloc_info)? };
        Ok(sets[0])
    }

    /// Returns the Vulkan pool handle.
    #[inline]
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_descriptor_pool(self.pool, None);
        }
        debug!("Destroyed descriptor pool");
    }
}

/// Writes a buffer region into a uniform-buffer binding of a set.
pub fn write_uniform_buffer(
    device: &Device,
    set: vk::DescriptorSet,
    binding: u32,
    buffer: vk::Buffer,
    offset: vk::DeviceSize,
    range: vk::DeviceSize,
) {
    let buffer_info = [vk::DescriptorBufferInfo::default()
        .buffer(buffer)
        .offset(offset)
        .range(range)];

    let write = vk::WriteDescriptorSet::default()
        .dst_set(set)
        .dst_binding(binding)
        .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
        .buffer_info(&buffer_info);

    unsafe {
        device
            .handle()
            .update_descriptor_sets(std::slice::from_ref(&write), &[]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_buffer_binding_shape() {
        let binding = uniform_buffer_binding(1);
        assert_eq!(binding.binding, 1);
        assert_eq!(binding.descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(binding.descriptor_count, 1);
        assert_eq!(binding.stage_flags, vk::ShaderStageFlags::VERTEX);
    }
}
