//! GPU buffer management.
//!
//! Three kinds of buffer live here:
//! - [`Buffer`] - a raw VkBuffer with gpu-allocator managed memory, flags
//!   and memory location driven by [`BufferUsage`]
//! - [`UploadBuffer`] - a CPU-writable, GPU-readable array of fixed-size
//!   elements, persistently mapped, honoring the 256-byte constant-buffer
//!   stride alignment
//! - [`StagedBuffer`] - a device-local buffer filled through a transient
//!   staging copy recorded into a command buffer
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use glint_rhi::device::Device;
//! use glint_rhi::buffer::UploadBuffer;
//!
//! #[repr(C)]
//! #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
//! struct Constants {
//!     scale: [f32; 4],
//! }
//!
//! # fn example(device: Arc<Device>) -> Result<(), glint_rhi::RhiError> {
//! // One 256-byte-aligned slot per drawn object
//! let constants: UploadBuffer<Constants> = UploadBuffer::new(device, 4, true)?;
//! constants.copy_data(0, &Constants { scale: [1.0; 4] })?;
//! # Ok(())
//! # }
//! ```

use std::marker::PhantomData;
use std::sync::Arc;

use ash::vk;
use bytemuck::Pod;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::debug;

use crate::command::CommandBuffer;
use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Required stride alignment for constant-buffer elements, in bytes.
pub const CONSTANT_BUFFER_ALIGNMENT: usize = 256;

/// Rounds `value` up to the next multiple of `alignment`.
///
/// `alignment` must be a power of two.
#[inline]
pub const fn align_up(value: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

/// Buffer usage type.
///
/// Drives both the Vulkan usage flags and where the memory lives: vertex
/// and index data go to GPU-local memory and are filled through a staging
/// copy; constant and staging buffers stay CPU-visible.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    /// Vertex buffer in GPU-local memory, copy destination
    Vertex,
    /// Index buffer in GPU-local memory, copy destination
    Index,
    /// Constant (uniform) buffer, CPU-writable
    Constant,
    /// Staging buffer, CPU-writable copy source
    Staging,
}

impl BufferUsage {
    /// Converts to Vulkan buffer usage flags.
    pub fn to_vk_usage(self) -> vk::BufferUsageFlags {
        match self {
            BufferUsage::Vertex => {
                vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Index => {
                vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Constant => vk::BufferUsageFlags::UNIFORM_BUFFER,
            BufferUsage::Staging => vk::BufferUsageFlags::TRANSFER_SRC,
        }
    }

    /// Returns the memory location for this buffer type.
    pub fn memory_location(self) -> MemoryLocation {
        match self {
            // Device-local; filled via staging copy
            BufferUsage::Vertex | BufferUsage::Index => MemoryLocation::GpuOnly,
            // CPU writes every frame
            BufferUsage::Constant => MemoryLocation::CpuToGpu,
            BufferUsage::Staging => MemoryLocation::CpuToGpu,
        }
    }

    /// Returns a human-readable name for the buffer type.
    pub fn name(self) -> &'static str {
        match self {
            BufferUsage::Vertex => "vertex",
            BufferUsage::Index => "index",
            BufferUsage::Constant => "constant",
            BufferUsage::Staging => "staging",
        }
    }
}

/// GPU buffer wrapper with managed memory.
///
/// Memory comes from gpu-allocator, which handles suballocation and memory
/// type selection. CPU-visible buffers are mapped for the allocation's
/// entire lifetime.
pub struct Buffer {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan buffer handle.
    buffer: vk::Buffer,
    /// GPU memory allocation.
    allocation: Option<Allocation>,
    /// Buffer size in bytes.
    size: vk::DeviceSize,
    /// Buffer usage type.
    usage: BufferUsage,
}

impl Buffer {
    /// Creates a new buffer with the specified size.
    ///
    /// # Errors
    ///
    /// Returns an error if `size` is zero or buffer/memory allocation
    /// fails.
    pub fn new(device: Arc<Device>, usage: BufferUsage, size: vk::DeviceSize) -> RhiResult<Self> {
        if size == 0 {
            return Err(RhiError::InvalidHandle(
                "Buffer size must be greater than 0".to_string(),
            ));
        }

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage.to_vk_usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.handle().create_buffer(&buffer_info, None)? };

        let requirements = unsafe { device.handle().get_buffer_memory_requirements(buffer) };

        let allocation = {
            let mut allocator = device.allocator().lock().unwrap();
            allocator.allocate(&AllocationCreateDesc {
                name: usage.name(),
                requirements,
                location: usage.memory_location(),
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })?
        };

        unsafe {
            device
                .handle()
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())?;
        }

        debug!("Created {} buffer: {} bytes", usage.name(), size);

        Ok(Self {
            device,
            buffer,
            allocation: Some(allocation),
            size,
            usage,
        })
    }

    /// Writes data at the specified byte offset.
    ///
    /// The buffer must live in CPU-visible memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the memory is not mapped or the write would
    /// exceed the buffer size.
    pub fn write_data(&self, offset: vk::DeviceSize, data: &[u8]) -> RhiResult<()> {
        if data.is_empty() {
            return Ok(());
        }

        let end = offset + data.len() as vk::DeviceSize;
        if end > self.size {
            return Err(RhiError::InvalidHandle(format!(
                "Write exceeds buffer size: offset {} + data {} > buffer {}",
                offset,
                data.len(),
                self.size
            )));
        }

        let allocation = self.allocation.as_ref().ok_or_else(|| {
            RhiError::InvalidHandle("Buffer allocation is not available".to_string())
        })?;

        let mapped_ptr = allocation
            .mapped_ptr()
            .ok_or_else(|| RhiError::InvalidHandle("Buffer memory is not mapped".to_string()))?;

        unsafe {
            let dst = mapped_ptr.as_ptr().add(offset as usize);
            std::ptr::copy_nonoverlapping(data.as_ptr(), dst as *mut u8, data.len());
        }

        Ok(())
    }

    /// Returns the Vulkan buffer handle.
    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Returns the buffer size in bytes.
    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Returns the buffer usage type.
    #[inline]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        // Free the allocation first, then destroy the buffer
        if let Some(allocation) = self.allocation.take() {
            let mut allocator = self.device.allocator().lock().unwrap();
            if let Err(e) = allocator.free(allocation) {
                tracing::error!("Failed to free buffer allocation: {:?}", e);
            }
        }

        unsafe {
            self.device.handle().destroy_buffer(self.buffer, None);
        }

        debug!("Destroyed {} buffer", self.usage.name());
    }
}

/// Computes the per-element stride for an upload buffer.
///
/// Constant buffers round each element up to the 256-byte boundary the
/// hardware requires for uniform binding offsets; everything else packs
/// tightly.
#[inline]
pub const fn upload_stride(element_size: usize, is_constant_buffer: bool) -> usize {
    if is_constant_buffer {
        align_up(element_size, CONSTANT_BUFFER_ALIGNMENT)
    } else {
        element_size
    }
}

/// CPU-writable, GPU-readable array of fixed-size elements.
///
/// The memory is mapped once at construction and stays mapped for the
/// object's lifetime, avoiding per-frame map/unmap cost. Each element is
/// addressable by index at `index * stride`.
///
/// The caller must not overwrite a slot while the GPU may still be
/// reading it - in this core, the shell's flush-per-frame policy provides
/// that guarantee. The buffer must outlive any GPU read referencing it.
pub struct UploadBuffer<T: Pod> {
    buffer: Buffer,
    element_count: usize,
    stride: usize,
    _marker: PhantomData<T>,
}

impl<T: Pod> UploadBuffer<T> {
    /// Allocates a mapped upload buffer holding `element_count` elements.
    ///
    /// With `is_constant_buffer` set, each element's stride is rounded up
    /// to [`CONSTANT_BUFFER_ALIGNMENT`]; otherwise elements pack at
    /// `size_of::<T>()`.
    ///
    /// # Errors
    ///
    /// Returns an error if allocation fails.
    pub fn new(
        device: Arc<Device>,
        element_count: usize,
        is_constant_buffer: bool,
    ) -> RhiResult<Self> {
        let stride = upload_stride(std::mem::size_of::<T>(), is_constant_buffer);
        let usage = if is_constant_buffer {
            BufferUsage::Constant
        } else {
            BufferUsage::Staging
        };

        let buffer = Buffer::new(device, usage, (element_count * stride) as vk::DeviceSize)?;

        Ok(Self {
            buffer,
            element_count,
            stride,
            _marker: PhantomData,
        })
    }

    /// Writes `value` into the element slot at `index`.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if `index` is out of bounds; release builds
    /// surface the out-of-range write as an error from the underlying
    /// buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn copy_data(&self, index: usize, value: &T) -> RhiResult<()> {
        debug_assert!(index < self.element_count, "upload index out of bounds");
        self.buffer
            .write_data(self.offset_of(index), bytemuck::bytes_of(value))
    }

    /// Byte offset of the element at `index`.
    #[inline]
    pub fn offset_of(&self, index: usize) -> vk::DeviceSize {
        (index * self.stride) as vk::DeviceSize
    }

    /// Per-element stride in bytes.
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Number of element slots.
    #[inline]
    pub fn element_count(&self) -> usize {
        self.element_count
    }

    /// The underlying buffer handle, for descriptor writes.
    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }
}

/// A device-local buffer plus the transient staging buffer that filled it.
///
/// The staging buffer must stay alive until the recorded copy is known
/// complete (typically until the next queue flush); call
/// [`StagedBuffer::dispose_staging`] after that point to release it.
pub struct StagedBuffer {
    /// The GPU-local buffer, valid once the recorded copy completes.
    pub buffer: Buffer,
    staging: Option<Buffer>,
}

impl StagedBuffer {
    /// Releases the staging buffer. Only call once the upload copy has
    /// retired on the GPU.
    pub fn dispose_staging(&mut self) {
        self.staging = None;
    }

    /// Whether the staging buffer is still held.
    #[inline]
    pub fn has_staging(&self) -> bool {
        self.staging.is_some()
    }
}

/// Creates a device-local buffer initialized with `data`.
///
/// Allocates the GPU-local buffer and a CPU-visible staging buffer,
/// records a copy from staging to GPU-local into `cmd`, and records a
/// barrier transitioning the destination to shader-read usage. The copy
/// executes when the caller submits `cmd`; until that submission is known
/// complete the returned [`StagedBuffer`] must keep its staging half.
///
/// # Errors
///
/// Returns an error if either allocation or the staging write fails.
pub fn create_device_buffer(
    device: Arc<Device>,
    cmd: &CommandBuffer,
    data: &[u8],
    usage: BufferUsage,
) -> RhiResult<StagedBuffer> {
    debug_assert!(
        matches!(usage, BufferUsage::Vertex | BufferUsage::Index),
        "device-local uploads are for vertex/index data"
    );

    let size = data.len() as vk::DeviceSize;

    let staging = Buffer::new(device.clone(), BufferUsage::Staging, size)?;
    staging.write_data(0, data)?;

    let buffer = Buffer::new(device, usage, size)?;

    let region = vk::BufferCopy::default().size(size);
    cmd.copy_buffer(staging.handle(), buffer.handle(), std::slice::from_ref(&region));

    let dst_access = match usage {
        BufferUsage::Index => vk::AccessFlags::INDEX_READ,
        _ => vk::AccessFlags::VERTEX_ATTRIBUTE_READ,
    };

    let barrier = vk::BufferMemoryBarrier::default()
        .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
        .dst_access_mask(dst_access)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .buffer(buffer.handle())
        .size(vk::WHOLE_SIZE);

    cmd.buffer_barrier(
        vk::PipelineStageFlags::TRANSFER,
        vk::PipelineStageFlags::VERTEX_INPUT,
        std::slice::from_ref(&barrier),
    );

    debug!("Recorded device-local upload: {} bytes", size);

    Ok(StagedBuffer {
        buffer,
        staging: Some(staging),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 256), 0);
        assert_eq!(align_up(1, 256), 256);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_up(257, 256), 512);
        assert_eq!(align_up(64, 16), 64);
        assert_eq!(align_up(65, 16), 80);
    }

    #[test]
    fn test_upload_stride_constant_rounds_to_256() {
        // A 64-byte matrix occupies a full 256-byte slot as a constant
        assert_eq!(upload_stride(64, true), 256);
        assert_eq!(upload_stride(256, true), 256);
        assert_eq!(upload_stride(260, true), 512);
    }

    #[test]
    fn test_upload_stride_plain_is_exact() {
        assert_eq!(upload_stride(64, false), 64);
        assert_eq!(upload_stride(12, false), 12);
    }

    #[test]
    fn test_buffer_usage_to_vk_usage() {
        assert!(
            BufferUsage::Vertex
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST)
        );
        assert!(
            BufferUsage::Index
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST)
        );
        assert!(
            BufferUsage::Constant
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::UNIFORM_BUFFER)
        );
        assert!(
            BufferUsage::Staging
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::TRANSFER_SRC)
        );
    }

    #[test]
    fn test_buffer_usage_memory_location() {
        // Vertex/index live on the GPU and are filled via staging
        assert_eq!(BufferUsage::Vertex.memory_location(), MemoryLocation::GpuOnly);
        assert_eq!(BufferUsage::Index.memory_location(), MemoryLocation::GpuOnly);
        assert_eq!(
            BufferUsage::Constant.memory_location(),
            MemoryLocation::CpuToGpu
        );
        assert_eq!(
            BufferUsage::Staging.memory_location(),
            MemoryLocation::CpuToGpu
        );
    }
}
