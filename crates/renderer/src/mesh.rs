//! Mesh geometry with submesh addressing.
//!
//! A [`MeshGeometry`] packs one or more shapes' vertex and index data
//! into shared GPU buffers: one buffer per parallel vertex stream plus
//! one index buffer. A [`Submesh`] is a lightweight (offset, count) view
//! into those shared ranges, so a single upload serves many draw calls.
//!
//! The CPU-side copies of the data stay with the geometry; the transient
//! staging buffers used for the GPU upload can be released once the copy
//! commands are known complete via
//! [`MeshGeometry::dispose_uploaders`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use glint_rhi::command::CommandBuffer;
//! use glint_rhi::device::Device;
//! use glint_renderer::mesh::{IndexData, MeshGeometry, Submesh, VertexStreamDesc};
//!
//! # fn example(device: Arc<Device>, cmd: &CommandBuffer) -> Result<(), glint_rhi::RhiError> {
//! let positions: Vec<f32> = vec![0.0; 24];
//! let indices: Vec<u16> = vec![0, 1, 2];
//!
//! let mut mesh = MeshGeometry::new(
//!     device,
//!     cmd,
//!     "triangle",
//!     &[VertexStreamDesc {
//!         data: bytemuck::cast_slice(&positions),
//!         stride: 12,
//!     }],
//!     IndexData::U16(&indices),
//! )?;
//! mesh.add_submesh("tri", Submesh::new(3, 0, 0));
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use ash::vk;
use tracing::info;

use glint_rhi::buffer::{BufferUsage, StagedBuffer, create_device_buffer};
use glint_rhi::command::CommandBuffer;
use glint_rhi::device::Device;
use glint_rhi::RhiResult;

/// A view selecting a sub-range of a [`MeshGeometry`]'s shared buffers.
///
/// Drawing a submesh issues an indexed draw of `index_count` indices
/// starting at `start_index_location`, with vertex lookups rebased by
/// `base_vertex_location`.
///
/// Invariant (caller's duty, not range-checked by this layer):
/// `start_index_location + index_count <= total index count`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Submesh {
    /// Number of indices to draw.
    pub index_count: u32,
    /// First index within the shared index buffer.
    pub start_index_location: u32,
    /// Value added to each index before the vertex lookup.
    pub base_vertex_location: i32,
}

impl Submesh {
    /// Creates a new submesh record.
    #[inline]
    pub const fn new(index_count: u32, start_index_location: u32, base_vertex_location: i32) -> Self {
        Self {
            index_count,
            start_index_location,
            base_vertex_location,
        }
    }

    /// Resolves the global vertex indices this submesh references within
    /// the shared buffers.
    ///
    /// Useful for CPU-side validation and picking against the staging
    /// copies.
    ///
    /// # Panics
    ///
    /// Panics if the submesh range exceeds `indices` - the same
    /// out-of-bounds condition that is undefined on the GPU.
    pub fn resolve_indices(&self, indices: &[u32]) -> Vec<u32> {
        let start = self.start_index_location as usize;
        let end = start + self.index_count as usize;
        indices[start..end]
            .iter()
            .map(|&i| (i64::from(i) + i64::from(self.base_vertex_location)) as u32)
            .collect()
    }
}

/// Index data for a mesh, 16- or 32-bit.
///
/// Shapes with fewer than 65536 vertices fit 16-bit indices, halving
/// index bandwidth.
pub enum IndexData<'a> {
    U16(&'a [u16]),
    U32(&'a [u32]),
}

impl IndexData<'_> {
    /// The Vulkan index type for this data.
    pub fn index_type(&self) -> vk::IndexType {
        match self {
            IndexData::U16(_) => vk::IndexType::UINT16,
            IndexData::U32(_) => vk::IndexType::UINT32,
        }
    }

    /// Number of indices.
    pub fn count(&self) -> u32 {
        match self {
            IndexData::U16(data) => data.len() as u32,
            IndexData::U32(data) => data.len() as u32,
        }
    }

    /// Raw bytes for the GPU upload.
    pub fn bytes(&self) -> &[u8] {
        match self {
            IndexData::U16(data) => bytemuck::cast_slice(data),
            IndexData::U32(data) => bytemuck::cast_slice(data),
        }
    }

    /// Indices widened to u32 for CPU-side use.
    pub fn to_u32_vec(&self) -> Vec<u32> {
        match self {
            IndexData::U16(data) => data.iter().map(|&i| u32::from(i)).collect(),
            IndexData::U32(data) => data.to_vec(),
        }
    }
}

/// Describes one vertex stream's data for upload.
pub struct VertexStreamDesc<'a> {
    /// Raw vertex bytes.
    pub data: &'a [u8],
    /// Per-vertex stride in bytes.
    pub stride: u32,
}

/// One uploaded vertex stream.
struct VertexStream {
    staged: StagedBuffer,
    stride: u32,
    cpu: Vec<u8>,
}

/// Shared GPU vertex/index storage plus named submesh views.
pub struct MeshGeometry {
    /// Geometry name, for logs.
    name: String,
    /// Parallel vertex streams, bound to consecutive pipeline bindings.
    streams: Vec<VertexStream>,
    /// Shared index buffer.
    index_staged: StagedBuffer,
    /// CPU copy of the index data, widened to u32.
    index_cpu: Vec<u32>,
    /// Index element type.
    index_type: vk::IndexType,
    /// Total index count across all submeshes.
    index_count: u32,
    /// Named submesh views into the shared ranges.
    submeshes: HashMap<String, Submesh>,
}

impl MeshGeometry {
    /// Uploads vertex streams and index data into device-local buffers.
    ///
    /// Copy commands are recorded into `cmd`; the geometry is valid once
    /// the caller submits the commands and the queue fence confirms
    /// completion. Until then the internal staging buffers must stay
    /// alive (they do, until [`Self::dispose_uploaders`]).
    ///
    /// # Errors
    ///
    /// Returns an error if any buffer allocation or staging write fails.
    pub fn new(
        device: Arc<Device>,
        cmd: &CommandBuffer,
        name: &str,
        streams: &[VertexStreamDesc<'_>],
        indices: IndexData<'_>,
    ) -> RhiResult<Self> {
        debug_assert!(!streams.is_empty(), "mesh needs at least one vertex stream");

        let mut uploaded = Vec::with_capacity(streams.len());
        for desc in streams {
            let staged =
                create_device_buffer(device.clone(), cmd, desc.data, BufferUsage::Vertex)?;
            uploaded.push(VertexStream {
                staged,
                stride: desc.stride,
                cpu: desc.data.to_vec(),
            });
        }

        let index_staged = create_device_buffer(device, cmd, indices.bytes(), BufferUsage::Index)?;

        info!(
            "Mesh '{}' uploaded: {} stream(s), {} indices",
            name,
            uploaded.len(),
            indices.count()
        );

        Ok(Self {
            name: name.to_string(),
            streams: uploaded,
            index_staged,
            index_cpu: indices.to_u32_vec(),
            index_type: indices.index_type(),
            index_count: indices.count(),
            submeshes: HashMap::new(),
        })
    }

    /// Registers a named submesh view.
    pub fn add_submesh(&mut self, name: &str, submesh: Submesh) {
        self.submeshes.insert(name.to_string(), submesh);
    }

    /// Looks up a submesh by name.
    pub fn submesh(&self, name: &str) -> Option<&Submesh> {
        self.submeshes.get(name)
    }

    /// Geometry name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Vertex buffer handles, one per stream, in binding order.
    pub fn vertex_buffers(&self) -> Vec<vk::Buffer> {
        self.streams.iter().map(|s| s.staged.buffer.handle()).collect()
    }

    /// Per-stream strides in binding order.
    pub fn vertex_strides(&self) -> Vec<u32> {
        self.streams.iter().map(|s| s.stride).collect()
    }

    /// The shared index buffer handle.
    #[inline]
    pub fn index_buffer(&self) -> vk::Buffer {
        self.index_staged.buffer.handle()
    }

    /// The index element type.
    #[inline]
    pub fn index_type(&self) -> vk::IndexType {
        self.index_type
    }

    /// Total number of indices in the shared buffer.
    #[inline]
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// CPU copy of the index data, widened to u32.
    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.index_cpu
    }

    /// CPU copy of a vertex stream's bytes.
    pub fn stream_bytes(&self, stream: usize) -> &[u8] {
        &self.streams[stream].cpu
    }

    /// Records the bindings and indexed draw for a named submesh.
    ///
    /// # Panics
    ///
    /// Panics if `name` is not a registered submesh.
    pub fn record_draw(&self, cmd: &CommandBuffer, name: &str) {
        let submesh = self.submeshes[name];

        let buffers = self.vertex_buffers();
        let offsets = vec![0; buffers.len()];
        cmd.bind_vertex_buffers(0, &buffers, &offsets);
        cmd.bind_index_buffer(self.index_buffer(), 0, self.index_type);
        cmd.draw_indexed(
            submesh.index_count,
            1,
            submesh.start_index_location,
            submesh.base_vertex_location,
            0,
        );
    }

    /// Releases the staging halves of every upload.
    ///
    /// Only call once the upload commands are known complete (after the
    /// queue flush that follows setup).
    pub fn dispose_uploaders(&mut self) {
        for stream in &mut self.streams {
            stream.staged.dispose_staging();
        }
        self.index_staged.dispose_staging();
        info!("Mesh '{}' staging buffers released", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Two shapes concatenated into shared buffers: A with 4 vertices and
    // 6 indices, B with 3 vertices and 3 indices.
    fn concatenated_indices() -> Vec<u32> {
        let shape_a = [0u32, 1, 2, 0, 2, 3];
        let shape_b = [0u32, 1, 2];
        shape_a.iter().chain(shape_b.iter()).copied().collect()
    }

    #[test]
    fn test_submesh_resolves_own_range() {
        let indices = concatenated_indices();

        let a = Submesh::new(6, 0, 0);
        let b = Submesh::new(3, 6, 4);

        let a_resolved = a.resolve_indices(&indices);
        assert_eq!(a_resolved, vec![0, 1, 2, 0, 2, 3]);

        // B reads exactly indices [6, 9) and rebases by A's vertex count
        let b_resolved = b.resolve_indices(&indices);
        assert_eq!(b_resolved, vec![4, 5, 6]);
        assert!(b_resolved.iter().all(|&v| v >= 4 && v < 7));
    }

    #[test]
    fn test_submesh_triangle_reconstruction() {
        let indices = concatenated_indices();
        let b = Submesh::new(3, 6, 4);

        let resolved = b.resolve_indices(&indices);
        let triangles: Vec<[u32; 3]> = resolved
            .chunks_exact(3)
            .map(|t| [t[0], t[1], t[2]])
            .collect();

        assert_eq!(triangles, vec![[4, 5, 6]]);
    }

    #[test]
    #[should_panic]
    fn test_submesh_out_of_range_panics_on_cpu() {
        let indices = concatenated_indices();
        // start + count exceeds the shared buffer
        let bad = Submesh::new(6, 6, 0);
        let _ = bad.resolve_indices(&indices);
    }

    #[test]
    fn test_index_data_types() {
        let u16_data = [0u16, 1, 2];
        let u32_data = [0u32, 1, 2, 3];

        let small = IndexData::U16(&u16_data);
        assert_eq!(small.index_type(), vk::IndexType::UINT16);
        assert_eq!(small.count(), 3);
        assert_eq!(small.bytes().len(), 6);
        assert_eq!(small.to_u32_vec(), vec![0, 1, 2]);

        let large = IndexData::U32(&u32_data);
        assert_eq!(large.index_type(), vk::IndexType::UINT32);
        assert_eq!(large.count(), 4);
        assert_eq!(large.bytes().len(), 16);
    }
}
