pub mod ash_backend;
pub mod reference;

pub use ash_backend::AshBackend;
pub use reference::CpuReferenceBackend;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::{
    DEFAULT_MAX_STORAGE_BLOCK_SIZE, LIGHT_CLUSTER_DATA_BINDING_POINT,
    LIGHT_CLUSTER_INFO_BINDING_POINT, LIGHT_CLUSTER_ITEM_LIST_BINDING_POINT,
    LIGHT_CLUSTER_LIST_BINDING_POINT, LIGHT_CLUSTER_STRUCTURES_BINDING_POINT,
    LIGHT_INFO_BINDING_POINT,
};
use crate::core::records::{ClusterInfo, GpuClusterBounds, GpuLightClusterData};
use crate::error::Result;

/// Buffers exchanged with the shading stage and the assignment dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferBinding {
    LightInfo,
    ClusterInfo,
    ClusterList,
    ItemList,
    LightData,
    ClusterBounds,
}

impl BufferBinding {
    pub fn binding_point(self) -> u32 {
        match self {
            Self::LightInfo => LIGHT_INFO_BINDING_POINT,
            Self::ClusterInfo => LIGHT_CLUSTER_INFO_BINDING_POINT,
            Self::ClusterList => LIGHT_CLUSTER_LIST_BINDING_POINT,
            Self::ItemList => LIGHT_CLUSTER_ITEM_LIST_BINDING_POINT,
            Self::LightData => LIGHT_CLUSTER_DATA_BINDING_POINT,
            Self::ClusterBounds => LIGHT_CLUSTER_STRUCTURES_BINDING_POINT,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::LightInfo => "light info",
            Self::ClusterInfo => "cluster info",
            Self::ClusterList => "cluster list",
            Self::ItemList => "item list",
            Self::LightData => "light cluster data",
            Self::ClusterBounds => "cluster bounds",
        }
    }
}

/// Destination of the packed buffers produced by the CPU clusterers.
///
/// `allocate` (re)creates a buffer with the given size and contents,
/// `update` overwrites its leading bytes. Buffers must be bound before the
/// shading pass reads them. Storage replaced by `allocate` or by a growing
/// `update` stays alive until [`ClusterBufferSink::release_retired`].
pub trait ClusterBufferSink: Send + Sync {
    fn name(&self) -> &str;

    /// Largest buffer the device accepts for a shader storage block, in bytes.
    fn max_storage_block_size(&self) -> usize {
        DEFAULT_MAX_STORAGE_BLOCK_SIZE
    }

    fn allocate(&self, binding: BufferBinding, bytes: &[u8]) -> Result<()>;

    fn update(&self, binding: BufferBinding, bytes: &[u8]) -> Result<()>;

    fn bind(&self, _binding: BufferBinding) -> Result<()> {
        Ok(())
    }

    /// Frees storage replaced in earlier frames. Call once the frame fence
    /// shows the GPU no longer reads it.
    fn release_retired(&self) -> Result<()> {
        Ok(())
    }
}

/// Device side of the GPU assignment strategy.
///
/// Per frame the clusterer calls `upload_lights`, then `dispatch`, then
/// `barrier`; results are only valid for the shading pass after `barrier`.
pub trait AssignmentBackend: Send + Sync {
    fn name(&self) -> &str;

    fn max_storage_block_size(&self) -> usize {
        DEFAULT_MAX_STORAGE_BLOCK_SIZE
    }

    /// Called after every grid rebuild with one AABB per cluster.
    fn upload_cluster_bounds(&self, info: &ClusterInfo, bounds: &[GpuClusterBounds]) -> Result<()>;

    /// Point lights occupy `lights[..point_count]`, spot lights follow.
    fn upload_lights(&self, lights: &[GpuLightClusterData], point_count: usize) -> Result<()>;

    /// Launches one workgroup per cluster.
    fn dispatch(&self, groups: [u32; 3]) -> Result<()>;

    /// Makes the dispatch results visible to the shading pass.
    fn barrier(&self) -> Result<()>;

    /// Same contract as [`ClusterBufferSink::release_retired`].
    fn release_retired(&self) -> Result<()> {
        Ok(())
    }
}

impl<T: ClusterBufferSink + ?Sized> ClusterBufferSink for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn max_storage_block_size(&self) -> usize {
        (**self).max_storage_block_size()
    }

    fn allocate(&self, binding: BufferBinding, bytes: &[u8]) -> Result<()> {
        (**self).allocate(binding, bytes)
    }

    fn update(&self, binding: BufferBinding, bytes: &[u8]) -> Result<()> {
        (**self).update(binding, bytes)
    }

    fn bind(&self, binding: BufferBinding) -> Result<()> {
        (**self).bind(binding)
    }

    fn release_retired(&self) -> Result<()> {
        (**self).release_retired()
    }
}

impl<T: AssignmentBackend + ?Sized> AssignmentBackend for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn max_storage_block_size(&self) -> usize {
        (**self).max_storage_block_size()
    }

    fn upload_cluster_bounds(&self, info: &ClusterInfo, bounds: &[GpuClusterBounds]) -> Result<()> {
        (**self).upload_cluster_bounds(info, bounds)
    }

    fn upload_lights(&self, lights: &[GpuLightClusterData], point_count: usize) -> Result<()> {
        (**self).upload_lights(lights, point_count)
    }

    fn dispatch(&self, groups: [u32; 3]) -> Result<()> {
        (**self).dispatch(groups)
    }

    fn barrier(&self) -> Result<()> {
        (**self).barrier()
    }

    fn release_retired(&self) -> Result<()> {
        (**self).release_retired()
    }
}

/// Default backend that discards uploads and performs no device work.
#[derive(Debug, Default)]
pub struct NoopBackend;

impl NoopBackend {
    pub fn new() -> Self {
        Self
    }
}

impl ClusterBufferSink for NoopBackend {
    fn name(&self) -> &str {
        "cpu-noop"
    }

    fn allocate(&self, _binding: BufferBinding, _bytes: &[u8]) -> Result<()> {
        Ok(())
    }

    fn update(&self, _binding: BufferBinding, _bytes: &[u8]) -> Result<()> {
        Ok(())
    }
}

impl AssignmentBackend for NoopBackend {
    fn name(&self) -> &str {
        "cpu-noop"
    }

    fn upload_cluster_bounds(
        &self,
        _info: &ClusterInfo,
        _bounds: &[GpuClusterBounds],
    ) -> Result<()> {
        Ok(())
    }

    fn upload_lights(&self, _lights: &[GpuLightClusterData], _point_count: usize) -> Result<()> {
        Ok(())
    }

    fn dispatch(&self, _groups: [u32; 3]) -> Result<()> {
        Ok(())
    }

    fn barrier(&self) -> Result<()> {
        Ok(())
    }
}

/// Host-memory sink keeping the latest bytes of every binding.
///
/// Useful for CPU consumers of the cluster lists and for inspecting what the
/// shading stage would read.
#[derive(Debug)]
pub struct HostBuffers {
    max_storage_block_size: usize,
    buffers: Mutex<HashMap<BufferBinding, Vec<u8>>>,
    allocations: Mutex<HashMap<BufferBinding, usize>>,
    retired: Mutex<Vec<(BufferBinding, Vec<u8>)>>,
}

impl Default for HostBuffers {
    fn default() -> Self {
        Self::with_limit(DEFAULT_MAX_STORAGE_BLOCK_SIZE)
    }
}

impl HostBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(max_storage_block_size: usize) -> Self {
        Self {
            max_storage_block_size,
            buffers: Mutex::new(HashMap::new()),
            allocations: Mutex::new(HashMap::new()),
            retired: Mutex::new(Vec::new()),
        }
    }

    /// Copy of the current contents of `binding`.
    pub fn contents(&self, binding: BufferBinding) -> Option<Vec<u8>> {
        self.buffers.lock().get(&binding).cloned()
    }

    /// Number of `allocate` calls seen for `binding`.
    pub fn allocation_count(&self, binding: BufferBinding) -> usize {
        self.allocations.lock().get(&binding).copied().unwrap_or(0)
    }

    /// Replaced buffers of `binding` still waiting for `release_retired`.
    pub fn retired_count(&self, binding: BufferBinding) -> usize {
        self.retired.lock().iter().filter(|(b, _)| *b == binding).count()
    }
}

impl ClusterBufferSink for HostBuffers {
    fn name(&self) -> &str {
        "host-memory"
    }

    fn max_storage_block_size(&self) -> usize {
        self.max_storage_block_size
    }

    fn allocate(&self, binding: BufferBinding, bytes: &[u8]) -> Result<()> {
        if let Some(old) = self.buffers.lock().insert(binding, bytes.to_vec()) {
            self.retired.lock().push((binding, old));
        }
        *self.allocations.lock().entry(binding).or_insert(0) += 1;
        Ok(())
    }

    fn update(&self, binding: BufferBinding, bytes: &[u8]) -> Result<()> {
        let mut buffers = self.buffers.lock();
        let buffer = buffers.entry(binding).or_default();
        if buffer.len() < bytes.len() {
            if !buffer.is_empty() {
                self.retired.lock().push((binding, buffer.clone()));
            }
            buffer.resize(bytes.len(), 0);
        }
        buffer[..bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn release_retired(&self) -> Result<()> {
        self.retired.lock().clear();
        Ok(())
    }
}
