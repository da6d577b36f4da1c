use glam::Vec3;
use parking_lot::Mutex;

use crate::config::DEFAULT_MAX_STORAGE_BLOCK_SIZE;
use crate::core::records::{ClusterInfo, ClusterRecord, GpuClusterBounds, GpuLightClusterData};
use crate::error::{ClusterError, Result};
use crate::geometry::{Aabb, Sphere};
use crate::gpu::AssignmentBackend;

#[derive(Debug, Default, Clone)]
struct AssignmentOutput {
    cluster_list: Vec<ClusterRecord>,
    items: Vec<u32>,
}

#[derive(Debug, Default)]
struct ReferenceState {
    slots_per_cluster: usize,
    bounds: Vec<Aabb>,
    lights: Vec<Sphere>,
    point_count: usize,
    pending: Option<AssignmentOutput>,
    published: AssignmentOutput,
    dispatch_count: usize,
}

/// Runs the assignment dispatch on the host.
///
/// Each cluster owns a fixed run of `item_list_count / cluster_list_count`
/// item slots; lights beyond that budget are dropped. Point lights are kept first,
/// so spot lights are the first to go.
/// Results of a dispatch stay invisible until [`AssignmentBackend::barrier`].
#[derive(Debug)]
pub struct CpuReferenceBackend {
    max_storage_block_size: usize,
    state: Mutex<ReferenceState>,
}

impl Default for CpuReferenceBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuReferenceBackend {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_STORAGE_BLOCK_SIZE)
    }

    pub fn with_limit(max_storage_block_size: usize) -> Self {
        Self {
            max_storage_block_size,
            state: Mutex::new(ReferenceState::default()),
        }
    }

    /// Cluster list as of the last barrier.
    pub fn cluster_list(&self) -> Vec<ClusterRecord> {
        self.state.lock().published.cluster_list.clone()
    }

    /// Item list as of the last barrier.
    pub fn item_list(&self) -> Vec<u32> {
        self.state.lock().published.items.clone()
    }

    pub fn has_pending_results(&self) -> bool {
        self.state.lock().pending.is_some()
    }

    pub fn dispatch_count(&self) -> usize {
        self.state.lock().dispatch_count
    }

    pub fn slots_per_cluster(&self) -> usize {
        self.state.lock().slots_per_cluster
    }
}

impl AssignmentBackend for CpuReferenceBackend {
    fn name(&self) -> &str {
        "cpu-reference"
    }

    fn max_storage_block_size(&self) -> usize {
        self.max_storage_block_size
    }

    fn upload_cluster_bounds(&self, info: &ClusterInfo, bounds: &[GpuClusterBounds]) -> Result<()> {
        if info.cluster_list_count as usize != bounds.len() {
            return Err(ClusterError::InvalidConfiguration(format!(
                "{} cluster bounds uploaded for {} clusters",
                bounds.len(),
                info.cluster_list_count
            )));
        }
        let mut state = self.state.lock();
        state.slots_per_cluster = if bounds.is_empty() {
            0
        } else {
            info.item_list_count as usize / bounds.len()
        };
        state.bounds = bounds
            .iter()
            .map(|b| {
                let center = Vec3::from_array(b.center);
                let extents = Vec3::from_array(b.extents);
                Aabb::new(center - extents, center + extents)
            })
            .collect();
        Ok(())
    }

    fn upload_lights(&self, lights: &[GpuLightClusterData], point_count: usize) -> Result<()> {
        let mut state = self.state.lock();
        state.lights = lights
            .iter()
            .map(|l| Sphere::new(Vec3::from_array(l.view_center), l.radius))
            .collect();
        state.point_count = point_count.min(lights.len());
        Ok(())
    }

    fn dispatch(&self, groups: [u32; 3]) -> Result<()> {
        let mut state = self.state.lock();
        let group_count = groups.iter().map(|&g| g as usize).product::<usize>();
        if state.bounds.is_empty() || group_count != state.bounds.len() {
            return Err(ClusterError::Device(format!(
                "dispatch of {group_count} groups over {} uploaded clusters",
                state.bounds.len()
            )));
        }

        let slots = state.slots_per_cluster;
        let mut output = AssignmentOutput {
            cluster_list: Vec::with_capacity(state.bounds.len()),
            items: vec![0; slots * state.bounds.len()],
        };
        for (cluster, aabb) in state.bounds.iter().enumerate() {
            let offset = cluster * slots;
            let mut written = 0usize;
            let mut point_count = 0u16;
            let mut spot_count = 0u16;
            for (index, light) in state.lights.iter().enumerate() {
                if written == slots {
                    break;
                }
                if !light.intersects_aabb(aabb) {
                    continue;
                }
                if index < state.point_count {
                    output.items[offset + written] = index as u32;
                    point_count += 1;
                } else {
                    output.items[offset + written] = (index - state.point_count) as u32;
                    spot_count += 1;
                }
                written += 1;
            }
            output.cluster_list.push(ClusterRecord {
                offset: offset as u32,
                point_count,
                spot_count,
            });
        }

        state.pending = Some(output);
        state.dispatch_count += 1;
        Ok(())
    }

    fn barrier(&self) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(output) = state.pending.take() {
            state.published = output;
        }
        Ok(())
    }
}
