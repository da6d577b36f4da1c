use std::mem::size_of;
use std::time::{Duration, Instant};

use crate::clustering::base::ClusterBase;
use crate::config::{GPU_ALLOWED_ITEMS_PER_CLUSTER, GPU_ALLOWED_LIGHTS};
use crate::core::{
    ClusterCamera, ClusterRecord, ClustererParameters, GpuClusterBounds, GpuLightClusterData,
    LightSet, Viewport,
};
use crate::error::{ClusterError, Result};
use crate::gpu::{AssignmentBackend, BufferBinding};
use crate::utils::logging::TraceSpan;
use crate::utils::profiling::ScopedTimer;

/// Clusterer that only prepares device buffers; the per-cluster light test
/// runs in the backend's dispatch.
///
/// Every cluster owns a fixed run of `GPU_ALLOWED_ITEMS_PER_CLUSTER` item
/// slots. Cluster bounds are re-uploaded after each grid rebuild; lights are
/// uploaded every frame, followed by the dispatch and the barrier that makes
/// the lists visible to the shading pass.
pub struct GpuAssignmentClusterer {
    base: ClusterBase,
    backend: Box<dyn AssignmentBackend>,
    bounds: Vec<GpuClusterBounds>,
    lights: Vec<GpuLightClusterData>,
}

impl GpuAssignmentClusterer {
    pub fn new(
        params: ClustererParameters,
        viewport: Viewport,
        backend: Box<dyn AssignmentBackend>,
    ) -> Self {
        Self {
            base: ClusterBase::new(params, viewport),
            backend,
            bounds: Vec::new(),
            lights: Vec::new(),
        }
    }

    pub fn base(&self) -> &ClusterBase {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut ClusterBase {
        &mut self.base
    }

    pub fn backend(&self) -> &dyn AssignmentBackend {
        self.backend.as_ref()
    }

    /// Cluster AABBs uploaded with the current grid, in cluster index order.
    pub fn cluster_bounds(&self) -> &[GpuClusterBounds] {
        &self.bounds
    }

    pub fn cluster_lights(
        &mut self,
        camera: &ClusterCamera,
        viewport: Viewport,
        lights: LightSet<'_>,
    ) -> Result<()> {
        let frame_start = Instant::now();
        let _span = TraceSpan::new("cluster::gpu_assignment", lights.len());

        if self.base.begin_frame(camera, viewport, &lights)? {
            if let Err(err) = self.rebuild() {
                self.base.mark_dirty();
                return Err(err);
            }
        }
        let Some(grid) = self.base.grid.as_ref() else {
            return Ok(());
        };
        let dims = grid.dims();

        let mut assignment = Duration::ZERO;
        {
            let _timer = ScopedTimer::new(&mut assignment);
            let total = self.base.point_spheres.len() + self.base.spot_spheres.len();
            if total > GPU_ALLOWED_LIGHTS {
                log::warn!(
                    "{} lights exceed the GPU assignment budget of {}, extra lights are skipped",
                    total,
                    GPU_ALLOWED_LIGHTS
                );
            }
            let point_count = self.base.point_spheres.len().min(GPU_ALLOWED_LIGHTS);
            let spot_count = self.base.spot_spheres.len().min(GPU_ALLOWED_LIGHTS - point_count);

            self.lights.clear();
            self.lights.extend(
                self.base.point_spheres[..point_count]
                    .iter()
                    .chain(&self.base.spot_spheres[..spot_count])
                    .map(|s| GpuLightClusterData {
                        view_center: s.center.to_array(),
                        radius: s.radius,
                    }),
            );
            check_size(
                BufferBinding::LightData,
                self.lights.len() * size_of::<GpuLightClusterData>(),
                self.backend.max_storage_block_size(),
            )?;

            self.backend.upload_lights(&self.lights, point_count)?;
            self.backend.dispatch([dims.x, dims.y, dims.z])?;
            // Dispatch, barrier, consume.
            self.backend.barrier()?;
        }

        self.base.end_frame(frame_start, assignment);
        Ok(())
    }

    fn rebuild(&mut self) -> Result<()> {
        let Some(grid) = self.base.grid.as_ref() else {
            return Ok(());
        };
        let cluster_count = grid.cluster_count();
        let limit = self.backend.max_storage_block_size();
        let item_count = GPU_ALLOWED_ITEMS_PER_CLUSTER as usize * cluster_count;
        check_size(BufferBinding::ItemList, item_count * size_of::<u32>(), limit)?;
        check_size(
            BufferBinding::ClusterList,
            cluster_count * size_of::<ClusterRecord>(),
            limit,
        )?;
        check_size(
            BufferBinding::ClusterBounds,
            cluster_count * size_of::<GpuClusterBounds>(),
            limit,
        )?;

        self.bounds = grid
            .cell_aabbs()
            .iter()
            .map(|aabb| GpuClusterBounds {
                center: aabb.center().to_array(),
                extents: aabb.half_extents().to_array(),
                ..Default::default()
            })
            .collect();

        self.base.info.item_list_count = item_count as u32;
        self.base.info.cluster_list_count = cluster_count as u32;
        log::debug!(
            "Uploading {} cluster bounds to {}",
            self.bounds.len(),
            self.backend.name()
        );
        self.backend.upload_cluster_bounds(&self.base.info, &self.bounds)
    }
}

fn check_size(binding: BufferBinding, bytes: usize, limit: usize) -> Result<()> {
    if bytes > limit {
        return Err(ClusterError::BufferTooLarge {
            buffer: binding.label(),
            requested: bytes,
            limit,
        });
    }
    Ok(())
}
