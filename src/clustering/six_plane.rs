use std::time::{Duration, Instant};

use crate::clustering::base::ClusterBase;
use crate::clustering::packing::{ClusterCache, PackedClusters};
use crate::core::{ClusterCamera, ClusterRecord, ClustererParameters, LightSet, Viewport};
use crate::error::Result;
use crate::geometry::Sphere;
use crate::gpu::ClusterBufferSink;
use crate::grid::ClusterBounds;
use crate::utils::logging::TraceSpan;
use crate::utils::profiling::ScopedTimer;

/// Brute-force clusterer testing every light against the six planes of every cell.
pub struct SixPlaneClusterer {
    base: ClusterBase,
    output: PackedClusters,
    bounds: Vec<ClusterBounds>,
}

impl SixPlaneClusterer {
    pub fn new(
        params: ClustererParameters,
        viewport: Viewport,
        sink: Box<dyn ClusterBufferSink>,
    ) -> Self {
        Self {
            base: ClusterBase::new(params, viewport),
            output: PackedClusters::new(sink),
            bounds: Vec::new(),
        }
    }

    pub fn base(&self) -> &ClusterBase {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut ClusterBase {
        &mut self.base
    }

    pub fn output(&self) -> &PackedClusters {
        &self.output
    }

    pub fn cluster_list(&self) -> &[ClusterRecord] {
        self.output.cluster_list()
    }

    pub fn items(&self) -> &[u32] {
        self.output.items()
    }

    pub fn cluster_lights(
        &mut self,
        camera: &ClusterCamera,
        viewport: Viewport,
        lights: LightSet<'_>,
    ) -> Result<()> {
        let frame_start = Instant::now();
        let _span = TraceSpan::new("cluster::six_plane", lights.len());

        if self.base.begin_frame(camera, viewport, &lights)? {
            if let Err(err) = self.rebuild() {
                self.base.mark_dirty();
                return Err(err);
            }
        }

        self.output.begin_frame();
        let mut assignment = Duration::ZERO;
        {
            let _timer = ScopedTimer::new(&mut assignment);
            let cache = self.output.cache_mut();
            assign_spheres(&self.bounds, &self.base.point_spheres, cache, ClusterCache::push_point);
            assign_spheres(&self.bounds, &self.base.spot_spheres, cache, ClusterCache::push_spot);
        }

        let mut packing = Duration::ZERO;
        {
            let _timer = ScopedTimer::new(&mut packing);
            self.output.pack_and_upload(&mut self.base.info)?;
        }
        self.base.profiler.packing_time = packing;
        record_output_stats(&mut self.base, &self.output);
        self.base.end_frame(frame_start, assignment);
        Ok(())
    }

    fn rebuild(&mut self) -> Result<()> {
        let Some(grid) = self.base.grid.as_ref() else {
            return Ok(());
        };
        self.bounds = grid.cell_bounds();
        self.output.rebuild(
            &mut self.base.info,
            self.base.params.avg_items_per_cluster,
            grid.cluster_count(),
        )
    }
}

fn assign_spheres(
    bounds: &[ClusterBounds],
    spheres: &[Sphere],
    cache: &mut ClusterCache,
    push: fn(&mut ClusterCache, usize, u32),
) {
    for (light, sphere) in spheres.iter().enumerate() {
        for (cluster, cell) in bounds.iter().enumerate() {
            if cell.intersects_sphere(sphere) {
                push(cache, cluster, light as u32);
            }
        }
    }
}

/// Fills the item statistics of the profiler from a packed frame.
pub(crate) fn record_output_stats(base: &mut ClusterBase, output: &PackedClusters) {
    let records = output.cluster_list();
    base.profiler.item_count = output.items().len();
    base.profiler.non_empty_cluster_count = records.iter().filter(|r| r.item_count() > 0).count();
    base.profiler.max_items_in_cluster =
        records.iter().map(ClusterRecord::item_count).max().unwrap_or(0);
}
