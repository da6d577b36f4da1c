use std::time::{Duration, Instant};

use glam::Mat4;

use crate::core::{ClusterCamera, ClusterInfo, ClustererParameters, LightSet, Viewport};
use crate::error::Result;
use crate::geometry::Sphere;
use crate::grid::ClusterGrid;
use crate::utils::profiling::{AssignmentTimings, ClusterProfiler, ScopedTimer};

/// State shared by every clustering strategy: parameters, the grid and its
/// dirty tracking, the info record, per-frame view-space light spheres and
/// statistics.
#[derive(Debug)]
pub struct ClusterBase {
    pub(crate) params: ClustererParameters,
    pub(crate) viewport: Viewport,
    cached_camera: Option<(Mat4, f32, f32)>,
    clusters_dirty: bool,
    pub(crate) grid: Option<ClusterGrid>,
    pub(crate) info: ClusterInfo,
    pub(crate) point_spheres: Vec<Sphere>,
    pub(crate) spot_spheres: Vec<Sphere>,
    pub(crate) profiler: ClusterProfiler,
    pub(crate) timings: AssignmentTimings,
}

impl ClusterBase {
    pub fn new(params: ClustererParameters, viewport: Viewport) -> Self {
        Self {
            params,
            viewport,
            cached_camera: None,
            clusters_dirty: true,
            grid: None,
            info: ClusterInfo::default(),
            point_spheres: Vec::new(),
            spot_spheres: Vec::new(),
            profiler: ClusterProfiler::default(),
            timings: AssignmentTimings::default(),
        }
    }

    pub fn params(&self) -> &ClustererParameters {
        &self.params
    }

    pub fn set_parameters(&mut self, params: ClustererParameters) {
        if self.params != params {
            self.params = params;
            self.clusters_dirty = true;
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        let viewport = Viewport::new(width, height);
        if self.viewport != viewport {
            log::debug!("Cluster viewport resized to {width}x{height}");
            self.viewport = viewport;
            self.clusters_dirty = true;
        }
    }

    pub fn mark_dirty(&mut self) {
        self.clusters_dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.clusters_dirty
    }

    pub fn grid(&self) -> Option<&ClusterGrid> {
        self.grid.as_ref()
    }

    pub fn info(&self) -> &ClusterInfo {
        &self.info
    }

    pub fn profiler(&self) -> &ClusterProfiler {
        &self.profiler
    }

    pub fn timings(&self) -> &AssignmentTimings {
        &self.timings
    }

    /// Starts a frame: rebuilds the grid when the projection, depth range,
    /// viewport or parameters changed, then moves the lights into view space.
    ///
    /// Returns `true` when a new grid was built; callers must refresh any
    /// geometry derived from it before assigning lights.
    pub(crate) fn begin_frame(
        &mut self,
        camera: &ClusterCamera,
        viewport: Viewport,
        lights: &LightSet<'_>,
    ) -> Result<bool> {
        self.profiler.reset();
        self.resize(viewport.width, viewport.height);

        let key = (camera.projection, camera.z_near, camera.z_far);
        if self.cached_camera != Some(key) {
            self.clusters_dirty = true;
        }

        let rebuilt = if self.clusters_dirty || self.grid.is_none() {
            let mut build_time = Duration::ZERO;
            let grid = {
                let _timer = ScopedTimer::new(&mut build_time);
                ClusterGrid::new(&self.params.grid, camera, self.viewport)?
            };
            self.profiler.grid_build_time = build_time;
            self.info = self.build_info(&grid);
            let dims = grid.dims();
            log::info!(
                "Cluster grid rebuilt: {}x{}x{} ({} clusters, tile {} px)",
                dims.x,
                dims.y,
                dims.z,
                grid.cluster_count(),
                grid.tile_size()
            );
            self.grid = Some(grid);
            self.cached_camera = Some(key);
            self.clusters_dirty = false;
            true
        } else {
            false
        };

        self.point_spheres.clear();
        self.point_spheres.extend(
            lights
                .points
                .iter()
                .map(|l| Sphere::new(camera.world_to_view(l.world_center), l.radius)),
        );
        self.spot_spheres.clear();
        self.spot_spheres.extend(
            lights
                .spots
                .iter()
                .map(|l| Sphere::new(camera.world_to_view(l.world_center), l.radius)),
        );
        self.profiler.point_light_count = lights.points.len();
        self.profiler.spot_light_count = lights.spots.len();

        Ok(rebuilt)
    }

    /// Records assignment time and totals once the frame's output is final.
    pub(crate) fn end_frame(&mut self, frame_start: Instant, assignment: Duration) {
        self.timings.push(assignment);
        self.profiler.assignment_time = assignment;
        self.profiler.total_frame_time = frame_start.elapsed();
        if let Some(grid) = &self.grid {
            self.profiler.cluster_count = grid.cluster_count();
        }
        if log::log_enabled!(log::Level::Debug) {
            self.profiler.report();
            log::debug!(
                "  Assignment average: {:.3} ms over {} frames",
                self.timings.average_ms(),
                self.timings.len()
            );
        }
    }

    fn build_info(&self, grid: &ClusterGrid) -> ClusterInfo {
        let dims = grid.dims();
        let (scale, bias) = grid.scale_bias();
        let config = &self.params.grid;
        ClusterInfo {
            tile_size: grid.tile_size(),
            screen_width: self.viewport.width,
            screen_height: self.viewport.height,
            cluster_x: dims.x,
            cluster_y: dims.y,
            cluster_z: dims.z,
            z_near: grid.z_near(),
            z_far: grid.z_far(),
            scale,
            bias,
            special_near_cluster: grid.special_near_depth().is_some() as u32,
            special_near_depth: grid.special_near_depth().unwrap_or(0.0),
            tile_debug: if config.screen_space_debug {
                self.params.avg_items_per_cluster
            } else {
                0
            },
            split_debug: config.split_debug as u32,
            item_list_count: 0,
            cluster_list_count: grid.cluster_count() as u32,
        }
    }
}
