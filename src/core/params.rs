use serde::{Deserialize, Serialize};

use crate::config::{
    DEFAULT_AVG_ITEMS_PER_CLUSTER, DEFAULT_DEPTH_SPLITS, DEFAULT_SIX_PLANE_TILE_SIZE,
    DEFAULT_SPECIAL_NEAR_DEPTH_PERCENT, DEFAULT_TILE_SIZE,
};

/// Shape of the cluster grid. Any change forces a grid rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterGridConfig {
    /// Screen-space tile edge in pixels.
    pub tile_size: u32,
    /// Depth splits; a three-dimensional grid has `depth_splits + 1` slices.
    pub depth_splits: u32,
    pub three_dimensional: bool,
    pub use_special_near_cluster: bool,
    /// Fraction of `far - near` covered by the special near slice.
    pub special_near_depth_percent: f32,
    /// Shading stage visualizes per-tile light counts.
    pub screen_space_debug: bool,
    /// Shading stage visualizes depth slices.
    pub split_debug: bool,
}

impl Default for ClusterGridConfig {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            depth_splits: DEFAULT_DEPTH_SPLITS,
            three_dimensional: true,
            use_special_near_cluster: true,
            special_near_depth_percent: DEFAULT_SPECIAL_NEAR_DEPTH_PERCENT,
            screen_space_debug: false,
            split_debug: false,
        }
    }
}

impl ClusterGridConfig {
    /// Single depth slice with no special near cluster.
    pub fn flat(tile_size: u32) -> Self {
        Self {
            tile_size,
            depth_splits: 0,
            three_dimensional: false,
            use_special_near_cluster: false,
            ..Default::default()
        }
    }
}

/// Per-clusterer tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClustererParameters {
    pub grid: ClusterGridConfig,
    /// Plane-array path: slice light spheres against separating planes.
    pub refinement: bool,
    /// Plane-array path: assign with explicit per-cell SAT tests instead of the walk.
    pub sat_debug: bool,
    /// Initial average number of item slots reserved per cluster.
    pub avg_items_per_cluster: u32,
}

impl Default for ClustererParameters {
    fn default() -> Self {
        Self::plane_arrays()
    }
}

impl ClustererParameters {
    pub fn six_plane() -> Self {
        Self {
            grid: ClusterGridConfig::flat(DEFAULT_SIX_PLANE_TILE_SIZE),
            refinement: false,
            sat_debug: false,
            avg_items_per_cluster: DEFAULT_AVG_ITEMS_PER_CLUSTER,
        }
    }

    pub fn plane_arrays() -> Self {
        Self {
            grid: ClusterGridConfig::default(),
            refinement: true,
            sat_debug: false,
            avg_items_per_cluster: DEFAULT_AVG_ITEMS_PER_CLUSTER,
        }
    }

    pub fn gpu_assignment() -> Self {
        Self {
            grid: ClusterGridConfig::default(),
            refinement: false,
            sat_debug: false,
            avg_items_per_cluster: DEFAULT_AVG_ITEMS_PER_CLUSTER,
        }
    }

    pub fn with_grid(mut self, grid: ClusterGridConfig) -> Self {
        self.grid = grid;
        self
    }

    pub fn with_refinement(mut self, refinement: bool) -> Self {
        self.refinement = refinement;
        self
    }

    pub fn with_avg_items_per_cluster(mut self, avg: u32) -> Self {
        self.avg_items_per_cluster = avg;
        self
    }
}
