//! Global configuration constants for the light clusterer.

/// Screen-space tile edge (pixels) used by the plane-array and GPU clusterers.
pub const DEFAULT_TILE_SIZE: u32 = 64;

/// Screen-space tile edge (pixels) used by the brute-force six-plane clusterer.
pub const DEFAULT_SIX_PLANE_TILE_SIZE: u32 = 128;

/// Number of depth splits for three-dimensional grids (grid Z = splits + 1).
pub const DEFAULT_DEPTH_SPLITS: u32 = 12;

/// Fraction of `far - near` covered by the linear special near cluster.
pub const DEFAULT_SPECIAL_NEAR_DEPTH_PERCENT: f32 = 0.06;

/// Initial average number of item slots reserved per cluster.
pub const DEFAULT_AVG_ITEMS_PER_CLUSTER: u32 = 128;

/// Fixed per-cluster slot budget of the GPU assignment path.
pub const GPU_ALLOWED_ITEMS_PER_CLUSTER: u32 = 1024;

/// Maximum number of lights uploaded to the GPU assignment path.
pub const GPU_ALLOWED_LIGHTS: usize = 263_000;

/// Shader storage block limit assumed when the device does not report one (128 MiB).
pub const DEFAULT_MAX_STORAGE_BLOCK_SIZE: usize = 1 << 27;

/// Sliced light radii below this are treated as not touching the slab.
pub const REFINEMENT_EPSILON: f32 = 1e-5;

/// Default cap on active point lights handed to the lighting stage.
pub const DEFAULT_MAX_POINT_LIGHTS: usize = 65_536;

/// Default cap on active spot lights handed to the lighting stage.
pub const DEFAULT_MAX_SPOT_LIGHTS: usize = 65_536;

/// Number of CPU assignment timings kept for averaging.
pub const ASSIGNMENT_TIMING_HISTORY: usize = 100;

/// Binding point of the light info uniform block.
pub const LIGHT_INFO_BINDING_POINT: u32 = 2;

/// Binding point of the cluster info record.
pub const LIGHT_CLUSTER_INFO_BINDING_POINT: u32 = 3;

/// Binding point of the cluster list.
pub const LIGHT_CLUSTER_LIST_BINDING_POINT: u32 = 4;

/// Binding point of the shared item list.
pub const LIGHT_CLUSTER_ITEM_LIST_BINDING_POINT: u32 = 5;

/// Binding point of the per-light data consumed by the assignment dispatch.
pub const LIGHT_CLUSTER_DATA_BINDING_POINT: u32 = 6;

/// Binding point of the per-cluster AABBs consumed by the assignment dispatch.
pub const LIGHT_CLUSTER_STRUCTURES_BINDING_POINT: u32 = 7;
