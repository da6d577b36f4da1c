//! Light Clusterer – clustered light assignment for Rust renderers.
//!
//! Each frame the active point and spot lights are assigned to a grid of
//! view-frustum cells (screen tiles times logarithmic depth slices). The
//! result is a cluster list and a shared item list that a shading pass can
//! walk instead of looping over every light. Three strategies are provided:
//! a brute-force six-plane test, a plane-array walk with sphere refinement,
//! and a GPU assignment path whose CPU side prepares cluster AABBs and light
//! data for a compute dispatch.

pub mod clustering;
pub mod config;
pub mod core;
pub mod error;
pub mod geometry;
pub mod gpu;
pub mod grid;
pub mod lighting;
pub mod utils;

pub use glam::{Mat4, UVec3, Vec3};

pub use clustering::{
    ClusterBase, ClustererType, GpuAssignmentClusterer, LightClusterer, PlaneArrayClusterer,
    SixPlaneClusterer,
};
pub use core::{
    ClusterCamera, ClusterGridConfig, ClusterInfo, ClusterRecord, ClustererParameters,
    GpuClusterBounds, GpuLightClusterData, GpuPointLight, GpuSpotLight, LightInfo, LightSet,
    PointLight, PointLightClusterData, SpotLight, SpotLightClusterData, Viewport,
};
pub use error::{ClusterError, Result};
pub use geometry::{Aabb, ClusterFrustum, Plane, Sphere};
pub use gpu::{
    AssignmentBackend, BufferBinding, ClusterBufferSink, CpuReferenceBackend, HostBuffers,
    NoopBackend,
};
pub use grid::{ClusterBounds, ClusterGrid, PlaneArrays};
pub use lighting::ClusteredLighting;
