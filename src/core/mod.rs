//! Core types: camera, lights, clusterer parameters, and shader-visible records.

pub mod camera;
pub mod light;
pub mod params;
pub mod records;

pub use camera::{ClusterCamera, Viewport};
pub use light::{LightSet, PointLight, PointLightClusterData, SpotLight, SpotLightClusterData};
pub use params::{ClusterGridConfig, ClustererParameters};
pub use records::{
    ClusterInfo, ClusterRecord, GpuClusterBounds, GpuLightClusterData, GpuPointLight, GpuSpotLight,
    LightInfo,
};
