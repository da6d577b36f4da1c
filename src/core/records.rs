//! `#[repr(C)]` records shared with the shading stage.
//!
//! Field order and sizes are part of the shader interface; the size tests
//! below pin them.

use bytemuck::{Pod, Zeroable};

/// One entry of the cluster list.
///
/// Point light indices live at `items[offset..offset + point_count]`, spot
/// light indices follow immediately after.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct ClusterRecord {
    pub offset: u32,
    pub point_count: u16,
    pub spot_count: u16,
}

impl ClusterRecord {
    pub fn item_count(&self) -> usize {
        self.point_count as usize + self.spot_count as usize
    }
}

/// Grid description read by the shading stage to locate a fragment's cluster.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ClusterInfo {
    pub tile_size: u32,
    pub screen_width: u32,
    pub screen_height: u32,
    pub cluster_x: u32,
    pub cluster_y: u32,
    pub cluster_z: u32,
    pub z_near: f32,
    pub z_far: f32,
    pub scale: f32,
    pub bias: f32,
    pub special_near_cluster: u32,
    pub special_near_depth: f32,
    /// Average items per cluster when screen-space debugging is on, else 0.
    pub tile_debug: u32,
    pub split_debug: u32,
    pub item_list_count: u32,
    pub cluster_list_count: u32,
}

/// Light counts plus the flag telling the shader to use the cluster lists.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct LightInfo {
    pub point_light_count: u32,
    pub spot_light_count: u32,
    pub cluster_enabled: u32,
    pub _pad: u32,
}

/// View-space AABB of one cluster, consumed by the assignment dispatch.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuClusterBounds {
    pub center: [f32; 3],
    pub _pad0: f32,
    pub extents: [f32; 3],
    pub _pad1: f32,
}

/// View-space culling sphere of one light, consumed by the assignment dispatch.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuLightClusterData {
    pub view_center: [f32; 3],
    pub radius: f32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuPointLight {
    pub position: [f32; 3],
    pub radius: f32,
    pub color: [f32; 3],
    pub intensity: f32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuSpotLight {
    pub position: [f32; 3],
    pub radius: f32,
    pub direction: [f32; 3],
    pub cos_half_angle: f32,
    pub color: [f32; 3],
    pub intensity: f32,
}
