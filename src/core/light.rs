use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::core::records::{GpuPointLight, GpuSpotLight};
use crate::utils::math::cone_bounding_sphere;

/// Omnidirectional light with a finite range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointLight {
    pub position: Vec3,
    pub radius: f32,
    pub color: Vec3,
    pub intensity: f32,
    pub active: bool,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            radius: 1.0,
            color: Vec3::ONE,
            intensity: 1.0,
            active: true,
        }
    }
}

impl PointLight {
    pub fn new(position: Vec3, radius: f32) -> Self {
        Self {
            position,
            radius,
            ..Default::default()
        }
    }

    pub fn with_color(mut self, color: Vec3, intensity: f32) -> Self {
        self.color = color;
        self.intensity = intensity;
        self
    }

    pub fn cluster_data(&self) -> PointLightClusterData {
        PointLightClusterData {
            world_center: self.position,
            radius: self.radius,
        }
    }

    pub fn shader_data(&self) -> GpuPointLight {
        GpuPointLight {
            position: self.position.to_array(),
            radius: self.radius,
            color: self.color.to_array(),
            intensity: self.intensity,
        }
    }
}

/// Cone light. `angle_deg` is the half-angle of the cone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotLight {
    pub position: Vec3,
    pub direction: Vec3,
    pub radius: f32,
    pub angle_deg: f32,
    pub color: Vec3,
    pub intensity: f32,
    pub active: bool,
}

impl Default for SpotLight {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            direction: Vec3::NEG_Z,
            radius: 1.0,
            angle_deg: 30.0,
            color: Vec3::ONE,
            intensity: 1.0,
            active: true,
        }
    }
}

impl SpotLight {
    pub fn new(position: Vec3, direction: Vec3, radius: f32, angle_deg: f32) -> Self {
        Self {
            position,
            direction: direction.normalize_or_zero(),
            radius,
            angle_deg,
            ..Default::default()
        }
    }

    pub fn cluster_data(&self) -> SpotLightClusterData {
        SpotLightClusterData::from_cone(
            self.position,
            self.direction,
            self.radius,
            self.angle_deg.to_radians(),
        )
    }

    pub fn shader_data(&self) -> GpuSpotLight {
        GpuSpotLight {
            position: self.position.to_array(),
            radius: self.radius,
            direction: self.direction.normalize_or_zero().to_array(),
            cos_half_angle: self.angle_deg.to_radians().cos(),
            color: self.color.to_array(),
            intensity: self.intensity,
        }
    }
}

/// Culling proxy of a point light, rebuilt every frame from the active set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointLightClusterData {
    pub world_center: Vec3,
    pub radius: f32,
}

impl PointLightClusterData {
    pub fn new(world_center: Vec3, radius: f32) -> Self {
        Self {
            world_center,
            radius,
        }
    }
}

/// Culling proxy of a spot light. The cone is kept for reference, culling
/// only uses its enclosing sphere.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpotLightClusterData {
    pub world_center: Vec3,
    pub radius: f32,
    pub apex: Vec3,
    pub direction: Vec3,
    pub half_angle: f32,
}

impl SpotLightClusterData {
    pub fn from_cone(apex: Vec3, direction: Vec3, range: f32, half_angle: f32) -> Self {
        let (world_center, radius) = cone_bounding_sphere(apex, direction, range, half_angle);
        Self {
            world_center,
            radius,
            apex,
            direction: direction.normalize_or_zero(),
            half_angle,
        }
    }
}

/// Active lights handed to a clusterer for one frame.
///
/// Item list entries index into `points` and `spots` respectively.
#[derive(Debug, Clone, Copy, Default)]
pub struct LightSet<'a> {
    pub points: &'a [PointLightClusterData],
    pub spots: &'a [SpotLightClusterData],
}

impl<'a> LightSet<'a> {
    pub fn new(points: &'a [PointLightClusterData], spots: &'a [SpotLightClusterData]) -> Self {
        Self { points, spots }
    }

    pub fn len(&self) -> usize {
        self.points.len() + self.spots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty() && self.spots.is_empty()
    }
}
