use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::aabb::Aabb;

/// Bounding sphere used for every light on the culling paths.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Squared-distance test against an axis-aligned box.
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        let closest = self.center.clamp(aabb.min, aabb.max);
        self.center.distance_squared(closest) <= self.radius * self.radius
    }

    /// Interval covered by the sphere when projected on `axis` (unit length).
    pub fn projected_interval(&self, axis: Vec3) -> (f32, f32) {
        let t = axis.dot(self.center);
        (t - self.radius, t + self.radius)
    }
}
