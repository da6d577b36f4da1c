use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::sphere::Sphere;

/// Oriented plane `dot(normal, p) = d` with a unit normal.
///
/// Points with a positive [`Plane::distance`] lie on the side the normal points to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub normal: Vec3,
    pub d: f32,
}

impl Default for Plane {
    fn default() -> Self {
        Self {
            normal: Vec3::Z,
            d: 0.0,
        }
    }
}

impl Plane {
    pub fn new(normal: Vec3, d: f32) -> Self {
        Self { normal, d }
    }

    /// Plane through `point` with the given (not necessarily unit) normal.
    pub fn from_point_normal(point: Vec3, normal: Vec3) -> Self {
        let normal = normal.normalize_or_zero();
        Self {
            normal,
            d: normal.dot(point),
        }
    }

    /// Plane through three points, normal along `(p1 - p0) x (p2 - p0)`.
    pub fn from_points(p0: Vec3, p1: Vec3, p2: Vec3) -> Self {
        Self::from_point_normal(p0, (p1 - p0).cross(p2 - p0))
    }

    /// Signed distance of `point` to the plane.
    #[inline]
    pub fn distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) - self.d
    }

    /// Same plane with the opposite orientation.
    pub fn invert(&self) -> Self {
        Self {
            normal: -self.normal,
            d: -self.d,
        }
    }

    /// Returns the plane oriented so that `reference` lies on its positive side.
    pub fn facing(self, reference: Vec3) -> Self {
        if self.distance(reference) < 0.0 {
            self.invert()
        } else {
            self
        }
    }

    /// True when the sphere lies entirely on the negative side.
    #[inline]
    pub fn sphere_outside(&self, center: Vec3, radius: f32) -> bool {
        self.distance(center) + radius < 0.0
    }

    /// Circle where the sphere cuts the plane, returned as a sphere centered on
    /// the plane. The radius is zero when the sphere does not reach the plane.
    pub fn intersecting_circle(&self, center: Vec3, radius: f32) -> Sphere {
        let dist = self.distance(center);
        let projected = center - self.normal * dist;
        let r2 = radius * radius - dist * dist;
        Sphere::new(projected, if r2 > 0.0 { r2.sqrt() } else { 0.0 })
    }
}
