use std::ops::Range;

use crate::geometry::{ClusterFrustum, Plane, Sphere};

/// Six inward-facing planes bounding one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterBounds {
    pub planes: [Plane; 6],
}

impl ClusterBounds {
    pub fn from_frustum(frustum: &ClusterFrustum) -> Self {
        Self {
            planes: frustum.planes,
        }
    }

    /// The sphere touches the cell unless it lies fully outside one plane.
    #[inline]
    pub fn intersects_sphere(&self, sphere: &Sphere) -> bool {
        !self
            .planes
            .iter()
            .any(|plane| plane.sphere_outside(sphere.center, sphere.radius))
    }
}

/// Shared separating planes of the grid, one array per axis.
///
/// `x[k]` separates column `k - 1` from column `k`, so an axis with `n` cells
/// has `n + 1` planes. Every normal points toward increasing cell index, so a
/// point inside slab `k` has `distance >= 0` to `planes[k]` and `<= 0` to
/// `planes[k + 1]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaneArrays {
    pub x: Vec<Plane>,
    pub y: Vec<Plane>,
    pub z: Vec<Plane>,
}

impl PlaneArrays {
    pub fn is_empty(&self) -> bool {
        self.x.is_empty() || self.y.is_empty() || self.z.is_empty()
    }
}

/// Narrows `[lo, hi)` to the slabs of `planes` that the sphere can touch.
///
/// Walks inward from both ends. Tangency counts as touching. The result is
/// empty when the sphere misses every slab in the range.
pub fn slab_range(planes: &[Plane], sphere: &Sphere, lo: usize, hi: usize) -> Range<usize> {
    let mut start = lo;
    while start < hi && planes[start + 1].distance(sphere.center) > sphere.radius {
        start += 1;
    }

    let mut end = hi;
    while end > start && planes[end - 1].distance(sphere.center) < -sphere.radius {
        end -= 1;
    }

    start..end
}

/// Slab holding `point`, `-1` before the first plane and `planes.len() - 1`
/// past the last one.
pub fn containing_slab(planes: &[Plane], point: glam::Vec3) -> isize {
    planes.partition_point(|plane| plane.distance(point) >= 0.0) as isize - 1
}
