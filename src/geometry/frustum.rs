use glam::Vec3;

use super::{plane::Plane, sphere::Sphere};

/// Vertex pairs forming the twelve edges of a cell.
///
/// Vertices are ordered near top-left, near top-right, near bottom-left,
/// near bottom-right, then the same four on the far face.
const EDGES: [(usize, usize); 12] = [
    (0, 1),
    (1, 3),
    (3, 2),
    (2, 0),
    (4, 5),
    (5, 7),
    (7, 6),
    (6, 4),
    (0, 4),
    (1, 5),
    (2, 6),
    (3, 7),
];

/// Vertex triples spanning the six faces: near, far, left, right, top, bottom.
const FACES: [(usize, usize, usize); 6] = [
    (0, 1, 2),
    (4, 5, 6),
    (0, 2, 4),
    (1, 3, 5),
    (0, 1, 4),
    (2, 3, 6),
];

const MIN_AXIS_LENGTH_SQ: f32 = 1e-12;

/// Explicit convex cell volume: six inward-facing planes plus its eight corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterFrustum {
    pub planes: [Plane; 6],
    pub vertices: [Vec3; 8],
}

impl ClusterFrustum {
    pub fn from_corners(vertices: [Vec3; 8]) -> Self {
        let centroid = vertices.iter().copied().sum::<Vec3>() / 8.0;
        let planes = FACES.map(|(a, b, c)| {
            Plane::from_points(vertices[a], vertices[b], vertices[c]).facing(centroid)
        });
        Self { planes, vertices }
    }

    pub fn centroid(&self) -> Vec3 {
        self.vertices.iter().copied().sum::<Vec3>() / 8.0
    }

    /// Separating-axis test against the sphere.
    ///
    /// Candidate axes are the face normals, the directions from the sphere
    /// center to each vertex, and the directions from the center to the
    /// closest point of each edge. Returns `false` as soon as one axis
    /// separates the projections.
    pub fn intersect_sat(&self, sphere: &Sphere) -> bool {
        for plane in &self.planes {
            if self.separated_on(plane.normal, sphere) {
                return false;
            }
        }

        for vertex in &self.vertices {
            if self.separated_along(*vertex - sphere.center, sphere) {
                return false;
            }
        }

        for &(a, b) in &EDGES {
            let (start, end) = (self.vertices[a], self.vertices[b]);
            let closest = closest_point_on_segment(start, end, sphere.center);
            if self.separated_along(closest - sphere.center, sphere) {
                return false;
            }
        }

        true
    }

    /// Like `separated_on` for an unnormalized axis; degenerate axes never separate.
    fn separated_along(&self, axis: Vec3, sphere: &Sphere) -> bool {
        axis.length_squared() > MIN_AXIS_LENGTH_SQ && self.separated_on(axis.normalize(), sphere)
    }

    fn separated_on(&self, axis: Vec3, sphere: &Sphere) -> bool {
        let (sphere_min, sphere_max) = sphere.projected_interval(axis);
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for vertex in &self.vertices {
            let t = axis.dot(*vertex);
            min = min.min(t);
            max = max.max(t);
        }
        max < sphere_min || min > sphere_max
    }
}

fn closest_point_on_segment(a: Vec3, b: Vec3, point: Vec3) -> Vec3 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= MIN_AXIS_LENGTH_SQ {
        return a;
    }
    let t = ((point - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}
