//! View-space geometry primitives shared by every clusterer.

pub mod aabb;
pub mod frustum;
pub mod plane;
pub mod sphere;

pub use aabb::Aabb;
pub use frustum::ClusterFrustum;
pub use plane::Plane;
pub use sphere::Sphere;
