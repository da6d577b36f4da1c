use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Camera state consumed by the clusterers each frame.
///
/// View space is right-handed and looks down -Z, so visible depths are `-z`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterCamera {
    pub view: Mat4,
    pub projection: Mat4,
    pub z_near: f32,
    pub z_far: f32,
}

impl ClusterCamera {
    pub fn new(view: Mat4, projection: Mat4, z_near: f32, z_far: f32) -> Self {
        Self {
            view,
            projection,
            z_near,
            z_far,
        }
    }

    /// Camera at the origin looking down -Z with an OpenGL-style perspective projection.
    pub fn perspective(fovy_radians: f32, aspect: f32, z_near: f32, z_far: f32) -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::perspective_rh_gl(fovy_radians, aspect, z_near, z_far),
            z_near,
            z_far,
        }
    }

    pub fn look_at(mut self, eye: Vec3, target: Vec3, up: Vec3) -> Self {
        self.view = Mat4::look_at_rh(eye, target, up);
        self
    }

    #[inline]
    pub fn world_to_view(&self, point: Vec3) -> Vec3 {
        self.view.transform_point3(point)
    }
}

/// Render target size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            return 1.0;
        }
        self.width as f32 / self.height as f32
    }
}
