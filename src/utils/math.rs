//! Additional math helpers layered on top of `glam`.

use glam::{Mat4, Vec2, Vec3, Vec4};

/// NDC depth used when back-projecting screen positions. Any depth strictly
/// inside the clip volume of both GL (-1..1) and zero-to-one projections works,
/// only the ray direction is kept.
const SCREEN_RAY_NDC_DEPTH: f32 = 0.5;

/// Back-projects a pixel position (origin at the bottom-left) into view space.
///
/// The returned point lies on the view ray through that pixel.
pub fn view_pos_from_screen_pos(
    screen: Vec2,
    width: f32,
    height: f32,
    inv_projection: &Mat4,
) -> Vec3 {
    let ndc = Vec4::new(
        screen.x / width * 2.0 - 1.0,
        screen.y / height * 2.0 - 1.0,
        SCREEN_RAY_NDC_DEPTH,
        1.0,
    );
    let view = *inv_projection * ndc;
    view.truncate() / view.w
}

/// Intersects the ray from the view-space origin through `point` with the plane `z = target_z`.
pub fn zero_z_intersection(point: Vec3, target_z: f32) -> Vec3 {
    point * (target_z / point.z)
}

/// Smallest sphere enclosing a cone with apex `apex`, unit axis `direction`,
/// length `range` and half-angle `half_angle` (radians).
pub fn cone_bounding_sphere(
    apex: Vec3,
    direction: Vec3,
    range: f32,
    half_angle: f32,
) -> (Vec3, f32) {
    let axis = direction.normalize_or_zero();
    let cos_angle = half_angle.cos();
    if half_angle > std::f32::consts::FRAC_PI_4 {
        // Wide cone: the cap disc bounds everything.
        (apex + axis * (range * cos_angle), range * half_angle.sin())
    } else {
        let radius = range / (2.0 * cos_angle);
        (apex + axis * radius, radius)
    }
}
