//! View-space cluster grid: dimensions, logarithmic depth slicing and the
//! boundary geometry consumed by the clusterers.

pub mod bounds;

pub use bounds::{containing_slab, slab_range, ClusterBounds, PlaneArrays};

use glam::{Mat4, UVec3, Vec2, Vec3};
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::core::{ClusterCamera, ClusterGridConfig, Viewport};
use crate::error::{ClusterError, Result};
use crate::geometry::{Aabb, ClusterFrustum, Plane};
use crate::utils::math::{view_pos_from_screen_pos, zero_z_intersection};

/// Grid derived from the camera projection and a [`ClusterGridConfig`].
///
/// Cells are indexed `x + dims.x * y + dims.x * dims.y * z` with `x` growing
/// to the right, `y` growing up from the bottom of the screen, and `z = 0`
/// the slice nearest to the camera.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterGrid {
    dims: UVec3,
    tile_size: u32,
    viewport: Viewport,
    z_near: f32,
    z_far: f32,
    scale: f32,
    bias: f32,
    special_near_depth: Option<f32>,
    /// Slice boundary depths, near to far, `dims.z + 1` entries.
    depth_boundaries: Vec<f32>,
    /// Points on the view rays through every tile corner, `(dims.x + 1) * (dims.y + 1)`.
    corner_rays: Vec<Vec3>,
    inv_projection: Mat4,
}

impl ClusterGrid {
    pub fn new(
        config: &ClusterGridConfig,
        camera: &ClusterCamera,
        viewport: Viewport,
    ) -> Result<Self> {
        if config.tile_size == 0 {
            return Err(ClusterError::InvalidConfiguration(
                "tile size must be non-zero".into(),
            ));
        }
        if viewport.width == 0 || viewport.height == 0 {
            return Err(ClusterError::InvalidConfiguration(format!(
                "viewport {}x{} is empty",
                viewport.width, viewport.height
            )));
        }
        let (z_near, z_far) = (camera.z_near, camera.z_far);
        if !(z_near.is_finite() && z_far.is_finite()) || z_near <= 0.0 || z_far <= z_near {
            return Err(ClusterError::InvalidConfiguration(format!(
                "depth range [{z_near}, {z_far}] is not a positive increasing range"
            )));
        }
        if camera.projection.w_axis.w.abs() > 1e-6 {
            return Err(ClusterError::InvalidConfiguration(
                "clustering requires a perspective projection".into(),
            ));
        }
        let inv_projection = camera.projection.inverse();
        if !inv_projection.is_finite() {
            return Err(ClusterError::InvalidConfiguration(
                "projection matrix is not invertible".into(),
            ));
        }

        let dims = UVec3::new(
            viewport.width.div_ceil(config.tile_size),
            viewport.height.div_ceil(config.tile_size),
            if config.three_dimensional {
                config.depth_splits + 1
            } else {
                1
            },
        );

        let special_depth = (z_far - z_near) * config.special_near_depth_percent;
        let use_special = config.use_special_near_cluster && special_depth > 0.0 && dims.z > 1;
        let special_near_depth = use_special.then_some(special_depth);
        if let Some(depth) = special_near_depth {
            if z_near + depth >= z_far {
                return Err(ClusterError::InvalidConfiguration(format!(
                    "special near cluster depth {depth} covers the whole depth range"
                )));
            }
        }

        let (log_start, log_slices) = match special_near_depth {
            Some(depth) => (z_near + depth, dims.z - 1),
            None => (z_near, dims.z),
        };
        let log_range = (z_far / log_start).log2();
        let scale = log_slices as f32 / log_range;
        let bias = -(log_slices as f32) * log_start.log2() / log_range;

        let mut depth_boundaries = Vec::with_capacity(dims.z as usize + 1);
        depth_boundaries.push(z_near);
        if special_near_depth.is_some() {
            depth_boundaries.push(log_start);
        }
        for k in 1..=log_slices {
            let t = k as f32 / log_slices as f32;
            depth_boundaries.push(log_start * (z_far / log_start).powf(t));
        }
        // Pin the far plane against pow rounding.
        if let Some(last) = depth_boundaries.last_mut() {
            *last = z_far;
        }

        let mut corner_rays = Vec::with_capacity(((dims.x + 1) * (dims.y + 1)) as usize);
        for j in 0..=dims.y {
            for i in 0..=dims.x {
                let pixel = Vec2::new((i * config.tile_size) as f32, (j * config.tile_size) as f32);
                let ray = view_pos_from_screen_pos(
                    pixel,
                    viewport.width as f32,
                    viewport.height as f32,
                    &inv_projection,
                );
                if ray.z.is_nan() || ray.z >= 0.0 {
                    return Err(ClusterError::InvalidConfiguration(format!(
                        "tile corner ({i}, {j}) does not project in front of the camera"
                    )));
                }
                corner_rays.push(ray);
            }
        }

        Ok(Self {
            dims,
            tile_size: config.tile_size,
            viewport,
            z_near,
            z_far,
            scale,
            bias,
            special_near_depth,
            depth_boundaries,
            corner_rays,
            inv_projection,
        })
    }

    pub fn dims(&self) -> UVec3 {
        self.dims
    }

    pub fn cluster_count(&self) -> usize {
        (self.dims.x * self.dims.y * self.dims.z) as usize
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn z_near(&self) -> f32 {
        self.z_near
    }

    pub fn z_far(&self) -> f32 {
        self.z_far
    }

    /// Coefficients of `slice = floor(scale * log2(depth) + bias)`.
    pub fn scale_bias(&self) -> (f32, f32) {
        (self.scale, self.bias)
    }

    /// Depth extent of the linear first slice, when one is carved out.
    pub fn special_near_depth(&self) -> Option<f32> {
        self.special_near_depth
    }

    pub fn depth_boundaries(&self) -> &[f32] {
        &self.depth_boundaries
    }

    #[inline]
    pub fn cluster_index(&self, x: u32, y: u32, z: u32) -> usize {
        (x + self.dims.x * y + self.dims.x * self.dims.y * z) as usize
    }

    #[inline]
    pub fn cell_coords(&self, index: usize) -> UVec3 {
        let index = index as u32;
        let layer = self.dims.x * self.dims.y;
        UVec3::new(index % self.dims.x, (index % layer) / self.dims.x, index / layer)
    }

    /// Slice for a positive view depth, evaluated the way the shading stage does.
    pub fn slice_for_depth(&self, depth: f32) -> u32 {
        let last = self.dims.z - 1;
        if depth <= self.z_near {
            return 0;
        }
        let slice = match self.special_near_depth {
            Some(near_depth) if depth < self.z_near + near_depth => return 0,
            Some(_) => (depth.log2() * self.scale + self.bias).floor() + 1.0,
            None => (depth.log2() * self.scale + self.bias).floor(),
        };
        (slice.max(0.0) as u32).min(last)
    }

    /// View-space point on the ray through tile corner `(i, j)` at the given depth.
    #[inline]
    pub fn corner(&self, i: u32, j: u32, depth: f32) -> Vec3 {
        let ray = self.corner_rays[(i + (self.dims.x + 1) * j) as usize];
        zero_z_intersection(ray, -depth)
    }

    /// View-space point on the ray through an arbitrary pixel at the given depth.
    pub fn screen_point(&self, pixel: Vec2, depth: f32) -> Vec3 {
        let ray = view_pos_from_screen_pos(
            pixel,
            self.viewport.width as f32,
            self.viewport.height as f32,
            &self.inv_projection,
        );
        zero_z_intersection(ray, -depth)
    }

    /// Corners ordered near top-left, near top-right, near bottom-left,
    /// near bottom-right, then the far face in the same order.
    pub fn cell_corners(&self, x: u32, y: u32, z: u32) -> [Vec3; 8] {
        let near = self.depth_boundaries[z as usize];
        let far = self.depth_boundaries[z as usize + 1];
        [
            self.corner(x, y + 1, near),
            self.corner(x + 1, y + 1, near),
            self.corner(x, y, near),
            self.corner(x + 1, y, near),
            self.corner(x, y + 1, far),
            self.corner(x + 1, y + 1, far),
            self.corner(x, y, far),
            self.corner(x + 1, y, far),
        ]
    }

    pub fn cell_frustum(&self, x: u32, y: u32, z: u32) -> ClusterFrustum {
        ClusterFrustum::from_corners(self.cell_corners(x, y, z))
    }

    pub fn cell_aabb(&self, x: u32, y: u32, z: u32) -> Aabb {
        Aabb::from_points(&self.cell_corners(x, y, z))
    }

    /// Explicit frustum of every cell, in cluster index order.
    pub fn cell_frusta(&self) -> Vec<ClusterFrustum> {
        self.map_cells(|c| self.cell_frustum(c.x, c.y, c.z))
    }

    /// Six-plane bounds of every cell, in cluster index order.
    pub fn cell_bounds(&self) -> Vec<ClusterBounds> {
        self.map_cells(|c| ClusterBounds::from_frustum(&self.cell_frustum(c.x, c.y, c.z)))
    }

    /// Axis-aligned bounds of every cell, in cluster index order.
    pub fn cell_aabbs(&self) -> Vec<Aabb> {
        self.map_cells(|c| self.cell_aabb(c.x, c.y, c.z))
    }

    /// Shared boundary planes along each axis.
    pub fn plane_arrays(&self) -> PlaneArrays {
        let near = self.z_near;
        let far = self.z_far;
        let mid = 0.5 * (near + far);
        let tile = self.tile_size as f32;
        let center = Vec2::new(
            0.5 * (self.dims.x as f32 * tile),
            0.5 * (self.dims.y as f32 * tile),
        );

        let x = (0..=self.dims.x)
            .map(|k| {
                let plane = Plane::from_points(
                    self.corner(k, 0, near),
                    self.corner(k, 0, far),
                    self.corner(k, self.dims.y, far),
                );
                let inside = self.screen_point(Vec2::new((k as f32 + 0.5) * tile, center.y), mid);
                plane.facing(inside)
            })
            .collect();

        let y = (0..=self.dims.y)
            .map(|k| {
                let plane = Plane::from_points(
                    self.corner(0, k, near),
                    self.corner(0, k, far),
                    self.corner(self.dims.x, k, far),
                );
                let inside = self.screen_point(Vec2::new(center.x, (k as f32 + 0.5) * tile), mid);
                plane.facing(inside)
            })
            .collect();

        let z = self
            .depth_boundaries
            .iter()
            .map(|&depth| Plane::from_point_normal(Vec3::new(0.0, 0.0, -depth), Vec3::NEG_Z))
            .collect();

        PlaneArrays { x, y, z }
    }

    fn map_cells<T, F>(&self, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(UVec3) -> T + Sync + Send,
    {
        #[cfg(feature = "parallel")]
        {
            (0..self.cluster_count())
                .into_par_iter()
                .map(|index| f(self.cell_coords(index)))
                .collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            (0..self.cluster_count())
                .map(|index| f(self.cell_coords(index)))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn camera() -> ClusterCamera {
        ClusterCamera::perspective(60f32.to_radians(), 1.0, 0.5, 200.0)
    }

    #[test]
    fn dimensions_round_tiles_up() {
        let config = ClusterGridConfig {
            tile_size: 64,
            depth_splits: 7,
            use_special_near_cluster: false,
            ..Default::default()
        };
        let grid = ClusterGrid::new(&config, &camera(), Viewport::new(1000, 600)).unwrap();
        assert_eq!(grid.dims(), UVec3::new(16, 10, 8));
        assert_eq!(grid.cluster_count(), 16 * 10 * 8);
        assert_eq!(grid.depth_boundaries().len(), 9);
    }

    #[test]
    fn log_boundaries_match_scale_bias() {
        let config = ClusterGridConfig {
            use_special_near_cluster: false,
            ..Default::default()
        };
        let grid = ClusterGrid::new(&config, &camera(), Viewport::new(640, 480)).unwrap();
        let (scale, bias) = grid.scale_bias();
        for (k, &depth) in grid.depth_boundaries().iter().enumerate() {
            assert_relative_eq!(depth.log2() * scale + bias, k as f32, epsilon = 1e-3);
        }
        for window in grid.depth_boundaries().windows(2) {
            let mid = 0.5 * (window[0] + window[1]);
            let expected = grid.depth_boundaries().partition_point(|&b| b <= mid) - 1;
            assert_eq!(grid.slice_for_depth(mid) as usize, expected);
        }
    }

    #[test]
    fn special_near_cluster_is_linear() {
        let config = ClusterGridConfig::default();
        let cam = camera();
        let grid = ClusterGrid::new(&config, &cam, Viewport::new(640, 480)).unwrap();
        let special = (cam.z_far - cam.z_near) * config.special_near_depth_percent;
        assert_eq!(grid.special_near_depth(), Some(special));
        assert_relative_eq!(grid.depth_boundaries()[1], cam.z_near + special);
        assert_eq!(grid.slice_for_depth(cam.z_near + 0.5 * special), 0);
        assert_eq!(grid.slice_for_depth(cam.z_near + special * 1.01), 1);
        assert_eq!(grid.slice_for_depth(cam.z_far * 2.0), grid.dims().z - 1);
    }

    #[test]
    fn special_near_needs_multiple_slices() {
        let config = ClusterGridConfig::flat(64);
        let config = ClusterGridConfig {
            use_special_near_cluster: true,
            ..config
        };
        let grid = ClusterGrid::new(&config, &camera(), Viewport::new(128, 128)).unwrap();
        assert_eq!(grid.special_near_depth(), None);
        assert_eq!(grid.depth_boundaries(), [0.5f32, 200.0].as_slice());
    }

    #[test]
    fn rejects_invalid_configuration() {
        let viewport = Viewport::new(640, 480);
        let zero_tile = ClusterGridConfig {
            tile_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            ClusterGrid::new(&zero_tile, &camera(), viewport),
            Err(ClusterError::InvalidConfiguration(_))
        ));

        let mut inverted = camera();
        inverted.z_far = 0.1;
        assert!(ClusterGrid::new(&ClusterGridConfig::default(), &inverted, viewport).is_err());

        let ortho = ClusterCamera::new(
            Mat4::IDENTITY,
            Mat4::orthographic_rh_gl(-1.0, 1.0, -1.0, 1.0, 0.5, 200.0),
            0.5,
            200.0,
        );
        assert!(ClusterGrid::new(&ClusterGridConfig::default(), &ortho, viewport).is_err());
    }

    #[test]
    fn plane_arrays_order_cell_centroids() {
        let grid =
            ClusterGrid::new(&ClusterGridConfig::default(), &camera(), Viewport::new(320, 256))
                .unwrap();
        let planes = grid.plane_arrays();
        assert_eq!(planes.x.len(), grid.dims().x as usize + 1);
        assert_eq!(planes.y.len(), grid.dims().y as usize + 1);
        assert_eq!(planes.z.len(), grid.dims().z as usize + 1);

        let dims = grid.dims();
        for z in 0..dims.z {
            for y in 0..dims.y {
                for x in 0..dims.x {
                    let c = grid.cell_frustum(x, y, z).centroid();
                    assert!(planes.x[x as usize].distance(c) > 0.0);
                    assert!(planes.x[x as usize + 1].distance(c) < 0.0);
                    assert!(planes.y[y as usize].distance(c) > 0.0);
                    assert!(planes.y[y as usize + 1].distance(c) < 0.0);
                    assert!(planes.z[z as usize].distance(c) > 0.0);
                    assert!(planes.z[z as usize + 1].distance(c) < 0.0);
                }
            }
        }
    }

    #[test]
    fn cell_coords_round_trip_index() {
        let grid =
            ClusterGrid::new(&ClusterGridConfig::default(), &camera(), Viewport::new(300, 200))
                .unwrap();
        let dims = grid.dims();
        let c = grid.cell_coords(grid.cluster_index(dims.x - 1, 1, dims.z - 1));
        assert_eq!(c, UVec3::new(dims.x - 1, 1, dims.z - 1));
    }
}
