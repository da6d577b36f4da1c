use std::time::{Duration, Instant};

use crate::clustering::base::ClusterBase;
use crate::clustering::packing::{ClusterCache, PackedClusters};
use crate::clustering::six_plane::record_output_stats;
use crate::config::REFINEMENT_EPSILON;
use crate::core::{ClusterCamera, ClusterRecord, ClustererParameters, LightSet, Viewport};
use crate::error::Result;
use crate::geometry::{ClusterFrustum, Plane, Sphere};
use crate::gpu::ClusterBufferSink;
use crate::grid::{containing_slab, slab_range, ClusterGrid, PlaneArrays};
use crate::utils::logging::TraceSpan;
use crate::utils::profiling::ScopedTimer;

/// Clusterer walking each light along the shared per-axis plane arrays.
///
/// With refinement on, the light sphere is sliced by the depth plane nearest
/// its center before the Y walk, and by the Y plane before the X walk. With
/// `sat_debug` on, every light is instead tested against the explicit
/// frustum of every cell.
pub struct PlaneArrayClusterer {
    base: ClusterBase,
    output: PackedClusters,
    planes: PlaneArrays,
    frusta: Vec<ClusterFrustum>,
}

impl PlaneArrayClusterer {
    pub fn new(
        params: ClustererParameters,
        viewport: Viewport,
        sink: Box<dyn ClusterBufferSink>,
    ) -> Self {
        Self {
            base: ClusterBase::new(params, viewport),
            output: PackedClusters::new(sink),
            planes: PlaneArrays::default(),
            frusta: Vec::new(),
        }
    }

    pub fn base(&self) -> &ClusterBase {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut ClusterBase {
        &mut self.base
    }

    pub fn output(&self) -> &PackedClusters {
        &self.output
    }

    pub fn plane_arrays(&self) -> &PlaneArrays {
        &self.planes
    }

    pub fn cluster_list(&self) -> &[ClusterRecord] {
        self.output.cluster_list()
    }

    pub fn items(&self) -> &[u32] {
        self.output.items()
    }

    pub fn cluster_lights(
        &mut self,
        camera: &ClusterCamera,
        viewport: Viewport,
        lights: LightSet<'_>,
    ) -> Result<()> {
        let frame_start = Instant::now();
        let _span = TraceSpan::new("cluster::plane_arrays", lights.len());

        if self.base.begin_frame(camera, viewport, &lights)? {
            if let Err(err) = self.rebuild() {
                self.base.mark_dirty();
                return Err(err);
            }
        }
        let Some(grid) = self.base.grid.as_ref() else {
            return Ok(());
        };

        self.output.begin_frame();
        let mut assignment = Duration::ZERO;
        {
            let _timer = ScopedTimer::new(&mut assignment);
            let cache = self.output.cache_mut();
            let kinds: [(&[Sphere], fn(&mut ClusterCache, usize, u32)); 2] = [
                (&self.base.point_spheres, ClusterCache::push_point),
                (&self.base.spot_spheres, ClusterCache::push_spot),
            ];
            for (spheres, push) in kinds {
                for (light, sphere) in spheres.iter().enumerate() {
                    let light = light as u32;
                    if self.base.params.sat_debug {
                        for (cluster, frustum) in self.frusta.iter().enumerate() {
                            if frustum.intersect_sat(sphere) {
                                push(cache, cluster, light);
                            }
                        }
                    } else {
                        let refinement = self.base.params.refinement;
                        walk_cells(grid, &self.planes, sphere, refinement, |cluster| {
                            push(cache, cluster, light)
                        });
                    }
                }
            }
        }

        let mut packing = Duration::ZERO;
        {
            let _timer = ScopedTimer::new(&mut packing);
            self.output.pack_and_upload(&mut self.base.info)?;
        }
        self.base.profiler.packing_time = packing;
        record_output_stats(&mut self.base, &self.output);
        self.base.end_frame(frame_start, assignment);
        Ok(())
    }

    fn rebuild(&mut self) -> Result<()> {
        let Some(grid) = self.base.grid.as_ref() else {
            return Ok(());
        };
        self.planes = grid.plane_arrays();
        self.frusta = if self.base.params.sat_debug {
            grid.cell_frusta()
        } else {
            Vec::new()
        };
        self.output.rebuild(
            &mut self.base.info,
            self.base.params.avg_items_per_cluster,
            grid.cluster_count(),
        )
    }
}

/// Visits the index of every cell the sphere may touch.
///
/// Each axis range comes from [`slab_range`] over that axis' planes, Z first,
/// then Y, then X. A light missing any axis touches nothing. With refinement,
/// the Y and X ranges are recomputed per slab from the sliced sphere and
/// never leave the unrefined ranges.
pub fn walk_cells(
    grid: &ClusterGrid,
    planes: &PlaneArrays,
    sphere: &Sphere,
    refinement: bool,
    mut visit: impl FnMut(usize),
) {
    let dims = grid.dims();
    let z_range = slab_range(&planes.z, sphere, 0, dims.z as usize);
    if z_range.is_empty() {
        return;
    }
    let y_range = slab_range(&planes.y, sphere, 0, dims.y as usize);
    if y_range.is_empty() {
        return;
    }
    let x_range = slab_range(&planes.x, sphere, 0, dims.x as usize);
    if x_range.is_empty() {
        return;
    }

    if !refinement {
        for z in z_range {
            for y in y_range.clone() {
                for x in x_range.clone() {
                    visit(grid.cluster_index(x as u32, y as u32, z as u32));
                }
            }
        }
        return;
    }

    let center_z = containing_slab(&planes.z, sphere.center);
    for z in z_range {
        let Some(z_sphere) = slice_towards(&planes.z, z, center_z, sphere) else {
            continue;
        };
        let center_y = containing_slab(&planes.y, z_sphere.center);
        for y in slab_range(&planes.y, &z_sphere, y_range.start, y_range.end) {
            let Some(y_sphere) = slice_towards(&planes.y, y, center_y, &z_sphere) else {
                continue;
            };
            for x in slab_range(&planes.x, &y_sphere, x_range.start, x_range.end) {
                visit(grid.cluster_index(x as u32, y as u32, z as u32));
            }
        }
    }
}

/// Part of the sphere relevant to `slab`: the whole sphere when its center
/// lies in the slab, otherwise the circle cut by the slab's boundary facing
/// the center. `None` when that circle is negligible.
fn slice_towards(
    planes: &[Plane],
    slab: usize,
    center_slab: isize,
    sphere: &Sphere,
) -> Option<Sphere> {
    let slab_index = slab as isize;
    if slab_index == center_slab {
        return Some(*sphere);
    }
    let plane = if slab_index > center_slab {
        &planes[slab]
    } else {
        &planes[slab + 1]
    };
    let sliced = plane.intersecting_circle(sphere.center, sphere.radius);
    (sliced.radius >= REFINEMENT_EPSILON).then_some(sliced)
}
