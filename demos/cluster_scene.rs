use light_clusterer::*;

fn main() {
    let viewport = Viewport::new(1280, 720);
    let mut lighting = match ClusteredLighting::headless(viewport) {
        Ok(lighting) => lighting,
        Err(err) => {
            eprintln!("Failed to set up lighting: {err}");
            return;
        }
    };

    for i in 0..200 {
        let angle = i as f32 * 0.31;
        let distance = 5.0 + (i % 40) as f32 * 2.5;
        let position = Vec3::new(
            angle.cos() * distance,
            (i % 7) as f32 - 3.0,
            -angle.sin().abs() * distance,
        );
        lighting.add_point_light(PointLight::new(position, 4.0));
    }
    for i in 0..16 {
        let position = Vec3::new(i as f32 * 4.0 - 32.0, 8.0, -20.0);
        lighting.add_spot_light(SpotLight::new(position, Vec3::NEG_Y, 12.0, 30.0));
    }

    let camera = ClusterCamera::perspective(60f32.to_radians(), viewport.aspect(), 0.1, 150.0)
        .look_at(Vec3::new(0.0, 4.0, 10.0), Vec3::new(0.0, 0.0, -30.0), Vec3::Y);

    let kinds = [
        ClustererType::SixPlane,
        ClustererType::PlaneArrays,
        ClustererType::GpuAssignment,
    ];
    for kind in kinds {
        lighting.set_cluster_type(kind);
        let result = lighting.init_render().and_then(|_| lighting.cluster(&camera));
        if let Err(err) = result {
            eprintln!("{kind:?}: clustering failed: {err}");
            continue;
        }
        if let Some(clusterer) = lighting.clusterer() {
            let base = clusterer.base();
            if let Some(grid) = base.grid() {
                println!("{kind:?}: grid {:?}, {} clusters", grid.dims(), grid.cluster_count());
            }
            let profiler = base.profiler();
            println!(
                "  {} item references, {} non-empty clusters, max {} per cluster, avg {:.2}",
                profiler.item_count,
                profiler.non_empty_cluster_count,
                profiler.max_items_in_cluster,
                profiler.average_items_per_active_cluster()
            );
            println!(
                "  grid {:.3} ms, assignment {:.3} ms, packing {:.3} ms",
                profiler.grid_build_time.as_secs_f32() * 1000.0,
                profiler.assignment_time.as_secs_f32() * 1000.0,
                profiler.packing_time.as_secs_f32() * 1000.0
            );
            println!(
                "  assignment average {:.3} ms over {} frames",
                base.timings().average_ms(),
                base.timings().len()
            );
            profiler.report();
        }
    }
}
