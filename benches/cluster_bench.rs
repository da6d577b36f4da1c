use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use light_clusterer::*;
use std::hint::black_box;

fn camera() -> ClusterCamera {
    ClusterCamera::perspective(60f32.to_radians(), 16.0 / 9.0, 0.1, 200.0)
}

fn viewport() -> Viewport {
    Viewport::new(1920, 1080)
}

fn prepare_lights(count: usize) -> Vec<PointLightClusterData> {
    (0..count)
        .map(|i| {
            let t = i as f32 * 0.618_034;
            let depth = 2.0 + (t.fract() * 150.0);
            let x = ((t * 7.0).fract() * 2.0 - 1.0) * depth;
            let y = ((t * 13.0).fract() * 2.0 - 1.0) * depth * 0.5;
            PointLightClusterData::new(Vec3::new(x, y, -depth), 1.0 + (t * 3.0).fract() * 6.0)
        })
        .collect()
}

fn light_set(lights: &[PointLightClusterData]) -> LightSet<'_> {
    LightSet::new(black_box(lights), &[])
}

fn bench_assignment(c: &mut Criterion) {
    let mut group = c.benchmark_group("cluster_lights");
    for &count in &[256usize, 1024, 4096] {
        let lights = prepare_lights(count);

        let mut six = SixPlaneClusterer::new(
            ClustererParameters::six_plane(),
            viewport(),
            Box::new(NoopBackend),
        );
        group.bench_with_input(BenchmarkId::new("six_plane", count), &lights, |b, lights| {
            b.iter(|| six.cluster_lights(&camera(), viewport(), light_set(lights)))
        });

        let mut arrays = PlaneArrayClusterer::new(
            ClustererParameters::plane_arrays().with_refinement(false),
            viewport(),
            Box::new(NoopBackend),
        );
        group.bench_with_input(BenchmarkId::new("plane_arrays", count), &lights, |b, lights| {
            b.iter(|| arrays.cluster_lights(&camera(), viewport(), light_set(lights)))
        });

        let mut refined = PlaneArrayClusterer::new(
            ClustererParameters::plane_arrays(),
            viewport(),
            Box::new(NoopBackend),
        );
        let id = BenchmarkId::new("plane_arrays_refined", count);
        group.bench_with_input(id, &lights, |b, lights| {
            b.iter(|| refined.cluster_lights(&camera(), viewport(), light_set(lights)))
        });
    }
    group.finish();
}

fn bench_grid_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_build");
    for &tile in &[32u32, 64, 128] {
        let config = ClusterGridConfig {
            tile_size: tile,
            ..Default::default()
        };
        group.bench_with_input(BenchmarkId::new("plane_arrays", tile), &config, |b, config| {
            b.iter(|| {
                let grid =
                    ClusterGrid::new(config, &camera(), viewport()).map(|g| g.plane_arrays());
                black_box(grid)
            })
        });
        group.bench_with_input(BenchmarkId::new("cell_frusta", tile), &config, |b, config| {
            b.iter(|| {
                let grid = ClusterGrid::new(config, &camera(), viewport()).map(|g| g.cell_frusta());
                black_box(grid)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_assignment, bench_grid_build);
criterion_main!(benches);
