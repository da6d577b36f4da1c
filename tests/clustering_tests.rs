use std::collections::BTreeSet;
use std::sync::Arc;

use light_clusterer::{
    BufferBinding, ClusterCamera, ClusterError, ClusterGridConfig, ClusterRecord,
    ClustererParameters, HostBuffers, LightSet, PlaneArrayClusterer, PointLightClusterData,
    SixPlaneClusterer, SpotLightClusterData, Vec3, Viewport,
};

fn camera() -> ClusterCamera {
    ClusterCamera::perspective(70f32.to_radians(), 1.0, 0.1, 100.0)
}

fn flat_params(params: ClustererParameters) -> ClustererParameters {
    params.with_grid(ClusterGridConfig::flat(64))
}

/// Cells whose record lists point light `light`.
fn cells_with_point(records: &[ClusterRecord], items: &[u32], light: u32) -> BTreeSet<usize> {
    records
        .iter()
        .enumerate()
        .filter(|(_, r)| {
            let start = r.offset as usize;
            items[start..start + r.point_count as usize].contains(&light)
        })
        .map(|(i, _)| i)
        .collect()
}

/// Deterministic light cloud spread over the view frustum and around it.
fn light_cloud(count: usize) -> Vec<PointLightClusterData> {
    let mut state = 0x2545_f491u32;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        state as f32 / u32::MAX as f32
    };
    (0..count)
        .map(|_| {
            let depth = 0.5 + next() * 110.0;
            let x = (next() * 2.0 - 1.0) * depth * 0.9;
            let y = (next() * 2.0 - 1.0) * depth * 0.9;
            let radius = 0.2 + next() * 8.0;
            PointLightClusterData::new(Vec3::new(x, y, -depth), radius)
        })
        .collect()
}

/// Runs one frame; `None` selects the six-plane clusterer on the default 3D grid.
fn run_once(
    params: Option<ClustererParameters>,
    cam: &ClusterCamera,
    viewport: Viewport,
    lights: LightSet<'_>,
) -> (Vec<ClusterRecord>, Vec<u32>) {
    match params {
        None => {
            let params = ClustererParameters::six_plane().with_grid(ClusterGridConfig::default());
            let mut c = SixPlaneClusterer::new(params, viewport, Box::new(HostBuffers::new()));
            c.cluster_lights(cam, viewport, lights).unwrap();
            (c.cluster_list().to_vec(), c.items().to_vec())
        }
        Some(params) => {
            let mut c = PlaneArrayClusterer::new(params, viewport, Box::new(HostBuffers::new()));
            c.cluster_lights(cam, viewport, lights).unwrap();
            (c.cluster_list().to_vec(), c.items().to_vec())
        }
    }
}

#[test]
fn test_full_coverage_light_fills_every_cluster() {
    let viewport = Viewport::new(256, 256);
    let points = [PointLightClusterData::new(Vec3::ZERO, 1000.0)];

    let mut six = SixPlaneClusterer::new(
        flat_params(ClustererParameters::six_plane()),
        viewport,
        Box::new(HostBuffers::new()),
    );
    six.cluster_lights(&camera(), viewport, LightSet::new(&points, &[])).unwrap();

    let mut arrays = PlaneArrayClusterer::new(
        flat_params(ClustererParameters::plane_arrays()),
        viewport,
        Box::new(HostBuffers::new()),
    );
    arrays.cluster_lights(&camera(), viewport, LightSet::new(&points, &[])).unwrap();

    let outputs = [
        (six.cluster_list(), six.items()),
        (arrays.cluster_list(), arrays.items()),
    ];
    for (records, items) in outputs {
        assert_eq!(records.len(), 16);
        for record in records {
            assert_eq!(record.point_count, 1);
            assert_eq!(record.spot_count, 0);
            assert_eq!(items[record.offset as usize], 0);
        }
        assert_eq!(items, &[0u32; 16][..]);
    }
}

#[test]
fn test_lights_outside_frustum_are_not_assigned() {
    let viewport = Viewport::new(320, 240);
    let points = [
        PointLightClusterData::new(Vec3::new(0.0, 0.0, 50.0), 5.0),
        PointLightClusterData::new(Vec3::new(0.0, 0.0, -500.0), 5.0),
        PointLightClusterData::new(Vec3::new(1000.0, 0.0, -10.0), 5.0),
        PointLightClusterData::new(Vec3::new(0.0, -800.0, -40.0), 5.0),
    ];
    let lights = LightSet::new(&points, &[]);
    let cam = ClusterCamera::perspective(70f32.to_radians(), 320.0 / 240.0, 0.1, 100.0);

    let mut six = SixPlaneClusterer::new(
        ClustererParameters::six_plane(),
        viewport,
        Box::new(HostBuffers::new()),
    );
    six.cluster_lights(&cam, viewport, lights).unwrap();
    assert!(six.items().is_empty());

    for refinement in [false, true] {
        let params = ClustererParameters::plane_arrays().with_refinement(refinement);
        let mut arrays = PlaneArrayClusterer::new(params, viewport, Box::new(HostBuffers::new()));
        arrays.cluster_lights(&cam, viewport, lights).unwrap();
        assert!(arrays.items().is_empty());
    }
}

#[test]
fn test_no_false_negatives_for_contained_cells() {
    let viewport = Viewport::new(320, 256);
    let cam = ClusterCamera::perspective(60f32.to_radians(), 320.0 / 256.0, 0.5, 100.0);
    let points = light_cloud(60);
    let lights = LightSet::new(&points, &[]);

    let config = ClustererParameters::plane_arrays().grid;
    let grid = light_clusterer::ClusterGrid::new(&config, &cam, viewport).unwrap();
    let dims = grid.dims();
    let strategies = [
        ("six-plane", None),
        ("arrays", Some(ClustererParameters::plane_arrays().with_refinement(false))),
        ("arrays-refined", Some(ClustererParameters::plane_arrays())),
        (
            "arrays-sat",
            Some(ClustererParameters {
                sat_debug: true,
                ..ClustererParameters::plane_arrays()
            }),
        ),
    ];
    for (name, params) in strategies {
        let (records, items) = run_once(params, &cam, viewport, lights);
        for (light, data) in points.iter().enumerate() {
            let found = cells_with_point(&records, &items, light as u32);
            for z in 0..dims.z {
                for y in 0..dims.y {
                    for x in 0..dims.x {
                        let corners = grid.cell_corners(x, y, z);
                        let contained = corners
                            .iter()
                            .all(|c| c.distance(data.world_center) < data.radius * 0.99);
                        if contained {
                            assert!(
                                found.contains(&grid.cluster_index(x, y, z)),
                                "{name}: light {light} missing from cell ({x}, {y}, {z})"
                            );
                        }
                    }
                }
            }
        }
    }
}

#[test]
fn test_refinement_is_subset_of_unrefined() {
    let viewport = Viewport::new(320, 256);
    let cam = ClusterCamera::perspective(60f32.to_radians(), 320.0 / 256.0, 0.5, 100.0);
    let points = light_cloud(40);

    let mut coarse = PlaneArrayClusterer::new(
        ClustererParameters::plane_arrays().with_refinement(false),
        viewport,
        Box::new(HostBuffers::new()),
    );
    let mut refined = PlaneArrayClusterer::new(
        ClustererParameters::plane_arrays(),
        viewport,
        Box::new(HostBuffers::new()),
    );
    coarse.cluster_lights(&cam, viewport, LightSet::new(&points, &[])).unwrap();
    refined.cluster_lights(&cam, viewport, LightSet::new(&points, &[])).unwrap();

    let mut tighter = false;
    for light in 0..points.len() as u32 {
        let c = cells_with_point(coarse.cluster_list(), coarse.items(), light);
        let r = cells_with_point(refined.cluster_list(), refined.items(), light);
        assert!(r.is_subset(&c), "light {light} gained cells under refinement");
        tighter |= r.len() < c.len();
    }
    assert!(tighter);
    assert!(refined.items().len() <= coarse.items().len());
}

#[test]
fn test_six_plane_and_plane_arrays_agree_on_single_cell() {
    let viewport = Viewport::new(64, 64);
    let cam = ClusterCamera::perspective(90f32.to_radians(), 1.0, 1.0, 50.0);
    let points = [
        PointLightClusterData::new(Vec3::new(0.0, 0.0, -10.0), 1.0),
        PointLightClusterData::new(Vec3::new(15.0, 0.0, -10.0), 2.0),
        PointLightClusterData::new(Vec3::new(11.0, 0.0, -10.0), 2.0),
        PointLightClusterData::new(Vec3::new(0.0, 0.0, -55.0), 3.0),
        PointLightClusterData::new(Vec3::new(0.0, 0.0, -52.0), 3.0),
        PointLightClusterData::new(Vec3::new(0.0, 0.0, 0.5), 0.4),
        PointLightClusterData::new(Vec3::new(12.0, 12.0, -10.0), 2.5),
        PointLightClusterData::new(Vec3::new(0.0, -14.0, -10.0), 1.0),
    ];
    let expected = [true, false, true, false, true, false, true, false];

    for (light, data) in points.iter().enumerate() {
        let single = [*data];
        let lights = LightSet::new(&single, &[]);
        let mut six = SixPlaneClusterer::new(
            flat_params(ClustererParameters::six_plane()),
            viewport,
            Box::new(HostBuffers::new()),
        );
        six.cluster_lights(&cam, viewport, lights).unwrap();
        let mut arrays = PlaneArrayClusterer::new(
            flat_params(ClustererParameters::plane_arrays()).with_refinement(false),
            viewport,
            Box::new(HostBuffers::new()),
        );
        arrays.cluster_lights(&cam, viewport, lights).unwrap();

        assert_eq!(six.cluster_list().len(), 1);
        let six_hit = six.cluster_list()[0].point_count == 1;
        let arrays_hit = arrays.cluster_list()[0].point_count == 1;
        assert_eq!(six_hit, arrays_hit, "light {light}");
        assert_eq!(six_hit, expected[light], "light {light}");
    }
}

#[test]
fn test_repeated_frames_are_byte_identical() {
    let viewport = Viewport::new(320, 256);
    let cam = ClusterCamera::perspective(60f32.to_radians(), 320.0 / 256.0, 0.5, 100.0);
    let points = light_cloud(50);
    let spots = [SpotLightClusterData::from_cone(
        Vec3::new(1.0, 0.0, -3.0),
        Vec3::NEG_Z,
        20.0,
        0.4,
    )];
    let sink = Arc::new(HostBuffers::new());
    let mut clusterer = PlaneArrayClusterer::new(
        ClustererParameters::plane_arrays(),
        viewport,
        Box::new(Arc::clone(&sink)),
    );

    clusterer.cluster_lights(&cam, viewport, LightSet::new(&points, &spots)).unwrap();
    let records = clusterer.cluster_list().to_vec();
    let items = clusterer.items().to_vec();
    let uploaded_list = sink.contents(BufferBinding::ClusterList);
    let uploaded_items = sink.contents(BufferBinding::ItemList);

    clusterer.cluster_lights(&cam, viewport, LightSet::new(&points, &spots)).unwrap();
    assert_eq!(clusterer.cluster_list(), &records[..]);
    assert_eq!(clusterer.items(), &items[..]);
    assert_eq!(sink.contents(BufferBinding::ClusterList), uploaded_list);
    assert_eq!(sink.contents(BufferBinding::ItemList), uploaded_items);
    assert!(!clusterer.base().is_dirty());
    assert_eq!(clusterer.base().timings().len(), 2);
    assert!(clusterer.base().timings().average_ms() >= 0.0);
}

#[test]
fn test_item_buffer_grows_by_powers_of_two() {
    let viewport = Viewport::new(256, 256);
    let sink = Arc::new(HostBuffers::new());
    let params = flat_params(ClustererParameters::plane_arrays()).with_avg_items_per_cluster(1);
    let mut clusterer = PlaneArrayClusterer::new(params, viewport, Box::new(Arc::clone(&sink)));
    let points = vec![PointLightClusterData::new(Vec3::ZERO, 1000.0); 5];

    clusterer.cluster_lights(&camera(), viewport, LightSet::new(&points, &[])).unwrap();
    assert_eq!(clusterer.items().len(), 80);
    assert_eq!(clusterer.output().item_capacity(), 128);
    assert_eq!(clusterer.output().avg_items_per_cluster(), 8);
    assert_eq!(clusterer.base().info().item_list_count, 128);
    assert_eq!(sink.allocation_count(BufferBinding::ItemList), 2);

    let uploaded_items = sink.contents(BufferBinding::ItemList).unwrap();
    assert_eq!(uploaded_items.len(), 128 * 4);
    let info: light_clusterer::ClusterInfo =
        bytemuck::pod_read_unaligned(&sink.contents(BufferBinding::ClusterInfo).unwrap());
    assert_eq!(info.item_list_count, 128);

    // Grow-only: a lighter frame keeps the capacity.
    clusterer.cluster_lights(&camera(), viewport, LightSet::new(&points[..1], &[])).unwrap();
    assert_eq!(clusterer.items().len(), 16);
    assert_eq!(clusterer.output().item_capacity(), 128);
    assert_eq!(sink.allocation_count(BufferBinding::ItemList), 2);
}

#[test]
fn test_grown_item_list_is_retired_not_freed() {
    let viewport = Viewport::new(256, 256);
    let sink = Arc::new(HostBuffers::new());
    let params = flat_params(ClustererParameters::plane_arrays()).with_avg_items_per_cluster(1);
    let mut clusterer = PlaneArrayClusterer::new(params, viewport, Box::new(Arc::clone(&sink)));
    let points = vec![PointLightClusterData::new(Vec3::ZERO, 1000.0); 3];

    clusterer
        .cluster_lights(&camera(), viewport, LightSet::new(&points, &[]))
        .unwrap();
    assert_eq!(sink.allocation_count(BufferBinding::ItemList), 2);
    assert_eq!(sink.retired_count(BufferBinding::ItemList), 1);
    assert_eq!(sink.retired_count(BufferBinding::ClusterList), 0);

    // Steady frames write in place and retire nothing new.
    clusterer
        .cluster_lights(&camera(), viewport, LightSet::new(&points, &[]))
        .unwrap();
    assert_eq!(sink.retired_count(BufferBinding::ItemList), 1);

    clusterer.output().release_retired().unwrap();
    assert_eq!(sink.retired_count(BufferBinding::ItemList), 0);
    assert_eq!(sink.contents(BufferBinding::ItemList).unwrap().len(), 64 * 4);
}

#[test]
fn test_buffer_limit_is_a_hard_error() {
    let viewport = Viewport::new(256, 256);
    let params = flat_params(ClustererParameters::plane_arrays());

    // 16 clusters * 128 items * 4 bytes = 8 KiB initial item list.
    let mut tiny =
        PlaneArrayClusterer::new(params, viewport, Box::new(HostBuffers::with_limit(4096)));
    let err = tiny.cluster_lights(&camera(), viewport, LightSet::default()).unwrap_err();
    assert!(matches!(err, ClusterError::BufferTooLarge { .. }));
    assert!(tiny.base().is_dirty());

    let mut bounded =
        PlaneArrayClusterer::new(params, viewport, Box::new(HostBuffers::with_limit(8192)));
    bounded.cluster_lights(&camera(), viewport, LightSet::default()).unwrap();
    let points = vec![PointLightClusterData::new(Vec3::ZERO, 1000.0); 130];
    let err = bounded
        .cluster_lights(&camera(), viewport, LightSet::new(&points, &[]))
        .unwrap_err();
    assert_eq!(
        err,
        ClusterError::BufferTooLarge {
            buffer: "item list",
            requested: 16384,
            limit: 8192
        }
    );
}

#[test]
fn test_spot_lights_follow_point_lights() {
    let viewport = Viewport::new(256, 256);
    let points = [PointLightClusterData::new(Vec3::new(0.0, 0.0, -5.0), 1000.0)];
    let spots = [
        SpotLightClusterData::from_cone(Vec3::ZERO, Vec3::NEG_Z, 1000.0, 1.2),
        SpotLightClusterData::from_cone(Vec3::new(0.0, 0.0, 20.0), Vec3::Z, 5.0, 0.3),
    ];
    let mut six = SixPlaneClusterer::new(
        flat_params(ClustererParameters::six_plane()),
        viewport,
        Box::new(HostBuffers::new()),
    );
    six.cluster_lights(&camera(), viewport, LightSet::new(&points, &spots)).unwrap();
    assert_eq!(six.base().profiler().spot_light_count, 2);

    let mut arrays = PlaneArrayClusterer::new(
        flat_params(ClustererParameters::plane_arrays()),
        viewport,
        Box::new(HostBuffers::new()),
    );
    arrays.cluster_lights(&camera(), viewport, LightSet::new(&points, &spots)).unwrap();

    let outputs = [
        (six.cluster_list(), six.items()),
        (arrays.cluster_list(), arrays.items()),
    ];
    for (records, items) in outputs {
        for record in records {
            assert_eq!((record.point_count, record.spot_count), (1, 1));
            let at = record.offset as usize;
            assert_eq!(&items[at..at + 2], &[0, 0]);
        }
    }
}

#[test]
fn test_cluster_index_starts_bottom_left_near() {
    let viewport = Viewport::new(320, 256);
    let cam = ClusterCamera::perspective(60f32.to_radians(), 320.0 / 256.0, 0.5, 100.0);
    let grid =
        light_clusterer::ClusterGrid::new(&ClusterGridConfig::default(), &cam, viewport).unwrap();
    let dims = grid.dims();
    let first = grid.cell_frustum(0, 0, 0).centroid();
    let last = grid.cell_frustum(dims.x - 1, dims.y - 1, dims.z - 1).centroid();
    assert!(first.x < 0.0 && first.y < 0.0);
    assert!(last.x > 0.0 && last.y > 0.0 && last.z < first.z);

    let points = [
        PointLightClusterData::new(first, 1e-3),
        PointLightClusterData::new(last, 1e-3),
    ];
    let mut clusterer = PlaneArrayClusterer::new(
        ClustererParameters::plane_arrays(),
        viewport,
        Box::new(HostBuffers::new()),
    );
    clusterer.cluster_lights(&cam, viewport, LightSet::new(&points, &[])).unwrap();
    let records = clusterer.cluster_list();
    assert_eq!(records[0].point_count, 1);
    assert_eq!(records[grid.cluster_count() - 1].point_count, 1);
    assert_eq!(records.iter().map(|r| r.item_count()).sum::<usize>(), 2);
}
