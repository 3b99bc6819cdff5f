use bevy_math::{IVec3, Vec3, bounding::Aabb3d};
use bevy_platform::collections::HashMap;
use marching_terrain::{
    AlwaysVisible, ChunkCoord, ChunkManager, NoiseSettings, Placement, TerrainConfig, TerrainError,
    storage::chunk::box_distance_squared,
};

fn streaming(view_distance: f32, points_per_axis: u32) -> TerrainConfig {
    TerrainConfig {
        noise: NoiseSettings {
            seed: 11,
            octaves: 3,
            noise_scale: 4.0,
            noise_weight: 3.0,
            ..Default::default()
        },
        bounds_size: 10.0,
        points_per_axis,
        placement: Placement::ViewerStreaming { view_distance },
        ..Default::default()
    }
}

#[test]
fn small_moves_keep_chunks_in_range() {
    let mut terrain = ChunkManager::new(streaming(30.0, 5)).unwrap();
    terrain.tick(Some(Vec3::new(1.0, 2.0, 3.0)), &AlwaysVisible);
    let before: HashMap<ChunkCoord, _> = terrain
        .chunks()
        .map(|chunk| (chunk.coord(), (chunk.id(), chunk.generation())))
        .collect();
    assert!(!before.is_empty());

    let viewer = Vec3::new(5.0, -1.0, 5.0);
    terrain.tick(Some(viewer), &AlwaysVisible);

    for (coord, (id, generation)) in &before {
        let center = terrain.chunk_center(*coord);
        let in_range = box_distance_squared(viewer, center, 10.0) <= 30.0 * 30.0;
        match terrain.chunk(*coord) {
            Some(chunk) => {
                assert!(in_range, "{coord} should have been evicted");
                assert_eq!(chunk.id(), *id, "{coord} was reassigned");
                assert_eq!(chunk.generation(), *generation, "{coord} was remeshed");
            }
            None => assert!(!in_range, "{coord} was evicted while in range"),
        }
    }
    for chunk in terrain.chunks() {
        let center = terrain.chunk_center(chunk.coord());
        assert!(box_distance_squared(viewer, center, 10.0) <= 30.0 * 30.0);
        assert!(chunk.generation() >= 1);
    }
}

#[test]
fn pool_never_outgrows_the_peak() {
    let mut terrain = ChunkManager::new(streaming(25.0, 3)).unwrap();
    let mut peak = 0;
    let mut viewer = Vec3::ZERO;
    for step in 0..60 {
        let direction = if (step / 10) % 2 == 0 { 1.0 } else { -1.0 };
        viewer += Vec3::new(13.0 * direction, 0.0, 4.0);
        let report = terrain.tick(Some(viewer), &AlwaysVisible);

        let stats = terrain.stats();
        peak = peak.max(stats.active);
        assert!(stats.live() <= peak, "step {step}: {stats:?} with peak {peak}");
        // Streaming never drops a chunk.
        assert_eq!(report.destroyed, 0);
        assert_eq!(stats.allocated_total, stats.live());
    }
}

#[test]
fn frustum_skipped_chunks_come_back() {
    let mut terrain = ChunkManager::new(streaming(20.0, 3)).unwrap();
    let only_below = |bounds: &Aabb3d| bounds.max.y <= 5.0;
    terrain.tick(Some(Vec3::ZERO), &only_below);
    assert!(terrain.chunk(ChunkCoord::new(0, 1, 0)).is_none());
    assert!(terrain.chunk(ChunkCoord::new(0, 0, 0)).is_some());

    let report = terrain.tick(Some(Vec3::ZERO), &AlwaysVisible);
    assert!(report.allocated + report.reused > 0);
    assert!(terrain.chunk(ChunkCoord::new(0, 1, 0)).is_some());
}

#[test]
fn neighboring_chunks_meet_at_their_shared_face() {
    let config = TerrainConfig {
        placement: Placement::FixedGrid {
            num_chunks: IVec3::new(2, 1, 1),
        },
        ..streaming(0.0, 11)
    };
    let mut terrain = ChunkManager::new(config).unwrap();
    terrain.request_update(None, &AlwaysVisible);

    let on_face = |coord| -> Vec<Vec3> {
        terrain
            .chunk(coord)
            .unwrap()
            .mesh()
            .vertices()
            .iter()
            .copied()
            .filter(|v| v.x.abs() < 1e-5)
            .collect()
    };
    let west = on_face(ChunkCoord::new(0, 0, 0));
    let east = on_face(ChunkCoord::new(1, 0, 0));
    assert!(!west.is_empty());
    for v in &west {
        assert!(
            east.iter().any(|u| u.abs_diff_eq(*v, 1e-4)),
            "{v} has no match across the seam"
        );
    }
    for u in &east {
        assert!(west.iter().any(|v| v.abs_diff_eq(*u, 1e-4)));
    }
}

#[test]
fn same_config_same_meshes() {
    let build = || {
        let mut terrain = ChunkManager::new(streaming(15.0, 7)).unwrap();
        terrain.tick(Some(Vec3::new(-3.0, 0.5, 8.0)), &AlwaysVisible);
        terrain
            .chunks()
            .map(|chunk| (chunk.coord(), chunk.mesh().clone()))
            .collect::<HashMap<_, _>>()
    };
    assert_eq!(build(), build());
}

#[test]
fn loads_from_a_file() {
    let path = std::env::temp_dir().join(format!("terrain-{}.toml", std::process::id()));
    std::fs::write(
        &path,
        r#"
points_per_axis = 4

[noise]
seed = 3
close_edges = true

[placement]
mode = "fixed_grid"
num_chunks = [2, 1, 2]
"#,
    )
    .unwrap();
    let config = TerrainConfig::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    let mut terrain = ChunkManager::new(config).unwrap();
    let report = terrain.request_update(None, &AlwaysVisible);
    assert_eq!(report.allocated, 4);

    let missing = TerrainConfig::load(path.with_extension("missing"));
    assert!(matches!(missing, Err(TerrainError::Io(_))));
}
