// End-to-end integration tests for the surface navigation pipeline.
//
// Each test drives real library code from occupancy sampling through
// meshing, cell building and stitching, to path search, and checks the
// observable result: triangle counts, node indices, path shape.
//
// Scenes come from `pipeline_tests` (floor, floor with a wall, cell-row
// volumes); see `src/lib.rs` for their geometry.

use pipeline_tests::{
    FLOOR_SURFACE_Y, cells_volume, floor, floor_with_wall, is_connected_path, on_floor,
    row_volume, system_with, test_config, unit_cube,
};
use surface_nav::NavConfig;
use surface_nav::celled::{CellCreationData, CelledSurfaceNavData};
use surface_nav::config::EdgeFinderKind;
use surface_nav::field::ScalarField;
use surface_nav::marching_cubes::MarchingCubesBuilder;
use surface_nav::nav_system::VolumeUpdateRequest;
use surface_nav::octree::{OccupancyOverlap, OctreeTester};
use surface_nav::sampler::sample_box;
use surface_nav::surface_graph::SurfaceGraphBuilder;
use surface_nav::types::{Aabb, CellCoord, GridDims, Vec3};

// ---------------------------------------------------------------------------
// Meshing
// ---------------------------------------------------------------------------

#[test]
fn single_occupied_corner_yields_one_triangle() {
    let field = unit_cube([1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    let mesh = MarchingCubesBuilder::from_field(&field, 0.5).build().unwrap();
    assert_eq!(mesh.vertices.len(), 3);
    assert_eq!(mesh.indices.len(), 3);
    // Each vertex is halfway along one of corner 0's edges.
    for v in &mesh.vertices {
        let coords = [v.x, v.y, v.z];
        assert_eq!(coords.iter().filter(|c| **c == 0.5).count(), 1);
        assert_eq!(coords.iter().filter(|c| **c == 0.0).count(), 2);
    }
}

#[test]
fn enclosed_solid_has_no_surface() {
    let field = ScalarField::from_fn(GridDims::new(6, 6, 6), Vec3::ZERO, 1.0, |_| 1.0);
    let mesh = MarchingCubesBuilder::from_field(&field, 0.5).build().unwrap();
    assert!(mesh.vertices.is_empty());
    assert!(mesh.is_empty());
}

#[test]
fn dedup_shares_vertices_between_cubes() {
    let dims = GridDims::new(12, 12, 12);
    let center = Vec3::splat(5.5);
    let field = ScalarField::from_fn(dims, Vec3::ZERO, 1.0, |p| 4.0 - p.distance(center));
    let shared = MarchingCubesBuilder::from_field(&field, 0.5).build().unwrap();
    let raw = MarchingCubesBuilder::from_field(&field, 0.5)
        .with_remove_duplicate_vertices(false)
        .build()
        .unwrap();

    assert_eq!(shared.triangle_count(), raw.triangle_count());
    assert_eq!(raw.vertices.len(), 3 * raw.triangle_count());
    assert!(shared.vertices.len() < raw.vertices.len());
    // At most one vertex per lattice edge.
    let lattice_edges = 3 * dims.count();
    assert!(shared.vertices.len() <= lattice_edges);
    // A closed sphere has no open boundary.
    assert!(shared.boundary_edges.is_empty());
}

// ---------------------------------------------------------------------------
// Celled navigation through the system
// ---------------------------------------------------------------------------

#[test]
fn json_configured_system_paths_across_three_cells() {
    let mut sys = system_with(floor());
    sys.add_volume(row_volume(3));
    assert_eq!(sys.nav_data().cell_count(), 3);

    let result = sys.find_path(on_floor(-30.0), on_floor(230.0)).unwrap();
    assert!(result.is_success());
    assert!(is_connected_path(sys.nav_data(), &result.search.path));

    let first = result.locations.first().unwrap();
    let last = result.locations.last().unwrap();
    assert_eq!(sys.nav_data().cell_coord(*first), CellCoord::new(0, 0, 0));
    assert_eq!(sys.nav_data().cell_coord(*last), CellCoord::new(2, 0, 0));
    assert!(result.locations.iter().all(|p| p.y == FLOOR_SURFACE_Y));
}

#[test]
fn wall_splits_surface_into_partial_path() {
    let mut sys = system_with(floor_with_wall(100.0));
    sys.add_volume(row_volume(3));

    let result = sys.find_path(on_floor(-30.0), on_floor(230.0)).unwrap();
    assert!(!result.is_success());
    assert!(result.is_partial());
    assert!(result.locations.iter().all(|p| p.x < 100.0));
    assert!(is_connected_path(sys.nav_data(), &result.search.path));
}

#[test]
fn partial_paths_can_be_disabled() {
    let mut config = test_config();
    config.allow_partial_paths = false;
    let mut sys = surface_nav::SurfaceNavigationSystem::new(&config, floor_with_wall(100.0));
    sys.add_volume(row_volume(3));

    let result = sys.find_path(on_floor(-30.0), on_floor(230.0)).unwrap();
    assert!(!result.is_success());
    assert!(!result.is_partial());
    assert!(result.locations.is_empty());
}

#[test]
fn rebuilding_one_cell_keeps_other_node_indices() {
    let mut sys = system_with(floor());
    sys.add_volume(cells_volume(0, 1));
    let far = sys.add_volume(cells_volume(2, 2));

    let a = CellCoord::new(0, 0, 0);
    let b = CellCoord::new(1, 0, 0);
    let c = CellCoord::new(2, 0, 0);
    let nodes_a = sys.nav_data().cell(a).unwrap().nodes.clone();
    let nodes_b = sys.nav_data().cell(b).unwrap().nodes.clone();
    let nodes_c = sys.nav_data().cell(c).unwrap().nodes.clone();
    assert_eq!(sys.nav_data().cell(b).unwrap().stitch_count(), 8);

    let affected = sys.apply(VolumeUpdateRequest::Update {
        id: far,
        bounds: cells_volume(2, 2),
    });
    assert_eq!(affected, vec![c]);

    let nav = sys.nav_data();
    assert_eq!(nav.cell(a).unwrap().nodes, nodes_a);
    assert_eq!(nav.cell(b).unwrap().nodes, nodes_b);
    // Freed slots come back in the same order.
    assert_eq!(nav.cell(c).unwrap().nodes, nodes_c);
    assert_eq!(nav.cell(b).unwrap().stitch_count(), 8);
    assert!(sys.find_path(on_floor(-30.0), on_floor(230.0)).unwrap().is_success());
}

#[test]
fn shrinking_a_volume_disconnects_the_far_cell() {
    let mut sys = system_with(floor());
    let id = sys.add_volume(row_volume(3));
    sys.apply(VolumeUpdateRequest::Update {
        id,
        bounds: row_volume(2),
    });
    assert!(sys.nav_data().cell(CellCoord::new(2, 0, 0)).unwrap().is_empty());
    assert_eq!(sys.closest_location(on_floor(230.0)), None);
    assert!(sys.closest_location(on_floor(130.0)).is_some());
}

#[test]
fn exported_cells_rebuild_identical_navigation() {
    let mut sys = system_with(floor());
    sys.add_volume(row_volume(3));
    let original = sys.nav_data();

    let exported: Vec<(CellCoord, CellCreationData)> = original
        .cell_coords()
        .filter_map(|c| original.cell_creation_data(c).map(|d| (c, d)))
        .collect();
    let json = serde_json::to_string(&exported).unwrap();
    let restored: Vec<(CellCoord, CellCreationData)> = serde_json::from_str(&json).unwrap();

    let mut rebuilt = CelledSurfaceNavData::from_config(sys.config());
    for (coord, data) in &restored {
        rebuilt.update_cell(*coord, data);
    }
    assert_eq!(rebuilt.node_count(), original.node_count());
    assert_eq!(rebuilt.vertex_count(), original.vertex_count());

    let from = on_floor(-30.0);
    let to = on_floor(230.0);
    let a = original.find_path(from, to, false).unwrap();
    let b = rebuilt.find_path(from, to, false).unwrap();
    assert!(b.is_success());
    assert_eq!(a.locations, b.locations);
}

// ---------------------------------------------------------------------------
// Edge graph and edge finders
// ---------------------------------------------------------------------------

#[test]
fn edge_graph_paths_agree_across_edge_finders() {
    let bounds = Aabb::from_center_extent(Vec3::ZERO, Vec3::new(100.0, 50.0, 100.0));
    let field = sample_box(&floor(), &bounds, 25.0, true);
    let mut local = SurfaceGraphBuilder::from_field(&field, 0.5)
        .build_local_data()
        .unwrap();
    assert!(!local.is_empty());

    let from = Vec3::new(-80.0, 0.0, -80.0);
    let to = Vec3::new(80.0, 0.0, 80.0);
    let mut paths = Vec::new();
    for kind in [EdgeFinderKind::Linear, EdgeFinderKind::Grid, EdgeFinderKind::Octree] {
        local.set_edge_finder(&NavConfig {
            edge_finder: kind,
            ..test_config()
        });
        assert_eq!(local.edge_finder_kind(), Some(kind));
        let result = local.find_path_between(from, to, false).unwrap();
        assert!(result.is_success(), "{kind:?}");
        assert!(result.locations.iter().all(|p| p.y.abs() < 1e-4));
        paths.push(result.search.path);
    }
    assert_eq!(paths[0], paths[1]);
    assert_eq!(paths[0], paths[2]);
}

#[test]
fn json_config_selects_the_edge_finder() {
    let config = NavConfig::from_json(r#"{ "edge_finder": "Octree" }"#).unwrap();
    assert_eq!(config.edge_finder, EdgeFinderKind::Octree);

    let bounds = Aabb::from_center_extent(Vec3::ZERO, Vec3::new(100.0, 50.0, 100.0));
    let field = sample_box(&floor(), &bounds, 25.0, false);
    let mut local = SurfaceGraphBuilder::from_field(&field, 0.5)
        .build_local_data()
        .unwrap();
    assert_eq!(local.edge_finder_kind(), None);
    local.set_edge_finder(&config);
    assert_eq!(local.edge_finder_kind(), Some(EdgeFinderKind::Octree));
}

#[test]
fn far_away_endpoints_snap_to_the_graph_edge() {
    let bounds = Aabb::from_center_extent(Vec3::ZERO, Vec3::new(100.0, 50.0, 100.0));
    let field = sample_box(&floor(), &bounds, 25.0, true);
    let mut local = SurfaceGraphBuilder::from_field(&field, 0.5)
        .build_local_data()
        .unwrap();
    let from = Vec3::new(-1.0e6, 0.0, -1.0e6);
    let to = Vec3::new(1.0e6, 0.0, 1.0e6);
    let mut paths = Vec::new();
    for kind in [EdgeFinderKind::Linear, EdgeFinderKind::Grid, EdgeFinderKind::Octree] {
        local.set_edge_finder(&NavConfig {
            edge_finder: kind,
            ..test_config()
        });
        let result = local.find_path_between(from, to, false).unwrap();
        assert!(result.is_success(), "{kind:?}");
        paths.push(result.search.path);
    }
    assert_eq!(paths[0], paths[1]);
    assert_eq!(paths[0], paths[2]);
}

// ---------------------------------------------------------------------------
// Occupancy tester
// ---------------------------------------------------------------------------

#[test]
fn octree_tester_marks_cells_below_floor() {
    let sampler = floor();
    let query = OccupancyOverlap {
        sampler: &sampler,
        threshold: 0.5,
    };
    let tester = OctreeTester::new(Vec3::new(0.0, 40.0, 0.0), 10.0, 4);
    let result = tester.run(&query);
    assert_eq!(result.cells.len(), 512);
    for cell in &result.cells {
        assert_eq!(cell.is_safe, cell.location.y > 0.0, "{:?}", cell.location);
    }
    assert!(result.tests_done < tester.worst_case_tests());
}
