// Test-only scene builders for surface navigation integration tests.
//
// Provides small analytic worlds (a floor, a floor split by a wall), volume
// boxes that cover a row of navigation cells, and a `SurfaceNavigationSystem`
// constructed from a JSON config the same way a host application loads one.
// Everything else in the tests runs through the real library code paths.
//
// Scene conventions, with the test config (25-unit voxels, 100-unit cells
// centered on the origin):
// - The floor is solid below y = 0. Cell sampling puts lattice points at
//   y = 0 (solid) and y = 25 (empty), so the walkable surface is at y = 12.5.
// - `row_volume(n)` covers cells (0, 0, 0) .. (n - 1, 0, 0).
//
// See also: `tests/full_pipeline.rs` for the scenarios.

use surface_nav::field::ScalarField;
use surface_nav::graph_search::SearchGraph;
use surface_nav::sampler::{BoxSampler, HalfSpaceSampler, OccupancySampler, UnionSampler};
use surface_nav::types::{Aabb, GridDims, Vec3};
use surface_nav::{NavConfig, SurfaceNavigationSystem};

/// Config used by every scenario. Only overrides are listed; the rest are
/// defaults.
pub const TEST_CONFIG_JSON: &str = r#"{
    "voxel_size": 25.0,
    "cell_size": 100.0,
    "stitch_epsilon": 0.01,
    "allow_partial_paths": true
}"#;

/// Height of the walkable surface over `floor()` in a cell-sampled scene.
pub const FLOOR_SURFACE_Y: f32 = 12.5;

pub fn test_config() -> NavConfig {
    NavConfig::from_json(TEST_CONFIG_JSON).unwrap_or_else(|e| panic!("bad test config: {e}"))
}

pub fn floor() -> HalfSpaceSampler {
    HalfSpaceSampler::floor(0.0)
}

/// Floor plus a wall 20 units thick centered on `wall_x`, spanning all of z
/// and rising far above any cell.
pub fn floor_with_wall(wall_x: f32) -> UnionSampler {
    let wall = Aabb::new(
        Vec3::new(wall_x - 10.0, -1000.0, -1000.0),
        Vec3::new(wall_x + 10.0, 1000.0, 1000.0),
    );
    UnionSampler::new().with(floor()).with(BoxSampler::new(wall))
}

/// Volume covering navigation cells x = 0 .. n - 1 (y = z = 0).
pub fn row_volume(n: i32) -> Aabb {
    cells_volume(0, n - 1)
}

/// Volume covering navigation cells x = first ..= last (y = z = 0).
pub fn cells_volume(first: i32, last: i32) -> Aabb {
    Aabb::new(
        Vec3::new(first as f32 * 100.0 - 40.0, -40.0, -40.0),
        Vec3::new(last as f32 * 100.0 + 40.0, 40.0, 40.0),
    )
}

pub fn system_with(sampler: impl OccupancySampler + 'static) -> SurfaceNavigationSystem {
    SurfaceNavigationSystem::new(&test_config(), sampler)
}

/// A point on the floor surface at the given x (z = 0).
pub fn on_floor(x: f32) -> Vec3 {
    Vec3::new(x, FLOOR_SURFACE_Y, 0.0)
}

/// A single unit cube with the given corner values, in corner order.
pub fn unit_cube(values: [f32; 8]) -> ScalarField {
    // Corner i sits at lattice point (x, y, z) with the offsets below; the
    // field itself is x-fastest.
    const LATTICE_ORDER: [usize; 8] = [0, 1, 3, 2, 4, 5, 7, 6];
    let mut lattice = [0.0; 8];
    for (corner, value) in values.into_iter().enumerate() {
        lattice[LATTICE_ORDER[corner]] = value;
    }
    ScalarField::from_values(GridDims::new(2, 2, 2), &lattice)
        .unwrap_or_else(|e| panic!("bad unit cube: {e}"))
}

/// Every consecutive pair of `path` is joined by a graph edge.
pub fn is_connected_path<G: SearchGraph<NodeRef = u32>>(graph: &G, path: &[u32]) -> bool {
    path.windows(2).all(|pair| {
        (0..graph.neighbour_count(pair[0])).any(|i| graph.neighbour(pair[0], i) == pair[1])
    })
}
