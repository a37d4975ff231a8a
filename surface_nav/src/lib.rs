// surface_nav — surface navigation from sampled occupancy.
//
// Turns a 3D occupancy field into a walkable triangle surface and a graph
// over it, partitions that graph into spatial cells that can be rebuilt
// independently, and runs A* over it with best-effort partial paths when a
// goal cannot be reached.
//
// Data flow: `OccupancySampler` -> `ScalarField` -> `MarchingCubesBuilder`
// (mesh + boundary vertices) -> `CelledSurfaceNavData` (per-cell triangle
// graph, stitched across cell faces) -> `graph_search::find_path`.
// `SurfaceGraphBuilder` is the alternative graph: one node per crossed cube
// edge rather than per triangle.
//
// Module overview:
// - `types.rs`:          Vec3, CellCoord, GridDims, Aabb.
// - `error.rs`:          NavError.
// - `config.rs`:         NavConfig — all tunable parameters, JSON-loadable.
// - `stable_index.rs`:   StableIndexVec — slot storage with stable indices and free-slot reuse.
// - `field.rs`:          ScalarSample / ScalarField — dense sample grids.
// - `marching_cubes/`:   MarchingCubesBuilder, MeshData, case tables, global edge ownership.
// - `surface_graph.rs`:  SurfaceGraphBuilder / SurfaceNavLocalData — edge graph of one sampled grid.
// - `edge_finder.rs`:    Nearest-edge strategies (linear, grid hash, octree).
// - `graph_search.rs`:   Generic A* over any `SearchGraph` with a `SearchPolicy`.
// - `celled.rs`:         CelledSurfaceNavData — cell-partitioned triangle graph, stitching.
// - `sampler.rs`:        OccupancySampler and analytic samplers; box and lattice sampling.
// - `octree.rs`:         Hierarchical occupancy tester.
// - `debug_draw.rs`:     DebugDraw sink for diagnostic geometry.
// - `nav_system.rs`:     SurfaceNavigationSystem — volumes in, paths out.
//
// **Determinism.** Given the same samples, every build produces the same
// vertex order, node indices, and paths. Ordered collections are `BTreeMap`
// / `BTreeSet`; the `FxHashMap`s (edge dedup, A* records, grid buckets) are only
// looked up, never iterated. Parallel sampling writes disjoint slots.

pub mod celled;
pub mod config;
pub mod debug_draw;
pub mod edge_finder;
pub mod error;
pub mod field;
pub mod graph_search;
pub mod marching_cubes;
pub mod nav_system;
pub mod octree;
pub mod sampler;
pub mod stable_index;
pub mod surface_graph;
pub mod types;

pub use config::NavConfig;
pub use error::NavError;
pub use nav_system::SurfaceNavigationSystem;
