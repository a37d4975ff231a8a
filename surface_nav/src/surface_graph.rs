// Edge-adjacency navigation graph extracted from marching cubes.
//
// Instead of emitting triangles, `SurfaceGraphBuilder` turns every
// isosurface-crossing cube edge into a graph node (`EdgeRecord`) positioned
// at the interpolated crossing point. The three edges of every marching-cubes
// triangle are connected pairwise, so adjacency mirrors the triangle
// structure of the mesh `MarchingCubesBuilder` would produce for the same
// field.
//
// Records are first written into a flat array indexed by global edge id
// (`marching_cubes::tables::global_edge_index`), sized for the worst case.
// Slots that no triangle touched keep the sentinel position `Vec3::MAX`.
// A cleanup pass then drops those slots and renumbers adjacency, so the
// finished graph is dense and ordered by global edge id.
//
// `SurfaceNavLocalData` wraps a finished graph with the grid dimensions it
// was built from, an optional nearest-edge finder, and A* path queries.
//
// See also: `marching_cubes/mod.rs` for the shared per-cube primitives,
// `edge_finder.rs`, `graph_search.rs`.

use crate::config::{EdgeFinderKind, NavConfig};
use crate::debug_draw::{Color, DebugDraw};
use crate::edge_finder::{EdgeFinder, make_edge_finder};
use crate::error::NavError;
use crate::field::{ScalarField, ScalarSample, cube_corners};
use crate::graph_search::{EuclideanPolicy, NavPathResult, NodePositions, SearchGraph, find_path};
use crate::marching_cubes::tables::{EDGE_TABLE, EDGES, global_edge_capacity, global_edge_index};
use crate::marching_cubes::{case_triangle_edges, cube_case, vertex_lerp};
use crate::types::{GridDims, Vec3};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

// ---------------------------------------------------------------------------
// EdgeRecord
// ---------------------------------------------------------------------------

/// One crossing cube edge: where the surface cuts it and which other edges
/// share a triangle with it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    /// `Vec3::MAX` until a triangle assigns it.
    pub position: Vec3,
    pub neighbours: SmallVec<[u32; 6]>,
}

impl Default for EdgeRecord {
    fn default() -> Self {
        Self {
            position: Vec3::MAX,
            neighbours: SmallVec::new(),
        }
    }
}

impl EdgeRecord {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            neighbours: SmallVec::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.position != Vec3::MAX
    }

    /// Add `other` as a neighbour unless it is already one.
    pub fn connect(&mut self, other: u32) {
        if !self.neighbours.contains(&other) {
            self.neighbours.push(other);
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct SurfaceGraphBuilder<'a> {
    samples: &'a [ScalarSample],
    dims: GridDims,
    pub surface_level: f32,
}

impl<'a> SurfaceGraphBuilder<'a> {
    pub fn new(samples: &'a [ScalarSample], dims: GridDims, surface_level: f32) -> Self {
        Self {
            samples,
            dims,
            surface_level,
        }
    }

    pub fn from_field(field: &'a ScalarField, surface_level: f32) -> Self {
        Self::new(&field.samples, field.dims, surface_level)
    }

    pub fn is_valid(&self) -> bool {
        self.check_input().is_ok()
    }

    fn check_input(&self) -> Result<(), NavError> {
        if self.dims.is_empty() {
            return Err(NavError::InvalidDimensions(self.dims));
        }
        if self.samples.len() < self.dims.count() {
            return Err(NavError::InvalidInput {
                dims: self.dims,
                expected: self.dims.count(),
                actual: self.samples.len(),
            });
        }
        Ok(())
    }

    /// Build the compacted edge graph.
    pub fn build_graph(&self) -> Result<Vec<EdgeRecord>, NavError> {
        if let Err(err) = self.check_input() {
            log::error!("surface graph input rejected: {err}");
            return Err(err);
        }

        let mut records = vec![EdgeRecord::default(); global_edge_capacity(self.dims)];
        for z in 0..self.dims.z.saturating_sub(1) {
            for y in 0..self.dims.y.saturating_sub(1) {
                for x in 0..self.dims.x.saturating_sub(1) {
                    self.connect_cube(x, y, z, &mut records);
                }
            }
        }
        let graph = compact(records);
        log::debug!("built surface graph: {} edges from {}", graph.len(), self.dims);
        Ok(graph)
    }

    /// Build the graph straight into a `SurfaceNavLocalData`.
    pub fn build_local_data(&self) -> Result<SurfaceNavLocalData, NavError> {
        Ok(SurfaceNavLocalData::new(self.build_graph()?, self.dims))
    }

    fn connect_cube(&self, x: usize, y: usize, z: usize, records: &mut [EdgeRecord]) {
        let Some(corners) = cube_corners(self.samples, self.dims, x, y, z) else {
            return;
        };
        let case = cube_case(&corners, self.surface_level);
        if EDGE_TABLE[case as usize] == 0 {
            return;
        }

        for tri in case_triangle_edges(case) {
            let ids = tri.map(|edge| global_edge_index(self.dims, x, y, z, edge));
            for (&edge, &id) in tri.iter().zip(&ids) {
                let record = &mut records[id];
                if !record.is_initialized() {
                    let [a, b] = EDGES[edge];
                    record.position = vertex_lerp(self.surface_level, &corners[a], &corners[b]);
                }
            }
            for i in 0..3 {
                for j in 0..3 {
                    if i != j {
                        records[ids[i]].connect(ids[j] as u32);
                    }
                }
            }
        }
    }
}

/// Drop uninitialized slots and renumber adjacency to the dense indices.
fn compact(records: Vec<EdgeRecord>) -> Vec<EdgeRecord> {
    let mut remap = vec![u32::MAX; records.len()];
    let mut next = 0u32;
    for (old, record) in records.iter().enumerate() {
        if record.is_initialized() {
            remap[old] = next;
            next += 1;
        }
    }

    records
        .into_iter()
        .filter(EdgeRecord::is_initialized)
        .map(|mut record| {
            for n in record.neighbours.iter_mut() {
                *n = remap[*n as usize];
            }
            record
        })
        .collect()
}

// ---------------------------------------------------------------------------
// SurfaceNavLocalData
// ---------------------------------------------------------------------------

/// A finished edge graph plus the sample grid it came from.
#[derive(Debug, Default)]
pub struct SurfaceNavLocalData {
    graph: Vec<EdgeRecord>,
    dims: GridDims,
    finder: Option<Box<dyn EdgeFinder>>,
}

impl SurfaceNavLocalData {
    pub fn new(graph: Vec<EdgeRecord>, dims: GridDims) -> Self {
        Self {
            graph,
            dims,
            finder: None,
        }
    }

    pub fn graph(&self) -> &[EdgeRecord] {
        &self.graph
    }

    pub fn dims(&self) -> GridDims {
        self.dims
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    /// Install and build the nearest-edge finder `config` selects.
    pub fn set_edge_finder(&mut self, config: &NavConfig) {
        let mut finder = make_edge_finder(config);
        finder.rebuild(&self.graph);
        self.finder = Some(finder);
    }

    /// Strategy of the installed finder; `None` means linear fallback scans.
    pub fn edge_finder_kind(&self) -> Option<EdgeFinderKind> {
        self.finder.as_ref().map(|f| f.kind())
    }

    /// Nearest edge to `point`, through the finder when one is ready and by
    /// linear scan otherwise.
    pub fn find_edge_index(&self, point: Vec3) -> Option<usize> {
        match &self.finder {
            Some(finder) if finder.is_ready() => finder.find_edge_index(&self.graph, point),
            _ => self
                .graph
                .iter()
                .enumerate()
                .filter(|(_, e)| e.is_initialized())
                .min_by(|a, b| {
                    let da = a.1.position.distance_squared(point);
                    let db = b.1.position.distance_squared(point);
                    da.total_cmp(&db).then(a.0.cmp(&b.0))
                })
                .map(|(i, _)| i),
        }
    }

    /// A* between two edge indices with Euclidean cost and heuristic.
    pub fn find_path(&self, from: u32, to: u32, allow_partial: bool) -> NavPathResult {
        let policy = EuclideanPolicy {
            allow_partial,
            ..EuclideanPolicy::default()
        };
        let search = find_path(self, &policy, from, to);
        let locations = self.path_locations(&search.path);
        NavPathResult { search, locations }
    }

    /// A* between the edges nearest to two world points.
    pub fn find_path_between(
        &self,
        from: Vec3,
        to: Vec3,
        allow_partial: bool,
    ) -> Result<NavPathResult, NavError> {
        let start = self.find_edge_index(from).ok_or(NavError::NoNavigableSurface)?;
        let goal = self.find_edge_index(to).ok_or(NavError::NoNavigableSurface)?;
        Ok(self.find_path(start as u32, goal as u32, allow_partial))
    }

    pub fn path_locations(&self, path: &[u32]) -> Vec<Vec3> {
        path.iter()
            .filter_map(|&i| self.graph.get(i as usize))
            .map(|e| e.position)
            .collect()
    }

    /// Points for nodes, lines for adjacency (each undirected link once).
    pub fn draw_graph(&self, sink: &mut dyn DebugDraw, duration: f32) {
        for (i, edge) in self.graph.iter().enumerate() {
            sink.draw_point(edge.position, 5.0, Color::CYAN, duration);
            for &n in &edge.neighbours {
                if (n as usize) > i {
                    if let Some(other) = self.graph.get(n as usize) {
                        sink.draw_line(edge.position, other.position, Color::GREEN, duration);
                    }
                }
            }
        }
    }
}

impl SearchGraph for SurfaceNavLocalData {
    type NodeRef = u32;

    fn neighbour_count(&self, node: u32) -> usize {
        self.graph.get(node as usize).map_or(0, |e| e.neighbours.len())
    }

    fn is_valid_ref(&self, node: u32) -> bool {
        self.graph
            .get(node as usize)
            .is_some_and(EdgeRecord::is_initialized)
    }

    fn neighbour(&self, node: u32, index: usize) -> u32 {
        self.graph[node as usize].neighbours[index]
    }
}

impl NodePositions for SurfaceNavLocalData {
    fn node_position(&self, node: u32) -> Vec3 {
        self.graph[node as usize].position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug_draw::RecordingDebugDraw;
    use crate::marching_cubes::MarchingCubesBuilder;

    /// Solid below `height`, empty above, on a unit lattice.
    fn floor_field(dims: GridDims, height: f32) -> ScalarField {
        ScalarField::from_fn(dims, Vec3::ZERO, 1.0, |p| if p.y < height { 1.0 } else { 0.0 })
    }

    fn index_of(graph: &[EdgeRecord], p: Vec3) -> usize {
        graph.iter().position(|e| e.position == p).unwrap()
    }

    #[test]
    fn single_triangle_is_fully_connected() {
        let mut values = [0.0; 8];
        values[0] = 1.0;
        let field = ScalarField::from_values(GridDims::new(2, 2, 2), &values).unwrap();
        let graph = SurfaceGraphBuilder::from_field(&field, 0.5).build_graph().unwrap();
        assert_eq!(graph.len(), 3);
        for (i, e) in graph.iter().enumerate() {
            assert_eq!(e.neighbours.len(), 2);
            assert!(!e.neighbours.contains(&(i as u32)));
        }
    }

    #[test]
    fn no_surface_gives_empty_graph() {
        let field = ScalarField::from_fn(GridDims::new(3, 3, 3), Vec3::ZERO, 1.0, |_| 1.0);
        let graph = SurfaceGraphBuilder::from_field(&field, 0.5).build_graph().unwrap();
        assert!(graph.is_empty());
    }

    #[test]
    fn invalid_input_is_rejected() {
        let samples = vec![ScalarSample::default(); 3];
        let builder = SurfaceGraphBuilder::new(&samples, GridDims::new(2, 2, 2), 0.5);
        assert!(!builder.is_valid());
        assert!(builder.build_graph().is_err());
    }

    #[test]
    fn graph_nodes_match_mesh_vertices() {
        let field = floor_field(GridDims::new(5, 4, 6), 1.5);
        let mesh = MarchingCubesBuilder::from_field(&field, 0.5).build().unwrap();
        let graph = SurfaceGraphBuilder::from_field(&field, 0.5).build_graph().unwrap();
        assert_eq!(graph.len(), mesh.vertices.len());

        // Every mesh triangle is a clique in the graph.
        for [a, b, c] in mesh.triangles() {
            let ids = [a, b, c].map(|v| index_of(&graph, mesh.vertices[v as usize]));
            for &i in &ids {
                for &j in &ids {
                    if i != j {
                        assert!(graph[i].neighbours.contains(&(j as u32)));
                    }
                }
            }
        }
    }

    #[test]
    fn adjacency_is_symmetric_and_in_range() {
        let field = floor_field(GridDims::new(4, 4, 4), 1.5);
        let graph = SurfaceGraphBuilder::from_field(&field, 0.5).build_graph().unwrap();
        for (i, e) in graph.iter().enumerate() {
            assert!(e.is_initialized());
            for &n in &e.neighbours {
                assert!((n as usize) < graph.len());
                assert!(graph[n as usize].neighbours.contains(&(i as u32)));
            }
            let mut sorted = e.neighbours.to_vec();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(sorted.len(), e.neighbours.len());
        }
    }

    #[test]
    fn path_across_floor_succeeds() {
        let field = floor_field(GridDims::new(6, 4, 6), 1.5);
        let mut nav = SurfaceGraphBuilder::from_field(&field, 0.5)
            .build_local_data()
            .unwrap();
        nav.set_edge_finder(&NavConfig::default());
        assert_eq!(nav.edge_finder_kind(), Some(EdgeFinderKind::Grid));

        let result = nav
            .find_path_between(Vec3::new(0.0, 1.5, 0.0), Vec3::new(5.0, 1.5, 5.0), true)
            .unwrap();
        assert!(result.is_success());
        assert_eq!(result.locations.first(), Some(&Vec3::new(0.0, 1.5, 0.0)));
        assert_eq!(result.locations.last(), Some(&Vec3::new(5.0, 1.5, 5.0)));
        // Every step is along the surface.
        for p in &result.locations {
            assert_eq!(p.y, 1.5);
        }
    }

    #[test]
    fn path_between_separate_plates_is_partial() {
        // Two plates at different heights with a gap in x between them.
        let field = ScalarField::from_fn(GridDims::new(9, 6, 3), Vec3::ZERO, 1.0, |p| {
            let low = p.x <= 3.0 && p.y < 1.5;
            let high = p.x >= 5.0 && p.y < 3.5;
            if low || high { 1.0 } else { 0.0 }
        });
        let nav = SurfaceGraphBuilder::from_field(&field, 0.5)
            .build_local_data()
            .unwrap();
        let from = nav.find_edge_index(Vec3::new(0.0, 1.5, 1.0)).unwrap() as u32;
        let to = nav.find_edge_index(Vec3::new(8.0, 3.5, 1.0)).unwrap() as u32;

        let partial = nav.find_path(from, to, true);
        assert!(partial.is_partial());
        assert!(partial.locations.iter().all(|p| p.x <= 3.5));

        let failed = nav.find_path(from, to, false);
        assert!(!failed.is_success());
        assert!(failed.locations.is_empty());
    }

    #[test]
    fn draw_graph_emits_each_link_once() {
        let mut values = [0.0; 8];
        values[0] = 1.0;
        let field = ScalarField::from_values(GridDims::new(2, 2, 2), &values).unwrap();
        let nav = SurfaceGraphBuilder::from_field(&field, 0.5)
            .build_local_data()
            .unwrap();
        let mut sink = RecordingDebugDraw::default();
        nav.draw_graph(&mut sink, 1.0);
        assert_eq!(sink.points(), 3);
        assert_eq!(sink.lines(), 3);
    }
}
