// Cell-partitioned triangle navigation graph.
//
// World space is cut into axis-aligned cubes of `cell_size`, centered on
// `center + coord * cell_size`. Each `CellData` owns the vertices and graph
// nodes contributed by one cell's mesh. A graph node is one triangle (three
// vertex refs) plus its neighbour list; two triangles are neighbours when
// they share an edge.
//
// Vertices and nodes are stored in `StableIndexVec`s so that rebuilding one
// cell (`update_cell`) frees and reuses only that cell's slots. Node indices
// held by other cells stay valid.
//
// Connectivity comes in two kinds:
// - Intra-cell: built by `update_cell` from shared vertex indices (an O(n^2)
//   pass over the cell's own nodes; cells are small).
// - Cross-cell: built by `stitch_cells` between face-adjacent cells. Each
//   cell meshes its own samples, so shared vertices are duplicated rather
//   than shared; two boundary nodes are stitched when at least two of their
//   vertex positions coincide within `stitch_epsilon`. Every stitched link is
//   recorded per cell pair so `rip_cells` removes exactly those links.
//
// `update_cell` clears the cell (ripping its stitches), inserts the new
// geometry, and re-stitches with every populated face neighbour. Mutation
// takes `&mut self`, so stitching is serialized with every other update.
//
// See also: `nav_system.rs`, which drives cell updates from sampled volumes,
// `stable_index.rs`, `graph_search.rs`.

use crate::config::NavConfig;
use crate::debug_draw::{Color, DebugDraw};
use crate::error::NavError;
use crate::graph_search::{EuclideanPolicy, NavPathResult, NodePositions, SearchGraph, find_path};
use crate::marching_cubes::MeshData;
use crate::stable_index::{StableIndexVec, Validate, Validator};
use crate::types::{Aabb, CellCoord, Vec3};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet};

/// Vertex ref marking an invalidated node.
pub const NO_VERTEX: u32 = u32::MAX;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// Geometry submitted for one cell: a triangle mesh plus the vertices that
/// lie on its open boundary. This is also the persistence unit for a cell.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CellCreationData {
    pub vertices: Vec<Vec3>,
    /// Triangle list into `vertices`, 3 per triangle.
    pub triangles: Vec<u32>,
    /// Indices into `vertices` that must connect to neighbour cells.
    pub outer_vertices: Vec<u32>,
}

impl From<MeshData> for CellCreationData {
    fn from(mesh: MeshData) -> Self {
        Self {
            vertices: mesh.vertices,
            triangles: mesh.indices,
            outer_vertices: mesh.outer_vertices,
        }
    }
}

/// A triangle of the navigation surface.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub vertices: [u32; 3],
    pub neighbours: SmallVec<[u32; 6]>,
    pub cell: CellCoord,
    pub center: Vec3,
}

impl Validate for GraphNode {
    fn is_valid(&self) -> bool {
        self.vertices.iter().all(|&v| v != NO_VERTEX)
    }

    fn invalidate(&mut self) {
        self.vertices = [NO_VERTEX; 3];
        self.neighbours.clear();
    }
}

impl GraphNode {
    fn connect(&mut self, other: u32) {
        if !self.neighbours.contains(&other) {
            self.neighbours.push(other);
        }
    }

    fn disconnect(&mut self, other: u32) {
        self.neighbours.retain(|n| *n != other);
    }

    /// Number of vertex refs shared with `other`.
    fn shared_vertices(&self, other: &GraphNode) -> usize {
        self.vertices
            .iter()
            .filter(|v| other.vertices.contains(v))
            .count()
    }
}

/// Vertex slots: `Vec3::MAX` is a hole.
#[derive(Clone, Copy, Debug, Default)]
pub struct VertexSlot;

impl Validator<Vec3> for VertexSlot {
    fn is_valid(value: &Vec3) -> bool {
        *value != Vec3::MAX
    }

    fn invalidate(value: &mut Vec3) {
        *value = Vec3::MAX;
    }
}

/// Everything one spatial cell contributes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CellData {
    pub vertices: Vec<u32>,
    pub nodes: Vec<u32>,
    pub boundary_nodes: BTreeSet<u32>,
    pub outer_vertices: BTreeSet<u32>,
    /// Cross-cell links per neighbour cell, as (own node, their node).
    pub stitches: BTreeMap<CellCoord, Vec<(u32, u32)>>,
}

impl CellData {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn stitch_count(&self) -> usize {
        self.stitches.values().map(Vec::len).sum()
    }
}

// ---------------------------------------------------------------------------
// CelledSurfaceNavData
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct CelledSurfaceNavData {
    center: Vec3,
    cell_size: f32,
    stitch_epsilon: f32,
    vertices: StableIndexVec<Vec3, VertexSlot>,
    nodes: StableIndexVec<GraphNode>,
    cells: BTreeMap<CellCoord, CellData>,
}

impl Default for CelledSurfaceNavData {
    fn default() -> Self {
        Self::new(Vec3::ZERO, NavConfig::default().cell_size)
    }
}

impl CelledSurfaceNavData {
    pub fn new(center: Vec3, cell_size: f32) -> Self {
        Self {
            center,
            cell_size,
            stitch_epsilon: NavConfig::default().stitch_epsilon,
            vertices: StableIndexVec::new(),
            nodes: StableIndexVec::new(),
            cells: BTreeMap::new(),
        }
    }

    pub fn from_config(config: &NavConfig) -> Self {
        Self {
            stitch_epsilon: config.stitch_epsilon,
            ..Self::new(config.center, config.cell_size)
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    // -- Cell geometry ------------------------------------------------------

    /// The cell whose box contains `point` (nearest cell center).
    pub fn cell_coord(&self, point: Vec3) -> CellCoord {
        (point - self.center).grid_snap(self.cell_size)
    }

    pub fn cell_center(&self, coord: CellCoord) -> Vec3 {
        self.center + coord.to_vec3() * self.cell_size
    }

    pub fn cell_bounds(&self, coord: CellCoord) -> Aabb {
        Aabb::from_center_extent(self.cell_center(coord), Vec3::splat(self.cell_size * 0.5))
    }

    /// Every cell coordinate whose box may intersect `bounds`.
    pub fn cells_containing_box(&self, bounds: &Aabb) -> Vec<CellCoord> {
        let lo = self.cell_coord(bounds.min);
        let hi = self.cell_coord(bounds.max);
        let mut out = Vec::new();
        for z in lo.z..=hi.z {
            for y in lo.y..=hi.y {
                for x in lo.x..=hi.x {
                    out.push(CellCoord::new(x, y, z));
                }
            }
        }
        out
    }

    // -- Accessors ----------------------------------------------------------

    pub fn cell(&self, coord: CellCoord) -> Option<&CellData> {
        self.cells.get(&coord)
    }

    pub fn cell_coords(&self) -> impl Iterator<Item = CellCoord> + '_ {
        self.cells.keys().copied()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn node(&self, index: u32) -> Option<&GraphNode> {
        self.nodes.get(index)
    }

    pub fn vertex(&self, index: u32) -> Option<Vec3> {
        self.vertices.get(index).copied()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.num_occupied()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.num_occupied()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn node_corners(&self, node: &GraphNode) -> Option<[Vec3; 3]> {
        let [a, b, c] = node.vertices;
        Some([
            *self.vertices.get(a)?,
            *self.vertices.get(b)?,
            *self.vertices.get(c)?,
        ])
    }

    // -- Cell updates -------------------------------------------------------

    /// Replace the contents of one cell and reconnect it to its neighbours.
    pub fn update_cell(&mut self, coord: CellCoord, data: &CellCreationData) {
        self.clear_cell(coord);

        let bounds = self.cell_bounds(coord).expanded_by(self.stitch_epsilon);
        let mut outside = 0usize;
        let mut cell = self.cells.remove(&coord).unwrap_or_default();

        let local_to_global: Vec<u32> = data
            .vertices
            .iter()
            .map(|&p| {
                if !bounds.contains(p) {
                    outside += 1;
                }
                self.vertices.add(p)
            })
            .collect();
        cell.vertices.clone_from(&local_to_global);
        if outside > 0 {
            log::warn!(
                "cell {coord}: {outside} of {} vertices lie outside the cell bounds",
                data.vertices.len()
            );
        }

        cell.outer_vertices = data
            .outer_vertices
            .iter()
            .filter_map(|&v| local_to_global.get(v as usize).copied())
            .collect();

        let mut skipped = 0usize;
        for tri in data.triangles.chunks_exact(3) {
            let mapped = [tri[0], tri[1], tri[2]].map(|v| local_to_global.get(v as usize).copied());
            let [Some(a), Some(b), Some(c)] = mapped else {
                skipped += 1;
                continue;
            };
            let center = (self.vertices[a] + self.vertices[b] + self.vertices[c]) / 3.0;
            let index = self.nodes.add(GraphNode {
                vertices: [a, b, c],
                neighbours: SmallVec::new(),
                cell: coord,
                center,
            });
            if [a, b, c].iter().any(|v| cell.outer_vertices.contains(v)) {
                cell.boundary_nodes.insert(index);
            }
            cell.nodes.push(index);
        }
        if skipped > 0 {
            log::warn!("cell {coord}: skipped {skipped} triangles with out-of-range vertex refs");
        }

        self.connect_cell_nodes(&cell.nodes);
        self.cells.insert(coord, cell);

        for neighbour in coord.face_neighbors() {
            if self.cells.get(&neighbour).is_some_and(|c| !c.is_empty()) {
                self.stitch_cells(coord, neighbour);
            }
        }

        if let Some(cell) = self.cells.get(&coord) {
            log::debug!(
                "cell {coord} rebuilt: {} vertices, {} nodes, {} boundary, {} stitched",
                cell.vertices.len(),
                cell.nodes.len(),
                cell.boundary_nodes.len(),
                cell.stitch_count()
            );
        }
    }

    /// Connect every pair of nodes that share at least two vertices.
    fn connect_cell_nodes(&mut self, nodes: &[u32]) {
        for (i, &a) in nodes.iter().enumerate() {
            for &b in &nodes[i + 1..] {
                let shared = match (self.nodes.get(a), self.nodes.get(b)) {
                    (Some(na), Some(nb)) => na.shared_vertices(nb),
                    _ => 0,
                };
                if shared >= 2 {
                    self.link(a, b);
                }
            }
        }
    }

    fn link(&mut self, a: u32, b: u32) {
        if let Some(n) = self.nodes.get_mut(a) {
            n.connect(b);
        }
        if let Some(n) = self.nodes.get_mut(b) {
            n.connect(a);
        }
    }

    fn unlink(&mut self, a: u32, b: u32) {
        if let Some(n) = self.nodes.get_mut(a) {
            n.disconnect(b);
        }
        if let Some(n) = self.nodes.get_mut(b) {
            n.disconnect(a);
        }
    }

    /// Detach a cell from its neighbours and free its vertices and nodes.
    /// The (now empty) cell entry is kept.
    pub fn clear_cell(&mut self, coord: CellCoord) {
        let Some(stitched) = self.cells.get(&coord).map(|c| c.stitches.keys().copied().collect::<Vec<_>>())
        else {
            return;
        };
        for other in stitched {
            self.rip_cells(coord, other);
        }

        let Some(cell) = self.cells.get_mut(&coord) else {
            return;
        };
        let old = std::mem::take(cell);
        for node in old.nodes {
            self.nodes.remove_at(node);
        }
        for vertex in old.vertices {
            self.vertices.remove_at(vertex);
        }
    }

    /// Drop every cell, vertex, and node.
    pub fn clear_all(&mut self) {
        self.cells.clear();
        self.nodes.clear();
        self.vertices.clear();
    }

    // -- Cross-cell connectivity --------------------------------------------

    /// Link boundary nodes of `a` and `b` whose triangles share at least two
    /// vertex positions. Replaces any earlier stitching between the pair.
    /// Returns the number of links made.
    pub fn stitch_cells(&mut self, a: CellCoord, b: CellCoord) -> usize {
        if a == b {
            return 0;
        }
        self.rip_cells(a, b);
        let (Some(cell_a), Some(cell_b)) = (self.cells.get(&a), self.cells.get(&b)) else {
            return 0;
        };

        let eps = self.stitch_epsilon;
        let mut links = Vec::new();
        for &na in &cell_a.boundary_nodes {
            let Some(pa) = self.nodes.get(na).and_then(|n| self.node_corners(n)) else {
                continue;
            };
            for &nb in &cell_b.boundary_nodes {
                let Some(pb) = self.nodes.get(nb).and_then(|n| self.node_corners(n)) else {
                    continue;
                };
                let shared = pa
                    .iter()
                    .filter(|p| pb.iter().any(|q| p.approx_eq(*q, eps)))
                    .count();
                if shared >= 2 {
                    links.push((na, nb));
                }
            }
        }

        for &(na, nb) in &links {
            self.link(na, nb);
        }
        let count = links.len();
        if count > 0 {
            let reversed = links.iter().map(|&(x, y)| (y, x)).collect();
            if let Some(cell) = self.cells.get_mut(&a) {
                cell.stitches.insert(b, links);
            }
            if let Some(cell) = self.cells.get_mut(&b) {
                cell.stitches.insert(a, reversed);
            }
        }
        count
    }

    /// Remove exactly the links `stitch_cells(a, b)` made. Intra-cell
    /// adjacency is untouched. Returns the number of links removed.
    pub fn rip_cells(&mut self, a: CellCoord, b: CellCoord) -> usize {
        let links = self
            .cells
            .get_mut(&a)
            .and_then(|cell| cell.stitches.remove(&b))
            .unwrap_or_default();
        if let Some(cell) = self.cells.get_mut(&b) {
            cell.stitches.remove(&a);
        }
        for &(na, nb) in &links {
            self.unlink(na, nb);
        }
        links.len()
    }

    // -- Queries ------------------------------------------------------------

    /// Node of `point`'s cell whose triangle plane is closest to `point`,
    /// by absolute plane distance. Degenerate triangles are skipped.
    pub fn closest_node(&self, point: Vec3) -> Option<u32> {
        let cell = self.cells.get(&self.cell_coord(point))?;
        let mut best: Option<(u32, f32)> = None;
        for &index in &cell.nodes {
            let Some(node) = self.nodes.get(index) else {
                continue;
            };
            let Some([a, b, c]) = self.node_corners(node) else {
                continue;
            };
            let normal = (b - a).cross(c - a).normalize_or_zero();
            if normal == Vec3::ZERO {
                continue;
            }
            // Strict: the first node in cell order wins ties.
            let plane_dist = normal.dot(point - a).abs();
            if best.is_none_or(|(_, d)| plane_dist < d) {
                best = Some((index, plane_dist));
            }
        }
        best.map(|(index, _)| index)
    }

    /// Snap `point` to the navigation surface (center of its closest node).
    pub fn project_point_to_navigation(&self, point: Vec3) -> Option<Vec3> {
        self.closest_node(point)
            .and_then(|n| self.nodes.get(n))
            .map(|n| n.center)
    }

    /// A* between the nodes closest to two points. Locations are node centers.
    pub fn find_path(
        &self,
        from: Vec3,
        to: Vec3,
        allow_partial: bool,
    ) -> Result<NavPathResult, NavError> {
        let start = self.closest_node(from).ok_or(NavError::NoNavigableSurface)?;
        let goal = self.closest_node(to).ok_or(NavError::NoNavigableSurface)?;
        self.find_path_between_nodes(start, goal, allow_partial)
    }

    pub fn find_path_between_nodes(
        &self,
        start: u32,
        goal: u32,
        allow_partial: bool,
    ) -> Result<NavPathResult, NavError> {
        if let Some(bad) = [start, goal].into_iter().find(|&n| !self.nodes.is_element_at(n)) {
            return Err(NavError::InvalidNode(bad));
        }
        let policy = EuclideanPolicy {
            allow_partial,
            ..EuclideanPolicy::default()
        };
        let search = find_path(self, &policy, start, goal);
        let locations = search
            .path
            .iter()
            .filter_map(|&n| self.nodes.get(n))
            .map(|n| n.center)
            .collect();
        Ok(NavPathResult { search, locations })
    }

    /// Rebuild input that reproduces a cell's current geometry.
    pub fn cell_creation_data(&self, coord: CellCoord) -> Option<CellCreationData> {
        let cell = self.cells.get(&coord)?;
        let global_to_local: BTreeMap<u32, u32> = cell
            .vertices
            .iter()
            .enumerate()
            .map(|(local, &global)| (global, local as u32))
            .collect();

        let vertices = cell
            .vertices
            .iter()
            .map(|&v| self.vertices.get(v).copied().unwrap_or(Vec3::MAX))
            .collect();
        let triangles = cell
            .nodes
            .iter()
            .filter_map(|&n| self.nodes.get(n))
            .flat_map(|n| n.vertices)
            .filter_map(|v| global_to_local.get(&v).copied())
            .collect();
        let outer_vertices = cell
            .outer_vertices
            .iter()
            .filter_map(|v| global_to_local.get(v).copied())
            .collect();
        Some(CellCreationData {
            vertices,
            triangles,
            outer_vertices,
        })
    }

    // -- Debug drawing ------------------------------------------------------

    pub fn draw_cell_bounds(&self, coord: CellCoord, sink: &mut dyn DebugDraw, duration: f32) {
        sink.draw_box(
            self.cell_center(coord),
            Vec3::splat(self.cell_size * 0.5),
            Color::WHITE,
            duration,
        );
    }

    /// Node centers (boundary nodes highlighted) and adjacency lines.
    pub fn draw_cell_graph(&self, coord: CellCoord, sink: &mut dyn DebugDraw, duration: f32) {
        let Some(cell) = self.cells.get(&coord) else {
            return;
        };
        for &index in &cell.nodes {
            let Some(node) = self.nodes.get(index) else {
                continue;
            };
            let color = if cell.boundary_nodes.contains(&index) {
                Color::YELLOW
            } else {
                Color::CYAN
            };
            sink.draw_point(node.center, 5.0, color, duration);
            for &n in &node.neighbours {
                if n > index {
                    if let Some(other) = self.nodes.get(n) {
                        sink.draw_line(node.center, other.center, Color::GREEN, duration);
                    }
                }
            }
        }
    }

    pub fn draw_all(&self, sink: &mut dyn DebugDraw, duration: f32) {
        for coord in self.cells.keys() {
            self.draw_cell_bounds(*coord, sink, duration);
            self.draw_cell_graph(*coord, sink, duration);
        }
    }
}

impl SearchGraph for CelledSurfaceNavData {
    type NodeRef = u32;

    fn neighbour_count(&self, node: u32) -> usize {
        self.nodes.get(node).map_or(0, |n| n.neighbours.len())
    }

    fn is_valid_ref(&self, node: u32) -> bool {
        self.nodes.is_element_at(node)
    }

    fn neighbour(&self, node: u32, index: usize) -> u32 {
        self.nodes[node].neighbours[index]
    }
}

impl NodePositions for CelledSurfaceNavData {
    fn node_position(&self, node: u32) -> Vec3 {
        self.nodes[node].center
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug_draw::RecordingDebugDraw;

    /// Two-triangle strip on y = 0 from `x0` to `x1`, z in [-10, 10].
    fn strip(x0: f32, x1: f32) -> CellCreationData {
        CellCreationData {
            vertices: vec![
                Vec3::new(x0, 0.0, -10.0),
                Vec3::new(x1, 0.0, -10.0),
                Vec3::new(x0, 0.0, 10.0),
                Vec3::new(x1, 0.0, 10.0),
            ],
            triangles: vec![0, 1, 2, 1, 3, 2],
            outer_vertices: vec![0, 1, 2, 3],
        }
    }

    const A: CellCoord = CellCoord::new(0, 0, 0);
    const B: CellCoord = CellCoord::new(1, 0, 0);

    fn two_cells() -> CelledSurfaceNavData {
        let mut nav = CelledSurfaceNavData::new(Vec3::ZERO, 100.0);
        nav.update_cell(A, &strip(0.0, 50.0));
        nav.update_cell(B, &strip(50.0, 100.0));
        nav
    }

    /// Sorted neighbour counts, for structure comparisons.
    fn degree_profile(nav: &CelledSurfaceNavData) -> Vec<usize> {
        let mut d: Vec<usize> = nav.nodes.iter().map(|(_, n)| n.neighbours.len()).collect();
        d.sort_unstable();
        d
    }

    #[test]
    fn cell_geometry() {
        let nav = CelledSurfaceNavData::new(Vec3::new(10.0, 0.0, 0.0), 100.0);
        assert_eq!(nav.cell_coord(Vec3::new(59.0, 0.0, 0.0)), A);
        assert_eq!(nav.cell_coord(Vec3::new(61.0, 0.0, 0.0)), B);
        assert_eq!(nav.cell_center(B), Vec3::new(110.0, 0.0, 0.0));
        let bounds = nav.cell_bounds(B);
        assert_eq!(bounds.min, Vec3::new(60.0, -50.0, -50.0));
        assert_eq!(bounds.max, Vec3::new(160.0, 50.0, 50.0));
    }

    #[test]
    fn cells_containing_box_is_inclusive() {
        let nav = CelledSurfaceNavData::new(Vec3::ZERO, 100.0);
        let b = Aabb::new(Vec3::new(-40.0, -40.0, -40.0), Vec3::new(160.0, 40.0, 40.0));
        let cells = nav.cells_containing_box(&b);
        assert_eq!(
            cells,
            vec![CellCoord::new(0, 0, 0), CellCoord::new(1, 0, 0), CellCoord::new(2, 0, 0)]
        );
    }

    #[test]
    fn update_cell_builds_intra_cell_graph() {
        let mut nav = CelledSurfaceNavData::new(Vec3::ZERO, 100.0);
        nav.update_cell(A, &strip(0.0, 40.0));
        let cell = nav.cell(A).unwrap();
        assert_eq!(cell.vertices.len(), 4);
        assert_eq!(cell.nodes.len(), 2);
        assert_eq!(cell.boundary_nodes.len(), 2);
        let (n0, n1) = (cell.nodes[0], cell.nodes[1]);
        assert_eq!(nav.node(n0).unwrap().neighbours.as_slice(), &[n1]);
        assert_eq!(nav.node(n1).unwrap().neighbours.as_slice(), &[n0]);
    }

    #[test]
    fn update_cell_is_idempotent() {
        let mut nav = two_cells();
        let before = (nav.vertex_count(), nav.node_count(), degree_profile(&nav));
        let nodes_before = nav.cell(A).unwrap().nodes.clone();

        nav.update_cell(A, &strip(0.0, 50.0));
        let after = (nav.vertex_count(), nav.node_count(), degree_profile(&nav));
        assert_eq!(before, after);
        // Freed slots are reused in the same order.
        assert_eq!(nav.cell(A).unwrap().nodes, nodes_before);
        assert_eq!(nav.cell(A).unwrap().stitch_count(), 1);
    }

    #[test]
    fn neighbours_are_stitched_on_update() {
        let nav = two_cells();
        assert_eq!(nav.cell(A).unwrap().stitch_count(), 1);
        assert_eq!(nav.cell(B).unwrap().stitch_count(), 1);

        let (na, nb) = nav.cell(A).unwrap().stitches[&B][0];
        assert!(nav.node(na).unwrap().neighbours.contains(&nb));
        assert!(nav.node(nb).unwrap().neighbours.contains(&na));
        assert_eq!(nav.node(na).unwrap().cell, A);
        assert_eq!(nav.node(nb).unwrap().cell, B);
    }

    #[test]
    fn rip_removes_only_cross_cell_links() {
        let mut nav = two_cells();
        let before = degree_profile(&nav);
        assert_eq!(nav.rip_cells(A, B), 1);
        assert_eq!(nav.cell(A).unwrap().stitch_count(), 0);
        assert_eq!(nav.cell(B).unwrap().stitch_count(), 0);
        // Every node keeps its single intra-cell neighbour.
        assert_eq!(degree_profile(&nav), vec![1, 1, 1, 1]);

        assert_eq!(nav.stitch_cells(A, B), 1);
        assert_eq!(degree_profile(&nav), before);
        // Stitching again replaces rather than duplicates.
        assert_eq!(nav.stitch_cells(B, A), 1);
        assert_eq!(degree_profile(&nav), before);
    }

    #[test]
    fn clear_cell_detaches_and_frees() {
        let mut nav = two_cells();
        nav.clear_cell(A);
        assert!(nav.cell(A).unwrap().is_empty());
        assert_eq!(nav.node_count(), 2);
        assert_eq!(nav.vertex_count(), 4);
        assert_eq!(nav.cell(B).unwrap().stitch_count(), 0);
        for &n in &nav.cell(B).unwrap().nodes {
            for m in &nav.node(n).unwrap().neighbours {
                assert!(nav.is_valid_ref(*m));
            }
        }
    }

    #[test]
    fn clear_all_drops_everything() {
        let mut nav = two_cells();
        nav.clear_all();
        assert_eq!(nav.cell_count(), 0);
        assert!(nav.is_empty());
        assert_eq!(nav.vertex_count(), 0);
    }

    #[test]
    fn path_crosses_stitched_cells() {
        let nav = two_cells();
        let result = nav
            .find_path(Vec3::new(5.0, 0.0, -5.0), Vec3::new(95.0, 0.0, 5.0), false)
            .unwrap();
        assert!(result.is_success());
        // Both strips are flat, so each end snaps to its cell's first node.
        let (a0, a1) = (nav.cell(A).unwrap().nodes[0], nav.cell(A).unwrap().nodes[1]);
        let b0 = nav.cell(B).unwrap().nodes[0];
        assert_eq!(result.search.path, vec![a0, a1, b0]);
    }

    #[test]
    fn path_after_rip_is_partial() {
        let mut nav = two_cells();
        nav.rip_cells(A, B);
        let result = nav
            .find_path(Vec3::new(5.0, 0.0, -5.0), Vec3::new(95.0, 0.0, 5.0), true)
            .unwrap();
        assert!(result.is_partial());
        assert!(result.locations.iter().all(|p| p.x <= 50.0));
    }

    #[test]
    fn closest_node_uses_plane_distance() {
        // A floor triangle and a wall triangle in the same cell.
        let data = CellCreationData {
            vertices: vec![
                Vec3::new(-40.0, 0.0, -40.0),
                Vec3::new(40.0, 0.0, -40.0),
                Vec3::new(-40.0, 0.0, 40.0),
                Vec3::new(30.0, 0.0, -40.0),
                Vec3::new(30.0, 40.0, -40.0),
                Vec3::new(30.0, 0.0, 40.0),
            ],
            triangles: vec![0, 1, 2, 3, 4, 5],
            outer_vertices: vec![],
        };
        let mut nav = CelledSurfaceNavData::new(Vec3::ZERO, 100.0);
        nav.update_cell(A, &data);
        let cell = nav.cell(A).unwrap();
        let (floor, wall) = (cell.nodes[0], cell.nodes[1]);
        // Just above the floor but near the wall's centroid: plane distance wins.
        let p = Vec3::new(28.0, 1.0, 0.0);
        assert_eq!(nav.closest_node(p), Some(floor));
        // Right next to the wall plane.
        let q = Vec3::new(29.5, 30.0, 0.0);
        assert_eq!(nav.closest_node(q), Some(wall));
        let projected = nav.project_point_to_navigation(q).unwrap();
        assert_eq!(projected, nav.node(wall).unwrap().center);
    }

    #[test]
    fn coplanar_closest_node_keeps_the_first() {
        let mut nav = CelledSurfaceNavData::new(Vec3::ZERO, 100.0);
        nav.update_cell(A, &strip(0.0, 40.0));
        let cell = nav.cell(A).unwrap();
        let (first, second) = (cell.nodes[0], cell.nodes[1]);
        // Right above the second triangle's center; plane distances are equal.
        let above = nav.node(second).unwrap().center + Vec3::new(0.0, 5.0, 0.0);
        assert_eq!(nav.closest_node(above), Some(first));
        // A strictly closer plane still wins regardless of order.
        let mut data = strip(0.0, 40.0);
        data.vertices.extend([
            Vec3::new(0.0, 4.0, -10.0),
            Vec3::new(40.0, 4.0, -10.0),
            Vec3::new(0.0, 4.0, 10.0),
        ]);
        data.triangles.extend([4, 5, 6]);
        nav.update_cell(A, &data);
        let raised = nav.cell(A).unwrap().nodes[2];
        assert_eq!(nav.closest_node(above), Some(raised));
    }

    #[test]
    fn closest_node_outside_populated_cells_is_none() {
        let nav = two_cells();
        assert_eq!(nav.closest_node(Vec3::new(500.0, 0.0, 0.0)), None);
        assert!(matches!(
            nav.find_path(Vec3::ZERO, Vec3::new(500.0, 0.0, 0.0), true),
            Err(NavError::NoNavigableSurface)
        ));
    }

    #[test]
    fn path_between_dead_nodes_is_an_error() {
        let mut nav = two_cells();
        let dead = nav.cell(A).unwrap().nodes[0];
        let live = nav.cell(B).unwrap().nodes[0];
        nav.clear_cell(A);
        assert!(matches!(
            nav.find_path_between_nodes(dead, live, true),
            Err(NavError::InvalidNode(n)) if n == dead
        ));
        assert!(nav.find_path_between_nodes(live, live, false).unwrap().is_success());
    }

    #[test]
    fn out_of_bounds_vertices_are_kept() {
        let mut nav = CelledSurfaceNavData::new(Vec3::ZERO, 100.0);
        nav.update_cell(A, &strip(0.0, 80.0));
        assert_eq!(nav.cell(A).unwrap().vertices.len(), 4);
        assert_eq!(nav.node_count(), 2);
    }

    #[test]
    fn bad_triangle_refs_are_skipped() {
        let mut data = strip(0.0, 40.0);
        data.triangles.extend([0, 1, 99]);
        let mut nav = CelledSurfaceNavData::new(Vec3::ZERO, 100.0);
        nav.update_cell(A, &data);
        assert_eq!(nav.node_count(), 2);
    }

    #[test]
    fn creation_data_roundtrips_through_bincode() {
        let nav = two_cells();
        let exported = nav.cell_creation_data(A).unwrap();
        assert_eq!(exported, strip(0.0, 50.0));

        let bytes = bincode::serialize(&exported).unwrap();
        let restored: CellCreationData = bincode::deserialize(&bytes).unwrap();

        let mut rebuilt = CelledSurfaceNavData::new(Vec3::ZERO, 100.0);
        rebuilt.update_cell(A, &restored);
        rebuilt.update_cell(B, &nav.cell_creation_data(B).unwrap());
        assert_eq!(degree_profile(&rebuilt), degree_profile(&nav));
    }

    #[test]
    fn draw_cell_graph_marks_boundary_nodes() {
        let nav = two_cells();
        let mut sink = RecordingDebugDraw::default();
        nav.draw_all(&mut sink, 0.0);
        assert_eq!(sink.boxes(), 2);
        assert_eq!(sink.points(), 4);
        // 2 intra-cell links + 1 stitched link, each drawn once per direction
        // from the lower index.
        assert_eq!(sink.lines(), 3);
    }
}
