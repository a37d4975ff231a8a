// Marching-cubes triangulation of a sampled scalar field.
//
// `MarchingCubesBuilder` walks every unit cube of a W x H x D sample grid,
// classifies its 8 corners against the surface level (bit `i` of the case
// index is set when corner `i` is above the level), and emits the triangles
// listed in `tables::TRI_TABLE` for that case. Each triangle corner is the
// linear interpolation of the crossing edge's two samples at the surface
// level.
//
// With `remove_duplicate_vertices` (the default) each crossing edge is
// resolved to its global edge id (`tables::global_edge_index`) and emitted
// once; every triangle touching that edge reuses the vertex. Without it
// every triangle corner gets its own vertex and `indices` is `0..n`.
//
// With `find_boundary_edges` (also default, needs dedup) the builder then
// counts how many triangles use each undirected vertex pair. Pairs used once
// are boundary edges and their endpoints are the mesh's outer vertices;
// `celled.rs` uses those to know which triangles must stitch to neighbour
// cells.
//
// See also: `surface_graph.rs`, which runs the same per-cube walk but
// builds an edge graph instead of a mesh.

pub mod tables;

use crate::error::NavError;
use crate::field::{ScalarField, ScalarSample, cube_corners};
use crate::types::{GridDims, Vec3};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tables::{EDGE_TABLE, EDGES, TRI_TABLE, global_edge_index};

// ---------------------------------------------------------------------------
// Per-cube primitives
// ---------------------------------------------------------------------------

/// 8-bit case index: bit `i` set when corner `i` is above `level`.
pub fn cube_case(corners: &[ScalarSample; 8], level: f32) -> u8 {
    let mut case = 0u8;
    for (i, corner) in corners.iter().enumerate() {
        if corner.value > level {
            case |= 1 << i;
        }
    }
    case
}

/// Point where the surface crosses the edge `a`-`b`. Unclamped; `a` and
/// `b` must have different values.
pub fn vertex_lerp(level: f32, a: &ScalarSample, b: &ScalarSample) -> Vec3 {
    debug_assert!(
        a.value != b.value,
        "degenerate interpolation: both edge samples are {}",
        a.value
    );
    let t = (level - a.value) / (b.value - a.value);
    a.position.lerp(b.position, t)
}

/// Local edge ids of the triangles for one case, three per triangle.
pub fn case_triangle_edges(case: u8) -> impl Iterator<Item = [usize; 3]> {
    let row = &TRI_TABLE[case as usize];
    row.chunks_exact(3)
        .take_while(|tri| tri[0] >= 0)
        .map(|tri| [tri[0] as usize, tri[1] as usize, tri[2] as usize])
}

/// Triangulate a single cube without any vertex sharing.
pub fn polygonise_cube(corners: &[ScalarSample; 8], level: f32) -> Vec<[Vec3; 3]> {
    let case = cube_case(corners, level);
    if EDGE_TABLE[case as usize] == 0 {
        return Vec::new();
    }
    case_triangle_edges(case)
        .map(|tri| {
            tri.map(|edge| {
                let [a, b] = EDGES[edge];
                vertex_lerp(level, &corners[a], &corners[b])
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Mesh output
// ---------------------------------------------------------------------------

/// An undirected vertex pair. `IndexEdge::new(a, b) == IndexEdge::new(b, a)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndexEdge {
    pub a: u32,
    pub b: u32,
}

impl IndexEdge {
    pub fn new(a: u32, b: u32) -> Self {
        Self {
            a: a.min(b),
            b: a.max(b),
        }
    }
}

/// Triangle mesh produced by `MarchingCubesBuilder`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshData {
    pub vertices: Vec<Vec3>,
    /// Triangle list, 3 entries per triangle, indexing `vertices`.
    pub indices: Vec<u32>,
    /// Sorted, unique vertices lying on a boundary edge.
    pub outer_vertices: Vec<u32>,
    /// Edges used by exactly one triangle.
    pub boundary_edges: Vec<IndexEdge>,
    /// Edges shared by two or more triangles.
    pub inner_edges: Vec<IndexEdge>,
    pub boundary_calculated: bool,
}

impl MeshData {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }

    /// Classify edges by how many triangles use them and collect the outer
    /// vertices. Only meaningful on a mesh with shared vertices.
    pub fn calc_boundary(&mut self) {
        let mut use_count: BTreeMap<IndexEdge, u32> = BTreeMap::new();
        for [a, b, c] in self.triangles() {
            for edge in [IndexEdge::new(a, b), IndexEdge::new(b, c), IndexEdge::new(c, a)] {
                *use_count.entry(edge).or_insert(0) += 1;
            }
        }

        self.boundary_edges.clear();
        self.inner_edges.clear();
        let mut outer = Vec::new();
        for (edge, count) in use_count {
            if count == 1 {
                self.boundary_edges.push(edge);
                outer.push(edge.a);
                outer.push(edge.b);
            } else {
                self.inner_edges.push(edge);
            }
        }
        outer.sort_unstable();
        outer.dedup();
        self.outer_vertices = outer;
        self.boundary_calculated = true;
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Triangulates the level set `value == surface_level` of a sample grid.
#[derive(Clone, Debug)]
pub struct MarchingCubesBuilder<'a> {
    samples: &'a [ScalarSample],
    dims: GridDims,
    pub surface_level: f32,
    pub remove_duplicate_vertices: bool,
    /// Requires `remove_duplicate_vertices`.
    pub find_boundary_edges: bool,
    valid: bool,
}

impl<'a> MarchingCubesBuilder<'a> {
    /// Wrap a sample grid. Invalid input is logged here and makes `build`
    /// return an error.
    pub fn new(samples: &'a [ScalarSample], dims: GridDims, surface_level: f32) -> Self {
        let valid = match validate_grid(samples, dims) {
            Ok(()) => true,
            Err(err) => {
                log::error!("marching cubes input rejected: {err}");
                false
            }
        };
        Self {
            samples,
            dims,
            surface_level,
            remove_duplicate_vertices: true,
            find_boundary_edges: true,
            valid,
        }
    }

    pub fn from_field(field: &'a ScalarField, surface_level: f32) -> Self {
        Self::new(&field.samples, field.dims, surface_level)
    }

    pub fn with_remove_duplicate_vertices(mut self, on: bool) -> Self {
        self.remove_duplicate_vertices = on;
        self
    }

    pub fn with_find_boundary_edges(mut self, on: bool) -> Self {
        self.find_boundary_edges = on;
        self
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn dims(&self) -> GridDims {
        self.dims
    }

    pub fn build(&self) -> Result<MeshData, NavError> {
        validate_grid(self.samples, self.dims)?;

        let mut mesh = MeshData::default();
        let mut edge_to_vertex: FxHashMap<usize, u32> = FxHashMap::default();

        for z in 0..self.dims.z.saturating_sub(1) {
            for y in 0..self.dims.y.saturating_sub(1) {
                for x in 0..self.dims.x.saturating_sub(1) {
                    self.polygonise(x, y, z, &mut mesh, &mut edge_to_vertex);
                }
            }
        }

        if !self.remove_duplicate_vertices {
            mesh.indices = (0..mesh.vertices.len() as u32).collect();
        } else if self.find_boundary_edges {
            mesh.calc_boundary();
        }

        log::debug!(
            "built mesh: {} vertices, {} triangles",
            mesh.vertices.len(),
            mesh.triangle_count()
        );
        Ok(mesh)
    }

    fn polygonise(
        &self,
        x: usize,
        y: usize,
        z: usize,
        mesh: &mut MeshData,
        edge_to_vertex: &mut FxHashMap<usize, u32>,
    ) {
        let Some(corners) = cube_corners(self.samples, self.dims, x, y, z) else {
            return;
        };
        let case = cube_case(&corners, self.surface_level);
        if EDGE_TABLE[case as usize] == 0 {
            return;
        }

        for tri in case_triangle_edges(case) {
            for edge in tri {
                let [a, b] = EDGES[edge];
                if !self.remove_duplicate_vertices {
                    mesh.vertices
                        .push(vertex_lerp(self.surface_level, &corners[a], &corners[b]));
                    continue;
                }
                let global = global_edge_index(self.dims, x, y, z, edge);
                let vertex = *edge_to_vertex.entry(global).or_insert_with(|| {
                    mesh.vertices
                        .push(vertex_lerp(self.surface_level, &corners[a], &corners[b]));
                    (mesh.vertices.len() - 1) as u32
                });
                mesh.indices.push(vertex);
            }
        }
    }
}

fn validate_grid(samples: &[ScalarSample], dims: GridDims) -> Result<(), NavError> {
    if dims.is_empty() {
        return Err(NavError::InvalidDimensions(dims));
    }
    if samples.len() < dims.count() {
        return Err(NavError::InvalidInput {
            dims,
            expected: dims.count(),
            actual: samples.len(),
        });
    }
    Ok(())
}
