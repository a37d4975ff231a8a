// Nearest-edge lookup strategies for the flat surface graph.
//
// An `EdgeFinder` answers "which graph edge is closest to this point" for
// a `SurfaceNavLocalData`. The finder only owns its acceleration structure;
// the edge records themselves stay in the nav data and are passed in on
// every call, so a finder never holds a reference into the graph.
//
// Three interchangeable strategies, chosen by `EdgeFinderKind` in config:
// - `LinearEdgeFinder`: scan everything. No setup cost.
// - `GridEdgeFinder`: uniform hash grid keyed by the point snapped to
//   `cell_size`. Searches the query's bucket, then expanding shells of
//   buckets until no unvisited bucket can hold anything closer.
// - `OctreeEdgeFinder`: point octree with a leaf capacity, searched
//   nearest-child-first with box-distance pruning.
//
// All three return the same answer: the live edge with the smallest squared
// distance, lowest index on ties.
//
// See also: `surface_graph.rs` for `SurfaceNavLocalData`, `config.rs` for
// `EdgeFinderKind`.

use crate::config::{EdgeFinderKind, NavConfig};
use crate::surface_graph::EdgeRecord;
use crate::types::{Aabb, CellCoord, Vec3};
use rustc_hash::FxHashMap;
use std::fmt::Debug;

pub trait EdgeFinder: Debug + Send + Sync {
    /// Rebuild the acceleration structure from the current edges.
    fn rebuild(&mut self, edges: &[EdgeRecord]);

    fn is_ready(&self) -> bool;

    fn kind(&self) -> EdgeFinderKind;

    /// Index of the live edge nearest to `point`, if any.
    fn find_edge_index(&self, edges: &[EdgeRecord], point: Vec3) -> Option<usize>;
}

/// The finder selected by `config.edge_finder`, tuned by the rest of `config`.
pub fn make_edge_finder(config: &NavConfig) -> Box<dyn EdgeFinder> {
    match config.edge_finder {
        EdgeFinderKind::Linear => Box::new(LinearEdgeFinder::default()),
        EdgeFinderKind::Grid => Box::new(GridEdgeFinder::new(config.edge_finder_cell_size)),
        EdgeFinderKind::Octree => {
            Box::new(OctreeEdgeFinder::new(config.octree_max_elements_per_node))
        }
    }
}

/// Tracks the running best candidate. Ties keep the lower index.
#[derive(Clone, Copy, Debug)]
struct Closest {
    index: Option<usize>,
    dist_sq: f32,
}

impl Closest {
    fn new() -> Self {
        Self {
            index: None,
            dist_sq: f32::INFINITY,
        }
    }

    fn offer(&mut self, index: usize, dist_sq: f32) {
        let better = dist_sq < self.dist_sq
            || (dist_sq == self.dist_sq && self.index.is_some_and(|i| index < i));
        if better {
            self.index = Some(index);
            self.dist_sq = dist_sq;
        }
    }

    fn offer_edge(&mut self, edges: &[EdgeRecord], index: usize, point: Vec3) {
        if let Some(edge) = edges.get(index).filter(|e| e.is_initialized()) {
            self.offer(index, edge.position.distance_squared(point));
        }
    }
}

// ---------------------------------------------------------------------------
// Linear scan
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default)]
pub struct LinearEdgeFinder {
    ready: bool,
}

impl EdgeFinder for LinearEdgeFinder {
    fn rebuild(&mut self, _edges: &[EdgeRecord]) {
        self.ready = true;
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn kind(&self) -> EdgeFinderKind {
        EdgeFinderKind::Linear
    }

    fn find_edge_index(&self, edges: &[EdgeRecord], point: Vec3) -> Option<usize> {
        let mut best = Closest::new();
        for index in 0..edges.len() {
            best.offer_edge(edges, index, point);
        }
        best.index
    }
}

// ---------------------------------------------------------------------------
// Uniform grid
// ---------------------------------------------------------------------------

/// Fallback bucket size when the configured one is not positive.
pub const DEFAULT_GRID_CELL_SIZE: f32 = 100.0;

#[derive(Clone, Debug)]
pub struct GridEdgeFinder {
    cell_size: f32,
    buckets: FxHashMap<CellCoord, Vec<u32>>,
    /// Inclusive bucket-coordinate bounds of everything stored.
    bounds: Option<(CellCoord, CellCoord)>,
    ready: bool,
}

impl GridEdgeFinder {
    pub fn new(cell_size: f32) -> Self {
        let cell_size = if cell_size > 0.0 {
            cell_size
        } else {
            DEFAULT_GRID_CELL_SIZE
        };
        Self {
            cell_size,
            buckets: FxHashMap::default(),
            bounds: None,
            ready: false,
        }
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Range of shell radii around `key` that overlap the stored buckets.
    /// Shells below the first one are empty and shells past the last are
    /// outside the data.
    fn shell_range(&self, key: CellCoord) -> Option<(i64, i64)> {
        let (lo, hi) = self.bounds?;
        let near = |k: i32, lo: i32, hi: i32| {
            let (k, lo, hi) = (k as i64, lo as i64, hi as i64);
            (lo - k).max(k - hi).max(0)
        };
        let far = |k: i32, lo: i32, hi: i32| {
            let (k, lo, hi) = (k as i64, lo as i64, hi as i64);
            (k - lo).abs().max((k - hi).abs())
        };
        let first = near(key.x, lo.x, hi.x)
            .max(near(key.y, lo.y, hi.y))
            .max(near(key.z, lo.z, hi.z));
        let last = far(key.x, lo.x, hi.x)
            .max(far(key.y, lo.y, hi.y))
            .max(far(key.z, lo.z, hi.z));
        Some((first, last))
    }

    /// Offer every edge in the buckets at Chebyshev distance `r` from `key`,
    /// walking only the part of the shell inside the stored bounds.
    fn visit_shell(
        &self,
        edges: &[EdgeRecord],
        key: CellCoord,
        r: i64,
        point: Vec3,
        best: &mut Closest,
    ) {
        let Some((lo, hi)) = self.bounds else {
            return;
        };
        let span = |k: i32, lo: i32, hi: i32| {
            let k = k as i64;
            ((k - r).max(lo as i64), (k + r).min(hi as i64))
        };
        let (x0, x1) = span(key.x, lo.x, hi.x);
        let (y0, y1) = span(key.y, lo.y, hi.y);
        let (z0, z1) = span(key.z, lo.z, hi.z);
        let (kx, ky, kz) = (key.x as i64, key.y as i64, key.z as i64);
        for z in z0..=z1 {
            for y in y0..=y1 {
                let inner = (y - ky).abs().max((z - kz).abs());
                for x in x0..=x1 {
                    if inner.max((x - kx).abs()) != r {
                        continue;
                    }
                    let cell = CellCoord::new(x as i32, y as i32, z as i32);
                    if let Some(bucket) = self.buckets.get(&cell) {
                        for &index in bucket {
                            best.offer_edge(edges, index as usize, point);
                        }
                    }
                }
            }
        }
    }
}

impl EdgeFinder for GridEdgeFinder {
    fn rebuild(&mut self, edges: &[EdgeRecord]) {
        self.buckets.clear();
        self.bounds = None;
        for (index, edge) in edges.iter().enumerate() {
            if !edge.is_initialized() {
                continue;
            }
            let key = edge.position.grid_snap(self.cell_size);
            self.buckets.entry(key).or_default().push(index as u32);
            self.bounds = Some(match self.bounds {
                None => (key, key),
                Some((lo, hi)) => (
                    CellCoord::new(lo.x.min(key.x), lo.y.min(key.y), lo.z.min(key.z)),
                    CellCoord::new(hi.x.max(key.x), hi.y.max(key.y), hi.z.max(key.z)),
                ),
            });
        }
        self.ready = true;
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn kind(&self) -> EdgeFinderKind {
        EdgeFinderKind::Grid
    }

    fn find_edge_index(&self, edges: &[EdgeRecord], point: Vec3) -> Option<usize> {
        let key = point.grid_snap(self.cell_size);
        let (first, last) = self.shell_range(key)?;
        let mut best = Closest::new();
        for r in first..=last {
            self.visit_shell(edges, key, r, point, &mut best);
            // Anything in shell r+1 or beyond is at least r cells away.
            let reach = r as f32 * self.cell_size;
            if best.index.is_some() && best.dist_sq < reach * reach {
                break;
            }
        }
        best.index
    }
}

// ---------------------------------------------------------------------------
// Octree
// ---------------------------------------------------------------------------

/// Subdivision stops at this depth even if a leaf is over capacity.
const OCTREE_MAX_DEPTH: u32 = 16;

#[derive(Clone, Debug)]
struct OctreeNode {
    bounds: Aabb,
    items: Vec<u32>,
    /// Index of the first of 8 consecutive children in the node arena.
    first_child: Option<usize>,
}

#[derive(Clone, Debug)]
pub struct OctreeEdgeFinder {
    max_elements_per_node: usize,
    nodes: Vec<OctreeNode>,
    ready: bool,
}

impl OctreeEdgeFinder {
    pub fn new(max_elements_per_node: usize) -> Self {
        Self {
            max_elements_per_node: max_elements_per_node.max(1),
            nodes: Vec::new(),
            ready: false,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Child octant of `bounds` containing `p`: bit 0 = +x, bit 1 = +y, bit 2 = +z.
    fn octant(bounds: &Aabb, p: Vec3) -> usize {
        let c = bounds.center();
        (p.x > c.x) as usize | ((p.y > c.y) as usize) << 1 | ((p.z > c.z) as usize) << 2
    }

    fn child_bounds(bounds: &Aabb, octant: usize) -> Aabb {
        let c = bounds.center();
        let pick = |bit: usize, lo: f32, mid: f32, hi: f32| {
            if octant & bit != 0 { (mid, hi) } else { (lo, mid) }
        };
        let (x0, x1) = pick(1, bounds.min.x, c.x, bounds.max.x);
        let (y0, y1) = pick(2, bounds.min.y, c.y, bounds.max.y);
        let (z0, z1) = pick(4, bounds.min.z, c.z, bounds.max.z);
        Aabb::new(Vec3::new(x0, y0, z0), Vec3::new(x1, y1, z1))
    }

    fn insert(&mut self, edges: &[EdgeRecord], index: u32) {
        let p = edges[index as usize].position;
        let mut node = 0;
        let mut depth = 0;
        loop {
            if let Some(first) = self.nodes[node].first_child {
                node = first + Self::octant(&self.nodes[node].bounds, p);
                depth += 1;
                continue;
            }
            if self.nodes[node].items.len() < self.max_elements_per_node
                || depth >= OCTREE_MAX_DEPTH
            {
                self.nodes[node].items.push(index);
                return;
            }
            self.split(edges, node);
        }
    }

    fn split(&mut self, edges: &[EdgeRecord], node: usize) {
        let bounds = self.nodes[node].bounds;
        let first = self.nodes.len();
        for octant in 0..8 {
            self.nodes.push(OctreeNode {
                bounds: Self::child_bounds(&bounds, octant),
                items: Vec::new(),
                first_child: None,
            });
        }
        let items = std::mem::take(&mut self.nodes[node].items);
        self.nodes[node].first_child = Some(first);
        for index in items {
            let p = edges[index as usize].position;
            self.nodes[first + Self::octant(&bounds, p)].items.push(index);
        }
    }

    fn search(&self, edges: &[EdgeRecord], node: usize, point: Vec3, best: &mut Closest) {
        let n = &self.nodes[node];
        if n.bounds.distance_squared_to(point) > best.dist_sq {
            return;
        }
        for &index in &n.items {
            best.offer_edge(edges, index as usize, point);
        }
        if let Some(first) = n.first_child {
            let mut order: Vec<(f32, usize)> = (first..first + 8)
                .map(|c| (self.nodes[c].bounds.distance_squared_to(point), c))
                .collect();
            order.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            for (_, child) in order {
                self.search(edges, child, point, best);
            }
        }
    }
}

impl EdgeFinder for OctreeEdgeFinder {
    fn rebuild(&mut self, edges: &[EdgeRecord]) {
        self.nodes.clear();
        let live: Vec<u32> = edges
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_initialized())
            .map(|(i, _)| i as u32)
            .collect();

        if let Some(&first) = live.first() {
            let p0 = edges[first as usize].position;
            let (lo, hi) = live.iter().fold((p0, p0), |(lo, hi), &i| {
                let p = edges[i as usize].position;
                (lo.min(p), hi.max(p))
            });
            // Cubic root box, padded so points never sit on the outer faces.
            let half = ((hi - lo) * 0.5).abs();
            let extent = half.x.max(half.y).max(half.z) + 1.0;
            self.nodes.push(OctreeNode {
                bounds: Aabb::from_center_extent((lo + hi) * 0.5, Vec3::splat(extent)),
                items: Vec::new(),
                first_child: None,
            });
            for index in live {
                self.insert(edges, index);
            }
        }
        self.ready = true;
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn kind(&self) -> EdgeFinderKind {
        EdgeFinderKind::Octree
    }

    fn find_edge_index(&self, edges: &[EdgeRecord], point: Vec3) -> Option<usize> {
        if self.nodes.is_empty() {
            return None;
        }
        let mut best = Closest::new();
        self.search(edges, 0, point, &mut best);
        best.index
    }
}
