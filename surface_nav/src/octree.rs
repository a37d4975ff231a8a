// Hierarchical occupancy tester.
//
// Classifies a cubic grid of leaf cells as safe (empty) or unsafe (overlaps
// something) with as few box-overlap queries as possible. The volume is
// tested as a whole first; only nodes that overlap are split into their 8
// octants, down to `depth` levels. A node that does not overlap anything
// leaves its whole leaf range marked safe without further queries.
//
// With `depth = d` there are `2^(d-1)` leaves per axis, each of half-size
// `cell_size`, so the volume has half-size `2^(d-1) * cell_size`.
//
// Octants are tested in parallel with rayon when `parallel` is set. Each
// branch returns the leaves it classified; the parent merges them after all
// 8 children finish, so no two tasks write the same slot.
//
// See also: `sampler.rs` (`OccupancyOverlap` adapts any sampler into an
// overlap query).

use crate::debug_draw::{Color, DebugDraw};
use crate::sampler::OccupancySampler;
use crate::types::{GridDims, Vec3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Deepest supported tree (leaves per axis = 2^(MAX_DEPTH - 1)).
pub const MAX_DEPTH: u32 = 10;

/// Does anything occupy the box at `center` with half-size `extent`?
pub trait BoxOverlapQuery: Sync {
    fn overlaps(&self, center: Vec3, extent: Vec3) -> bool;
}

/// Any occupancy sampler as an overlap query: a box overlaps when the
/// sampler reports occupancy above `threshold` for it.
pub struct OccupancyOverlap<'a> {
    pub sampler: &'a dyn OccupancySampler,
    pub threshold: f32,
}

impl BoxOverlapQuery for OccupancyOverlap<'_> {
    fn overlaps(&self, center: Vec3, extent: Vec3) -> bool {
        let half = extent.x.max(extent.y).max(extent.z);
        self.sampler.occupancy(center, half) > self.threshold
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TesterCell {
    pub location: Vec3,
    pub is_safe: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TesterResult {
    pub dims: GridDims,
    pub cells: Vec<TesterCell>,
    /// Overlap queries issued.
    pub tests_done: usize,
}

impl TesterResult {
    pub fn cell(&self, x: usize, y: usize, z: usize) -> Option<&TesterCell> {
        if x >= self.dims.x || y >= self.dims.y || z >= self.dims.z {
            return None;
        }
        self.cells.get(self.dims.index(x, y, z))
    }

    pub fn safe_cells(&self) -> impl Iterator<Item = &TesterCell> {
        self.cells.iter().filter(|c| c.is_safe)
    }

    pub fn unsafe_count(&self) -> usize {
        self.cells.iter().filter(|c| !c.is_safe).count()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct OctreeTester {
    pub center: Vec3,
    /// Leaf half-size.
    pub cell_size: f32,
    pub depth: u32,
    pub parallel: bool,
}

/// One node of the recursion: leaf-coordinate origin and span.
#[derive(Clone, Copy)]
struct NodeRange {
    center: Vec3,
    extent: f32,
    origin: [usize; 3],
    span: usize,
}

impl OctreeTester {
    pub fn new(center: Vec3, cell_size: f32, depth: u32) -> Self {
        Self {
            center,
            cell_size,
            depth: depth.clamp(1, MAX_DEPTH),
            parallel: true,
        }
    }

    pub fn leaves_per_axis(&self) -> usize {
        1 << (self.depth - 1)
    }

    /// Half-size of the whole tested volume.
    pub fn volume_extent(&self) -> f32 {
        self.leaves_per_axis() as f32 * self.cell_size
    }

    /// Queries issued if every node overlaps: 1 + 8 + 64 + ...
    pub fn worst_case_tests(&self) -> usize {
        (0..self.depth).map(|level| 1usize << (3 * level)).sum()
    }

    pub fn leaf_location(&self, x: usize, y: usize, z: usize) -> Vec3 {
        let min = self.center - Vec3::splat(self.volume_extent());
        let step = self.cell_size * 2.0;
        min + Vec3::new(x as f32 + 0.5, y as f32 + 0.5, z as f32 + 0.5) * step
    }

    pub fn run(&self, query: &dyn BoxOverlapQuery) -> TesterResult {
        let n = self.leaves_per_axis();
        let dims = GridDims::new(n, n, n);
        let mut cells = Vec::with_capacity(dims.count());
        for z in 0..n {
            for y in 0..n {
                for x in 0..n {
                    cells.push(TesterCell {
                        location: self.leaf_location(x, y, z),
                        is_safe: true,
                    });
                }
            }
        }

        let root = NodeRange {
            center: self.center,
            extent: self.volume_extent(),
            origin: [0, 0, 0],
            span: n,
        };
        let (unsafe_leaves, tests_done) = self.test_node(query, root);
        for [x, y, z] in unsafe_leaves {
            cells[dims.index(x, y, z)].is_safe = false;
        }

        let result = TesterResult {
            dims,
            cells,
            tests_done,
        };
        log::debug!(
            "octree test: {} of {} leaves unsafe, {tests_done} of {} queries",
            result.unsafe_count(),
            dims.count(),
            self.worst_case_tests()
        );
        result
    }

    /// Returns the unsafe leaves under `node` and the number of queries made.
    fn test_node(
        &self,
        query: &dyn BoxOverlapQuery,
        node: NodeRange,
    ) -> (Vec<[usize; 3]>, usize) {
        let overlap = query.overlaps(node.center, Vec3::splat(node.extent));
        if !overlap {
            return (Vec::new(), 1);
        }
        if node.span == 1 {
            return (vec![node.origin], 1);
        }

        let half = node.extent * 0.5;
        let child_span = node.span / 2;
        let child = |octant: usize| {
            let bit = |b: usize| (octant >> b) & 1;
            let sign = |b: usize| if bit(b) == 1 { 1.0 } else { -1.0 };
            NodeRange {
                center: node.center + Vec3::new(sign(0), sign(1), sign(2)) * half,
                extent: half,
                origin: [
                    node.origin[0] + bit(0) * child_span,
                    node.origin[1] + bit(1) * child_span,
                    node.origin[2] + bit(2) * child_span,
                ],
                span: child_span,
            }
        };

        let results: Vec<(Vec<[usize; 3]>, usize)> = if self.parallel {
            (0..8usize)
                .into_par_iter()
                .map(|octant| self.test_node(query, child(octant)))
                .collect()
        } else {
            (0..8usize)
                .map(|octant| self.test_node(query, child(octant)))
                .collect()
        };

        let mut leaves = Vec::new();
        let mut tests = 1;
        for (mut l, t) in results {
            leaves.append(&mut l);
            tests += t;
        }
        (leaves, tests)
    }

    /// Draw the volume bounds and each leaf (green safe, red unsafe).
    pub fn draw(&self, result: &TesterResult, unsafe_only: bool, sink: &mut dyn DebugDraw) {
        sink.draw_box(self.center, Vec3::splat(self.volume_extent()), Color::RED, 0.0);
        for cell in &result.cells {
            if cell.is_safe && unsafe_only {
                continue;
            }
            let color = if cell.is_safe { Color::GREEN } else { Color::RED };
            sink.draw_box(cell.location, Vec3::splat(self.cell_size), color, 0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug_draw::RecordingDebugDraw;
    use crate::sampler::{BoxSampler, SphereSampler};
    use crate::types::Aabb;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Nothing;

    impl BoxOverlapQuery for Nothing {
        fn overlaps(&self, _: Vec3, _: Vec3) -> bool {
            false
        }
    }

    struct Everything(AtomicUsize);

    impl BoxOverlapQuery for Everything {
        fn overlaps(&self, _: Vec3, _: Vec3) -> bool {
            self.0.fetch_add(1, Ordering::Relaxed);
            true
        }
    }

    #[test]
    fn geometry() {
        let t = OctreeTester::new(Vec3::ZERO, 10.0, 3);
        assert_eq!(t.leaves_per_axis(), 4);
        assert_eq!(t.volume_extent(), 40.0);
        assert_eq!(t.worst_case_tests(), 1 + 8 + 64);
        assert_eq!(t.leaf_location(0, 0, 0), Vec3::splat(-30.0));
        assert_eq!(t.leaf_location(3, 0, 1), Vec3::new(30.0, -30.0, -10.0));
        assert_eq!(OctreeTester::new(Vec3::ZERO, 1.0, 0).depth, 1);
    }

    #[test]
    fn empty_volume_needs_one_query() {
        let t = OctreeTester::new(Vec3::ZERO, 10.0, 4);
        let r = t.run(&Nothing);
        assert_eq!(r.tests_done, 1);
        assert_eq!(r.cells.len(), 512);
        assert!(r.cells.iter().all(|c| c.is_safe));
    }

    #[test]
    fn full_volume_hits_worst_case() {
        let t = OctreeTester::new(Vec3::ZERO, 10.0, 3);
        let q = Everything(AtomicUsize::new(0));
        let r = t.run(&q);
        assert_eq!(r.tests_done, t.worst_case_tests());
        assert_eq!(q.0.load(Ordering::Relaxed), t.worst_case_tests());
        assert_eq!(r.unsafe_count(), 64);
    }

    #[test]
    fn small_obstacle_marks_only_its_leaf() {
        let mut t = OctreeTester::new(Vec3::ZERO, 10.0, 3);
        t.parallel = false;
        // Strictly inside leaf (3, 3, 3), which spans [20, 40] on every axis.
        let obstacle = BoxSampler::new(Aabb::new(Vec3::splat(25.0), Vec3::splat(35.0)));
        let q = OccupancyOverlap {
            sampler: &obstacle,
            threshold: 0.5,
        };
        let r = t.run(&q);
        assert_eq!(r.unsafe_count(), 1);
        assert!(!r.cell(3, 3, 3).unwrap().is_safe);
        // Root, 8 octants, then the 8 children of the one overlapping octant.
        assert_eq!(r.tests_done, 17);
        assert!(r.cell(4, 0, 0).is_none());
    }

    #[test]
    fn parallel_matches_sequential() {
        let ball = SphereSampler::new(Vec3::new(5.0, -12.0, 3.0), 22.0);
        let q = OccupancyOverlap {
            sampler: &ball,
            threshold: 0.5,
        };
        let mut t = OctreeTester::new(Vec3::ZERO, 5.0, 4);
        let a = t.run(&q);
        t.parallel = false;
        let b = t.run(&q);
        assert_eq!(a, b);
        assert!(a.unsafe_count() > 0);
        assert!(a.safe_cells().count() > 0);
    }

    #[test]
    fn draw_skips_safe_cells_on_request() {
        let t = OctreeTester::new(Vec3::ZERO, 10.0, 2);
        let obstacle = BoxSampler::new(Aabb::new(Vec3::splat(5.0), Vec3::splat(15.0)));
        let q = OccupancyOverlap {
            sampler: &obstacle,
            threshold: 0.5,
        };
        let r = t.run(&q);
        let mut sink = RecordingDebugDraw::default();
        t.draw(&r, true, &mut sink);
        assert_eq!(sink.boxes(), 2);
        let mut sink = RecordingDebugDraw::default();
        t.draw(&r, false, &mut sink);
        assert_eq!(sink.boxes(), 9);
    }
}
