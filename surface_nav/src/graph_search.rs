// Generic A* search with partial-solution fallback.
//
// The search is written against two traits rather than a concrete graph:
// `SearchGraph` (how many neighbours a node has, the Nth neighbour, whether
// a node reference is live) and `SearchPolicy` (heuristic, traversal cost,
// per-edge filter, whether a best-effort path is acceptable). Both the flat
// edge graph in `surface_graph.rs` and the cell-partitioned triangle graph
// in `celled.rs` implement `SearchGraph`.
//
// The open set is a `BinaryHeap` used as a min-heap via reversed ordering
// (ties on F go to the entry pushed first). Node bookkeeping lives in an
// `FxHashMap` keyed by node reference. A neighbour's record is only replaced
// when the new F is strictly less than the stored one, so equal-cost
// alternatives keep the earlier parent. A closed node whose F improves is
// reopened.
//
// When the open set runs dry without reaching the goal, the search reports
// the closed node with the smallest heuristic distance to the goal (the
// first one found on ties). With partial solutions enabled the path to that
// node is returned as `SearchStatus::Partial`; otherwise the result is
// `SearchStatus::Failed` carrying that node.
//
// See also: `surface_graph.rs` and `celled.rs` for the graphs, `nav_system.rs`
// for the top-level path query.
//
// **Critical constraint: determinism.** Neighbour order comes from the graph,
// heap ties are broken by push order, and f32 comparisons use `total_cmp`.

use crate::types::Vec3;
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt::Debug;
use std::hash::Hash;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// A graph the search can walk.
pub trait SearchGraph {
    type NodeRef: Copy + Eq + Hash + Debug;

    fn neighbour_count(&self, node: Self::NodeRef) -> usize;

    fn is_valid_ref(&self, node: Self::NodeRef) -> bool;

    /// The `index`th neighbour of `node`, `index < neighbour_count(node)`.
    fn neighbour(&self, node: Self::NodeRef, index: usize) -> Self::NodeRef;
}

/// Graphs whose nodes have a world-space location.
pub trait NodePositions: SearchGraph {
    fn node_position(&self, node: Self::NodeRef) -> Vec3;
}

/// Costs and filtering used by `find_path`.
pub trait SearchPolicy<G: SearchGraph> {
    /// Multiplier applied to every heuristic estimate.
    fn heuristic_scale(&self) -> f32 {
        1.0
    }

    fn heuristic_cost(&self, graph: &G, from: G::NodeRef, to: G::NodeRef) -> f32;

    fn traversal_cost(&self, graph: &G, from: G::NodeRef, to: G::NodeRef) -> f32;

    fn is_traversal_allowed(&self, _graph: &G, _from: G::NodeRef, _to: G::NodeRef) -> bool {
        true
    }

    fn wants_partial_solution(&self) -> bool;
}

/// Straight-line cost and heuristic between node positions. Only edges
/// between two live nodes are traversable.
#[derive(Clone, Copy, Debug)]
pub struct EuclideanPolicy {
    pub allow_partial: bool,
    pub heuristic_scale: f32,
}

impl Default for EuclideanPolicy {
    fn default() -> Self {
        Self {
            allow_partial: true,
            heuristic_scale: 1.0,
        }
    }
}

impl<G: NodePositions> SearchPolicy<G> for EuclideanPolicy {
    fn heuristic_scale(&self) -> f32 {
        self.heuristic_scale
    }

    fn heuristic_cost(&self, graph: &G, from: G::NodeRef, to: G::NodeRef) -> f32 {
        graph.node_position(from).distance(graph.node_position(to))
    }

    fn traversal_cost(&self, graph: &G, from: G::NodeRef, to: G::NodeRef) -> f32 {
        graph.node_position(from).distance(graph.node_position(to))
    }

    fn is_traversal_allowed(&self, graph: &G, from: G::NodeRef, to: G::NodeRef) -> bool {
        graph.is_valid_ref(from) && graph.is_valid_ref(to)
    }

    fn wants_partial_solution(&self) -> bool {
        self.allow_partial
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub enum SearchStatus<N> {
    /// The goal was reached.
    Success,
    /// The goal was unreachable; the path ends at the closest node found.
    Partial,
    /// The goal was unreachable and partial paths were not wanted.
    Failed { closest: N },
    /// Start or goal is not a live node.
    InvalidEndpoints,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SearchResult<N> {
    pub status: SearchStatus<N>,
    /// Nodes from start to the end of the path, inclusive.
    pub path: Vec<N>,
    /// Sum of traversal costs along `path`.
    pub cost: f32,
    pub goal: N,
}

impl<N: PartialEq> SearchResult<N> {
    pub fn is_success(&self) -> bool {
        self.path.last() == Some(&self.goal)
    }

    pub fn is_partial(&self) -> bool {
        !self.path.is_empty() && !self.is_success()
    }
}

/// A search result over a positioned graph, with the world location of
/// every node on the path.
#[derive(Clone, Debug, PartialEq)]
pub struct NavPathResult {
    pub search: SearchResult<u32>,
    pub locations: Vec<Vec3>,
}

impl NavPathResult {
    pub fn is_success(&self) -> bool {
        self.search.is_success()
    }

    pub fn is_partial(&self) -> bool {
        self.search.is_partial()
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Entry in the open set (min-heap via reversed ordering).
struct OpenEntry<N> {
    node: N,
    f_score: f32,
    seq: u64,
}

impl<N> PartialEq for OpenEntry<N> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<N> Eq for OpenEntry<N> {}

impl<N> PartialOrd for OpenEntry<N> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<N> Ord for OpenEntry<N> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap: smallest f_score, then oldest push, is "greatest".
        other
            .f_score
            .total_cmp(&self.f_score)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct NodeRecord<N> {
    parent: Option<N>,
    g: f32,
    h: f32,
    closed: bool,
    /// Sequence number of this node's live heap entry; older entries are stale.
    seq: u64,
}

impl<N> NodeRecord<N> {
    fn f(&self) -> f32 {
        self.g + self.h
    }
}

/// A* from `start` to `goal`.
pub fn find_path<G, P>(
    graph: &G,
    policy: &P,
    start: G::NodeRef,
    goal: G::NodeRef,
) -> SearchResult<G::NodeRef>
where
    G: SearchGraph,
    P: SearchPolicy<G>,
{
    if !graph.is_valid_ref(start) || !graph.is_valid_ref(goal) {
        return SearchResult {
            status: SearchStatus::InvalidEndpoints,
            path: Vec::new(),
            cost: 0.0,
            goal,
        };
    }

    let scale = policy.heuristic_scale();
    let mut nodes: FxHashMap<G::NodeRef, NodeRecord<G::NodeRef>> = FxHashMap::default();
    let mut open = BinaryHeap::new();
    let mut seq = 0u64;

    let start_h = policy.heuristic_cost(graph, start, goal) * scale;
    nodes.insert(
        start,
        NodeRecord {
            parent: None,
            g: 0.0,
            h: start_h,
            closed: false,
            seq,
        },
    );
    open.push(OpenEntry {
        node: start,
        f_score: start_h,
        seq,
    });

    let mut best = start;
    let mut best_h = f32::INFINITY;

    while let Some(entry) = open.pop() {
        let current = entry.node;
        let current_g = match nodes.get_mut(&current) {
            Some(rec) if !rec.closed && rec.seq == entry.seq => {
                rec.closed = true;
                if rec.h < best_h {
                    best_h = rec.h;
                    best = current;
                }
                rec.g
            }
            _ => continue,
        };

        if current == goal {
            return SearchResult {
                status: SearchStatus::Success,
                path: reconstruct_path(&nodes, goal),
                cost: current_g,
                goal,
            };
        }

        for i in 0..graph.neighbour_count(current) {
            let neighbour = graph.neighbour(current, i);
            if !graph.is_valid_ref(neighbour)
                || !policy.is_traversal_allowed(graph, current, neighbour)
            {
                continue;
            }
            let tentative_g = current_g + policy.traversal_cost(graph, current, neighbour);

            match nodes.get_mut(&neighbour) {
                Some(rec) => {
                    // Strictly better F only; ties keep the earlier parent.
                    if tentative_g + rec.h < rec.f() {
                        seq += 1;
                        rec.parent = Some(current);
                        rec.g = tentative_g;
                        rec.closed = false;
                        rec.seq = seq;
                        open.push(OpenEntry {
                            node: neighbour,
                            f_score: rec.f(),
                            seq,
                        });
                    }
                }
                None => {
                    seq += 1;
                    let h = policy.heuristic_cost(graph, neighbour, goal) * scale;
                    nodes.insert(
                        neighbour,
                        NodeRecord {
                            parent: Some(current),
                            g: tentative_g,
                            h,
                            closed: false,
                            seq,
                        },
                    );
                    open.push(OpenEntry {
                        node: neighbour,
                        f_score: tentative_g + h,
                        seq,
                    });
                }
            }
        }
    }

    let best_g = nodes.get(&best).map_or(0.0, |rec| rec.g);
    if policy.wants_partial_solution() {
        log::debug!("goal {goal:?} unreachable, partial path to {best:?}");
        SearchResult {
            status: SearchStatus::Partial,
            path: reconstruct_path(&nodes, best),
            cost: best_g,
            goal,
        }
    } else {
        log::debug!("goal {goal:?} unreachable from {start:?}");
        SearchResult {
            status: SearchStatus::Failed { closest: best },
            path: Vec::new(),
            cost: 0.0,
            goal,
        }
    }
}

/// Walk parent links back from `end` and return the path start-first.
fn reconstruct_path<N: Copy + Eq + Hash>(nodes: &FxHashMap<N, NodeRecord<N>>, end: N) -> Vec<N> {
    let mut path = vec![end];
    let mut current = end;
    while let Some(parent) = nodes.get(&current).and_then(|rec| rec.parent) {
        // Parent links form a tree, so a path can never be longer than the node count.
        if path.len() > nodes.len() {
            break;
        }
        path.push(parent);
        current = parent;
    }
    path.reverse();
    path
}
