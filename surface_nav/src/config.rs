// Data-driven navigation configuration.
//
// All tunable pipeline parameters live in `NavConfig`, loaded from JSON by
// the host application. Fields missing from the JSON take their `Default`
// values, so a config file only needs to list what it overrides.
//
// `NavConfig::validated()` is applied by `SurfaceNavigationSystem` before
// use: it clamps the voxel size and snaps the cell size onto the voxel
// lattice, logging each correction.
//
// See also: `nav_system.rs` which owns the `NavConfig`, `edge_finder.rs` for
// the strategies selected by `edge_finder`.

use crate::error::NavError;
use crate::types::Vec3;
use serde::{Deserialize, Serialize};

/// Which nearest-edge strategy a `SurfaceNavLocalData` uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeFinderKind {
    /// Scan every edge.
    Linear,
    /// Uniform hash grid keyed by snapped cell coordinate.
    #[default]
    Grid,
    /// Point octree.
    Octree,
}

/// Tunable parameters for sampling, meshing, cell management, and search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavConfig {
    /// Isosurface threshold. A sample is "inside" when its value is above this.
    pub surface_level: f32,
    /// Edge length of one sample voxel in world units.
    pub voxel_size: f32,
    /// Smallest accepted voxel size. Smaller values are clamped up.
    pub min_voxel_size: f32,
    /// Edge length of one spatial navigation cell in world units.
    pub cell_size: f32,
    /// World-space center of cell (0, 0, 0).
    pub center: Vec3,
    /// Share vertices between cubes that meet on an edge.
    pub remove_duplicate_vertices: bool,
    /// Classify mesh boundary vertices for cross-cell stitching.
    pub find_boundary_edges: bool,
    /// Distance under which two vertices from different cells are the same point.
    pub stitch_epsilon: f32,
    pub edge_finder: EdgeFinderKind,
    /// Bucket size for `EdgeFinderKind::Grid`.
    pub edge_finder_cell_size: f32,
    /// Leaf capacity for `EdgeFinderKind::Octree`.
    pub octree_max_elements_per_node: usize,
    /// Return a best-effort path when the goal cannot be reached.
    pub allow_partial_paths: bool,
    /// Sample z-slabs on the rayon pool.
    pub parallel_sampling: bool,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            surface_level: 0.5,
            voxel_size: 25.0,
            min_voxel_size: 10.0,
            cell_size: 100.0,
            center: Vec3::ZERO,
            remove_duplicate_vertices: true,
            find_boundary_edges: true,
            stitch_epsilon: 1e-3,
            edge_finder: EdgeFinderKind::Grid,
            edge_finder_cell_size: 50.0,
            octree_max_elements_per_node: 8,
            allow_partial_paths: true,
            parallel_sampling: true,
        }
    }
}

impl NavConfig {
    pub fn from_json(json: &str) -> Result<Self, NavError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, NavError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Copy with the voxel size clamped to `min_voxel_size` and the cell size
    /// rounded to a whole number of voxels (at least one).
    pub fn validated(&self) -> Self {
        let mut cfg = self.clone();

        let min_voxel = cfg.min_voxel_size.abs().max(f32::EPSILON);
        let voxel = cfg.voxel_size.abs().max(min_voxel);
        if voxel != cfg.voxel_size {
            log::warn!(
                "voxel_size {} adjusted to {} (min_voxel_size {})",
                cfg.voxel_size,
                voxel,
                min_voxel
            );
            cfg.voxel_size = voxel;
        }

        let voxels_per_cell = (cfg.cell_size.abs() / voxel).round().max(1.0);
        let cell = voxels_per_cell * voxel;
        if cell != cfg.cell_size {
            log::warn!(
                "cell_size {} is not a multiple of voxel_size {}, using {}",
                cfg.cell_size,
                voxel,
                cell
            );
            cfg.cell_size = cell;
        }

        if cfg.octree_max_elements_per_node == 0 {
            cfg.octree_max_elements_per_node = 1;
        }
        cfg
    }

    /// Number of voxels along one edge of a navigation cell.
    pub fn voxels_per_cell(&self) -> i32 {
        (self.cell_size / self.voxel_size).round().max(1.0) as i32
    }
}
