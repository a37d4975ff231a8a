// Navigation context: volumes in, paths out.
//
// `SurfaceNavigationSystem` is the one object a host application owns. It
// holds the validated `NavConfig`, the occupancy sampler for the world, the
// registered navigation volumes, and the cell-partitioned graph built from
// them. Hosts report volume changes as `VolumeUpdateRequest`s; each request
// rebuilds exactly the cells touched by the volume's old and new bounds.
//
// Rebuilding a cell:
// 1. Sample the cell on the global lattice (`sampler::sample_lattice`), one
//    voxel-spaced point per lattice index from the cell's min face to its max
//    face inclusive, so face-adjacent cells sample identical face points.
// 2. Mesh with marching cubes, classifying boundary vertices.
// 3. Hand the mesh to `CelledSurfaceNavData::update_cell`, which re-stitches
//    the cell to its populated neighbours.
// Cells no longer covered by any volume are cleared instead.
//
// All mutation goes through `&mut self`, so cell updates and the stitching
// they trigger never run concurrently.
//
// See also: `celled.rs`, `sampler.rs`, `marching_cubes/mod.rs`.

use crate::celled::{CellCreationData, CelledSurfaceNavData};
use crate::config::NavConfig;
use crate::debug_draw::{Color, DebugDraw};
use crate::error::NavError;
use crate::graph_search::NavPathResult;
use crate::marching_cubes::MarchingCubesBuilder;
use crate::sampler::{OccupancySampler, sample_lattice};
use crate::types::{Aabb, CellCoord, GridDims, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VolumeId(pub u32);

impl fmt::Display for VolumeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "volume#{}", self.0)
    }
}

/// A change to the set of navigation volumes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum VolumeUpdateRequest {
    Add { id: VolumeId, bounds: Aabb },
    Update { id: VolumeId, bounds: Aabb },
    Remove { id: VolumeId },
}

pub struct SurfaceNavigationSystem {
    config: NavConfig,
    sampler: Box<dyn OccupancySampler>,
    nav: CelledSurfaceNavData,
    volumes: BTreeMap<VolumeId, Aabb>,
    next_volume_id: u32,
}

impl fmt::Debug for SurfaceNavigationSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceNavigationSystem")
            .field("config", &self.config)
            .field("volumes", &self.volumes)
            .field("cells", &self.nav.cell_count())
            .field("nodes", &self.nav.node_count())
            .finish()
    }
}

impl SurfaceNavigationSystem {
    pub fn new(config: &NavConfig, sampler: impl OccupancySampler + 'static) -> Self {
        let config = config.validated();
        Self {
            nav: CelledSurfaceNavData::from_config(&config),
            config,
            sampler: Box::new(sampler),
            volumes: BTreeMap::new(),
            next_volume_id: 0,
        }
    }

    pub fn config(&self) -> &NavConfig {
        &self.config
    }

    pub fn nav_data(&self) -> &CelledSurfaceNavData {
        &self.nav
    }

    pub fn volumes(&self) -> &BTreeMap<VolumeId, Aabb> {
        &self.volumes
    }

    /// Register a new volume and build its cells.
    pub fn add_volume(&mut self, bounds: Aabb) -> VolumeId {
        let id = VolumeId(self.next_volume_id);
        self.apply(VolumeUpdateRequest::Add { id, bounds });
        id
    }

    /// Apply one volume change. Returns the cells that were rebuilt or
    /// cleared, in coordinate order.
    pub fn apply(&mut self, request: VolumeUpdateRequest) -> Vec<CellCoord> {
        let mut affected = BTreeSet::new();
        match request {
            VolumeUpdateRequest::Add { id, bounds } | VolumeUpdateRequest::Update { id, bounds } => {
                self.next_volume_id = self.next_volume_id.max(id.0.saturating_add(1));
                if let Some(old) = self.volumes.insert(id, bounds) {
                    affected.extend(self.nav.cells_containing_box(&old));
                }
                affected.extend(self.nav.cells_containing_box(&bounds));
            }
            VolumeUpdateRequest::Remove { id } => match self.volumes.remove(&id) {
                Some(old) => affected.extend(self.nav.cells_containing_box(&old)),
                None => log::warn!("remove of unknown {id} ignored"),
            },
        }

        for &coord in &affected {
            self.refresh_cell(coord);
        }
        affected.into_iter().collect()
    }

    /// Rebuild every cell covered by a volume from scratch.
    pub fn rebuild_all(&mut self) {
        self.nav.clear_all();
        let cells: BTreeSet<CellCoord> = self
            .volumes
            .values()
            .flat_map(|b| self.nav.cells_containing_box(b))
            .collect();
        for coord in cells {
            self.refresh_cell(coord);
        }
    }

    /// Forget all volumes and navigation data.
    pub fn clear(&mut self) {
        self.volumes.clear();
        self.nav.clear_all();
    }

    fn is_covered(&self, coord: CellCoord) -> bool {
        let bounds = self.nav.cell_bounds(coord);
        self.volumes.values().any(|v| v.intersects(&bounds))
    }

    fn refresh_cell(&mut self, coord: CellCoord) {
        if !self.is_covered(coord) {
            self.nav.clear_cell(coord);
            return;
        }
        match self.build_cell(coord) {
            Ok(data) => self.nav.update_cell(coord, &data),
            Err(e) => {
                log::error!("cell {coord}: build failed: {e}");
                self.nav.clear_cell(coord);
            }
        }
    }

    /// Sample and mesh one cell.
    pub fn build_cell(&self, coord: CellCoord) -> Result<CellCreationData, NavError> {
        let cfg = &self.config;
        let k = cfg.voxels_per_cell();
        let n = k as usize + 1;
        let origin = cfg.center - Vec3::splat(cfg.cell_size * 0.5);
        let first = CellCoord::new(coord.x * k, coord.y * k, coord.z * k);
        let field = sample_lattice(
            self.sampler.as_ref(),
            origin,
            cfg.voxel_size,
            first,
            GridDims::new(n, n, n),
            cfg.parallel_sampling,
        );
        let mesh = MarchingCubesBuilder::from_field(&field, cfg.surface_level)
            .with_remove_duplicate_vertices(cfg.remove_duplicate_vertices)
            .with_find_boundary_edges(cfg.find_boundary_edges)
            .build()?;
        Ok(mesh.into())
    }

    pub fn find_path(&self, from: Vec3, to: Vec3) -> Result<NavPathResult, NavError> {
        let result = self.nav.find_path(from, to, self.config.allow_partial_paths)?;
        log::debug!(
            "path {from} -> {to}: {:?}, {} nodes, cost {}",
            result.search.status,
            result.locations.len(),
            result.search.cost
        );
        Ok(result)
    }

    /// The navigable location nearest `point`, if its cell has any surface.
    pub fn closest_location(&self, point: Vec3) -> Option<Vec3> {
        self.nav.project_point_to_navigation(point)
    }

    pub fn draw(&self, sink: &mut dyn DebugDraw, duration: f32) {
        for bounds in self.volumes.values() {
            sink.draw_box(bounds.center(), bounds.extent(), Color::BLUE, duration);
        }
        self.nav.draw_all(sink, duration);
    }
}
