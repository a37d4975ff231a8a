// Occupancy sampling: turning "what is solid here?" into a scalar field.
//
// `OccupancySampler` is the only coupling to the host world. It answers one
// question: how occupied is the axis-aligned box of half-size `half_extent`
// centered at `point` (1.0 = solid, 0.0 = empty, anything between for soft
// fields). Everything downstream (meshing, graph building) only ever sees
// the resulting `ScalarField`.
//
// Two ways to lay out samples:
// - `sample_box`: voxel centers inside a bounding box. One-off meshing of a
//   region.
// - `sample_lattice`: points of a global lattice `origin + index * voxel`.
//   Neighbouring cells that share a face plane sample identical points
//   there, so their meshes meet exactly. The navigation system uses this.
//
// Both fan out over z-slabs with rayon when `parallel` is set; each slab
// writes only its own output slots.
//
// See also: `field.rs`, `nav_system.rs`.

use crate::field::{ScalarField, ScalarSample};
use crate::types::{Aabb, CellCoord, GridDims, Vec3};
use rayon::prelude::*;
use std::fmt;

pub trait OccupancySampler: Send + Sync {
    fn occupancy(&self, point: Vec3, half_extent: f32) -> f32;
}

impl<S: OccupancySampler + ?Sized> OccupancySampler for Box<S> {
    fn occupancy(&self, point: Vec3, half_extent: f32) -> f32 {
        (**self).occupancy(point, half_extent)
    }
}

fn as_occupancy(hit: bool) -> f32 {
    if hit { 1.0 } else { 0.0 }
}

// ---------------------------------------------------------------------------
// Analytic samplers
// ---------------------------------------------------------------------------

/// Solid axis-aligned box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoxSampler {
    pub bounds: Aabb,
}

impl BoxSampler {
    pub fn new(bounds: Aabb) -> Self {
        Self { bounds }
    }
}

impl OccupancySampler for BoxSampler {
    fn occupancy(&self, point: Vec3, half_extent: f32) -> f32 {
        let cube = Aabb::from_center_extent(point, Vec3::splat(half_extent));
        as_occupancy(self.bounds.intersects(&cube))
    }
}

/// Solid ball.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SphereSampler {
    pub center: Vec3,
    pub radius: f32,
}

impl SphereSampler {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }
}

impl OccupancySampler for SphereSampler {
    fn occupancy(&self, point: Vec3, half_extent: f32) -> f32 {
        let cube = Aabb::from_center_extent(point, Vec3::splat(half_extent));
        as_occupancy(cube.distance_squared_to(self.center) < self.radius * self.radius)
    }
}

/// Everything on the back side of a plane: solid where `dot(normal, p) < offset`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HalfSpaceSampler {
    pub normal: Vec3,
    pub offset: f32,
}

impl HalfSpaceSampler {
    pub fn new(normal: Vec3, offset: f32) -> Self {
        Self {
            normal: normal.normalize_or_zero(),
            offset,
        }
    }

    /// Solid below `height` on the y axis.
    pub fn floor(height: f32) -> Self {
        Self::new(Vec3::new(0.0, 1.0, 0.0), height)
    }
}

impl OccupancySampler for HalfSpaceSampler {
    fn occupancy(&self, point: Vec3, half_extent: f32) -> f32 {
        let n = self.normal.abs();
        let support = half_extent * (n.x + n.y + n.z);
        as_occupancy(self.normal.dot(point) - support < self.offset)
    }
}

/// Maximum occupancy over a set of samplers.
#[derive(Default)]
pub struct UnionSampler {
    pub parts: Vec<Box<dyn OccupancySampler>>,
}

impl UnionSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, part: impl OccupancySampler + 'static) -> Self {
        self.parts.push(Box::new(part));
        self
    }
}

impl fmt::Debug for UnionSampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnionSampler")
            .field("parts", &self.parts.len())
            .finish()
    }
}

impl OccupancySampler for UnionSampler {
    fn occupancy(&self, point: Vec3, half_extent: f32) -> f32 {
        self.parts
            .iter()
            .map(|p| p.occupancy(point, half_extent))
            .fold(0.0, f32::max)
    }
}

/// Closure-backed sampler.
pub struct FnSampler<F>(pub F);

impl<F> FnSampler<F>
where
    F: Fn(Vec3, f32) -> f32 + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> OccupancySampler for FnSampler<F>
where
    F: Fn(Vec3, f32) -> f32 + Send + Sync,
{
    fn occupancy(&self, point: Vec3, half_extent: f32) -> f32 {
        (self.0)(point, half_extent)
    }
}

// ---------------------------------------------------------------------------
// Sampling
// ---------------------------------------------------------------------------

/// Sample voxel centers inside `bounds`. Each axis gets
/// `floor(size / voxel_size)` samples (at least one), the first at
/// `bounds.min + voxel_size / 2`.
pub fn sample_box(
    sampler: &dyn OccupancySampler,
    bounds: &Aabb,
    voxel_size: f32,
    parallel: bool,
) -> ScalarField {
    let voxel = voxel_size.abs();
    if !voxel.is_normal() {
        log::error!("sample_box: voxel size {voxel_size} is not usable");
        return ScalarField::default();
    }
    let size = bounds.size();
    let axis = |len: f32| ((len / voxel).floor() as usize).max(1);
    let dims = GridDims::new(axis(size.x), axis(size.y), axis(size.z));
    let first = bounds.min + Vec3::splat(voxel * 0.5);

    let field = fill(dims, parallel, |x, y, z| {
        let position = first + Vec3::new(x as f32, y as f32, z as f32) * voxel;
        ScalarSample::new(position, sampler.occupancy(position, voxel * 0.5))
    });
    log::info!(
        "sampled box {} .. {} at voxel {voxel}: dims {dims}, {} points",
        bounds.min,
        bounds.max,
        field.samples.len()
    );
    field
}

/// Sample `dims` points of the global lattice `origin + index * voxel_size`,
/// starting at lattice index `first`.
pub fn sample_lattice(
    sampler: &dyn OccupancySampler,
    origin: Vec3,
    voxel_size: f32,
    first: CellCoord,
    dims: GridDims,
    parallel: bool,
) -> ScalarField {
    let voxel = voxel_size.abs();
    if !voxel.is_normal() {
        log::error!("sample_lattice: voxel size {voxel_size} is not usable");
        return ScalarField::default();
    }
    fill(dims, parallel, |x, y, z| {
        let index = Vec3::new(
            (first.x as i64 + x as i64) as f32,
            (first.y as i64 + y as i64) as f32,
            (first.z as i64 + z as i64) as f32,
        );
        let position = origin + index * voxel;
        ScalarSample::new(position, sampler.occupancy(position, voxel * 0.5))
    })
}

fn fill<F>(dims: GridDims, parallel: bool, sample: F) -> ScalarField
where
    F: Fn(usize, usize, usize) -> ScalarSample + Sync,
{
    let mut samples = vec![ScalarSample::default(); dims.count()];
    let slab_len = dims.x * dims.y;
    if slab_len == 0 {
        return ScalarField::new(dims, samples);
    }
    let fill_slab = |(z, slab): (usize, &mut [ScalarSample])| {
        for y in 0..dims.y {
            for x in 0..dims.x {
                slab[x + y * dims.x] = sample(x, y, z);
            }
        }
    };
    if parallel {
        samples
            .par_chunks_mut(slab_len)
            .enumerate()
            .for_each(fill_slab);
    } else {
        samples.chunks_mut(slab_len).enumerate().for_each(fill_slab);
    }
    ScalarField::new(dims, samples)
}
