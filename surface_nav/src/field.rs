// Dense 3D grid of scalar samples.
//
// A `ScalarField` is what the samplers produce and what the marching-cubes
// and surface-graph builders consume: one `ScalarSample` (position + value)
// per lattice point, stored flat in x-fastest order
// (`x + y*SizeX + z*SizeX*SizeY`). Builders can also take a raw
// `&[ScalarSample]` plus `GridDims` when the caller owns the storage.
//
// See also: `sampler.rs` for occupancy sampling, `marching_cubes/mod.rs`
// for the consumer.

use crate::error::NavError;
use crate::types::{GridDims, Vec3};
use serde::{Deserialize, Serialize};

/// Offsets of the 8 cube corners from the cube's minimum lattice point.
/// Bit `i` of a cube case index refers to corner `i`.
pub const CORNER_OFFSETS: [[usize; 3]; 8] = [
    [0, 0, 0],
    [1, 0, 0],
    [1, 1, 0],
    [0, 1, 0],
    [0, 0, 1],
    [1, 0, 1],
    [1, 1, 1],
    [0, 1, 1],
];

/// One lattice sample: where it was taken and the value found there.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScalarSample {
    pub position: Vec3,
    pub value: f32,
}

impl ScalarSample {
    pub const fn new(position: Vec3, value: f32) -> Self {
        Self { position, value }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScalarField {
    pub dims: GridDims,
    pub samples: Vec<ScalarSample>,
}

impl ScalarField {
    pub fn new(dims: GridDims, samples: Vec<ScalarSample>) -> Self {
        Self { dims, samples }
    }

    /// Build a field on a regular lattice: sample `(x, y, z)` sits at
    /// `origin + (x, y, z) * spacing` and takes `value(position)`.
    pub fn from_fn(
        dims: GridDims,
        origin: Vec3,
        spacing: f32,
        mut value: impl FnMut(Vec3) -> f32,
    ) -> Self {
        let mut samples = Vec::with_capacity(dims.count());
        for z in 0..dims.z {
            for y in 0..dims.y {
                for x in 0..dims.x {
                    let position = origin + Vec3::new(x as f32, y as f32, z as f32) * spacing;
                    samples.push(ScalarSample::new(position, value(position)));
                }
            }
        }
        Self { dims, samples }
    }

    /// Build a field from explicit values on a unit lattice at the origin.
    /// `values` is in x-fastest order and must cover every lattice point;
    /// extra values are ignored.
    pub fn from_values(dims: GridDims, values: &[f32]) -> Result<Self, NavError> {
        if values.len() < dims.count() {
            return Err(NavError::InvalidInput {
                dims,
                expected: dims.count(),
                actual: values.len(),
            });
        }
        let mut values = values.iter().copied();
        Ok(Self::from_fn(dims, Vec3::ZERO, 1.0, |_| {
            values.next().unwrap_or_default()
        }))
    }

    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        self.dims.index(x, y, z)
    }

    pub fn get(&self, x: usize, y: usize, z: usize) -> Option<&ScalarSample> {
        if x >= self.dims.x || y >= self.dims.y || z >= self.dims.z {
            return None;
        }
        self.samples.get(self.index(x, y, z))
    }

    pub fn cube_corners(&self, x: usize, y: usize, z: usize) -> Option<[ScalarSample; 8]> {
        cube_corners(&self.samples, self.dims, x, y, z)
    }
}

/// The 8 corner samples of the cube whose minimum corner is `(x, y, z)`.
/// `None` if the cube reaches outside the grid or the slice is too short.
pub fn cube_corners(
    samples: &[ScalarSample],
    dims: GridDims,
    x: usize,
    y: usize,
    z: usize,
) -> Option<[ScalarSample; 8]> {
    if x + 1 >= dims.x || y + 1 >= dims.y || z + 1 >= dims.z {
        return None;
    }
    let mut corners = [ScalarSample::default(); 8];
    for (corner, [dx, dy, dz]) in corners.iter_mut().zip(CORNER_OFFSETS) {
        *corner = *samples.get(dims.index(x + dx, y + dy, z + dz))?;
    }
    Some(corners)
}
