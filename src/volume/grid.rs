//! Grid containers.
//!
//! All grids are stored in raster order (x fastest, then y, then z). Vector
//! volumes keep the channels of one voxel contiguous, so voxel `i` occupies
//! `data[i * channels..(i + 1) * channels]`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Grid extent `[nx, ny, nz]`.
pub type Dims = [usize; 3];

/// Opaque key/value metadata carried by a volume file.
pub type MetadataStore = BTreeMap<String, String>;

/// Physical placement of a grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub spacing: [f64; 3],
    pub origin: [f64; 3],
    /// Unit direction of each grid axis (`direction[axis]`).
    pub direction: [[f64; 3]; 3],
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            spacing: [1.0; 3],
            origin: [0.0; 3],
            direction: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        }
    }
}

fn voxel_count(dims: Dims) -> usize {
    dims.iter().product()
}

/// Single-component grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarVolume {
    pub dims: Dims,
    pub geometry: Geometry,
    pub data: Vec<f32>,
}

impl ScalarVolume {
    pub fn zeros(dims: Dims, geometry: Geometry) -> Self {
        Self {
            dims,
            geometry,
            data: vec![0.0; voxel_count(dims)],
        }
    }

    pub fn from_data(dims: Dims, geometry: Geometry, data: Vec<f32>) -> Result<Self, AppError> {
        if data.len() != voxel_count(dims) {
            return Err(AppError::io(format!(
                "Scalar grid {dims:?} needs {} samples, got {}.",
                voxel_count(dims),
                data.len()
            )));
        }
        Ok(Self { dims, geometry, data })
    }

    pub fn voxel_count(&self) -> usize {
        self.data.len()
    }
}

/// Multi-channel grid with its metadata store.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorVolume {
    pub dims: Dims,
    pub channels: usize,
    pub geometry: Geometry,
    pub metadata: MetadataStore,
    pub data: Vec<f32>,
}

impl VectorVolume {
    pub fn zeros(dims: Dims, channels: usize, geometry: Geometry) -> Self {
        Self {
            dims,
            channels,
            geometry,
            metadata: MetadataStore::new(),
            data: vec![0.0; voxel_count(dims) * channels],
        }
    }

    pub fn from_data(
        dims: Dims,
        channels: usize,
        geometry: Geometry,
        metadata: MetadataStore,
        data: Vec<f32>,
    ) -> Result<Self, AppError> {
        if channels == 0 {
            return Err(AppError::config("Vector volume has no channels."));
        }
        let expected = voxel_count(dims) * channels;
        if data.len() != expected {
            return Err(AppError::io(format!(
                "Vector grid {dims:?}x{channels} needs {expected} samples, got {}.",
                data.len()
            )));
        }
        Ok(Self {
            dims,
            channels,
            geometry,
            metadata,
            data,
        })
    }

    pub fn voxel_count(&self) -> usize {
        voxel_count(self.dims)
    }

    /// Channel intensities of voxel `index` (raster order).
    pub fn voxel(&self, index: usize) -> &[f32] {
        &self.data[index * self.channels..(index + 1) * self.channels]
    }

    pub fn voxel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.data[index * self.channels..(index + 1) * self.channels]
    }
}

/// Voxel inclusion flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    pub dims: Dims,
    pub data: Vec<bool>,
}

impl Mask {
    /// Mask that includes every voxel.
    pub fn all(dims: Dims) -> Self {
        Self {
            dims,
            data: vec![true; voxel_count(dims)],
        }
    }

    /// Nonzero samples are included.
    pub fn from_scalar(volume: &ScalarVolume) -> Self {
        Self {
            dims: volume.dims,
            data: volume.data.iter().map(|&v| v != 0.0).collect(),
        }
    }

    pub fn included(&self) -> usize {
        self.data.iter().filter(|&&m| m).count()
    }

    /// Require the mask to cover exactly the grid `dims`.
    pub fn ensure_congruent(&self, dims: Dims) -> Result<(), AppError> {
        if self.dims != dims {
            return Err(AppError::config(format!(
                "Mask dimensions {:?} do not match the volume dimensions {dims:?}.",
                self.dims
            )));
        }
        Ok(())
    }
}

/// Raster index of `(x, y, z)`.
pub fn raster_index(dims: Dims, x: usize, y: usize, z: usize) -> usize {
    x + dims[0] * (y + dims[1] * z)
}
