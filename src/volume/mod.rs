//! In-memory voxel grids.
//!
//! - `Geometry`: spacing/origin/direction shared by congruent grids
//! - `ScalarVolume`: one `f32` per voxel (parameter maps, R², masks on disk)
//! - `VectorVolume`: `channels` `f32`s per voxel plus the acquisition metadata store
//! - `Mask`: voxel inclusion flags

pub mod grid;

pub use grid::*;
