//! Voxel-wise fitting.
//!
//! Responsibilities:
//!
//! - resolve which channels take part in the fit (`channels`)
//! - bind a model to one voxel's observations (`cost`)
//! - run the Levenberg–Marquardt solve (`optimizer`)
//! - compute R² (`quality`)
//! - drive the whole volume in parallel (`voxel`)

pub mod channels;
pub mod cost;
pub mod optimizer;
pub mod quality;
pub mod voxel;

pub use channels::*;
pub use cost::*;
pub use optimizer::*;
pub use quality::*;
pub use voxel::*;
