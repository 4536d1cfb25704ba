//! Input/output helpers.
//!
//! - NIfTI volume read/write with a JSON metadata sidecar (`image`)
//! - b-values from the multi-volume metadata (`acquisition`)
//! - result exports (maps, fitted volume, JSON summary) (`export`)

pub mod acquisition;
pub mod export;
pub mod image;

pub use acquisition::*;
pub use export::*;
pub use image::*;
