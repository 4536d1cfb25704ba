//! Synthetic data sources.
//!
//! - `phantom`: ellipsoid phantom with model signal and optional Rician noise

pub mod phantom;

pub use phantom::*;
