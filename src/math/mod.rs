//! Mathematical utilities: numerical differentiation and summary statistics.

pub mod finite_diff;
pub mod stats;

pub use finite_diff::*;
pub use stats::*;
