//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the decay model enumeration (`ModelKind`) and output map keys (`MapKey`)
//! - the run configuration consumed by the core (`FitConfig`)
//! - per-run statistics and the serialisable run summary (`FitStats`, `RunSummary`)

pub mod types;

pub use types::*;
