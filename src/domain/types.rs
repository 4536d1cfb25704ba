//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to the JSON run summary
//! - logged without extra formatting glue

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Signal decay model fitted at every voxel.
///
/// The set is closed: every per-model property is a `match` over this enum, so
/// adding a variant is checked for exhaustiveness by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    MonoExponential,
    BiExponential,
    Kurtosis,
    StretchedExponential,
    Gamma,
}

impl ModelKind {
    pub const ALL: [ModelKind; 5] = [
        ModelKind::MonoExponential,
        ModelKind::BiExponential,
        ModelKind::Kurtosis,
        ModelKind::StretchedExponential,
        ModelKind::Gamma,
    ];

    /// Canonical name, as accepted on the command line.
    pub fn name(self) -> &'static str {
        match self {
            ModelKind::MonoExponential => "MonoExponential",
            ModelKind::BiExponential => "BiExponential",
            ModelKind::Kurtosis => "Kurtosis",
            ModelKind::StretchedExponential => "StretchedExponential",
            ModelKind::Gamma => "Gamma",
        }
    }

    /// Resolve a model from its name (case-insensitive).
    pub fn from_name(name: &str) -> Result<Self, AppError> {
        let wanted = name.trim();
        ModelKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let known: Vec<&str> = ModelKind::ALL.iter().map(|k| k.name()).collect();
                AppError::config(format!(
                    "Unknown model type '{name}' (expected one of: {}).",
                    known.join(", ")
                ))
            })
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identifies one output parameter map.
///
/// Each model produces a fixed, ordered subset of these (see `models::parameters`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapKey {
    Scale,
    Adc,
    FastFraction,
    SlowDiffusion,
    FastDiffusion,
    Kurtosis,
    KurtosisDiffusion,
    Ddc,
    Alpha,
    GammaK,
    GammaTheta,
    GammaMode,
}

impl MapKey {
    /// Short identifier used in logs, summaries and CLI flag names.
    pub fn id(self) -> &'static str {
        match self {
            MapKey::Scale => "scale",
            MapKey::Adc => "adc",
            MapKey::FastFraction => "fast-fraction",
            MapKey::SlowDiffusion => "slow-diff",
            MapKey::FastDiffusion => "fast-diff",
            MapKey::Kurtosis => "kurtosis",
            MapKey::KurtosisDiffusion => "kurtosis-diff",
            MapKey::Ddc => "ddc",
            MapKey::Alpha => "alpha",
            MapKey::GammaK => "k",
            MapKey::GammaTheta => "theta",
            MapKey::GammaMode => "mode",
        }
    }
}

/// Where each requested output grid is written.
///
/// Missing entries are simply not persisted; the grids are still computed.
#[derive(Debug, Clone, Default)]
pub struct OutputPaths {
    pub parameter_maps: BTreeMap<MapKey, PathBuf>,
    pub r_squared: Option<PathBuf>,
    pub fitted_volume: Option<PathBuf>,
}

impl OutputPaths {
    pub fn is_empty(&self) -> bool {
        self.parameter_maps.is_empty() && self.r_squared.is_none() && self.fitted_volume.is_none()
    }
}

/// Run configuration consumed by the fitting pipeline.
///
/// Built by the CLI layer; the core never sees clap types.
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub input: PathBuf,
    pub mask: Option<PathBuf>,
    /// Model name, resolved with `ModelKind::from_name`.
    pub model_name: String,
    /// Optional initial parameter vector; ignored unless its length matches the model.
    pub initial_parameters: Option<Vec<f64>>,
    pub include_b_values: Vec<f64>,
    pub exclude_b_values: Vec<f64>,
    pub outputs: OutputPaths,
    /// Worker threads for the voxel loop (0 = rayon default).
    pub threads: usize,
    /// Seed the scale parameter with each voxel's first-channel intensity.
    pub seed_scale_from_signal: bool,
    pub summary: Option<PathBuf>,
}

/// Counters collected during one pass over the volume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitStats {
    pub voxels_total: usize,
    /// Voxels that met the mask/signal preconditions and went through the solver.
    pub voxels_processed: usize,
    pub voxels_skipped: usize,
    /// Processed voxels whose solve did not report convergence.
    pub voxels_not_converged: usize,
    /// Processed voxels whose observed signal had zero variance (R² = NaN).
    pub voxels_zero_variance: usize,
}

/// Summary statistics for one output map over processed voxels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapSummary {
    pub key: MapKey,
    pub label: String,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// JSON run summary (`--summary`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub tool: String,
    pub generated: String,
    pub input: PathBuf,
    pub model: ModelKind,
    pub initial_parameters: Vec<f64>,
    pub b_values: Vec<f64>,
    pub b_values_used: Vec<f64>,
    pub dims: [usize; 3],
    pub stats: FitStats,
    pub maps: Vec<MapSummary>,
    pub r_squared_median: Option<f64>,
    pub outputs: Vec<PathBuf>,
}
