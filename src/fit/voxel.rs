//! Voxel processing loop.
//!
//! For each voxel in raster order:
//! 1. skip it (outputs stay zero) unless the mask is set and the first channel is nonzero
//! 2. gather the selected intensities and seed the initial vector
//! 3. solve
//! 4. evaluate the fitted signal at *every* acquired b-value
//! 5. store the scaled parameters (and derived quantities)
//! 6. store R²
//!
//! Voxels are independent, so the solves run on the rayon pool; each worker
//! owns its scratch buffers. Results are written into the output grids after
//! the parallel pass, in raster order.

use rayon::prelude::*;

use crate::domain::{FitStats, MapKey, ModelKind};
use crate::error::AppError;
use crate::fit::channels::ChannelTable;
use crate::fit::cost::DecayCost;
use crate::fit::optimizer::{SolverOptions, solve};
use crate::fit::quality::{r_squared, total_sum_of_squares};
use crate::models::{ParameterInfo, predict_into, stored_values};
use crate::volume::{Mask, ScalarVolume, VectorVolume};

/// The model to fit and how each voxel's initial vector is formed.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    pub kind: ModelKind,
    /// Initial vector (length = `kind.param_count()`).
    pub initial: Vec<f64>,
    /// Replace `initial[0]` by the voxel's first-channel intensity.
    pub seed_scale_from_signal: bool,
}

impl ModelSpec {
    /// Built-in defaults, optionally overridden by `initial` (ignored on length mismatch).
    pub fn new(kind: ModelKind, initial: Option<&[f64]>) -> Self {
        Self {
            kind,
            initial: kind.initial_parameters(initial),
            seed_scale_from_signal: true,
        }
    }

    /// Initial vector for a voxel whose first channel reads `s0`.
    pub fn seed(&self, s0: f64, out: &mut Vec<f64>) {
        out.clear();
        out.extend_from_slice(&self.initial);
        if self.seed_scale_from_signal {
            out[0] = s0;
        }
    }
}

/// Result for one processed voxel.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelFit {
    /// Raw fitted parameters.
    pub params: Vec<f64>,
    /// Model prediction at every acquired b-value.
    pub fitted: Vec<f64>,
    pub r_squared: f64,
    pub end_error: f64,
    pub converged: bool,
    pub zero_variance: bool,
}

/// Per-worker scratch buffers, reused across voxels.
#[derive(Debug, Default)]
pub struct VoxelWorkspace {
    observed: Vec<f64>,
    initial: Vec<f64>,
}

/// Mask/signal precondition for processing a voxel.
pub fn should_process(included: bool, signal: &[f32]) -> bool {
    included && signal.first().is_some_and(|&s0| s0 != 0.0)
}

/// Fit one voxel.
pub fn fit_voxel(
    signal: &[f32],
    channels: &ChannelTable,
    spec: &ModelSpec,
    options: &SolverOptions,
    workspace: &mut VoxelWorkspace,
) -> VoxelFit {
    channels.gather_selected(signal, &mut workspace.observed);
    spec.seed(f64::from(signal[0]), &mut workspace.initial);

    let cost = DecayCost::new(
        spec.kind,
        channels.selected_b_values(),
        &workspace.observed,
        &workspace.initial,
        options.epsilon,
    );
    let solution = solve(cost, options);

    let mut fitted = vec![0.0; channels.channel_count()];
    predict_into(spec.kind, channels.b_values(), &solution.params, &mut fitted);

    VoxelFit {
        r_squared: r_squared(&workspace.observed, solution.end_error),
        zero_variance: total_sum_of_squares(&workspace.observed).is_none(),
        end_error: solution.end_error,
        converged: solution.converged,
        fitted,
        params: solution.params,
    }
}

/// One output parameter map.
#[derive(Debug, Clone)]
pub struct ParameterMap {
    pub info: ParameterInfo,
    pub volume: ScalarVolume,
}

/// Every output grid of a run.
#[derive(Debug, Clone)]
pub struct VolumeFit {
    pub model: ModelKind,
    pub parameter_maps: Vec<ParameterMap>,
    pub r_squared: ScalarVolume,
    pub fitted: VectorVolume,
    /// Voxels that went through the solver, in raster order.
    pub processed: Vec<bool>,
    pub stats: FitStats,
}

impl VolumeFit {
    pub fn map(&self, key: MapKey) -> Option<&ScalarVolume> {
        self.parameter_maps
            .iter()
            .find(|m| m.info.key == key)
            .map(|m| &m.volume)
    }
}

/// Fit every voxel of `volume`.
pub fn fit_volume(
    volume: &VectorVolume,
    mask: &Mask,
    channels: &ChannelTable,
    spec: &ModelSpec,
    options: &SolverOptions,
) -> Result<VolumeFit, AppError> {
    mask.ensure_congruent(volume.dims)?;
    if channels.channel_count() != volume.channels {
        return Err(AppError::config(format!(
            "Volume has {} channels but {} b-values were provided.",
            volume.channels,
            channels.channel_count()
        )));
    }
    if spec.initial.len() != spec.kind.param_count() {
        return Err(AppError::config(format!(
            "{} expects {} initial values, got {}.",
            spec.kind,
            spec.kind.param_count(),
            spec.initial.len()
        )));
    }

    let n = volume.voxel_count();
    let outcomes: Vec<Option<VoxelFit>> = (0..n)
        .into_par_iter()
        .map_init(VoxelWorkspace::default, |workspace, index| {
            let signal = volume.voxel(index);
            should_process(mask.data[index], signal)
                .then(|| fit_voxel(signal, channels, spec, options, workspace))
        })
        .collect();

    let mut parameter_maps: Vec<ParameterMap> = spec
        .kind
        .output_maps()
        .into_iter()
        .map(|info| ParameterMap {
            info,
            volume: ScalarVolume::zeros(volume.dims, volume.geometry.clone()),
        })
        .collect();
    let mut r_squared_map = ScalarVolume::zeros(volume.dims, volume.geometry.clone());
    let mut fitted = VectorVolume::zeros(volume.dims, volume.channels, volume.geometry.clone());
    fitted.metadata = volume.metadata.clone();

    let mut processed = vec![false; n];
    let mut stats = FitStats {
        voxels_total: n,
        ..FitStats::default()
    };

    for (index, outcome) in outcomes.into_iter().enumerate() {
        let Some(fit) = outcome else {
            stats.voxels_skipped += 1;
            continue;
        };
        processed[index] = true;
        stats.voxels_processed += 1;
        if !fit.converged {
            stats.voxels_not_converged += 1;
        }
        if fit.zero_variance {
            stats.voxels_zero_variance += 1;
        }

        for (map, value) in parameter_maps.iter_mut().zip(stored_values(spec.kind, &fit.params)) {
            map.volume.data[index] = value as f32;
        }
        r_squared_map.data[index] = fit.r_squared as f32;
        for (slot, value) in fitted.voxel_mut(index).iter_mut().zip(&fit.fitted) {
            *slot = *value as f32;
        }
    }

    Ok(VolumeFit {
        model: spec.kind,
        parameter_maps,
        r_squared: r_squared_map,
        fitted,
        processed,
        stats,
    })
}
