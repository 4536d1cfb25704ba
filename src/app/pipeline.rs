//! Shared "fit pipeline" logic.
//!
//! Workflow:
//! validate options -> load volume + mask -> b-values -> channel selection ->
//! parallel fit -> write outputs -> run summary
//!
//! Option checks that need no I/O run first so a bad command line fails fast.

use std::path::Path;

use log::{info, warn};

use crate::domain::{FitConfig, ModelKind, OutputPaths, RunSummary};
use crate::error::AppError;
use crate::fit::{ChannelTable, ModelSpec, SolverOptions, VolumeFit, ensure_exclusive_filters, fit_volume};
use crate::io::{b_values_for, read_scalar_volume, read_vector_volume, write_outputs, write_summary_json};
use crate::report::build_run_summary;
use crate::volume::{Mask, VectorVolume};

/// All computed outputs of a single `dwfit fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub spec: ModelSpec,
    pub channels: ChannelTable,
    pub fit: VolumeFit,
    pub summary: RunSummary,
}

/// Execute the full fitting pipeline and return the computed outputs.
pub fn run_fit(config: &FitConfig) -> Result<RunOutput, AppError> {
    ensure_exclusive_filters(&config.include_b_values, &config.exclude_b_values)?;
    let kind = ModelKind::from_name(&config.model_name)?;
    if let Some(initial) = &config.initial_parameters
        && initial.len() != kind.param_count()
    {
        warn!(
            "{kind} takes {} initial values but {} were given; using built-in defaults.",
            kind.param_count(),
            initial.len()
        );
    }
    let mut spec = ModelSpec::new(kind, config.initial_parameters.as_deref());
    spec.seed_scale_from_signal = config.seed_scale_from_signal;
    info!(
        "Model {kind}, initial parameters {:?}{}",
        spec.initial,
        if spec.seed_scale_from_signal { " (scale seeded per voxel)" } else { "" }
    );
    warn_unused_outputs(kind, &config.outputs);

    let volume = read_vector_volume(&config.input)?;
    info!(
        "Loaded {} ({} x {} x {}, {} channels)",
        config.input.display(),
        volume.dims[0],
        volume.dims[1],
        volume.dims[2],
        volume.channels
    );
    let mask = load_mask(config.mask.as_deref(), &volume)?;

    let b_values = b_values_for(&volume)?;
    let channels = ChannelTable::select(&b_values, &config.include_b_values, &config.exclude_b_values)?;
    info!(
        "Fitting {kind} on {} of {} b-values: {:?}",
        channels.selected_count(),
        channels.channel_count(),
        channels.selected_b_values()
    );
    if channels.selected_count() < kind.param_count() {
        warn!(
            "{kind} has {} parameters but only {} b-values are selected; voxels keep their initial values.",
            kind.param_count(),
            channels.selected_count()
        );
    }

    let options = SolverOptions::default();
    let fit = in_thread_pool(config.threads, || {
        fit_volume(&volume, &mask, &channels, &spec, &options)
    })??;
    let stats = &fit.stats;
    info!(
        "Fitted {} of {} voxels ({} skipped, {} not converged)",
        stats.voxels_processed, stats.voxels_total, stats.voxels_skipped, stats.voxels_not_converged
    );

    let written = write_outputs(&fit, &config.outputs)?;
    let summary = build_run_summary(config, &spec, &channels, &fit, written);
    if let Some(path) = &config.summary {
        write_summary_json(path, &summary)?;
        info!("Wrote run summary to {}", path.display());
    }

    Ok(RunOutput {
        spec,
        channels,
        fit,
        summary,
    })
}

fn load_mask(path: Option<&Path>, volume: &VectorVolume) -> Result<Mask, AppError> {
    let Some(path) = path else {
        return Ok(Mask::all(volume.dims));
    };
    let mask = Mask::from_scalar(&read_scalar_volume(path)?);
    mask.ensure_congruent(volume.dims)?;
    info!("Mask {} includes {} voxels", path.display(), mask.included());
    Ok(mask)
}

fn warn_unused_outputs(kind: ModelKind, outputs: &OutputPaths) {
    let produced: Vec<_> = kind.output_maps().into_iter().map(|info| info.key).collect();
    for (key, path) in &outputs.parameter_maps {
        if !produced.contains(key) {
            warn!(
                "{kind} does not produce a '{}' map; {} will not be written.",
                key.id(),
                path.display()
            );
        }
    }
    if outputs.is_empty() {
        warn!("No output paths given; results are only summarised.");
    }
}

/// Run `op` on a dedicated pool of `threads` workers, or on the global pool when 0.
fn in_thread_pool<T, F>(threads: usize, op: F) -> Result<T, AppError>
where
    T: Send,
    F: FnOnce() -> T + Send,
{
    if threads == 0 {
        return Ok(op());
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| AppError::io(format!("Failed to start {threads} worker threads: {e}")))?;
    Ok(pool.install(op))
}
