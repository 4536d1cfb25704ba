//! Reporting utilities: per-map statistics and the run summary.

pub mod format;

pub use format::*;

use std::path::PathBuf;

use chrono::{SecondsFormat, Utc};

use crate::domain::{FitConfig, MapSummary, RunSummary};
use crate::fit::{ChannelTable, ModelSpec, VolumeFit};
use crate::math::{finite_median, finite_summary};

/// Mean/min/max of every output map over the processed voxels.
///
/// Maps with no finite processed value are left out.
pub fn summarize_maps(fit: &VolumeFit) -> Vec<MapSummary> {
    fit.parameter_maps
        .iter()
        .filter_map(|map| {
            let values = processed_values(fit, &map.volume.data);
            finite_summary(values).map(|(mean, min, max)| MapSummary {
                key: map.info.key,
                label: map.info.label.to_string(),
                mean,
                min,
                max,
            })
        })
        .collect()
}

/// Median R² over processed voxels with a defined R².
pub fn r_squared_median(fit: &VolumeFit) -> Option<f64> {
    finite_median(processed_values(fit, &fit.r_squared.data))
}

/// Assemble the serialisable run summary.
pub fn build_run_summary(
    config: &FitConfig,
    spec: &ModelSpec,
    channels: &ChannelTable,
    fit: &VolumeFit,
    outputs: Vec<PathBuf>,
) -> RunSummary {
    RunSummary {
        tool: "dwfit".to_string(),
        generated: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        input: config.input.clone(),
        model: spec.kind,
        initial_parameters: spec.initial.clone(),
        b_values: channels.b_values().to_vec(),
        b_values_used: channels.selected_b_values().to_vec(),
        dims: fit.r_squared.dims,
        stats: fit.stats.clone(),
        maps: summarize_maps(fit),
        r_squared_median: r_squared_median(fit),
        outputs,
    }
}

fn processed_values<'a>(fit: &'a VolumeFit, data: &'a [f32]) -> impl Iterator<Item = f64> + 'a {
    data.iter()
        .zip(&fit.processed)
        .filter(|(_, processed)| **processed)
        .map(|(&v, _)| v as f64)
}
