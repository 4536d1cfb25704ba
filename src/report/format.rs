//! Formatted terminal output.
//!
//! Formatting lives here so the fitting code stays free of presentation
//! details.

use std::path::Path;

use crate::domain::RunSummary;
use crate::volume::VectorVolume;

/// Format the end-of-run summary printed after `fit`.
pub fn format_run_summary(summary: &RunSummary) -> String {
    let mut out = String::new();
    let stats = &summary.stats;

    out.push_str("=== dwfit - Diffusion Decay Model Fit ===\n");
    out.push_str(&format!("Input: {}\n", summary.input.display()));
    out.push_str(&format!(
        "Grid: {} x {} x {} | channels={}\n",
        summary.dims[0],
        summary.dims[1],
        summary.dims[2],
        summary.b_values.len()
    ));
    out.push_str(&format!("Model: {}\n", summary.model));
    out.push_str(&format!("Initial: {}\n", fmt_vec(&summary.initial_parameters)));
    out.push_str(&format!("b-values used: {}\n", fmt_vec(&summary.b_values_used)));
    out.push_str(&format!(
        "Voxels: total={} processed={} skipped={} not-converged={} zero-variance={}\n",
        stats.voxels_total,
        stats.voxels_processed,
        stats.voxels_skipped,
        stats.voxels_not_converged,
        stats.voxels_zero_variance
    ));

    if !summary.maps.is_empty() {
        out.push_str("\nMaps (processed voxels):\n");
        for map in &summary.maps {
            out.push_str(&format!(
                "  {:<24} mean={:<12.4} min={:<12.4} max={:.4}\n",
                map.label, map.mean, map.min, map.max
            ));
        }
    }
    match summary.r_squared_median {
        Some(median) => out.push_str(&format!("Median R²: {median:.4}\n")),
        None => out.push_str("Median R²: n/a\n"),
    }

    if !summary.outputs.is_empty() {
        out.push_str("\nWritten:\n");
        for path in &summary.outputs {
            out.push_str(&format!("  {}\n", path.display()));
        }
    }

    out
}

/// Format the header report printed by `inspect`.
pub fn format_volume_info(path: &Path, volume: &VectorVolume, b_values: Option<&[f64]>) -> String {
    let mut out = String::new();
    let g = &volume.geometry;

    out.push_str(&format!("File: {}\n", path.display()));
    out.push_str(&format!(
        "Grid: {} x {} x {} | channels={}\n",
        volume.dims[0], volume.dims[1], volume.dims[2], volume.channels
    ));
    out.push_str(&format!("Spacing: {}\n", fmt_vec(&g.spacing)));
    out.push_str(&format!("Origin: {}\n", fmt_vec(&g.origin)));
    match b_values {
        Some(b) => out.push_str(&format!("b-values: {}\n", fmt_vec(b))),
        None => out.push_str("b-values: (not available)\n"),
    }

    if !volume.metadata.is_empty() {
        out.push_str("\nMetadata:\n");
        for (key, value) in &volume.metadata {
            out.push_str(&format!("  {key} = {value}\n"));
        }
    }

    out
}

fn fmt_vec(values: &[f64]) -> String {
    let parts: Vec<String> = values.iter().map(|v| format!("{v}")).collect();
    format!("[{}]", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitStats, MapKey, MapSummary, ModelKind};
    use crate::io::b_value_metadata;
    use crate::volume::Geometry;
    use std::path::PathBuf;

    #[test]
    fn run_summary_lists_model_and_maps() {
        let summary = RunSummary {
            tool: "dwfit".to_string(),
            generated: String::new(),
            input: PathBuf::from("dwi.nii.gz"),
            model: ModelKind::BiExponential,
            initial_parameters: vec![0.0, 0.7, 0.00025, 0.002],
            b_values: vec![0.0, 100.0, 1000.0],
            b_values_used: vec![100.0, 1000.0],
            dims: [2, 3, 4],
            stats: FitStats {
                voxels_total: 24,
                voxels_processed: 20,
                voxels_skipped: 4,
                ..FitStats::default()
            },
            maps: vec![MapSummary {
                key: MapKey::FastFraction,
                label: "Fast diffusion fraction".to_string(),
                mean: 0.2,
                min: 0.1,
                max: 0.3,
            }],
            r_squared_median: None,
            outputs: vec![PathBuf::from("ff.nii.gz")],
        };
        let text = format_run_summary(&summary);
        assert!(text.contains("Model: BiExponential"));
        assert!(text.contains("b-values used: [100, 1000]"));
        assert!(text.contains("processed=20 skipped=4"));
        assert!(text.contains("Fast diffusion fraction"));
        assert!(text.contains("Median R²: n/a"));
        assert!(text.contains("ff.nii.gz"));
    }

    #[test]
    fn volume_info_shows_b_values() {
        let volume = VectorVolume::from_data(
            [1, 1, 1],
            2,
            Geometry::default(),
            b_value_metadata(&[0.0, 800.0]),
            vec![1.0, 0.5],
        )
        .unwrap();
        let text = format_volume_info(Path::new("x.nii.gz"), &volume, Some(&[0.0, 800.0]));
        assert!(text.contains("channels=2"));
        assert!(text.contains("b-values: [0, 800]"));
        assert!(text.contains("MultiVolume.FrameLabels = 0,800"));
    }
}
