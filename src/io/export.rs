//! Write fit results: parameter maps, R², the fitted volume and the JSON summary.

use std::fs::File;
use std::path::{Path, PathBuf};

use log::info;

use crate::domain::{OutputPaths, RunSummary};
use crate::error::AppError;
use crate::fit::VolumeFit;
use crate::io::image::{write_scalar_volume, write_vector_volume};

/// Write every requested output the fitted model produces.
///
/// Paths for maps the model does not produce are ignored. Returns the paths
/// that were written, in write order.
pub fn write_outputs(fit: &VolumeFit, outputs: &OutputPaths) -> Result<Vec<PathBuf>, AppError> {
    let mut written = Vec::new();

    for map in &fit.parameter_maps {
        let Some(path) = outputs.parameter_maps.get(&map.info.key) else {
            continue;
        };
        write_scalar_volume(path, &map.volume)?;
        info!("Wrote {} map to {}", map.info.label, path.display());
        written.push(path.clone());
    }

    if let Some(path) = &outputs.r_squared {
        write_scalar_volume(path, &fit.r_squared)?;
        info!("Wrote R² map to {}", path.display());
        written.push(path.clone());
    }

    if let Some(path) = &outputs.fitted_volume {
        write_vector_volume(path, &fit.fitted)?;
        info!("Wrote fitted volume to {}", path.display());
        written.push(path.clone());
    }

    Ok(written)
}

/// Write the run summary as pretty-printed JSON.
pub fn write_summary_json(path: &Path, summary: &RunSummary) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::io(format!("Failed to create summary JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, summary)
        .map_err(|e| AppError::io(format!("Failed to write summary JSON: {e}")))?;
    Ok(())
}

/// Read a run summary JSON file.
pub fn read_summary_json(path: &Path) -> Result<RunSummary, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::io(format!("Failed to open summary JSON '{}': {e}", path.display())))?;
    serde_json::from_reader(file).map_err(|e| AppError::io(format!("Invalid summary JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitStats, MapKey, MapSummary, ModelKind};
    use crate::fit::{ChannelTable, ModelSpec, SolverOptions, fit_volume};
    use crate::io::image::{read_scalar_volume, read_vector_volume};
    use crate::models::predict;
    use crate::volume::{Geometry, Mask, MetadataStore, VectorVolume};

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("dwfit-export-{}-{name}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn writes_only_maps_the_model_produces() {
        let b = [0.0, 500.0, 1000.0];
        let signal: Vec<f32> = b
            .iter()
            .map(|&b| predict(ModelKind::MonoExponential, b, &[800.0, 0.001]) as f32)
            .collect();
        let volume = VectorVolume::from_data([1, 1, 1], 3, Geometry::default(), MetadataStore::new(), signal).unwrap();
        let channels = ChannelTable::select(&b, &[], &[]).unwrap();
        let spec = ModelSpec::new(ModelKind::MonoExponential, None);
        let fit = fit_volume(&volume, &Mask::all([1, 1, 1]), &channels, &spec, &SolverOptions::default()).unwrap();

        let dir = temp_dir("maps");
        let mut outputs = OutputPaths::default();
        outputs.parameter_maps.insert(MapKey::Adc, dir.join("adc.nii.gz"));
        outputs.parameter_maps.insert(MapKey::Kurtosis, dir.join("kurtosis.nii.gz"));
        outputs.r_squared = Some(dir.join("rsqr.nii"));
        outputs.fitted_volume = Some(dir.join("fitted.nii.gz"));

        let written = write_outputs(&fit, &outputs).unwrap();
        assert_eq!(written.len(), 3);
        assert!(!dir.join("kurtosis.nii.gz").exists());

        let adc = read_scalar_volume(&dir.join("adc.nii.gz")).unwrap();
        assert!((adc.data[0] - 1000.0).abs() < 0.5);
        let fitted = read_vector_volume(&dir.join("fitted.nii.gz")).unwrap();
        assert_eq!(fitted.channels, 3);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn summary_json_reads_back() {
        let dir = temp_dir("summary");
        let path = dir.join("summary.json");
        let summary = RunSummary {
            tool: "dwfit".to_string(),
            generated: "2026-01-01T00:00:00Z".to_string(),
            input: PathBuf::from("dwi.nii.gz"),
            model: ModelKind::Kurtosis,
            initial_parameters: vec![0.0, 1.0, 0.0015],
            b_values: vec![0.0, 1000.0, 2000.0],
            b_values_used: vec![0.0, 1000.0, 2000.0],
            dims: [4, 4, 2],
            stats: FitStats::default(),
            maps: vec![MapSummary {
                key: MapKey::Kurtosis,
                label: "Kurtosis".to_string(),
                mean: 0.9,
                min: 0.5,
                max: 1.2,
            }],
            r_squared_median: Some(0.99),
            outputs: vec![],
        };
        write_summary_json(&path, &summary).unwrap();
        let back = read_summary_json(&path).unwrap();
        let _ = std::fs::remove_dir_all(&dir);
        assert_eq!(back.model, ModelKind::Kurtosis);
        assert_eq!(back.maps, summary.maps);
        assert_eq!(back.r_squared_median, Some(0.99));
    }
}
