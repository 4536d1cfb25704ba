//! Acquisition metadata: b-values recorded in the multi-volume attributes.

use crate::error::AppError;
use crate::volume::{MetadataStore, VectorVolume};

pub const FRAME_TAG_KEY: &str = "MultiVolume.FrameIdentifyingDICOMTagName";
pub const FRAME_LABELS_KEY: &str = "MultiVolume.FrameLabels";
pub const FRAME_COUNT_KEY: &str = "MultiVolume.NumberOfFrames";
pub const FRAME_UNITS_KEY: &str = "MultiVolume.FrameIdentifyingDICOMTagUnits";

/// Substring the frame tag name must contain for the frames to be b-values.
pub const B_VALUE_TAG: &str = "B-value";

/// Extract the per-channel b-values from a metadata store.
pub fn b_values_from_metadata(metadata: &MetadataStore) -> Result<Vec<f64>, AppError> {
    let tag = required(metadata, FRAME_TAG_KEY)?;
    if !tag.contains(B_VALUE_TAG) {
        return Err(AppError::config(format!(
            "Unrecognized frame identifying DICOM tag name {tag}"
        )));
    }

    let labels = required(metadata, FRAME_LABELS_KEY)?;
    let b_values = labels
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| AppError::config(format!("Invalid b-value '{token}' in {FRAME_LABELS_KEY}.")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if b_values.is_empty() {
        return Err(AppError::config(format!("{FRAME_LABELS_KEY} lists no b-values.")));
    }
    Ok(b_values)
}

/// Extract b-values and check them against the volume's channel count.
pub fn b_values_for(volume: &VectorVolume) -> Result<Vec<f64>, AppError> {
    let b_values = b_values_from_metadata(&volume.metadata)?;
    if b_values.len() != volume.channels {
        return Err(AppError::config(format!(
            "{FRAME_LABELS_KEY} lists {} b-values but the volume has {} channels.",
            b_values.len(),
            volume.channels
        )));
    }
    Ok(b_values)
}

/// Metadata describing a b-value series, as written by `synth`.
pub fn b_value_metadata(b_values: &[f64]) -> MetadataStore {
    let labels: Vec<String> = b_values.iter().map(|b| b.to_string()).collect();
    let mut metadata = MetadataStore::new();
    metadata.insert(FRAME_TAG_KEY.to_string(), "SIEMENS.MRI.B-value".to_string());
    metadata.insert(FRAME_UNITS_KEY.to_string(), "s/mm2".to_string());
    metadata.insert(FRAME_LABELS_KEY.to_string(), labels.join(","));
    metadata.insert(FRAME_COUNT_KEY.to_string(), b_values.len().to_string());
    metadata
}

fn required<'a>(metadata: &'a MetadataStore, key: &str) -> Result<&'a str, AppError> {
    metadata
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| AppError::config(format!("Missing attribute '{key}'")))
}
