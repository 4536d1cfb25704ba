//! NIfTI-1 volume I/O with a JSON metadata sidecar.
//!
//! Voxel data goes through the `nifti` crate. Files ending in `.gz` are gzip
//! compressed on write; gzip input is detected by its magic bytes. A
//! multi-channel volume is a 4-D image whose fourth axis is the channel; in
//! memory the channels of one voxel are contiguous.
//!
//! The volume's key/value metadata store lives next to the image as
//! `<stem>.json` (`dwi.nii.gz` -> `dwi.json`), a flat object of strings.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use ndarray::{Array, IxDyn, ShapeBuilder};
use nifti::volume::ndarray::IntoNdArray;
use nifti::writer::WriterOptions;
use nifti::{InMemNiftiObject, NiftiHeader, NiftiObject};

use crate::error::AppError;
use crate::volume::{Dims, Geometry, MetadataStore, ScalarVolume, VectorVolume, raster_index};

/// Sidecar path holding the metadata store of `image`.
pub fn sidecar_path(image: &Path) -> PathBuf {
    let name = image
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name
        .strip_suffix(".nii.gz")
        .or_else(|| name.strip_suffix(".nii"))
        .map(str::to_string)
        .unwrap_or_else(|| {
            Path::new(&name)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or(name.clone())
        });
    image.with_file_name(format!("{stem}.json"))
}

/// Read a 4-D multi-channel volume (a 3-D image is read as one channel) and its sidecar.
pub fn read_vector_volume(path: &Path) -> Result<VectorVolume, AppError> {
    let (header, array) = read_image(path)?;
    let shape = array.shape().to_vec();
    let (dims, channels) = match shape.as_slice() {
        &[nx, ny, nz] => ([nx, ny, nz], 1),
        &[nx, ny, nz, nc] => ([nx, ny, nz], nc),
        other => {
            return Err(AppError::config(format!(
                "'{}' has dimension {}; expected a 3-D or 4-D volume.",
                path.display(),
                other.len()
            )));
        }
    };

    let mut data = vec![0.0f32; dims.iter().product::<usize>() * channels];
    for (index, &value) in array.indexed_iter() {
        let voxel = raster_index(dims, index[0], index[1], index[2]);
        let channel = if shape.len() == 4 { index[3] } else { 0 };
        data[voxel * channels + channel] = value;
    }

    let metadata = read_metadata(path)?;
    VectorVolume::from_data(dims, channels, geometry_from_header(&header), metadata, data)
}

/// Read a 3-D scalar volume (a 4-D image with one channel is accepted).
pub fn read_scalar_volume(path: &Path) -> Result<ScalarVolume, AppError> {
    let (header, array) = read_image(path)?;
    let dims: Dims = match array.shape() {
        &[nx, ny, nz] | &[nx, ny, nz, 1] => [nx, ny, nz],
        other => {
            return Err(AppError::config(format!(
                "'{}' is not a 3-D scalar volume (shape {other:?}).",
                path.display()
            )));
        }
    };

    let mut data = vec![0.0f32; dims.iter().product()];
    for (index, &value) in array.indexed_iter() {
        data[raster_index(dims, index[0], index[1], index[2])] = value;
    }
    ScalarVolume::from_data(dims, geometry_from_header(&header), data)
}

/// Write a scalar volume as `float32`.
pub fn write_scalar_volume(path: &Path, volume: &ScalarVolume) -> Result<(), AppError> {
    let [nx, ny, nz] = volume.dims;
    // Raster order is x fastest, i.e. Fortran order over (x, y, z).
    let array = Array::from_shape_vec(IxDyn(&[nx, ny, nz]).f(), volume.data.clone())
        .map_err(|e| AppError::io(format!("Volume shape error: {e}")))?;
    write_image(path, &header_for(&volume.geometry), &array)
}

/// Write a vector volume as a 4-D `float32` image plus its metadata sidecar.
pub fn write_vector_volume(path: &Path, volume: &VectorVolume) -> Result<(), AppError> {
    let [nx, ny, nz] = volume.dims;
    let channels = volume.channels;
    let n = volume.voxel_count();
    let mut planar = vec![0.0f32; n * channels];
    for i in 0..n {
        for (c, &value) in volume.voxel(i).iter().enumerate() {
            planar[c * n + i] = value;
        }
    }
    let array = Array::from_shape_vec(IxDyn(&[nx, ny, nz, channels]).f(), planar)
        .map_err(|e| AppError::io(format!("Volume shape error: {e}")))?;
    write_image(path, &header_for(&volume.geometry), &array)?;
    write_metadata(path, &volume.metadata)
}

fn is_gzip(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b
}

fn read_image(path: &Path) -> Result<(NiftiHeader, Array<f32, IxDyn>), AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::io(format!("Failed to open NIfTI '{}': {e}", path.display())))?;
    let mut reader = BufReader::new(file);
    let mut magic = [0u8; 2];
    let read = reader
        .read(&mut magic)
        .map_err(|e| AppError::io(format!("Failed to read NIfTI '{}': {e}", path.display())))?;
    // Compression is sniffed from the content, not the file name.
    let source = (&magic[..read]).chain(reader);
    let object = if is_gzip(&magic[..read]) {
        InMemNiftiObject::from_reader(GzDecoder::new(source))
    } else {
        InMemNiftiObject::from_reader(source)
    }
    .map_err(|e| AppError::io(format!("Failed to read NIfTI '{}': {e}", path.display())))?;
    let header = object.header().clone();
    let array = object
        .into_volume()
        .into_ndarray::<f32>()
        .map_err(|e| AppError::io(format!("Failed to decode NIfTI '{}': {e}", path.display())))?;
    Ok((header, array))
}

fn write_image(path: &Path, header: &NiftiHeader, array: &Array<f32, IxDyn>) -> Result<(), AppError> {
    WriterOptions::new(path)
        .reference_header(header)
        .write_nifti(array)
        .map_err(|e| AppError::io(format!("Failed to write NIfTI '{}': {e}", path.display())))
}

fn read_metadata(image: &Path) -> Result<MetadataStore, AppError> {
    let path = sidecar_path(image);
    if !path.exists() {
        return Ok(MetadataStore::new());
    }
    let file = File::open(&path)
        .map_err(|e| AppError::io(format!("Failed to open metadata '{}': {e}", path.display())))?;
    serde_json::from_reader(file)
        .map_err(|e| AppError::config(format!("Invalid metadata sidecar '{}': {e}", path.display())))
}

fn write_metadata(image: &Path, metadata: &MetadataStore) -> Result<(), AppError> {
    if metadata.is_empty() {
        return Ok(());
    }
    let path = sidecar_path(image);
    let file = File::create(&path)
        .map_err(|e| AppError::io(format!("Failed to create metadata '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, metadata)
        .map_err(|e| AppError::io(format!("Failed to write metadata '{}': {e}", path.display())))
}

/// Geometry from the sform when present, else from `pixdim` alone.
fn geometry_from_header(header: &NiftiHeader) -> Geometry {
    let mut geometry = Geometry::default();
    if header.sform_code > 0 {
        let rows = [header.srow_x, header.srow_y, header.srow_z];
        for axis in 0..3 {
            let column = [rows[0][axis] as f64, rows[1][axis] as f64, rows[2][axis] as f64];
            let norm = column.iter().map(|v| v * v).sum::<f64>().sqrt();
            if norm > 0.0 {
                geometry.spacing[axis] = norm;
                geometry.direction[axis] = [column[0] / norm, column[1] / norm, column[2] / norm];
            }
        }
        geometry.origin = [rows[0][3] as f64, rows[1][3] as f64, rows[2][3] as f64];
    } else {
        for axis in 0..3 {
            let spacing = (header.pixdim[axis + 1] as f64).abs();
            if spacing > 0.0 {
                geometry.spacing[axis] = spacing;
            }
        }
    }
    geometry
}

fn header_for(geometry: &Geometry) -> NiftiHeader {
    let mut header = NiftiHeader::default();
    header.pixdim[0] = 1.0;
    for axis in 0..3 {
        header.pixdim[axis + 1] = geometry.spacing[axis] as f32;
    }
    header.sform_code = 1;
    let mut rows = [[0.0f32; 4]; 3];
    for (r, row) in rows.iter_mut().enumerate() {
        for axis in 0..3 {
            row[axis] = (geometry.direction[axis][r] * geometry.spacing[axis]) as f32;
        }
        row[3] = geometry.origin[r] as f32;
    }
    header.srow_x = rows[0];
    header.srow_y = rows[1];
    header.srow_z = rows[2];
    header.scl_slope = 1.0;
    header.scl_inter = 0.0;
    header
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("dwfit-image-{}-{name}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sample_vector() -> VectorVolume {
        let geometry = Geometry {
            spacing: [1.5, 2.0, 3.0],
            origin: [-10.0, 4.5, 0.25],
            ..Geometry::default()
        };
        let mut metadata = MetadataStore::new();
        metadata.insert("MultiVolume.FrameLabels".to_string(), "0,500,1000".to_string());
        let data = (0..3 * 2 * 1 * 3).map(|v| v as f32 * 0.5).collect();
        VectorVolume::from_data([3, 2, 1], 3, geometry, metadata, data).unwrap()
    }

    #[test]
    fn sidecar_replaces_nifti_suffixes() {
        assert_eq!(sidecar_path(Path::new("/d/dwi.nii.gz")), PathBuf::from("/d/dwi.json"));
        assert_eq!(sidecar_path(Path::new("/d/dwi.nii")), PathBuf::from("/d/dwi.json"));
        assert_eq!(sidecar_path(Path::new("dwi.img")), PathBuf::from("dwi.json"));
    }

    #[test]
    fn vector_volume_keeps_channels_geometry_and_metadata() {
        let dir = temp_dir("vector");
        let volume = sample_vector();
        let path = dir.join("dwi.nii.gz");
        write_vector_volume(&path, &volume).unwrap();
        assert!(dir.join("dwi.json").exists());

        let back = read_vector_volume(&path).unwrap();
        let _ = std::fs::remove_dir_all(&dir);

        assert_eq!(back.dims, volume.dims);
        assert_eq!(back.channels, 3);
        assert_eq!(back.data, volume.data);
        assert_eq!(back.voxel(1), volume.voxel(1));
        assert_eq!(back.metadata, volume.metadata);
        for axis in 0..3 {
            assert!((back.geometry.spacing[axis] - volume.geometry.spacing[axis]).abs() < 1e-6);
            assert!((back.geometry.origin[axis] - volume.geometry.origin[axis]).abs() < 1e-6);
        }
    }

    #[test]
    fn scalar_volume_is_raster_ordered() {
        let dir = temp_dir("scalar");
        let path = dir.join("map.nii");
        let volume = ScalarVolume::from_data([2, 3, 1], Geometry::default(), vec![0.0, 1.0, 2.0, 3.0, 4.0, -5.5])
            .unwrap();
        write_scalar_volume(&path, &volume).unwrap();
        let back = read_scalar_volume(&path).unwrap();
        assert!(!dir.join("map.json").exists());
        let _ = std::fs::remove_dir_all(&dir);

        assert_eq!(back.dims, [2, 3, 1]);
        assert_eq!(back.data, volume.data);
    }

    #[test]
    fn vector_volume_without_sidecar_has_empty_metadata() {
        let dir = temp_dir("bare");
        let path = dir.join("bare.nii");
        let mut volume = sample_vector();
        volume.metadata.clear();
        write_vector_volume(&path, &volume).unwrap();
        let back = read_vector_volume(&path).unwrap();
        let _ = std::fs::remove_dir_all(&dir);
        assert!(back.metadata.is_empty());
    }

    #[test]
    fn scalar_reader_rejects_multi_channel_images() {
        let dir = temp_dir("reject");
        let path = dir.join("dwi.nii");
        write_vector_volume(&path, &sample_vector()).unwrap();
        let err = read_scalar_volume(&path).unwrap_err();
        let _ = std::fs::remove_dir_all(&dir);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_vector_volume(Path::new("/nonexistent/dwfit/dwi.nii.gz")).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }
}
