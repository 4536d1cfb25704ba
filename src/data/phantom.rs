//! Synthetic diffusion phantom generation.
//!
//! The phantom is a centred ellipsoid filled with the model signal for a fixed
//! parameter vector. Voxels outside the ellipsoid are exactly zero so the fit
//! skips them. Optional Rician noise makes the magnitude signal realistic.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::ModelKind;
use crate::error::AppError;
use crate::io::b_value_metadata;
use crate::models::predict;
use crate::volume::{Dims, Geometry, ScalarVolume, VectorVolume};

#[derive(Debug, Clone)]
pub struct PhantomConfig {
    pub model: ModelKind,
    /// Model parameters in fit units (rates in mm²/s).
    pub params: Vec<f64>,
    pub b_values: Vec<f64>,
    pub dims: Dims,
    /// Standard deviation of each Gaussian component of the Rician noise.
    pub noise_sigma: f64,
    pub seed: u64,
}

#[derive(Debug, Clone)]
pub struct Phantom {
    pub volume: VectorVolume,
    /// 1 inside the ellipsoid, 0 outside.
    pub mask: ScalarVolume,
}

pub fn generate_phantom(config: &PhantomConfig) -> Result<Phantom, AppError> {
    let expected = config.model.param_count();
    if config.params.len() != expected {
        return Err(AppError::config(format!(
            "{} needs {expected} parameters, got {}.",
            config.model,
            config.params.len()
        )));
    }
    if config.params.iter().any(|p| !p.is_finite()) {
        return Err(AppError::config("Phantom parameters must be finite."));
    }
    if config.b_values.is_empty() || config.b_values.iter().any(|b| !b.is_finite()) {
        return Err(AppError::config("Phantom needs at least one finite b-value."));
    }
    if config.dims.contains(&0) {
        return Err(AppError::config("Phantom dimensions must be > 0."));
    }
    if !(config.noise_sigma.is_finite() && config.noise_sigma >= 0.0) {
        return Err(AppError::config("Noise sigma must be finite and >= 0."));
    }

    let clean: Vec<f64> = config
        .b_values
        .iter()
        .map(|&b| predict(config.model, b, &config.params))
        .collect();

    let noise = if config.noise_sigma > 0.0 {
        Some(
            Normal::new(0.0, config.noise_sigma)
                .map_err(|e| AppError::io(format!("Noise distribution error: {e}")))?,
        )
    } else {
        None
    };
    let mut rng = StdRng::seed_from_u64(config.seed);

    let channels = config.b_values.len();
    let geometry = Geometry::default();
    let mut volume = VectorVolume::zeros(config.dims, channels, geometry.clone());
    volume.metadata = b_value_metadata(&config.b_values);
    let mut mask = ScalarVolume::zeros(config.dims, geometry);

    let [nx, ny, nz] = config.dims;
    let mut index = 0;
    for z in 0..nz {
        for y in 0..ny {
            for x in 0..nx {
                if inside_ellipsoid([x, y, z], config.dims) {
                    mask.data[index] = 1.0;
                    for (slot, &s) in volume.voxel_mut(index).iter_mut().zip(&clean) {
                        *slot = match &noise {
                            Some(normal) => rician(s, normal, &mut rng),
                            None => s,
                        } as f32;
                    }
                }
                index += 1;
            }
        }
    }

    Ok(Phantom { volume, mask })
}

/// Voxel centres mapped to [-1, 1] per axis; inside when the squared radius is <= 1.
fn inside_ellipsoid(voxel: [usize; 3], dims: Dims) -> bool {
    let r2: f64 = voxel
        .iter()
        .zip(dims)
        .map(|(&i, n)| {
            let u = 2.0 * (i as f64 + 0.5) / n as f64 - 1.0;
            u * u
        })
        .sum();
    r2 <= 1.0
}

fn rician(signal: f64, normal: &Normal<f64>, rng: &mut StdRng) -> f64 {
    let real = signal + normal.sample(rng);
    let imag = normal.sample(rng);
    (real * real + imag * imag).sqrt()
}
