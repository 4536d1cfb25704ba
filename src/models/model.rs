//! Model evaluation for the five decay shapes.
//!
//! The fitter relies on a handful of primitive operations:
//! - predict `S(b)` given a parameter vector (residuals, fitted signal)
//! - parameter count, built-in initial vector and labels
//! - the per-parameter storage scale used when writing maps
//!
//! Parameter vectors always start with the unattenuated signal (scale).

use crate::domain::{MapKey, ModelKind};

/// Rate/diffusion parameters are stored in micro-units (×1e6).
pub const MICRO: f64 = 1e6;

/// Static description of one output map of a model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterInfo {
    pub key: MapKey,
    pub label: &'static str,
    /// Multiplier applied to the fitted value before it is stored.
    pub storage_scale: f64,
}

const fn info(key: MapKey, label: &'static str, storage_scale: f64) -> ParameterInfo {
    ParameterInfo {
        key,
        label,
        storage_scale,
    }
}

const MONO_PARAMS: [ParameterInfo; 2] = [
    info(MapKey::Scale, "Scale", 1.0),
    info(MapKey::Adc, "ADC", MICRO),
];

const BIEXP_PARAMS: [ParameterInfo; 4] = [
    info(MapKey::Scale, "Scale", 1.0),
    info(MapKey::FastFraction, "Fast diffusion fraction", 1.0),
    info(MapKey::SlowDiffusion, "Slow diffusion coefficient", MICRO),
    info(MapKey::FastDiffusion, "Fast diffusion coefficient", MICRO),
];

const KURTOSIS_PARAMS: [ParameterInfo; 3] = [
    info(MapKey::Scale, "Scale", 1.0),
    info(MapKey::Kurtosis, "Kurtosis", 1.0),
    info(MapKey::KurtosisDiffusion, "Kurtosis diffusion", MICRO),
];

// Bennett et al., MRM 2003;50:727-734.
const STRETCHED_PARAMS: [ParameterInfo; 3] = [
    info(MapKey::Scale, "Scale", 1.0),
    info(MapKey::Ddc, "Distributed Diffusion Coefficient (DDC)", MICRO),
    info(MapKey::Alpha, "Alpha", 1.0),
];

// Oshio et al., MRMS 2014;13:191-195.
const GAMMA_PARAMS: [ParameterInfo; 3] = [
    info(MapKey::Scale, "Scale", 1.0),
    info(MapKey::GammaK, "k parameter of the gamma distribution", 1.0),
    info(MapKey::GammaTheta, "theta parameter of the gamma distribution", MICRO),
];

const GAMMA_MODE: ParameterInfo = info(MapKey::GammaMode, "Mode of the gamma distribution", 1.0);

impl ModelKind {
    /// Number of fitted parameters.
    pub fn param_count(self) -> usize {
        self.parameters().len()
    }

    /// Fitted parameters, in parameter-vector order.
    pub fn parameters(self) -> &'static [ParameterInfo] {
        match self {
            ModelKind::MonoExponential => &MONO_PARAMS,
            ModelKind::BiExponential => &BIEXP_PARAMS,
            ModelKind::Kurtosis => &KURTOSIS_PARAMS,
            ModelKind::StretchedExponential => &STRETCHED_PARAMS,
            ModelKind::Gamma => &GAMMA_PARAMS,
        }
    }

    /// Quantity derived from the fitted parameters and reported as an extra map.
    pub fn derived(self) -> Option<ParameterInfo> {
        match self {
            ModelKind::Gamma => Some(GAMMA_MODE),
            _ => None,
        }
    }

    /// All output maps of this model: fitted parameters, then derived quantities.
    pub fn output_maps(self) -> Vec<ParameterInfo> {
        let mut maps = self.parameters().to_vec();
        maps.extend(self.derived());
        maps
    }

    /// Built-in initial parameter vector.
    ///
    /// The scale entry is a placeholder: the voxel loop seeds it with the
    /// first-channel intensity of each voxel.
    pub fn default_initial(self) -> &'static [f64] {
        match self {
            ModelKind::MonoExponential => &[0.0, 0.0015],
            ModelKind::BiExponential => &[0.0, 0.7, 0.00025, 0.002],
            ModelKind::Kurtosis => &[0.0, 1.0, 0.0015],
            ModelKind::StretchedExponential => &[0.0, 0.0017, 0.7],
            ModelKind::Gamma => &[0.0, 1.5, 0.002],
        }
    }

    /// Resolve the initial vector: an override is used only when its length matches.
    pub fn initial_parameters(self, user: Option<&[f64]>) -> Vec<f64> {
        match user {
            Some(values) if values.len() == self.param_count() => values.to_vec(),
            _ => self.default_initial().to_vec(),
        }
    }
}

/// Predict the signal at b-value `b`.
///
/// # Panics
/// Panics if `params` is shorter than `model.param_count()`.
pub fn predict(model: ModelKind, b: f64, params: &[f64]) -> f64 {
    match model {
        ModelKind::MonoExponential => {
            let (scale, adc) = (params[0], params[1]);
            scale * (-b * adc).exp()
        }
        ModelKind::BiExponential => {
            let (scale, fraction, slow, fast) = (params[0], params[1], params[2], params[3]);
            scale * ((1.0 - fraction) * (-b * slow).exp() + fraction * (-b * fast).exp())
        }
        ModelKind::Kurtosis => {
            let (scale, kurtosis, diff) = (params[0], params[1], params[2]);
            scale * (-b * diff + (b * b) * (diff * diff) * kurtosis / 6.0).exp()
        }
        ModelKind::StretchedExponential => {
            let (scale, ddc, alpha) = (params[0], params[1], params[2]);
            scale * (-(b * ddc).powf(alpha)).exp()
        }
        ModelKind::Gamma => {
            let (scale, k, theta) = (params[0], params[1], params[2]);
            scale * (1.0 + b * theta).powf(-k)
        }
    }
}

/// Evaluate the model at every b-value into `out`.
pub fn predict_into(model: ModelKind, b_values: &[f64], params: &[f64], out: &mut [f64]) {
    for (slot, &b) in out.iter_mut().zip(b_values) {
        *slot = predict(model, b, params);
    }
}

/// Values written to the output maps for a fitted parameter vector.
///
/// Fitted parameters are multiplied by their storage scale; derived quantities
/// follow (Gamma mode = (k − 1)·θ in raw units).
pub fn stored_values(model: ModelKind, params: &[f64]) -> Vec<f64> {
    let mut out: Vec<f64> = model
        .parameters()
        .iter()
        .zip(params)
        .map(|(info, &value)| value * info.storage_scale)
        .collect();
    if model == ModelKind::Gamma {
        let (k, theta) = (params[1], params[2]);
        out.push((k - 1.0) * theta * GAMMA_MODE.storage_scale);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_model_returns_scale_at_b0() {
        for kind in ModelKind::ALL {
            let mut params = kind.default_initial().to_vec();
            params[0] = 812.5;
            let s0 = predict(kind, 0.0, &params);
            assert!((s0 - 812.5).abs() < 1e-9, "{kind}: S(0)={s0}");
        }
    }

    #[test]
    fn initial_vectors_match_parameter_counts() {
        let counts = [2, 4, 3, 3, 3];
        for (kind, expected) in ModelKind::ALL.into_iter().zip(counts) {
            assert_eq!(kind.param_count(), expected, "{kind}");
            assert_eq!(kind.default_initial().len(), expected, "{kind}");
            assert_eq!(kind.parameters()[0].key, MapKey::Scale);
        }
    }

    #[test]
    fn only_gamma_has_a_derived_map() {
        for kind in ModelKind::ALL {
            let extra = kind.output_maps().len() - kind.param_count();
            assert_eq!(extra, usize::from(kind == ModelKind::Gamma), "{kind}");
        }
    }

    #[test]
    fn mismatched_override_falls_back_to_defaults() {
        let model = ModelKind::Kurtosis;
        assert_eq!(model.initial_parameters(Some(&[1.0, 2.0])), model.default_initial());
        assert_eq!(model.initial_parameters(Some(&[1.0, 2.0, 3.0])), vec![1.0, 2.0, 3.0]);
        assert_eq!(model.initial_parameters(None), model.default_initial());
    }

    #[test]
    fn predict_matches_closed_forms() {
        let b = 800.0;
        let mono = predict(ModelKind::MonoExponential, b, &[1000.0, 0.0012]);
        assert!((mono - 1000.0 * (-0.96f64).exp()).abs() < 1e-9);

        let bi = predict(ModelKind::BiExponential, b, &[1000.0, 0.25, 0.001, 0.01]);
        let expected = 1000.0 * (0.75 * (-0.8f64).exp() + 0.25 * (-8.0f64).exp());
        assert!((bi - expected).abs() < 1e-9);

        let gamma = predict(ModelKind::Gamma, b, &[1000.0, 1.5, 0.002]);
        assert!((gamma - 1000.0 * 2.6f64.powf(-1.5)).abs() < 1e-9);

        let stretched = predict(ModelKind::StretchedExponential, b, &[1000.0, 0.0015, 0.8]);
        assert!((stretched - 1000.0 * (-(1.2f64).powf(0.8)).exp()).abs() < 1e-9);

        let kurtosis = predict(ModelKind::Kurtosis, b, &[1000.0, 0.9, 0.0015]);
        let expected = 1000.0 * (-1.2 + 1.44 * 0.9 / 6.0f64).exp();
        assert!((kurtosis - expected).abs() < 1e-9);
    }

    #[test]
    fn storage_scaling_is_per_parameter() {
        let mono = stored_values(ModelKind::MonoExponential, &[1000.0, 0.0012]);
        assert_eq!(mono[0], 1000.0);
        assert!((mono[1] - 1200.0).abs() < 1e-9);

        let stretched = stored_values(ModelKind::StretchedExponential, &[500.0, 0.0017, 0.7]);
        assert!((stretched[1] - 1700.0).abs() < 1e-9);
        assert_eq!(stretched[2], 0.7);
    }

    #[test]
    fn gamma_mode_is_derived_from_k_and_theta() {
        let stored = stored_values(ModelKind::Gamma, &[900.0, 2.5, 0.002]);
        assert_eq!(stored.len(), 4);
        assert!((stored[1] - 2.5).abs() < 1e-12);
        assert!((stored[2] - 2000.0).abs() < 1e-9);
        assert!((stored[3] - 1.5 * 0.002).abs() < 1e-15);
    }
}
