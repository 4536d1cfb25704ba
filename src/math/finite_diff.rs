//! Forward-difference Jacobian.
//!
//! The decay models do not expose analytic derivatives, so the optimizer is fed
//! a numerically differentiated Jacobian:
//!
//! ```text
//! J[i][j] ≈ (r_i(p + h_j e_j) - r_i(p)) / h_j,   h_j = sqrt(ε) · |p_j|
//! ```
//!
//! with `h_j = sqrt(ε)` when `p_j == 0` (the MINPACK `lmdif` convention).

use nalgebra::DMatrix;

/// Step used for parameter `value` given the function-precision epsilon.
pub fn forward_step(value: f64, epsilon: f64) -> f64 {
    let eps = epsilon.max(f64::EPSILON).sqrt();
    let h = eps * value.abs();
    if h == 0.0 { eps } else { h }
}

/// Forward-difference Jacobian of `eval` at `params`.
///
/// `eval(p, out)` writes the `m` function values at `p` into `out`. `base` must
/// hold the function values at `params`. Returns `None` if any entry is
/// non-finite.
pub fn forward_jacobian<F>(params: &[f64], base: &[f64], epsilon: f64, mut eval: F) -> Option<DMatrix<f64>>
where
    F: FnMut(&[f64], &mut [f64]),
{
    let m = base.len();
    let n = params.len();
    let mut jac = DMatrix::zeros(m, n);
    let mut shifted = params.to_vec();
    let mut values = vec![0.0; m];

    for j in 0..n {
        let h = forward_step(params[j], epsilon);
        shifted[j] = params[j] + h;
        eval(&shifted, &mut values);
        shifted[j] = params[j];

        for i in 0..m {
            let d = (values[i] - base[i]) / h;
            if !d.is_finite() {
                return None;
            }
            jac[(i, j)] = d;
        }
    }

    Some(jac)
}
