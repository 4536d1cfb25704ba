//! Goodness of fit (coefficient of determination).
//!
//! ```text
//! SSerr = end_error² · n
//! SStot = Σ (y_i − ȳ)²
//! R²    = 1 − SSerr / SStot
//! ```
//!
//! A voxel whose observed signal has no variance has no defined R²; it is
//! reported as `NaN`.

/// Total sum of squares of `observed`, or `None` when it is numerically zero.
///
/// "Zero" means at or below `f64::EPSILON · Σy²`, which absorbs the rounding of
/// the mean for constant signals.
pub fn total_sum_of_squares(observed: &[f64]) -> Option<f64> {
    if observed.is_empty() {
        return None;
    }
    let n = observed.len() as f64;
    let mean = observed.iter().sum::<f64>() / n;
    let ss_tot: f64 = observed.iter().map(|y| (y - mean) * (y - mean)).sum();
    let sum_sq: f64 = observed.iter().map(|y| y * y).sum();
    (ss_tot > f64::EPSILON * sum_sq).then_some(ss_tot)
}

/// R² from the solver's root-mean-square end error.
pub fn r_squared(observed: &[f64], end_error: f64) -> f64 {
    let Some(ss_tot) = total_sum_of_squares(observed) else {
        return f64::NAN;
    };
    let ss_err = end_error * end_error * observed.len() as f64;
    1.0 - ss_err / ss_tot
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_fit_is_one() {
        let y = [1000.0, 800.0, 450.0, 90.0];
        assert_eq!(r_squared(&y, 0.0), 1.0);
    }

    #[test]
    fn matches_textbook_formula() {
        let y = [4.0, 2.0, 3.0, 7.0];
        // mean 4, SStot = 0 + 4 + 1 + 9 = 14
        let residuals = [0.5, -0.5, 1.0, -1.0];
        let rms = (residuals.iter().map(|r: &f64| r * r).sum::<f64>() / 4.0).sqrt();
        let r2 = r_squared(&y, rms);
        assert!((r2 - (1.0 - 2.5 / 14.0)).abs() < 1e-12, "r2={r2}");
    }

    #[test]
    fn constant_signal_is_nan() {
        assert!(r_squared(&[500.0, 500.0, 500.0], 0.0).is_nan());
        assert!(r_squared(&[0.1, 0.1, 0.1], 0.0).is_nan());
        assert!(total_sum_of_squares(&[]).is_none());
    }

    #[test]
    fn poor_fit_can_be_negative() {
        let y = [10.0, 9.0, 8.0];
        assert!(r_squared(&y, 5.0) < 0.0);
    }
}
