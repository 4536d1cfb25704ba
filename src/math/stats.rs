//! Small summary statistics over finite samples.

/// Mean/min/max of the finite values in `values`; `None` if there are none.
pub fn finite_summary<I>(values: I) -> Option<(f64, f64, f64)>
where
    I: IntoIterator<Item = f64>,
{
    let mut n = 0usize;
    let mut sum = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values.into_iter().filter(|v| v.is_finite()) {
        n += 1;
        sum += v;
        min = min.min(v);
        max = max.max(v);
    }
    (n > 0).then(|| (sum / n as f64, min, max))
}

/// Median of the finite values in `values`.
pub fn finite_median<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let mut v: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
    if v.is_empty() {
        return None;
    }
    v.sort_by(|a, b| a.total_cmp(b));
    let mid = v.len() / 2;
    if v.len() % 2 == 0 {
        Some(0.5 * (v[mid - 1] + v[mid]))
    } else {
        Some(v[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_ignores_non_finite() {
        let (mean, min, max) = finite_summary([1.0, f64::NAN, 3.0, f64::INFINITY]).unwrap();
        assert_eq!((mean, min, max), (2.0, 1.0, 3.0));
        assert!(finite_summary([f64::NAN]).is_none());
    }

    #[test]
    fn median_of_even_and_odd_counts() {
        assert_eq!(finite_median([3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(finite_median([4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(finite_median(std::iter::empty()), None);
    }
}
