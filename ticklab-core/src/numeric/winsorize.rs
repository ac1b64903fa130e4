//! Winsorization: clip a series at quantile and absolute bounds.

use serde::{Deserialize, Serialize};

use crate::error::NumericalError;

/// Clipping parameters for one series.
///
/// `prob` clips to the `[prob, 1 - prob]` quantiles of the finite values
/// (0 disables). `bound` then clips to `[-bound, bound]` (infinite disables).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WinsorizeSpec {
    pub prob: f64,
    pub bound: f64,
}

impl WinsorizeSpec {
    pub fn new(prob: f64, bound: f64) -> Self {
        Self { prob, bound }
    }

    /// No clipping at all.
    pub fn none() -> Self {
        Self {
            prob: 0.0,
            bound: f64::INFINITY,
        }
    }
}

/// Winsorize `values`. NaN entries pass through unchanged, so an all-NaN
/// series comes back as is and its absence is reported by the caller.
///
/// Fails when quantile clipping is requested and the present values are all
/// infinite, leaving nothing to derive the bounds from.
pub fn winsorize(values: &[f64], spec: WinsorizeSpec) -> Result<Vec<f64>, NumericalError> {
    let (mut lo, mut hi) = (f64::NEG_INFINITY, f64::INFINITY);

    if spec.prob > 0.0 && values.iter().any(|v| !v.is_nan()) {
        let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            return Err(NumericalError::DegenerateWinsorization);
        }
        finite.sort_by(|a, b| a.total_cmp(b));
        lo = quantile_sorted(&finite, spec.prob);
        hi = quantile_sorted(&finite, 1.0 - spec.prob);
    }

    // Quantile clip first, absolute bound second.
    Ok(values
        .iter()
        .map(|&v| {
            if v.is_nan() {
                v
            } else {
                v.max(lo).min(hi).max(-spec.bound).min(spec.bound)
            }
        })
        .collect())
}

/// Quantile of an ascending, non-empty slice with linear interpolation.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_bound_only() {
        let out = winsorize(&[-5.0, -1.0, 0.0, 3.0, 8.0], WinsorizeSpec::new(0.0, 2.0)).unwrap();
        assert_eq!(out, vec![-2.0, -1.0, 0.0, 2.0, 2.0]);
    }

    #[test]
    fn quantile_bounds() {
        let values: Vec<f64> = (0..=100).map(f64::from).collect();
        let out = winsorize(&values, WinsorizeSpec::new(0.05, f64::INFINITY)).unwrap();
        assert!((out[0] - 5.0).abs() < 1e-9);
        assert_eq!(out[50], 50.0);
        assert!((out[100] - 95.0).abs() < 1e-9);
    }

    #[test]
    fn nan_passes_through() {
        let out = winsorize(&[f64::NAN, 1.0, 100.0], WinsorizeSpec::new(0.0, 10.0)).unwrap();
        assert!(out[0].is_nan());
        assert_eq!(out[2], 10.0);
    }

    #[test]
    fn none_is_identity() {
        let values = vec![-1e9, 0.5, 1e9];
        assert_eq!(winsorize(&values, WinsorizeSpec::none()).unwrap(), values);
    }

    #[test]
    fn bound_applies_after_quantiles() {
        let out = winsorize(&[100.0, 101.0, 102.0], WinsorizeSpec::new(0.1, 50.0)).unwrap();
        assert_eq!(out, vec![50.0, 50.0, 50.0]);
    }

    #[test]
    fn all_missing_passes_through() {
        let out = winsorize(&[f64::NAN, f64::NAN], WinsorizeSpec::new(0.1, 1.0)).unwrap();
        assert!(out.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn all_infinite_with_prob_is_degenerate() {
        let values = [f64::INFINITY, f64::NAN, f64::NEG_INFINITY];
        let err = winsorize(&values, WinsorizeSpec::new(0.1, 1.0)).unwrap_err();
        assert_eq!(err, NumericalError::DegenerateWinsorization);
    }

    #[test]
    fn interpolated_quantile() {
        assert_eq!(quantile_sorted(&[1.0, 2.0, 3.0, 4.0], 0.5), 2.5);
        assert_eq!(quantile_sorted(&[7.0], 0.9), 7.0);
    }
}
