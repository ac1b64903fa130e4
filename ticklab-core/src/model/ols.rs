//! No-intercept ordinary least squares with coefficient diagnostics.
//!
//! Solves the normal equations `β = (XᵀX)⁻¹ Xᵀy` with an explicit inverse,
//! since the inverse diagonal is needed for the standard errors anyway.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ModelSpec, SelectedFeature};
use crate::domain::FrameView;
use crate::error::{DataError, FitError, NumericalError};
use crate::numeric::{two_sided_p_value, winsorize};

/// Relative pivot size below which `XᵀX` is treated as singular.
const SINGULAR_TOLERANCE: f64 = 1e-12;

/// In-sample goodness of fit and coefficient significance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitDiagnostics {
    pub rsq: f64,
    pub mse: f64,
    pub tstat: Vec<f64>,
    pub pvalue: Vec<f64>,
    /// p - 1.
    pub df_1: usize,
    /// n - p.
    pub df_2: usize,
    pub n_obs: usize,
}

/// Coefficients over the selected feature columns.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedModel {
    pub features: Vec<String>,
    pub beta: Array1<f64>,
    pub diagnostics: FitDiagnostics,
}

impl FittedModel {
    /// Predict for a design matrix whose columns follow `self.features`.
    pub fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        x.dot(&self.beta)
    }
}

/// Fit `y ≈ Xβ` over the training window.
///
/// Rows missing any selected feature or the target are dropped first, then
/// each feature is winsorized with its own parameters and the target with
/// the response parameters.
pub fn fit(
    train: &FrameView<'_>,
    features: &[SelectedFeature],
    spec: &ModelSpec,
) -> Result<FittedModel, FitError> {
    let mut raw: Vec<&[f64]> = Vec::with_capacity(features.len() + 1);
    for feature in features {
        raw.push(
            train
                .column(&feature.column)
                .ok_or_else(|| DataError::MissingColumn(feature.column.clone()))?,
        );
    }
    raw.push(
        train
            .column(&spec.target)
            .ok_or_else(|| DataError::MissingColumn(spec.target.clone()))?,
    );

    let complete: Vec<usize> = (0..train.len())
        .filter(|&i| raw.iter().all(|col| !col[i].is_nan()))
        .collect();
    if complete.is_empty() {
        let mut columns: Vec<String> = features.iter().map(|f| f.column.clone()).collect();
        columns.push(spec.target.clone());
        return Err(DataError::NoCompleteRows { columns }.into());
    }

    let n = complete.len();
    let p = features.len();
    if n <= p {
        return Err(DataError::InsufficientObservations {
            observations: n,
            features: p,
        }
        .into());
    }

    let mut x = Array2::<f64>::zeros((n, p));
    for (j, feature) in features.iter().enumerate() {
        let values: Vec<f64> = complete.iter().map(|&i| raw[j][i]).collect();
        let clipped = winsorize(&values, feature.winsorize)?;
        x.column_mut(j).assign(&Array1::from(clipped));
    }
    let target: Vec<f64> = complete.iter().map(|&i| raw[p][i]).collect();
    let y = Array1::from(winsorize(&target, spec.response_winsorize)?);

    let xtx = x.t().dot(&x);
    let xty = x.t().dot(&y);
    let inv = invert(&xtx)?;
    let beta = inv.dot(&xty);

    let residuals = &y - &x.dot(&beta);
    let ssr = residuals.dot(&residuals);
    let df_2 = n - p;
    let mse = ssr / df_2 as f64;

    let tstat: Vec<f64> = inv
        .diag()
        .iter()
        .zip(beta.iter())
        .map(|(&d, &b)| b / (mse * d).sqrt())
        .collect();
    let pvalue = tstat
        .iter()
        .map(|&t| two_sided_p_value(t, df_2 as f64))
        .collect();

    let y_mean = y.mean().unwrap_or(0.0);
    let ss_tot: f64 = y.iter().map(|v| (v - y_mean).powi(2)).sum();
    let rsq = if ss_tot > 0.0 {
        1.0 - ssr / ss_tot
    } else if ssr == 0.0 {
        1.0
    } else {
        0.0
    };

    debug!(n_obs = n, features = p, rsq, mse, "fitted");

    Ok(FittedModel {
        features: features.iter().map(|f| f.column.clone()).collect(),
        beta,
        diagnostics: FitDiagnostics {
            rsq,
            mse,
            tstat,
            pvalue,
            df_1: p.saturating_sub(1),
            df_2,
            n_obs: n,
        },
    })
}

/// Gauss-Jordan inverse with partial pivoting.
pub fn invert(a: &Array2<f64>) -> Result<Array2<f64>, NumericalError> {
    let n = a.nrows();
    let scale = a.diag().iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    if !(scale > 0.0 && scale.is_finite()) {
        return Err(NumericalError::SingularMatrix {
            column: 0,
            pivot: scale,
        });
    }

    let mut m = a.clone();
    let mut inv = Array2::<f64>::eye(n);
    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&r1, &r2| m[[r1, col]].abs().total_cmp(&m[[r2, col]].abs()))
            .unwrap_or(col);
        let pivot = m[[pivot_row, col]];
        if pivot.abs() <= SINGULAR_TOLERANCE * scale || !pivot.is_finite() {
            return Err(NumericalError::SingularMatrix { column: col, pivot });
        }
        if pivot_row != col {
            for k in 0..n {
                m.swap([col, k], [pivot_row, k]);
                inv.swap([col, k], [pivot_row, k]);
            }
        }
        for k in 0..n {
            m[[col, k]] /= pivot;
            inv[[col, k]] /= pivot;
        }
        for r in 0..n {
            if r == col {
                continue;
            }
            let factor = m[[r, col]];
            if factor == 0.0 {
                continue;
            }
            for k in 0..n {
                m[[r, k]] -= factor * m[[col, k]];
                inv[[r, k]] -= factor * inv[[col, k]];
            }
        }
    }
    Ok(inv)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::domain::tick::test_support::{day, tick};
    use crate::domain::TickFrame;
    use crate::numeric::WinsorizeSpec;

    fn frame(columns: &[(&str, Vec<f64>)]) -> TickFrame {
        let n = columns[0].1.len();
        let ticks = (0..n).map(|i| tick(day(1), i as u32, 100.0)).collect();
        let columns: BTreeMap<String, Vec<f64>> = columns
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        TickFrame::new(ticks, columns).unwrap()
    }

    fn selected(names: &[&str]) -> Vec<SelectedFeature> {
        names
            .iter()
            .map(|n| SelectedFeature {
                column: n.to_string(),
                winsorize: WinsorizeSpec::none(),
            })
            .collect()
    }

    fn spec() -> ModelSpec {
        ModelSpec {
            features: Vec::new(),
            target: "y_0_5".into(),
            response_rows: vec!["y_0_5".into()],
            response_winsorize: WinsorizeSpec::none(),
        }
    }

    #[test]
    fn single_regressor_matches_hand_computation() {
        let f = frame(&[
            ("x_5_0", vec![1.0, 2.0, 3.0, 4.0]),
            ("y_0_5", vec![1.0, 3.0, 2.0, 5.0]),
        ]);
        let model = fit(&f.view(), &selected(&["x_5_0"]), &spec()).unwrap();
        let d = &model.diagnostics;
        assert!((model.beta[0] - 1.1).abs() < 1e-12);
        assert!((d.mse - 0.9).abs() < 1e-12);
        assert!((d.tstat[0] - 1.1 / 0.03_f64.sqrt()).abs() < 1e-9);
        assert!((d.rsq - (1.0 - 2.7 / 8.75)).abs() < 1e-12);
        assert_eq!((d.df_1, d.df_2, d.n_obs), (0, 3, 4));
        assert!(d.pvalue[0] > 0.0 && d.pvalue[0] < 0.01);
    }

    #[test]
    fn recovers_exact_coefficients() {
        let x1 = vec![1.0, 0.0, 2.0, -1.0, 3.0, 0.5];
        let x2 = vec![0.0, 1.0, 1.0, 2.0, -1.0, 0.25];
        let y: Vec<f64> = x1.iter().zip(&x2).map(|(a, b)| 2.0 * a - b).collect();
        let f = frame(&[("a_1_0", x1), ("b_1_0", x2), ("y_0_5", y)]);
        let model = fit(&f.view(), &selected(&["a_1_0", "b_1_0"]), &spec()).unwrap();
        assert!((model.beta[0] - 2.0).abs() < 1e-10);
        assert!((model.beta[1] + 1.0).abs() < 1e-10);
        assert!((model.diagnostics.rsq - 1.0).abs() < 1e-10);
        assert_eq!(model.features, vec!["a_1_0", "b_1_0"]);
    }

    #[test]
    fn drops_incomplete_rows() {
        let f = frame(&[
            ("x_5_0", vec![1.0, f64::NAN, 2.0, 3.0, 4.0]),
            ("y_0_5", vec![1.0, 9.0, 3.0, f64::NAN, 5.0]),
        ]);
        let model = fit(&f.view(), &selected(&["x_5_0"]), &spec()).unwrap();
        assert_eq!(model.diagnostics.n_obs, 3);
    }

    #[test]
    fn missing_response_is_data_error() {
        let f = frame(&[
            ("x_5_0", vec![1.0, 2.0, 3.0]),
            ("y_0_5", vec![f64::NAN; 3]),
        ]);
        let err = fit(&f.view(), &selected(&["x_5_0"]), &spec()).unwrap_err();
        assert!(matches!(err, FitError::Data(DataError::NoCompleteRows { .. })));
        assert_eq!(err.kind(), "data");
    }

    #[test]
    fn collinear_features_are_singular() {
        let x = vec![1.0, 2.0, 3.0, 4.0];
        let doubled: Vec<f64> = x.iter().map(|v| v * 2.0).collect();
        let f = frame(&[
            ("a_1_0", x),
            ("b_1_0", doubled),
            ("y_0_5", vec![1.0, 0.0, 1.0, 0.0]),
        ]);
        let err = fit(&f.view(), &selected(&["a_1_0", "b_1_0"]), &spec()).unwrap_err();
        assert!(matches!(
            err,
            FitError::Numerical(NumericalError::SingularMatrix { .. })
        ));
        assert_eq!(err.kind(), "numerical");
    }

    #[test]
    fn zero_column_is_singular() {
        let f = frame(&[
            ("x_5_0", vec![0.0; 4]),
            ("y_0_5", vec![1.0, 2.0, 3.0, 4.0]),
        ]);
        assert!(fit(&f.view(), &selected(&["x_5_0"]), &spec()).is_err());
    }

    #[test]
    fn too_few_observations() {
        let f = frame(&[
            ("a_1_0", vec![1.0, 2.0]),
            ("b_1_0", vec![3.0, 1.0]),
            ("y_0_5", vec![1.0, 0.0]),
        ]);
        let err = fit(&f.view(), &selected(&["a_1_0", "b_1_0"]), &spec()).unwrap_err();
        assert_eq!(
            err,
            FitError::Data(DataError::InsufficientObservations {
                observations: 2,
                features: 2
            })
        );
    }

    #[test]
    fn invert_round_trips_to_identity() {
        let a = ndarray::arr2(&[[4.0, 1.0, 0.5], [1.0, 3.0, 0.2], [0.5, 0.2, 2.0]]);
        let inv = invert(&a).unwrap();
        let id = a.dot(&inv);
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((id[[i, j]] - expected).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn predict_is_linear() {
        let f = frame(&[
            ("x_5_0", vec![1.0, 2.0, 3.0, 4.0]),
            ("y_0_5", vec![2.0, 4.0, 6.0, 8.0]),
        ]);
        let model = fit(&f.view(), &selected(&["x_5_0"]), &spec()).unwrap();
        let pred = model.predict(&ndarray::arr2(&[[10.0], [-1.0]]));
        assert!((pred[0] - 20.0).abs() < 1e-10);
        assert!((pred[1] + 2.0).abs() < 1e-10);
    }
}
