//! Per-day fitting diagnostics.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::FitError;

/// Outcome of the fit for one evaluation day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FitStatus {
    Fitted,
    /// Selection, fitting or prediction failed; the day is not traded.
    Failed { kind: String, reason: String },
}

/// Diagnostics for one evaluation day.
///
/// Failed days carry NaN scalars and empty coefficient vectors so they stay
/// visible in the table without being mistaken for fitted days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittingStats {
    pub date: NaiveDate,
    /// Selected feature columns, in coefficient order.
    pub features: Vec<String>,
    pub beta: Vec<f64>,
    pub tstat: Vec<f64>,
    /// Two-sided p-values of `tstat` with `df_2` degrees of freedom.
    pub pvalue: Vec<f64>,
    /// In-sample coefficient of determination.
    pub rsq: f64,
    /// In-sample residual mean square error (denominator n - p).
    pub mse: f64,
    pub df_1: Option<usize>,
    pub df_2: Option<usize>,
    /// Training observations used in the fit.
    pub n_obs: usize,
    /// Out-of-sample Pearson correlation between alpha and the realized response.
    /// Older reports call this column `pred_rsq`. It holds the same correlation,
    /// not a squared one.
    pub pred_corr: f64,
    /// Out-of-sample mean squared prediction residual.
    pub pred_mse: f64,
    pub status: FitStatus,
}

impl FittingStats {
    /// A failed day. `features` holds whatever selection produced before failing.
    pub fn failed(date: NaiveDate, features: Vec<String>, error: &FitError) -> Self {
        Self {
            date,
            features,
            beta: Vec::new(),
            tstat: Vec::new(),
            pvalue: Vec::new(),
            rsq: f64::NAN,
            mse: f64::NAN,
            df_1: None,
            df_2: None,
            n_obs: 0,
            pred_corr: f64::NAN,
            pred_mse: f64::NAN,
            status: FitStatus::Failed {
                kind: error.kind().to_string(),
                reason: error.to_string(),
            },
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.status == FitStatus::Fitted
    }
}
