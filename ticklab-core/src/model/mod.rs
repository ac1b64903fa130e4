//! Feature selection and no-intercept linear model fitting.
//!
//! [`ModelSpec`] resolves everything the per-day steps need from the
//! configuration once, at startup, so that selection and fitting can only
//! fail for data or numerical reasons.

pub mod ols;
pub mod selector;

use serde::{Deserialize, Serialize};

use crate::columns;
use crate::config::{BacktestConfig, ConfigError};
use crate::numeric::WinsorizeSpec;

pub use ols::{fit, FitDiagnostics, FittedModel};
pub use selector::{select_features, xy_corr};

/// One logical predictor and its candidate horizon variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub name: String,
    pub variants: Vec<String>,
    pub winsorize: WinsorizeSpec,
}

/// A concrete feature column chosen for one day, with its clipping parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedFeature {
    pub column: String,
    pub winsorize: WinsorizeSpec,
}

/// Resolved model inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub features: Vec<FeatureSpec>,
    /// Fit and evaluation target, `{response}_0_{holding_period}`.
    pub target: String,
    /// Forward response columns correlated against feature variants.
    pub response_rows: Vec<String>,
    pub response_winsorize: WinsorizeSpec,
}

impl ModelSpec {
    pub fn from_config(config: &BacktestConfig) -> Result<Self, ConfigError> {
        let features = config
            .feature_column
            .iter()
            .map(|name| {
                Ok(FeatureSpec {
                    name: name.clone(),
                    variants: columns::feature_variants(name, &config.feature_freq),
                    winsorize: config.feature_winsorize(columns::raw_column_name(name))?,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self {
            features,
            target: config.target_column(),
            response_rows: columns::response_variants(
                &config.response_column,
                &config.feature_freq,
                config.holding_period,
            ),
            response_winsorize: config.response_winsorize(),
        })
    }
}
