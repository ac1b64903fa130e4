//! Feature selection: pick, per logical predictor, the horizon variant most
//! correlated with the forward response over the training window.

use tracing::debug;

use super::{FeatureSpec, ModelSpec, SelectedFeature};
use crate::domain::FrameView;
use crate::error::{DataError, FitError};
use crate::numeric::{cross_correlation, winsorize, CorrMatrix, WinsorizeSpec};

/// Correlation matrix between winsorized response variants (rows) and
/// winsorized feature variants (columns) over `train`.
pub fn xy_corr(
    train: &FrameView<'_>,
    feature: &FeatureSpec,
    response_rows: &[String],
    response_winsorize: WinsorizeSpec,
) -> Result<CorrMatrix, FitError> {
    let rows = winsorized_columns(train, response_rows, response_winsorize)?;
    let cols = winsorized_columns(train, &feature.variants, feature.winsorize)?;
    Ok(cross_correlation(&rows, &cols))
}

/// Select one variant per predictor, in `spec.features` order.
///
/// Uses only rows inside `train`. Ties resolve to the first variant in
/// horizon order.
pub fn select_features(
    train: &FrameView<'_>,
    spec: &ModelSpec,
) -> Result<Vec<SelectedFeature>, FitError> {
    if train.is_empty() {
        return Err(DataError::EmptyTrainingWindow.into());
    }
    spec.features
        .iter()
        .map(|feature| {
            debug!(feature = %feature.name, target = %spec.target, "computing correlation");
            let corr = xy_corr(train, feature, &spec.response_rows, spec.response_winsorize)?;
            let column = corr.argmax_in_row(&spec.target).ok_or_else(|| {
                DataError::NoFiniteCorrelation {
                    feature: feature.name.clone(),
                    target: spec.target.clone(),
                }
            })?;
            Ok(SelectedFeature {
                column: column.to_string(),
                winsorize: feature.winsorize,
            })
        })
        .collect()
}

fn winsorized_columns(
    view: &FrameView<'_>,
    names: &[String],
    spec: WinsorizeSpec,
) -> Result<Vec<(String, Vec<f64>)>, FitError> {
    names
        .iter()
        .map(|name| {
            let values = view
                .column(name)
                .ok_or_else(|| DataError::MissingColumn(name.clone()))?;
            Ok((name.clone(), winsorize(values, spec)?))
        })
        .collect()
}
