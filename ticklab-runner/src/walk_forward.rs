//! Walk-forward driver — rolling daily refit and out-of-sample prediction.
//!
//! For every trading date from index `training_period` onwards:
//! 1. Training window = the `training_period` preceding dates
//! 2. Select one horizon variant per predictor on the window
//! 3. Fit the no-intercept model on the window
//! 4. Impute missing evaluation features with the day's median and predict
//! 5. Record diagnostics and the day's prediction rows
//!
//! A failure in steps 2-4 only affects its own day: the day gets a failed
//! diagnostics row and contributes no prediction rows.

use std::collections::BTreeMap;
use std::ops::Range;

use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use ticklab_core::config::{BacktestConfig, ConfigError};
use ticklab_core::domain::{BacktestRow, BacktestTable, FitStatus, FittingStats, TickFrame};
use ticklab_core::error::{ConsistencyError, DataError, FitError};
use ticklab_core::model::{fit, select_features, FittedModel, ModelSpec};
use ticklab_core::numeric::{median, nan_mean, pearson};

// ─── Configuration ───────────────────────────────────────────────────

/// Execution options that do not change results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkForwardOptions {
    /// Evaluate days (and match dates) on the rayon pool.
    pub parallel: bool,
}

impl Default for WalkForwardOptions {
    fn default() -> Self {
        Self { parallel: true }
    }
}

/// Errors that abort a whole run before any day is processed.
#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("inconsistent input: {0}")]
    Consistency(#[from] ConsistencyError),
}

// ─── Windows ─────────────────────────────────────────────────────────

/// Day indices of the training window for the evaluation day `day_index`.
///
/// Half-open and strictly before `day_index`.
pub fn training_days(day_index: usize, training_period: usize) -> Range<usize> {
    day_index.saturating_sub(training_period)..day_index
}

/// Day indices that get evaluated: every day with a full training window.
pub fn evaluation_days(n_days: usize, training_period: usize) -> Range<usize> {
    training_period.min(n_days)..n_days
}

// ─── Orchestration ───────────────────────────────────────────────────

/// Run the walk-forward loop with default options.
pub fn backtest(
    frame: &TickFrame,
    config: &BacktestConfig,
) -> Result<(BacktestTable, Vec<FittingStats>), BacktestError> {
    backtest_with(frame, config, WalkForwardOptions::default())
}

/// Run the walk-forward loop.
///
/// Returns the tick-level prediction table and one diagnostics row per
/// evaluated day, both in date order.
pub fn backtest_with(
    frame: &TickFrame,
    config: &BacktestConfig,
    options: WalkForwardOptions,
) -> Result<(BacktestTable, Vec<FittingStats>), BacktestError> {
    config.validate()?;
    let spec = ModelSpec::from_config(config)?;
    config.validate_against(frame)?;

    let n_days = frame.days().len();
    let days = evaluation_days(n_days, config.training_period);
    info!(
        run = %config.name,
        total_days = n_days,
        evaluation_days = days.len(),
        training_period = config.training_period,
        parallel = options.parallel,
        "starting walk-forward"
    );

    let evaluate = |index: usize| evaluate_day(frame, &spec, config.training_period, index);
    let outcomes: Vec<(FittingStats, Vec<BacktestRow>)> = if options.parallel {
        days.into_par_iter().map(evaluate).collect()
    } else {
        days.map(evaluate).collect()
    };

    let mut stats = Vec::with_capacity(outcomes.len());
    let mut rows = Vec::new();
    for (day_stats, day_rows) in outcomes {
        stats.push(day_stats);
        rows.extend(day_rows);
    }

    let failed = stats.iter().filter(|s| !s.is_fitted()).count();
    info!(
        rows = rows.len(),
        fitted_days = stats.len() - failed,
        failed_days = failed,
        "walk-forward complete"
    );
    Ok((BacktestTable::new(rows), stats))
}

/// Prediction rows for one evaluation day plus out-of-sample fit quality.
struct DayPrediction {
    rows: Vec<BacktestRow>,
    pred_corr: f64,
    pred_mse: f64,
}

fn evaluate_day(
    frame: &TickFrame,
    spec: &ModelSpec,
    training_period: usize,
    index: usize,
) -> (FittingStats, Vec<BacktestRow>) {
    let date = frame.days()[index].date;
    let train = frame.days_view(training_days(index, training_period));
    debug!(%date, train_rows = train.len(), "evaluating day");

    let selected = match select_features(&train, spec) {
        Ok(selected) => selected,
        Err(e) => return failed_day(date, Vec::new(), e),
    };
    let names: Vec<String> = selected.iter().map(|f| f.column.clone()).collect();

    let outcome = fit(&train, &selected, spec)
        .and_then(|model| predict_day(frame, index, &model, spec).map(|p| (model, p)));

    match outcome {
        Ok((model, prediction)) => {
            let d = model.diagnostics;
            let stats = FittingStats {
                date,
                features: names,
                beta: model.beta.to_vec(),
                tstat: d.tstat,
                pvalue: d.pvalue,
                rsq: d.rsq,
                mse: d.mse,
                df_1: Some(d.df_1),
                df_2: Some(d.df_2),
                n_obs: d.n_obs,
                pred_corr: prediction.pred_corr,
                pred_mse: prediction.pred_mse,
                status: FitStatus::Fitted,
            };
            (stats, prediction.rows)
        }
        Err(e) => failed_day(date, names, e),
    }
}

fn failed_day(
    date: chrono::NaiveDate,
    features: Vec<String>,
    error: FitError,
) -> (FittingStats, Vec<BacktestRow>) {
    warn!(%date, kind = error.kind(), %error, "day skipped");
    (FittingStats::failed(date, features, &error), Vec::new())
}

fn predict_day(
    frame: &TickFrame,
    index: usize,
    model: &FittedModel,
    spec: &ModelSpec,
) -> Result<DayPrediction, FitError> {
    let eval = frame.days_view(index..index + 1);
    let n = eval.len();

    let mut filled: Vec<Vec<f64>> = Vec::with_capacity(model.features.len());
    for name in &model.features {
        let values = eval
            .column(name)
            .ok_or_else(|| DataError::MissingColumn(name.clone()))?;
        let fill = median(values).ok_or_else(|| DataError::MissingEvaluationFeature {
            column: name.clone(),
        })?;
        filled.push(
            values
                .iter()
                .map(|&v| if v.is_nan() { fill } else { v })
                .collect(),
        );
    }
    let response = eval
        .column(&spec.target)
        .ok_or_else(|| DataError::MissingColumn(spec.target.clone()))?;

    let x = Array2::from_shape_fn((n, filled.len()), |(i, j)| filled[j][i]);
    let alpha = model.predict(&x).to_vec();

    let squared: Vec<f64> = alpha
        .iter()
        .zip(response)
        .map(|(a, y)| (a - y).powi(2))
        .collect();
    let pred_corr = pearson(&alpha, response);
    let pred_mse = nan_mean(&squared);

    let rows = eval
        .ticks()
        .iter()
        .enumerate()
        .map(|(i, tick)| {
            let features: BTreeMap<String, f64> = model
                .features
                .iter()
                .zip(&filled)
                .map(|(name, col)| (name.clone(), col[i]))
                .collect();
            BacktestRow::new(tick.clone(), features, response[i], alpha[i])
        })
        .collect();

    Ok(DayPrediction {
        rows,
        pred_corr,
        pred_mse,
    })
}
