//! End-to-end walk-forward scenarios on synthetic tick data.
//!
//! Tests:
//! 1. Only days with a full training window are evaluated
//! 2. A day whose training responses or evaluation features are all missing
//!    fails locally as a data error
//! 3. Evaluation-day data never reaches that day's fit
//! 4. Configuration errors abort before any day runs
//! 5. Pipeline invariants (net PnL identity, rates, trading hours)
//! 6. Parallel and sequential runs agree

use std::collections::BTreeMap;
use std::path::PathBuf;

use ticklab_core::config::{BacktestConfig, ConfigError};
use ticklab_core::data::{generate, SyntheticSpec};
use ticklab_core::domain::{FitStatus, TickFrame};
use ticklab_runner::{
    backtest, backtest_with, run_pipeline, BacktestError, RunArtifacts, WalkForwardOptions,
};

// ── Helpers ──

fn fixture_config() -> BacktestConfig {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .join("ticklab-core/tests/fixtures/oir_60.toml");
    BacktestConfig::from_file(&path).unwrap()
}

/// The shared fixture with tighter bands so synthetic runs trade.
fn config() -> BacktestConfig {
    let mut config = fixture_config();
    config.trade_trigger_threshold = [-0.2, 0.2];
    config
}

fn frame(days: usize) -> TickFrame {
    generate(&SyntheticSpec {
        days,
        ticks_per_day: 300,
        ..Default::default()
    })
    .unwrap()
}

/// Rebuild `frame` with `edit(column, day_index, values)` applied to every
/// column on every day.
fn edit_frame(frame: &TickFrame, edit: impl Fn(&str, usize, &mut [f64])) -> TickFrame {
    let mut columns = BTreeMap::new();
    for name in frame.column_names() {
        let mut values = frame.column(name).unwrap().to_vec();
        for (index, day) in frame.days().iter().enumerate() {
            edit(name, index, &mut values[day.rows.clone()]);
        }
        columns.insert(name.to_string(), values);
    }
    TickFrame::new(frame.ticks().to_vec(), columns).unwrap()
}

// ── 1. Evaluation range ──

#[test]
fn three_dates_evaluate_only_the_third() {
    let frame = frame(3);
    let dates = frame.dates();
    let (table, stats) = backtest(&frame, &config()).unwrap();

    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].date, dates[2]);
    assert!(stats[0].is_fitted());
    assert!(!table.is_empty());
    assert!(table.rows.iter().all(|r| r.date() == dates[2]));
    assert_eq!(table.len(), frame.days()[2].rows.len());
}

#[test]
fn too_few_dates_produce_empty_outputs() {
    let (table, stats) = backtest(&frame(2), &config()).unwrap();
    assert!(table.is_empty());
    assert!(stats.is_empty());
}

// ── 2. Local failure ──

#[test]
fn missing_training_responses_fail_one_day() {
    let frame = edit_frame(&frame(4), |name, day, values| {
        if name.starts_with("tick_move") && day < 2 {
            values.fill(f64::NAN);
        }
    });
    let dates = frame.dates();
    let (table, stats) = backtest(&frame, &config()).unwrap();

    assert_eq!(stats.len(), 2);
    let failed = &stats[0];
    assert_eq!(failed.date, dates[2]);
    assert!(!failed.is_fitted());
    assert!(failed.rsq.is_nan());
    assert!(failed.mse.is_nan());
    assert!(failed.pred_corr.is_nan());
    assert!(failed.beta.is_empty());
    match &failed.status {
        FitStatus::Failed { kind, .. } => assert_eq!(kind, "data"),
        FitStatus::Fitted => panic!("expected a failed day"),
    }

    assert!(stats[1].is_fitted());
    assert!(table.rows.iter().all(|r| r.date() == dates[3]));
}

#[test]
fn failed_days_are_not_traded() {
    let frame = edit_frame(&frame(4), |name, day, values| {
        if name.starts_with("tick_move") && day < 2 {
            values.fill(f64::NAN);
        }
    });
    let artifacts = run_pipeline(&frame, &config(), WalkForwardOptions::default()).unwrap();
    assert_eq!(artifacts.failed_days(), 1);
    assert_eq!(artifacts.fitted_days(), 1);
    let failed_date = artifacts.fitting_stats[0].date;
    assert!(artifacts.table.trades().all(|r| r.date() != failed_date));
}

#[test]
fn missing_training_responses_are_data_errors_under_quantile_clipping() {
    let frame = edit_frame(&frame(3), |name, day, values| {
        if name.starts_with("tick_move") && day < 2 {
            values.fill(f64::NAN);
        }
    });
    let mut config = config();
    config.response_winsorize_prob = 0.01;
    let (table, stats) = backtest(&frame, &config).unwrap();

    assert_eq!(stats.len(), 1);
    match &stats[0].status {
        FitStatus::Failed { kind, .. } => assert_eq!(kind, "data"),
        FitStatus::Fitted => panic!("expected a failed day"),
    }
    assert!(table.is_empty());
}

#[test]
fn missing_evaluation_features_fail_the_day() {
    let frame = edit_frame(&frame(4), |name, day, values| {
        if name.starts_with("order_imbalance_ratio") && day == 2 {
            values.fill(f64::NAN);
        }
    });
    let dates = frame.dates();
    let (table, stats) = backtest(&frame, &config()).unwrap();

    assert_eq!(stats.len(), 2);
    let failed = &stats[0];
    assert_eq!(failed.date, dates[2]);
    assert!(!failed.features.is_empty());
    assert!(failed.beta.is_empty());
    assert!(failed.rsq.is_nan());
    assert!(failed.pred_corr.is_nan());
    assert!(failed.pred_mse.is_nan());
    match &failed.status {
        FitStatus::Failed { kind, reason } => {
            assert_eq!(kind, "data");
            assert!(failed.features.iter().any(|f| reason.contains(f.as_str())));
        }
        FitStatus::Fitted => panic!("expected a failed day"),
    }
    assert!(table.rows.iter().all(|r| r.date() != dates[2]));

    assert!(stats[1].is_fitted());
    assert!(table.rows.iter().any(|r| r.date() == dates[3]));
}

// ── 3. Causality ──

#[test]
fn evaluation_day_does_not_leak_into_fit() {
    let original = frame(3);
    let scrambled = edit_frame(&original, |_, day, values| {
        if day == 2 {
            for v in values.iter_mut() {
                *v = -3.0 * *v + 1.0;
            }
        }
    });

    let (_, a) = backtest(&original, &config()).unwrap();
    let (_, b) = backtest(&scrambled, &config()).unwrap();
    assert_eq!(a[0].features, b[0].features);
    assert_eq!(a[0].beta, b[0].beta);
    assert_eq!(a[0].tstat, b[0].tstat);
    assert_eq!(a[0].rsq, b[0].rsq);
    assert_eq!(a[0].n_obs, b[0].n_obs);
}

#[test]
fn missing_evaluation_features_are_median_filled() {
    let frame = edit_frame(&frame(3), |name, day, values| {
        if name.starts_with("order_imbalance_ratio") && day == 2 {
            values[0] = f64::NAN;
        }
    });
    let (table, stats) = backtest(&frame, &config()).unwrap();
    assert!(stats[0].is_fitted());
    let feature = &stats[0].features[0];
    assert!(table.rows[0].features[feature].is_finite());
    assert!(table.rows[0].alpha.is_finite());
}

// ── 4. Fatal errors ──

#[test]
fn unknown_feature_aborts() {
    let mut config = config();
    config.feature_column.push("order_flow_imbalance".into());
    config
        .feature_winsorize_prob
        .insert("order_flow_imbalance".into(), 0.0);
    config
        .feature_winsorize_bound
        .insert("order_flow_imbalance".into(), 1.0);
    let err = backtest(&frame(3), &config).unwrap_err();
    assert!(matches!(
        err,
        BacktestError::Config(ConfigError::UnknownColumn(ref c)) if c == "order_flow_imbalance_5_0"
    ));
}

#[test]
fn missing_target_aborts() {
    let mut config = config();
    config.holding_period = 45;
    let err = backtest(&frame(3), &config).unwrap_err();
    assert!(matches!(
        err,
        BacktestError::Config(ConfigError::UnknownColumn(ref c)) if c == "tick_move_0_45"
    ));
}

#[test]
fn invalid_threshold_aborts() {
    let mut config = config();
    config.trade_trigger_threshold = [0.5, -0.5];
    assert!(matches!(
        backtest(&frame(3), &config),
        Err(BacktestError::Config(_))
    ));
}

// ── 5. Pipeline invariants ──

fn run(config: &BacktestConfig, days: usize) -> RunArtifacts {
    run_pipeline(&frame(days), config, WalkForwardOptions::default()).unwrap()
}

#[test]
fn net_pnl_identity_holds_on_every_row() {
    for dynamic in [false, true] {
        let mut config = config();
        config.dynamic_unwinding = dynamic;
        let artifacts = run(&config, 5);
        assert!(artifacts.summary.n_trades > 0);
        for row in &artifacts.table.rows {
            assert_eq!(row.net_pnl, row.pnl - row.transaction_fee);
            if row.trade.is_flat() {
                assert_eq!(row.pnl, 0.0);
                assert_eq!(row.transaction_fee, 0.0);
            } else {
                assert!(row.transaction_fee > 0.0);
                assert!(row.matched_close_second.unwrap() >= row.second());
            }
        }
    }
}

#[test]
fn dynamic_policy_leaves_flat_rows_unmatched() {
    let mut config = config();
    config.dynamic_unwinding = true;
    let artifacts = run(&config, 4);
    for row in &artifacts.table.rows {
        assert_eq!(row.trade.is_flat(), row.matched_close_second.is_none());
    }
}

#[test]
fn rates_are_bounded() {
    let artifacts = run(&config(), 5);
    let s = &artifacts.summary;
    assert!(s.winning_rate + s.losing_rate <= 1.0);
    assert!(s.net_winning_rate + s.net_losing_rate <= 1.0);
    let fees: f64 = artifacts.table.trades().map(|r| r.transaction_fee).sum();
    assert!((s.total_net_pnl - (s.total_pnl - fees)).abs() < 1e-9);
}

#[test]
fn trading_hours_are_respected() {
    let mut config = config();
    config.start_second = 34_400;
    config.end_second = 34_500;
    let artifacts = run(&config, 4);
    for row in artifacts.table.trades() {
        assert!((34_400..=34_500).contains(&row.second()));
    }
}

#[test]
fn daily_summary_adds_up() {
    let artifacts = run(&config(), 5);
    let daily_trades: usize = artifacts.daily_summary.iter().map(|d| d.n_trades).sum();
    assert_eq!(daily_trades, artifacts.summary.n_trades);
    assert_eq!(artifacts.daily_summary.len(), artifacts.summary.n_trading_days);
    let daily_net: f64 = artifacts.daily_summary.iter().map(|d| d.net_pnl).sum();
    assert!((daily_net - artifacts.summary.total_net_pnl).abs() < 1e-9);
}

// ── 6. Determinism ──

#[test]
fn parallel_and_sequential_agree() {
    let frame = frame(6);
    let config = config();
    let a = backtest_with(&frame, &config, WalkForwardOptions { parallel: true }).unwrap();
    let b = backtest_with(&frame, &config, WalkForwardOptions { parallel: false }).unwrap();
    // NaN-bearing fields compare through their serialized form
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

#[test]
fn repeated_runs_are_identical() {
    let a = run(&config(), 4);
    let b = run(&config(), 4);
    assert_eq!(a.config_fingerprint, b.config_fingerprint);
    assert_eq!(a.summary, b.summary);
}
