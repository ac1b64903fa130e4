//! Artifact export — Parquet, CSV, JSON, TOML and Markdown.
//!
//! A run directory `{output_dir}/{name}/` holds:
//! - `backtest.parquet`, `backtest.csv` — the priced tick-level table
//! - `fitting_stats.csv`, `fitting_stats.json` — per-day diagnostics
//! - `summary.json`, `daily_summary.csv` — aggregates
//! - `config.toml` — the effective configuration
//! - `manifest.json` — schema version, fingerprint, counts, timestamp
//! - `report.md` — human-readable summary
//!
//! The manifest carries a `schema_version`; newer versions are rejected on load.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use ticklab_core::domain::{BacktestTable, FitStatus, FittingStats};

use crate::runner::{RunArtifacts, SCHEMA_VERSION};
use crate::summary::{DailySummary, SummaryRecord};

/// Index of a run directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub schema_version: u32,
    pub name: String,
    pub config_fingerprint: String,
    pub input_rows: usize,
    pub table_rows: usize,
    pub evaluation_days: usize,
    pub fitted_days: usize,
    pub failed_days: usize,
    pub n_trades: usize,
    pub created_at: NaiveDateTime,
}

impl RunManifest {
    pub fn from_artifacts(artifacts: &RunArtifacts) -> Self {
        Self {
            schema_version: artifacts.schema_version,
            name: artifacts.config.name.clone(),
            config_fingerprint: artifacts.config_fingerprint.clone(),
            input_rows: artifacts.input_rows,
            table_rows: artifacts.table.len(),
            evaluation_days: artifacts.fitting_stats.len(),
            fitted_days: artifacts.fitted_days(),
            failed_days: artifacts.failed_days(),
            n_trades: artifacts.summary.n_trades,
            created_at: chrono::Local::now().naive_local(),
        }
    }
}

// ─── Tables ─────────────────────────────────────────────────────────

/// The priced table as a dataframe.
///
/// Feature columns are the union across days; a day that selected a
/// different variant has NaN in the others. `response_name` names the
/// realized response column.
pub fn backtest_dataframe(table: &BacktestTable, response_name: &str) -> Result<DataFrame> {
    let rows = &table.rows;
    let epoch = chrono::NaiveDate::default();
    let f64_col = |name: &str, f: &dyn Fn(usize) -> f64| -> Column {
        Column::new(name.into(), (0..rows.len()).map(f).collect::<Vec<f64>>())
    };

    let dts: Vec<Option<i64>> = rows
        .iter()
        .map(|r| r.tick.dt.map(|dt| dt.and_utc().timestamp_millis()))
        .collect();
    let dates: Vec<i32> = rows
        .iter()
        .map(|r| (r.date() - epoch).num_days() as i32)
        .collect();

    let mut columns = vec![
        Column::new("dt".into(), dts).cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?,
        Column::new("date".into(), dates).cast(&DataType::Date)?,
        Column::new(
            "second".into(),
            rows.iter().map(|r| r.second()).collect::<Vec<u32>>(),
        ),
        f64_col("price", &|i| rows[i].tick.price),
        f64_col("qty", &|i| rows[i].tick.qty),
        f64_col("volume", &|i| rows[i].tick.volume),
        f64_col("open_interest", &|i| rows[i].tick.open_interest),
        f64_col("b1", &|i| rows[i].tick.b1),
        f64_col("b1_size", &|i| rows[i].tick.b1_size),
        f64_col("s1", &|i| rows[i].tick.s1),
        f64_col("s1_size", &|i| rows[i].tick.s1_size),
        f64_col("mid", &|i| rows[i].tick.mid),
    ];
    for name in table.feature_names() {
        columns.push(f64_col(name.as_str(), &|i| {
            rows[i].features.get(&name).copied().unwrap_or(f64::NAN)
        }));
    }
    columns.extend([
        f64_col(response_name, &|i| rows[i].response),
        f64_col("alpha", &|i| rows[i].alpha),
        Column::new(
            "trade".into(),
            rows.iter()
                .map(|r| i32::from(r.trade.as_i8()))
                .collect::<Vec<i32>>(),
        ),
        Column::new(
            "matched_close_second".into(),
            rows.iter()
                .map(|r| r.matched_close_second)
                .collect::<Vec<Option<u32>>>(),
        ),
        f64_col("open_price", &|i| rows[i].open_price),
        Column::new(
            "close_price".into(),
            rows.iter()
                .map(|r| r.close_price)
                .collect::<Vec<Option<f64>>>(),
        ),
        f64_col("pnl", &|i| rows[i].pnl),
        f64_col("transaction_fee", &|i| rows[i].transaction_fee),
        f64_col("net_pnl", &|i| rows[i].net_pnl),
    ]);

    DataFrame::new(columns).context("failed to assemble backtest dataframe")
}

/// Per-day diagnostics as CSV. Vector fields are `;`-joined in coefficient order.
pub fn export_fitting_stats_csv(stats: &[FittingStats]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "date",
        "status",
        "features",
        "beta",
        "tstat",
        "pvalue",
        "rsq",
        "mse",
        "df_1",
        "df_2",
        "n_obs",
        "pred_corr",
        "pred_mse",
        "error",
    ])?;

    for s in stats {
        let (status, error) = match &s.status {
            FitStatus::Fitted => ("fitted".to_string(), String::new()),
            FitStatus::Failed { kind, reason } => (format!("failed:{kind}"), reason.clone()),
        };
        wtr.write_record([
            &s.date.to_string(),
            &status,
            &s.features.join(";"),
            &join_floats(&s.beta),
            &join_floats(&s.tstat),
            &join_floats(&s.pvalue),
            &s.rsq.to_string(),
            &s.mse.to_string(),
            &s.df_1.map(|v| v.to_string()).unwrap_or_default(),
            &s.df_2.map(|v| v.to_string()).unwrap_or_default(),
            &s.n_obs.to_string(),
            &s.pred_corr.to_string(),
            &s.pred_mse.to_string(),
            &error,
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn export_daily_summary_csv(daily: &[DailySummary]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for day in daily {
        wtr.serialize(day)?;
    }
    if daily.is_empty() {
        wtr.write_record(["date", "pnl", "transaction_fee", "net_pnl", "n_trades"])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

fn join_floats(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(";")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set under `{output_dir}/{name}/`, replacing files
/// from an earlier run of the same name. Returns the run directory.
pub fn save_artifacts(artifacts: &RunArtifacts, output_dir: &Path) -> Result<PathBuf> {
    let run_dir = output_dir.join(&artifacts.config.name);
    fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    let mut df = backtest_dataframe(&artifacts.table, &artifacts.config.target_column())?;
    write_frame(&mut df, &run_dir.join("backtest.parquet"), Format::Parquet)?;
    write_frame(&mut df, &run_dir.join("backtest.csv"), Format::Csv)?;

    write(
        &run_dir.join("fitting_stats.csv"),
        export_fitting_stats_csv(&artifacts.fitting_stats)?,
    )?;
    write(
        &run_dir.join("fitting_stats.json"),
        serde_json::to_string_pretty(&artifacts.fitting_stats)?,
    )?;
    write(
        &run_dir.join("summary.json"),
        serde_json::to_string_pretty(&artifacts.summary)?,
    )?;
    write(
        &run_dir.join("daily_summary.csv"),
        export_daily_summary_csv(&artifacts.daily_summary)?,
    )?;
    write(&run_dir.join("config.toml"), artifacts.config.to_toml()?)?;
    write(
        &run_dir.join("manifest.json"),
        serde_json::to_string_pretty(&RunManifest::from_artifacts(artifacts))?,
    )?;
    write(&run_dir.join("report.md"), generate_report(artifacts))?;

    info!(dir = %run_dir.display(), "artifacts saved");
    Ok(run_dir)
}

/// Load a run manifest, rejecting unknown schema versions.
pub fn load_manifest(dir: &Path) -> Result<RunManifest> {
    let path = dir.join("manifest.json");
    let json =
        fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
    let manifest: RunManifest =
        serde_json::from_str(&json).context("failed to deserialize run manifest")?;
    if manifest.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            manifest.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(manifest)
}

/// Load a saved summary record.
pub fn load_summary(dir: &Path) -> Result<SummaryRecord> {
    let path = dir.join("summary.json");
    let json =
        fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&json).context("failed to deserialize summary")
}

enum Format {
    Parquet,
    Csv,
}

fn write_frame(df: &mut DataFrame, path: &Path, format: Format) -> Result<()> {
    let file = fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    match format {
        Format::Parquet => {
            ParquetWriter::new(file).finish(df)?;
        }
        Format::Csv => {
            CsvWriter::new(file).include_header(true).finish(df)?;
        }
    }
    Ok(())
}

fn write(path: &Path, contents: String) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

// ─── Markdown report ────────────────────────────────────────────────

/// Markdown report for a single run.
pub fn generate_report(artifacts: &RunArtifacts) -> String {
    let s = &artifacts.summary;
    let c = &artifacts.config;
    let mut md = String::with_capacity(2048);

    md.push_str(&format!("# Backtest Report: {}\n\n", c.name));

    md.push_str("## Setup\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Features | {} |\n", c.feature_column.join(", ")));
    md.push_str(&format!("| Target | {} |\n", c.target_column()));
    md.push_str(&format!("| Training Period | {} days |\n", s.training_period));
    md.push_str(&format!("| Holding Period | {} s |\n", s.holding_period));
    md.push_str(&format!(
        "| Thresholds | [{}, {}] |\n",
        c.lower_threshold(),
        c.upper_threshold()
    ));
    md.push_str(&format!(
        "| Close Policy | {} |\n",
        if c.dynamic_unwinding {
            format!(
                "dynamic unwind [{}, {}] ticks",
                s.unwinding_tick_move_lower_bound, s.unwinding_tick_move_upper_bound
            )
        } else {
            "fixed horizon".to_string()
        }
    ));
    md.push_str(&format!("| Pricing | {} |\n", if s.use_mid { "mid" } else { "cross spread" }));
    md.push_str(&format!("| Config Fingerprint | {} |\n", artifacts.config_fingerprint));
    md.push('\n');

    md.push_str("## Fitting\n\n");
    md.push_str(&format!(
        "{} evaluation days, {} fitted, {} failed.\n\n",
        artifacts.fitting_stats.len(),
        artifacts.fitted_days(),
        artifacts.failed_days()
    ));

    md.push_str("## Performance Summary\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Trades | {} |\n", s.n_trades));
    md.push_str(&format!("| Trading Days | {} |\n", s.n_trading_days));
    md.push_str(&format!("| Trades / Day | {:.1} |\n", s.n_trades_per_day));
    md.push_str(&format!("| Win Rate | {:.1}% |\n", s.winning_rate * 100.0));
    md.push_str(&format!("| Net Win Rate | {:.1}% |\n", s.net_winning_rate * 100.0));
    md.push_str(&format!("| Total PnL | {:.2} |\n", s.total_pnl));
    md.push_str(&format!("| Total Net PnL | {:.2} |\n", s.total_net_pnl));
    md.push_str(&format!("| Avg PnL / Trade | {} |\n", opt(s.avg_pnl_per_trade)));
    md.push_str(&format!(
        "| Avg Net PnL / Trade | {} |\n",
        opt(s.avg_net_pnl_per_trade)
    ));
    md.push_str(&format!("| Avg Net PnL / Day | {:.2} |\n", s.avg_net_pnl_per_day));
    md.push_str(&format!("| Corr(alpha, PnL) | {} |\n", opt(s.corr_alpha_pnl)));
    md.push_str(&format!(
        "| Corr(alpha, net PnL) | {} |\n",
        opt(s.corr_alpha_net_pnl)
    ));
    md.push('\n');

    md
}

fn opt(v: Option<f64>) -> String {
    v.map(|v| format!("{v:.4}")).unwrap_or_else(|| "n/a".into())
}
