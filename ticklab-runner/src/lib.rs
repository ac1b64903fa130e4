//! TickLab Runner — walk-forward orchestration and everything downstream of
//! the model.
//!
//! This crate builds on `ticklab-core` to provide:
//! - The day-by-day walk-forward driver (parallel across evaluation days)
//! - Threshold trade decisions with a trading-hours filter
//! - Position matching under fixed-horizon and dynamic-unwind close policies
//! - Whole-sample and per-day summaries
//! - Artifact export (Parquet, CSV, JSON, Markdown) with a versioned manifest

pub mod decision;
pub mod export;
pub mod matcher;
pub mod runner;
pub mod summary;
pub mod walk_forward;

pub use decision::{decide, trade};
pub use export::{generate_report, load_manifest, load_summary, save_artifacts, RunManifest};
pub use matcher::{pnl, pnl_with, ClosePolicy};
pub use runner::{run_pipeline, RunArtifacts, SCHEMA_VERSION};
pub use summary::{daily_summary, summary, DailySummary, SummaryRecord};
pub use walk_forward::{backtest, backtest_with, BacktestError, WalkForwardOptions};
