//! End-to-end pipeline: walk-forward → trade decisions → position matching →
//! summaries.

use serde::{Deserialize, Serialize};
use tracing::info;

use ticklab_core::config::BacktestConfig;
use ticklab_core::domain::{BacktestTable, FittingStats, TickFrame};

use crate::decision::trade;
use crate::matcher::pnl_with;
use crate::summary::{daily_summary, summary, DailySummary, SummaryRecord};
use crate::walk_forward::{backtest_with, BacktestError, WalkForwardOptions};

/// Current artifact schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Everything one run produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunArtifacts {
    pub schema_version: u32,
    pub config: BacktestConfig,
    pub config_fingerprint: String,
    /// Rows in the input frame.
    pub input_rows: usize,
    pub table: BacktestTable,
    pub fitting_stats: Vec<FittingStats>,
    pub summary: SummaryRecord,
    pub daily_summary: Vec<DailySummary>,
}

impl RunArtifacts {
    pub fn fitted_days(&self) -> usize {
        self.fitting_stats.iter().filter(|s| s.is_fitted()).count()
    }

    pub fn failed_days(&self) -> usize {
        self.fitting_stats.len() - self.fitted_days()
    }
}

/// Run every stage on an in-memory frame.
pub fn run_pipeline(
    frame: &TickFrame,
    config: &BacktestConfig,
    options: WalkForwardOptions,
) -> Result<RunArtifacts, BacktestError> {
    let config_fingerprint = config.fingerprint()?;
    let (table, fitting_stats) = backtest_with(frame, config, options)?;
    let table = trade(table, config);
    let table = pnl_with(table, config, options)?;
    let summary = summary(&table, config);
    let daily_summary = daily_summary(&table);

    info!(
        run = %config.name,
        n_trades = summary.n_trades,
        total_pnl = summary.total_pnl,
        total_net_pnl = summary.total_net_pnl,
        "pipeline complete"
    );

    Ok(RunArtifacts {
        schema_version: SCHEMA_VERSION,
        config: config.clone(),
        config_fingerprint,
        input_rows: frame.len(),
        table,
        fitting_stats,
        summary,
        daily_summary,
    })
}
