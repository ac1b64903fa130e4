//! Summary reporting — whole-sample and per-day aggregates over traded rows.
//!
//! Every statistic is a pure function of the rows with a nonzero trade.
//! Statistics that are undefined for the sample (a mean of nothing, a
//! standard deviation of one value, a correlation with zero variance) are
//! `None` rather than NaN.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use ticklab_core::config::BacktestConfig;
use ticklab_core::domain::{BacktestRow, BacktestTable};
use ticklab_core::numeric::{mean, median, pearson, safe_divide, std_dev};

/// Whole-sample statistics plus the config values they were produced with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    // Config echo
    pub training_period: usize,
    /// Upper alpha band.
    pub trade_trigger_threshold: f64,
    pub holding_period: u32,
    pub use_mid: bool,
    pub unwinding_tick_move_upper_bound: f64,
    pub unwinding_tick_move_lower_bound: f64,

    pub n_trades: usize,
    /// Distinct dates with at least one trade.
    pub n_trading_days: usize,
    pub n_trades_per_day: f64,

    pub winning_rate: f64,
    pub losing_rate: f64,
    pub net_winning_rate: f64,
    pub net_losing_rate: f64,

    pub total_pnl: f64,
    pub total_net_pnl: f64,
    pub avg_pnl_per_trade: Option<f64>,
    pub avg_net_pnl_per_trade: Option<f64>,
    pub med_pnl_per_trade: Option<f64>,
    pub med_net_pnl_per_trade: Option<f64>,
    pub std_pnl_per_trade: Option<f64>,
    pub std_net_pnl_per_trade: Option<f64>,

    pub avg_pnl_per_winning_trade: Option<f64>,
    pub avg_pnl_per_losing_trade: Option<f64>,
    pub avg_net_pnl_per_winning_trade: Option<f64>,
    pub avg_net_pnl_per_losing_trade: Option<f64>,

    pub avg_pnl_per_day: f64,
    pub avg_net_pnl_per_day: f64,

    /// Correlation of alpha with raw PnL.
    pub corr_alpha_pnl: Option<f64>,
    /// Correlation of alpha with net PnL.
    pub corr_alpha_net_pnl: Option<f64>,
    /// Legacy net-PnL correlation, which was computed against raw PnL.
    /// Always equal to `corr_alpha_pnl`; kept for report compatibility.
    pub corr_alpha_net_pnl_raw_basis: Option<f64>,
}

/// Per-date aggregates over traded rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub pnl: f64,
    pub transaction_fee: f64,
    pub net_pnl: f64,
    pub n_trades: usize,
}

/// Whole-sample summary of a priced table.
pub fn summary(table: &BacktestTable, config: &BacktestConfig) -> SummaryRecord {
    let trades: Vec<&BacktestRow> = table.trades().collect();
    let n_trades = trades.len();
    let n_trading_days = trading_days(&trades);

    let pnl: Vec<f64> = trades.iter().map(|r| r.pnl).collect();
    let net: Vec<f64> = trades.iter().map(|r| r.net_pnl).collect();
    let alpha: Vec<f64> = trades.iter().map(|r| r.alpha).collect();

    let total_pnl: f64 = pnl.iter().sum();
    let total_net_pnl: f64 = net.iter().sum();
    let corr_alpha_pnl = correlation(&alpha, &pnl);

    SummaryRecord {
        training_period: config.training_period,
        trade_trigger_threshold: config.upper_threshold(),
        holding_period: config.holding_period,
        use_mid: config.use_mid,
        unwinding_tick_move_upper_bound: config.unwinding_tick_move_upper_bound,
        unwinding_tick_move_lower_bound: config.unwinding_tick_move_lower_bound,

        n_trades,
        n_trading_days,
        n_trades_per_day: safe_divide(n_trades as f64, n_trading_days as f64),

        winning_rate: rate(&pnl, |v| v > 0.0),
        losing_rate: rate(&pnl, |v| v < 0.0),
        net_winning_rate: rate(&net, |v| v > 0.0),
        net_losing_rate: rate(&net, |v| v < 0.0),

        total_pnl,
        total_net_pnl,
        avg_pnl_per_trade: mean(&pnl),
        avg_net_pnl_per_trade: mean(&net),
        med_pnl_per_trade: median(&pnl),
        med_net_pnl_per_trade: median(&net),
        std_pnl_per_trade: std_dev(&pnl),
        std_net_pnl_per_trade: std_dev(&net),

        avg_pnl_per_winning_trade: conditional_mean(&pnl, |v| v > 0.0),
        avg_pnl_per_losing_trade: conditional_mean(&pnl, |v| v < 0.0),
        avg_net_pnl_per_winning_trade: conditional_mean(&net, |v| v > 0.0),
        avg_net_pnl_per_losing_trade: conditional_mean(&net, |v| v < 0.0),

        avg_pnl_per_day: safe_divide(total_pnl, n_trading_days as f64),
        avg_net_pnl_per_day: safe_divide(total_net_pnl, n_trading_days as f64),

        corr_alpha_pnl,
        corr_alpha_net_pnl: correlation(&alpha, &net),
        corr_alpha_net_pnl_raw_basis: corr_alpha_pnl,
    }
}

/// Per-date sums of PnL, fees and net PnL plus trade counts, in date order.
/// Dates without trades are omitted.
pub fn daily_summary(table: &BacktestTable) -> Vec<DailySummary> {
    let mut out: Vec<DailySummary> = Vec::new();
    for row in table.trades() {
        match out.last_mut() {
            Some(day) if day.date == row.date() => {
                day.pnl += row.pnl;
                day.transaction_fee += row.transaction_fee;
                day.net_pnl += row.net_pnl;
                day.n_trades += 1;
            }
            _ => out.push(DailySummary {
                date: row.date(),
                pnl: row.pnl,
                transaction_fee: row.transaction_fee,
                net_pnl: row.net_pnl,
                n_trades: 1,
            }),
        }
    }
    out
}

fn trading_days(trades: &[&BacktestRow]) -> usize {
    let mut dates: Vec<NaiveDate> = trades.iter().map(|r| r.date()).collect();
    dates.sort_unstable();
    dates.dedup();
    dates.len()
}

/// Share of values satisfying `pred`; 0 for an empty sample.
fn rate(values: &[f64], pred: impl Fn(f64) -> bool) -> f64 {
    let hits = values.iter().filter(|&&v| pred(v)).count();
    safe_divide(hits as f64, values.len() as f64)
}

fn conditional_mean(values: &[f64], pred: impl Fn(f64) -> bool) -> Option<f64> {
    let selected: Vec<f64> = values.iter().copied().filter(|&v| pred(v)).collect();
    mean(&selected)
}

fn correlation(x: &[f64], y: &[f64]) -> Option<f64> {
    Some(pearson(x, y)).filter(|c| c.is_finite())
}
