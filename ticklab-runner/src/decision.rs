//! Trade decisions: alpha threshold bands plus a trading-hours filter.

use tracing::debug;

use ticklab_core::config::BacktestConfig;
use ticklab_core::domain::{BacktestTable, TradeSignal};

/// Decision for a single tick.
///
/// Buy above the upper band, sell below the lower band, flat otherwise and
/// always flat outside `[start_second, end_second]`. NaN alpha is flat.
pub fn decide(alpha: f64, second: u32, config: &BacktestConfig) -> TradeSignal {
    if second < config.start_second || second > config.end_second {
        return TradeSignal::Flat;
    }
    if alpha > config.upper_threshold() {
        TradeSignal::Buy
    } else if alpha < config.lower_threshold() {
        TradeSignal::Sell
    } else {
        TradeSignal::Flat
    }
}

/// Fill the `trade` column of every row.
pub fn trade(mut table: BacktestTable, config: &BacktestConfig) -> BacktestTable {
    for row in &mut table.rows {
        row.trade = decide(row.alpha, row.second(), config);
    }
    debug!(
        rows = table.len(),
        trades = table.trades().count(),
        "trade decisions"
    );
    table
}
