//! Position matching: find the close tick of every opened position and price
//! both legs.
//!
//! Two policies, chosen by `dynamic_unwinding`:
//! - Fixed horizon: the first tick of the same date at or after
//!   `second + holding_period`, clamped to the date's last tick.
//! - Dynamic unwind: the first later tick of the same date whose mid has
//!   moved at least the upper bound or at most the lower bound (in ticks),
//!   else the date's last tick. Flat rows get no close.
//!
//! Close-leg prices come from the first row of the date carrying the matched
//! second, so duplicate seconds resolve deterministically.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use ticklab_core::config::BacktestConfig;
use ticklab_core::domain::{BacktestRow, BacktestTable, TradeSignal};
use ticklab_core::error::ConsistencyError;

use crate::walk_forward::{BacktestError, WalkForwardOptions};

/// How an open position finds its close tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ClosePolicy {
    FixedHorizon {
        holding_period: u32,
    },
    DynamicUnwind {
        upper_ticks: f64,
        lower_ticks: f64,
        tick_size: f64,
    },
}

impl ClosePolicy {
    pub fn from_config(config: &BacktestConfig) -> Self {
        if config.dynamic_unwinding {
            ClosePolicy::DynamicUnwind {
                upper_ticks: config.unwinding_tick_move_upper_bound,
                lower_ticks: config.unwinding_tick_move_lower_bound,
                tick_size: config.tick_size,
            }
        } else {
            ClosePolicy::FixedHorizon {
                holding_period: config.holding_period,
            }
        }
    }
}

// ─── Close index search ──────────────────────────────────────────────

/// Fixed-horizon close index for every row of one date.
///
/// `seconds` must be ascending. Each index points at the first row whose
/// second is `>= seconds[i] + holding_period`, or the last row.
pub fn fixed_close_indices(seconds: &[u32], holding_period: u32) -> Vec<usize> {
    let Some(last) = seconds.len().checked_sub(1) else {
        return Vec::new();
    };
    seconds
        .iter()
        .map(|&s| {
            let target = s.saturating_add(holding_period);
            seconds.partition_point(|&x| x < target).min(last)
        })
        .collect()
}

/// Dynamic-unwind close index for every traded row of one date.
///
/// Scans forward from the row after the open with early exit. A traded row
/// with the same open mid as the previous traded row reuses that row's close
/// when the close still lies ahead, since no breach can occur in between.
pub fn dynamic_close_indices(
    mids: &[f64],
    trades: &[TradeSignal],
    upper_ticks: f64,
    lower_ticks: f64,
    tick_size: f64,
) -> Vec<Option<usize>> {
    let Some(last) = mids.len().checked_sub(1) else {
        return Vec::new();
    };
    let mut out = vec![None; mids.len()];
    let mut previous: Option<(f64, usize)> = None;

    for i in 0..mids.len() {
        if trades[i].is_flat() {
            continue;
        }
        let open = mids[i];
        let close = match previous {
            Some((mid, close)) if mid == open && close > i => close,
            _ => (i + 1..mids.len())
                .find(|&j| {
                    let moved = (mids[j] - open) / tick_size;
                    moved >= upper_ticks || moved <= lower_ticks
                })
                .unwrap_or(last),
        };
        out[i] = Some(close);
        previous = Some((open, close));
    }
    out
}

// ─── Pricing ─────────────────────────────────────────────────────────

/// Open price: mid, or cross the spread (offer for buys, bid for sells).
/// Flat rows open at 0 when crossing the spread.
pub fn open_price(row: &BacktestRow, use_mid: bool) -> f64 {
    if use_mid {
        return row.tick.mid;
    }
    match row.trade {
        TradeSignal::Buy => row.tick.s1,
        TradeSignal::Sell => row.tick.b1,
        TradeSignal::Flat => 0.0,
    }
}

/// Close price read off the matched close row: mid, or bid for buys and
/// offer for sells.
pub fn close_price(trade: TradeSignal, close_row: &BacktestRow, use_mid: bool) -> f64 {
    if use_mid {
        return close_row.tick.mid;
    }
    match trade {
        TradeSignal::Buy => close_row.tick.b1,
        TradeSignal::Sell => close_row.tick.s1,
        TradeSignal::Flat => 0.0,
    }
}

// ─── Table pass ──────────────────────────────────────────────────────

/// Match closes and compute PnL with default options.
pub fn pnl(table: BacktestTable, config: &BacktestConfig) -> Result<BacktestTable, BacktestError> {
    pnl_with(table, config, WalkForwardOptions::default())
}

/// Fill `matched_close_second`, prices, `pnl`, `transaction_fee` and
/// `net_pnl`. Dates are matched independently.
///
/// Fails if rows are not ordered by `(date, second)`.
pub fn pnl_with(
    mut table: BacktestTable,
    config: &BacktestConfig,
    options: WalkForwardOptions,
) -> Result<BacktestTable, BacktestError> {
    check_order(&table.rows)?;
    let policy = ClosePolicy::from_config(config);
    let days = table.days();

    let match_day = |rows: &[BacktestRow]| match_rows(rows, policy);
    let closes: Vec<Vec<Option<usize>>> = if options.parallel {
        days.par_iter()
            .map(|d| match_day(&table.rows[d.rows.clone()]))
            .collect()
    } else {
        days.iter()
            .map(|d| match_day(&table.rows[d.rows.clone()]))
            .collect()
    };

    for (day, day_closes) in days.iter().zip(closes) {
        let rows = &mut table.rows[day.rows.clone()];
        let legs: Vec<Option<(u32, f64)>> = rows
            .iter()
            .zip(&day_closes)
            .map(|(row, close)| {
                close.map(|j| {
                    let second = rows[j].second();
                    let first = rows.partition_point(|r| r.second() < second);
                    (second, close_price(row.trade, &rows[first], config.use_mid))
                })
            })
            .collect();

        for (row, leg) in rows.iter_mut().zip(legs) {
            row.open_price = open_price(row, config.use_mid);
            row.matched_close_second = leg.map(|(second, _)| second);
            row.close_price = leg.map(|(_, price)| price);
            settle(row, config.transaction_fee);
        }
    }

    debug!(
        rows = table.len(),
        dates = days.len(),
        ?policy,
        "positions matched"
    );
    Ok(table)
}

fn match_rows(rows: &[BacktestRow], policy: ClosePolicy) -> Vec<Option<usize>> {
    match policy {
        ClosePolicy::FixedHorizon { holding_period } => {
            let seconds: Vec<u32> = rows.iter().map(|r| r.second()).collect();
            fixed_close_indices(&seconds, holding_period)
                .into_iter()
                .map(Some)
                .collect()
        }
        ClosePolicy::DynamicUnwind {
            upper_ticks,
            lower_ticks,
            tick_size,
        } => {
            let mids: Vec<f64> = rows.iter().map(|r| r.tick.mid).collect();
            let trades: Vec<TradeSignal> = rows.iter().map(|r| r.trade).collect();
            dynamic_close_indices(&mids, &trades, upper_ticks, lower_ticks, tick_size)
        }
    }
}

/// PnL for a row whose prices are set. Flat rows settle to zero.
fn settle(row: &mut BacktestRow, fee_rate: f64) {
    match (row.trade, row.close_price) {
        (TradeSignal::Flat, _) | (_, None) => {
            row.pnl = 0.0;
            row.transaction_fee = 0.0;
        }
        (trade, Some(close)) => {
            let direction = trade.direction();
            row.pnl = direction * (close - row.open_price);
            row.transaction_fee = fee_rate * direction.abs() * (row.open_price + close);
        }
    }
    row.net_pnl = row.pnl - row.transaction_fee;
}

fn check_order(rows: &[BacktestRow]) -> Result<(), ConsistencyError> {
    for (i, pair) in rows.windows(2).enumerate() {
        let (prev, cur) = (&pair[0], &pair[1]);
        if cur.date() < prev.date() {
            return Err(ConsistencyError::DatesOutOfOrder {
                row: i + 1,
                previous: prev.date(),
                current: cur.date(),
            });
        }
        if cur.date() == prev.date() && cur.second() < prev.second() {
            return Err(ConsistencyError::SecondsOutOfOrder {
                row: i + 1,
                date: cur.date(),
                previous: prev.second(),
                current: cur.second(),
            });
        }
    }
    Ok(())
}
