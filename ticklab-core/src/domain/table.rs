//! Backtest table — the tick-level prediction table that trade decisions and
//! position matching extend column by column.

use std::collections::BTreeMap;
use std::ops::Range;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::tick::{DaySlice, Tick};

/// Discrete trade decision for a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeSignal {
    Sell,
    #[default]
    Flat,
    Buy,
}

impl TradeSignal {
    /// -1, 0 or +1.
    pub fn as_i8(self) -> i8 {
        match self {
            TradeSignal::Sell => -1,
            TradeSignal::Flat => 0,
            TradeSignal::Buy => 1,
        }
    }

    pub fn direction(self) -> f64 {
        f64::from(self.as_i8())
    }

    pub fn is_flat(self) -> bool {
        self == TradeSignal::Flat
    }
}

/// One evaluation tick with its prediction, decision and realized outcome.
///
/// Columns after `alpha` are filled by later pipeline stages and keep their
/// defaults until then.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestRow {
    pub tick: Tick,
    /// Selected feature values after same-day median imputation.
    pub features: BTreeMap<String, f64>,
    /// Realized forward response (the fit target).
    pub response: f64,
    /// Model prediction.
    pub alpha: f64,
    pub trade: TradeSignal,
    /// Intraday second of the tick the position is closed on.
    pub matched_close_second: Option<u32>,
    pub open_price: f64,
    pub close_price: Option<f64>,
    pub pnl: f64,
    pub transaction_fee: f64,
    pub net_pnl: f64,
}

impl BacktestRow {
    pub fn new(tick: Tick, features: BTreeMap<String, f64>, response: f64, alpha: f64) -> Self {
        Self {
            tick,
            features,
            response,
            alpha,
            trade: TradeSignal::Flat,
            matched_close_second: None,
            open_price: 0.0,
            close_price: None,
            pnl: 0.0,
            transaction_fee: 0.0,
            net_pnl: 0.0,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.tick.date
    }

    pub fn second(&self) -> u32 {
        self.tick.second
    }
}

/// Rows across all evaluated days, ordered by `(date, second)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BacktestTable {
    pub rows: Vec<BacktestRow>,
}

impl BacktestTable {
    pub fn new(rows: Vec<BacktestRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Contiguous row ranges per date.
    pub fn days(&self) -> Vec<DaySlice> {
        let mut days: Vec<DaySlice> = Vec::new();
        for (i, row) in self.rows.iter().enumerate() {
            match days.last_mut() {
                Some(day) if day.date == row.date() => day.rows.end = i + 1,
                _ => days.push(DaySlice {
                    date: row.date(),
                    rows: i..i + 1,
                }),
            }
        }
        days
    }

    /// Rows with a nonzero trade.
    pub fn trades(&self) -> impl Iterator<Item = &BacktestRow> {
        self.rows.iter().filter(|r| !r.trade.is_flat())
    }

    /// Union of feature column names across all rows.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .rows
            .iter()
            .flat_map(|r| r.features.keys().cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn day_rows(&self, range: Range<usize>) -> &[BacktestRow] {
        &self.rows[range]
    }
}
