//! Domain types: ticks, the annotated tick frame, the backtest table, and
//! per-day fitting diagnostics.

pub mod stats;
pub mod table;
pub mod tick;

pub use stats::{FitStatus, FittingStats};
pub use table::{BacktestRow, BacktestTable, TradeSignal};
pub use tick::{DaySlice, FrameView, Tick, TickFrame};
