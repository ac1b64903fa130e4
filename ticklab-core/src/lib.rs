//! TickLab Core — tick-level domain types, configuration, numeric utilities,
//! feature selection and model fitting.
//!
//! This crate contains everything a single evaluation day needs:
//! - Tick frame and backtest table types
//! - Column naming convention for feature and response horizons
//! - Backtest configuration with startup validation
//! - Winsorization, correlation, descriptive statistics, Student-t
//! - Correlation-ranked feature selection and no-intercept OLS
//! - Parquet/CSV ingestion and a deterministic synthetic generator

pub mod columns;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod model;
pub mod numeric;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything shared across walk-forward workers is
    /// Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::TickFrame>();
        require_sync::<domain::TickFrame>();
        require_send::<domain::FrameView<'static>>();
        require_sync::<domain::FrameView<'static>>();
        require_send::<domain::BacktestRow>();
        require_sync::<domain::BacktestRow>();
        require_send::<domain::FittingStats>();
        require_sync::<domain::FittingStats>();

        require_send::<config::BacktestConfig>();
        require_sync::<config::BacktestConfig>();
        require_send::<model::ModelSpec>();
        require_sync::<model::ModelSpec>();
        require_send::<model::FittedModel>();
        require_sync::<model::FittedModel>();

        require_send::<error::FitError>();
        require_sync::<error::FitError>();
    }
}
