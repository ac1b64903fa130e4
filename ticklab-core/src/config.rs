//! Backtest configuration.
//!
//! Loaded from TOML. Every field is required; `validate()` runs before any
//! day is processed and `validate_against()` checks the columns the run will
//! read against the loaded dataset.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::columns;
use crate::domain::TickFrame;
use crate::numeric::WinsorizeSpec;

/// Fatal configuration problems. Abort the run before any day is processed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("failed to serialize config: {0}")]
    Serialize(String),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("no {field} entry for feature '{feature}'")]
    MissingWinsorize {
        field: &'static str,
        feature: String,
    },

    #[error("column '{0}' required by the config is not in the dataset")]
    UnknownColumn(String),
}

/// Complete, immutable configuration of one backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BacktestConfig {
    /// Run name; artifacts are written under a directory of this name.
    pub name: String,
    /// Base name of the forward response, e.g. `tick_move`.
    pub response_column: String,
    /// Logical predictors; one horizon variant of each is selected per day.
    pub feature_column: Vec<String>,
    /// Candidate lookback horizons (seconds) for every predictor.
    pub feature_freq: Vec<u32>,
    pub response_winsorize_prob: f64,
    pub response_winsorize_bound: f64,
    /// Number of trailing trading days in each training window.
    pub training_period: usize,
    /// Seconds a position is held under the fixed-horizon policy; also picks
    /// the response horizon.
    pub holding_period: u32,
    /// `[lower, upper]` alpha bands: sell below lower, buy above upper.
    pub trade_trigger_threshold: [f64; 2],
    pub start_second: u32,
    pub end_second: u32,
    /// Price both legs at mid instead of crossing the spread.
    pub use_mid: bool,
    pub dynamic_unwinding: bool,
    pub unwinding_tick_move_upper_bound: f64,
    pub unwinding_tick_move_lower_bound: f64,
    pub tick_size: f64,
    /// Per-side fee as a fraction of price.
    pub transaction_fee: f64,
    /// Quantile clipping probability per raw feature name.
    pub feature_winsorize_prob: BTreeMap<String, f64>,
    /// Absolute clipping bound per raw feature name.
    pub feature_winsorize_bound: BTreeMap<String, f64>,
}

impl BacktestConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Deterministic content hash of the configuration.
    pub fn fingerprint(&self) -> Result<String, ConfigError> {
        let json =
            serde_json::to_string(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }

    /// The forward response column used as fit and evaluation target.
    pub fn target_column(&self) -> String {
        columns::target_column(&self.response_column, self.holding_period)
    }

    pub fn lower_threshold(&self) -> f64 {
        self.trade_trigger_threshold[0]
    }

    pub fn upper_threshold(&self) -> f64 {
        self.trade_trigger_threshold[1]
    }

    /// Clipping parameters for a raw feature name.
    ///
    /// Callers go through `validate()` first, so a missing entry means the
    /// name did not come from `feature_column`.
    pub fn feature_winsorize(&self, raw_feature: &str) -> Result<WinsorizeSpec, ConfigError> {
        let prob = self
            .feature_winsorize_prob
            .get(raw_feature)
            .ok_or_else(|| ConfigError::MissingWinsorize {
                field: "feature_winsorize_prob",
                feature: raw_feature.to_string(),
            })?;
        let bound = self
            .feature_winsorize_bound
            .get(raw_feature)
            .ok_or_else(|| ConfigError::MissingWinsorize {
                field: "feature_winsorize_bound",
                feature: raw_feature.to_string(),
            })?;
        Ok(WinsorizeSpec::new(*prob, *bound))
    }

    pub fn response_winsorize(&self) -> WinsorizeSpec {
        WinsorizeSpec::new(self.response_winsorize_prob, self.response_winsorize_bound)
    }

    /// Check field values. Does not look at data.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return invalid("name", "must not be empty");
        }
        if self.response_column.trim().is_empty() {
            return invalid("response_column", "must not be empty");
        }
        if self.feature_column.is_empty() {
            return invalid("feature_column", "at least one feature is required");
        }
        if self.feature_freq.is_empty() {
            return invalid("feature_freq", "at least one horizon is required");
        }
        if self.training_period == 0 {
            return invalid("training_period", "must be at least one day");
        }
        for feature in &self.feature_column {
            let spec = self.feature_winsorize(feature)?;
            check_winsorize(spec, "feature_winsorize_prob", "feature_winsorize_bound")?;
        }
        check_winsorize(
            self.response_winsorize(),
            "response_winsorize_prob",
            "response_winsorize_bound",
        )?;

        let [lower, upper] = self.trade_trigger_threshold;
        if lower.is_nan() || upper.is_nan() || lower > upper {
            return invalid(
                "trade_trigger_threshold",
                format!("need lower <= upper, got [{lower}, {upper}]"),
            );
        }
        if self.start_second > self.end_second {
            return invalid(
                "start_second",
                format!(
                    "start {} is after end {}",
                    self.start_second, self.end_second
                ),
            );
        }
        if !(self.tick_size > 0.0) || !self.tick_size.is_finite() {
            return invalid("tick_size", format!("must be positive, got {}", self.tick_size));
        }
        if !(self.transaction_fee >= 0.0) || !self.transaction_fee.is_finite() {
            return invalid(
                "transaction_fee",
                format!("must be non-negative, got {}", self.transaction_fee),
            );
        }
        let (lo, hi) = (
            self.unwinding_tick_move_lower_bound,
            self.unwinding_tick_move_upper_bound,
        );
        if lo.is_nan() || hi.is_nan() || lo > hi {
            return invalid(
                "unwinding_tick_move_lower_bound",
                format!("need lower <= upper, got [{lo}, {hi}]"),
            );
        }
        Ok(())
    }

    /// Check that every column the run reads exists in `frame`.
    pub fn validate_against(&self, frame: &TickFrame) -> Result<(), ConfigError> {
        let target = self.target_column();
        if !frame.has_column(&target) {
            return Err(ConfigError::UnknownColumn(target));
        }
        for feature in &self.feature_column {
            for variant in columns::feature_variants(feature, &self.feature_freq) {
                if !frame.has_column(&variant) {
                    return Err(ConfigError::UnknownColumn(variant));
                }
            }
        }
        for response in
            columns::response_variants(&self.response_column, &self.feature_freq, self.holding_period)
        {
            if !frame.has_column(&response) {
                return Err(ConfigError::UnknownColumn(response));
            }
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> Result<(), ConfigError> {
    Err(ConfigError::Invalid {
        field,
        reason: reason.into(),
    })
}

fn check_winsorize(
    spec: WinsorizeSpec,
    prob_field: &'static str,
    bound_field: &'static str,
) -> Result<(), ConfigError> {
    if !(0.0..0.5).contains(&spec.prob) {
        return invalid(prob_field, format!("must be in [0, 0.5), got {}", spec.prob));
    }
    if !(spec.bound > 0.0) {
        return invalid(bound_field, format!("must be positive, got {}", spec.bound));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub const SAMPLE_TOML: &str = include_str!("../tests/fixtures/oir_60.toml");

    pub fn sample_config() -> BacktestConfig {
        BacktestConfig::from_toml(SAMPLE_TOML).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn parses_and_validates() {
        let config = sample_config();
        config.validate().unwrap();
        assert_eq!(config.target_column(), "tick_move_0_30");
        assert_eq!(config.upper_threshold(), 0.5);
        let spec = config.feature_winsorize("order_imbalance_ratio").unwrap();
        assert_eq!(spec.prob, 0.01);
        assert!(spec.bound.is_infinite());
    }

    #[test]
    fn missing_field_is_rejected() {
        let toml_str = SAMPLE_TOML.replace("tick_size = 5.0\n", "");
        assert!(matches!(
            BacktestConfig::from_toml(&toml_str),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let toml_str = format!("extra = 1\n{SAMPLE_TOML}");
        assert!(BacktestConfig::from_toml(&toml_str).is_err());
    }

    #[test]
    fn negative_holding_period_does_not_parse() {
        let toml_str = SAMPLE_TOML.replace("holding_period = 30", "holding_period = -30");
        assert!(BacktestConfig::from_toml(&toml_str).is_err());
    }

    #[test]
    fn missing_winsorize_entry() {
        let mut config = sample_config();
        config.feature_column.push("order_flow_imbalance".into());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingWinsorize { .. })
        ));
    }

    #[test]
    fn inverted_thresholds() {
        let mut config = sample_config();
        config.trade_trigger_threshold = [1.0, -1.0];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "trade_trigger_threshold",
                ..
            })
        ));
    }

    #[test]
    fn bad_probability() {
        let mut config = sample_config();
        config.response_winsorize_prob = 0.5;
        assert!(config.validate().is_err());
        config.response_winsorize_prob = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_tick_size() {
        let mut config = sample_config();
        config.tick_size = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn fingerprint_is_deterministic_and_sensitive() {
        let a = sample_config();
        let mut b = a.clone();
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
        b.holding_period = 60;
        assert_ne!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
    }

    #[test]
    fn toml_roundtrip() {
        let config = sample_config();
        let text = config.to_toml().unwrap();
        let back = BacktestConfig::from_toml(&text).unwrap();
        assert_eq!(config, back);
    }
}
