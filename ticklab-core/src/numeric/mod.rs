//! Pure numeric utilities: winsorization, correlation, descriptive
//! statistics, and the t-distribution.

pub mod correlation;
pub mod descriptive;
pub mod distribution;
pub mod winsorize;

pub use correlation::{cross_correlation, pearson, CorrMatrix};
pub use descriptive::{mean, median, nan_mean, safe_divide, std_dev};
pub use distribution::{t_cdf, two_sided_p_value};
pub use winsorize::{winsorize, WinsorizeSpec};
