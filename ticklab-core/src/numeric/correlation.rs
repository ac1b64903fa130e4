//! Pearson correlation and cross-correlation matrices between named series.

use serde::{Deserialize, Serialize};

/// Pearson correlation over pairwise-complete observations.
///
/// NaN when fewer than two complete pairs remain or either side has zero variance.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter(|(a, b)| !a.is_nan() && !b.is_nan())
        .map(|(a, b)| (*a, *b))
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in &pairs {
        let dx = a - mean_x;
        let dy = b - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return f64::NAN;
    }
    sxy / (sxx.sqrt() * syy.sqrt())
}

/// Correlations between every row series and every column series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrMatrix {
    pub rows: Vec<String>,
    pub cols: Vec<String>,
    /// `values[i][j]` = corr(rows[i], cols[j]).
    pub values: Vec<Vec<f64>>,
}

impl CorrMatrix {
    pub fn row(&self, name: &str) -> Option<&[f64]> {
        let i = self.rows.iter().position(|r| r == name)?;
        Some(&self.values[i])
    }

    /// Column with the largest finite correlation in row `name`.
    ///
    /// Ties go to the first column; NaN entries are skipped. `None` when the
    /// row is missing or has no finite entry.
    pub fn argmax_in_row(&self, name: &str) -> Option<&str> {
        let row = self.row(name)?;
        let mut best: Option<(usize, f64)> = None;
        for (j, &v) in row.iter().enumerate() {
            if v.is_nan() {
                continue;
            }
            match best {
                Some((_, b)) if v <= b => {}
                _ => best = Some((j, v)),
            }
        }
        best.map(|(j, _)| self.cols[j].as_str())
    }
}

/// Build the cross-correlation matrix between two groups of named series.
pub fn cross_correlation(rows: &[(String, Vec<f64>)], cols: &[(String, Vec<f64>)]) -> CorrMatrix {
    let values = rows
        .iter()
        .map(|(_, r)| cols.iter().map(|(_, c)| pearson(r, c)).collect())
        .collect();
    CorrMatrix {
        rows: rows.iter().map(|(n, _)| n.clone()).collect(),
        cols: cols.iter().map(|(n, _)| n.clone()).collect(),
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_correlation() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [2.0, 4.0, 6.0, 8.0];
        assert!((pearson(&x, &y) - 1.0).abs() < 1e-12);
        let neg: Vec<f64> = y.iter().map(|v| -v).collect();
        assert!((pearson(&x, &neg) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn skips_incomplete_pairs() {
        let x = [1.0, f64::NAN, 3.0, 4.0];
        let y = [1.0, 100.0, 3.0, f64::NAN];
        assert!((pearson(&x, &y) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn degenerate_inputs_are_nan() {
        assert!(pearson(&[1.0], &[2.0]).is_nan());
        assert!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_nan());
    }

    #[test]
    fn argmax_first_occurrence_on_tie() {
        let m = CorrMatrix {
            rows: vec!["r".into()],
            cols: vec!["a".into(), "b".into(), "c".into()],
            values: vec![vec![0.2, 0.7, 0.7]],
        };
        assert_eq!(m.argmax_in_row("r"), Some("b"));
    }

    #[test]
    fn argmax_skips_nan() {
        let m = CorrMatrix {
            rows: vec!["r".into()],
            cols: vec!["a".into(), "b".into()],
            values: vec![vec![f64::NAN, -0.3]],
        };
        assert_eq!(m.argmax_in_row("r"), Some("b"));
        assert_eq!(m.argmax_in_row("missing"), None);

        let all_nan = CorrMatrix {
            rows: vec!["r".into()],
            cols: vec!["a".into()],
            values: vec![vec![f64::NAN]],
        };
        assert_eq!(all_nan.argmax_in_row("r"), None);
    }

    #[test]
    fn cross_matrix_shape() {
        let rows = vec![("y".to_string(), vec![1.0, 2.0, 3.0])];
        let cols = vec![
            ("a".to_string(), vec![1.0, 2.0, 3.0]),
            ("b".to_string(), vec![3.0, 2.0, 1.0]),
        ];
        let m = cross_correlation(&rows, &cols);
        assert_eq!(m.values.len(), 1);
        assert_eq!(m.values[0].len(), 2);
        assert_eq!(m.argmax_in_row("y"), Some("a"));
    }
}
