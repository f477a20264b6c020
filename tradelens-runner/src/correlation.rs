//! Pearson correlation of dated return series over their common dates.

use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::mds::correlation_distance;
use crate::metrics::mean_f64;

/// Minimum common observations for a correlation to be reported.
pub const MIN_COMMON_OBSERVATIONS: usize = 3;

/// Values of two date-ascending series on the dates both contain.
pub fn align_on_dates(a: &[(NaiveDate, f64)], b: &[(NaiveDate, f64)]) -> (Vec<f64>, Vec<f64>) {
    let (mut xs, mut ys) = (Vec::new(), Vec::new());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                xs.push(a[i].1);
                ys.push(b[j].1);
                i += 1;
                j += 1;
            }
        }
    }
    (xs, ys)
}

/// Sample Pearson correlation. `None` for short input or a constant series.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < MIN_COMMON_OBSERVATIONS {
        return None;
    }
    let (mx, my) = (mean_f64(xs), mean_f64(ys));
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let (dx, dy) = (x - mx, y - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    let denom = (sxx * syy).sqrt();
    if denom < 1e-15 {
        return None;
    }
    Some((sxy / denom).clamp(-1.0, 1.0))
}

pub fn dated_correlation(a: &[(NaiveDate, f64)], b: &[(NaiveDate, f64)]) -> Option<f64> {
    let (xs, ys) = align_on_dates(a, b);
    pearson(&xs, &ys)
}

/// Symmetric matrix of pairwise correlations with a unit diagonal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub names: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn compute(series: &[(String, Vec<(NaiveDate, f64)>)]) -> Self {
        let n = series.len();
        let mut values = vec![vec![None; n]; n];
        for i in 0..n {
            values[i][i] = Some(1.0);
            for j in (i + 1)..n {
                let rho = dated_correlation(&series[i].1, &series[j].1);
                values[i][j] = rho;
                values[j][i] = rho;
            }
        }
        Self {
            names: series.iter().map(|(name, _)| name.clone()).collect(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// `sqrt(2 * (1 - rho))` per pair; undefined correlations count as zero.
    pub fn distances(&self) -> Vec<Vec<f64>> {
        self.values
            .iter()
            .map(|row| row.iter().map(|rho| correlation_distance(rho.unwrap_or(0.0))).collect())
            .collect()
    }
}
