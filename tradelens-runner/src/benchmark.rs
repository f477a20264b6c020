//! Comparison against a benchmark instrument and against a backtest equity series.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tradelens_core::domain::Bar;
use tradelens_core::EquityCurve;

use crate::correlation::{align_on_dates, pearson};
use crate::metrics::{mean_f64, std_dev, Stat, StatFormat, PERIODS_PER_YEAR};

/// Close-to-close returns of a bar series, dated at the later bar.
pub fn close_returns(bars: &[Bar]) -> Vec<(NaiveDate, f64)> {
    bars.windows(2)
        .filter(|w| w[0].close > 0.0)
        .map(|w| (w[1].date, w[1].close / w[0].close - 1.0))
        .collect()
}

/// Regression and tracking statistics of portfolio returns against a benchmark.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkStats {
    pub observations: usize,
    pub portfolio_return: Option<f64>,
    pub benchmark_return: Option<f64>,
    pub beta: Option<f64>,
    /// Annualized.
    pub alpha: Option<f64>,
    pub correlation: Option<f64>,
    /// Annualized standard deviation of active returns.
    pub tracking_error: Option<f64>,
    pub information_ratio: Option<f64>,
}

impl BenchmarkStats {
    pub fn compute(portfolio: &[(NaiveDate, f64)], benchmark: &[(NaiveDate, f64)]) -> Self {
        let (p, b) = align_on_dates(portfolio, benchmark);
        let n = p.len();
        if n < 2 {
            return Self {
                observations: n,
                ..Self::default()
            };
        }

        let (mp, mb) = (mean_f64(&p), mean_f64(&b));
        let cov = p.iter().zip(&b).map(|(x, y)| (x - mp) * (y - mb)).sum::<f64>() / (n - 1) as f64;
        let var_b = std_dev(&b).powi(2);
        let beta = (var_b > 1e-18).then(|| cov / var_b);
        let alpha = beta.map(|beta| (mp - beta * mb) * PERIODS_PER_YEAR);

        let active: Vec<f64> = p.iter().zip(&b).map(|(x, y)| x - y).collect();
        let te = std_dev(&active) * PERIODS_PER_YEAR.sqrt();
        let (tracking_error, information_ratio) = if te > 1e-15 {
            (Some(te), Some(mean_f64(&active) * PERIODS_PER_YEAR / te))
        } else {
            (Some(te), None)
        };

        Self {
            observations: n,
            portfolio_return: Some(compound(&p)),
            benchmark_return: Some(compound(&b)),
            beta,
            alpha,
            correlation: pearson(&p, &b),
            tracking_error,
            information_ratio,
        }
    }

    pub fn entries(&self) -> Vec<Stat> {
        use StatFormat::*;
        vec![
            Stat::new("Common Periods", Some(self.observations as f64), Count),
            Stat::new("Portfolio Return", self.portfolio_return, Percent),
            Stat::new("Benchmark Return", self.benchmark_return, Percent),
            Stat::new("Beta", self.beta, Ratio),
            Stat::new("Alpha (annualized)", self.alpha, Percent),
            Stat::new("Correlation", self.correlation, Ratio),
            Stat::new("Tracking Error", self.tracking_error, Percent),
            Stat::new("Information Ratio", self.information_ratio, Ratio),
        ]
    }
}

fn compound(returns: &[f64]) -> f64 {
    returns.iter().map(|r| 1.0 + r).product::<f64>() - 1.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BacktestPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

/// Equity of a simulated (backtested) version of the traded system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSeries {
    pub name: String,
    pub points: Vec<BacktestPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComparisonPoint {
    pub date: NaiveDate,
    pub realized: f64,
    pub backtest: f64,
}

/// Realized and backtest equity on common dates, both normalized to 1.0 at the first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BacktestComparison {
    pub points: Vec<ComparisonPoint>,
    pub return_correlation: Option<f64>,
}

pub fn compare_to_backtest(realized: &EquityCurve, backtest: &BacktestSeries) -> BacktestComparison {
    let realized: Vec<(NaiveDate, f64)> = realized.points().iter().map(|p| (p.date, p.equity)).collect();
    let mut sim: Vec<(NaiveDate, f64)> = backtest.points.iter().map(|p| (p.date, p.equity)).collect();
    sim.sort_by_key(|(date, _)| *date);
    sim.dedup_by_key(|(date, _)| *date);

    let mut common: Vec<(NaiveDate, f64, f64)> = Vec::new();
    let mut j = 0;
    for &(date, r) in &realized {
        while j < sim.len() && sim[j].0 < date {
            j += 1;
        }
        if j < sim.len() && sim[j].0 == date {
            common.push((date, r, sim[j].1));
        }
    }

    let Some(&(_, r0, b0)) = common.first() else {
        return BacktestComparison::default();
    };
    if r0.abs() < f64::EPSILON || b0.abs() < f64::EPSILON {
        return BacktestComparison::default();
    }

    let points: Vec<ComparisonPoint> = common
        .iter()
        .map(|&(date, r, b)| ComparisonPoint {
            date,
            realized: r / r0,
            backtest: b / b0,
        })
        .collect();
    let (realized_returns, backtest_returns): (Vec<f64>, Vec<f64>) = points
        .windows(2)
        .map(|w| (w[1].realized / w[0].realized - 1.0, w[1].backtest / w[0].backtest - 1.0))
        .unzip();
    let return_correlation = pearson(&realized_returns, &backtest_returns);
    BacktestComparison {
        points,
        return_correlation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(n)
    }

    fn series(returns: &[f64]) -> Vec<(NaiveDate, f64)> {
        returns.iter().enumerate().map(|(i, r)| (d(i as i64 + 1), *r)).collect()
    }

    #[test]
    fn close_returns_from_bars() {
        let bars = vec![Bar::flat(d(0), 100.0), Bar::flat(d(1), 110.0), Bar::flat(d(2), 99.0)];
        let r = close_returns(&bars);
        assert_eq!(r.len(), 2);
        assert_eq!(r[0].0, d(1));
        assert!((r[0].1 - 0.1).abs() < 1e-12);
        assert!((r[1].1 + 0.1).abs() < 1e-12);
    }

    #[test]
    fn leveraged_benchmark_has_beta_two() {
        let bench = series(&[0.01, -0.02, 0.015, 0.0, -0.005, 0.02]);
        let port: Vec<_> = bench.iter().map(|(d, r)| (*d, 2.0 * r)).collect();
        let stats = BenchmarkStats::compute(&port, &bench);
        assert_eq!(stats.observations, 6);
        assert!((stats.beta.unwrap() - 2.0).abs() < 1e-12);
        assert!(stats.alpha.unwrap().abs() < 1e-12);
        assert!((stats.correlation.unwrap() - 1.0).abs() < 1e-12);
        assert!(stats.tracking_error.unwrap() > 0.0);
    }

    #[test]
    fn identical_series_have_zero_tracking_error() {
        let bench = series(&[0.01, -0.02, 0.015]);
        let stats = BenchmarkStats::compute(&bench, &bench);
        assert_eq!(stats.tracking_error, Some(0.0));
        assert_eq!(stats.information_ratio, None);
    }

    #[test]
    fn too_few_common_dates() {
        let stats = BenchmarkStats::compute(&series(&[0.01]), &series(&[0.02]));
        assert_eq!(stats.observations, 1);
        assert_eq!(stats.beta, None);
    }

    #[test]
    fn backtest_comparison_normalizes_on_common_dates() {
        let curve = EquityCurve::from_returns(
            1_000.0,
            d(0),
            vec![(d(1), 0.1), (d(2), -0.05), (d(3), 0.02)],
        )
        .unwrap();
        let backtest = BacktestSeries {
            name: "model".into(),
            points: vec![
                BacktestPoint { date: d(3), equity: 60.0 },
                BacktestPoint { date: d(1), equity: 50.0 },
                BacktestPoint { date: d(2), equity: 55.0 },
                BacktestPoint { date: d(9), equity: 70.0 },
            ],
        };
        let cmp = compare_to_backtest(&curve, &backtest);
        assert_eq!(cmp.points.len(), 3);
        assert_eq!(cmp.points[0].date, d(1));
        assert_eq!(cmp.points[0].realized, 1.0);
        assert_eq!(cmp.points[0].backtest, 1.0);
        assert!((cmp.points[1].backtest - 1.1).abs() < 1e-12);
        assert!((cmp.points[1].realized - 0.95).abs() < 1e-12);
    }

    #[test]
    fn backtest_without_overlap_is_empty() {
        let curve = EquityCurve::new(1_000.0, d(0));
        let backtest = BacktestSeries {
            name: "model".into(),
            points: vec![BacktestPoint { date: d(5), equity: 1.0 }],
        };
        assert_eq!(compare_to_backtest(&curve, &backtest), BacktestComparison::default());
    }
}
