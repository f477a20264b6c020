//! Block bootstrap Monte Carlo — simulated equity and drawdown paths.
//!
//! Each run repeatedly draws a contiguous cluster of historical returns at a
//! uniformly random start and compounds it onto the running equity until
//! `periods` points exist. Runs are independent and evaluated on the rayon
//! pool; each run seeds its own RNG from the master seed, so output does not
//! depend on the thread count.

use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use tradelens_core::rng::RngHierarchy;

use crate::metrics::{mean_f64, percentile_sorted, sort_f64, Stat, StatFormat};
use crate::settings::MonteCarloSettings;

const RNG_STREAM: &str = "monte_carlo";

/// Percentiles reported for each period.
pub const BAND_PERCENTILES: [f64; 5] = [5.0, 25.0, 50.0, 75.0, 95.0];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MonteCarloError {
    #[error("cluster size must be at least 1")]
    ClusterTooSmall,

    #[error("cluster size {cluster_size} exceeds the {periods} simulated periods")]
    ClusterExceedsPeriods { cluster_size: usize, periods: usize },

    #[error("cluster size {cluster_size} exceeds the {available} historical returns")]
    ClusterExceedsReturns { cluster_size: usize, available: usize },

    #[error("sampling without replacement needs {periods} returns, only {available} available")]
    InsufficientReturns { periods: usize, available: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapConfig {
    pub periods: usize,
    pub runs: usize,
    pub cluster_size: usize,
    pub with_replacement: bool,
    pub seed: u64,
    pub start_value: f64,
}

impl BootstrapConfig {
    pub fn from_settings(settings: &MonteCarloSettings, start_value: f64) -> Self {
        Self {
            periods: settings.periods,
            runs: settings.runs,
            cluster_size: settings.cluster_size,
            with_replacement: settings.with_replacement,
            seed: settings.seed,
            start_value,
        }
    }

    fn check(&self, available: usize) -> Result<(), MonteCarloError> {
        let cluster_size = self.cluster_size;
        if cluster_size < 1 {
            return Err(MonteCarloError::ClusterTooSmall);
        }
        if cluster_size > self.periods {
            return Err(MonteCarloError::ClusterExceedsPeriods {
                cluster_size,
                periods: self.periods,
            });
        }
        if cluster_size > available {
            return Err(MonteCarloError::ClusterExceedsReturns {
                cluster_size,
                available,
            });
        }
        if !self.with_replacement && self.periods > available {
            return Err(MonteCarloError::InsufficientReturns {
                periods: self.periods,
                available,
            });
        }
        Ok(())
    }
}

/// `runs` equity curves and their drawdown curves, each `periods + 1` long.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulatedPaths {
    pub equity: Vec<Vec<f64>>,
    pub drawdown: Vec<Vec<f64>>,
}

/// Block bootstrap over `returns`. Fails without output when a precondition is violated.
pub fn bootstrap(config: &BootstrapConfig, returns: &[f64]) -> Result<SimulatedPaths, MonteCarloError> {
    config.check(returns.len())?;
    debug!(
        runs = config.runs,
        periods = config.periods,
        cluster_size = config.cluster_size,
        with_replacement = config.with_replacement,
        "running block bootstrap"
    );

    let hierarchy = RngHierarchy::new(config.seed);
    let equity: Vec<Vec<f64>> = (0..config.runs)
        .into_par_iter()
        .map(|run| simulate_run(config, returns, &hierarchy, run as u64))
        .collect();
    let drawdown = equity.iter().map(|path| drawdown_path(path)).collect();
    Ok(SimulatedPaths { equity, drawdown })
}

fn simulate_run(
    config: &BootstrapConfig,
    returns: &[f64],
    hierarchy: &RngHierarchy,
    run: u64,
) -> Vec<f64> {
    let mut rng = hierarchy.rng_for(RNG_STREAM, run);
    let target = config.periods + 1;
    let mut path = Vec::with_capacity(target);
    path.push(config.start_value);

    let mut pool = if config.with_replacement {
        Vec::new()
    } else {
        returns.to_vec()
    };

    while path.len() < target {
        let block: Vec<f64> = if config.with_replacement {
            let start = rng.gen_range(0..=returns.len() - config.cluster_size);
            returns[start..start + config.cluster_size].to_vec()
        } else {
            // periods <= returns.len() guarantees the pool covers every point still needed
            let take = config.cluster_size.min(pool.len());
            let start = rng.gen_range(0..=pool.len() - take);
            pool.drain(start..start + take).collect()
        };
        for r in block {
            if path.len() == target {
                break;
            }
            let last = path[path.len() - 1];
            path.push(last * (1.0 + r));
        }
    }
    path
}

/// `equity / running_peak - 1` along a path.
pub fn drawdown_path(equity: &[f64]) -> Vec<f64> {
    let mut peak = f64::MIN;
    equity
        .iter()
        .map(|&e| {
            peak = peak.max(e);
            if peak > 0.0 {
                (e / peak - 1.0).min(0.0)
            } else {
                0.0
            }
        })
        .collect()
}

/// Cross-run percentiles at one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentileBand {
    pub period: usize,
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
}

/// Sort each period's values across runs and read off `BAND_PERCENTILES`.
pub fn percentile_bands(paths: &[Vec<f64>]) -> Vec<PercentileBand> {
    let periods = paths.iter().map(Vec::len).min().unwrap_or(0);
    (0..periods)
        .map(|period| {
            let mut column: Vec<f64> = paths.iter().map(|p| p[period]).collect();
            sort_f64(&mut column);
            let [p5, p25, p50, p75, p95] = BAND_PERCENTILES.map(|p| percentile_sorted(&column, p));
            PercentileBand {
                period,
                p5,
                p25,
                p50,
                p75,
                p95,
            }
        })
        .collect()
}

/// Distribution of ending returns and maximum drawdowns across runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloSummary {
    pub runs: usize,
    pub periods: usize,
    pub mean_return: Option<f64>,
    pub median_return: Option<f64>,
    pub p5_return: Option<f64>,
    pub p95_return: Option<f64>,
    pub median_max_drawdown: Option<f64>,
    /// Max drawdown exceeded by only 5% of runs.
    pub p5_max_drawdown: Option<f64>,
    pub probability_of_loss: Option<f64>,
}

impl MonteCarloSummary {
    pub fn from_paths(paths: &SimulatedPaths, periods: usize) -> Self {
        let runs = paths.equity.len();
        if runs == 0 {
            return Self {
                periods,
                ..Self::default()
            };
        }
        let mut ending: Vec<f64> = paths
            .equity
            .iter()
            .filter_map(|p| match (p.first(), p.last()) {
                (Some(first), Some(last)) if *first > 0.0 => Some(last / first - 1.0),
                _ => None,
            })
            .collect();
        let mut max_dd: Vec<f64> = paths
            .drawdown
            .iter()
            .map(|p| p.iter().copied().fold(0.0, f64::min))
            .collect();
        sort_f64(&mut ending);
        sort_f64(&mut max_dd);

        let some_if = |values: &[f64], p: f64| (!values.is_empty()).then(|| percentile_sorted(values, p));
        Self {
            runs,
            periods,
            mean_return: (!ending.is_empty()).then(|| mean_f64(&ending)),
            median_return: some_if(&ending, 50.0),
            p5_return: some_if(&ending, 5.0),
            p95_return: some_if(&ending, 95.0),
            median_max_drawdown: some_if(&max_dd, 50.0),
            p5_max_drawdown: some_if(&max_dd, 5.0),
            probability_of_loss: (!ending.is_empty())
                .then(|| ending.iter().filter(|r| **r < 0.0).count() as f64 / ending.len() as f64),
        }
    }

    pub fn entries(&self) -> Vec<Stat> {
        use StatFormat::*;
        vec![
            Stat::new("Runs", Some(self.runs as f64), Count),
            Stat::new("Periods", Some(self.periods as f64), Count),
            Stat::new("Mean Ending Return", self.mean_return, Percent),
            Stat::new("Median Ending Return", self.median_return, Percent),
            Stat::new("5th Percentile Ending Return", self.p5_return, Percent),
            Stat::new("95th Percentile Ending Return", self.p95_return, Percent),
            Stat::new("Median Max Drawdown", self.median_max_drawdown, Percent),
            Stat::new("5th Percentile Max Drawdown", self.p5_max_drawdown, Percent),
            Stat::new("Probability of Loss", self.probability_of_loss, Percent),
        ]
    }
}

/// Everything the report needs from one Monte Carlo study.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloResult {
    pub equity_bands: Vec<PercentileBand>,
    pub drawdown_bands: Vec<PercentileBand>,
    pub summary: MonteCarloSummary,
}

pub fn run_monte_carlo(config: &BootstrapConfig, returns: &[f64]) -> Result<MonteCarloResult, MonteCarloError> {
    let paths = bootstrap(config, returns)?;
    Ok(MonteCarloResult {
        equity_bands: percentile_bands(&paths.equity),
        drawdown_bands: percentile_bands(&paths.drawdown),
        summary: MonteCarloSummary::from_paths(&paths, config.periods),
    })
}
