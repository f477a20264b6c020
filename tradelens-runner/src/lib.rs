//! TradeLens Runner — report orchestration, performance statistics, Monte Carlo, scaling.
//!
//! This crate builds on `tradelens-core` to provide:
//! - TOML report settings with validation
//! - Trade selection by strategy, tag, date range and open/closed status
//! - Equity-curve and trade statistics (Sharpe, Sortino, K-ratio, MAR, Ulcer, SQN)
//! - Value at risk, expected shortfall and return distribution shape
//! - Block-bootstrap Monte Carlo projection with percentile bands
//! - Strategy correlation and classical multidimensional scaling
//! - Benchmark and backtest comparison
//! - The report generator and its CSV/JSON/Markdown export

pub mod benchmark;
pub mod correlation;
pub mod mds;
pub mod metrics;
pub mod monte_carlo;
pub mod report;
pub mod selection;
pub mod settings;
pub mod tail_metrics;

pub use benchmark::{BacktestComparison, BacktestSeries, BenchmarkStats};
pub use correlation::CorrelationMatrix;
pub use mds::MdsError;
pub use metrics::{EquityCurveStats, Stat, StatFormat, TradeStatistics};
pub use monte_carlo::{
    bootstrap, run_monte_carlo, BootstrapConfig, MonteCarloError, MonteCarloResult,
    MonteCarloSummary, PercentileBand, SimulatedPaths,
};
pub use report::{
    LogProgress, ProgressSink, Report, ReportError, ReportGenerator, ReportInput, ReportTable,
};
pub use selection::TradeFilter;
pub use settings::{ReportSettings, ReturnBasis, SettingsError};
pub use tail_metrics::{TailMetrics, VarLevel};
