//! TradeLens Core — domain types, market data, equity curves and the portfolio simulation.
//!
//! This crate contains the heart of the analytics engine:
//! - Domain types (trades, orders, cash and fx transactions, instruments, snapshots)
//! - Date-ordered time series with forward-only cursors
//! - Bulk market data acquisition with prior-position fallback
//! - `EquityCurve` with compounding equity and drawdown tracking
//! - Day-driven `PortfolioTracker` with the capital-cutoff rule and per-trade trackers
//! - Deterministic RNG hierarchy for resampling

pub mod data;
pub mod domain;
pub mod engine;
pub mod equity_curve;
pub mod rng;
pub mod series;

pub use equity_curve::{CurveError, CurvePoint, DrawdownEpisode, EquityCurve, PeriodReturn};
