//! Portfolio simulation engine — day-by-day replay of trade events.
//!
//! Each report scope (the whole portfolio and every strategy) gets its own
//! `PortfolioTracker`. A tracker owns its positions, its per-trade trackers and
//! its equity curves. The day loop in `simulation` drives all trackers in lock
//! step over a shared, read-only `MarketData`.

pub mod capital;
pub mod config;
pub mod ledger;
pub mod portfolio_tracker;
pub mod position;
pub mod simulation;
pub mod trade_tracker;

use chrono::NaiveDate;
use thiserror::Error;

use crate::equity_curve::CurveError;

pub use capital::CapitalLedger;
pub use config::SimulationConfig;
pub use ledger::{DayEvents, EventLedger};
pub use portfolio_tracker::{
    CapitalUsage, CurveKind, CurveSet, DaySnapshot, InstrumentPnl, PortfolioTracker,
    TrackerResult, TrackerScope,
};
pub use position::{BookDay, Position, PositionBook, PositionKey, PositionMark};
pub use simulation::{run_simulation, simulation_dates, SimulationOutcome};
pub use trade_tracker::{TradeResult, TradeTracker};

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("no equity summaries: cannot compute returns without a capital denominator")]
    NoCapitalData,

    #[error("day {date} is not after the last processed day {last}")]
    OutOfOrder { date: NaiveDate, last: NaiveDate },

    #[error("day {date} is still open")]
    DayAlreadyOpen { date: NaiveDate },

    #[error("day {date} was closed without being opened")]
    DayNotOpen { date: NaiveDate },

    #[error(transparent)]
    Curve(#[from] CurveError),
}
