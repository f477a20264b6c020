//! PortfolioTracker — day-driven capital and P&L simulation for one scope.
//!
//! Protocol per day, strictly in ascending date order:
//!
//! 1. The caller advances shared `MarketData` cursors to the day.
//! 2. `process_items_at(date)` applies the day's orders, cash and fx transactions.
//! 3. `on_day_close(date, market, prev_total_capital)` marks positions, appends one
//!    point to every curve and records an immutable `DaySnapshot`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::config::SimulationConfig;
use super::ledger::EventLedger;
use super::position::{PositionBook, PositionKey, PositionMark};
use super::trade_tracker::{TradeResult, TradeTracker};
use super::TrackerError;
use crate::data::MarketData;
use crate::domain::{Instrument, InstrumentId, StrategyId, Trade, TradeId};
use crate::equity_curve::{CurveError, EquityCurve};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackerScope {
    Total,
    Strategy(StrategyId),
}

/// Which of a tracker's curves to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurveKind {
    RoacNet,
    RoacGross,
    RoacLong,
    RoacShort,
    RotcNet,
    DollarNet,
    DollarGross,
    DollarLong,
    DollarShort,
}

/// The nine curves every tracker maintains. All start at the initial total capital.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveSet {
    pub roac: EquityCurve,
    pub roac_gross: EquityCurve,
    pub roac_long: EquityCurve,
    pub roac_short: EquityCurve,
    pub rotc: EquityCurve,
    pub dollar: EquityCurve,
    pub dollar_gross: EquityCurve,
    pub dollar_long: EquityCurve,
    pub dollar_short: EquityCurve,
}

impl CurveSet {
    pub fn new(start_value: f64, start_date: NaiveDate) -> Self {
        let c = EquityCurve::new(start_value, start_date);
        Self {
            roac: c.clone(),
            roac_gross: c.clone(),
            roac_long: c.clone(),
            roac_short: c.clone(),
            rotc: c.clone(),
            dollar: c.clone(),
            dollar_gross: c.clone(),
            dollar_long: c.clone(),
            dollar_short: c,
        }
    }

    pub fn get(&self, kind: CurveKind) -> &EquityCurve {
        match kind {
            CurveKind::RoacNet => &self.roac,
            CurveKind::RoacGross => &self.roac_gross,
            CurveKind::RoacLong => &self.roac_long,
            CurveKind::RoacShort => &self.roac_short,
            CurveKind::RotcNet => &self.rotc,
            CurveKind::DollarNet => &self.dollar,
            CurveKind::DollarGross => &self.dollar_gross,
            CurveKind::DollarLong => &self.dollar_long,
            CurveKind::DollarShort => &self.dollar_short,
        }
    }

    fn all_mut(&mut self) -> [&mut EquityCurve; 9] {
        [
            &mut self.roac,
            &mut self.roac_gross,
            &mut self.roac_long,
            &mut self.roac_short,
            &mut self.rotc,
            &mut self.dollar,
            &mut self.dollar_gross,
            &mut self.dollar_long,
            &mut self.dollar_short,
        ]
    }

    pub fn calc_final_values(&mut self, as_of: NaiveDate) {
        for curve in self.all_mut() {
            curve.calc_final_values(as_of);
        }
    }
}

/// Capital deployed by a scope on one day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapitalUsage {
    pub date: NaiveDate,
    pub long: f64,
    pub short: f64,
    pub gross: f64,
    pub net: f64,
    /// Account capital at the end of the previous day.
    pub total_capital: f64,
}

/// State of a scope after one closed day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySnapshot {
    pub date: NaiveDate,
    pub capital: CapitalUsage,
    pub gross_pnl: f64,
    pub net_pnl: f64,
    pub pnl_long: f64,
    pub pnl_short: f64,
    pub commissions: f64,
    pub roac: f64,
    pub rotc: f64,
    pub positions: Vec<PositionMark>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentPnl {
    pub key: PositionKey,
    pub realized: f64,
    pub unrealized: f64,
}

impl InstrumentPnl {
    pub fn total(&self) -> f64 {
        self.realized + self.unrealized
    }
}

/// Everything a tracker produced over a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerResult {
    pub name: String,
    pub scope: TrackerScope,
    pub curves: CurveSet,
    pub capital_usage: Vec<CapitalUsage>,
    pub snapshots: Vec<DaySnapshot>,
    pub instrument_pnl: Vec<InstrumentPnl>,
    pub trades: Vec<TradeResult>,
}

#[derive(Debug, Clone)]
pub struct PortfolioTracker {
    name: String,
    scope: TrackerScope,
    config: Arc<SimulationConfig>,
    instruments: Arc<HashMap<InstrumentId, Instrument>>,
    ledger: EventLedger,
    book: PositionBook,
    trade_trackers: BTreeMap<TradeId, TradeTracker>,
    curves: CurveSet,
    snapshots: Vec<DaySnapshot>,
    realized_closed: BTreeMap<PositionKey, f64>,
    open_day: Option<NaiveDate>,
    last_closed: Option<NaiveDate>,
}

impl PortfolioTracker {
    pub fn new(
        name: impl Into<String>,
        scope: TrackerScope,
        trades: Vec<Trade>,
        instruments: Arc<HashMap<InstrumentId, Instrument>>,
        config: Arc<SimulationConfig>,
        start_capital: f64,
        start_date: NaiveDate,
    ) -> Self {
        let ledger = EventLedger::from_trades(&trades);
        let trade_trackers = trades
            .into_iter()
            .map(|t| (t.id, TradeTracker::new(t)))
            .collect();
        Self {
            name: name.into(),
            scope,
            config,
            instruments,
            ledger,
            book: PositionBook::new(),
            trade_trackers,
            curves: CurveSet::new(start_capital, start_date),
            snapshots: Vec::new(),
            realized_closed: BTreeMap::new(),
            open_day: None,
            last_closed: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> TrackerScope {
        self.scope
    }

    pub fn ledger(&self) -> &EventLedger {
        &self.ledger
    }

    pub fn curves(&self) -> &CurveSet {
        &self.curves
    }

    pub fn last_snapshot(&self) -> Option<&DaySnapshot> {
        self.snapshots.last()
    }

    /// Apply every event dated `date`.
    pub fn process_items_at(&mut self, date: NaiveDate) -> Result<(), TrackerError> {
        if let Some(open) = self.open_day {
            return Err(TrackerError::DayAlreadyOpen { date: open });
        }
        if let Some(last) = self.last_closed {
            if date <= last {
                return Err(TrackerError::OutOfOrder { date, last });
            }
        }
        self.open_day = Some(date);

        self.book.begin_day();
        for tracker in self.trade_trackers.values_mut() {
            if tracker.is_active_on(date) {
                tracker.begin_day();
            }
        }

        let Some(events) = self.ledger.events_on(date) else {
            return Ok(());
        };
        let config = &*self.config;
        for (trade_id, order) in &events.orders {
            let instrument = self.instruments.get(&order.instrument_id);
            self.book.apply_order(order, instrument, config);
            if let Some(tracker) = self.trade_trackers.get_mut(trade_id) {
                tracker.apply_order(order, instrument, config);
            }
        }
        for (trade_id, tx) in &events.cash {
            self.book.apply_cash(tx);
            if let Some(tracker) = self.trade_trackers.get_mut(trade_id) {
                tracker.apply_cash(tx);
            }
        }
        for (trade_id, fx) in &events.fx {
            self.book.apply_fx(fx, config);
            if let Some(tracker) = self.trade_trackers.get_mut(trade_id) {
                tracker.apply_fx(fx, config);
            }
        }
        Ok(())
    }

    /// Mark positions and append today's point to every curve.
    pub fn on_day_close(
        &mut self,
        date: NaiveDate,
        market: &MarketData,
        prev_total_capital: f64,
    ) -> Result<&DaySnapshot, TrackerError> {
        if self.open_day != Some(date) {
            return Err(TrackerError::DayNotOpen { date });
        }

        let config = &*self.config;
        let day = self.book.close_day(market, config);
        for (key, realized) in &day.closed_positions {
            *self.realized_closed.entry(key.clone()).or_insert(0.0) += realized;
        }
        for tracker in self.trade_trackers.values_mut() {
            tracker.on_day_close(date, market, config);
        }

        let capital = day.capital();
        let roac = safe_ratio(day.net_pnl, capital);
        let rotc = safe_ratio(day.net_pnl, prev_total_capital);
        self.append_curves(date, &day, roac, rotc)?;

        let usage = CapitalUsage {
            date,
            long: day.capital_long,
            short: day.capital_short,
            gross: capital,
            net: day.capital_long - day.capital_short,
            total_capital: prev_total_capital,
        };
        self.snapshots.push(DaySnapshot {
            date,
            capital: usage,
            gross_pnl: day.gross_pnl,
            net_pnl: day.net_pnl,
            pnl_long: day.pnl_long,
            pnl_short: day.pnl_short,
            commissions: day.commissions,
            roac,
            rotc,
            positions: self.book.marks(prev_total_capital),
        });
        self.open_day = None;
        self.last_closed = Some(date);

        // just pushed
        Ok(&self.snapshots[self.snapshots.len() - 1])
    }

    fn append_curves(
        &mut self,
        date: NaiveDate,
        day: &super::position::BookDay,
        roac: f64,
        rotc: f64,
    ) -> Result<(), CurveError> {
        let c = &mut self.curves;
        c.roac.add_return(roac, date)?;
        c.roac_gross.add_return(safe_ratio(day.gross_pnl, day.capital()), date)?;
        c.roac_long.add_return(safe_ratio(day.pnl_long, day.capital_long), date)?;
        c.roac_short.add_return(safe_ratio(day.pnl_short, day.capital_short), date)?;
        c.rotc.add_return(rotc, date)?;
        c.dollar.add_change(day.net_pnl, date)?;
        c.dollar_gross.add_change(day.gross_pnl, date)?;
        c.dollar_long.add_change(day.pnl_long, date)?;
        c.dollar_short.add_change(day.pnl_short, date)?;
        Ok(())
    }

    /// Finalize curves and collect per-trade and per-instrument results.
    pub fn finish(mut self, as_of: NaiveDate) -> TrackerResult {
        self.curves.calc_final_values(as_of);

        let mut by_key = self.realized_closed.clone();
        let mut unrealized: BTreeMap<PositionKey, f64> = BTreeMap::new();
        for pos in self.book.positions() {
            *by_key.entry(pos.key().clone()).or_insert(0.0) += pos.realized_pnl();
            *unrealized.entry(pos.key().clone()).or_insert(0.0) += pos.unrealized_pnl();
        }
        let instrument_pnl = by_key
            .into_iter()
            .map(|(key, realized)| {
                let unrealized = unrealized.get(&key).copied().unwrap_or(0.0);
                InstrumentPnl {
                    key,
                    realized,
                    unrealized,
                }
            })
            .collect();

        let trades = self
            .trade_trackers
            .values()
            .map(|t| t.result(as_of))
            .collect();
        let capital_usage = self.snapshots.iter().map(|s| s.capital).collect();

        TrackerResult {
            name: self.name,
            scope: self.scope,
            curves: self.curves,
            capital_usage,
            snapshots: self.snapshots,
            instrument_pnl,
            trades,
        }
    }
}

fn safe_ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}
