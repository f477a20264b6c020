//! TradeTracker — per-trade cumulative return path and excursions.
//!
//! Each trade gets a private position book so its P&L and capital are measured in
//! isolation. The cumulative return on any day is cumulative net P&L divided by
//! the largest capital the trade has used so far.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::config::SimulationConfig;
use super::position::PositionBook;
use crate::data::MarketData;
use crate::domain::{CashTransaction, FxTransaction, Instrument, Order, StrategyId, TagId, Trade, TradeId};

/// Final state of a tracked trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeResult {
    pub trade_id: TradeId,
    pub name: String,
    pub strategy_id: Option<StrategyId>,
    pub tags: BTreeSet<TagId>,
    pub open: bool,
    /// Cumulative return at the last tracked day.
    pub ret: f64,
    /// Maximum adverse excursion, zero or negative.
    pub mae: f64,
    /// Maximum favorable excursion, zero or positive.
    pub mfe: f64,
    /// Cumulative net P&L in base currency.
    pub pnl: f64,
    pub unrealized_pnl: f64,
    pub unrealized_pnl_long: f64,
    pub unrealized_pnl_short: f64,
    pub peak_capital: f64,
    pub holding_days: i64,
    pub path: Vec<(NaiveDate, f64)>,
}

#[derive(Debug, Clone)]
pub struct TradeTracker {
    trade: Trade,
    book: PositionBook,
    first_date: Option<NaiveDate>,
    close_date: Option<NaiveDate>,
    cumulative_pnl: f64,
    peak_capital: f64,
    path: Vec<(NaiveDate, f64)>,
    mae: f64,
    mfe: f64,
}

impl TradeTracker {
    pub fn new(trade: Trade) -> Self {
        let dates = trade.event_dates();
        let first_date = dates.iter().next().copied();
        let close_date = if trade.open {
            None
        } else {
            dates.iter().next_back().copied()
        };
        Self {
            trade,
            book: PositionBook::new(),
            first_date,
            close_date,
            cumulative_pnl: 0.0,
            peak_capital: 0.0,
            path: Vec::new(),
            mae: 0.0,
            mfe: 0.0,
        }
    }

    pub fn trade(&self) -> &Trade {
        &self.trade
    }

    /// True between the first event and the close date, inclusive.
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        match self.first_date {
            Some(first) if date >= first => self.close_date.map_or(true, |c| date <= c),
            _ => false,
        }
    }

    pub fn begin_day(&mut self) {
        self.book.begin_day();
    }

    pub fn apply_order(&mut self, order: &Order, instrument: Option<&Instrument>, config: &SimulationConfig) {
        self.book.apply_order(order, instrument, config);
    }

    pub fn apply_cash(&mut self, tx: &CashTransaction) {
        self.book.apply_cash(tx);
    }

    pub fn apply_fx(&mut self, fx: &FxTransaction, config: &SimulationConfig) {
        self.book.apply_fx(fx, config);
    }

    /// Mark the trade's positions. Returns today's cumulative return when active.
    pub fn on_day_close(
        &mut self,
        date: NaiveDate,
        market: &MarketData,
        config: &SimulationConfig,
    ) -> Option<f64> {
        if !self.is_active_on(date) {
            return None;
        }
        let day = self.book.close_day(market, config);
        self.cumulative_pnl += day.net_pnl;
        self.peak_capital = self.peak_capital.max(day.capital());

        let ret = if self.peak_capital > 0.0 {
            self.cumulative_pnl / self.peak_capital
        } else {
            0.0
        };
        self.mae = self.mae.min(ret);
        self.mfe = self.mfe.max(ret);
        self.path.push((date, ret));
        Some(ret)
    }

    pub fn current_return(&self) -> f64 {
        self.path.last().map_or(0.0, |(_, r)| *r)
    }

    pub fn result(&self, as_of: NaiveDate) -> TradeResult {
        let (long, short) = self.book.unrealized_split();
        let end = self.close_date.unwrap_or(as_of);
        TradeResult {
            trade_id: self.trade.id,
            name: self.trade.name.clone(),
            strategy_id: self.trade.strategy_id,
            tags: self.trade.tags.clone(),
            open: self.trade.open,
            ret: self.current_return(),
            mae: self.mae,
            mfe: self.mfe,
            pnl: self.cumulative_pnl,
            unrealized_pnl: long + short,
            unrealized_pnl_long: long,
            unrealized_pnl_short: short,
            peak_capital: self.peak_capital,
            holding_days: self
                .first_date
                .map_or(0, |first| (end - first).num_days().max(0)),
            path: self.path.clone(),
        }
    }
}
