//! Trade — a user-defined grouping of orders, cash and fx transactions.

use std::collections::{BTreeSet, HashMap};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::cash::{CashTransaction, FxTransaction};
use super::cost::AverageCost;
use super::ids::{InstrumentId, StrategyId, TagId, TradeId};
use super::order::Order;

const QTY_EPSILON: f64 = 1e-9;

#[derive(Debug, Error, PartialEq)]
pub enum TradeError {
    #[error("trade {trade} cannot be closed: instrument {instrument} nets to {quantity}")]
    NotClosable {
        trade: TradeId,
        instrument: InstrumentId,
        quantity: f64,
    },
}

/// Derived money fields, all in base currency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeStats {
    // ── Realized ──
    pub realized_pnl: f64,
    pub realized_pnl_long: f64,
    pub realized_pnl_short: f64,
    /// Dividends, interest, taxes and fees.
    pub cash_pnl: f64,
    pub commissions: f64,

    // ── Unrealized (filled by the simulation for open trades) ──
    pub unrealized_pnl: f64,
    pub unrealized_pnl_long: f64,
    pub unrealized_pnl_short: f64,

    // ── Capital usage ──
    pub capital_long: f64,
    pub capital_short: f64,
    pub capital_net: f64,
    pub capital_total: f64,
}

impl TradeStats {
    /// Total result: realized + unrealized + cash, net of commissions.
    pub fn total_result(&self) -> f64 {
        self.realized_pnl + self.unrealized_pnl + self.cash_pnl - self.commissions
    }

    pub fn total_result_long(&self) -> f64 {
        self.realized_pnl_long + self.unrealized_pnl_long
    }

    pub fn total_result_short(&self) -> f64 {
        self.realized_pnl_short + self.unrealized_pnl_short
    }

    pub fn total_result_pct(&self) -> f64 {
        ratio(self.total_result(), self.capital_total)
    }

    pub fn result_pct_long(&self) -> f64 {
        ratio(self.total_result_long(), self.capital_long)
    }

    pub fn result_pct_short(&self) -> f64 {
        ratio(self.total_result_short(), self.capital_short)
    }
}

fn ratio(num: f64, den: f64) -> f64 {
    if den.abs() < f64::EPSILON {
        0.0
    } else {
        num / den
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub name: String,
    #[serde(default)]
    pub strategy_id: Option<StrategyId>,
    pub open: bool,
    #[serde(default)]
    pub tags: BTreeSet<TagId>,
    #[serde(default)]
    pub orders: Vec<Order>,
    #[serde(default)]
    pub cash_transactions: Vec<CashTransaction>,
    #[serde(default)]
    pub fx_transactions: Vec<FxTransaction>,
    #[serde(default)]
    pub date_opened: Option<NaiveDateTime>,
    #[serde(default)]
    pub date_closed: Option<NaiveDateTime>,
    #[serde(default)]
    pub stats: TradeStats,
}

impl Trade {
    pub fn new(id: TradeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            strategy_id: None,
            open: true,
            tags: BTreeSet::new(),
            orders: Vec::new(),
            cash_transactions: Vec::new(),
            fx_transactions: Vec::new(),
            date_opened: None,
            date_closed: None,
            stats: TradeStats::default(),
        }
    }

    /// Net signed quantity per instrument across all orders.
    pub fn net_quantities(&self) -> HashMap<InstrumentId, f64> {
        let mut net: HashMap<InstrumentId, f64> = HashMap::new();
        for order in &self.orders {
            *net.entry(order.instrument_id).or_insert(0.0) += order.quantity;
        }
        net
    }

    /// A trade can be closed only when every instrument nets to zero.
    pub fn is_closable(&self) -> bool {
        self.net_quantities()
            .values()
            .all(|q| q.abs() < QTY_EPSILON)
    }

    /// Mark the trade closed, failing if any instrument still carries quantity.
    pub fn close(&mut self) -> Result<(), TradeError> {
        let mut open_legs: Vec<(InstrumentId, f64)> = self
            .net_quantities()
            .into_iter()
            .filter(|(_, q)| q.abs() >= QTY_EPSILON)
            .collect();
        open_legs.sort_by_key(|(id, _)| *id);
        if let Some((instrument, quantity)) = open_legs.first() {
            return Err(TradeError::NotClosable {
                trade: self.id,
                instrument: *instrument,
                quantity: *quantity,
            });
        }
        self.open = false;
        self.recompute();
        Ok(())
    }

    /// Replay the trade's orders and rebuild every derived field.
    ///
    /// Orders are sorted by time; each order gets its average-cost basis and
    /// realized P&L. Unrealized fields are left untouched.
    pub fn recompute(&mut self) {
        self.orders.sort_by(|a, b| a.trade_time.cmp(&b.trade_time).then(a.id.cmp(&b.id)));

        let unrealized = (
            self.stats.unrealized_pnl,
            self.stats.unrealized_pnl_long,
            self.stats.unrealized_pnl_short,
        );
        let mut stats = TradeStats {
            unrealized_pnl: unrealized.0,
            unrealized_pnl_long: unrealized.1,
            unrealized_pnl_short: unrealized.2,
            ..TradeStats::default()
        };

        let mut books: HashMap<InstrumentId, AverageCost> = HashMap::new();
        for order in &mut self.orders {
            let book = books.entry(order.instrument_id).or_default();
            let fill = book.apply(order.quantity, order.price);
            let scale = order.multiplier * order.fx_rate_to_base;
            let realized = fill.realized * scale;

            order.cost_basis = fill.matched_price * order.fx_rate_to_base;
            order.realized_pnl = realized;

            stats.realized_pnl += realized;
            if fill.prior_sign > 0.0 {
                stats.realized_pnl_long += realized;
            } else if fill.prior_sign < 0.0 {
                stats.realized_pnl_short += realized;
            }

            let opened_money = (fill.opening * order.price * scale).abs();
            if fill.opening > 0.0 {
                stats.capital_long += opened_money;
            } else if fill.opening < 0.0 {
                stats.capital_short += opened_money;
            }
            stats.commissions += order.commission_base();
        }

        for tx in &self.cash_transactions {
            stats.cash_pnl += tx.amount_base();
        }
        for fx in &self.fx_transactions {
            stats.commissions += fx.commission;
        }

        stats.capital_net = stats.capital_long - stats.capital_short;
        stats.capital_total = stats.capital_long + stats.capital_short;
        self.stats = stats;

        self.date_opened = self.event_times().min();
        self.date_closed = if self.open {
            None
        } else {
            self.event_times().max()
        };
    }

    fn event_times(&self) -> impl Iterator<Item = NaiveDateTime> + '_ {
        self.orders
            .iter()
            .map(|o| o.trade_time)
            .chain(self.cash_transactions.iter().map(|c| c.transaction_date))
            .chain(self.fx_transactions.iter().map(|f| f.date_time))
    }

    /// Every date on which this trade has an event.
    pub fn event_dates(&self) -> BTreeSet<NaiveDate> {
        self.event_times().map(|t| t.date()).collect()
    }

    /// Calendar days between open and close (or `as_of` for open trades).
    pub fn holding_days(&self, as_of: NaiveDate) -> i64 {
        let Some(opened) = self.date_opened else {
            return 0;
        };
        let end = self.date_closed.map(|d| d.date()).unwrap_or(as_of);
        (end - opened.date()).num_days().max(0)
    }

    /// Sum of absolute order notionals in base currency.
    pub fn turnover_money(&self) -> f64 {
        self.orders.iter().map(|o| o.trade_money_base().abs()).sum()
    }

    pub fn is_winner(&self) -> bool {
        self.stats.total_result() > 0.0
    }
}
