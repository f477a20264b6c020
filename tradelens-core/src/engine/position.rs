//! Positions and the per-scope position book.
//!
//! Daily P&L is mark-to-market: `end_value - start_value + trading_cash_flows`,
//! all in base currency. Openings after the capital cutoff are parked as
//! deferred quantity and join the marked quantity at the start of the next day,
//! valued at their fill price. A day is split into segments at every point where
//! the marked quantity goes flat, so a reversal books each leg on its own side.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::config::SimulationConfig;
use crate::data::MarketData;
use crate::domain::{AverageCost, CashTransaction, FxTransaction, Instrument, InstrumentId, Order};

const QTY_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PositionKey {
    Instrument(InstrumentId),
    /// Foreign currency balance created by fx transactions.
    Currency(String),
}

#[derive(Debug, Clone)]
pub struct Position {
    key: PositionKey,
    multiplier: f64,
    is_option: bool,
    currency: String,
    cost: AverageCost,

    marked_qty: f64,
    deferred_qty: f64,
    deferred_value: f64,
    prev_value: f64,
    /// Marked value at the start of the current same-sign segment.
    segment_value: f64,
    value: f64,
    last_price: f64,
    last_fx: f64,

    // ── Day accumulators ──
    segment_side: f64,
    segment_flow: f64,
    day_open_long: f64,
    day_open_short: f64,
    day_direct_long: f64,
    day_direct_short: f64,

    // ── Lifetime ──
    realized_pnl: f64,
    realized_long: f64,
    realized_short: f64,
}

/// One position's contribution to a closed day.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PositionDay {
    pub pnl_long: f64,
    pub pnl_short: f64,
    pub capital_long: f64,
    pub capital_short: f64,
    pub value: f64,
}

impl PositionDay {
    pub fn pnl(&self) -> f64 {
        self.pnl_long + self.pnl_short
    }
}

/// Read-only view of a position after a day close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionMark {
    pub key: PositionKey,
    pub quantity: f64,
    pub avg_price: f64,
    pub mark: f64,
    pub market_value: f64,
    pub unrealized_pnl: f64,
    pub realized_pnl: f64,
    /// Share of total capital, 0 when unknown.
    pub pct_of_nav: f64,
}

impl Position {
    fn new(key: PositionKey, multiplier: f64, is_option: bool, currency: String) -> Self {
        Self {
            key,
            multiplier,
            is_option,
            currency,
            cost: AverageCost::default(),
            marked_qty: 0.0,
            deferred_qty: 0.0,
            deferred_value: 0.0,
            prev_value: 0.0,
            segment_value: 0.0,
            value: 0.0,
            last_price: 0.0,
            last_fx: 1.0,
            segment_side: 0.0,
            segment_flow: 0.0,
            day_open_long: 0.0,
            day_open_short: 0.0,
            day_direct_long: 0.0,
            day_direct_short: 0.0,
            realized_pnl: 0.0,
            realized_long: 0.0,
            realized_short: 0.0,
        }
    }

    pub fn key(&self) -> &PositionKey {
        &self.key
    }

    pub fn quantity(&self) -> f64 {
        self.cost.quantity
    }

    pub fn avg_price(&self) -> f64 {
        self.cost.avg_price
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    pub fn realized_long(&self) -> f64 {
        self.realized_long
    }

    pub fn realized_short(&self) -> f64 {
        self.realized_short
    }

    /// Quantity that will only count from the next day.
    pub fn deferred_quantity(&self) -> f64 {
        self.deferred_qty
    }

    pub fn unrealized_pnl(&self) -> f64 {
        (self.last_price - self.cost.avg_price) * self.cost.quantity * self.multiplier * self.last_fx
    }

    pub fn is_flat(&self) -> bool {
        self.cost.is_flat()
            && self.marked_qty.abs() < QTY_EPSILON
            && self.deferred_qty.abs() < QTY_EPSILON
    }

    fn begin_day(&mut self) {
        self.prev_value += self.deferred_value;
        self.marked_qty += self.deferred_qty;
        self.deferred_qty = 0.0;
        self.deferred_value = 0.0;
        self.segment_value = self.prev_value;
        self.segment_side = if self.marked_qty.abs() < QTY_EPSILON {
            0.0
        } else {
            self.marked_qty.signum()
        };
    }

    /// Book the P&L of the segment that just went flat on the side it was held.
    fn settle_segment(&mut self) {
        let pnl = self.segment_flow - self.segment_value;
        if self.segment_side < 0.0 {
            self.day_direct_short += pnl;
        } else {
            self.day_direct_long += pnl;
        }
        self.marked_qty = 0.0;
        self.segment_value = 0.0;
        self.segment_flow = 0.0;
        self.segment_side = 0.0;
    }

    /// Apply a signed fill. Returns realized P&L in base currency.
    fn apply_fill(&mut self, qty: f64, price: f64, fx: f64, late: bool) -> f64 {
        let fill = self.cost.apply(qty, price);
        let scale = self.multiplier * fx;
        let realized = fill.realized * scale;
        self.realized_pnl += realized;
        if fill.prior_sign > 0.0 {
            self.realized_long += realized;
        } else if fill.prior_sign < 0.0 {
            self.realized_short += realized;
        }
        self.last_price = price;
        self.last_fx = fx;

        let mut closing = fill.closing;
        if closing != 0.0 {
            let from_marked = if self.marked_qty * closing < 0.0 {
                closing.signum() * closing.abs().min(self.marked_qty.abs())
            } else {
                0.0
            };
            self.marked_qty += from_marked;
            self.segment_flow -= from_marked * price * scale;
            closing -= from_marked;
            if from_marked != 0.0 && self.marked_qty.abs() < QTY_EPSILON {
                self.settle_segment();
            }

            if closing.abs() >= QTY_EPSILON && self.deferred_qty.abs() >= QTY_EPSILON {
                // closing a late opening from earlier today or an unmarked remainder
                let frac = (closing.abs() / self.deferred_qty.abs()).min(1.0);
                let released = self.deferred_value * frac;
                let pnl = -closing * price * scale - released;
                if self.deferred_qty > 0.0 {
                    self.day_direct_long += pnl;
                } else {
                    self.day_direct_short += pnl;
                }
                self.deferred_value -= released;
                self.deferred_qty += closing;
            }
        }

        if fill.opening != 0.0 {
            let money = fill.opening * price * scale;
            if late {
                self.deferred_qty += fill.opening;
                self.deferred_value += money;
            } else {
                if self.segment_side == 0.0 {
                    self.segment_side = fill.opening.signum();
                }
                self.marked_qty += fill.opening;
                self.segment_flow -= money;
                if money > 0.0 {
                    self.day_open_long += money;
                } else {
                    self.day_open_short -= money;
                }
            }
        }

        realized
    }

    fn close_day(&mut self, price: Option<f64>, fx: Option<f64>, capital_scale: f64) -> PositionDay {
        let price = price.unwrap_or(self.last_price);
        let fx = fx.unwrap_or(self.last_fx);
        self.last_price = price;
        self.last_fx = fx;

        let end_value = self.marked_qty * price * self.multiplier * fx;
        let mark_pnl = end_value - self.segment_value + self.segment_flow;
        let side = if self.segment_side != 0.0 {
            self.segment_side
        } else {
            self.marked_qty.signum()
        };

        let mut day = PositionDay {
            pnl_long: self.day_direct_long,
            pnl_short: self.day_direct_short,
            capital_long: (self.prev_value.max(0.0) + self.day_open_long) * capital_scale,
            capital_short: ((-self.prev_value).max(0.0) + self.day_open_short) * capital_scale,
            value: end_value + self.deferred_qty * price * self.multiplier * fx,
        };
        if side < 0.0 {
            day.pnl_short += mark_pnl;
        } else {
            day.pnl_long += mark_pnl;
        }

        self.prev_value = end_value;
        self.value = day.value;
        self.segment_value = end_value;
        self.segment_side = 0.0;
        self.segment_flow = 0.0;
        self.day_open_long = 0.0;
        self.day_open_short = 0.0;
        self.day_direct_long = 0.0;
        self.day_direct_short = 0.0;
        day
    }

    fn mark(&self, total_capital: f64) -> PositionMark {
        PositionMark {
            key: self.key.clone(),
            quantity: self.cost.quantity,
            avg_price: self.cost.avg_price,
            mark: self.last_price,
            market_value: self.value,
            unrealized_pnl: self.unrealized_pnl(),
            realized_pnl: self.realized_pnl,
            pct_of_nav: if total_capital > 0.0 {
                self.value / total_capital
            } else {
                0.0
            },
        }
    }
}

/// Aggregate of a closed day across a book.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookDay {
    /// Mark-to-market P&L plus income, before commissions and costs.
    pub gross_pnl: f64,
    pub net_pnl: f64,
    pub pnl_long: f64,
    pub pnl_short: f64,
    pub commissions: f64,
    /// Dividends and interest.
    pub cash_income: f64,
    /// Taxes and fees, signed as booked (usually negative).
    pub cash_costs: f64,
    pub capital_long: f64,
    pub capital_short: f64,
    /// Realized P&L of positions that went flat today, keyed by instrument.
    pub closed_positions: Vec<(PositionKey, f64)>,
}

impl BookDay {
    pub fn capital(&self) -> f64 {
        self.capital_long + self.capital_short
    }
}

/// All positions of one simulation scope.
#[derive(Debug, Clone, Default)]
pub struct PositionBook {
    positions: BTreeMap<PositionKey, Position>,
    day_commissions: f64,
    day_cash_income: f64,
    day_cash_costs: f64,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_day(&mut self) {
        for pos in self.positions.values_mut() {
            pos.begin_day();
        }
        self.day_commissions = 0.0;
        self.day_cash_income = 0.0;
        self.day_cash_costs = 0.0;
    }

    /// Apply an order. Returns realized P&L in base currency before commissions.
    pub fn apply_order(
        &mut self,
        order: &Order,
        instrument: Option<&Instrument>,
        config: &SimulationConfig,
    ) -> f64 {
        let key = PositionKey::Instrument(order.instrument_id);
        let pos = self.positions.entry(key.clone()).or_insert_with(|| {
            let (is_option, currency) = match instrument {
                Some(inst) => (inst.asset_class.is_option(), inst.currency.clone()),
                None => (false, config.base_currency.clone()),
            };
            Position::new(key, order.multiplier, is_option, currency)
        });
        let late = config.is_after_cutoff(order.trade_time.time());
        self.day_commissions += order.commission_base();
        pos.apply_fill(order.quantity, order.price, order.fx_rate_to_base, late)
    }

    pub fn apply_cash(&mut self, tx: &CashTransaction) {
        if tx.is_cost() {
            self.day_cash_costs += tx.amount_base();
        } else {
            self.day_cash_income += tx.amount_base();
        }
    }

    /// Apply a currency conversion. Conversions into the base currency itself carry no position.
    pub fn apply_fx(&mut self, fx: &FxTransaction, config: &SimulationConfig) -> f64 {
        self.day_commissions += fx.commission;
        if fx.currency == config.base_currency {
            return 0.0;
        }
        let key = PositionKey::Currency(fx.currency.clone());
        let pos = self
            .positions
            .entry(key.clone())
            .or_insert_with(|| Position::new(key, 1.0, false, fx.currency.clone()));
        let late = config.is_after_cutoff(fx.date_time.time());
        pos.apply_fill(fx.quantity, fx.price, 1.0, late)
    }

    /// Mark every position and fold the day's flows into a `BookDay`.
    ///
    /// Positions that are completely flat afterwards are dropped.
    pub fn close_day(&mut self, market: &MarketData, config: &SimulationConfig) -> BookDay {
        let mut day = BookDay {
            commissions: self.day_commissions,
            cash_income: self.day_cash_income,
            cash_costs: self.day_cash_costs,
            ..BookDay::default()
        };

        for pos in self.positions.values_mut() {
            let (price, fx) = match &pos.key {
                PositionKey::Instrument(id) => (market.close(*id), market.fx_rate(&pos.currency)),
                PositionKey::Currency(c) => (market.fx_rate(c), Some(1.0)),
            };
            let pd = pos.close_day(price, fx, config.capital_scale(pos.is_option));
            day.pnl_long += pd.pnl_long;
            day.pnl_short += pd.pnl_short;
            day.capital_long += pd.capital_long;
            day.capital_short += pd.capital_short;
        }

        day.gross_pnl = day.pnl_long + day.pnl_short + day.cash_income;
        day.net_pnl = day.gross_pnl - day.commissions + day.cash_costs;

        let flat: Vec<PositionKey> = self
            .positions
            .iter()
            .filter(|(_, p)| p.is_flat())
            .map(|(k, _)| k.clone())
            .collect();
        for key in flat {
            if let Some(pos) = self.positions.remove(&key) {
                day.closed_positions.push((key, pos.realized_pnl));
            }
        }
        day
    }

    pub fn get(&self, key: &PositionKey) -> Option<&Position> {
        self.positions.get(key)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn marks(&self, total_capital: f64) -> Vec<PositionMark> {
        self.positions.values().map(|p| p.mark(total_capital)).collect()
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.positions.values().map(Position::unrealized_pnl).sum()
    }

    /// Unrealized P&L split into (long, short) by position sign.
    pub fn unrealized_split(&self) -> (f64, f64) {
        self.positions.values().fold((0.0, 0.0), |(l, s), p| {
            if p.quantity() >= 0.0 {
                (l + p.unrealized_pnl(), s)
            } else {
                (l, s + p.unrealized_pnl())
            }
        })
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AssetClass, Bar, OrderId};
    use chrono::{NaiveDate, NaiveDateTime};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        d(day).and_hms_opt(h, m, 0).unwrap()
    }

    fn market(closes: &[(u32, f64)]) -> MarketData {
        let mut m = MarketData::new("USD");
        m.insert_prices(
            InstrumentId(1),
            closes.iter().map(|(day, c)| Bar::flat(d(*day), *c)).collect(),
        );
        m
    }

    fn stock() -> Instrument {
        Instrument::new(InstrumentId(1), "ABC", AssetClass::Stock)
    }

    #[test]
    fn intraday_open_counts_capital_and_pnl_same_day() {
        let config = SimulationConfig::default();
        let mut m = market(&[(2, 11.0)]);
        let mut book = PositionBook::new();
        book.begin_day();
        book.apply_order(&Order::new(OrderId(1), InstrumentId(1), at(2, 10, 0), 100.0, 10.0), Some(&stock()), &config);
        m.progress_to(d(2));
        let day = book.close_day(&m, &config);
        assert!((day.capital_long - 1000.0).abs() < 1e-10);
        assert!((day.gross_pnl - 100.0).abs() < 1e-10);
        assert!((day.pnl_long - 100.0).abs() < 1e-10);
    }

    #[test]
    fn late_open_defers_capital_and_pnl_to_next_day() {
        let config = SimulationConfig::default();
        let mut m = market(&[(2, 11.0), (3, 12.0)]);
        let mut book = PositionBook::new();

        book.begin_day();
        book.apply_order(&Order::new(OrderId(1), InstrumentId(1), at(2, 15, 58), 100.0, 10.0), Some(&stock()), &config);
        m.progress_to(d(2));
        let day1 = book.close_day(&m, &config);
        assert_eq!(day1.capital(), 0.0);
        assert_eq!(day1.gross_pnl, 0.0);

        book.begin_day();
        m.progress_to(d(3));
        let day2 = book.close_day(&m, &config);
        assert!((day2.capital_long - 1000.0).abs() < 1e-10);
        // fill at 10, close at 12
        assert!((day2.gross_pnl - 200.0).abs() < 1e-10);
    }

    #[test]
    fn closing_position_realizes_and_removes_it() {
        let config = SimulationConfig::default();
        let mut m = market(&[(2, 11.0), (3, 12.0)]);
        let mut book = PositionBook::new();

        book.begin_day();
        book.apply_order(&Order::new(OrderId(1), InstrumentId(1), at(2, 10, 0), 100.0, 10.0), Some(&stock()), &config);
        m.progress_to(d(2));
        book.close_day(&m, &config);

        book.begin_day();
        let realized = book.apply_order(
            &Order::new(OrderId(2), InstrumentId(1), at(3, 10, 0), -100.0, 12.0).with_commission(1.0),
            Some(&stock()),
            &config,
        );
        m.progress_to(d(3));
        let day = book.close_day(&m, &config);
        assert!((realized - 200.0).abs() < 1e-10);
        // held from 11 to exit at 12
        assert!((day.gross_pnl - 100.0).abs() < 1e-10);
        assert!((day.net_pnl - 99.0).abs() < 1e-10);
        assert!((day.capital_long - 1100.0).abs() < 1e-10);
        assert!(book.is_empty());
        assert_eq!(day.closed_positions.len(), 1);
    }

    #[test]
    fn late_open_and_close_same_day_counts_pnl_without_capital() {
        let config = SimulationConfig::default();
        let mut m = market(&[(2, 11.0)]);
        let mut book = PositionBook::new();
        book.begin_day();
        book.apply_order(&Order::new(OrderId(1), InstrumentId(1), at(2, 15, 56), 100.0, 10.0), Some(&stock()), &config);
        book.apply_order(&Order::new(OrderId(2), InstrumentId(1), at(2, 15, 59), -100.0, 10.5), Some(&stock()), &config);
        m.progress_to(d(2));
        let day = book.close_day(&m, &config);
        assert_eq!(day.capital(), 0.0);
        assert!((day.gross_pnl - 50.0).abs() < 1e-10);
        assert!(book.is_empty());
    }

    #[test]
    fn short_position_pnl_attributed_short() {
        let config = SimulationConfig::default();
        let mut m = market(&[(2, 18.0)]);
        let mut book = PositionBook::new();
        book.begin_day();
        book.apply_order(&Order::new(OrderId(1), InstrumentId(1), at(2, 10, 0), -50.0, 20.0), Some(&stock()), &config);
        m.progress_to(d(2));
        let day = book.close_day(&m, &config);
        assert!((day.pnl_short - 100.0).abs() < 1e-10);
        assert_eq!(day.pnl_long, 0.0);
        assert!((day.capital_short - 1000.0).abs() < 1e-10);
    }

    #[test]
    fn single_order_reversal_splits_pnl_by_side() {
        let config = SimulationConfig::default();
        let mut m = market(&[(2, 10.0), (3, 9.0)]);
        let mut book = PositionBook::new();

        book.begin_day();
        book.apply_order(&Order::new(OrderId(1), InstrumentId(1), at(2, 10, 0), 100.0, 10.0), Some(&stock()), &config);
        m.progress_to(d(2));
        book.close_day(&m, &config);

        // flip from +100 to -100 at 10, close at 9
        book.begin_day();
        book.apply_order(&Order::new(OrderId(2), InstrumentId(1), at(3, 10, 0), -200.0, 10.0), Some(&stock()), &config);
        m.progress_to(d(3));
        let day = book.close_day(&m, &config);
        assert!(day.pnl_long.abs() < 1e-10);
        assert!((day.pnl_short - 100.0).abs() < 1e-10);
        assert!((day.capital_long - 1000.0).abs() < 1e-10);
        assert!((day.capital_short - 1000.0).abs() < 1e-10);
    }

    #[test]
    fn close_then_reopen_short_books_each_leg_on_its_side() {
        let config = SimulationConfig::default();
        let mut m = market(&[(2, 10.0), (3, 9.0)]);
        let mut book = PositionBook::new();

        book.begin_day();
        book.apply_order(&Order::new(OrderId(1), InstrumentId(1), at(2, 10, 0), 100.0, 10.0), Some(&stock()), &config);
        m.progress_to(d(2));
        book.close_day(&m, &config);

        book.begin_day();
        book.apply_order(&Order::new(OrderId(2), InstrumentId(1), at(3, 10, 0), -100.0, 11.0), Some(&stock()), &config);
        book.apply_order(&Order::new(OrderId(3), InstrumentId(1), at(3, 11, 0), -100.0, 11.0), Some(&stock()), &config);
        m.progress_to(d(3));
        let day = book.close_day(&m, &config);
        // long 10 -> 11, short 11 -> 9
        assert!((day.pnl_long - 100.0).abs() < 1e-10);
        assert!((day.pnl_short - 200.0).abs() < 1e-10);
        assert!((day.gross_pnl - 300.0).abs() < 1e-10);
    }

    #[test]
    fn order_exactly_at_cutoff_counts_capital_same_day() {
        let config = SimulationConfig::default();
        let mut m = market(&[(2, 11.0)]);
        let mut book = PositionBook::new();
        book.begin_day();
        book.apply_order(&Order::new(OrderId(1), InstrumentId(1), at(2, 15, 55), 100.0, 10.0), Some(&stock()), &config);
        m.progress_to(d(2));
        let day = book.close_day(&m, &config);
        assert!((day.capital_long - 1000.0).abs() < 1e-10);
        assert!((day.pnl_long - 100.0).abs() < 1e-10);
    }

    #[test]
    fn option_capital_is_scaled() {
        let config = SimulationConfig::default();
        let opt = Instrument::new(InstrumentId(1), "ABC C", AssetClass::Option).with_multiplier(100.0);
        let mut m = market(&[(2, 2.0)]);
        let mut book = PositionBook::new();
        book.begin_day();
        book.apply_order(
            &Order::new(OrderId(1), InstrumentId(1), at(2, 10, 0), 1.0, 2.0).with_multiplier(100.0),
            Some(&opt),
            &config,
        );
        m.progress_to(d(2));
        let day = book.close_day(&m, &config);
        assert!((day.capital_long - 100.0).abs() < 1e-10);
    }

    #[test]
    fn missing_price_marks_at_last_fill() {
        let config = SimulationConfig::default();
        let m = MarketData::new("USD");
        let mut book = PositionBook::new();
        book.begin_day();
        book.apply_order(&Order::new(OrderId(1), InstrumentId(1), at(2, 10, 0), 10.0, 10.0), None, &config);
        let day = book.close_day(&m, &config);
        assert_eq!(day.gross_pnl, 0.0);
        assert_eq!(book.unrealized_pnl(), 0.0);
    }

    #[test]
    fn cash_transactions_split_income_and_costs() {
        use crate::domain::CashTransactionKind;
        let config = SimulationConfig::default();
        let m = MarketData::new("USD");
        let mut book = PositionBook::new();
        book.begin_day();
        let mut tx = CashTransaction {
            id: 1,
            trade_id: None,
            instrument_id: None,
            transaction_date: at(2, 12, 0),
            kind: CashTransactionKind::Dividend,
            amount: 10.0,
            fx_rate_to_base: 1.0,
        };
        book.apply_cash(&tx);
        tx.kind = CashTransactionKind::WithholdingTax;
        tx.amount = -1.5;
        book.apply_cash(&tx);
        let day = book.close_day(&m, &config);
        assert!((day.gross_pnl - 10.0).abs() < 1e-10);
        assert!((day.net_pnl - 8.5).abs() < 1e-10);
    }

    #[test]
    fn fx_balance_is_marked_with_rate_series() {
        use chrono::NaiveDate;
        let config = SimulationConfig::default();
        let mut m = MarketData::new("USD");
        m.insert_fx("EUR", vec![crate::domain::FxRate { date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), rate: 1.10 }]);
        let mut book = PositionBook::new();
        book.begin_day();
        book.apply_fx(
            &FxTransaction {
                id: 1,
                trade_id: None,
                date_time: at(2, 9, 0),
                currency: "EUR".into(),
                quantity: 1000.0,
                price: 1.08,
                commission: 2.0,
            },
            &config,
        );
        m.progress_to(d(2));
        let day = book.close_day(&m, &config);
        assert!((day.gross_pnl - 20.0).abs() < 1e-9);
        assert!((day.net_pnl - 18.0).abs() < 1e-9);
    }
}
