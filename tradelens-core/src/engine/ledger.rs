//! Per-date index of trade events.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::domain::{CashTransaction, FxTransaction, Order, Trade, TradeId};

/// Everything that happens on one date, each list in time order.
#[derive(Debug, Clone, Default)]
pub struct DayEvents {
    pub orders: Vec<(TradeId, Order)>,
    pub cash: Vec<(TradeId, CashTransaction)>,
    pub fx: Vec<(TradeId, FxTransaction)>,
}

impl DayEvents {
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty() && self.cash.is_empty() && self.fx.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventLedger {
    days: BTreeMap<NaiveDate, DayEvents>,
}

impl EventLedger {
    pub fn from_trades<'a>(trades: impl IntoIterator<Item = &'a Trade>) -> Self {
        let mut days: BTreeMap<NaiveDate, DayEvents> = BTreeMap::new();
        for trade in trades {
            for order in &trade.orders {
                days.entry(order.date())
                    .or_default()
                    .orders
                    .push((trade.id, order.clone()));
            }
            for tx in &trade.cash_transactions {
                days.entry(tx.date())
                    .or_default()
                    .cash
                    .push((trade.id, tx.clone()));
            }
            for fx in &trade.fx_transactions {
                days.entry(fx.date())
                    .or_default()
                    .fx
                    .push((trade.id, fx.clone()));
            }
        }
        for events in days.values_mut() {
            events
                .orders
                .sort_by(|a, b| a.1.trade_time.cmp(&b.1.trade_time).then(a.1.id.cmp(&b.1.id)));
            events
                .cash
                .sort_by(|a, b| a.1.transaction_date.cmp(&b.1.transaction_date));
            events.fx.sort_by(|a, b| a.1.date_time.cmp(&b.1.date_time));
        }
        Self { days }
    }

    pub fn events_on(&self, date: NaiveDate) -> Option<&DayEvents> {
        self.days.get(&date)
    }

    pub fn dates(&self) -> BTreeSet<NaiveDate> {
        self.days.keys().copied().collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.days.keys().next().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.days.keys().next_back().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{InstrumentId, OrderId};

    #[test]
    fn groups_orders_by_date_in_time_order() {
        let d2 = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let mut trade = Trade::new(TradeId(1), "t");
        trade.orders.push(Order::new(OrderId(2), InstrumentId(1), d2.and_hms_opt(14, 0, 0).unwrap(), -1.0, 1.0));
        trade.orders.push(Order::new(OrderId(1), InstrumentId(1), d2.and_hms_opt(9, 30, 0).unwrap(), 1.0, 1.0));
        let ledger = EventLedger::from_trades([&trade]);

        let events = ledger.events_on(d2).unwrap();
        assert_eq!(events.orders.len(), 2);
        assert_eq!(events.orders[0].1.id, OrderId(1));
        assert_eq!(ledger.first_date(), Some(d2));
        assert_eq!(ledger.last_date(), Some(d2));
    }

    #[test]
    fn empty_ledger_has_no_dates() {
        let ledger = EventLedger::from_trades(std::iter::empty());
        assert!(ledger.is_empty());
        assert!(ledger.dates().is_empty());
    }
}
