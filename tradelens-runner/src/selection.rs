//! Trade selection before simulation.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use tradelens_core::domain::{StrategyId, TagId, Trade};

use crate::settings::SelectionSettings;

/// Strategy, tag, date-range and open/closed filter over trades.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub strategies: BTreeSet<StrategyId>,
    pub tags: BTreeSet<TagId>,
    pub include_open: bool,
}

impl TradeFilter {
    pub fn from_settings(settings: &SelectionSettings) -> Self {
        Self {
            from: settings.from,
            to: settings.to,
            strategies: settings.strategies.iter().copied().collect(),
            tags: settings.tags.iter().copied().collect(),
            include_open: settings.include_open,
        }
    }

    /// A trade matches when its activity overlaps `[from, to]`, its strategy is
    /// selected (if any are) and it carries one of the selected tags (if any are).
    pub fn matches(&self, trade: &Trade) -> bool {
        if trade.open && !self.include_open {
            return false;
        }
        if !self.strategies.is_empty()
            && !trade.strategy_id.is_some_and(|s| self.strategies.contains(&s))
        {
            return false;
        }
        if !self.tags.is_empty() && trade.tags.is_disjoint(&self.tags) {
            return false;
        }

        let dates = trade.event_dates();
        let (Some(first), Some(last)) = (dates.first().copied(), dates.last().copied()) else {
            return false;
        };
        let last = if trade.open { NaiveDate::MAX } else { last };
        if self.to.is_some_and(|to| first > to) {
            return false;
        }
        if self.from.is_some_and(|from| last < from) {
            return false;
        }
        true
    }

    /// Matching trades, cloned and with their derived fields rebuilt.
    pub fn apply(&self, trades: &[Trade]) -> Vec<Trade> {
        trades
            .iter()
            .filter(|t| self.matches(t))
            .map(|t| {
                let mut trade = t.clone();
                trade.recompute();
                trade
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tradelens_core::domain::{InstrumentId, Order, OrderId, TradeId};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, day).unwrap()
    }

    fn trade(id: u64, strategy: Option<u64>, open_day: u32, close_day: Option<u32>) -> Trade {
        let mut t = Trade::new(TradeId(id), format!("T{id}"));
        t.strategy_id = strategy.map(StrategyId);
        t.orders.push(Order::new(
            OrderId(id * 10),
            InstrumentId(1),
            d(open_day).and_hms_opt(10, 0, 0).unwrap(),
            10.0,
            100.0,
        ));
        if let Some(close) = close_day {
            t.orders.push(Order::new(
                OrderId(id * 10 + 1),
                InstrumentId(1),
                d(close).and_hms_opt(10, 0, 0).unwrap(),
                -10.0,
                105.0,
            ));
            t.open = false;
        }
        t
    }

    #[test]
    fn default_filter_keeps_everything_with_events() {
        let filter = TradeFilter {
            include_open: true,
            ..TradeFilter::default()
        };
        assert!(filter.matches(&trade(1, None, 2, None)));
        assert!(filter.matches(&trade(2, Some(1), 2, Some(5))));
        assert!(!filter.matches(&Trade::new(TradeId(3), "empty")));
    }

    #[test]
    fn strategy_and_open_filters() {
        let filter = TradeFilter {
            strategies: [StrategyId(1)].into_iter().collect(),
            include_open: false,
            ..TradeFilter::default()
        };
        assert!(filter.matches(&trade(1, Some(1), 2, Some(5))));
        assert!(!filter.matches(&trade(2, Some(2), 2, Some(5))));
        assert!(!filter.matches(&trade(3, None, 2, Some(5))));
        assert!(!filter.matches(&trade(4, Some(1), 2, None)));
    }

    #[test]
    fn tag_filter_needs_any_tag() {
        let filter = TradeFilter {
            tags: [TagId(7), TagId(8)].into_iter().collect(),
            include_open: true,
            ..TradeFilter::default()
        };
        let mut tagged = trade(1, None, 2, Some(3));
        tagged.tags.insert(TagId(8));
        assert!(filter.matches(&tagged));
        assert!(!filter.matches(&trade(2, None, 2, Some(3))));
    }

    #[test]
    fn date_range_overlap() {
        let filter = TradeFilter {
            from: Some(d(10)),
            to: Some(d(20)),
            include_open: true,
            ..TradeFilter::default()
        };
        assert!(!filter.matches(&trade(1, None, 2, Some(5))));
        assert!(filter.matches(&trade(2, None, 5, Some(12))));
        assert!(filter.matches(&trade(3, None, 2, None)));
        assert!(!filter.matches(&trade(4, None, 21, Some(25))));
    }

    #[test]
    fn apply_recomputes_trades() {
        let filter = TradeFilter::from_settings(&SelectionSettings::default());
        let selected = filter.apply(&[trade(1, None, 2, Some(5))]);
        assert_eq!(selected.len(), 1);
        assert!((selected[0].stats.realized_pnl - 50.0).abs() < 1e-9);
    }
}
