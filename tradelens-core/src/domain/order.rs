//! Orders and their executions.
//!
//! Quantities are signed: positive buys, negative sells. Money amounts on an order
//! are in the instrument's currency; `fx_rate_to_base` converts them to the base
//! currency.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::ids::{InstrumentId, OrderId, TradeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

/// A filled order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub instrument_id: InstrumentId,
    #[serde(default)]
    pub trade_id: Option<TradeId>,
    pub trade_time: NaiveDateTime,
    /// Signed quantity.
    pub quantity: f64,
    pub price: f64,
    #[serde(default = "one")]
    pub multiplier: f64,
    /// Commission paid, positive, in the instrument's currency.
    #[serde(default)]
    pub commission: f64,
    #[serde(default = "one")]
    pub fx_rate_to_base: f64,
    #[serde(default)]
    pub executions: Vec<Execution>,
    /// Average-cost basis of the position this order closed against, in base
    /// currency per unit. Filled by `Trade::recompute`.
    #[serde(default)]
    pub cost_basis: f64,
    /// Realized P&L in base currency, before commissions. Filled by `Trade::recompute`.
    #[serde(default)]
    pub realized_pnl: f64,
}

/// Child fill of an order. Shares the order's economics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub time: NaiveDateTime,
    pub quantity: f64,
    pub price: f64,
    #[serde(default)]
    pub venue: Option<String>,
}

fn one() -> f64 {
    1.0
}

impl Order {
    pub fn new(
        id: OrderId,
        instrument_id: InstrumentId,
        trade_time: NaiveDateTime,
        quantity: f64,
        price: f64,
    ) -> Self {
        Self {
            id,
            instrument_id,
            trade_id: None,
            trade_time,
            quantity,
            price,
            multiplier: 1.0,
            commission: 0.0,
            fx_rate_to_base: 1.0,
            executions: Vec::new(),
            cost_basis: 0.0,
            realized_pnl: 0.0,
        }
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_commission(mut self, commission: f64) -> Self {
        self.commission = commission;
        self
    }

    pub fn with_fx_rate(mut self, fx_rate_to_base: f64) -> Self {
        self.fx_rate_to_base = fx_rate_to_base;
        self
    }

    pub fn with_trade(mut self, trade_id: TradeId) -> Self {
        self.trade_id = Some(trade_id);
        self
    }

    pub fn side(&self) -> OrderSide {
        if self.quantity >= 0.0 {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.trade_time.date()
    }

    /// Signed notional in local currency: positive for buys.
    pub fn trade_money(&self) -> f64 {
        self.quantity * self.price * self.multiplier
    }

    pub fn trade_money_base(&self) -> f64 {
        self.trade_money() * self.fx_rate_to_base
    }

    /// Cash received (negative when paying), before commissions, in local currency.
    pub fn proceeds(&self) -> f64 {
        -self.trade_money()
    }

    pub fn net_cash(&self) -> f64 {
        self.proceeds() - self.commission
    }

    pub fn commission_base(&self) -> f64 {
        self.commission * self.fx_rate_to_base
    }

    /// Volume-weighted price over executions, or the order price if none are recorded.
    pub fn average_execution_price(&self) -> f64 {
        let qty: f64 = self.executions.iter().map(|e| e.quantity.abs()).sum();
        if qty <= 0.0 {
            return self.price;
        }
        let notional: f64 = self
            .executions
            .iter()
            .map(|e| e.quantity.abs() * e.price)
            .sum();
        notional / qty
    }
}
