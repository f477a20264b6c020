//! Cash movements and currency conversions attached to trades.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::ids::{InstrumentId, TradeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CashTransactionKind {
    Dividend,
    Interest,
    WithholdingTax,
    Fee,
    Other,
}

/// Dividend, interest, fee or tax booked against a trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashTransaction {
    pub id: u64,
    #[serde(default)]
    pub trade_id: Option<TradeId>,
    #[serde(default)]
    pub instrument_id: Option<InstrumentId>,
    pub transaction_date: NaiveDateTime,
    pub kind: CashTransactionKind,
    /// Signed amount in local currency: positive is received.
    pub amount: f64,
    #[serde(default = "one")]
    pub fx_rate_to_base: f64,
}

impl CashTransaction {
    pub fn date(&self) -> NaiveDate {
        self.transaction_date.date()
    }

    pub fn amount_base(&self) -> f64 {
        self.amount * self.fx_rate_to_base
    }

    /// Taxes and fees are treated like commissions when splitting gross from net.
    pub fn is_cost(&self) -> bool {
        matches!(
            self.kind,
            CashTransactionKind::WithholdingTax | CashTransactionKind::Fee
        )
    }
}

/// Conversion into or out of a foreign currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FxTransaction {
    pub id: u64,
    #[serde(default)]
    pub trade_id: Option<TradeId>,
    pub date_time: NaiveDateTime,
    /// Foreign currency bought (positive quantity) or sold (negative).
    pub currency: String,
    pub quantity: f64,
    /// Base currency per unit of foreign currency.
    pub price: f64,
    /// Commission in base currency.
    #[serde(default)]
    pub commission: f64,
}

impl FxTransaction {
    pub fn date(&self) -> NaiveDate {
        self.date_time.date()
    }

    /// Base-currency value of the conversion, positive when buying foreign currency.
    pub fn cost(&self) -> f64 {
        self.quantity * self.price
    }
}

fn one() -> f64 {
    1.0
}
