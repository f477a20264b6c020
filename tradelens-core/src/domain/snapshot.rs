//! Account-level snapshots supplied by the persistence collaborator.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::ids::InstrumentId;

/// End-of-day total capital for one account, in base currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquitySummary {
    pub date: NaiveDate,
    #[serde(default)]
    pub account: Option<String>,
    pub total: f64,
}

/// Statement-level position valuation. Used as a price of last resort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorPosition {
    pub date: NaiveDate,
    pub instrument_id: InstrumentId,
    pub price: f64,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default = "one")]
    pub fx_rate_to_base: f64,
}

fn one() -> f64 {
    1.0
}
