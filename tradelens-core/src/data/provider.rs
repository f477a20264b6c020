//! Market data source trait and structured error types.
//!
//! The trait abstracts over wherever price and fx history comes from so the
//! simulation can be fed from files, a database or test fixtures.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Bar, FxRate, Instrument, InstrumentId};

#[derive(Debug, Error)]
pub enum DataError {
    #[error("no price data for {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("no fx rate series for {currency}")]
    NoFxSeries { currency: String },

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("data error: {0}")]
    Other(String),
}

/// Source of daily price bars and fx rates.
pub trait MarketDataSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Ordered bars for `instrument` between `from` and `to` inclusive.
    fn get_data(
        &self,
        instrument: &Instrument,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Bar>, DataError>;

    /// Ordered conversion rates from `currency` to the base currency.
    fn get_fx_rate_series(&self, currency: &str) -> Result<Vec<FxRate>, DataError>;
}

/// Market data held in memory, typically deserialized from a JSON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryDataSource {
    #[serde(default)]
    pub prices: BTreeMap<InstrumentId, Vec<Bar>>,
    #[serde(default)]
    pub fx_rates: BTreeMap<String, Vec<FxRate>>,
}

impl InMemoryDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prices(mut self, instrument: InstrumentId, bars: Vec<Bar>) -> Self {
        self.prices.insert(instrument, bars);
        self
    }

    pub fn with_fx(mut self, currency: impl Into<String>, rates: Vec<FxRate>) -> Self {
        self.fx_rates.insert(currency.into(), rates);
        self
    }
}

impl MarketDataSource for InMemoryDataSource {
    fn name(&self) -> &str {
        "in-memory"
    }

    fn get_data(
        &self,
        instrument: &Instrument,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Bar>, DataError> {
        let bars = self
            .prices
            .get(&instrument.id)
            .ok_or_else(|| DataError::SymbolNotFound {
                symbol: instrument.symbol.clone(),
            })?;
        if let Some(bad) = bars.iter().find(|b| b.is_void()) {
            return Err(DataError::ValidationError(format!(
                "{} has a void bar on {}",
                instrument.symbol, bad.date
            )));
        }
        Ok(bars
            .iter()
            .filter(|b| b.date >= from && b.date <= to)
            .cloned()
            .collect())
    }

    fn get_fx_rate_series(&self, currency: &str) -> Result<Vec<FxRate>, DataError> {
        self.fx_rates
            .get(currency)
            .cloned()
            .ok_or_else(|| DataError::NoFxSeries {
                currency: currency.to_string(),
            })
    }
}
