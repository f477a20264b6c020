//! Market data acquired once before the day loop.
//!
//! Every instrument's bars and every foreign currency's fx series are fetched up
//! front in parallel. When an instrument has no price history, prior-period
//! position snapshots are turned into synthetic flat bars so the simulation can
//! continue with reduced fidelity.

use std::collections::HashMap;

use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::{debug, warn};

use super::provider::{DataError, MarketDataSource};
use crate::domain::{Bar, FxRate, Instrument, InstrumentId, PriorPosition};
use crate::series::TimeSeries;

/// What was requested from the data source.
#[derive(Debug, Clone)]
pub struct MarketDataRequest<'a> {
    pub instruments: Vec<&'a Instrument>,
    pub currencies: Vec<String>,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub base_currency: String,
}

#[derive(Debug, Clone, Default)]
pub struct MarketData {
    prices: HashMap<InstrumentId, TimeSeries<Bar>>,
    fx: HashMap<String, TimeSeries<FxRate>>,
    base_currency: String,
    fallbacks: Vec<InstrumentId>,
}

impl MarketData {
    pub fn new(base_currency: impl Into<String>) -> Self {
        Self {
            base_currency: base_currency.into(),
            ..Self::default()
        }
    }

    /// Fetch everything the simulation will need.
    pub fn load(
        source: &dyn MarketDataSource,
        request: &MarketDataRequest<'_>,
        prior_positions: &[PriorPosition],
    ) -> Self {
        let mut data = Self::new(request.base_currency.clone());

        let fetched: Vec<(InstrumentId, Result<Vec<Bar>, DataError>)> = request
            .instruments
            .par_iter()
            .map(|inst| (inst.id, source.get_data(inst, request.from, request.to)))
            .collect();

        for (inst, (id, result)) in request.instruments.iter().zip(fetched) {
            match result {
                Ok(bars) if !bars.is_empty() => {
                    debug!(symbol = %inst.symbol, bars = bars.len(), "loaded price series");
                    data.prices.insert(id, TimeSeries::new(bars));
                }
                other => {
                    let reason = match other {
                        Err(e) => e.to_string(),
                        Ok(_) => "empty series".to_string(),
                    };
                    let synthetic = synthetic_bars(id, prior_positions, request.from, request.to);
                    if synthetic.is_empty() {
                        warn!(symbol = %inst.symbol, %reason, "no price data and no prior positions; marks will use fill prices");
                    } else {
                        warn!(symbol = %inst.symbol, %reason, bars = synthetic.len(), "no price data; using prior position snapshots");
                        data.prices.insert(id, TimeSeries::new(synthetic));
                        data.fallbacks.push(id);
                    }
                }
            }
        }

        let foreign: Vec<&String> = request
            .currencies
            .iter()
            .filter(|c| **c != request.base_currency)
            .collect();
        let fetched_fx: Vec<(String, Result<Vec<FxRate>, DataError>)> = foreign
            .par_iter()
            .map(|c| ((*c).clone(), source.get_fx_rate_series(c)))
            .collect();
        for (currency, result) in fetched_fx {
            match result {
                Ok(rates) if !rates.is_empty() => {
                    data.fx.insert(currency, TimeSeries::new(rates));
                }
                Ok(_) => warn!(%currency, "empty fx series; order rates will be used"),
                Err(e) => warn!(%currency, error = %e, "fx series unavailable; order rates will be used"),
            }
        }

        data
    }

    pub fn insert_prices(&mut self, instrument: InstrumentId, bars: Vec<Bar>) {
        self.prices.insert(instrument, TimeSeries::new(bars));
    }

    pub fn insert_fx(&mut self, currency: impl Into<String>, rates: Vec<FxRate>) {
        self.fx.insert(currency.into(), TimeSeries::new(rates));
    }

    /// Advance every cursor to `date`.
    pub fn progress_to(&mut self, date: NaiveDate) {
        for series in self.prices.values_mut() {
            series.progress_to(date);
        }
        for series in self.fx.values_mut() {
            series.progress_to(date);
        }
    }

    /// Current close for `instrument`, if any bar has been reached.
    pub fn close(&self, instrument: InstrumentId) -> Option<f64> {
        self.prices
            .get(&instrument)
            .and_then(|s| s.current())
            .map(|b| b.close)
    }

    /// Current bar, only if it is dated exactly `date`.
    pub fn bar_on(&self, instrument: InstrumentId, date: NaiveDate) -> Option<&Bar> {
        self.prices
            .get(&instrument)
            .and_then(|s| s.current())
            .filter(|b| b.date == date)
    }

    /// Current rate to base. The base currency always converts at 1.
    pub fn fx_rate(&self, currency: &str) -> Option<f64> {
        if currency == self.base_currency {
            return Some(1.0);
        }
        self.fx
            .get(currency)
            .and_then(|s| s.current())
            .map(|r| r.rate)
    }

    pub fn prices(&self, instrument: InstrumentId) -> Option<&TimeSeries<Bar>> {
        self.prices.get(&instrument)
    }

    /// Every date on which any price series has a bar.
    pub fn bar_dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.prices
            .values()
            .flat_map(|s| s.items().iter().map(|b| b.date))
    }

    pub fn base_currency(&self) -> &str {
        &self.base_currency
    }

    /// Instruments priced from prior position snapshots.
    pub fn fallback_instruments(&self) -> &[InstrumentId] {
        &self.fallbacks
    }
}

fn synthetic_bars(
    instrument: InstrumentId,
    prior_positions: &[PriorPosition],
    from: NaiveDate,
    to: NaiveDate,
) -> Vec<Bar> {
    prior_positions
        .iter()
        .filter(|p| p.instrument_id == instrument && p.date >= from && p.date <= to)
        .map(|p| Bar::flat(p.date, p.price))
        .collect()
}
