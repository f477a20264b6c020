//! Report orchestration: select trades, simulate every scope, build the tables.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use tradelens_core::data::{MarketData, MarketDataRequest, MarketDataSource};
use tradelens_core::domain::{AssetClass, Instrument, InstrumentId, StrategyId, Trade, TradeId};
use tradelens_core::engine::{
    run_simulation, simulation_dates, CapitalLedger, PortfolioTracker, SimulationOutcome,
    TrackerError, TrackerResult, TrackerScope,
};

use crate::report::input::ReportInput;
use crate::report::progress::ProgressSink;
use crate::report::sections::{ReportContext, SECTIONS};
use crate::report::table::ReportTable;
use crate::selection::TradeFilter;
use crate::settings::{ReportSettings, SettingsError};

/// Bumped whenever the serialized `Report` layout changes.
pub const SCHEMA_VERSION: u32 = 1;

/// Share of the progress range spent in the day loop; sections take the rest.
const SIMULATION_PROGRESS: f64 = 60.0;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("no trades match the selection")]
    NoTrades,

    #[error("no equity summaries: cannot compute returns without a capital denominator")]
    NoCapitalData,

    #[error("report generation cancelled")]
    Cancelled,

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Tracker(TrackerError),
}

impl From<TrackerError> for ReportError {
    fn from(e: TrackerError) -> Self {
        match e {
            TrackerError::NoCapitalData => ReportError::NoCapitalData,
            other => ReportError::Tracker(other),
        }
    }
}

/// A report section that failed. The rest of the report is still produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionError {
    pub section: String,
    pub message: String,
}

/// One headline statistic with its formatted value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryLine {
    pub stat: String,
    pub value: Option<f64>,
    pub display: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub schema_version: u32,
    /// First simulated date.
    pub from: NaiveDate,
    /// Last simulated date.
    pub to: NaiveDate,
    pub base_currency: String,
    pub trade_count: usize,
    pub strategies: Vec<String>,
    pub summary: Vec<SummaryLine>,
    pub tables: Vec<ReportTable>,
    pub errors: Vec<SectionError>,
    /// Instruments priced from prior-position snapshots.
    pub fallback_instruments: Vec<InstrumentId>,
}

impl Report {
    pub fn table(&self, name: &str) -> Option<&ReportTable> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Runs one report over a dataset.
///
/// Progress goes to the optional sink; the optional cancel flag is checked
/// between simulated days and between sections.
pub struct ReportGenerator<'a> {
    settings: &'a ReportSettings,
    progress: Option<&'a dyn ProgressSink>,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> ReportGenerator<'a> {
    pub fn new(settings: &'a ReportSettings) -> Self {
        Self {
            settings,
            progress: None,
            cancel: None,
        }
    }

    pub fn with_progress(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_cancel(mut self, cancel: &'a AtomicBool) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn generate(
        &self,
        input: &ReportInput,
        source: &dyn MarketDataSource,
    ) -> Result<Report, ReportError> {
        self.settings.validate()?;

        self.report_progress("Selecting trades", 0.0);
        let trades = TradeFilter::from_settings(&self.settings.selection).apply(&input.trades);
        if trades.is_empty() {
            return Err(ReportError::NoTrades);
        }
        let capital = CapitalLedger::new(&input.equity_summaries)?;

        let event_dates: BTreeSet<NaiveDate> =
            trades.iter().flat_map(|t| t.event_dates()).collect();
        let (Some(&first), Some(&last_event)) = (event_dates.first(), event_dates.last()) else {
            return Err(ReportError::NoTrades);
        };
        let to = self.settings.selection.to.unwrap_or_else(|| {
            capital.dates().last().map_or(last_event, |d| d.max(last_event))
        });
        info!(trades = trades.len(), %first, %to, "generating report");

        self.report_progress("Loading market data", 2.0);
        let instruments = Arc::new(input.instrument_map());
        let mut market = self.load_market(input, &trades, source, first, to);

        let dates = simulation_dates(
            event_dates.iter().copied(),
            market.bar_dates().chain(capital.dates()),
            None,
            to,
        );
        let start_date = first - Duration::days(1);
        let start_capital = capital.yesterday(first);
        let config = Arc::new(self.settings.simulation.to_config());

        let mut by_strategy: BTreeMap<StrategyId, Vec<Trade>> = BTreeMap::new();
        for trade in &trades {
            if let Some(id) = trade.strategy_id {
                by_strategy.entry(id).or_default().push(trade.clone());
            }
        }
        let turnover: HashMap<TradeId, f64> =
            trades.iter().map(|t| (t.id, t.turnover_money())).collect();
        let trade_count = trades.len();

        let mut trackers = Vec::with_capacity(by_strategy.len() + 1);
        trackers.push(PortfolioTracker::new(
            "Total",
            TrackerScope::Total,
            trades,
            instruments.clone(),
            config.clone(),
            start_capital,
            start_date,
        ));
        for (id, strategy_trades) in by_strategy {
            trackers.push(PortfolioTracker::new(
                input.strategy_name(id),
                TrackerScope::Strategy(id),
                strategy_trades,
                instruments.clone(),
                config.clone(),
                start_capital,
                start_date,
            ));
        }

        let day_count = dates.len().max(1) as f64;
        let outcome = run_simulation(
            &mut trackers,
            &mut market,
            &capital,
            &dates,
            self.settings.simulation.parallel,
            |i, date| {
                if self.is_cancelled() {
                    return false;
                }
                let pct = 5.0 + (SIMULATION_PROGRESS - 5.0) * (i + 1) as f64 / day_count;
                self.report_progress(&format!("Simulating {date}"), pct);
                true
            },
        )?;
        if let SimulationOutcome::Stopped { at } = outcome {
            info!(%at, "simulation stopped");
            return Err(ReportError::Cancelled);
        }

        let as_of = dates.last().copied().unwrap_or(to);
        let mut results: Vec<TrackerResult> = trackers.into_iter().map(|t| t.finish(as_of)).collect();
        let strategies = results.split_off(1);
        let Some(total) = results.pop() else {
            return Err(ReportError::NoTrades);
        };

        let ctx = ReportContext {
            settings: self.settings,
            input,
            market: &market,
            total: &total,
            strategies: &strategies,
            turnover: &turnover,
        };
        let (tables, errors) = self.build_sections(&ctx)?;

        let summary = ctx
            .equity_stats(&total)
            .entries()
            .into_iter()
            .chain(ctx.trade_stats(&total).entries())
            .map(|s| SummaryLine {
                stat: s.name.to_string(),
                value: s.value,
                display: s.display(),
            })
            .collect();

        self.report_progress("Report complete", 100.0);
        Ok(Report {
            schema_version: SCHEMA_VERSION,
            from: dates.first().copied().unwrap_or(first),
            to: as_of,
            base_currency: self.settings.simulation.base_currency.clone(),
            trade_count,
            strategies: strategies.iter().map(|s| s.name.clone()).collect(),
            summary,
            tables,
            errors,
            fallback_instruments: market.fallback_instruments().to_vec(),
        })
    }

    fn load_market(
        &self,
        input: &ReportInput,
        trades: &[Trade],
        source: &dyn MarketDataSource,
        from: NaiveDate,
        to: NaiveDate,
    ) -> MarketData {
        let mut ids: BTreeSet<InstrumentId> = trades
            .iter()
            .flat_map(|t| t.orders.iter().map(|o| o.instrument_id))
            .collect();
        if let Some(benchmark) = self.settings.benchmark.instrument {
            ids.insert(benchmark);
        }
        let base_currency = &self.settings.simulation.base_currency;
        let unlisted: Vec<Instrument> = ids
            .iter()
            .filter(|id| !input.instruments.iter().any(|i| i.id == **id))
            .map(|id| {
                warn!(instrument = %id, currency = %base_currency, "no instrument record; fetching as a stock");
                Instrument::new(*id, input.instrument_symbol(*id), AssetClass::Stock)
                    .with_currency(base_currency.clone())
            })
            .collect();
        let instruments: Vec<&Instrument> = input
            .instruments
            .iter()
            .filter(|i| ids.contains(&i.id))
            .chain(unlisted.iter())
            .collect();

        let mut currencies: BTreeSet<String> =
            instruments.iter().map(|i| i.currency.clone()).collect();
        currencies.extend(
            trades
                .iter()
                .flat_map(|t| t.fx_transactions.iter().map(|fx| fx.currency.clone())),
        );

        let request = MarketDataRequest {
            instruments,
            currencies: currencies.into_iter().collect(),
            from,
            to,
            base_currency: self.settings.simulation.base_currency.clone(),
        };
        debug!(
            source = source.name(),
            instruments = request.instruments.len(),
            currencies = request.currencies.len(),
            "fetching market data"
        );
        MarketData::load(source, &request, &input.prior_positions)
    }

    fn build_sections(
        &self,
        ctx: &ReportContext<'_>,
    ) -> Result<(Vec<ReportTable>, Vec<SectionError>), ReportError> {
        let mut tables = Vec::new();
        let mut errors = Vec::new();
        let step = (100.0 - SIMULATION_PROGRESS) / SECTIONS.len() as f64;
        for (i, (name, build)) in SECTIONS.iter().enumerate() {
            if self.is_cancelled() {
                return Err(ReportError::Cancelled);
            }
            self.report_progress(&format!("Building {name}"), SIMULATION_PROGRESS + step * i as f64);
            match build(ctx) {
                Ok(built) => {
                    debug!(section = name, tables = built.len(), "section built");
                    tables.extend(built);
                }
                Err(e) => {
                    error!(section = name, error = %e, "report section failed");
                    errors.push(SectionError {
                        section: name.to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }
        Ok((tables, errors))
    }

    fn report_progress(&self, message: &str, percent: f64) {
        if let Some(sink) = self.progress {
            sink.set_progress(message, percent.clamp(0.0, 100.0));
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(|c| c.load(Ordering::Relaxed))
    }
}
