//! The day loop shared by every tracker of a report run.
//!
//! For each date: advance market cursors, then let every tracker process and
//! close the day. Trackers only read `MarketData` while the day is being
//! processed, so they can run on the rayon pool; cursors move only once all of
//! them have closed the day.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::debug;

use super::capital::CapitalLedger;
use super::portfolio_tracker::PortfolioTracker;
use super::TrackerError;
use crate::data::MarketData;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationOutcome {
    Completed,
    /// The day callback asked to stop after this date.
    Stopped { at: NaiveDate },
}

/// Dates to simulate: every event, bar and capital date from the first event
/// through `to`, optionally clipped at `from`.
pub fn simulation_dates(
    event_dates: impl IntoIterator<Item = NaiveDate>,
    other_dates: impl IntoIterator<Item = NaiveDate>,
    from: Option<NaiveDate>,
    to: NaiveDate,
) -> Vec<NaiveDate> {
    let events: BTreeSet<NaiveDate> = event_dates.into_iter().collect();
    let Some(first_event) = events.iter().next().copied() else {
        return Vec::new();
    };
    let start = from.map_or(first_event, |f| f.max(first_event));
    events
        .into_iter()
        .chain(other_dates)
        .filter(|d| *d >= start && *d <= to)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Run every tracker over `dates`.
///
/// `on_day(index, date)` is called after each closed day; returning `false`
/// stops the loop.
pub fn run_simulation(
    trackers: &mut [PortfolioTracker],
    market: &mut MarketData,
    capital: &CapitalLedger,
    dates: &[NaiveDate],
    parallel: bool,
    mut on_day: impl FnMut(usize, NaiveDate) -> bool,
) -> Result<SimulationOutcome, TrackerError> {
    debug!(days = dates.len(), trackers = trackers.len(), parallel, "starting simulation");
    for (i, &date) in dates.iter().enumerate() {
        market.progress_to(date);
        let prev_total = capital.yesterday(date);
        let market: &MarketData = market;

        let step = |tracker: &mut PortfolioTracker| -> Result<(), TrackerError> {
            tracker.process_items_at(date)?;
            tracker.on_day_close(date, market, prev_total)?;
            Ok(())
        };
        if parallel {
            trackers.par_iter_mut().try_for_each(step)?;
        } else {
            trackers.iter_mut().try_for_each(step)?;
        }

        if !on_day(i, date) {
            return Ok(SimulationOutcome::Stopped { at: date });
        }
    }
    Ok(SimulationOutcome::Completed)
}
