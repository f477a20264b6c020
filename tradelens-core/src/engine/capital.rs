//! Total account capital over time, from equity summaries.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::TrackerError;
use crate::domain::EquitySummary;

/// Capital summed across accounts. Each account carries its latest summary
/// forward until a newer one appears.
#[derive(Debug, Clone)]
pub struct CapitalLedger {
    totals: BTreeMap<NaiveDate, f64>,
}

impl CapitalLedger {
    pub fn new(summaries: &[EquitySummary]) -> Result<Self, TrackerError> {
        if summaries.is_empty() {
            return Err(TrackerError::NoCapitalData);
        }
        let mut sorted: Vec<&EquitySummary> = summaries.iter().collect();
        sorted.sort_by_key(|s| s.date);

        let mut latest: BTreeMap<Option<&str>, f64> = BTreeMap::new();
        let mut totals = BTreeMap::new();
        for summary in sorted {
            latest.insert(summary.account.as_deref(), summary.total);
            totals.insert(summary.date, latest.values().sum());
        }
        Ok(Self { totals })
    }

    /// Total capital as of the end of `date`.
    pub fn total_at(&self, date: NaiveDate) -> Option<f64> {
        self.totals.range(..=date).next_back().map(|(_, v)| *v)
    }

    /// Capital at the end of the last summary strictly before `date`.
    ///
    /// Before the first summary the earliest known total is used.
    pub fn yesterday(&self, date: NaiveDate) -> f64 {
        self.totals
            .range(..date)
            .next_back()
            .or_else(|| self.totals.iter().next())
            .map(|(_, v)| *v)
            .unwrap_or(0.0)
    }

    /// Earliest known total capital.
    pub fn initial(&self) -> f64 {
        self.totals.values().next().copied().unwrap_or(0.0)
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.totals.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn summary(day: u32, account: &str, total: f64) -> EquitySummary {
        EquitySummary {
            date: d(day),
            account: Some(account.into()),
            total,
        }
    }

    #[test]
    fn empty_summaries_are_fatal() {
        assert!(matches!(CapitalLedger::new(&[]), Err(TrackerError::NoCapitalData)));
    }

    #[test]
    fn sums_accounts_and_carries_forward() {
        let ledger = CapitalLedger::new(&[
            summary(2, "A", 1000.0),
            summary(2, "B", 500.0),
            summary(3, "A", 1100.0),
        ])
        .unwrap();
        assert_eq!(ledger.total_at(d(2)), Some(1500.0));
        assert_eq!(ledger.total_at(d(3)), Some(1600.0));
        assert_eq!(ledger.total_at(d(10)), Some(1600.0));
        assert_eq!(ledger.total_at(d(1)), None);
    }

    #[test]
    fn yesterday_uses_prior_date_or_first() {
        let ledger = CapitalLedger::new(&[summary(2, "A", 1000.0), summary(4, "A", 1200.0)]).unwrap();
        assert_eq!(ledger.yesterday(d(2)), 1000.0);
        assert_eq!(ledger.yesterday(d(3)), 1000.0);
        assert_eq!(ledger.yesterday(d(5)), 1200.0);
        assert_eq!(ledger.initial(), 1000.0);
    }
}
