//! Date-ordered series with a forward-only cursor.
//!
//! The simulation advances every series to the day being processed, then reads
//! the current element. No interpolation: before the first element there is no
//! current value.

use chrono::NaiveDate;

use crate::domain::{Bar, FxRate};

pub trait Dated {
    fn date(&self) -> NaiveDate;
}

impl Dated for Bar {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

impl Dated for FxRate {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

#[derive(Debug, Clone)]
pub struct TimeSeries<T> {
    items: Vec<T>,
    cursor: Option<usize>,
}

impl<T: Dated> TimeSeries<T> {
    /// Sorts by date. When two items share a date the later one wins.
    pub fn new(mut items: Vec<T>) -> Self {
        items.sort_by_key(|item| item.date());
        let mut deduped: Vec<T> = Vec::with_capacity(items.len());
        for item in items {
            match deduped.last_mut() {
                Some(last) if last.date() == item.date() => *last = item,
                _ => deduped.push(item),
            }
        }
        Self {
            items: deduped,
            cursor: None,
        }
    }

    /// Move the cursor to the last item dated at or before `date`.
    ///
    /// The cursor never moves backwards.
    pub fn progress_to(&mut self, date: NaiveDate) {
        let mut next = self.cursor.map_or(0, |c| c + 1);
        while next < self.items.len() && self.items[next].date() <= date {
            self.cursor = Some(next);
            next += 1;
        }
    }

    pub fn current(&self) -> Option<&T> {
        self.cursor.map(|c| &self.items[c])
    }

    pub fn reset(&mut self) {
        self.cursor = None;
    }

    /// Last item at or before `date`, independent of the cursor.
    pub fn at_or_before(&self, date: NaiveDate) -> Option<&T> {
        let idx = self.items.partition_point(|item| item.date() <= date);
        idx.checked_sub(1).map(|i| &self.items[i])
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.items.first().map(Dated::date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.items.last().map(Dated::date)
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
