//! EquityCurve — append-only return series with compounding equity and drawdowns.
//!
//! Index 0 is the starting point (return 0, equity = start value). Every later
//! point satisfies `equity[i] = equity[i-1] * (1 + return[i])` and is dated
//! strictly after its predecessor.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Drawdowns shallower than this are treated as at-peak.
const DRAWDOWN_EPSILON: f64 = 1e-12;

#[derive(Debug, Error, PartialEq)]
pub enum CurveError {
    #[error("date {date} is not after the last curve date {last}")]
    NonIncreasingDate { date: NaiveDate, last: NaiveDate },

    #[error("non-finite return {value} on {date}")]
    NonFiniteReturn { date: NaiveDate, value: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub date: NaiveDate,
    pub ret: f64,
    pub equity: f64,
    /// `equity / running_peak - 1`, zero or negative.
    pub drawdown_pct: f64,
    /// `equity - running_peak`, zero or negative.
    pub drawdown_dollar: f64,
}

/// Compounded return over a calendar month or year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodReturn {
    pub year: i32,
    /// `None` for annual buckets.
    pub month: Option<u32>,
    pub ret: f64,
}

/// A maximal run of points below the prior peak.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawdownEpisode {
    /// Date of the peak the episode is measured from.
    pub start: NaiveDate,
    pub trough: NaiveDate,
    /// Recovery date, or the last curve date when unrecovered.
    pub end: NaiveDate,
    pub depth_pct: f64,
    pub depth_dollar: f64,
    pub length_days: i64,
    pub recovered: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquityCurve {
    start_value: f64,
    points: Vec<CurvePoint>,
    peak: f64,
    monthly: Vec<PeriodReturn>,
    annual: Vec<PeriodReturn>,
    drawdowns: Vec<DrawdownEpisode>,
}

impl EquityCurve {
    pub fn new(start_value: f64, start_date: NaiveDate) -> Self {
        Self {
            start_value,
            points: vec![CurvePoint {
                date: start_date,
                ret: 0.0,
                equity: start_value,
                drawdown_pct: 0.0,
                drawdown_dollar: 0.0,
            }],
            peak: start_value,
            monthly: Vec::new(),
            annual: Vec::new(),
            drawdowns: Vec::new(),
        }
    }

    /// Rebuild a curve from `(date, return)` pairs after the starting point.
    pub fn from_returns(
        start_value: f64,
        start_date: NaiveDate,
        returns: impl IntoIterator<Item = (NaiveDate, f64)>,
    ) -> Result<Self, CurveError> {
        let mut curve = Self::new(start_value, start_date);
        for (date, ret) in returns {
            curve.add_return(ret, date)?;
        }
        Ok(curve)
    }

    /// Append one period.
    pub fn add_return(&mut self, ret: f64, date: NaiveDate) -> Result<(), CurveError> {
        if !ret.is_finite() {
            return Err(CurveError::NonFiniteReturn { date, value: ret });
        }
        let last = self.last_point();
        if date <= last.date {
            return Err(CurveError::NonIncreasingDate {
                date,
                last: last.date,
            });
        }

        let equity = last.equity * (1.0 + ret);
        if equity > self.peak {
            self.peak = equity;
        }
        let drawdown_pct = if self.peak.abs() < f64::EPSILON {
            0.0
        } else {
            (equity / self.peak - 1.0).min(0.0)
        };
        self.points.push(CurvePoint {
            date,
            ret,
            equity,
            drawdown_pct,
            drawdown_dollar: (equity - self.peak).min(0.0),
        });
        Ok(())
    }

    /// Append a dollar change, converted to a return on the previous equity.
    pub fn add_change(&mut self, amount: f64, date: NaiveDate) -> Result<(), CurveError> {
        let prev = self.last_point().equity;
        let ret = if prev.abs() < f64::EPSILON {
            0.0
        } else {
            amount / prev
        };
        self.add_return(ret, date)
    }

    /// Build the month/year tables and drawdown episodes from points up to `as_of`.
    pub fn calc_final_values(&mut self, as_of: NaiveDate) {
        let points: Vec<CurvePoint> = self
            .points
            .iter()
            .copied()
            .take_while(|p| p.date <= as_of)
            .collect();

        self.monthly = compound_buckets(&points[1.min(points.len())..], |d| {
            (d.year(), Some(d.month()))
        });
        self.annual = compound_buckets(&points[1.min(points.len())..], |d| (d.year(), None));
        self.drawdowns = drawdown_episodes(&points);
    }

    fn last_point(&self) -> CurvePoint {
        // points is never empty: `new` seeds the starting point
        self.points[self.points.len() - 1]
    }

    pub fn start_value(&self) -> f64 {
        self.start_value
    }

    pub fn start_date(&self) -> NaiveDate {
        self.points[0].date
    }

    pub fn last_date(&self) -> NaiveDate {
        self.last_point().date
    }

    pub fn last_equity(&self) -> f64 {
        self.last_point().equity
    }

    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when only the starting point exists.
    pub fn is_empty(&self) -> bool {
        self.points.len() <= 1
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    pub fn equity(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.equity).collect()
    }

    /// Per-period returns, excluding the starting point.
    pub fn returns(&self) -> Vec<f64> {
        self.points.iter().skip(1).map(|p| p.ret).collect()
    }

    pub fn dated_returns(&self) -> Vec<(NaiveDate, f64)> {
        self.points.iter().skip(1).map(|p| (p.date, p.ret)).collect()
    }

    pub fn drawdown_pct(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.drawdown_pct).collect()
    }

    pub fn drawdown_dollar(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.drawdown_dollar).collect()
    }

    /// Deepest percentage drawdown, as a non-positive fraction.
    pub fn max_drawdown_pct(&self) -> f64 {
        self.points
            .iter()
            .map(|p| p.drawdown_pct)
            .fold(0.0, f64::min)
    }

    pub fn max_drawdown_dollar(&self) -> f64 {
        self.points
            .iter()
            .map(|p| p.drawdown_dollar)
            .fold(0.0, f64::min)
    }

    pub fn total_return(&self) -> f64 {
        if self.start_value.abs() < f64::EPSILON {
            return 0.0;
        }
        self.last_equity() / self.start_value - 1.0
    }

    pub fn monthly_returns(&self) -> &[PeriodReturn] {
        &self.monthly
    }

    pub fn annual_returns(&self) -> &[PeriodReturn] {
        &self.annual
    }

    pub fn drawdown_episodes(&self) -> &[DrawdownEpisode] {
        &self.drawdowns
    }
}

fn compound_buckets(
    points: &[CurvePoint],
    key: impl Fn(NaiveDate) -> (i32, Option<u32>),
) -> Vec<PeriodReturn> {
    let mut out: Vec<PeriodReturn> = Vec::new();
    for p in points {
        let (year, month) = key(p.date);
        match out.last_mut() {
            Some(bucket) if bucket.year == year && bucket.month == month => {
                bucket.ret = (1.0 + bucket.ret) * (1.0 + p.ret) - 1.0;
            }
            _ => out.push(PeriodReturn {
                year,
                month,
                ret: p.ret,
            }),
        }
    }
    out
}

fn drawdown_episodes(points: &[CurvePoint]) -> Vec<DrawdownEpisode> {
    let mut episodes = Vec::new();
    let Some(first) = points.first() else {
        return episodes;
    };

    let mut peak_date = first.date;
    let mut open: Option<DrawdownEpisode> = None;

    for p in points {
        let below = p.drawdown_pct < -DRAWDOWN_EPSILON;
        if !below {
            if let Some(mut ep) = open.take() {
                ep.end = p.date;
                ep.recovered = true;
                ep.length_days = (ep.end - ep.start).num_days();
                episodes.push(ep);
            }
            peak_date = p.date;
            continue;
        }
        match open.as_mut() {
            Some(ep) => {
                if p.drawdown_pct < ep.depth_pct {
                    ep.depth_pct = p.drawdown_pct;
                    ep.depth_dollar = p.drawdown_dollar;
                    ep.trough = p.date;
                }
                ep.end = p.date;
            }
            None => {
                open = Some(DrawdownEpisode {
                    start: peak_date,
                    trough: p.date,
                    end: p.date,
                    depth_pct: p.drawdown_pct,
                    depth_dollar: p.drawdown_dollar,
                    length_days: 0,
                    recovered: false,
                });
            }
        }
    }

    if let Some(mut ep) = open {
        ep.length_days = (ep.end - ep.start).num_days();
        episodes.push(ep);
    }
    episodes
}
