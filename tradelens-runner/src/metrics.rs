//! Performance metrics — pure functions that compute portfolio statistics.
//!
//! Every metric is a pure function: equity curve and/or trade list in, scalar out.
//! Degenerate inputs (empty series, zero variance, zero drawdown) yield `None`
//! rather than a misleading number; the report omits those rows.

use serde::{Deserialize, Serialize};
use tradelens_core::engine::TradeResult;
use tradelens_core::EquityCurve;

use crate::tail_metrics::skewness;

/// Returns with magnitude below this count as flat periods.
pub const FLAT_EPSILON: f64 = 1e-7;

/// Trading periods per year used for volatility annualization.
pub const PERIODS_PER_YEAR: f64 = 252.0;

/// Profit factor when there are wins but no losses.
pub const PROFIT_FACTOR_CAP: f64 = 100.0;

// ─── Named statistics ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatFormat {
    Percent,
    Ratio,
    Money,
    Count,
    Days,
}

/// One named statistic with its display format.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stat {
    pub name: &'static str,
    pub value: Option<f64>,
    pub format: StatFormat,
}

impl Stat {
    pub fn new(name: &'static str, value: Option<f64>, format: StatFormat) -> Self {
        Self { name, value, format }
    }

    /// Formatted value, `None` when the statistic is undefined.
    pub fn display(&self) -> Option<String> {
        self.value.map(|v| format_value(v, self.format))
    }
}

pub fn format_value(value: f64, format: StatFormat) -> String {
    match format {
        StatFormat::Percent => format!("{:.2}%", value * 100.0),
        StatFormat::Ratio => format!("{value:.2}"),
        StatFormat::Money => format!("{value:.2}"),
        StatFormat::Count => format!("{value:.0}"),
        StatFormat::Days => format!("{value:.1}"),
    }
}

// ─── Equity curve statistics ────────────────────────────────────────

/// Statistics derived from one completed equity curve.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EquityCurveStats {
    pub periods: usize,
    pub total_return: Option<f64>,
    pub cagr: Option<f64>,
    pub mean_return: Option<f64>,
    pub stdev_return: Option<f64>,
    pub skew: Option<f64>,
    pub best_period: Option<f64>,
    pub worst_period: Option<f64>,
    pub annual_volatility: Option<f64>,
    pub sharpe: Option<f64>,
    pub sortino: Option<f64>,
    pub mar: Option<f64>,
    pub k_ratio: Option<f64>,
    pub ulcer_index: Option<f64>,
    pub max_drawdown: Option<f64>,
    pub max_drawdown_dollar: Option<f64>,
    pub longest_drawdown_days: Option<f64>,
    pub pct_up: Option<f64>,
    pub pct_down: Option<f64>,
    pub pct_flat: Option<f64>,
    pub gross_wins: Option<f64>,
    pub gross_losses: Option<f64>,
    pub profit_factor: Option<f64>,
}

impl EquityCurveStats {
    pub fn compute(curve: &EquityCurve, risk_free_rate: f64) -> Self {
        let returns = curve.returns();
        let equity = curve.equity();
        let days = (curve.last_date() - curve.start_date()).num_days();
        if returns.is_empty() {
            return Self::default();
        }

        let cagr = cagr(&equity, days);
        let vol = annual_volatility(&returns);
        let (up, down, flat) = up_down_flat(&returns);
        let (wins, losses) = gross_changes(&equity);
        let max_dd = curve.max_drawdown_pct();

        Self {
            periods: returns.len(),
            total_return: Some(curve.total_return()),
            cagr,
            mean_return: Some(mean_f64(&returns)),
            stdev_return: (returns.len() >= 2).then(|| std_dev(&returns)),
            skew: skewness(&returns),
            best_period: returns.iter().copied().reduce(f64::max),
            worst_period: returns.iter().copied().reduce(f64::min),
            annual_volatility: vol,
            sharpe: sharpe_ratio(cagr, vol, risk_free_rate),
            sortino: sortino_ratio(cagr, &returns, risk_free_rate),
            mar: mar_ratio(cagr, max_dd),
            k_ratio: k_ratio(&equity),
            ulcer_index: Some(ulcer_index(&curve.drawdown_pct())),
            max_drawdown: Some(max_dd),
            max_drawdown_dollar: Some(curve.max_drawdown_dollar()),
            longest_drawdown_days: curve
                .drawdown_episodes()
                .iter()
                .map(|e| e.length_days as f64)
                .reduce(f64::max),
            pct_up: Some(up),
            pct_down: Some(down),
            pct_flat: Some(flat),
            gross_wins: Some(wins),
            gross_losses: Some(losses),
            profit_factor: profit_factor(wins, losses),
        }
    }

    pub fn entries(&self) -> Vec<Stat> {
        use StatFormat::*;
        vec![
            Stat::new("Periods", Some(self.periods as f64), Count),
            Stat::new("Total Period Return", self.total_return, Percent),
            Stat::new("CAGR", self.cagr, Percent),
            Stat::new("Mean Period Return", self.mean_return, Percent),
            Stat::new("Stdev Period Return", self.stdev_return, Percent),
            Stat::new("Skew", self.skew, Ratio),
            Stat::new("Best Period", self.best_period, Percent),
            Stat::new("Worst Period", self.worst_period, Percent),
            Stat::new("Annualized Volatility", self.annual_volatility, Percent),
            Stat::new("Sharpe Ratio", self.sharpe, Ratio),
            Stat::new("Sortino Ratio", self.sortino, Ratio),
            Stat::new("MAR Ratio", self.mar, Ratio),
            Stat::new("K-Ratio", self.k_ratio, Ratio),
            Stat::new("Ulcer Index", self.ulcer_index, Percent),
            Stat::new("Max Drawdown", self.max_drawdown, Percent),
            Stat::new("Max Drawdown $", self.max_drawdown_dollar, Money),
            Stat::new("Longest Drawdown (days)", self.longest_drawdown_days, Days),
            Stat::new("% Up Periods", self.pct_up, Percent),
            Stat::new("% Down Periods", self.pct_down, Percent),
            Stat::new("% Flat Periods", self.pct_flat, Percent),
            Stat::new("Gross Wins $", self.gross_wins, Money),
            Stat::new("Gross Losses $", self.gross_losses, Money),
            Stat::new("Profit Factor", self.profit_factor, Ratio),
        ]
    }
}

// ─── Trade statistics ───────────────────────────────────────────────

/// Statistics over the closed trades of a scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeStatistics {
    pub trade_count: usize,
    pub winners: usize,
    pub losers: usize,
    pub win_rate: Option<f64>,
    pub total_pnl: f64,
    pub avg_win: Option<f64>,
    pub avg_loss: Option<f64>,
    pub avg_win_pct: Option<f64>,
    pub avg_loss_pct: Option<f64>,
    pub largest_win: Option<f64>,
    pub largest_loss: Option<f64>,
    pub risk_reward: Option<f64>,
    pub profit_factor: Option<f64>,
    pub sqn: Option<f64>,
    pub turnover: Option<f64>,
    pub avg_holding_days: Option<f64>,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub avg_losing_streak: Option<f64>,
}

impl TradeStatistics {
    /// `turnover_money` is the summed absolute order notional of the trades,
    /// `average_capital` the mean total capital over `days` calendar days.
    pub fn compute(
        trades: &[&TradeResult],
        turnover_money: f64,
        average_capital: f64,
        days: i64,
    ) -> Self {
        let closed: Vec<&TradeResult> = trades.iter().copied().filter(|t| !t.open).collect();
        let pnls: Vec<f64> = closed.iter().map(|t| t.pnl).collect();
        let wins: Vec<&TradeResult> = closed.iter().copied().filter(|t| t.pnl > 0.0).collect();
        let losses: Vec<&TradeResult> = closed.iter().copied().filter(|t| t.pnl <= 0.0).collect();

        let avg_win = mean_of(&wins, |t| t.pnl);
        let avg_loss = mean_of(&losses, |t| t.pnl);
        let gross_win: f64 = wins.iter().map(|t| t.pnl).sum();
        let gross_loss: f64 = losses.iter().map(|t| t.pnl.abs()).sum();
        let flags: Vec<bool> = pnls.iter().map(|p| *p > 0.0).collect();

        Self {
            trade_count: closed.len(),
            winners: wins.len(),
            losers: losses.len(),
            win_rate: win_rate(&flags),
            total_pnl: pnls.iter().sum(),
            avg_win,
            avg_loss,
            avg_win_pct: mean_of(&wins, |t| t.ret),
            avg_loss_pct: mean_of(&losses, |t| t.ret),
            largest_win: wins.iter().map(|t| t.pnl).reduce(f64::max),
            largest_loss: losses.iter().map(|t| t.pnl).reduce(f64::min),
            risk_reward: match (avg_win, avg_loss) {
                (Some(w), Some(l)) if l.abs() > 1e-12 => Some(w / l.abs()),
                _ => None,
            },
            profit_factor: profit_factor(gross_win, gross_loss),
            sqn: system_quality_number(&pnls),
            turnover: turnover(turnover_money, average_capital, days),
            avg_holding_days: mean_of(&closed, |t| t.holding_days as f64),
            max_consecutive_wins: max_consecutive(&flags, true),
            max_consecutive_losses: max_consecutive(&flags, false),
            avg_losing_streak: avg_losing_streak(&flags),
        }
    }

    pub fn entries(&self) -> Vec<Stat> {
        use StatFormat::*;
        vec![
            Stat::new("Closed Trades", Some(self.trade_count as f64), Count),
            Stat::new("Winners", Some(self.winners as f64), Count),
            Stat::new("Losers", Some(self.losers as f64), Count),
            Stat::new("Win Rate", self.win_rate, Percent),
            Stat::new("Total P&L", Some(self.total_pnl), Money),
            Stat::new("Average Win", self.avg_win, Money),
            Stat::new("Average Loss", self.avg_loss, Money),
            Stat::new("Average Win %", self.avg_win_pct, Percent),
            Stat::new("Average Loss %", self.avg_loss_pct, Percent),
            Stat::new("Largest Win", self.largest_win, Money),
            Stat::new("Largest Loss", self.largest_loss, Money),
            Stat::new("Risk:Reward", self.risk_reward, Ratio),
            Stat::new("Profit Factor", self.profit_factor, Ratio),
            Stat::new("SQN", self.sqn, Ratio),
            Stat::new("Annual Turnover", self.turnover, Ratio),
            Stat::new("Average Holding (days)", self.avg_holding_days, Days),
            Stat::new("Max Consecutive Wins", Some(self.max_consecutive_wins as f64), Count),
            Stat::new("Max Consecutive Losses", Some(self.max_consecutive_losses as f64), Count),
            Stat::new("Average Losing Streak", self.avg_losing_streak, Days),
        ]
    }
}

fn mean_of(set: &[&TradeResult], f: impl Fn(&TradeResult) -> f64) -> Option<f64> {
    (!set.is_empty()).then(|| set.iter().map(|t| f(t)).sum::<f64>() / set.len() as f64)
}

// ─── Individual metric functions ────────────────────────────────────

/// Compound annual growth rate over `days` calendar days.
pub fn cagr(equity: &[f64], days: i64) -> Option<f64> {
    let (first, last) = (*equity.first()?, *equity.last()?);
    if days <= 0 || first <= 0.0 || last <= 0.0 {
        return None;
    }
    let value = (last / first).powf(365.0 / days as f64) - 1.0;
    value.is_finite().then_some(value)
}

/// Sample standard deviation annualized by `sqrt(252)`.
pub fn annual_volatility(returns: &[f64]) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    Some(std_dev(returns) * PERIODS_PER_YEAR.sqrt())
}

/// Sharpe = (CAGR - rf) / annualized volatility.
pub fn sharpe_ratio(cagr: Option<f64>, volatility: Option<f64>, risk_free_rate: f64) -> Option<f64> {
    let (c, v) = (cagr?, volatility?);
    if v < 1e-15 {
        return None;
    }
    Some((c - risk_free_rate) / v)
}

/// Sortino = (CAGR - rf) / annualized downside deviation.
///
/// Downside deviation uses only negative periods in the numerator but the
/// full period count in the denominator.
pub fn sortino_ratio(cagr: Option<f64>, returns: &[f64], risk_free_rate: f64) -> Option<f64> {
    let c = cagr?;
    if returns.len() < 2 {
        return None;
    }
    let downside_sq: f64 = returns.iter().filter(|r| **r < 0.0).map(|r| r * r).sum();
    let downside = (downside_sq / returns.len() as f64).sqrt() * PERIODS_PER_YEAR.sqrt();
    if downside < 1e-15 {
        return None;
    }
    Some((c - risk_free_rate) / downside)
}

/// MAR = CAGR / -max drawdown.
pub fn mar_ratio(cagr: Option<f64>, max_drawdown: f64) -> Option<f64> {
    let c = cagr?;
    if max_drawdown >= -1e-12 {
        return None;
    }
    Some(c / -max_drawdown)
}

/// Slope of log-equity regressed on the period index divided by its standard error.
pub fn k_ratio(equity: &[f64]) -> Option<f64> {
    let n = equity.len();
    if n < 3 || equity.iter().any(|e| *e <= 0.0) {
        return None;
    }
    let ys: Vec<f64> = equity.iter().map(|e| e.ln()).collect();
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = mean_f64(&ys);
    let (mut sxx, mut sxy) = (0.0, 0.0);
    for (i, y) in ys.iter().enumerate() {
        let dx = i as f64 - x_mean;
        sxx += dx * dx;
        sxy += dx * (y - y_mean);
    }
    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;
    let sse: f64 = ys
        .iter()
        .enumerate()
        .map(|(i, y)| (y - (intercept + slope * i as f64)).powi(2))
        .sum();
    let std_err = (sse / (n - 2) as f64 / sxx).sqrt();
    if std_err < 1e-15 {
        return None;
    }
    Some(slope / std_err)
}

/// `sqrt(mean(drawdown²))` over the percentage drawdown series.
pub fn ulcer_index(drawdown_pct: &[f64]) -> f64 {
    if drawdown_pct.is_empty() {
        return 0.0;
    }
    (drawdown_pct.iter().map(|d| d * d).sum::<f64>() / drawdown_pct.len() as f64).sqrt()
}

/// Fractions of up, down and flat periods.
pub fn up_down_flat(returns: &[f64]) -> (f64, f64, f64) {
    if returns.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let n = returns.len() as f64;
    let flat = returns.iter().filter(|r| r.abs() < FLAT_EPSILON).count() as f64;
    let up = returns.iter().filter(|r| **r >= FLAT_EPSILON).count() as f64;
    (up / n, (n - up - flat) / n, flat / n)
}

/// Summed positive and absolute negative equity changes.
pub fn gross_changes(equity: &[f64]) -> (f64, f64) {
    equity.windows(2).fold((0.0, 0.0), |(w, l), pair| {
        let change = pair[1] - pair[0];
        if change > 0.0 {
            (w + change, l)
        } else {
            (w, l - change)
        }
    })
}

/// Gross wins / gross losses, capped when there are no losses.
pub fn profit_factor(gross_wins: f64, gross_losses: f64) -> Option<f64> {
    if gross_losses < 1e-10 {
        return (gross_wins > 0.0).then_some(PROFIT_FACTOR_CAP);
    }
    Some((gross_wins / gross_losses).min(PROFIT_FACTOR_CAP))
}

/// Fraction of winning trades.
pub fn win_rate(winners: &[bool]) -> Option<f64> {
    if winners.is_empty() {
        return None;
    }
    Some(winners.iter().filter(|w| **w).count() as f64 / winners.len() as f64)
}

/// `sqrt(n) * mean(P&L) / stdev(P&L)`.
pub fn system_quality_number(pnls: &[f64]) -> Option<f64> {
    if pnls.len() < 2 {
        return None;
    }
    let sd = std_dev(pnls);
    if sd < 1e-12 {
        return None;
    }
    Some((pnls.len() as f64).sqrt() * mean_f64(pnls) / sd)
}

/// Annual turnover: half the traded notional over average capital, scaled by `365/days`.
pub fn turnover(turnover_money: f64, average_capital: f64, days: i64) -> Option<f64> {
    if average_capital <= 0.0 || days <= 0 {
        return None;
    }
    Some(turnover_money / 2.0 / average_capital * 365.0 / days as f64)
}

/// Longest run of trades whose win flag equals `winners`.
pub fn max_consecutive(flags: &[bool], winners: bool) -> usize {
    let mut max_streak = 0;
    let mut current = 0;
    for &flag in flags {
        if flag == winners {
            current += 1;
            max_streak = max_streak.max(current);
        } else {
            current = 0;
        }
    }
    max_streak
}

/// Average length of losing streaks.
pub fn avg_losing_streak(flags: &[bool]) -> Option<f64> {
    let mut streaks: Vec<usize> = Vec::new();
    let mut current = 0;
    for &won in flags {
        if !won {
            current += 1;
        } else {
            if current > 0 {
                streaks.push(current);
            }
            current = 0;
        }
    }
    if current > 0 {
        streaks.push(current);
    }
    if streaks.is_empty() {
        return None;
    }
    Some(streaks.iter().sum::<usize>() as f64 / streaks.len() as f64)
}

// ─── Helpers ────────────────────────────────────────────────────────

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Linear interpolation between closest ranks of an ascending slice.
pub(crate) fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n == 1 {
        return sorted[0];
    }
    let rank = (p / 100.0) * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = rank - lo as f64;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}

pub(crate) fn sort_f64(values: &mut [f64]) {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::BTreeSet;
    use tradelens_core::domain::TradeId;

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(n)
    }

    fn curve_from(returns: &[f64]) -> EquityCurve {
        let mut curve = EquityCurve::from_returns(
            100.0,
            day(0),
            returns.iter().enumerate().map(|(i, r)| (day(i as i64 + 1), *r)),
        )
        .unwrap();
        curve.calc_final_values(day(returns.len() as i64));
        curve
    }

    fn make_trade(id: u64, pnl: f64) -> TradeResult {
        TradeResult {
            trade_id: TradeId(id),
            name: format!("T{id}"),
            strategy_id: None,
            tags: BTreeSet::new(),
            open: false,
            ret: pnl / 1000.0,
            mae: 0.0,
            mfe: 0.0,
            pnl,
            unrealized_pnl: 0.0,
            unrealized_pnl_long: 0.0,
            unrealized_pnl_short: 0.0,
            peak_capital: 1000.0,
            holding_days: 5,
            path: Vec::new(),
        }
    }

    fn stat<'a>(stats: &'a [Stat], name: &str) -> &'a Stat {
        stats.iter().find(|s| s.name == name).unwrap()
    }

    // ── Equity curve statistics ──

    #[test]
    fn two_point_curve_total_period_return() {
        let curve = curve_from(&[0.10]);
        let stats = EquityCurveStats::compute(&curve, 0.0);
        let entries = stats.entries();
        assert_eq!(
            stat(&entries, "Total Period Return").display().as_deref(),
            Some("10.00%")
        );
        assert_eq!(stats.periods, 1);
        // a single period has no dispersion
        assert_eq!(stats.stdev_return, None);
        assert_eq!(stats.sharpe, None);
    }

    #[test]
    fn start_only_curve_is_empty_stats() {
        let curve = curve_from(&[]);
        let stats = EquityCurveStats::compute(&curve, 0.0);
        assert_eq!(stats, EquityCurveStats::default());
    }

    #[test]
    fn best_worst_and_counts() {
        let curve = curve_from(&[0.01, -0.02, 0.0, 0.03, 0.0]);
        let stats = EquityCurveStats::compute(&curve, 0.0);
        assert_eq!(stats.best_period, Some(0.03));
        assert_eq!(stats.worst_period, Some(-0.02));
        assert!((stats.pct_up.unwrap() - 0.4).abs() < 1e-12);
        assert!((stats.pct_down.unwrap() - 0.2).abs() < 1e-12);
        assert!((stats.pct_flat.unwrap() - 0.4).abs() < 1e-12);
        assert!(stats.max_drawdown.unwrap() < 0.0);
        assert!(stats.mar.is_some());
    }

    #[test]
    fn no_drawdown_omits_mar() {
        let curve = curve_from(&[0.01, 0.02, 0.01]);
        let stats = EquityCurveStats::compute(&curve, 0.0);
        assert_eq!(stats.max_drawdown, Some(0.0));
        assert_eq!(stats.mar, None);
        assert_eq!(stats.sortino, None);
        assert_eq!(stats.profit_factor, Some(PROFIT_FACTOR_CAP));
    }

    #[test]
    fn cagr_over_one_year() {
        let equity = vec![100.0, 110.0];
        let c = cagr(&equity, 365).unwrap();
        assert!((c - 0.10).abs() < 1e-12);
        assert_eq!(cagr(&equity, 0), None);
        assert_eq!(cagr(&[100.0, 0.0], 365), None);
    }

    #[test]
    fn sharpe_uses_cagr_over_volatility() {
        let s = sharpe_ratio(Some(0.12), Some(0.2), 0.02).unwrap();
        assert!((s - 0.5).abs() < 1e-12);
        assert_eq!(sharpe_ratio(Some(0.12), Some(0.0), 0.0), None);
        assert_eq!(sharpe_ratio(None, Some(0.2), 0.0), None);
    }

    #[test]
    fn k_ratio_steady_growth_with_noise_is_positive() {
        let mut eq = vec![100.0];
        for i in 1..100 {
            let r = if i % 2 == 0 { 1.004 } else { 0.999 };
            eq.push(eq[i - 1] * r);
        }
        assert!(k_ratio(&eq).unwrap() > 0.0);
    }

    #[test]
    fn k_ratio_perfect_fit_is_undefined() {
        let eq: Vec<f64> = (0..50).map(|i| 100.0 * 1.01_f64.powi(i)).collect();
        assert_eq!(k_ratio(&eq), None);
        assert_eq!(k_ratio(&[100.0, 101.0]), None);
    }

    #[test]
    fn ulcer_index_known() {
        let dd = vec![0.0, -0.1, -0.2, 0.0];
        let expected = ((0.01 + 0.04) / 4.0_f64).sqrt();
        assert!((ulcer_index(&dd) - expected).abs() < 1e-12);
        assert_eq!(ulcer_index(&[]), 0.0);
    }

    #[test]
    fn gross_changes_split_by_sign() {
        let (w, l) = gross_changes(&[100.0, 110.0, 105.0, 108.0]);
        assert!((w - 13.0).abs() < 1e-12);
        assert!((l - 5.0).abs() < 1e-12);
    }

    // ── Trade statistics ──

    #[test]
    fn trade_stats_mixed() {
        let trades = vec![
            make_trade(1, 500.0),
            make_trade(2, -200.0),
            make_trade(3, 300.0),
            make_trade(4, -100.0),
        ];
        let refs: Vec<&TradeResult> = trades.iter().collect();
        let stats = TradeStatistics::compute(&refs, 20_000.0, 100_000.0, 365);
        assert_eq!(stats.trade_count, 4);
        assert!((stats.win_rate.unwrap() - 0.5).abs() < 1e-12);
        assert!((stats.avg_win.unwrap() - 400.0).abs() < 1e-12);
        assert!((stats.avg_loss.unwrap() + 150.0).abs() < 1e-12);
        assert!((stats.risk_reward.unwrap() - 400.0 / 150.0).abs() < 1e-12);
        assert!((stats.profit_factor.unwrap() - 800.0 / 300.0).abs() < 1e-12);
        assert!((stats.turnover.unwrap() - 0.1).abs() < 1e-12);
        assert_eq!(stats.max_consecutive_wins, 1);
        assert_eq!(stats.avg_holding_days, Some(5.0));
    }

    #[test]
    fn trade_stats_skip_open_trades() {
        let mut open = make_trade(9, 1_000.0);
        open.open = true;
        let closed = make_trade(1, -50.0);
        let stats = TradeStatistics::compute(&[&open, &closed], 0.0, 0.0, 0);
        assert_eq!(stats.trade_count, 1);
        assert_eq!(stats.win_rate, Some(0.0));
        assert_eq!(stats.turnover, None);
        assert_eq!(stats.profit_factor, Some(0.0));
    }

    #[test]
    fn trade_stats_empty() {
        let stats = TradeStatistics::compute(&[], 0.0, 0.0, 0);
        assert_eq!(stats.trade_count, 0);
        assert_eq!(stats.win_rate, None);
        assert_eq!(stats.sqn, None);
    }

    #[test]
    fn sqn_known() {
        let pnls = vec![100.0, -50.0, 200.0, 50.0];
        let expected = 2.0 * mean_f64(&pnls) / std_dev(&pnls);
        assert!((system_quality_number(&pnls).unwrap() - expected).abs() < 1e-12);
    }

    // ── Consecutive wins/losses ──

    #[test]
    fn consecutive_streaks() {
        let flags = [true, true, true, false, true, false, false];
        assert_eq!(max_consecutive(&flags, true), 3);
        assert_eq!(max_consecutive(&flags, false), 2);
        assert_eq!(avg_losing_streak(&flags), Some(1.5));
        assert_eq!(avg_losing_streak(&[true, true]), None);
    }

    // ── Formatting ──

    #[test]
    fn stat_formats() {
        assert_eq!(format_value(0.1234, StatFormat::Percent), "12.34%");
        assert_eq!(format_value(1.5, StatFormat::Ratio), "1.50");
        assert_eq!(format_value(3.0, StatFormat::Count), "3");
        assert_eq!(Stat::new("x", None, StatFormat::Ratio).display(), None);
    }

    #[test]
    fn percentile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile_sorted(&sorted, 50.0), 3.0);
        assert!((percentile_sorted(&sorted, 25.0) - 2.0).abs() < 1e-12);
        assert!((percentile_sorted(&sorted, 10.0) - 1.4).abs() < 1e-12);
        assert_eq!(percentile_sorted(&[], 50.0), 0.0);
    }
}
