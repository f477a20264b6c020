//! Report sections: each turns the finished trackers into one or more tables.
//!
//! A section fails on its own. The generator records the failure and carries on
//! with the next one.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use thiserror::Error;
use tradelens_core::data::MarketData;
use tradelens_core::domain::TradeId;
use tradelens_core::engine::{CurveKind, PositionKey, TrackerResult, TradeResult};
use tradelens_core::EquityCurve;

use crate::benchmark::{close_returns, compare_to_backtest, BenchmarkStats};
use crate::correlation::CorrelationMatrix;
use crate::mds::{self, MdsError};
use crate::metrics::{mean_f64, EquityCurveStats, Stat, StatFormat, TradeStatistics};
use crate::monte_carlo::{run_monte_carlo, BootstrapConfig, MonteCarloError, PercentileBand};
use crate::report::input::ReportInput;
use crate::report::table::{Cell, ReportTable};
use crate::settings::{ReportSettings, ReturnBasis};
use crate::tail_metrics::{compute_tail_metrics, value_at_risk};

#[derive(Debug, Error)]
pub enum SectionFailure {
    #[error(transparent)]
    MonteCarlo(#[from] MonteCarloError),

    #[error(transparent)]
    Mds(#[from] MdsError),

    #[error("{0}")]
    Unavailable(String),
}

pub(crate) type SectionResult = Result<Vec<ReportTable>, SectionFailure>;

type SectionFn = fn(&ReportContext<'_>) -> SectionResult;

/// Every section in report order.
pub(crate) const SECTIONS: &[(&str, SectionFn)] = &[
    ("equity", equity_section),
    ("trades", trade_section),
    ("strategies", strategy_section),
    ("strategy_similarity", similarity_section),
    ("capital", capital_section),
    ("periods", period_section),
    ("instruments", instrument_section),
    ("tags", tag_section),
    ("value_at_risk", value_at_risk_section),
    ("monte_carlo", monte_carlo_section),
    ("benchmark", benchmark_section),
    ("backtest", backtest_section),
];

/// Everything a section may read.
pub(crate) struct ReportContext<'a> {
    pub settings: &'a ReportSettings,
    pub input: &'a ReportInput,
    pub market: &'a MarketData,
    pub total: &'a TrackerResult,
    pub strategies: &'a [TrackerResult],
    /// Absolute order notional per selected trade.
    pub turnover: &'a HashMap<TradeId, f64>,
}

impl ReportContext<'_> {
    fn curve<'r>(&self, result: &'r TrackerResult, basis: ReturnBasis) -> &'r EquityCurve {
        result.curves.get(basis.curve_kind())
    }

    fn stats_curve<'r>(&self, result: &'r TrackerResult) -> &'r EquityCurve {
        self.curve(result, self.settings.statistics.basis)
    }

    pub fn equity_stats(&self, result: &TrackerResult) -> EquityCurveStats {
        EquityCurveStats::compute(self.stats_curve(result), self.settings.statistics.risk_free_rate)
    }

    pub fn trade_stats(&self, result: &TrackerResult) -> TradeStatistics {
        let trades: Vec<&TradeResult> = result.trades.iter().collect();
        let turnover_money: f64 = result
            .trades
            .iter()
            .filter_map(|t| self.turnover.get(&t.trade_id))
            .sum();
        let capital: Vec<f64> = result.capital_usage.iter().map(|c| c.total_capital).collect();
        let curve = &result.curves.roac;
        let days = (curve.last_date() - curve.start_date()).num_days();
        TradeStatistics::compute(&trades, turnover_money, mean_f64(&capital), days)
    }
}

// ─── Equity ─────────────────────────────────────────────────────────

fn equity_section(ctx: &ReportContext<'_>) -> SectionResult {
    let curve = ctx.stats_curve(ctx.total);
    let tail = compute_tail_metrics(&curve.returns());
    let mut stats = ctx.equity_stats(ctx.total).entries();
    stats.push(Stat::new("Excess Kurtosis", tail.kurtosis, StatFormat::Ratio));
    stats.push(Stat::new(
        "Downside Deviation Ratio",
        tail.downside_deviation_ratio,
        StatFormat::Ratio,
    ));

    let curves = &ctx.total.curves;
    let mut table = ReportTable::new(
        "equity_curves",
        &["date", "roac", "rotc", "dollar", "drawdown_pct", "drawdown_dollar"],
    );
    let rows = curves
        .roac
        .points()
        .iter()
        .zip(curves.rotc.points())
        .zip(curves.dollar.points())
        .zip(curve.points());
    for (((roac, rotc), dollar), basis) in rows {
        table.push_row(vec![
            roac.date.into(),
            roac.equity.into(),
            rotc.equity.into(),
            dollar.equity.into(),
            basis.drawdown_pct.into(),
            basis.drawdown_dollar.into(),
        ]);
    }

    Ok(vec![ReportTable::from_stats("equity_stats", &stats), table])
}

// ─── Trades ─────────────────────────────────────────────────────────

fn trade_section(ctx: &ReportContext<'_>) -> SectionResult {
    let trades = &ctx.total.trades;
    let closed: Vec<&TradeResult> = trades.iter().filter(|t| !t.open).collect();
    let buckets = ctx.settings.statistics.histogram_buckets;

    let mut returns = ReportTable::new("trade_return_histogram", &["bucket_low", "bucket_high", "count"]);
    let values: Vec<f64> = closed.iter().map(|t| t.ret).collect();
    for (low, high, count) in histogram(&values, buckets) {
        returns.push_row(vec![low.into(), high.into(), count.into()]);
    }

    let mut lengths = ReportTable::new(
        "trade_length_histogram",
        &["bucket_low_days", "bucket_high_days", "count"],
    );
    let days: Vec<i64> = closed.iter().map(|t| t.holding_days).collect();
    for (low, high, count) in day_histogram(&days, buckets) {
        lengths.push_row(vec![low.into(), high.into(), count.into()]);
    }

    let mut scatter = ReportTable::new("mae_mfe", &["trade_id", "trade_name", "return", "mae", "mfe"]);
    for t in trades {
        scatter.push_row(vec![
            Cell::Integer(t.trade_id.0 as i64),
            t.name.as_str().into(),
            t.ret.into(),
            t.mae.into(),
            t.mfe.into(),
        ]);
    }

    Ok(vec![
        ReportTable::from_stats("trade_stats", &ctx.trade_stats(ctx.total).entries()),
        long_short_table(ctx.total),
        returns,
        lengths,
        scatter,
    ])
}

fn long_short_table(result: &TrackerResult) -> ReportTable {
    let curves = &result.curves;
    let side = |roac: CurveKind, dollar: CurveKind| {
        let roac = curves.get(roac);
        let dollar = curves.get(dollar);
        (
            roac.total_return(),
            roac.max_drawdown_pct(),
            dollar.last_equity() - dollar.start_value(),
        )
    };
    let long = side(CurveKind::RoacLong, CurveKind::DollarLong);
    let short = side(CurveKind::RoacShort, CurveKind::DollarShort);
    let unrealized_long: f64 = result.trades.iter().map(|t| t.unrealized_pnl_long).sum();
    let unrealized_short: f64 = result.trades.iter().map(|t| t.unrealized_pnl_short).sum();

    let mut table = ReportTable::new("long_short_stats", &["stat", "long", "short"]);
    let rows: [(&str, f64, f64); 4] = [
        ("Total Return", long.0, short.0),
        ("Max Drawdown", long.1, short.1),
        ("P&L", long.2, short.2),
        ("Unrealized P&L", unrealized_long, unrealized_short),
    ];
    for (name, l, s) in rows {
        table.push_row(vec![name.into(), l.into(), s.into()]);
    }
    table
}

/// Equal-width buckets over `[min, max]`; the last bucket is closed on the right.
pub fn histogram(values: &[f64], buckets: usize) -> Vec<(f64, f64, usize)> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let (Some(min), Some(max)) = (
        finite.iter().copied().reduce(f64::min),
        finite.iter().copied().reduce(f64::max),
    ) else {
        return Vec::new();
    };
    if buckets == 0 {
        return Vec::new();
    }
    if max - min < 1e-12 {
        return vec![(min, max, finite.len())];
    }

    let width = (max - min) / buckets as f64;
    let mut counts = vec![0usize; buckets];
    for v in &finite {
        let idx = (((v - min) / width).floor() as usize).min(buckets - 1);
        counts[idx] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| {
            let low = min + width * i as f64;
            let high = if i + 1 == buckets { max } else { min + width * (i + 1) as f64 };
            (low, high, count)
        })
        .collect()
}

/// Whole-day buckets `[low, high]` covering `min..=max`, at most `buckets` of them.
pub fn day_histogram(values: &[i64], buckets: usize) -> Vec<(i64, i64, usize)> {
    let (Some(&min), Some(&max)) = (values.iter().min(), values.iter().max()) else {
        return Vec::new();
    };
    if buckets == 0 {
        return Vec::new();
    }
    let span = max - min + 1;
    let width = ((span as f64 / buckets as f64).ceil() as i64).max(1);
    let count = ((max - min) / width + 1) as usize;
    let mut counts = vec![0usize; count];
    for v in values {
        counts[((v - min) / width) as usize] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(i, n)| {
            let low = min + width * i as i64;
            (low, low + width - 1, n)
        })
        .collect()
}

// ─── Strategies ─────────────────────────────────────────────────────

fn strategy_section(ctx: &ReportContext<'_>) -> SectionResult {
    let mut table = ReportTable::new(
        "strategy_stats",
        &["strategy", "total_return", "cagr", "sharpe", "max_drawdown", "trades", "win_rate", "pnl"],
    );
    for result in std::iter::once(ctx.total).chain(ctx.strategies) {
        let equity = ctx.equity_stats(result);
        let trades = ctx.trade_stats(result);
        let pnl: f64 = result.trades.iter().map(|t| t.pnl).sum();
        table.push_row(vec![
            result.name.as_str().into(),
            equity.total_return.into(),
            equity.cagr.into(),
            equity.sharpe.into(),
            equity.max_drawdown.into(),
            result.trades.len().into(),
            trades.win_rate.into(),
            pnl.into(),
        ]);
    }
    Ok(vec![table])
}

fn similarity_section(ctx: &ReportContext<'_>) -> SectionResult {
    let series: Vec<(String, Vec<(NaiveDate, f64)>)> = ctx
        .strategies
        .iter()
        .map(|r| (r.name.clone(), ctx.stats_curve(r).dated_returns()))
        .collect();
    let matrix = CorrelationMatrix::compute(&series);

    let mut columns = vec!["strategy".to_string()];
    columns.extend(matrix.names.iter().cloned());
    let mut correlation = ReportTable::with_columns("strategy_correlation", columns);
    for (name, row) in matrix.names.iter().zip(&matrix.values) {
        let mut cells = vec![Cell::from(name.as_str())];
        cells.extend(row.iter().map(|rho| Cell::from(*rho)));
        correlation.push_row(cells);
    }

    let coords = mds::scale(&matrix.distances())?;
    let mut layout = ReportTable::new("strategy_mds", &["strategy", "x", "y"]);
    for (name, (x, y)) in matrix.names.iter().zip(mds::to_2d(&coords)) {
        layout.push_row(vec![name.as_str().into(), x.into(), y.into()]);
    }

    Ok(vec![correlation, layout])
}

// ─── Capital and periods ────────────────────────────────────────────

fn capital_section(ctx: &ReportContext<'_>) -> SectionResult {
    let mut table = ReportTable::new(
        "capital_usage",
        &["date", "long", "short", "gross", "net", "total_capital"],
    );
    for c in &ctx.total.capital_usage {
        table.push_row(vec![
            c.date.into(),
            c.long.into(),
            c.short.into(),
            c.gross.into(),
            c.net.into(),
            c.total_capital.into(),
        ]);
    }
    Ok(vec![table])
}

fn period_section(ctx: &ReportContext<'_>) -> SectionResult {
    let curve = ctx.stats_curve(ctx.total);

    let mut monthly = ReportTable::new("monthly_returns", &["year", "month", "return"]);
    for p in curve.monthly_returns() {
        monthly.push_row(vec![p.year.into(), p.month.map_or(Cell::Empty, Cell::from), p.ret.into()]);
    }
    let mut annual = ReportTable::new("annual_returns", &["year", "return"]);
    for p in curve.annual_returns() {
        annual.push_row(vec![p.year.into(), p.ret.into()]);
    }
    let mut drawdowns = ReportTable::new(
        "drawdowns",
        &["start", "trough", "end", "depth", "length_days", "recovered"],
    );
    for e in curve.drawdown_episodes() {
        drawdowns.push_row(vec![
            e.start.into(),
            e.trough.into(),
            e.end.into(),
            e.depth_pct.into(),
            e.length_days.into(),
            e.recovered.into(),
        ]);
    }
    Ok(vec![monthly, annual, drawdowns])
}

// ─── Instruments and tags ───────────────────────────────────────────

fn instrument_section(ctx: &ReportContext<'_>) -> SectionResult {
    let mut table = ReportTable::new("instrument_pnl", &["instrument", "realized", "unrealized", "total"]);
    for p in &ctx.total.instrument_pnl {
        let name = match &p.key {
            PositionKey::Instrument(id) => ctx.input.instrument_symbol(*id),
            PositionKey::Currency(code) => code.clone(),
        };
        table.push_row(vec![name.into(), p.realized.into(), p.unrealized.into(), p.total().into()]);
    }
    Ok(vec![table])
}

fn tag_section(ctx: &ReportContext<'_>) -> SectionResult {
    let mut by_tag: BTreeMap<_, Vec<&TradeResult>> = BTreeMap::new();
    for t in &ctx.total.trades {
        for tag in &t.tags {
            by_tag.entry(*tag).or_default().push(t);
        }
    }

    let mut table = ReportTable::new("tag_stats", &["tag", "trades", "pnl", "win_rate"]);
    for (tag, trades) in by_tag {
        let pnl: f64 = trades.iter().map(|t| t.pnl).sum();
        let closed: Vec<bool> = trades.iter().filter(|t| !t.open).map(|t| t.pnl > 0.0).collect();
        table.push_row(vec![
            ctx.input.tag_name(tag).into(),
            trades.len().into(),
            pnl.into(),
            crate::metrics::win_rate(&closed).into(),
        ]);
    }
    Ok(vec![table])
}

// ─── Risk ───────────────────────────────────────────────────────────

fn value_at_risk_section(ctx: &ReportContext<'_>) -> SectionResult {
    let settings = &ctx.settings.value_at_risk;
    let returns = ctx.curve(ctx.total, settings.basis).returns();
    let mut table = ReportTable::new(
        "value_at_risk",
        &["confidence", "horizon_days", "var_historical", "var_parametric", "expected_shortfall"],
    );
    for &confidence in &settings.confidence_levels {
        let level = value_at_risk(&returns, confidence, settings.horizon_days);
        table.push_row(vec![
            level.confidence.into(),
            level.horizon_days.into(),
            level.var_historical.into(),
            level.var_parametric.into(),
            level.expected_shortfall.into(),
        ]);
    }
    Ok(vec![table])
}

fn monte_carlo_section(ctx: &ReportContext<'_>) -> SectionResult {
    let settings = &ctx.settings.monte_carlo;
    if !settings.enabled {
        return Ok(Vec::new());
    }
    let curve = ctx.curve(ctx.total, settings.basis);
    let config = BootstrapConfig::from_settings(settings, curve.last_equity());
    let result = run_monte_carlo(&config, &curve.returns())?;
    Ok(vec![
        band_table("monte_carlo_equity", &result.equity_bands),
        band_table("monte_carlo_drawdown", &result.drawdown_bands),
        ReportTable::from_stats("monte_carlo_summary", &result.summary.entries()),
    ])
}

fn band_table(name: &str, bands: &[PercentileBand]) -> ReportTable {
    let mut table = ReportTable::new(name, &["period", "p5", "p25", "p50", "p75", "p95"]);
    for b in bands {
        table.push_row(vec![
            b.period.into(),
            b.p5.into(),
            b.p25.into(),
            b.p50.into(),
            b.p75.into(),
            b.p95.into(),
        ]);
    }
    table
}

// ─── Comparisons ────────────────────────────────────────────────────

fn benchmark_section(ctx: &ReportContext<'_>) -> SectionResult {
    let Some(id) = ctx.settings.benchmark.instrument else {
        return Ok(Vec::new());
    };
    let bars = ctx.market.prices(id).ok_or_else(|| {
        SectionFailure::Unavailable(format!(
            "no price data for benchmark {}",
            ctx.input.instrument_symbol(id)
        ))
    })?;
    let portfolio = ctx.stats_curve(ctx.total).dated_returns();
    let stats = BenchmarkStats::compute(&portfolio, &close_returns(bars.items()));
    Ok(vec![ReportTable::from_stats("benchmark_stats", &stats.entries())])
}

fn backtest_section(ctx: &ReportContext<'_>) -> SectionResult {
    let Some(name) = ctx.settings.benchmark.backtest.as_deref() else {
        return Ok(Vec::new());
    };
    let series = ctx
        .input
        .backtest(name)
        .ok_or_else(|| SectionFailure::Unavailable(format!("no backtest series named {name:?}")))?;
    let comparison = compare_to_backtest(ctx.stats_curve(ctx.total), series);
    let mut table = ReportTable::new("backtest_comparison", &["date", "realized", "backtest"]);
    for p in &comparison.points {
        table.push_row(vec![p.date.into(), p.realized.into(), p.backtest.into()]);
    }
    Ok(vec![table])
}
