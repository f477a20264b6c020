//! BDD scenarios for report generation.
//!
//! A two-instrument, two-strategy portfolio over January and February 2024:
//! - Full report with every table present
//! - Trade selection by strategy
//! - Fatal inputs (no trades, no capital data)
//! - Cancellation and progress
//! - Per-section failures that leave the rest of the report intact
//! - Prior-position fallback for instruments without prices
//! - Instruments referenced by orders but missing from the instrument list

use std::sync::atomic::AtomicBool;
use std::sync::Mutex;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use tradelens_core::data::InMemoryDataSource;
use tradelens_core::domain::{
    AssetClass, Bar, EquitySummary, Instrument, InstrumentId, Order, OrderId, PriorPosition,
    Strategy, StrategyId, Tag, TagId, Trade, TradeId,
};
use tradelens_runner::report::{save_report, Cell};
use tradelens_runner::{ReportError, ReportGenerator, ReportInput, ReportSettings};

const AAA: InstrumentId = InstrumentId(1);
const BBB: InstrumentId = InstrumentId(2);
const IDX: InstrumentId = InstrumentId(3);

fn d(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, month, day).unwrap()
}

fn trading_days() -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut day = d(1, 2);
    while day <= d(2, 29) {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            days.push(day);
        }
        day += Duration::days(1);
    }
    days
}

fn price(instrument: InstrumentId, date: NaiveDate) -> f64 {
    let i = (date - d(1, 2)).num_days() as f64;
    let wiggle = ((date.day() * 7) % 5) as f64;
    match instrument {
        AAA => 100.0 + 0.4 * i + 0.3 * wiggle,
        BBB => 50.0 - 0.1 * i + 0.25 * wiggle,
        _ => 400.0 + 0.8 * i - 0.5 * wiggle,
    }
}

fn order(id: u64, instrument: InstrumentId, date: NaiveDate, quantity: f64) -> Order {
    Order::new(
        OrderId(id),
        instrument,
        date.and_hms_opt(10, 0, 0).unwrap(),
        quantity,
        price(instrument, date),
    )
}

fn trade(id: u64, strategy: u64, tag: u64, orders: Vec<Order>) -> Trade {
    let mut t = Trade::new(TradeId(id), format!("T{id}"));
    t.strategy_id = Some(StrategyId(strategy));
    t.tags.insert(TagId(tag));
    t.open = orders.iter().map(|o| o.quantity).sum::<f64>().abs() > 1e-9;
    t.orders = orders;
    t.recompute();
    t
}

fn input() -> ReportInput {
    ReportInput {
        instruments: vec![
            Instrument::new(AAA, "AAA", AssetClass::Stock),
            Instrument::new(BBB, "BBB", AssetClass::Stock),
            Instrument::new(IDX, "IDX", AssetClass::Index),
        ],
        strategies: vec![
            Strategy { id: StrategyId(1), name: "Trend".into() },
            Strategy { id: StrategyId(2), name: "Reversal".into() },
        ],
        tags: vec![
            Tag { id: TagId(1), name: "momentum".into() },
            Tag { id: TagId(2), name: "mean-reversion".into() },
        ],
        trades: vec![
            trade(1, 1, 1, vec![order(11, AAA, d(1, 2), 100.0), order(12, AAA, d(1, 22), -100.0)]),
            trade(2, 2, 2, vec![order(21, BBB, d(1, 5), -200.0), order(22, BBB, d(2, 9), 200.0)]),
            trade(3, 1, 1, vec![order(31, AAA, d(2, 1), 50.0)]),
            trade(4, 2, 2, vec![order(41, BBB, d(1, 15), 150.0), order(42, BBB, d(1, 25), -150.0)]),
        ],
        equity_summaries: vec![
            EquitySummary { date: d(1, 1), account: Some("U1".into()), total: 100_000.0 },
            EquitySummary { date: d(2, 1), account: Some("U1".into()), total: 102_000.0 },
        ],
        prior_positions: Vec::new(),
        backtests: Vec::new(),
    }
}

fn market() -> InMemoryDataSource {
    let bars = |id| trading_days().into_iter().map(|day| Bar::flat(day, price(id, day))).collect();
    InMemoryDataSource::new()
        .with_prices(AAA, bars(AAA))
        .with_prices(BBB, bars(BBB))
        .with_prices(IDX, bars(IDX))
}

fn settings() -> ReportSettings {
    let mut settings = ReportSettings::default();
    settings.monte_carlo.periods = 40;
    settings.monte_carlo.runs = 100;
    settings
}

#[test]
fn bdd_scenario_full_report_has_every_table() {
    // GIVEN a two-strategy portfolio with prices for every instrument
    let input = input();
    let settings = settings();

    // WHEN a report is generated
    let report = ReportGenerator::new(&settings)
        .generate(&input, &market())
        .expect("report should generate");

    // THEN no section failed
    assert!(report.is_complete(), "section errors: {:?}", report.errors);
    assert_eq!(report.trade_count, 4);
    assert_eq!(report.strategies, vec!["Trend".to_string(), "Reversal".to_string()]);
    assert_eq!(report.from, d(1, 2));

    // AND every always-on table is present
    for name in [
        "equity_stats",
        "equity_curves",
        "trade_stats",
        "long_short_stats",
        "trade_return_histogram",
        "trade_length_histogram",
        "mae_mfe",
        "strategy_stats",
        "strategy_correlation",
        "strategy_mds",
        "capital_usage",
        "monthly_returns",
        "annual_returns",
        "drawdowns",
        "instrument_pnl",
        "tag_stats",
        "value_at_risk",
        "monte_carlo_equity",
        "monte_carlo_drawdown",
        "monte_carlo_summary",
    ] {
        assert!(report.table(name).is_some(), "missing table {name}");
    }

    // AND optional comparisons are absent when not configured
    assert!(report.table("benchmark_stats").is_none());
    assert!(report.table("backtest_comparison").is_none());
}

#[test]
fn bdd_scenario_table_shapes_follow_the_data() {
    // GIVEN the standard portfolio
    let settings = settings();

    // WHEN a report is generated
    let report = ReportGenerator::new(&settings).generate(&input(), &market()).unwrap();

    // THEN the equity curve has the start point plus one row per simulated day
    let days = report.table("capital_usage").unwrap().len();
    assert!(days > 0);
    assert_eq!(report.table("equity_curves").unwrap().len(), days + 1);

    // AND strategy stats hold the total scope and one row per strategy
    let stats = report.table("strategy_stats").unwrap();
    assert_eq!(stats.len(), 3);
    assert_eq!(stats.rows[0][0], Cell::from("Total"));

    // AND the correlation matrix is square over strategies
    let corr = report.table("strategy_correlation").unwrap();
    assert_eq!(corr.columns, vec!["strategy", "Trend", "Reversal"]);
    assert_eq!(corr.len(), 2);
    assert_eq!(corr.rows[0][1], Cell::Number(1.0));
    assert_eq!(report.table("strategy_mds").unwrap().len(), 2);

    // AND every trade shows up in the MAE/MFE scatter
    assert_eq!(report.table("mae_mfe").unwrap().len(), 4);

    // AND one VaR row per confidence level
    let var = report.table("value_at_risk").unwrap();
    assert_eq!(var.len(), settings.value_at_risk.confidence_levels.len());

    // AND Monte Carlo bands cover the start plus every projected period
    assert_eq!(
        report.table("monte_carlo_equity").unwrap().len(),
        settings.monte_carlo.periods + 1
    );

    // AND tags are reported by name
    let tags = report.table("tag_stats").unwrap();
    assert_eq!(tags.len(), 2);
    assert!(tags.lookup("momentum", "trades").is_some());
    assert_eq!(tags.lookup("mean-reversion", "trades"), Some(&Cell::Integer(2)));

    // AND instrument P&L is reported by symbol
    let pnl = report.table("instrument_pnl").unwrap();
    assert!(pnl.lookup("AAA", "total").is_some());
    assert!(pnl.lookup("BBB", "total").is_some());
}

#[test]
fn bdd_scenario_select_single_strategy() {
    // GIVEN settings selecting only the Trend strategy
    let mut settings = settings();
    settings.selection.strategies = vec![StrategyId(1)];

    // WHEN a report is generated
    let report = ReportGenerator::new(&settings).generate(&input(), &market()).unwrap();

    // THEN only its trades are simulated
    assert_eq!(report.trade_count, 2);
    assert_eq!(report.strategies, vec!["Trend".to_string()]);
    assert_eq!(report.table("mae_mfe").unwrap().len(), 2);
    assert_eq!(report.table("strategy_stats").unwrap().len(), 2);
}

#[test]
fn bdd_scenario_excluding_open_trades() {
    // GIVEN settings that drop open trades
    let mut settings = settings();
    settings.selection.include_open = false;

    // WHEN a report is generated
    let report = ReportGenerator::new(&settings).generate(&input(), &market()).unwrap();

    // THEN the open trade is not part of it
    assert_eq!(report.trade_count, 3);
}

#[test]
fn bdd_scenario_empty_selection_is_rejected() {
    // GIVEN a selection matching no strategy
    let mut settings = settings();
    settings.selection.strategies = vec![StrategyId(99)];

    // WHEN a report is generated
    let result = ReportGenerator::new(&settings).generate(&input(), &market());

    // THEN generation fails before simulating
    assert!(matches!(result, Err(ReportError::NoTrades)));
}

#[test]
fn bdd_scenario_missing_capital_data_is_fatal() {
    // GIVEN trades but no equity summaries
    let mut input = input();
    input.equity_summaries.clear();

    // WHEN a report is generated
    let result = ReportGenerator::new(&settings()).generate(&input, &market());

    // THEN there is no capital denominator and no report
    assert!(matches!(result, Err(ReportError::NoCapitalData)));
}

#[test]
fn bdd_scenario_invalid_settings_are_rejected() {
    // GIVEN a zero histogram bucket count
    let mut settings = settings();
    settings.statistics.histogram_buckets = 0;

    // WHEN a report is generated
    let result = ReportGenerator::new(&settings).generate(&input(), &market());

    // THEN the settings error surfaces
    assert!(matches!(result, Err(ReportError::Settings(_))));
}

#[test]
fn bdd_scenario_cancel_flag_stops_generation() {
    // GIVEN a cancel flag that is already raised
    let cancel = AtomicBool::new(true);
    let settings = settings();

    // WHEN a report is generated with it
    let result = ReportGenerator::new(&settings)
        .with_cancel(&cancel)
        .generate(&input(), &market());

    // THEN generation stops with Cancelled
    assert!(matches!(result, Err(ReportError::Cancelled)));
}

#[test]
fn bdd_scenario_progress_runs_to_completion() {
    // GIVEN a progress sink recording every update
    let seen = Mutex::new(Vec::new());
    let sink = |message: &str, percent: f64| {
        seen.lock().unwrap().push((message.to_string(), percent));
    };
    let settings = settings();

    // WHEN a report is generated
    ReportGenerator::new(&settings)
        .with_progress(&sink)
        .generate(&input(), &market())
        .unwrap();

    // THEN progress never goes backwards and ends at 100
    let seen = seen.into_inner().unwrap();
    assert!(seen.len() > 2);
    assert!(seen.windows(2).all(|w| w[0].1 <= w[1].1));
    assert_eq!(seen.last().map(|(_, p)| *p), Some(100.0));
    assert!(seen.iter().all(|(_, p)| (0.0..=100.0).contains(p)));
}

#[test]
fn bdd_scenario_failed_sections_do_not_abort_the_report() {
    // GIVEN a Monte Carlo study needing more returns than exist without replacement
    let mut settings = settings();
    settings.monte_carlo.with_replacement = false;
    settings.monte_carlo.periods = 5_000;

    // AND a backtest series that is not in the input
    settings.benchmark.backtest = Some("model".into());

    // WHEN a report is generated
    let report = ReportGenerator::new(&settings).generate(&input(), &market()).unwrap();

    // THEN both sections are recorded as failed
    let failed: Vec<&str> = report.errors.iter().map(|e| e.section.as_str()).collect();
    assert_eq!(failed, vec!["monte_carlo", "backtest"]);

    // AND the rest of the report is present
    assert!(report.table("monte_carlo_equity").is_none());
    assert!(report.table("equity_stats").is_some());
    assert!(report.table("value_at_risk").is_some());
}

#[test]
fn bdd_scenario_benchmark_comparison() {
    // GIVEN the index instrument as benchmark
    let mut settings = settings();
    settings.benchmark.instrument = Some(IDX);

    // WHEN a report is generated
    let report = ReportGenerator::new(&settings).generate(&input(), &market()).unwrap();

    // THEN the benchmark statistics are reported
    assert!(report.is_complete(), "section errors: {:?}", report.errors);
    let stats = report.table("benchmark_stats").unwrap();
    assert!(stats.lookup("Beta", "value").is_some());
    assert!(matches!(stats.lookup("Common Periods", "value"), Some(Cell::Number(n)) if *n > 2.0));
}

#[test]
fn bdd_scenario_benchmark_without_prices_fails_alone() {
    // GIVEN a benchmark instrument the data source has no prices for
    let mut settings = settings();
    settings.benchmark.instrument = Some(IDX);
    let source = InMemoryDataSource::new()
        .with_prices(AAA, market().prices[&AAA].clone())
        .with_prices(BBB, market().prices[&BBB].clone());

    // WHEN a report is generated
    let report = ReportGenerator::new(&settings).generate(&input(), &source).unwrap();

    // THEN only the benchmark section failed
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].section, "benchmark");
    assert!(report.errors[0].message.contains("IDX"));
}

#[test]
fn bdd_scenario_prior_positions_stand_in_for_missing_prices() {
    // GIVEN no price history for BBB but monthly position snapshots
    let mut input = input();
    input.prior_positions = vec![
        PriorPosition { date: d(1, 5), instrument_id: BBB, price: 50.0, quantity: -200.0, fx_rate_to_base: 1.0 },
        PriorPosition { date: d(1, 31), instrument_id: BBB, price: 48.0, quantity: -200.0, fx_rate_to_base: 1.0 },
    ];
    let source = InMemoryDataSource::new().with_prices(AAA, market().prices[&AAA].clone());

    // WHEN a report is generated
    let report = ReportGenerator::new(&settings()).generate(&input, &source).unwrap();

    // THEN BBB is flagged as priced from snapshots and the report still completes
    assert_eq!(report.fallback_instruments, vec![BBB]);
    assert!(report.table("equity_stats").is_some());
}

#[test]
fn bdd_scenario_instruments_without_records_are_still_priced() {
    // GIVEN orders on BBB but no instrument record for it
    let mut unlisted = input();
    unlisted.instruments.retain(|i| i.id != BBB);

    // WHEN a report is generated against the full price history
    let full = ReportGenerator::new(&settings()).generate(&input(), &market()).unwrap();
    let report = ReportGenerator::new(&settings()).generate(&unlisted, &market()).unwrap();

    // THEN BBB is marked from its bars exactly as when it is listed
    assert_eq!(report.table("equity_curves"), full.table("equity_curves"));
    assert!(report.fallback_instruments.is_empty());
    let pnl = report.table("instrument_pnl").unwrap();
    assert!(pnl.lookup("#2", "total").is_some());

    // AND without bars it falls back to prior positions like a listed instrument
    unlisted.prior_positions = vec![PriorPosition {
        date: d(1, 31),
        instrument_id: BBB,
        price: 48.0,
        quantity: -200.0,
        fx_rate_to_base: 1.0,
    }];
    let source = InMemoryDataSource::new().with_prices(AAA, market().prices[&AAA].clone());
    let report = ReportGenerator::new(&settings()).generate(&unlisted, &source).unwrap();
    assert_eq!(report.fallback_instruments, vec![BBB]);
}

#[test]
fn bdd_scenario_parallel_and_sequential_reports_match() {
    // GIVEN identical settings except for parallel strategy evaluation
    let mut sequential = settings();
    sequential.simulation.parallel = false;
    let parallel = settings();

    // WHEN both reports are generated
    let a = ReportGenerator::new(&sequential).generate(&input(), &market()).unwrap();
    let b = ReportGenerator::new(&parallel).generate(&input(), &market()).unwrap();

    // THEN every table is identical
    assert_eq!(a.tables, b.tables);
}

#[test]
fn bdd_scenario_export_writes_every_table() {
    // GIVEN a generated report
    let report = ReportGenerator::new(&settings()).generate(&input(), &market()).unwrap();
    let dir = tempfile::tempdir().unwrap();

    // WHEN it is saved
    save_report(&report, dir.path()).unwrap();

    // THEN there is one CSV per table plus the JSON and Markdown artifacts
    for table in &report.tables {
        let path = dir.path().join("tables").join(format!("{}.csv", table.name));
        let csv = std::fs::read_to_string(&path).unwrap();
        assert_eq!(csv.lines().count(), table.len() + 1, "{}", table.name);
    }
    assert!(dir.path().join("report.json").exists());
    let md = std::fs::read_to_string(dir.path().join("summary.md")).unwrap();
    assert!(md.contains("| Trades | 4 |"));
}
