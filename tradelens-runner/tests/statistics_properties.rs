//! Property tests for the statistics layer.
//!
//! Uses proptest to verify:
//! 1. Monte Carlo paths have `periods + 1` points and ordered percentile bands
//! 2. Drawdown paths never go above zero
//! 3. Expected shortfall is at least as large as historical VaR
//! 4. Histograms account for every finite value
//! 5. Correlation distances stay within `[0, 2]`

use proptest::prelude::*;
use tradelens_runner::mds::correlation_distance;
use tradelens_runner::monte_carlo::{bootstrap, drawdown_path, percentile_bands, BootstrapConfig};
use tradelens_runner::report::{day_histogram, histogram};
use tradelens_runner::tail_metrics::{value_at_risk, MIN_RETURN_OBSERVATIONS};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_returns() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-0.1..0.1_f64, 30..150)
}

fn config(periods: usize, runs: usize, cluster_size: usize, with_replacement: bool, seed: u64) -> BootstrapConfig {
    BootstrapConfig {
        periods,
        runs,
        cluster_size,
        with_replacement,
        seed,
        start_value: 10_000.0,
    }
}

// ── 1. Monte Carlo shape ─────────────────────────────────────────────

proptest! {
    #[test]
    fn bootstrap_paths_have_requested_length(
        returns in arb_returns(),
        periods in 5usize..30,
        cluster_size in 1usize..5,
        with_replacement in any::<bool>(),
        seed in any::<u64>(),
    ) {
        let cfg = config(periods, 12, cluster_size, with_replacement, seed);
        let paths = bootstrap(&cfg, &returns).unwrap();
        prop_assert_eq!(paths.equity.len(), 12);
        for path in &paths.equity {
            prop_assert_eq!(path.len(), periods + 1);
            prop_assert!((path[0] - 10_000.0).abs() < 1e-9);
        }
    }

    #[test]
    fn percentile_bands_are_ordered(returns in arb_returns(), seed in any::<u64>()) {
        let cfg = config(20, 25, 3, true, seed);
        let paths = bootstrap(&cfg, &returns).unwrap();
        for band in percentile_bands(&paths.equity) {
            prop_assert!(band.p5 <= band.p25);
            prop_assert!(band.p25 <= band.p50);
            prop_assert!(band.p50 <= band.p75);
            prop_assert!(band.p75 <= band.p95);
        }
    }

    #[test]
    fn bootstrap_is_seed_deterministic(returns in arb_returns(), seed in any::<u64>()) {
        let cfg = config(15, 8, 2, true, seed);
        let a = bootstrap(&cfg, &returns).unwrap();
        let b = bootstrap(&cfg, &returns).unwrap();
        prop_assert_eq!(a.equity, b.equity);
    }
}

// ── 2. Drawdown ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn drawdown_never_positive(equity in prop::collection::vec(1.0..1_000.0_f64, 1..100)) {
        let dd = drawdown_path(&equity);
        prop_assert_eq!(dd.len(), equity.len());
        prop_assert!((dd[0]).abs() < 1e-12);
        for d in dd {
            prop_assert!(d <= 1e-12);
            prop_assert!(d >= -1.0);
        }
    }
}

// ── 3. Tail risk ─────────────────────────────────────────────────────

proptest! {
    #[test]
    fn expected_shortfall_dominates_var(
        returns in prop::collection::vec(-0.1..0.1_f64, MIN_RETURN_OBSERVATIONS..200),
        horizon in 1u32..20,
    ) {
        let level = value_at_risk(&returns, 0.95, horizon);
        let var = level.var_historical.unwrap();
        let es = level.expected_shortfall.unwrap();
        prop_assert!(es >= var - 1e-12);
    }

    #[test]
    fn short_samples_have_no_var(returns in prop::collection::vec(-0.1..0.1_f64, 0..MIN_RETURN_OBSERVATIONS)) {
        let level = value_at_risk(&returns, 0.99, 1);
        prop_assert!(level.var_historical.is_none());
        prop_assert!(level.var_parametric.is_none());
        prop_assert!(level.expected_shortfall.is_none());
    }
}

// ── 4. Histograms ────────────────────────────────────────────────────

proptest! {
    #[test]
    fn histogram_counts_every_value(
        values in prop::collection::vec(-1_000.0..1_000.0_f64, 1..300),
        buckets in 1usize..40,
    ) {
        let hist = histogram(&values, buckets);
        let total: usize = hist.iter().map(|(_, _, n)| n).sum();
        prop_assert_eq!(total, values.len());
        prop_assert!(hist.len() <= buckets);
    }

    #[test]
    fn day_histogram_counts_every_value(
        values in prop::collection::vec(0i64..500, 1..300),
        buckets in 1usize..40,
    ) {
        let hist = day_histogram(&values, buckets);
        let total: usize = hist.iter().map(|(_, _, n)| n).sum();
        prop_assert_eq!(total, values.len());
        prop_assert!(hist.len() <= buckets);
        for (low, high, _) in hist {
            prop_assert!(low <= high);
        }
    }
}

// ── 5. Correlation distance ──────────────────────────────────────────

proptest! {
    #[test]
    fn correlation_distance_is_bounded(rho in -2.0..2.0_f64) {
        let d = correlation_distance(rho);
        prop_assert!((0.0..=2.0).contains(&d));
    }
}
