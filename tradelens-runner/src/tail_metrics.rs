//! Tail risk metrics — value at risk, expected shortfall, skewness, kurtosis.
//!
//! All functions are pure: period returns in, scalar out. Too few observations
//! yield `None` so the report can omit the row instead of printing noise.

use serde::{Deserialize, Serialize};

use crate::metrics::{mean_f64, sort_f64, std_dev};

/// Minimum number of return observations for VaR, ES and the moment statistics.
pub const MIN_RETURN_OBSERVATIONS: usize = 20;

/// Distribution shape statistics of a return series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TailMetrics {
    /// Third standardized moment. Negative = heavier left tail.
    pub skewness: Option<f64>,

    /// Fourth standardized moment minus 3. Positive = fatter tails than normal.
    pub kurtosis: Option<f64>,

    /// Downside deviation over total deviation. Above 1.0 the losses dominate.
    pub downside_deviation_ratio: Option<f64>,

    pub sample_size: usize,
}

pub fn compute_tail_metrics(returns: &[f64]) -> TailMetrics {
    let n = returns.len();
    if n < MIN_RETURN_OBSERVATIONS {
        return TailMetrics {
            skewness: None,
            kurtosis: None,
            downside_deviation_ratio: None,
            sample_size: n,
        };
    }
    TailMetrics {
        skewness: skewness(returns),
        kurtosis: excess_kurtosis(returns),
        downside_deviation_ratio: downside_deviation_ratio(returns),
        sample_size: n,
    }
}

/// Value at risk and expected shortfall at one confidence level.
///
/// All figures are positive loss fractions scaled to `horizon_days` by the
/// square root of time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarLevel {
    pub confidence: f64,
    pub horizon_days: u32,
    pub var_historical: Option<f64>,
    pub var_parametric: Option<f64>,
    pub expected_shortfall: Option<f64>,
}

pub fn value_at_risk(returns: &[f64], confidence: f64, horizon_days: u32) -> VarLevel {
    let mut level = VarLevel {
        confidence,
        horizon_days,
        var_historical: None,
        var_parametric: None,
        expected_shortfall: None,
    };
    if returns.len() < MIN_RETURN_OBSERVATIONS || !(confidence > 0.0 && confidence < 1.0) {
        return level;
    }
    let scale = f64::from(horizon_days.max(1)).sqrt();

    let mut sorted = returns.to_vec();
    sort_f64(&mut sorted);
    let idx = ((sorted.len() as f64 * (1.0 - confidence)).floor() as usize).min(sorted.len() - 1);
    level.var_historical = Some(-sorted[idx] * scale);
    level.expected_shortfall = Some(-mean_f64(&sorted[..=idx]) * scale);

    let sd = std_dev(returns);
    if sd > 1e-15 {
        let z = inverse_normal_cdf(1.0 - confidence);
        level.var_parametric = Some(-(mean_f64(returns) + z * sd) * scale);
    }
    level
}

/// Skewness: mean of cubed standardized deviations.
pub fn skewness(returns: &[f64]) -> Option<f64> {
    if returns.len() < 3 {
        return None;
    }
    let n = returns.len() as f64;
    let mean = mean_f64(returns);
    let std = std_dev(returns);
    if std < 1e-15 {
        return Some(0.0);
    }
    Some(returns.iter().map(|r| ((r - mean) / std).powi(3)).sum::<f64>() / n)
}

/// Excess kurtosis: mean of standardized deviations to the fourth, minus 3.
pub fn excess_kurtosis(returns: &[f64]) -> Option<f64> {
    if returns.len() < 4 {
        return None;
    }
    let n = returns.len() as f64;
    let mean = mean_f64(returns);
    let std = std_dev(returns);
    if std < 1e-15 {
        return Some(0.0);
    }
    Some(returns.iter().map(|r| ((r - mean) / std).powi(4)).sum::<f64>() / n - 3.0)
}

/// Downside deviation (zero target, full-sample denominator) over total deviation.
pub fn downside_deviation_ratio(returns: &[f64]) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    let total_std = std_dev(returns);
    if total_std < 1e-15 {
        return Some(0.0);
    }
    let n = returns.len() as f64;
    let downside_sq_sum: f64 = returns.iter().filter(|&&r| r < 0.0).map(|r| r * r).sum();
    Some((downside_sq_sum / n).sqrt() / total_std)
}

// ─── Normal distribution ────────────────────────────────────────────

/// Standard normal PDF.
#[inline]
pub fn normal_pdf(x: f64) -> f64 {
    const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;
    INV_SQRT_2PI * (-0.5 * x * x).exp()
}

/// Standard normal CDF via Abramowitz & Stegun 26.2.17. Max error < 7.5e-8.
pub fn normal_cdf(x: f64) -> f64 {
    if x >= 0.0 {
        const P: f64 = 0.231_641_9;
        const B: [f64; 5] = [0.319_381_530, -0.356_563_782, 1.781_477_937, -1.821_255_978, 1.330_274_429];
        let t = 1.0 / (1.0 + P * x);
        let poly = B.iter().rev().fold(0.0, |acc, b| (acc + b) * t);
        1.0 - normal_pdf(x) * poly
    } else {
        1.0 - normal_cdf(-x)
    }
}

/// Inverse standard normal CDF (Acklam's rational approximation, rel. error < 1.2e-9).
pub fn inverse_normal_cdf(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_69e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838,
        -2.549_732_539_343_734,
        4.374_664_141_464_968,
        2.938_163_982_698_783,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996,
        3.754_408_661_907_416,
    ];
    const P_LOW: f64 = 0.024_25;

    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
