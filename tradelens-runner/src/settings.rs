//! Report settings — one explicit, immutable bundle passed to every entry point.
//!
//! Loaded from TOML. Every section and field has a default, so an empty file is
//! a valid configuration.

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tradelens_core::domain::{InstrumentId, StrategyId, TagId};
use tradelens_core::engine::{CurveKind, SimulationConfig};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse settings TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Which curve feeds a statistic family. Selected once per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnBasis {
    /// Return on allocated capital.
    Roac,
    /// Return on total capital.
    Rotc,
    /// Dollar P&L compounded on starting capital.
    Dollar,
}

impl ReturnBasis {
    pub fn curve_kind(self) -> CurveKind {
        match self {
            ReturnBasis::Roac => CurveKind::RoacNet,
            ReturnBasis::Rotc => CurveKind::RotcNet,
            ReturnBasis::Dollar => CurveKind::DollarNet,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ReportSettings {
    pub simulation: SimulationSettings,
    pub statistics: StatisticsSettings,
    pub monte_carlo: MonteCarloSettings,
    pub value_at_risk: ValueAtRiskSettings,
    pub benchmark: BenchmarkSettings,
    pub selection: SelectionSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub capital_cutoff: NaiveTime,
    pub option_capital_multiplier: f64,
    pub base_currency: String,
    /// Evaluate strategy trackers on the rayon pool.
    pub parallel: bool,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        let core = SimulationConfig::default();
        Self {
            capital_cutoff: core.capital_cutoff,
            option_capital_multiplier: core.option_capital_multiplier,
            base_currency: core.base_currency,
            parallel: true,
        }
    }
}

impl SimulationSettings {
    pub fn to_config(&self) -> SimulationConfig {
        SimulationConfig {
            capital_cutoff: self.capital_cutoff,
            option_capital_multiplier: self.option_capital_multiplier,
            base_currency: self.base_currency.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticsSettings {
    /// Annual risk-free rate as a fraction.
    pub risk_free_rate: f64,
    pub basis: ReturnBasis,
    pub histogram_buckets: usize,
}

impl Default for StatisticsSettings {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.0,
            basis: ReturnBasis::Roac,
            histogram_buckets: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloSettings {
    pub enabled: bool,
    pub periods: usize,
    pub runs: usize,
    pub cluster_size: usize,
    pub with_replacement: bool,
    pub seed: u64,
    pub basis: ReturnBasis,
}

impl Default for MonteCarloSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            periods: 252,
            runs: 1000,
            cluster_size: 5,
            with_replacement: true,
            seed: 42,
            basis: ReturnBasis::Roac,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValueAtRiskSettings {
    pub horizon_days: u32,
    pub confidence_levels: Vec<f64>,
    pub basis: ReturnBasis,
}

impl Default for ValueAtRiskSettings {
    fn default() -> Self {
        Self {
            horizon_days: 1,
            confidence_levels: vec![0.95, 0.99],
            basis: ReturnBasis::Rotc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BenchmarkSettings {
    pub instrument: Option<InstrumentId>,
    /// Name of a backtest series in the input to compare against.
    pub backtest: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionSettings {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    /// Empty means every strategy.
    pub strategies: Vec<StrategyId>,
    /// Empty means no tag filter; otherwise a trade needs at least one of these tags.
    pub tags: Vec<TagId>,
    pub include_open: bool,
}

impl Default for SelectionSettings {
    fn default() -> Self {
        Self {
            from: None,
            to: None,
            strategies: Vec::new(),
            tags: Vec::new(),
            include_open: true,
        }
    }
}

impl ReportSettings {
    /// Load settings from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate settings from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        let settings: Self = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_toml(&self) -> Result<String, SettingsError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let sim = &self.simulation;
        if !(sim.option_capital_multiplier.is_finite() && sim.option_capital_multiplier >= 0.0) {
            return Err(invalid(
                "simulation.option_capital_multiplier",
                format!("must be a non-negative number, got {}", sim.option_capital_multiplier),
            ));
        }
        if sim.base_currency.trim().is_empty() {
            return Err(invalid("simulation.base_currency", "must not be empty".into()));
        }
        if !self.statistics.risk_free_rate.is_finite() {
            return Err(invalid("statistics.risk_free_rate", "must be finite".into()));
        }
        if self.statistics.histogram_buckets == 0 {
            return Err(invalid("statistics.histogram_buckets", "must be at least 1".into()));
        }

        let mc = &self.monte_carlo;
        if mc.runs == 0 {
            return Err(invalid("monte_carlo.runs", "must be at least 1".into()));
        }
        if mc.periods == 0 {
            return Err(invalid("monte_carlo.periods", "must be at least 1".into()));
        }
        if mc.cluster_size == 0 || mc.cluster_size > mc.periods {
            return Err(invalid(
                "monte_carlo.cluster_size",
                format!("must be between 1 and periods ({}), got {}", mc.periods, mc.cluster_size),
            ));
        }

        let var = &self.value_at_risk;
        if var.horizon_days == 0 {
            return Err(invalid("value_at_risk.horizon_days", "must be at least 1".into()));
        }
        if let Some(bad) = var.confidence_levels.iter().find(|c| !(**c > 0.0 && **c < 1.0)) {
            return Err(invalid(
                "value_at_risk.confidence_levels",
                format!("levels must lie strictly between 0 and 1, got {bad}"),
            ));
        }

        if let (Some(from), Some(to)) = (self.selection.from, self.selection.to) {
            if from > to {
                return Err(invalid("selection", format!("from {from} is after to {to}")));
            }
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: String) -> SettingsError {
    SettingsError::Invalid { field, reason }
}
