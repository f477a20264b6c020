use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Knobs for the day-by-day capital simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Openings after this time of day are counted as capital from the next day.
    pub capital_cutoff: NaiveTime,
    /// Fraction of an option position's gross value counted as allocated capital.
    pub option_capital_multiplier: f64,
    pub base_currency: String,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            capital_cutoff: NaiveTime::from_hms_opt(15, 55, 0).unwrap_or(NaiveTime::MIN),
            option_capital_multiplier: 0.5,
            base_currency: "USD".into(),
        }
    }
}

impl SimulationConfig {
    pub fn with_cutoff(mut self, cutoff: NaiveTime) -> Self {
        self.capital_cutoff = cutoff;
        self
    }

    pub fn with_option_multiplier(mut self, multiplier: f64) -> Self {
        self.option_capital_multiplier = multiplier;
        self
    }

    /// True when an opening at `time` belongs to the next day's capital.
    pub fn is_after_cutoff(&self, time: NaiveTime) -> bool {
        time > self.capital_cutoff
    }

    pub fn capital_scale(&self, is_option: bool) -> f64 {
        if is_option {
            self.option_capital_multiplier
        } else {
            1.0
        }
    }
}
