//! The dataset a report is generated from.
//!
//! Everything the persistence collaborator would hand over: trades with their
//! orders, cash and fx transactions, reference data, capital snapshots and
//! prior-period positions. Loaded from JSON.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tradelens_core::domain::{
    EquitySummary, Instrument, InstrumentId, PriorPosition, Strategy, StrategyId, Tag, TagId, Trade,
};

use crate::benchmark::BacktestSeries;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid report input: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportInput {
    pub instruments: Vec<Instrument>,
    pub strategies: Vec<Strategy>,
    pub tags: Vec<Tag>,
    pub trades: Vec<Trade>,
    pub equity_summaries: Vec<EquitySummary>,
    pub prior_positions: Vec<PriorPosition>,
    pub backtests: Vec<BacktestSeries>,
}

impl ReportInput {
    pub fn from_file(path: &Path) -> Result<Self, InputError> {
        let content = std::fs::read_to_string(path).map_err(|source| InputError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self, InputError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn instrument_map(&self) -> HashMap<InstrumentId, Instrument> {
        self.instruments.iter().map(|i| (i.id, i.clone())).collect()
    }

    pub fn strategy_name(&self, id: StrategyId) -> String {
        self.strategies
            .iter()
            .find(|s| s.id == id)
            .map_or_else(|| format!("Strategy {id}"), |s| s.name.clone())
    }

    pub fn tag_name(&self, id: TagId) -> String {
        self.tags
            .iter()
            .find(|t| t.id == id)
            .map_or_else(|| format!("Tag {id}"), |t| t.name.clone())
    }

    pub fn instrument_symbol(&self, id: InstrumentId) -> String {
        self.instruments
            .iter()
            .find(|i| i.id == id)
            .map_or_else(|| format!("#{id}"), |i| i.symbol.clone())
    }

    pub fn backtest(&self, name: &str) -> Option<&BacktestSeries> {
        self.backtests.iter().find(|b| b.name == name)
    }
}
