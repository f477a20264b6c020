//! Domain types for TradeLens

pub mod bar;
pub mod cash;
pub mod cost;
pub mod ids;
pub mod instrument;
pub mod order;
pub mod snapshot;
pub mod strategy;
pub mod trade;

pub use bar::{Bar, FxRate};
pub use cash::{CashTransaction, CashTransactionKind, FxTransaction};
pub use cost::{AverageCost, CostFill};
pub use ids::{InstrumentId, OrderId, StrategyId, TagId, TradeId};
pub use instrument::{AssetClass, Instrument};
pub use order::{Execution, Order, OrderSide};
pub use snapshot::{EquitySummary, PriorPosition};
pub use strategy::{Strategy, Tag};
pub use trade::{Trade, TradeError, TradeStats};
