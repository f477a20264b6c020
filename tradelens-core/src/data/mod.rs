//! Market data acquisition

pub mod market;
pub mod provider;

pub use market::{MarketData, MarketDataRequest};
pub use provider::{DataError, InMemoryDataSource, MarketDataSource};
