//! Identifier newtypes for persisted entities.
//!
//! All ids are plain integers assigned by the persistence collaborator. The
//! newtypes keep a trade id from being passed where an instrument id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub fn new(id: u64) -> Self {
                Self(id)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Trade id.
    TradeId
);
entity_id!(
    /// Order id.
    OrderId
);
entity_id!(
    /// Instrument id.
    InstrumentId
);
entity_id!(
    /// Strategy id.
    StrategyId
);
entity_id!(
    /// Tag id.
    TagId
);
