//! Average-cost bookkeeping for a signed quantity.
//!
//! Shared by `Trade::recompute` and the simulation's positions so both agree on
//! realized P&L.

use serde::{Deserialize, Serialize};

const QTY_EPSILON: f64 = 1e-9;

/// Signed running quantity with its average entry price.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AverageCost {
    pub quantity: f64,
    pub avg_price: f64,
}

/// How a single fill split into closing and opening parts.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CostFill {
    /// Signed part of the fill that reduced the existing position.
    pub closing: f64,
    /// Signed part of the fill that opened or extended a position.
    pub opening: f64,
    /// Realized P&L in price units (multiply by contract multiplier and fx).
    pub realized: f64,
    /// Average price the closing part was matched against.
    pub matched_price: f64,
    /// Sign of the position before the fill: 1 long, -1 short, 0 flat.
    pub prior_sign: f64,
}

impl AverageCost {
    pub fn is_flat(&self) -> bool {
        self.quantity.abs() < QTY_EPSILON
    }

    /// Apply a signed fill at `price`.
    pub fn apply(&mut self, qty: f64, price: f64) -> CostFill {
        let prior_sign = if self.is_flat() { 0.0 } else { self.quantity.signum() };
        let matched_price = self.avg_price;

        let closing = if prior_sign != 0.0 && qty.signum() != prior_sign {
            qty.signum() * qty.abs().min(self.quantity.abs())
        } else {
            0.0
        };
        let opening = qty - closing;
        let realized = -closing * (price - matched_price);

        self.quantity += closing;
        if self.is_flat() {
            self.quantity = 0.0;
            self.avg_price = 0.0;
        }

        if opening.abs() >= QTY_EPSILON {
            let new_qty = self.quantity + opening;
            self.avg_price = (self.avg_price * self.quantity + price * opening) / new_qty;
            self.quantity = new_qty;
        }

        CostFill {
            closing,
            opening: if opening.abs() < QTY_EPSILON { 0.0 } else { opening },
            realized,
            matched_price,
            prior_sign,
        }
    }
}
