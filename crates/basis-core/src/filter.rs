//! Lot-size filter.
//!
//! Venues publish quantity constraints per symbol (Binance `LOT_SIZE`:
//! `stepSize`, `minQty`, `maxQty`). They are resolved once into a
//! `LotFilter` and applied without re-parsing.

use crate::decimal::Size;
use serde::{Deserialize, Serialize};

/// Quantity constraints of one symbol on one venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LotFilter {
    /// Quantity increment. Zero disables rounding.
    pub step: Size,
    /// Smallest accepted quantity.
    pub min: Size,
    /// Largest accepted quantity. Zero means unbounded.
    pub max: Size,
}

impl LotFilter {
    pub fn new(step: Size, min: Size, max: Size) -> Self {
        Self { step, min, max }
    }

    /// Clamp a desired quantity to what the venue accepts.
    ///
    /// Rounds down to the step, caps at `max`, and returns zero when the
    /// result falls below `min`. Never rounds up, so the result never
    /// exceeds `qty`.
    pub fn clamp(&self, qty: Size) -> Size {
        if !qty.is_positive() {
            return Size::ZERO;
        }

        let mut clamped = qty.round_to_lot(self.step);
        if self.max.is_positive() && clamped > self.max {
            clamped = self.max.round_to_lot(self.step);
        }

        if clamped < self.min || !clamped.is_positive() {
            return Size::ZERO;
        }
        clamped
    }
}
