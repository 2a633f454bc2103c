//! Basis calculator.

use crate::decimal::Price;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

const BPS_PER_UNIT: Decimal = dec!(10000);

/// Basis of the perpetual over spot, in basis points.
///
/// `(mark - spot) / spot * 10000`. Returns zero when the spot price is
/// not positive or the ratio overflows, so a bad or empty spot feed never
/// produces an entry.
pub fn basis_bps(spot_price: Price, mark_price: Price) -> Decimal {
    if !spot_price.is_positive() {
        return Decimal::ZERO;
    }
    (mark_price.inner() - spot_price.inner())
        .checked_div(spot_price.inner())
        .and_then(|ratio| ratio.checked_mul(BPS_PER_UNIT))
        .unwrap_or(Decimal::ZERO)
}

/// One observation of both legs' prices. Recomputed every tick, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasisSample {
    pub spot_price: Price,
    pub mark_price: Price,
    pub basis_bps: Decimal,
}

impl BasisSample {
    pub fn new(spot_price: Price, mark_price: Price) -> Self {
        Self {
            spot_price,
            mark_price,
            basis_bps: basis_bps(spot_price, mark_price),
        }
    }
}
