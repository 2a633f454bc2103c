//! Quantity sizing.
//!
//! The desired base quantity is clamped independently against each
//! venue's lot filter and the smaller result is used for both legs, so
//! neither venue rejects its leg and the legs stay the same size.

use basis_core::{Price, Size};
use basis_venue::{DynDerivativesVenue, DynVenue};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::error::{ExecutorError, ExecutorResult};

/// Sizing figures of one paired action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizedQuantity {
    /// Desired quantity before clamping.
    pub raw: Size,
    pub spot_clamped: Size,
    pub derivatives_clamped: Size,
    /// Quantity sent on both legs.
    pub reconciled: Size,
}

/// Smaller of two independently clamped quantities, never negative.
pub fn reconcile(spot_clamped: Size, derivatives_clamped: Size) -> Size {
    spot_clamped.min(derivatives_clamped).max(Size::ZERO)
}

/// Sizes paired orders for one symbol.
pub struct QuantitySizer {
    spot: DynVenue,
    derivatives: DynDerivativesVenue,
    symbol: String,
}

impl QuantitySizer {
    pub fn new(
        spot: DynVenue,
        derivatives: DynDerivativesVenue,
        symbol: impl Into<String>,
    ) -> Self {
        Self {
            spot,
            derivatives,
            symbol: symbol.into(),
        }
    }

    /// Quantity for spending `notional` quote units at `spot_price`.
    pub async fn size(
        &self,
        notional: Decimal,
        spot_price: Price,
    ) -> ExecutorResult<SizedQuantity> {
        let raw = Size::from_notional(notional, spot_price);
        if !raw.is_positive() {
            return Err(ExecutorError::Sizing(format!(
                "notional {notional} at spot price {spot_price} gives no quantity"
            )));
        }
        self.fit(raw).await
    }

    /// Clamp `desired` on both venues and reconcile.
    ///
    /// Fails with `Sizing` when the reconciled quantity is zero, and with
    /// `Venue` when a lot filter cannot be resolved.
    pub async fn fit(&self, desired: Size) -> ExecutorResult<SizedQuantity> {
        let spot_clamped = self
            .spot
            .clamp_quantity(&self.symbol, desired)
            .await
            .map_err(|e| {
                warn!(venue = "spot", error = %e, "Lot filter unavailable, sizing aborted");
                e
            })?;
        let derivatives_clamped = self
            .derivatives
            .clamp_quantity(&self.symbol, desired)
            .await
            .map_err(|e| {
                warn!(venue = "derivatives", error = %e, "Lot filter unavailable, sizing aborted");
                e
            })?;

        let sized = SizedQuantity {
            raw: desired,
            spot_clamped,
            derivatives_clamped,
            reconciled: reconcile(spot_clamped, derivatives_clamped),
        };
        debug!(
            raw = %sized.raw,
            spot = %sized.spot_clamped,
            derivatives = %sized.derivatives_clamped,
            reconciled = %sized.reconciled,
            "Sized paired quantity"
        );

        if !sized.reconciled.is_positive() {
            return Err(ExecutorError::Sizing(self.zero_quantity_reason(&sized).await));
        }
        Ok(sized)
    }

    async fn zero_quantity_reason(&self, sized: &SizedQuantity) -> String {
        match self.derivatives.lot_filter(&self.symbol).await {
            Ok(filter) => format!(
                "quantity {} is below what both venues accept (derivatives min {}, step {})",
                sized.raw, filter.min, filter.step
            ),
            Err(e) => format!(
                "quantity {} clamps to zero (spot {}, derivatives {}); derivatives filter unavailable: {e}",
                sized.raw, sized.spot_clamped, sized.derivatives_clamped
            ),
        }
    }
}
