//! Venue capability traits.
//!
//! The arbitrage loop and executor only talk to venues through these
//! traits, so tests can substitute [`crate::MockVenue`] for the REST
//! clients.

use std::pin::Pin;
use std::sync::Arc;

use basis_core::{LotFilter, Price, Size};

use crate::error::VenueResult;
use crate::types::{Balance, OrderReceipt, OrderRequest, VenueKind};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Capabilities every venue provides.
pub trait Venue: Send + Sync {
    /// Which venue this client talks to.
    fn kind(&self) -> VenueKind;

    /// Last traded price of `symbol`.
    fn get_price<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, VenueResult<Price>>;

    /// Free and locked balance of `asset`. Unknown assets report zero.
    fn get_balance<'a>(&'a self, asset: &'a str) -> BoxFuture<'a, VenueResult<Balance>>;

    /// Lot-size constraints of `symbol`.
    fn lot_filter<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, VenueResult<LotFilter>>;

    /// Clamp `qty` to what this venue accepts for `symbol`.
    ///
    /// May perform I/O to resolve the lot filter.
    fn clamp_quantity<'a>(
        &'a self,
        symbol: &'a str,
        qty: Size,
    ) -> BoxFuture<'a, VenueResult<Size>> {
        Box::pin(async move { Ok(self.lot_filter(symbol).await?.clamp(qty)) })
    }

    /// Submit an order.
    fn place_order(&self, request: OrderRequest) -> BoxFuture<'_, VenueResult<OrderReceipt>>;
}

/// Additional capabilities of the perpetual-futures venue.
pub trait DerivativesVenue: Venue {
    /// Mark price of the perpetual.
    fn get_mark_price<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, VenueResult<Price>>;

    /// Set leverage for `symbol`. Idempotent.
    fn set_leverage<'a>(&'a self, symbol: &'a str, leverage: u32) -> BoxFuture<'a, VenueResult<()>>;

    /// Switch `symbol` between isolated and cross margin.
    ///
    /// "Already set" answers are treated as success.
    fn set_margin_type<'a>(&'a self, symbol: &'a str, isolated: bool)
        -> BoxFuture<'a, VenueResult<()>>;
}

/// Arc wrapper for spot venue trait objects.
pub type DynVenue = Arc<dyn Venue>;

/// Arc wrapper for derivatives venue trait objects.
pub type DynDerivativesVenue = Arc<dyn DerivativesVenue>;
