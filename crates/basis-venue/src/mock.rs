//! Scriptable in-memory venue.

use std::collections::{HashMap, VecDeque};

use basis_core::{LotFilter, Price};
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::error::{VenueError, VenueResult};
use crate::traits::{BoxFuture, DerivativesVenue, Venue};
use crate::types::{Balance, OrderReceipt, OrderRequest, VenueKind};

/// Mock venue for testing.
///
/// Prices, filters and balances are set directly; order failures are
/// queued and consumed one per `place_order`. Every order and setup call
/// is recorded for verification.
#[derive(Debug)]
pub struct MockVenue {
    kind: VenueKind,
    price: Mutex<VenueResult<Price>>,
    mark_price: Mutex<VenueResult<Price>>,
    lot_filter: Mutex<VenueResult<LotFilter>>,
    balances: Mutex<HashMap<String, Balance>>,
    balance_error: Mutex<Option<VenueError>>,
    /// Failures returned by the next orders, in order.
    order_failures: Mutex<VecDeque<VenueError>>,
    setup_error: Mutex<Option<VenueError>>,
    /// Recorded orders.
    orders: Mutex<Vec<OrderRequest>>,
    leverage_calls: Mutex<Vec<(String, u32)>>,
    margin_type_calls: Mutex<Vec<(String, bool)>>,
}

impl MockVenue {
    /// Create a mock of the given venue kind with an unconstrained lot filter.
    pub fn new(kind: VenueKind) -> Self {
        Self {
            kind,
            price: Mutex::new(Ok(Price::ZERO)),
            mark_price: Mutex::new(Ok(Price::ZERO)),
            lot_filter: Mutex::new(Ok(LotFilter::default())),
            balances: Mutex::new(HashMap::new()),
            balance_error: Mutex::new(None),
            order_failures: Mutex::new(VecDeque::new()),
            setup_error: Mutex::new(None),
            orders: Mutex::new(Vec::new()),
            leverage_calls: Mutex::new(Vec::new()),
            margin_type_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn spot() -> Self {
        Self::new(VenueKind::Spot)
    }

    pub fn derivatives() -> Self {
        Self::new(VenueKind::Derivatives)
    }

    pub fn set_price(&self, price: Decimal) {
        *self.price.lock() = Ok(Price::new(price));
    }

    pub fn fail_price(&self, error: VenueError) {
        *self.price.lock() = Err(error);
    }

    pub fn set_mark_price(&self, price: Decimal) {
        *self.mark_price.lock() = Ok(Price::new(price));
    }

    pub fn fail_mark_price(&self, error: VenueError) {
        *self.mark_price.lock() = Err(error);
    }

    pub fn set_lot_filter(&self, filter: LotFilter) {
        *self.lot_filter.lock() = Ok(filter);
    }

    pub fn fail_lot_filter(&self, error: VenueError) {
        *self.lot_filter.lock() = Err(error);
    }

    /// Set the free balance of `asset` (locked stays zero).
    pub fn set_balance(&self, asset: &str, free: Decimal) {
        self.balances.lock().insert(
            asset.to_string(),
            Balance {
                free,
                locked: Decimal::ZERO,
            },
        );
    }

    pub fn fail_balance(&self, error: Option<VenueError>) {
        *self.balance_error.lock() = error;
    }

    /// Queue a failure for the next `place_order`.
    pub fn push_order_failure(&self, error: VenueError) {
        self.order_failures.lock().push_back(error);
    }

    /// Make leverage and margin-type calls fail.
    pub fn fail_setup(&self, error: Option<VenueError>) {
        *self.setup_error.lock() = error;
    }

    /// Get recorded orders.
    pub fn orders(&self) -> Vec<OrderRequest> {
        self.orders.lock().clone()
    }

    pub fn leverage_calls(&self) -> Vec<(String, u32)> {
        self.leverage_calls.lock().clone()
    }

    pub fn margin_type_calls(&self) -> Vec<(String, bool)> {
        self.margin_type_calls.lock().clone()
    }

    fn setup_result(&self) -> VenueResult<()> {
        match self.setup_error.lock().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Venue for MockVenue {
    fn kind(&self) -> VenueKind {
        self.kind
    }

    fn get_price<'a>(&'a self, _symbol: &'a str) -> BoxFuture<'a, VenueResult<Price>> {
        Box::pin(async move { self.price.lock().clone() })
    }

    fn get_balance<'a>(&'a self, asset: &'a str) -> BoxFuture<'a, VenueResult<Balance>> {
        Box::pin(async move {
            if let Some(e) = self.balance_error.lock().clone() {
                return Err(e);
            }
            Ok(self.balances.lock().get(asset).copied().unwrap_or_default())
        })
    }

    fn lot_filter<'a>(&'a self, _symbol: &'a str) -> BoxFuture<'a, VenueResult<LotFilter>> {
        Box::pin(async move { self.lot_filter.lock().clone() })
    }

    fn place_order(&self, request: OrderRequest) -> BoxFuture<'_, VenueResult<OrderReceipt>> {
        Box::pin(async move {
            self.orders.lock().push(request.clone());
            if let Some(e) = self.order_failures.lock().pop_front() {
                return Err(e);
            }

            let order_id = self.orders.lock().len() as u64;
            Ok(OrderReceipt {
                order_id: Some(order_id),
                client_order_id: request.client_order_id.to_string(),
                status: "FILLED".to_string(),
                executed_qty: request.quantity.inner(),
            })
        })
    }
}

impl DerivativesVenue for MockVenue {
    fn get_mark_price<'a>(&'a self, _symbol: &'a str) -> BoxFuture<'a, VenueResult<Price>> {
        Box::pin(async move { self.mark_price.lock().clone() })
    }

    fn set_leverage<'a>(
        &'a self,
        symbol: &'a str,
        leverage: u32,
    ) -> BoxFuture<'a, VenueResult<()>> {
        Box::pin(async move {
            self.leverage_calls
                .lock()
                .push((symbol.to_string(), leverage));
            self.setup_result()
        })
    }

    fn set_margin_type<'a>(
        &'a self,
        symbol: &'a str,
        isolated: bool,
    ) -> BoxFuture<'a, VenueResult<()>> {
        Box::pin(async move {
            self.margin_type_calls
                .lock()
                .push((symbol.to_string(), isolated));
            self.setup_result()
        })
    }
}
