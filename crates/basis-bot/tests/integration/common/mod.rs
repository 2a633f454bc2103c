//! Shared harness: two mock venues, a temp state file and loop params.

use std::sync::Arc;
use std::time::Duration;

use basis_bot::{ArbitrageLoop, StrategyParams};
use basis_core::{LotFilter, Size, StrategyMode};
use basis_persistence::StateStore;
use basis_venue::MockVenue;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tempfile::TempDir;

pub const SYMBOL: &str = "BTCUSDT";
pub const SPOT_PRICE: Decimal = dec!(50000);

pub fn params() -> StrategyParams {
    StrategyParams {
        symbol: SYMBOL.to_string(),
        notional: dec!(50),
        entry_bps: dec!(2.0),
        exit_bps: dec!(0.2),
        interval: Duration::from_millis(100),
        leverage: 1,
        isolated: true,
        dry_run: false,
        mode: StrategyMode::Carry,
    }
}

pub fn btc_filter() -> LotFilter {
    LotFilter::new(
        Size::new(dec!(0.001)),
        Size::new(dec!(0.001)),
        Size::new(dec!(1000)),
    )
}

/// Both venues plus the directory holding the state file.
pub struct Harness {
    pub spot: Arc<MockVenue>,
    pub derivatives: Arc<MockVenue>,
    pub dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        let spot = Arc::new(MockVenue::spot());
        let derivatives = Arc::new(MockVenue::derivatives());
        spot.set_lot_filter(btc_filter());
        derivatives.set_lot_filter(btc_filter());

        let harness = Self {
            spot,
            derivatives,
            dir: TempDir::new().unwrap(),
        };
        harness.set_basis(dec!(0));
        harness
    }

    pub fn store(&self) -> StateStore {
        StateStore::new(self.dir.path().join("state.json"))
    }

    /// Quote spot at 50000 and the mark so the basis is `bps`.
    pub fn set_basis(&self, bps: Decimal) {
        self.spot.set_price(SPOT_PRICE);
        self.derivatives
            .set_mark_price(SPOT_PRICE + SPOT_PRICE * bps / dec!(10000));
    }

    /// A fresh loop over the shared venues and state file.
    pub fn arbitrage(&self, params: StrategyParams) -> ArbitrageLoop {
        ArbitrageLoop::new(
            params,
            self.spot.clone(),
            self.derivatives.clone(),
            self.store(),
        )
        .unwrap()
    }

    pub fn order_count(&self) -> usize {
        self.spot.orders().len() + self.derivatives.orders().len()
    }
}
