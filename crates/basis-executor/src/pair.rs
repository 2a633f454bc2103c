//! Paired two-venue execution.

use basis_core::{base_asset, OrderSide, Size};
use basis_persistence::{LegOutcome, LegReport, PairAction, PairReport};
use basis_venue::{DynDerivativesVenue, DynVenue, OrderRequest, VenueKind};
use tracing::{error, info, warn};

use crate::error::ExecutorError;
use crate::sizer::QuantitySizer;

/// Result of one paired action.
#[derive(Debug)]
pub enum ExecOutcome {
    /// Both legs filled, or both were reported in dry-run mode.
    Executed(PairReport),
    /// Nothing was sent.
    Skipped { reason: String },
    /// A leg failed. Legs after the failed one were not sent.
    Failed {
        report: PairReport,
        error: ExecutorError,
    },
}

impl ExecOutcome {
    pub fn report(&self) -> Option<&PairReport> {
        match self {
            Self::Executed(report) | Self::Failed { report, .. } => Some(report),
            Self::Skipped { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct LegPlan {
    label: &'static str,
    venue: VenueKind,
    side: OrderSide,
    reduce_only: bool,
}

const fn leg(label: &'static str, venue: VenueKind, side: OrderSide, reduce_only: bool) -> LegPlan {
    LegPlan {
        label,
        venue,
        side,
        reduce_only,
    }
}

/// Legs of `action` in submission order.
///
/// Opens start on spot; closes unwind the perpetual first.
fn legs_for(action: PairAction) -> [LegPlan; 2] {
    use OrderSide::{Buy, Sell};
    use VenueKind::{Derivatives, Spot};

    match action {
        PairAction::OpenCarry => [
            leg("spot_buy", Spot, Buy, false),
            leg("futures_short", Derivatives, Sell, false),
        ],
        PairAction::CloseCarry => [
            leg("futures_close", Derivatives, Buy, true),
            leg("spot_sell", Spot, Sell, false),
        ],
        PairAction::OpenReverse => [
            leg("spot_sell", Spot, Sell, false),
            leg("futures_long", Derivatives, Buy, false),
        ],
        PairAction::CloseReverse => [
            leg("futures_close", Derivatives, Sell, true),
            leg("spot_buy", Spot, Buy, false),
        ],
    }
}

/// Executes the four paired actions for one symbol.
pub struct PairExecutor {
    spot: DynVenue,
    derivatives: DynDerivativesVenue,
    sizer: QuantitySizer,
    symbol: String,
    base_asset: String,
    dry_run: bool,
}

impl PairExecutor {
    pub fn new(
        spot: DynVenue,
        derivatives: DynDerivativesVenue,
        symbol: impl Into<String>,
        dry_run: bool,
    ) -> Self {
        let symbol = symbol.into();
        Self {
            sizer: QuantitySizer::new(spot.clone(), derivatives.clone(), symbol.clone()),
            base_asset: base_asset(&symbol).to_string(),
            spot,
            derivatives,
            symbol,
            dry_run,
        }
    }

    pub fn sizer(&self) -> &QuantitySizer {
        &self.sizer
    }

    /// Spot BUY, then derivatives SELL.
    pub async fn open_carry(&self, qty: Size) -> ExecOutcome {
        self.execute(PairAction::OpenCarry, qty).await
    }

    /// Derivatives BUY reduce-only, then spot SELL.
    pub async fn close_carry(&self, qty: Size) -> ExecOutcome {
        self.execute(PairAction::CloseCarry, qty).await
    }

    /// Spot SELL, then derivatives BUY.
    ///
    /// `qty` is capped to the free base-asset balance and re-reconciled
    /// across both lot filters. Skips when nothing is left to sell.
    pub async fn open_reverse(&self, qty: Size) -> ExecOutcome {
        match self.cap_to_inventory(qty).await {
            Ok(capped) => self.execute(PairAction::OpenReverse, capped).await,
            Err(reason) => {
                warn!(symbol = %self.symbol, %reason, "Reverse open skipped");
                ExecOutcome::Skipped { reason }
            }
        }
    }

    /// Derivatives SELL reduce-only, then spot BUY.
    pub async fn close_reverse(&self, qty: Size) -> ExecOutcome {
        self.execute(PairAction::CloseReverse, qty).await
    }

    async fn cap_to_inventory(&self, qty: Size) -> Result<Size, String> {
        let balance = self
            .spot
            .get_balance(&self.base_asset)
            .await
            .map_err(|e| format!("failed to read {} balance: {e}", self.base_asset))?;

        let free = Size::new(balance.free);
        let capped = qty.min(free);
        if capped < qty {
            info!(
                asset = %self.base_asset,
                requested = %qty,
                free = %free,
                "Reverse quantity capped to free inventory"
            );
        }
        if !capped.is_positive() {
            return Err(format!("no free {} inventory to sell", self.base_asset));
        }

        self.sizer
            .fit(capped)
            .await
            .map(|sized| sized.reconciled)
            .map_err(|e| format!("inventory {capped} {} cannot be sized: {e}", self.base_asset))
    }

    async fn execute(&self, action: PairAction, qty: Size) -> ExecOutcome {
        if !qty.is_positive() {
            return ExecOutcome::Skipped {
                reason: format!("{action} with non-positive quantity {qty}"),
            };
        }

        let mut report = PairReport {
            action,
            dry_run: self.dry_run,
            qty,
            legs: legs_for(action)
                .map(|p| LegReport::new(p.label, p.venue, p.side, qty, p.reduce_only)),
        };

        if self.dry_run {
            for leg in &report.legs {
                info!(
                    %action,
                    leg = %leg.label,
                    venue = %leg.venue,
                    side = %leg.side,
                    qty = %leg.qty,
                    reduce_only = leg.reduce_only,
                    "DRY RUN: intended leg"
                );
            }
            return ExecOutcome::Executed(report);
        }

        for i in 0..report.legs.len() {
            let (venue, side, reduce_only) = {
                let leg = &report.legs[i];
                (leg.venue, leg.side, leg.reduce_only)
            };

            let mut request = OrderRequest::market(self.symbol.clone(), side, qty);
            if reduce_only {
                request = request.reduce_only();
            }
            let result = match venue {
                VenueKind::Spot => self.spot.place_order(request).await,
                VenueKind::Derivatives => self.derivatives.place_order(request).await,
            };

            match result {
                Ok(receipt) => {
                    info!(
                        %action,
                        leg = %report.legs[i].label,
                        order_id = ?receipt.order_id,
                        cloid = %receipt.client_order_id,
                        status = %receipt.status,
                        executed_qty = %receipt.executed_qty,
                        "Leg filled"
                    );
                    report.legs[i].outcome = LegOutcome::Filled(receipt);
                }
                Err(e) => {
                    report.legs[i].outcome = LegOutcome::Failed {
                        error: e.to_string(),
                    };
                    match report.unhedged_leg() {
                        Some(filled) => error!(
                            %action,
                            filled_leg = %filled.label,
                            failed_leg = %report.legs[i].label,
                            qty = %qty,
                            error = %e,
                            "Second leg failed, position is unhedged and needs manual reconciliation"
                        ),
                        None => warn!(
                            %action,
                            failed_leg = %report.legs[i].label,
                            error = %e,
                            "First leg failed, second leg not sent"
                        ),
                    }
                    return ExecOutcome::Failed {
                        report,
                        error: e.into(),
                    };
                }
            }
        }

        ExecOutcome::Executed(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basis_core::LotFilter;
    use basis_venue::{MockVenue, VenueError};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    struct Harness {
        spot: Arc<MockVenue>,
        derivatives: Arc<MockVenue>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                spot: Arc::new(MockVenue::spot()),
                derivatives: Arc::new(MockVenue::derivatives()),
            }
        }

        fn executor(&self, dry_run: bool) -> PairExecutor {
            PairExecutor::new(self.spot.clone(), self.derivatives.clone(), "BTCUSDT", dry_run)
        }
    }

    fn qty(v: rust_decimal::Decimal) -> Size {
        Size::new(v)
    }

    #[tokio::test]
    async fn test_open_carry_leg_order() {
        let h = Harness::new();
        let outcome = h.executor(false).open_carry(qty(dec!(0.001))).await;

        let report = match outcome {
            ExecOutcome::Executed(report) => report,
            other => panic!("unexpected outcome: {other:?}"),
        };
        assert!(report.all_filled());
        assert_eq!(report.legs[0].label, "spot_buy");
        assert_eq!(report.legs[1].label, "futures_short");

        let spot_orders = h.spot.orders();
        let deriv_orders = h.derivatives.orders();
        assert_eq!(spot_orders.len(), 1);
        assert_eq!(spot_orders[0].side, OrderSide::Buy);
        assert_eq!(spot_orders[0].quantity, qty(dec!(0.001)));
        assert_eq!(deriv_orders.len(), 1);
        assert_eq!(deriv_orders[0].side, OrderSide::Sell);
        assert!(!deriv_orders[0].reduce_only);
    }

    #[tokio::test]
    async fn test_close_carry_reduce_only_first() {
        let h = Harness::new();
        let outcome = h.executor(false).close_carry(qty(dec!(0.5))).await;
        assert!(matches!(outcome, ExecOutcome::Executed(_)));

        let deriv_orders = h.derivatives.orders();
        assert_eq!(deriv_orders[0].side, OrderSide::Buy);
        assert!(deriv_orders[0].reduce_only);
        assert_eq!(h.spot.orders()[0].side, OrderSide::Sell);
        assert!(!h.spot.orders()[0].reduce_only);
    }

    #[tokio::test]
    async fn test_close_reverse_legs() {
        let h = Harness::new();
        let report = match h.executor(false).close_reverse(qty(dec!(0.5))).await {
            ExecOutcome::Executed(report) => report,
            other => panic!("unexpected outcome: {other:?}"),
        };

        assert_eq!(report.legs[0].venue, VenueKind::Derivatives);
        assert_eq!(report.legs[0].side, OrderSide::Sell);
        assert!(report.legs[0].reduce_only);
        assert_eq!(report.legs[1].venue, VenueKind::Spot);
        assert_eq!(report.legs[1].side, OrderSide::Buy);
    }

    #[tokio::test]
    async fn test_open_reverse_capped_to_inventory() {
        let h = Harness::new();
        h.spot.set_balance("BTC", dec!(0.0005));
        h.spot
            .set_lot_filter(LotFilter::new(qty(dec!(0.00001)), qty(dec!(0.00001)), Size::ZERO));
        h.derivatives
            .set_lot_filter(LotFilter::new(qty(dec!(0.0001)), qty(dec!(0.0001)), Size::ZERO));

        let outcome = h.executor(false).open_reverse(qty(dec!(0.001))).await;
        let report = outcome.report().cloned().unwrap();

        assert_eq!(report.qty, qty(dec!(0.0005)));
        assert_eq!(h.spot.orders()[0].side, OrderSide::Sell);
        assert_eq!(h.spot.orders()[0].quantity, qty(dec!(0.0005)));
        assert_eq!(h.derivatives.orders()[0].quantity, qty(dec!(0.0005)));
    }

    #[tokio::test]
    async fn test_open_reverse_without_inventory_is_skipped() {
        let h = Harness::new();
        h.spot.set_balance("BTC", dec!(0));

        let outcome = h.executor(false).open_reverse(qty(dec!(0.001))).await;
        assert!(matches!(outcome, ExecOutcome::Skipped { .. }));
        assert!(h.spot.orders().is_empty());
        assert!(h.derivatives.orders().is_empty());
    }

    #[tokio::test]
    async fn test_open_reverse_inventory_below_minimum_is_skipped() {
        let h = Harness::new();
        h.spot.set_balance("BTC", dec!(0.0004));
        h.derivatives
            .set_lot_filter(LotFilter::new(qty(dec!(0.001)), qty(dec!(0.001)), Size::ZERO));

        let outcome = h.executor(false).open_reverse(qty(dec!(0.002))).await;
        assert!(matches!(outcome, ExecOutcome::Skipped { .. }));
        assert!(h.spot.orders().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_sends_nothing() {
        let h = Harness::new();
        let outcome = h.executor(true).open_carry(qty(dec!(0.001))).await;

        let report = match outcome {
            ExecOutcome::Executed(report) => report,
            other => panic!("unexpected outcome: {other:?}"),
        };
        assert!(report.dry_run);
        assert_eq!(report.qty, qty(dec!(0.001)));
        assert!(report.legs.iter().all(|l| l.outcome == LegOutcome::NotSent));
        assert!(h.spot.orders().is_empty());
        assert!(h.derivatives.orders().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_reverse_applies_inventory_guard() {
        let h = Harness::new();
        h.spot.set_balance("BTC", dec!(0.0003));

        let outcome = h.executor(true).open_reverse(qty(dec!(0.001))).await;
        assert_eq!(outcome.report().map(|r| r.qty), Some(qty(dec!(0.0003))));
        assert!(h.spot.orders().is_empty());
    }

    #[tokio::test]
    async fn test_first_leg_failure_skips_second() {
        let h = Harness::new();
        h.spot.push_order_failure(VenueError::from_response(
            400,
            r#"{"code":-2010,"msg":"insufficient balance"}"#,
        ));

        let outcome = h.executor(false).open_carry(qty(dec!(0.001))).await;
        match outcome {
            ExecOutcome::Failed { report, .. } => {
                assert!(matches!(report.legs[0].outcome, LegOutcome::Failed { .. }));
                assert_eq!(report.legs[1].outcome, LegOutcome::NotSent);
                assert!(report.unhedged_leg().is_none());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(h.derivatives.orders().is_empty());
    }

    #[tokio::test]
    async fn test_second_leg_failure_reports_unhedged_leg() {
        let h = Harness::new();
        h.derivatives
            .push_order_failure(VenueError::Transport("connection reset".into()));

        let outcome = h.executor(false).open_carry(qty(dec!(0.001))).await;
        match outcome {
            ExecOutcome::Failed { report, error } => {
                assert_eq!(report.unhedged_leg().map(|l| l.label.as_str()), Some("spot_buy"));
                assert!(matches!(error, ExecutorError::Venue(VenueError::Transport(_))));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(h.spot.orders().len(), 1);
    }

    #[tokio::test]
    async fn test_non_positive_quantity_is_skipped() {
        let h = Harness::new();
        let outcome = h.executor(false).close_carry(Size::ZERO).await;
        assert!(matches!(outcome, ExecOutcome::Skipped { .. }));
        assert!(h.derivatives.orders().is_empty());
    }
}
