//! Arbitrage loop integration tests.
//!
//! Drives `ArbitrageLoop::tick` against mock venues:
//! - Full open/close cycle with persisted state
//! - Restart recovery and single-open guarantees
//! - Dry-run, inventory cap, data and order failures

mod integration;
use integration::common::{btc_filter, params, Harness, SYMBOL};

use std::time::Duration;

use basis_bot::{AppError, TickOutcome};
use basis_core::{Direction, LotFilter, OrderSide, Size, StrategyMode};
use basis_persistence::{HedgeState, PairAction, PersistenceError, PositionState};
use basis_venue::VenueError;
use rust_decimal_macros::dec;

fn transitioned(outcome: &TickOutcome) -> Option<PairAction> {
    match outcome {
        TickOutcome::Transitioned { action, .. } => Some(*action),
        _ => None,
    }
}

/// Flat, open carry above entry, close below exit.
#[tokio::test]
async fn test_carry_cycle_end_to_end() {
    let harness = Harness::new();
    let mut arb = harness.arbitrage(params());

    harness.set_basis(dec!(0.5));
    assert!(matches!(arb.tick().await, TickOutcome::Held { .. }));
    assert!(!arb.state().is_open());
    assert_eq!(harness.order_count(), 0);

    harness.set_basis(dec!(3.0));
    let outcome = arb.tick().await;
    assert_eq!(transitioned(&outcome), Some(PairAction::OpenCarry));
    assert_eq!(
        arb.state().hedge,
        HedgeState::Open {
            direction: Direction::Carry,
            qty: Size::new(dec!(0.001)),
        }
    );
    assert_eq!(arb.state().last_open_basis_bps, Some(dec!(3)));

    let spot_orders = harness.spot.orders();
    let perp_orders = harness.derivatives.orders();
    assert_eq!(spot_orders.len(), 1);
    assert_eq!(perp_orders.len(), 1);
    assert_eq!(spot_orders[0].side, OrderSide::Buy);
    assert_eq!(spot_orders[0].quantity, Size::new(dec!(0.001)));
    assert_eq!(perp_orders[0].side, OrderSide::Sell);
    assert!(!perp_orders[0].reduce_only);

    harness.set_basis(dec!(0.1));
    let outcome = arb.tick().await;
    assert_eq!(transitioned(&outcome), Some(PairAction::CloseCarry));
    assert_eq!(arb.state().hedge, HedgeState::Flat);
    assert_eq!(arb.state().last_close_basis_bps, Some(dec!(0.1)));
    assert_eq!(arb.state().last_direction, Direction::Carry);

    let perp_orders = harness.derivatives.orders();
    assert_eq!(perp_orders[1].side, OrderSide::Buy);
    assert!(perp_orders[1].reduce_only);
    assert_eq!(perp_orders[1].quantity, Size::new(dec!(0.001)));
    let spot_orders = harness.spot.orders();
    assert_eq!(spot_orders[1].side, OrderSide::Sell);

    let raw = std::fs::read_to_string(harness.store().path()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["open"], false);
    assert_eq!(json["symbol"], SYMBOL);
    assert_eq!(json["dir"], "carry");
}

/// The open leg pair is sent exactly once while the basis stays wide.
#[tokio::test]
async fn test_open_happens_once() {
    let harness = Harness::new();
    let mut arb = harness.arbitrage(params());
    harness.set_basis(dec!(3.0));

    let mut opens = 0;
    for _ in 0..5 {
        if transitioned(&arb.tick().await).is_some() {
            opens += 1;
        }
    }

    assert_eq!(opens, 1);
    assert_eq!(harness.order_count(), 2);
}

#[tokio::test]
async fn test_restart_recovers_open_hedge() {
    let harness = Harness::new();
    harness.set_basis(dec!(3.0));
    {
        let mut arb = harness.arbitrage(params());
        assert_eq!(transitioned(&arb.tick().await), Some(PairAction::OpenCarry));
    }

    let mut restarted = harness.arbitrage(params());
    assert!(restarted.state().is_open());
    assert_eq!(restarted.state().hedge.qty(), Size::new(dec!(0.001)));
    assert_eq!(restarted.state().hedge.direction(), Some(Direction::Carry));

    assert!(matches!(restarted.tick().await, TickOutcome::Held { .. }));
    assert_eq!(harness.order_count(), 2);

    harness.set_basis(dec!(0.1));
    assert_eq!(
        transitioned(&restarted.tick().await),
        Some(PairAction::CloseCarry)
    );
}

#[tokio::test]
async fn test_state_file_for_other_symbol_is_fatal() {
    let harness = Harness::new();
    harness
        .store()
        .save(&PositionState::empty("ETHUSDT"))
        .unwrap();

    let result = basis_bot::ArbitrageLoop::new(
        params(),
        harness.spot.clone(),
        harness.derivatives.clone(),
        harness.store(),
    );
    assert!(matches!(
        result,
        Err(AppError::Persistence(PersistenceError::SymbolMismatch { .. }))
    ));
}

/// Dry-run sizes and transitions exactly like live mode but sends nothing.
#[tokio::test]
async fn test_dry_run_matches_live_without_orders() {
    let live = Harness::new();
    let mut live_arb = live.arbitrage(params());
    live.set_basis(dec!(3.0));
    let live_outcome = live_arb.tick().await;

    let dry = Harness::new();
    let mut dry_arb = dry.arbitrage(params_with(|p| p.dry_run = true));
    dry_arb.setup().await;
    dry.set_basis(dec!(3.0));
    let dry_outcome = dry_arb.tick().await;

    match (&live_outcome, &dry_outcome) {
        (
            TickOutcome::Transitioned { report: live_report, .. },
            TickOutcome::Transitioned { report: dry_report, .. },
        ) => {
            assert!(!live_report.dry_run);
            assert!(dry_report.dry_run);
            assert_eq!(live_report.qty, dry_report.qty);
            assert_eq!(live_report.legs[0].label, dry_report.legs[0].label);
            assert_eq!(live_report.legs[1].label, dry_report.legs[1].label);
        }
        other => panic!("expected two transitions, got {other:?}"),
    }

    assert_eq!(dry.order_count(), 0);
    assert!(dry.derivatives.leverage_calls().is_empty());
    assert!(dry.derivatives.margin_type_calls().is_empty());
    assert_eq!(dry_arb.state().hedge, live_arb.state().hedge);
    assert!(dry.store().load(SYMBOL).unwrap().is_open());
}

#[tokio::test]
async fn test_setup_sets_margin_then_leverage_and_tolerates_failure() {
    let harness = Harness::new();
    harness
        .derivatives
        .fail_setup(Some(VenueError::Transport("timeout".into())));
    let arb = harness.arbitrage(params_with(|p| p.leverage = 3));

    arb.setup().await;

    assert_eq!(
        harness.derivatives.margin_type_calls(),
        vec![(SYMBOL.to_string(), true)]
    );
    assert_eq!(
        harness.derivatives.leverage_calls(),
        vec![(SYMBOL.to_string(), 3)]
    );
}

#[tokio::test]
async fn test_reverse_open_is_capped_to_inventory() {
    let harness = Harness::new();
    let mut arb = harness.arbitrage(params_with(|p| {
        p.mode = StrategyMode::Reverse;
        p.notional = dec!(1000);
    }));
    harness.set_basis(dec!(-3.0));

    // No inventory: nothing is sent.
    let outcome = arb.tick().await;
    assert!(matches!(
        outcome,
        TickOutcome::Skipped {
            action: PairAction::OpenReverse,
            ..
        }
    ));
    assert_eq!(harness.order_count(), 0);
    assert!(!arb.state().is_open());

    // Below the minimum lot after capping.
    harness.spot.set_balance("BTC", dec!(0.0005));
    assert!(matches!(arb.tick().await, TickOutcome::Skipped { .. }));
    assert_eq!(harness.order_count(), 0);

    harness.spot.set_balance("BTC", dec!(0.0105));
    let outcome = arb.tick().await;
    assert_eq!(transitioned(&outcome), Some(PairAction::OpenReverse));
    assert_eq!(
        arb.state().hedge,
        HedgeState::Open {
            direction: Direction::Reverse,
            qty: Size::new(dec!(0.010)),
        }
    );

    let spot_orders = harness.spot.orders();
    assert_eq!(spot_orders[0].side, OrderSide::Sell);
    assert_eq!(spot_orders[0].quantity, Size::new(dec!(0.010)));
    assert_eq!(harness.derivatives.orders()[0].side, OrderSide::Buy);

    harness.set_basis(dec!(-0.1));
    assert_eq!(
        transitioned(&arb.tick().await),
        Some(PairAction::CloseReverse)
    );
    let perp_orders = harness.derivatives.orders();
    assert_eq!(perp_orders[1].side, OrderSide::Sell);
    assert!(perp_orders[1].reduce_only);
    assert_eq!(harness.spot.orders()[1].side, OrderSide::Buy);
}

#[tokio::test]
async fn test_data_error_backs_off_without_state_change() {
    let harness = Harness::new();
    let mut arb = harness.arbitrage(params());
    harness
        .spot
        .fail_price(VenueError::Transport("connection reset".into()));

    let outcome = arb.tick().await;
    assert!(matches!(outcome, TickOutcome::DataError { .. }));
    assert_eq!(arb.next_delay(&outcome), Duration::from_secs(1));
    assert!(!arb.state().is_open());
    assert_eq!(harness.order_count(), 0);

    let slow = harness.arbitrage(params_with(|p| p.interval = Duration::from_secs(2)));
    assert_eq!(slow.next_delay(&outcome), Duration::from_secs(4));
    assert_eq!(
        slow.next_delay(&TickOutcome::Held {
            sample: basis_core::BasisSample::new(
                basis_core::Price::new(dec!(1)),
                basis_core::Price::new(dec!(1))
            )
        }),
        Duration::from_secs(2)
    );
}

#[tokio::test]
async fn test_mark_price_failure_is_a_data_error() {
    let harness = Harness::new();
    let mut arb = harness.arbitrage(params());
    harness.set_basis(dec!(3.0));
    harness
        .derivatives
        .fail_mark_price(VenueError::from_response(503, "Service Unavailable"));

    assert!(matches!(arb.tick().await, TickOutcome::DataError { .. }));
    assert_eq!(harness.order_count(), 0);
}

#[tokio::test]
async fn test_second_leg_failure_leaves_state_unchanged() {
    let harness = Harness::new();
    let mut arb = harness.arbitrage(params());
    harness.set_basis(dec!(3.0));
    harness
        .derivatives
        .push_order_failure(VenueError::Transport("timeout".into()));

    let outcome = arb.tick().await;
    assert!(matches!(
        outcome,
        TickOutcome::OrderFailed {
            action: PairAction::OpenCarry,
            ..
        }
    ));
    assert!(!arb.state().is_open());
    assert!(!harness.store().path().exists());
    assert_eq!(harness.spot.orders().len(), 1);
    assert_eq!(harness.derivatives.orders().len(), 1);

    // Still flat, so the next tick tries again.
    assert_eq!(transitioned(&arb.tick().await), Some(PairAction::OpenCarry));
    assert_eq!(harness.spot.orders().len(), 2);
}

/// A transition that cannot be written blocks further trading until it is.
#[tokio::test]
async fn test_unwritable_state_blocks_decisions_until_saved() {
    let harness = Harness::new();
    let mut arb = harness.arbitrage(params());
    let state_path = harness.store().path().to_path_buf();
    std::fs::create_dir(&state_path).unwrap();
    harness.set_basis(dec!(3.0));

    let outcome = arb.tick().await;
    assert!(matches!(outcome, TickOutcome::PersistFailed { .. }));
    assert!(arb.state().is_open());
    assert!(arb.has_unsaved_state());
    assert_eq!(harness.order_count(), 2);

    // Still unwritable: no fetch, no decision, no orders.
    assert!(matches!(arb.tick().await, TickOutcome::PersistFailed { .. }));
    assert_eq!(harness.order_count(), 2);

    std::fs::remove_dir(&state_path).unwrap();
    assert!(matches!(arb.tick().await, TickOutcome::Held { .. }));
    assert!(!arb.has_unsaved_state());
    assert_eq!(harness.order_count(), 2);

    let restarted = harness.arbitrage(params());
    assert_eq!(
        restarted.state().hedge,
        HedgeState::Open {
            direction: Direction::Carry,
            qty: Size::new(dec!(0.001)),
        }
    );
}

#[tokio::test]
async fn test_run_stops_when_state_cannot_be_written() {
    let harness = Harness::new();
    let mut arb = harness.arbitrage(params());
    std::fs::create_dir(harness.store().path()).unwrap();
    harness.set_basis(dec!(3.0));

    let result = tokio::time::timeout(Duration::from_secs(5), arb.run())
        .await
        .expect("run should return once the state file is unwritable");

    assert!(matches!(result, Err(AppError::Persistence(_))));
    assert_eq!(harness.order_count(), 2);
}

#[tokio::test]
async fn test_first_leg_failure_sends_nothing_else() {
    let harness = Harness::new();
    let mut arb = harness.arbitrage(params());
    harness.set_basis(dec!(3.0));
    harness
        .spot
        .push_order_failure(VenueError::from_response(
            400,
            r#"{"code":-2010,"msg":"Account has insufficient balance"}"#,
        ));

    let outcome = arb.tick().await;
    assert!(matches!(outcome, TickOutcome::OrderFailed { .. }));
    assert!(harness.derivatives.orders().is_empty());
    assert!(!arb.state().is_open());
}

#[tokio::test]
async fn test_unsizable_notional_skips_open() {
    let harness = Harness::new();
    harness.derivatives.set_lot_filter(LotFilter::new(
        Size::new(dec!(0.01)),
        Size::new(dec!(0.01)),
        Size::ZERO,
    ));
    harness.spot.set_lot_filter(btc_filter());
    let mut arb = harness.arbitrage(params());
    harness.set_basis(dec!(3.0));

    let outcome = arb.tick().await;
    match outcome {
        TickOutcome::Skipped { action, reason } => {
            assert_eq!(action, PairAction::OpenCarry);
            assert!(reason.contains("0.01"), "reason: {reason}");
        }
        other => panic!("expected skip, got {other:?}"),
    }
    assert_eq!(harness.order_count(), 0);
}

fn params_with(f: impl FnOnce(&mut basis_bot::StrategyParams)) -> basis_bot::StrategyParams {
    let mut p = params();
    f(&mut p);
    p
}
