//! Arbitrage loop state machine.
//!
//! | state        | condition                                   | action        | next         |
//! |--------------|---------------------------------------------|---------------|--------------|
//! | FLAT         | mode allows carry and basis > entry         | open_carry    | OPEN_CARRY   |
//! | FLAT         | mode allows reverse and basis < -entry      | open_reverse  | OPEN_REVERSE |
//! | OPEN_CARRY   | basis < exit                                | close_carry   | FLAT         |
//! | OPEN_REVERSE | basis > -exit                               | close_reverse | FLAT         |
//!
//! Carry entry is evaluated first. One evaluation per tick; a tick never
//! overlaps the next. A confirmed transition that has not reached the
//! state file blocks every further decision until it is written.

use std::time::Duration;

use basis_core::{BasisSample, Direction, StrategyMode};
use basis_executor::{ExecOutcome, PairExecutor};
use basis_persistence::{
    HedgeState, PairAction, PairReport, PersistenceResult, PositionState, StateStore,
};
use basis_telemetry::Metrics;
use basis_venue::{DynDerivativesVenue, DynVenue, VenueError};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{error, info, warn};

use crate::config::StrategyParams;
use crate::error::AppResult;

/// Minimum back-off after a failed price fetch.
const MIN_BACKOFF: Duration = Duration::from_secs(1);

/// What the state machine wants to do this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Hold,
    OpenCarry,
    OpenReverse,
    CloseCarry,
    CloseReverse,
}

impl Decision {
    pub fn action(&self) -> Option<PairAction> {
        match self {
            Self::Hold => None,
            Self::OpenCarry => Some(PairAction::OpenCarry),
            Self::OpenReverse => Some(PairAction::OpenReverse),
            Self::CloseCarry => Some(PairAction::CloseCarry),
            Self::CloseReverse => Some(PairAction::CloseReverse),
        }
    }
}

/// Transition decision for one basis sample.
///
/// Open hedges are always allowed to close, whatever the mode.
pub fn decide(
    hedge: HedgeState,
    mode: StrategyMode,
    basis_bps: Decimal,
    entry_bps: Decimal,
    exit_bps: Decimal,
) -> Decision {
    match hedge {
        HedgeState::Flat => {
            if mode.allows(Direction::Carry) && basis_bps > entry_bps {
                Decision::OpenCarry
            } else if mode.allows(Direction::Reverse) && basis_bps < -entry_bps {
                Decision::OpenReverse
            } else {
                Decision::Hold
            }
        }
        HedgeState::Open {
            direction: Direction::Carry,
            ..
        } if basis_bps < exit_bps => Decision::CloseCarry,
        HedgeState::Open {
            direction: Direction::Reverse,
            ..
        } if basis_bps > -exit_bps => Decision::CloseReverse,
        HedgeState::Open { .. } => Decision::Hold,
    }
}

/// Back-off after a failed price fetch: twice the interval, at least 1s.
pub fn backoff_delay(interval: Duration) -> Duration {
    (interval * 2).max(MIN_BACKOFF)
}

/// Result of one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// A price fetch failed; no decision was made.
    DataError { error: String },
    /// No transition condition matched.
    Held { sample: BasisSample },
    /// Both legs confirmed (or reported in dry-run) and state updated.
    Transitioned { action: PairAction, report: PairReport },
    /// A transition was due but nothing was sent.
    Skipped { action: PairAction, reason: String },
    /// A leg failed; state is unchanged.
    OrderFailed { action: PairAction, error: String },
    /// The state file could not be written. No decision is made until it is.
    PersistFailed { error: String },
}

/// The polling state machine driver.
pub struct ArbitrageLoop {
    params: StrategyParams,
    spot: DynVenue,
    derivatives: DynDerivativesVenue,
    executor: PairExecutor,
    store: StateStore,
    state: PositionState,
    /// In-memory state is ahead of the state file.
    unsaved: bool,
}

impl ArbitrageLoop {
    /// Create the loop and recover position state from `store`.
    pub fn new(
        params: StrategyParams,
        spot: DynVenue,
        derivatives: DynDerivativesVenue,
        store: StateStore,
    ) -> AppResult<Self> {
        let state = store.load(&params.symbol)?;
        let executor = PairExecutor::new(
            spot.clone(),
            derivatives.clone(),
            params.symbol.clone(),
            params.dry_run,
        );
        Metrics::position_open(state.is_open());

        Ok(Self {
            params,
            spot,
            derivatives,
            executor,
            store,
            state,
            unsaved: false,
        })
    }

    pub fn state(&self) -> &PositionState {
        &self.state
    }

    pub fn params(&self) -> &StrategyParams {
        &self.params
    }

    /// Margin type, then leverage. Failures are warned and never fatal.
    ///
    /// Skipped in dry-run mode.
    pub async fn setup(&self) {
        let symbol = &self.params.symbol;
        if self.params.dry_run {
            info!(%symbol, "DRY RUN: skipping futures margin/leverage setup");
            return;
        }

        if let Err(e) = self
            .derivatives
            .set_margin_type(symbol, self.params.isolated)
            .await
        {
            Metrics::error("setup");
            warn!(
                %symbol,
                isolated = self.params.isolated,
                error = %e,
                "Failed to set margin type"
            );
        }
        if let Err(e) = self
            .derivatives
            .set_leverage(symbol, self.params.leverage)
            .await
        {
            Metrics::error("setup");
            warn!(%symbol, leverage = self.params.leverage, error = %e, "Failed to set leverage");
        }
    }

    /// Whether a confirmed transition is still waiting to be written.
    pub fn has_unsaved_state(&self) -> bool {
        self.unsaved
    }

    /// Run until the state file cannot be written: setup once, then tick
    /// and sleep.
    ///
    /// A failed write is retried once; if that fails too the error is
    /// returned, since a restart would otherwise trust a stale file.
    pub async fn run(&mut self) -> AppResult<()> {
        info!(
            symbol = %self.params.symbol,
            mode = %self.params.mode,
            entry_bps = %self.params.entry_bps,
            exit_bps = %self.params.exit_bps,
            notional = %self.params.notional,
            interval_ms = self.params.interval.as_millis() as u64,
            dry_run = self.params.dry_run,
            "Starting arbitrage loop"
        );
        self.setup().await;

        loop {
            let outcome = self.tick().await;
            if matches!(outcome, TickOutcome::PersistFailed { .. }) {
                self.persist()?;
            }
            tokio::time::sleep(self.next_delay(&outcome)).await;
        }
    }

    /// Sleep before the next tick.
    pub fn next_delay(&self, outcome: &TickOutcome) -> Duration {
        match outcome {
            TickOutcome::DataError { .. } => backoff_delay(self.params.interval),
            _ => self.params.interval,
        }
    }

    /// One evaluation: fetch prices, decide, execute, persist.
    pub async fn tick(&mut self) -> TickOutcome {
        if self.unsaved {
            if let Err(e) = self.persist() {
                return TickOutcome::PersistFailed {
                    error: e.to_string(),
                };
            }
            info!(path = %self.store.path().display(), "Pending position state written");
        }

        let sample = match self.fetch_sample().await {
            Ok(sample) => sample,
            Err(e) => {
                Metrics::error("data");
                warn!(error = %e, "Data error, backing off");
                return TickOutcome::DataError {
                    error: e.to_string(),
                };
            }
        };

        Metrics::tick(
            sample.spot_price.inner().to_f64().unwrap_or_default(),
            sample.mark_price.inner().to_f64().unwrap_or_default(),
            sample.basis_bps.to_f64().unwrap_or_default(),
        );
        info!(
            spot = %sample.spot_price,
            mark = %sample.mark_price,
            basis_bps = %sample.basis_bps.round_dp(2),
            open = self.state.is_open(),
            qty = %self.state.hedge.qty(),
            "Tick"
        );

        let decision = decide(
            self.state.hedge,
            self.params.mode,
            sample.basis_bps,
            self.params.entry_bps,
            self.params.exit_bps,
        );
        let Some(action) = decision.action() else {
            return TickOutcome::Held { sample };
        };

        let outcome = match action {
            PairAction::OpenCarry | PairAction::OpenReverse => {
                let sized = match self
                    .executor
                    .sizer()
                    .size(self.params.notional, sample.spot_price)
                    .await
                {
                    Ok(sized) => sized,
                    Err(e) => {
                        Metrics::error("sizing");
                        warn!(%action, error = %e, "Open aborted, no order sent");
                        return TickOutcome::Skipped {
                            action,
                            reason: e.to_string(),
                        };
                    }
                };
                info!(
                    %action,
                    raw = %sized.raw,
                    spot_clamped = %sized.spot_clamped,
                    derivatives_clamped = %sized.derivatives_clamped,
                    qty = %sized.reconciled,
                    dry_run = self.params.dry_run,
                    "Opening hedge"
                );

                if action == PairAction::OpenCarry {
                    self.executor.open_carry(sized.reconciled).await
                } else {
                    self.executor.open_reverse(sized.reconciled).await
                }
            }
            PairAction::CloseCarry => {
                info!(%action, qty = %self.state.hedge.qty(), "Closing hedge");
                self.executor.close_carry(self.state.hedge.qty()).await
            }
            PairAction::CloseReverse => {
                info!(%action, qty = %self.state.hedge.qty(), "Closing hedge");
                self.executor.close_reverse(self.state.hedge.qty()).await
            }
        };

        self.apply(action, sample.basis_bps, outcome)
    }

    async fn fetch_sample(&self) -> Result<BasisSample, VenueError> {
        let symbol = &self.params.symbol;
        let spot_price = self.spot.get_price(symbol).await?;
        let mark_price = self.derivatives.get_mark_price(symbol).await?;
        Ok(BasisSample::new(spot_price, mark_price))
    }

    /// Write pending state to the store.
    fn persist(&mut self) -> PersistenceResult<()> {
        if !self.unsaved {
            return Ok(());
        }
        if let Err(e) = self.store.save(&self.state) {
            Metrics::error("persist");
            error!(
                path = %self.store.path().display(),
                open = self.state.is_open(),
                error = %e,
                "Failed to persist position state"
            );
            return Err(e);
        }
        self.unsaved = false;
        Ok(())
    }

    /// Fold an execution outcome into the position state.
    fn apply(
        &mut self,
        action: PairAction,
        basis_bps: Decimal,
        outcome: ExecOutcome,
    ) -> TickOutcome {
        match outcome {
            ExecOutcome::Executed(report) => {
                if action.is_open() {
                    self.state
                        .record_open(action.direction(), basis_bps, report.clone());
                } else {
                    self.state.record_close(basis_bps, report.clone());
                }
                Metrics::transition(action.as_str());
                Metrics::position_open(self.state.is_open());
                info!(
                    %action,
                    qty = %report.qty,
                    basis_bps = %basis_bps.round_dp(2),
                    dry_run = report.dry_run,
                    "Transition confirmed"
                );

                self.unsaved = true;
                if let Err(e) = self.persist() {
                    return TickOutcome::PersistFailed {
                        error: e.to_string(),
                    };
                }
                TickOutcome::Transitioned { action, report }
            }
            ExecOutcome::Skipped { reason } => {
                Metrics::error("sizing");
                TickOutcome::Skipped { action, reason }
            }
            ExecOutcome::Failed { error, .. } => {
                Metrics::error("order");
                error!(%action, error = %error, "Transition abandoned, state unchanged");
                TickOutcome::OrderFailed {
                    action,
                    error: error.to_string(),
                }
            }
        }
    }
}
