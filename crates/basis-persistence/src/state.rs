//! Position state and paired-action reports.
//!
//! `PositionState` is the in-memory model. `StateRecord` is the flat
//! JSON shape written to disk:
//!
//! ```json
//! {"open": true, "dir": "carry", "qty": 0.001, "symbol": "BTCUSDT",
//!  "last_open_basis_bps": 3.0, "last_close_basis_bps": 0.1, "actions": {...}}
//! ```

use basis_core::{Direction, OrderSide, Size};
use basis_venue::{OrderReceipt, VenueKind};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

// ============================================================================
// Pair reports
// ============================================================================

/// One of the four paired actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairAction {
    OpenCarry,
    CloseCarry,
    OpenReverse,
    CloseReverse,
}

impl PairAction {
    pub fn direction(&self) -> Direction {
        match self {
            Self::OpenCarry | Self::CloseCarry => Direction::Carry,
            Self::OpenReverse | Self::CloseReverse => Direction::Reverse,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::OpenCarry | Self::OpenReverse)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenCarry => "open_carry",
            Self::CloseCarry => "close_carry",
            Self::OpenReverse => "open_reverse",
            Self::CloseReverse => "close_reverse",
        }
    }
}

impl fmt::Display for PairAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to one leg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LegOutcome {
    /// Not submitted: dry run, or an earlier leg failed.
    NotSent,
    /// Accepted by the venue.
    Filled(OrderReceipt),
    /// Rejected, or the call itself failed.
    Failed { error: String },
}

/// One single-venue order of a paired action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegReport {
    /// Short label, e.g. `spot_buy` or `futures_close`.
    pub label: String,
    pub venue: VenueKind,
    pub side: OrderSide,
    pub qty: Size,
    pub reduce_only: bool,
    pub outcome: LegOutcome,
}

impl LegReport {
    pub fn new(
        label: impl Into<String>,
        venue: VenueKind,
        side: OrderSide,
        qty: Size,
        reduce_only: bool,
    ) -> Self {
        Self {
            label: label.into(),
            venue,
            side,
            qty,
            reduce_only,
            outcome: LegOutcome::NotSent,
        }
    }

    pub fn is_filled(&self) -> bool {
        matches!(self.outcome, LegOutcome::Filled(_))
    }
}

/// Both legs of a paired action, in submission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairReport {
    pub action: PairAction,
    pub dry_run: bool,
    /// Quantity sent on both legs.
    pub qty: Size,
    pub legs: [LegReport; 2],
}

impl PairReport {
    pub fn all_filled(&self) -> bool {
        self.legs.iter().all(LegReport::is_filled)
    }

    /// The filled leg of a half-executed pair, if any.
    pub fn unhedged_leg(&self) -> Option<&LegReport> {
        match (self.legs[0].is_filled(), self.legs[1].is_filled()) {
            (true, false) => Some(&self.legs[0]),
            (false, true) => Some(&self.legs[1]),
            _ => None,
        }
    }
}

// ============================================================================
// Position state
// ============================================================================

/// Current hedge. `Open` always carries a positive quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HedgeState {
    #[default]
    Flat,
    Open { direction: Direction, qty: Size },
}

impl HedgeState {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    /// Open quantity, zero when flat.
    pub fn qty(&self) -> Size {
        match self {
            Self::Flat => Size::ZERO,
            Self::Open { qty, .. } => *qty,
        }
    }

    pub fn direction(&self) -> Option<Direction> {
        match self {
            Self::Flat => None,
            Self::Open { direction, .. } => Some(*direction),
        }
    }
}

/// Persisted position of one symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionState {
    pub symbol: String,
    pub hedge: HedgeState,
    /// Direction of the most recent open, kept after the close.
    pub last_direction: Direction,
    pub last_open_basis_bps: Option<Decimal>,
    pub last_close_basis_bps: Option<Decimal>,
    /// Report of the most recent transition.
    pub actions: Option<PairReport>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PositionState {
    /// Flat state for a first run.
    pub fn empty(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            hedge: HedgeState::Flat,
            last_direction: Direction::Carry,
            last_open_basis_bps: None,
            last_close_basis_bps: None,
            actions: None,
            updated_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.hedge.is_open()
    }

    /// Apply a confirmed open.
    pub fn record_open(&mut self, direction: Direction, basis_bps: Decimal, report: PairReport) {
        self.hedge = HedgeState::Open {
            direction,
            qty: report.qty,
        };
        self.last_direction = direction;
        self.last_open_basis_bps = Some(basis_bps);
        self.actions = Some(report);
        self.updated_at = Some(Utc::now());
    }

    /// Apply a confirmed close.
    pub fn record_close(&mut self, basis_bps: Decimal, report: PairReport) {
        self.hedge = HedgeState::Flat;
        self.last_close_basis_bps = Some(basis_bps);
        self.actions = Some(report);
        self.updated_at = Some(Utc::now());
    }

    pub(crate) fn to_record(&self) -> StateRecord {
        StateRecord {
            open: self.hedge.is_open(),
            dir: Some(self.hedge.direction().unwrap_or(self.last_direction)),
            qty: self.hedge.qty().inner(),
            symbol: Some(self.symbol.clone()),
            last_open_basis_bps: self.last_open_basis_bps,
            last_close_basis_bps: self.last_close_basis_bps,
            actions: self
                .actions
                .as_ref()
                .and_then(|report| serde_json::to_value(report).ok()),
            updated_at: self.updated_at,
        }
    }

    pub(crate) fn from_record(symbol: &str, record: StateRecord) -> Self {
        let direction = record.dir.unwrap_or(Direction::Carry);
        let qty = Size::new(record.qty);

        let hedge = if record.open && qty.is_positive() {
            HedgeState::Open { direction, qty }
        } else {
            if record.open {
                warn!(%qty, "State marked open with non-positive quantity, loading as flat");
            }
            HedgeState::Flat
        };

        let actions = record.actions.and_then(|value| {
            serde_json::from_value::<PairReport>(value)
                .map_err(|e| debug!(?e, "Ignoring unrecognised actions record"))
                .ok()
        });

        Self {
            symbol: record.symbol.unwrap_or_else(|| symbol.to_string()),
            hedge,
            last_direction: direction,
            last_open_basis_bps: record.last_open_basis_bps,
            last_close_basis_bps: record.last_close_basis_bps,
            actions,
            updated_at: record.updated_at,
        }
    }
}

/// On-disk shape. Numbers are written as JSON numbers.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct StateRecord {
    #[serde(default)]
    pub open: bool,
    #[serde(default)]
    pub dir: Option<Direction>,
    #[serde(default, with = "rust_decimal::serde::float")]
    pub qty: Decimal,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_open_basis_bps: Option<Decimal>,
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_close_basis_bps: Option<Decimal>,
    /// Kept untyped so records written by older versions still load.
    #[serde(default)]
    pub actions: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}
