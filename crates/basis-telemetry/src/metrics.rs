//! Prometheus metrics for the basis arbitrage bot.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A registration
//! failure means duplicate metric names, a fatal configuration error that
//! surfaces on first use at startup.

use once_cell::sync::Lazy;
use prometheus::{
    register_gauge, register_int_counter, register_int_counter_vec, register_int_gauge, Encoder,
    Gauge, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

use crate::error::{TelemetryError, TelemetryResult};

/// Loop evaluations.
pub static TICKS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("basis_ticks_total", "Total arbitrage loop evaluations").unwrap()
});

/// Most recent basis in basis points.
pub static BASIS_BPS: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!("basis_bps", "Most recent perp mark vs spot basis in bps").unwrap()
});

/// Most recent spot price.
pub static SPOT_PRICE: Lazy<Gauge> =
    Lazy::new(|| register_gauge!("basis_spot_price", "Most recent spot price").unwrap());

/// Most recent perpetual mark price.
pub static MARK_PRICE: Lazy<Gauge> =
    Lazy::new(|| register_gauge!("basis_mark_price", "Most recent perpetual mark price").unwrap());

/// Confirmed transitions.
/// Labels: action (open_carry/close_carry/open_reverse/close_reverse)
pub static TRANSITIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "basis_transitions_total",
        "Total confirmed position transitions",
        &["action"]
    )
    .unwrap()
});

/// Errors by kind.
/// Labels: kind (data/sizing/order/persist/setup)
pub static ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!("basis_errors_total", "Total errors by kind", &["kind"]).unwrap()
});

/// Hedge state (1 = open, 0 = flat).
pub static POSITION_OPEN: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("basis_position_open", "Hedge state (1=open, 0=flat)").unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Record one loop evaluation with its prices and basis.
    pub fn tick(spot_price: f64, mark_price: f64, basis_bps: f64) {
        TICKS_TOTAL.inc();
        SPOT_PRICE.set(spot_price);
        MARK_PRICE.set(mark_price);
        BASIS_BPS.set(basis_bps);
    }

    /// Record a confirmed transition.
    pub fn transition(action: &str) {
        TRANSITIONS_TOTAL.with_label_values(&[action]).inc();
    }

    /// Record an error.
    pub fn error(kind: &str) {
        ERRORS_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn position_open(is_open: bool) {
        POSITION_OPEN.set(i64::from(is_open));
    }

    /// Render the default registry in the Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&prometheus::gather(), &mut buf)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}
