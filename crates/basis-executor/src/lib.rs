//! Sizing and paired-order execution.
//!
//! # Key Components
//!
//! - [`QuantitySizer`]: Notional to base quantity, reconciled across both venues' lot filters
//! - [`PairExecutor`]: The four two-leg actions (open/close x carry/reverse)
//!
//! # Leg order
//!
//! | action        | leg 1                        | leg 2                        |
//! |---------------|------------------------------|------------------------------|
//! | open_carry    | spot BUY                     | derivatives SELL             |
//! | close_carry   | derivatives BUY reduce-only  | spot SELL                    |
//! | open_reverse  | spot SELL                    | derivatives BUY              |
//! | close_reverse | derivatives SELL reduce-only | spot BUY                     |
//!
//! The two legs are independent venue calls. A failure between them
//! leaves an unhedged position that is reported but not remediated.

pub mod error;
pub mod pair;
pub mod sizer;

pub use error::{ExecutorError, ExecutorResult};
pub use pair::{ExecOutcome, PairExecutor};
pub use sizer::{reconcile, QuantitySizer, SizedQuantity};
