//! Position state persistence for the basis arbitrage bot.
//!
//! The persisted record is the sole source of recovered truth after a
//! restart: it is overwritten in full after every confirmed transition
//! and reloaded once when the loop starts.

pub mod error;
pub mod state;
pub mod store;

pub use error::{PersistenceError, PersistenceResult};
pub use state::{HedgeState, LegOutcome, LegReport, PairAction, PairReport, PositionState};
pub use store::StateStore;
