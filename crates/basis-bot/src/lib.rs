//! Spot/perpetual basis arbitrage bot.
//!
//! Polls the spot price and the perpetual mark price, computes the basis
//! and opens or closes a hedged pair across the two venues:
//! - Cash-and-carry (long spot, short perp) when the basis is rich
//! - Reverse (short spot from inventory, long perp) when it is cheap
//!
//! Position state is persisted after every transition and reloaded on
//! start as the sole source of recovered truth.

pub mod arbitrage;
pub mod config;
pub mod error;

pub use arbitrage::{backoff_delay, decide, ArbitrageLoop, Decision, TickOutcome};
pub use config::{AppConfig, CliOverrides, StrategyParams, VenueCredentials};
pub use error::{AppError, AppResult};
