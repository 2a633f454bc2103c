//! Venue clients for the basis arbitrage bot.
//!
//! One client instance per venue: a spot market and a perpetual-futures
//! market for the same symbol.
//!
//! # Key Components
//!
//! - [`Venue`]: Capabilities shared by both venues (price, balance, lot filter, orders)
//! - [`DerivativesVenue`]: Mark price plus leverage / margin-type setup
//! - [`BinanceSpotClient`]: Binance spot REST (`/api/v3`)
//! - [`BinanceFuturesClient`]: Binance USDT-M futures REST (`/fapi`)
//! - [`Credentials`]: API key + HMAC-SHA256 request signing
//! - [`MockVenue`]: Scriptable in-memory venue for tests and dry harnesses

pub mod error;
pub mod futures;
pub mod mock;
pub mod rest;
pub mod signer;
pub mod spot;
pub mod traits;
pub mod types;
mod wire;

pub use error::{VenueError, VenueResult};
pub use futures::{BinanceFuturesClient, FUTURES_MAINNET_URL, FUTURES_TESTNET_URL};
pub use mock::MockVenue;
pub use rest::ClientConfig;
pub use signer::Credentials;
pub use spot::{BinanceSpotClient, SPOT_MAINNET_URL, SPOT_TESTNET_URL};
pub use traits::{BoxFuture, DerivativesVenue, DynDerivativesVenue, DynVenue, Venue};
pub use types::{Balance, BookLevel, OrderBook, OrderReceipt, OrderRequest, VenueKind};
