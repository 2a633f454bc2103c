//! Core domain types for the basis arbitrage bot.
//!
//! This crate provides fundamental types used throughout the trading system:
//! - `Price`, `Size`: Precision-safe numeric types
//! - `LotFilter`: Venue quantity constraints (step, min, max)
//! - `OrderSide`, `OrderType`, `ClientOrderId`: Order primitives
//! - `Direction`, `StrategyMode`: Hedge direction and strategy selection
//! - `basis_bps`, `BasisSample`: Basis calculator

pub mod basis;
pub mod decimal;
pub mod error;
pub mod filter;
pub mod order;
pub mod strategy;

pub use basis::{basis_bps, BasisSample};
pub use decimal::{Price, Size};
pub use error::CoreError;
pub use filter::LotFilter;
pub use order::{base_asset, ClientOrderId, OrderSide, OrderType};
pub use strategy::{Direction, StrategyMode};
