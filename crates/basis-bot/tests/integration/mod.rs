//! Integration tests for basis-bot.
//!
//! These tests drive the arbitrage loop against scripted venues:
//! - Open/close transitions and persisted state
//! - Restart recovery
//! - Dry-run, inventory and failure paths

pub mod common;
