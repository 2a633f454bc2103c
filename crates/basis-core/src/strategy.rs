//! Hedge direction and strategy mode.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction of an open hedge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Cash-and-carry: long spot, short perpetual.
    Carry,
    /// Reverse basis: short spot (from held inventory), long perpetual.
    Reverse,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Carry => "carry",
            Self::Reverse => "reverse",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which directions the loop is allowed to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyMode {
    #[default]
    Carry,
    Reverse,
    /// Either direction; carry is evaluated first.
    Auto,
}

impl StrategyMode {
    /// Whether this mode may open a hedge in `direction`.
    pub fn allows(&self, direction: Direction) -> bool {
        matches!(
            (self, direction),
            (Self::Auto, _) | (Self::Carry, Direction::Carry) | (Self::Reverse, Direction::Reverse)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Carry => "carry",
            Self::Reverse => "reverse",
            Self::Auto => "auto",
        }
    }
}

impl fmt::Display for StrategyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "carry" => Ok(Self::Carry),
            "reverse" => Ok(Self::Reverse),
            "auto" => Ok(Self::Auto),
            other => Err(CoreError::InvalidMode(other.to_string())),
        }
    }
}
