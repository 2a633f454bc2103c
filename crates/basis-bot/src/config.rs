//! Application configuration.
//!
//! Resolution order: TOML file (`--config`, else `BASIS_CONFIG`, else
//! `config/default.toml` when present, else built-in defaults), then
//! command-line overrides. The result is validated once and frozen into
//! [`StrategyParams`]; nothing reads the environment after startup.

use crate::error::{AppError, AppResult};
use basis_core::StrategyMode;
use basis_venue::{
    ClientConfig, Credentials, FUTURES_MAINNET_URL, FUTURES_TESTNET_URL, SPOT_MAINNET_URL,
    SPOT_TESTNET_URL,
};
use clap::Args;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file used when no path is given.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

pub const SPOT_API_KEY_ENV: &str = "BINANCE_API_KEY";
pub const SPOT_API_SECRET_ENV: &str = "BINANCE_API_SECRET";
pub const FUTURES_API_KEY_ENV: &str = "BINANCE_FUTURES_API_KEY";
pub const FUTURES_API_SECRET_ENV: &str = "BINANCE_FUTURES_API_SECRET";

/// Strategy section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    #[serde(default = "default_symbol")]
    pub symbol: String,
    /// Quote notional spent on the spot leg (USDT).
    #[serde(default = "default_notional")]
    pub notional: Decimal,
    /// Entry threshold in bps. Negated for reverse entries.
    #[serde(default = "default_entry_bps")]
    pub entry_bps: Decimal,
    /// Exit threshold in bps. Negated for reverse exits.
    #[serde(default = "default_exit_bps")]
    pub exit_bps: Decimal,
    /// Polling interval in seconds.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: f64,
    #[serde(default = "default_leverage")]
    pub leverage: u32,
    #[serde(default)]
    pub isolated: bool,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub mode: StrategyMode,
}

fn default_symbol() -> String {
    "BTCUSDT".to_string()
}

fn default_notional() -> Decimal {
    Decimal::new(50, 0)
}

fn default_entry_bps() -> Decimal {
    Decimal::new(20, 1)
}

fn default_exit_bps() -> Decimal {
    Decimal::new(2, 1)
}

fn default_interval_secs() -> f64 {
    2.0
}

fn default_leverage() -> u32 {
    2
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            notional: default_notional(),
            entry_bps: default_entry_bps(),
            exit_bps: default_exit_bps(),
            interval_secs: default_interval_secs(),
            leverage: default_leverage(),
            isolated: false,
            dry_run: false,
            mode: StrategyMode::default(),
        }
    }
}

/// Venue endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueConfig {
    #[serde(default)]
    pub spot_testnet: bool,
    #[serde(default)]
    pub futures_testnet: bool,
    /// Overrides the mainnet/testnet spot URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spot_base_url: Option<String>,
    /// Overrides the mainnet/testnet futures URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub futures_base_url: Option<String>,
    #[serde(default = "default_recv_window_ms")]
    pub recv_window_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_recv_window_ms() -> u64 {
    5_000
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            spot_testnet: false,
            futures_testnet: false,
            spot_base_url: None,
            futures_base_url: None,
            recv_window_ms: default_recv_window_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl VenueConfig {
    pub fn spot_url(&self) -> &str {
        match &self.spot_base_url {
            Some(url) => url.as_str(),
            None if self.spot_testnet => SPOT_TESTNET_URL,
            None => SPOT_MAINNET_URL,
        }
    }

    pub fn futures_url(&self) -> &str {
        match &self.futures_base_url {
            Some(url) => url.as_str(),
            None if self.futures_testnet => FUTURES_TESTNET_URL,
            None => FUTURES_MAINNET_URL,
        }
    }

    pub fn spot_client(&self, credentials: Option<Credentials>) -> ClientConfig {
        self.client(self.spot_url(), credentials)
    }

    pub fn futures_client(&self, credentials: Option<Credentials>) -> ClientConfig {
        self.client(self.futures_url(), credentials)
    }

    fn client(&self, url: &str, credentials: Option<Credentials>) -> ClientConfig {
        let config = ClientConfig::new(url)
            .with_timeout(Duration::from_millis(self.timeout_ms))
            .with_recv_window_ms(self.recv_window_ms);
        match credentials {
            Some(credentials) => config.with_credentials(credentials),
            None => config,
        }
    }
}

/// Persistence section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
}

fn default_state_file() -> PathBuf {
    PathBuf::from("arb_state.json")
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default tracing filter; `RUST_LOG` wins.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub venues: VenueConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            strategy: StrategyConfig::default(),
            venues: VenueConfig::default(),
            persistence: PersistenceConfig::default(),
        }
    }
}

/// Command-line overrides. Flags only override when set.
#[derive(Debug, Clone, Default, Args)]
pub struct CliOverrides {
    /// Trading symbol (e.g. BTCUSDT)
    #[arg(long)]
    pub symbol: Option<String>,
    /// Spot-leg notional in quote currency
    #[arg(long)]
    pub notional: Option<Decimal>,
    /// Entry threshold in bps
    #[arg(long, allow_hyphen_values = true)]
    pub entry_bps: Option<Decimal>,
    /// Exit threshold in bps
    #[arg(long, allow_hyphen_values = true)]
    pub exit_bps: Option<Decimal>,
    /// Polling interval in seconds
    #[arg(long)]
    pub interval: Option<f64>,
    /// Futures leverage (clamped to 1..=125)
    #[arg(long)]
    pub leverage: Option<u32>,
    /// Use isolated margin on the futures venue
    #[arg(long)]
    pub isolated: bool,
    /// Compute and log intended orders without sending them
    #[arg(long)]
    pub dry_run: bool,
    /// Strategy mode: carry, reverse or auto
    #[arg(long)]
    pub mode: Option<StrategyMode>,
    /// Use the spot testnet
    #[arg(long, env = "BINANCE_TESTNET")]
    pub testnet: bool,
    /// Use the futures testnet
    #[arg(long, env = "BINANCE_FUTURES_TESTNET")]
    pub futures_testnet: bool,
    /// Spot base URL override
    #[arg(long, env = "BINANCE_BASE_URL")]
    pub base_url: Option<String>,
    /// Futures base URL override
    #[arg(long, env = "BINANCE_FUTURES_BASE_URL")]
    pub futures_base_url: Option<String>,
    /// Position state file
    #[arg(long)]
    pub state_file: Option<PathBuf>,
    /// Default log level
    #[arg(long)]
    pub log_level: Option<String>,
}

/// Immutable strategy parameters for the loop's lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyParams {
    pub symbol: String,
    pub notional: Decimal,
    pub entry_bps: Decimal,
    pub exit_bps: Decimal,
    pub interval: Duration,
    pub leverage: u32,
    pub isolated: bool,
    pub dry_run: bool,
    pub mode: StrategyMode,
}

impl AppConfig {
    /// Load from `path`, or from the default path when present.
    ///
    /// An explicit path must exist; a missing default file means defaults.
    pub fn load(path: Option<&str>) -> AppResult<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::from_file(DEFAULT_CONFIG_PATH),
            None => {
                tracing::warn!(path = DEFAULT_CONFIG_PATH, "Config file not found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config {path}: {e}")))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Apply command-line overrides on top of the file values.
    pub fn apply_overrides(&mut self, o: &CliOverrides) {
        let s = &mut self.strategy;
        if let Some(symbol) = &o.symbol {
            s.symbol = symbol.clone();
        }
        if let Some(notional) = o.notional {
            s.notional = notional;
        }
        if let Some(entry_bps) = o.entry_bps {
            s.entry_bps = entry_bps;
        }
        if let Some(exit_bps) = o.exit_bps {
            s.exit_bps = exit_bps;
        }
        if let Some(interval) = o.interval {
            s.interval_secs = interval;
        }
        if let Some(leverage) = o.leverage {
            s.leverage = leverage;
        }
        if let Some(mode) = o.mode {
            s.mode = mode;
        }
        s.isolated |= o.isolated;
        s.dry_run |= o.dry_run;

        let v = &mut self.venues;
        v.spot_testnet |= o.testnet;
        v.futures_testnet |= o.futures_testnet;
        if let Some(url) = &o.base_url {
            v.spot_base_url = Some(url.clone());
        }
        if let Some(url) = &o.futures_base_url {
            v.futures_base_url = Some(url.clone());
        }

        if let Some(path) = &o.state_file {
            self.persistence.state_file = path.clone();
        }
        if let Some(level) = &o.log_level {
            self.log_level = level.clone();
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> AppResult<()> {
        let s = &self.strategy;
        if s.symbol.trim().is_empty() {
            return Err(AppError::Config("symbol must not be empty".to_string()));
        }
        if s.notional <= Decimal::ZERO {
            return Err(AppError::Config(format!(
                "notional must be positive, got {}",
                s.notional
            )));
        }
        if !(s.interval_secs.is_finite() && s.interval_secs > 0.0) {
            return Err(AppError::Config(format!(
                "interval must be positive, got {}",
                s.interval_secs
            )));
        }
        if s.exit_bps > s.entry_bps {
            return Err(AppError::Config(format!(
                "exit_bps ({}) must not exceed entry_bps ({})",
                s.exit_bps, s.entry_bps
            )));
        }
        Ok(())
    }

    /// Validated, immutable strategy parameters.
    pub fn strategy_params(&self) -> AppResult<StrategyParams> {
        self.validate()?;
        let s = &self.strategy;
        let interval = Duration::try_from_secs_f64(s.interval_secs)
            .map_err(|e| AppError::Config(format!("invalid interval {}: {e}", s.interval_secs)))?;

        Ok(StrategyParams {
            symbol: s.symbol.trim().to_uppercase(),
            notional: s.notional,
            entry_bps: s.entry_bps,
            exit_bps: s.exit_bps,
            interval,
            leverage: s.leverage,
            isolated: s.isolated,
            dry_run: s.dry_run,
            mode: s.mode,
        })
    }
}

/// API credentials for both venues.
#[derive(Debug, Clone, Default)]
pub struct VenueCredentials {
    pub spot: Option<Credentials>,
    pub futures: Option<Credentials>,
}

impl VenueCredentials {
    /// Read credentials from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read credentials through `lookup`.
    ///
    /// Futures key and secret each fall back to the spot value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let pair = |key: Option<String>, secret: Option<String>| match (key, secret) {
            (Some(key), Some(secret)) => Some(Credentials::new(key, secret)),
            _ => None,
        };

        let spot_key = get(SPOT_API_KEY_ENV);
        let spot_secret = get(SPOT_API_SECRET_ENV);
        let futures_key = get(FUTURES_API_KEY_ENV).or_else(|| spot_key.clone());
        let futures_secret = get(FUTURES_API_SECRET_ENV).or_else(|| spot_secret.clone());

        Self {
            spot: pair(spot_key, spot_secret),
            futures: pair(futures_key, futures_secret),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        overrides: CliOverrides,
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        let s = &config.strategy;
        assert_eq!(s.symbol, "BTCUSDT");
        assert_eq!(s.notional, dec!(50));
        assert_eq!(s.entry_bps, dec!(2.0));
        assert_eq!(s.exit_bps, dec!(0.2));
        assert_eq!(s.interval_secs, 2.0);
        assert_eq!(s.leverage, 2);
        assert!(!s.isolated);
        assert!(!s.dry_run);
        assert_eq!(s.mode, StrategyMode::Carry);
        assert_eq!(config.persistence.state_file, PathBuf::from("arb_state.json"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(AppConfig::from_toml_str("").unwrap(), AppConfig::default());
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let shipped = include_str!("../../../config/default.toml");
        assert_eq!(AppConfig::from_toml_str(shipped).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_toml_sections() {
        let config = AppConfig::from_toml_str(
            r#"
            log_level = "debug"

            [strategy]
            symbol = "ETHUSDT"
            notional = 100
            entry_bps = 5.0
            exit_bps = 1.0
            interval_secs = 0.5
            mode = "auto"
            dry_run = true

            [venues]
            spot_testnet = true
            futures_base_url = "http://127.0.0.1:9000"

            [persistence]
            state_file = "/tmp/eth_state.json"
            "#,
        )
        .unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.strategy.symbol, "ETHUSDT");
        assert_eq!(config.strategy.notional, dec!(100));
        assert_eq!(config.strategy.mode, StrategyMode::Auto);
        assert_eq!(config.strategy.leverage, 2);
        assert_eq!(config.venues.spot_url(), SPOT_TESTNET_URL);
        assert_eq!(config.venues.futures_url(), "http://127.0.0.1:9000");

        let params = config.strategy_params().unwrap();
        assert_eq!(params.interval, Duration::from_millis(500));
        assert_eq!(params.entry_bps, dec!(5));
        assert!(params.dry_run);
    }

    #[test]
    fn test_config_serialization_round_trip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("[strategy]"));
        assert_eq!(AppConfig::from_toml_str(&toml_str).unwrap(), config);
    }

    #[test]
    fn test_cli_overrides_win() {
        let mut config = AppConfig::from_toml_str(
            r#"
            [strategy]
            symbol = "ETHUSDT"
            entry_bps = 5.0
            "#,
        )
        .unwrap();

        let cli = TestCli::try_parse_from([
            "basis-bot",
            "--symbol",
            "SOLUSDT",
            "--exit-bps",
            "-0.5",
            "--mode",
            "reverse",
            "--dry-run",
            "--futures-base-url",
            "http://localhost:1",
        ])
        .unwrap();
        config.apply_overrides(&cli.overrides);

        assert_eq!(config.strategy.symbol, "SOLUSDT");
        assert_eq!(config.strategy.entry_bps, dec!(5));
        assert_eq!(config.strategy.exit_bps, dec!(-0.5));
        assert_eq!(config.strategy.mode, StrategyMode::Reverse);
        assert!(config.strategy.dry_run);
        assert_eq!(config.venues.futures_url(), "http://localhost:1");
    }

    #[test]
    fn test_validation() {
        let mut config = AppConfig::default();
        config.strategy.notional = dec!(0);
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.strategy.interval_secs = 0.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.strategy.exit_bps = dec!(3);
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.strategy.symbol = "  ".to_string();
        assert!(config.strategy_params().is_err());
    }

    #[test]
    fn test_venue_urls() {
        let mut venues = VenueConfig::default();
        assert_eq!(venues.spot_url(), SPOT_MAINNET_URL);
        assert_eq!(venues.futures_url(), FUTURES_MAINNET_URL);

        venues.futures_testnet = true;
        assert_eq!(venues.futures_url(), FUTURES_TESTNET_URL);
        assert_eq!(venues.spot_url(), SPOT_MAINNET_URL);
    }

    #[test]
    fn test_futures_credentials_fall_back_to_spot() {
        let env: HashMap<&str, &str> = [
            (SPOT_API_KEY_ENV, "spot-key"),
            (SPOT_API_SECRET_ENV, "spot-secret"),
        ]
        .into_iter()
        .collect();
        let creds = VenueCredentials::from_lookup(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(creds.spot.as_ref().map(|c| c.api_key()), Some("spot-key"));
        assert_eq!(creds.futures.as_ref().map(|c| c.api_key()), Some("spot-key"));
    }

    #[test]
    fn test_dedicated_futures_credentials() {
        let env: HashMap<&str, &str> = [
            (SPOT_API_KEY_ENV, "spot-key"),
            (SPOT_API_SECRET_ENV, "spot-secret"),
            (FUTURES_API_KEY_ENV, "fut-key"),
            (FUTURES_API_SECRET_ENV, "fut-secret"),
        ]
        .into_iter()
        .collect();
        let creds = VenueCredentials::from_lookup(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(creds.futures.as_ref().map(|c| c.api_key()), Some("fut-key"));
    }

    #[test]
    fn test_missing_credentials() {
        let creds = VenueCredentials::from_lookup(|_| None);
        assert!(creds.spot.is_none());
        assert!(creds.futures.is_none());
    }
}
