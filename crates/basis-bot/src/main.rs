//! Spot/perpetual basis arbitrage bot - entry point.

use std::sync::Arc;

use anyhow::Result;
use basis_bot::{AppConfig, ArbitrageLoop, CliOverrides, VenueCredentials};
use basis_persistence::StateStore;
use basis_venue::{BinanceFuturesClient, BinanceSpotClient, DynDerivativesVenue, DynVenue};
use clap::Parser;
use tracing::{info, warn};

/// Spot/perpetual basis arbitrage bot
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (default: config/default.toml when present)
    #[arg(short, long, env = "BASIS_CONFIG")]
    config: Option<String>,

    #[command(flatten)]
    overrides: CliOverrides,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref())?;
    config.apply_overrides(&args.overrides);

    basis_telemetry::init_logging(&config.log_level)?;
    info!("Starting basis-bot v{}", env!("CARGO_PKG_VERSION"));

    let params = config.strategy_params()?;
    let credentials = VenueCredentials::from_env();
    if credentials.spot.is_none() {
        warn!("Spot API credentials not set, signed calls will fail");
    }
    if credentials.futures.is_none() {
        warn!("Futures API credentials not set, signed calls will fail");
    }

    let spot: DynVenue = Arc::new(BinanceSpotClient::new(
        config.venues.spot_client(credentials.spot),
    )?);
    let derivatives: DynDerivativesVenue = Arc::new(BinanceFuturesClient::new(
        config.venues.futures_client(credentials.futures),
    )?);
    info!(
        spot_url = config.venues.spot_url(),
        futures_url = config.venues.futures_url(),
        state_file = %config.persistence.state_file.display(),
        "Venues configured"
    );

    let store = StateStore::new(&config.persistence.state_file);
    let mut arbitrage = ArbitrageLoop::new(params, spot, derivatives, store)?;

    tokio::select! {
        result = arbitrage.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown requested"),
    }

    Ok(())
}
