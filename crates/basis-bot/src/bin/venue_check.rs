//! Venue connectivity check.
//!
//! Reads prices, depth, balances and lot filters from the configured
//! Binance endpoints without touching the bot's state.
//! `test-order` uses the spot validation endpoint and never executes.

use std::process::ExitCode;

use anyhow::Result;
use basis_bot::config::VenueConfig;
use basis_bot::VenueCredentials;
use basis_core::{BasisSample, OrderSide, Size};
use basis_venue::error::INVALID_KEY_OR_PERMISSIONS;
use basis_venue::{
    BinanceFuturesClient, BinanceSpotClient, DerivativesVenue, OrderRequest, Venue, VenueError,
};
use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;

/// Binance spot/futures connectivity check
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[arg(long, default_value = "BTCUSDT")]
    symbol: String,
    /// Use the spot testnet
    #[arg(long, env = "BINANCE_TESTNET")]
    testnet: bool,
    /// Use the futures testnet
    #[arg(long, env = "BINANCE_FUTURES_TESTNET")]
    futures_testnet: bool,
    /// Spot base URL override
    #[arg(long, env = "BINANCE_BASE_URL")]
    base_url: Option<String>,
    /// Futures base URL override
    #[arg(long, env = "BINANCE_FUTURES_BASE_URL")]
    futures_base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolved endpoints and which credentials are loaded
    Config,
    /// Spot last price
    Price,
    /// Top of the spot order book
    Orderbook {
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    /// Futures mark price and the resulting basis
    Mark,
    /// Spot and futures balance of an asset
    Balance { asset: String },
    /// Lot-size filters on both venues
    Filters,
    /// Validate a spot market order without executing it
    TestOrder { side: Side, qty: Decimal },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Side {
    Buy,
    Sell,
}

impl From<Side> for OrderSide {
    fn from(side: Side) -> Self {
        match side {
            Side::Buy => OrderSide::Buy,
            Side::Sell => OrderSide::Sell,
        }
    }
}

struct Checks {
    symbol: String,
    spot: BinanceSpotClient,
    futures: BinanceFuturesClient,
}

impl Checks {
    async fn run(&self, command: &Command) -> Result<(), VenueError> {
        let symbol = self.symbol.as_str();
        match command {
            // Answered from local configuration in `main`.
            Command::Config => {}
            Command::Price => {
                let price = self.spot.get_price(symbol).await?;
                println!("{symbol} spot price: {price}");
            }
            Command::Orderbook { limit } => {
                let book = self.spot.order_book(symbol, *limit).await?;
                println!("BIDS:");
                for level in &book.bids {
                    println!("  {} x {}", level.price, level.qty);
                }
                println!("ASKS:");
                for level in &book.asks {
                    println!("  {} x {}", level.price, level.qty);
                }
            }
            Command::Mark => {
                let spot = self.spot.get_price(symbol).await?;
                let mark = self.futures.get_mark_price(symbol).await?;
                let sample = BasisSample::new(spot, mark);
                println!(
                    "{symbol} spot={} mark={} basis_bps={}",
                    sample.spot_price,
                    sample.mark_price,
                    sample.basis_bps.round_dp(4)
                );
            }
            Command::Balance { asset } => {
                let asset = asset.to_uppercase();
                let spot = self.spot.get_balance(&asset).await?;
                println!("spot    {asset}: free={} locked={}", spot.free, spot.locked);
                let futures = self.futures.get_balance(&asset).await?;
                println!("futures {asset}: free={} locked={}", futures.free, futures.locked);
            }
            Command::Filters => {
                for (label, filter) in [
                    ("spot", self.spot.lot_filter(symbol).await?),
                    ("futures", self.futures.lot_filter(symbol).await?),
                ] {
                    println!(
                        "{label:<8} {symbol}: step={} min={} max={}",
                        filter.step, filter.min, filter.max
                    );
                }
            }
            Command::TestOrder { side, qty } => {
                let request = OrderRequest::market(symbol, (*side).into(), Size::new(*qty));
                let receipt = self.spot.place_test_order(request).await?;
                println!(
                    "test order accepted: cloid={} status={}",
                    receipt.client_order_id, receipt.status
                );
            }
        }
        Ok(())
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn print_config(venues: &VenueConfig, credentials: &VenueCredentials) {
    println!("spot url:     {}", venues.spot_url());
    println!("futures url:  {}", venues.futures_url());
    println!("spot testnet: {}", yes_no(venues.spot_testnet));
    println!("fut. testnet: {}", yes_no(venues.futures_testnet));
    println!("spot creds:   {}", yes_no(credentials.spot.is_some()));
    println!("fut. creds:   {}", yes_no(credentials.futures.is_some()));
}

fn explain_error(error: &VenueError, venues: &VenueConfig, credentials: &VenueCredentials) {
    eprintln!("{error}");
    if error.api_code() != Some(INVALID_KEY_OR_PERMISSIONS) {
        return;
    }

    eprintln!("Hint: -2015 means invalid API key, IP, or permissions.");
    eprintln!("- Use TESTNET keys with --testnet / --futures-testnet or a testnet base URL.");
    eprintln!("- Enable trading permissions on the API key.");
    eprintln!("- If an IP whitelist is enabled, add your current IP or disable the restriction.");
    eprintln!("- Spot base URL: {}", venues.spot_url());
    eprintln!("- Futures base URL: {}", venues.futures_url());
    eprintln!(
        "- Spot credentials loaded: {}, futures credentials loaded: {}",
        yes_no(credentials.spot.is_some()),
        yes_no(credentials.futures.is_some())
    );
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    basis_telemetry::init_logging("warn")?;

    let venues = VenueConfig {
        spot_testnet: cli.testnet,
        futures_testnet: cli.futures_testnet,
        spot_base_url: cli.base_url.clone(),
        futures_base_url: cli.futures_base_url.clone(),
        ..VenueConfig::default()
    };
    let credentials = VenueCredentials::from_env();
    if matches!(cli.command, Command::Config) {
        print_config(&venues, &credentials);
        return Ok(ExitCode::SUCCESS);
    }

    let checks = Checks {
        symbol: cli.symbol.to_uppercase(),
        spot: BinanceSpotClient::new(venues.spot_client(credentials.spot.clone()))?,
        futures: BinanceFuturesClient::new(venues.futures_client(credentials.futures.clone()))?,
    };

    match checks.run(&cli.command).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            explain_error(&e, &venues, &credentials);
            Ok(ExitCode::FAILURE)
        }
    }
}
