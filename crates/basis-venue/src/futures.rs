//! Binance USDT-M futures REST client.
//!
//! Public: ticker price, premium index (mark price), exchange info.
//! Signed: balances, orders, margin type, leverage.

use basis_core::{LotFilter, Price};
use dashmap::DashMap;
use reqwest::Method;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{VenueError, VenueResult, MARGIN_TYPE_ALREADY_SET};
use crate::rest::{ClientConfig, RestClient};
use crate::traits::{BoxFuture, DerivativesVenue, Venue};
use crate::types::{Balance, OrderReceipt, OrderRequest, VenueKind};
use crate::wire::{ExchangeInfo, RawOrderResponse, TickerPrice};

/// Production USDT-M futures endpoint.
pub const FUTURES_MAINNET_URL: &str = "https://fapi.binance.com";

/// USDT-M futures testnet endpoint.
pub const FUTURES_TESTNET_URL: &str = "https://testnet.binancefuture.com";

/// Leverage bounds accepted by the venue.
pub const MIN_LEVERAGE: u32 = 1;
pub const MAX_LEVERAGE: u32 = 125;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PremiumIndex {
    mark_price: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFuturesBalance {
    asset: String,
    balance: Decimal,
    available_balance: Decimal,
}

/// Binance USDT-M futures client.
pub struct BinanceFuturesClient {
    rest: RestClient,
    /// Lot filters resolved once per symbol.
    filters: DashMap<String, LotFilter>,
}

impl BinanceFuturesClient {
    pub fn new(config: ClientConfig) -> VenueResult<Self> {
        Ok(Self {
            rest: RestClient::new(config)?,
            filters: DashMap::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        self.rest.base_url()
    }

    async fn fetch_price(&self, symbol: &str) -> VenueResult<Price> {
        let ticker: TickerPrice = self
            .rest
            .get_public("/fapi/v1/ticker/price", &[("symbol", symbol)])
            .await?;
        Ok(Price::new(ticker.price))
    }

    async fn fetch_mark_price(&self, symbol: &str) -> VenueResult<Price> {
        let index: PremiumIndex = self
            .rest
            .get_public("/fapi/v1/premiumIndex", &[("symbol", symbol)])
            .await?;
        Ok(Price::new(index.mark_price))
    }

    async fn fetch_lot_filter(&self, symbol: &str) -> VenueResult<LotFilter> {
        if let Some(cached) = self.filters.get(symbol) {
            return Ok(*cached);
        }

        // The futures endpoint ignores the symbol parameter and lists every contract.
        let info: ExchangeInfo = self.rest.get_public("/fapi/v1/exchangeInfo", &[]).await?;
        let filter = info.lot_filter(symbol).ok_or_else(|| {
            VenueError::Decode(format!("exchangeInfo has no entry for {symbol}"))
        })?;

        info!(
            venue = "derivatives",
            symbol,
            step = %filter.step,
            min = %filter.min,
            max = %filter.max,
            "Resolved lot filter"
        );
        self.filters.insert(symbol.to_string(), filter);
        Ok(filter)
    }

    async fn fetch_balance(&self, asset: &str) -> VenueResult<Balance> {
        let balances: Vec<RawFuturesBalance> = self
            .rest
            .send_signed(Method::GET, "/fapi/v2/balance", Vec::new())
            .await?;

        Ok(balances
            .into_iter()
            .find(|b| b.asset == asset)
            .map(|b| Balance {
                free: b.available_balance,
                locked: (b.balance - b.available_balance).max(Decimal::ZERO),
            })
            .unwrap_or_default())
    }

    async fn submit_order(&self, request: OrderRequest) -> VenueResult<OrderReceipt> {
        let mut params = vec![
            ("symbol".to_string(), request.symbol.clone()),
            ("side".to_string(), request.side.as_str().to_string()),
            ("type".to_string(), request.order_type.as_str().to_string()),
            ("quantity".to_string(), request.quantity.to_string()),
            (
                "newClientOrderId".to_string(),
                request.client_order_id.to_string(),
            ),
        ];
        if request.reduce_only {
            params.push(("reduceOnly".to_string(), "true".to_string()));
        }

        debug!(
            symbol = %request.symbol,
            side = %request.side,
            qty = %request.quantity,
            reduce_only = request.reduce_only,
            "Submitting futures order"
        );
        let raw: Option<RawOrderResponse> = self
            .rest
            .send_signed(Method::POST, "/fapi/v1/order", params)
            .await?;
        Ok(raw
            .unwrap_or_default()
            .into_receipt(request.client_order_id.as_str()))
    }

    async fn post_margin_type(&self, symbol: &str, isolated: bool) -> VenueResult<()> {
        let margin_type = if isolated { "ISOLATED" } else { "CROSSED" };
        let params = vec![
            ("symbol".to_string(), symbol.to_string()),
            ("marginType".to_string(), margin_type.to_string()),
        ];

        let result: VenueResult<serde_json::Value> = self
            .rest
            .send_signed(Method::POST, "/fapi/v1/marginType", params)
            .await;
        tolerate_already_set(result)?;

        info!(symbol, margin_type, "Margin type set");
        Ok(())
    }

    async fn post_leverage(&self, symbol: &str, leverage: u32) -> VenueResult<()> {
        let leverage = clamp_leverage(leverage);
        let params = vec![
            ("symbol".to_string(), symbol.to_string()),
            ("leverage".to_string(), leverage.to_string()),
        ];

        let _: serde_json::Value = self
            .rest
            .send_signed(Method::POST, "/fapi/v1/leverage", params)
            .await?;

        info!(symbol, leverage, "Leverage set");
        Ok(())
    }
}

/// Bound leverage to what the venue accepts.
pub fn clamp_leverage(leverage: u32) -> u32 {
    leverage.clamp(MIN_LEVERAGE, MAX_LEVERAGE)
}

/// Map "already set" answers to success.
fn tolerate_already_set<T>(result: VenueResult<T>) -> VenueResult<()> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if e.api_code() == Some(MARGIN_TYPE_ALREADY_SET) => {
            debug!("Margin type already set");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

impl Venue for BinanceFuturesClient {
    fn kind(&self) -> VenueKind {
        VenueKind::Derivatives
    }

    fn get_price<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, VenueResult<Price>> {
        Box::pin(self.fetch_price(symbol))
    }

    fn get_balance<'a>(&'a self, asset: &'a str) -> BoxFuture<'a, VenueResult<Balance>> {
        Box::pin(self.fetch_balance(asset))
    }

    fn lot_filter<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, VenueResult<LotFilter>> {
        Box::pin(self.fetch_lot_filter(symbol))
    }

    fn place_order(&self, request: OrderRequest) -> BoxFuture<'_, VenueResult<OrderReceipt>> {
        Box::pin(self.submit_order(request))
    }
}

impl DerivativesVenue for BinanceFuturesClient {
    fn get_mark_price<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, VenueResult<Price>> {
        Box::pin(self.fetch_mark_price(symbol))
    }

    fn set_leverage<'a>(
        &'a self,
        symbol: &'a str,
        leverage: u32,
    ) -> BoxFuture<'a, VenueResult<()>> {
        Box::pin(self.post_leverage(symbol, leverage))
    }

    fn set_margin_type<'a>(
        &'a self,
        symbol: &'a str,
        isolated: bool,
    ) -> BoxFuture<'a, VenueResult<()>> {
        Box::pin(self.post_margin_type(symbol, isolated))
    }
}
