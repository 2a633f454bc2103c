//! Binance spot REST client.
//!
//! Public: ticker price, order book depth, exchange info (lot filters).
//! Signed: account balances, orders (including validation-only test orders).

use basis_core::{LotFilter, Price};
use dashmap::DashMap;
use reqwest::Method;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{VenueError, VenueResult};
use crate::rest::{ClientConfig, RestClient};
use crate::traits::{BoxFuture, Venue};
use crate::types::{Balance, OrderBook, OrderReceipt, OrderRequest, VenueKind};
use crate::wire::{ExchangeInfo, RawDepth, RawOrderResponse, TickerPrice};

/// Production spot endpoint.
pub const SPOT_MAINNET_URL: &str = "https://api.binance.com";

/// Spot testnet endpoint.
pub const SPOT_TESTNET_URL: &str = "https://testnet.binance.vision";

#[derive(Debug, Deserialize)]
struct AccountResponse {
    #[serde(default)]
    balances: Vec<RawBalance>,
}

#[derive(Debug, Deserialize)]
struct RawBalance {
    asset: String,
    free: Decimal,
    locked: Decimal,
}

/// Binance spot client.
pub struct BinanceSpotClient {
    rest: RestClient,
    /// Lot filters resolved once per symbol.
    filters: DashMap<String, LotFilter>,
}

impl BinanceSpotClient {
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
            .get_public("/api/v3/ticker/price", &[("symbol", symbol)])
            .await?;
        Ok(Price::new(ticker.price))
    }

    async fn fetch_lot_filter(&self, symbol: &str) -> VenueResult<LotFilter> {
        if let Some(cached) = self.filters.get(symbol) {
            return Ok(*cached);
        }

        let info: ExchangeInfo = self
            .rest
            .get_public("/api/v3/exchangeInfo", &[("symbol", symbol)])
            .await?;
        let filter = info.lot_filter(symbol).ok_or_else(|| {
            VenueError::Decode(format!("exchangeInfo has no entry for {symbol}"))
        })?;

        info!(
            venue = "spot",
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
        let account: AccountResponse = self
            .rest
            .send_signed(Method::GET, "/api/v3/account", Vec::new())
            .await?;

        Ok(account
            .balances
            .into_iter()
            .find(|b| b.asset == asset)
            .map(|b| Balance {
                free: b.free,
                locked: b.locked,
            })
            .unwrap_or_default())
    }

    /// Top `limit` levels of each side of the book.
    pub async fn order_book(&self, symbol: &str, limit: u32) -> VenueResult<OrderBook> {
        let limit = limit.to_string();
        let depth: RawDepth = self
            .rest
            .get_public("/api/v3/depth", &[("symbol", symbol), ("limit", &limit)])
            .await?;
        Ok(depth.into_book())
    }

    async fn submit_order(
        &self,
        request: OrderRequest,
        test: bool,
    ) -> VenueResult<OrderReceipt> {
        let params = vec![
            ("symbol".to_string(), request.symbol.clone()),
            ("side".to_string(), request.side.as_str().to_string()),
            ("type".to_string(), request.order_type.as_str().to_string()),
            ("quantity".to_string(), request.quantity.to_string()),
            (
                "newClientOrderId".to_string(),
                request.client_order_id.to_string(),
            ),
        ];
        let path = if test { "/api/v3/order/test" } else { "/api/v3/order" };

        debug!(
            symbol = %request.symbol,
            side = %request.side,
            qty = %request.quantity,
            test,
            "Submitting spot order"
        );
        let raw: Option<RawOrderResponse> =
            self.rest.send_signed(Method::POST, path, params).await?;
        Ok(raw
            .unwrap_or_default()
            .into_receipt(request.client_order_id.as_str()))
    }

    /// Validate an order against the matching engine without executing it.
    pub async fn place_test_order(&self, request: OrderRequest) -> VenueResult<OrderReceipt> {
        self.submit_order(request, true).await
    }
}

impl Venue for BinanceSpotClient {
    fn kind(&self) -> VenueKind {
        VenueKind::Spot
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
        Box::pin(self.submit_order(request, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_account_balances() {
        let account: AccountResponse = serde_json::from_str(
            r#"{"makerCommission":15,"balances":[
                {"asset":"BTC","free":"0.00250000","locked":"0.00000000"},
                {"asset":"USDT","free":"120.5","locked":"4.5"}
            ]}"#,
        )
        .unwrap();

        assert_eq!(account.balances.len(), 2);
        assert_eq!(account.balances[0].free, dec!(0.0025));
        assert_eq!(account.balances[1].locked, dec!(4.5));
    }

    #[test]
    fn test_client_construction() {
        let client = BinanceSpotClient::new(ClientConfig::new(SPOT_TESTNET_URL)).unwrap();
        assert_eq!(client.kind(), VenueKind::Spot);
        assert_eq!(client.base_url(), SPOT_TESTNET_URL);
    }
}
