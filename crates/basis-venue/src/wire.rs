//! Raw response shapes shared by the spot and futures REST APIs.

use basis_core::{LotFilter, Price, Size};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::types::{BookLevel, OrderBook, OrderReceipt};

/// `GET .../ticker/price`.
#[derive(Debug, Deserialize)]
pub(crate) struct TickerPrice {
    pub price: Decimal,
}

/// `GET .../exchangeInfo`.
#[derive(Debug, Deserialize)]
pub(crate) struct ExchangeInfo {
    #[serde(default)]
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SymbolInfo {
    pub symbol: String,
    #[serde(default)]
    pub filters: Vec<RawFilter>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawFilter {
    pub filter_type: String,
    #[serde(default)]
    pub step_size: Option<Decimal>,
    #[serde(default)]
    pub min_qty: Option<Decimal>,
    #[serde(default)]
    pub max_qty: Option<Decimal>,
}

impl ExchangeInfo {
    /// `LOT_SIZE` of `symbol`. A symbol without one is unconstrained.
    pub fn lot_filter(&self, symbol: &str) -> Option<LotFilter> {
        let info = self.symbols.iter().find(|s| s.symbol == symbol)?;
        let lot = info.filters.iter().find(|f| f.filter_type == "LOT_SIZE");

        Some(match lot {
            Some(f) => LotFilter::new(
                Size::new(f.step_size.unwrap_or_default()),
                Size::new(f.min_qty.unwrap_or_default()),
                Size::new(f.max_qty.unwrap_or_default()),
            ),
            None => LotFilter::default(),
        })
    }
}

/// `GET /api/v3/depth`. Levels are `["price", "qty"]` pairs.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawDepth {
    pub bids: Vec<(Decimal, Decimal)>,
    pub asks: Vec<(Decimal, Decimal)>,
}

impl RawDepth {
    pub fn into_book(self) -> OrderBook {
        let levels = |raw: Vec<(Decimal, Decimal)>| {
            raw.into_iter()
                .map(|(price, qty)| BookLevel {
                    price: Price::new(price),
                    qty: Size::new(qty),
                })
                .collect()
        };
        OrderBook {
            bids: levels(self.bids),
            asks: levels(self.asks),
        }
    }
}

/// `POST .../order` acknowledgement (spot and futures share these fields).
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct RawOrderResponse {
    pub order_id: Option<u64>,
    pub client_order_id: Option<String>,
    pub status: Option<String>,
    pub executed_qty: Option<Decimal>,
}

impl RawOrderResponse {
    pub fn into_receipt(self, fallback_client_order_id: &str) -> OrderReceipt {
        OrderReceipt {
            order_id: self.order_id,
            client_order_id: self
                .client_order_id
                .unwrap_or_else(|| fallback_client_order_id.to_string()),
            status: self.status.unwrap_or_else(|| "ACCEPTED".to_string()),
            executed_qty: self.executed_qty.unwrap_or_default(),
        }
    }
}
