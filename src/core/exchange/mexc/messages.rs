//! MEXC wire DTOs.
//!
//! REST follows the binance-style spot v3 shapes; the WS depth channel
//! delivers JSON frames. Aggregate-deal frames on the same socket are
//! length-prefixed binary and are not decoded here; the engine only
//! consumes depth.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::domain::{BookSnapshot, PriceLevel, Symbol};
use crate::error::{Error, Result};

/// REST `GET /api/v3/depth` response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestDepth {
    pub last_update_id: u64,
    pub bids: Vec<[String; 2]>,
    pub asks: Vec<[String; 2]>,
}

impl RestDepth {
    pub fn into_snapshot(self, symbol: &Symbol) -> Result<BookSnapshot> {
        let bids = parse_levels(&self.bids)?;
        let asks = parse_levels(&self.asks)?;
        Ok(BookSnapshot::new(
            symbol.clone(),
            bids,
            asks,
            self.last_update_id,
        ))
    }
}

/// REST order placement acknowledgement.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestOrderAck {
    pub order_id: serde_json::Value,
}

impl RestOrderAck {
    /// MEXC returns the id as either a number or a string depending on
    /// endpoint version.
    pub fn order_id_string(&self) -> String {
        match &self.order_id {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// REST order status response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestOrderStatus {
    pub status: String,
    pub orig_qty: Decimal,
    pub executed_qty: Decimal,
    #[serde(default)]
    pub cummulative_quote_qty: Decimal,
}

/// REST error body.
#[derive(Debug, Deserialize)]
pub struct RestError {
    pub code: i64,
    pub msg: String,
}

/// WS subscription request.
#[derive(Debug, Serialize)]
pub struct WsRequest {
    pub method: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<String>,
}

impl WsRequest {
    pub fn subscribe_depth(native_symbol: &str, depth: usize) -> Self {
        Self {
            method: "SUBSCRIPTION",
            params: vec![format!(
                "spot@public.limit.depth.v3.api@{native_symbol}@{depth}"
            )],
        }
    }

    pub fn ping() -> Self {
        Self {
            method: "PING",
            params: Vec::new(),
        }
    }
}

/// WS depth frame: `{"c": channel, "s": symbol, "t": ms, "d": {...}}`.
#[derive(Debug, Deserialize)]
pub struct WsDepthFrame {
    pub c: String,
    #[serde(default)]
    pub s: String,
    #[serde(default)]
    pub t: i64,
    pub d: WsDepthData,
}

#[derive(Debug, Deserialize)]
pub struct WsDepthData {
    #[serde(default)]
    pub bids: Vec<WsLevel>,
    #[serde(default)]
    pub asks: Vec<WsLevel>,
    /// Book version; monotonic per symbol.
    #[serde(default)]
    pub r: String,
}

/// `{"p": price, "v": volume}`.
#[derive(Debug, Deserialize)]
pub struct WsLevel {
    pub p: Decimal,
    pub v: Decimal,
}

impl WsDepthFrame {
    pub fn into_snapshot(self, symbol: &Symbol) -> Result<BookSnapshot> {
        let update_id = self
            .r_version()
            .ok_or_else(|| Error::BookInvariant("depth frame missing version".into()))?;
        let bids = self
            .d
            .bids
            .iter()
            .map(|l| PriceLevel::new(l.p, l.v))
            .collect();
        let asks = self
            .d
            .asks
            .iter()
            .map(|l| PriceLevel::new(l.p, l.v))
            .collect();
        Ok(BookSnapshot::new(symbol.clone(), bids, asks, update_id))
    }

    fn r_version(&self) -> Option<u64> {
        self.d.r.parse().ok()
    }
}

fn parse_levels(raw: &[[String; 2]]) -> Result<Vec<PriceLevel>> {
    raw.iter()
        .map(|[price, size]| {
            let price = price
                .parse()
                .map_err(|_| Error::BookInvariant(format!("bad price {price:?}")))?;
            let size = size
                .parse()
                .map_err(|_| Error::BookInvariant(format!("bad size {size:?}")))?;
            Ok(PriceLevel::new(price, size))
        })
        .collect()
}
