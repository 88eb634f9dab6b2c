//! BingX wire DTOs.
//!
//! REST responses wrap payloads in a `{code, msg, data}` envelope; WS
//! frames arrive gzip-compressed. Depth sides are re-sorted best-first on
//! this boundary since BingX delivers asks worst-first.

use std::io::Read;

use flate2::read::GzDecoder;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::domain::{BookSnapshot, PriceLevel, Symbol};
use crate::error::{Error, Result};

pub const VENUE: &str = "bingx";

/// Standard REST envelope.
#[derive(Debug, Deserialize)]
pub struct RestEnvelope<T> {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    pub data: Option<T>,
}

impl<T> RestEnvelope<T> {
    /// Unwrap the payload, mapping venue error codes onto crate errors.
    pub fn into_data(self) -> Result<T> {
        if self.code != 0 {
            let msg = self.msg.to_ascii_lowercase();
            if msg.contains("not exist") || msg.contains("not found") {
                return Err(Error::OrderNotFound);
            }
            return Err(Error::Rejected {
                venue: VENUE,
                reason: format!("{} (code {})", self.msg, self.code),
            });
        }
        self.data
            .ok_or_else(|| Error::Transport("bingx response missing data".into()))
    }
}

/// REST depth payload.
#[derive(Debug, Deserialize)]
pub struct RestDepth {
    #[serde(default)]
    pub bids: Vec<[String; 2]>,
    #[serde(default)]
    pub asks: Vec<[String; 2]>,
    #[serde(default)]
    pub ts: u64,
}

impl RestDepth {
    pub fn into_snapshot(self, symbol: &Symbol) -> Result<BookSnapshot> {
        let bids = parse_and_sort(&self.bids, true)?;
        let asks = parse_and_sort(&self.asks, false)?;
        Ok(BookSnapshot::new(symbol.clone(), bids, asks, self.ts))
    }
}

/// Order placement / cancel payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestOrder {
    pub order_id: u64,
    #[serde(default)]
    pub status: String,
}

/// Order query payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestOrderDetail {
    pub status: String,
    #[serde(default)]
    pub executed_qty: Decimal,
    #[serde(default)]
    pub cummulative_quote_qty: Decimal,
}

/// WS subscription request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WsSubscribe {
    pub id: String,
    pub req_type: &'static str,
    pub data_type: String,
}

impl WsSubscribe {
    pub fn depth(native_symbol: &str, depth: usize) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            req_type: "sub",
            data_type: format!("{native_symbol}@depth{depth}"),
        }
    }
}

/// WS depth frame after gzip decode.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsDepthFrame {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub data_type: String,
    pub data: Option<WsDepthData>,
    #[serde(default)]
    pub ts: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsDepthData {
    #[serde(default)]
    pub bids: Vec<[String; 2]>,
    #[serde(default)]
    pub asks: Vec<[String; 2]>,
    #[serde(default)]
    pub last_update_id: Option<u64>,
}

impl WsDepthFrame {
    pub fn into_snapshot(self, symbol: &Symbol) -> Result<BookSnapshot> {
        let ts = self.ts;
        let data = self
            .data
            .ok_or_else(|| Error::BookInvariant("depth frame missing data".into()))?;
        let update_id = data.last_update_id.unwrap_or(ts);
        let bids = parse_and_sort(&data.bids, true)?;
        let asks = parse_and_sort(&data.asks, false)?;
        Ok(BookSnapshot::new(symbol.clone(), bids, asks, update_id))
    }
}

/// Decompress one gzip WS frame into text.
pub fn gunzip(payload: &[u8]) -> Result<String> {
    let mut decoder = GzDecoder::new(payload);
    let mut text = String::new();
    decoder
        .read_to_string(&mut text)
        .map_err(|e| Error::Transport(format!("gzip decode failed: {e}")))?;
    Ok(text)
}

fn parse_and_sort(raw: &[[String; 2]], descending: bool) -> Result<Vec<PriceLevel>> {
    let mut levels: Vec<PriceLevel> = raw
        .iter()
        .map(|[price, size]| {
            let price = price
                .parse()
                .map_err(|_| Error::BookInvariant(format!("bad price {price:?}")))?;
            let size = size
                .parse()
                .map_err(|_| Error::BookInvariant(format!("bad size {size:?}")))?;
            Ok(PriceLevel::new(price, size))
        })
        .collect::<Result<_>>()?;
    if descending {
        levels.sort_by(|a, b| b.price.cmp(&a.price));
    } else {
        levels.sort_by(|a, b| a.price.cmp(&b.price));
    }
    Ok(levels)
}
