//! MEXC REST adapter: depth snapshots and the order lifecycle.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::messages::{RestDepth, RestError, RestOrderAck, RestOrderStatus};
use crate::core::domain::{BookSnapshot, LegState, OrderId, Symbol};
use crate::core::exchange::signing::{timestamp_ms, Credentials};
use crate::core::exchange::{ExchangeAdapter, OrderSide, OrderStatus};
use crate::error::{Error, Result};

pub const VENUE: &str = "mexc";

/// MEXC spot REST client.
pub struct MexcAdapter {
    client: Client,
    base_url: String,
    credentials: Credentials,
    base_increment: Decimal,
}

impl MexcAdapter {
    pub fn new(base_url: String, credentials: Credentials, base_increment: Decimal) -> Self {
        Self {
            client: Client::new(),
            base_url,
            credentials,
            base_increment,
        }
    }

    fn signed_query(&self, params: &[(&str, String)]) -> String {
        let joined: String = params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        let with_ts = format!("{joined}&timestamp={}", timestamp_ms());
        let signature = self.credentials.sign(&with_ts);
        format!("{with_ts}&signature={signature}")
    }

    fn order_error(&self, status: StatusCode, body: String) -> Error {
        match serde_json::from_str::<RestError>(&body) {
            // -2011: unknown order; -2013: order does not exist.
            Ok(err) if err.code == -2011 || err.code == -2013 => Error::OrderNotFound,
            Ok(err) => Error::Rejected {
                venue: VENUE,
                reason: format!("{} (code {})", err.msg, err.code),
            },
            Err(_) => Error::Transport(format!("mexc http {status}: {body}")),
        }
    }

    fn map_status(raw: &RestOrderStatus) -> LegState {
        match raw.status.as_str() {
            "NEW" => LegState::Submitted,
            "PARTIALLY_FILLED" => LegState::PartiallyFilled,
            "FILLED" => LegState::Filled,
            "CANCELED" | "PARTIALLY_CANCELED" => LegState::Cancelled,
            "REJECTED" | "EXPIRED" => LegState::Rejected,
            other => {
                warn!(venue = VENUE, status = other, "Unrecognized order status");
                LegState::Unknown
            }
        }
    }
}

#[async_trait]
impl ExchangeAdapter for MexcAdapter {
    fn name(&self) -> &'static str {
        VENUE
    }

    fn native_symbol(&self, symbol: &Symbol) -> String {
        symbol.joined()
    }

    fn base_increment(&self) -> Decimal {
        self.base_increment
    }

    async fn fetch_orderbook(&self, symbol: &Symbol, depth: usize) -> Result<BookSnapshot> {
        let url = format!(
            "{}/api/v3/depth?symbol={}&limit={}",
            self.base_url,
            self.native_symbol(symbol),
            depth
        );
        debug!(venue = VENUE, url = %url, "Fetching depth snapshot");
        let depth: RestDepth = self.client.get(&url).send().await?.json().await?;
        let snapshot = depth.into_snapshot(symbol)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    async fn place_limit(
        &self,
        symbol: &Symbol,
        side: OrderSide,
        base_amount: Decimal,
        limit_price: Decimal,
    ) -> Result<OrderId> {
        if base_amount <= Decimal::ZERO {
            return Err(Error::InvalidOrder("non-positive base amount".into()));
        }
        let query = self.signed_query(&[
            ("symbol", self.native_symbol(symbol)),
            ("side", side.as_str().to_string()),
            ("type", "LIMIT".to_string()),
            ("quantity", base_amount.to_string()),
            ("price", limit_price.to_string()),
        ]);
        let url = format!("{}/api/v3/order?{query}", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("X-MEXC-APIKEY", &self.credentials.api_key)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(self.order_error(status, response.text().await?));
        }
        let ack: RestOrderAck = response.json().await?;
        Ok(OrderId::new(ack.order_id_string()))
    }

    async fn place_market(
        &self,
        symbol: &Symbol,
        side: OrderSide,
        base_amount: Decimal,
    ) -> Result<OrderId> {
        if base_amount <= Decimal::ZERO {
            return Err(Error::InvalidOrder("non-positive base amount".into()));
        }
        let query = self.signed_query(&[
            ("symbol", self.native_symbol(symbol)),
            ("side", side.as_str().to_string()),
            ("type", "MARKET".to_string()),
            ("quantity", base_amount.to_string()),
        ]);
        let url = format!("{}/api/v3/order?{query}", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("X-MEXC-APIKEY", &self.credentials.api_key)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(self.order_error(status, response.text().await?));
        }
        let ack: RestOrderAck = response.json().await?;
        Ok(OrderId::new(ack.order_id_string()))
    }

    async fn cancel(&self, symbol: &Symbol, order_id: &OrderId) -> Result<()> {
        let query = self.signed_query(&[
            ("symbol", self.native_symbol(symbol)),
            ("orderId", order_id.as_str().to_string()),
        ]);
        let url = format!("{}/api/v3/order?{query}", self.base_url);
        let response = self
            .client
            .delete(&url)
            .header("X-MEXC-APIKEY", &self.credentials.api_key)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let err = self.order_error(status, response.text().await?);
            // A cancel losing the race to a fill reports the order as
            // gone; the caller re-queries to learn the final fill.
            return Err(match err {
                Error::OrderNotFound => Error::AlreadyTerminal,
                other => other,
            });
        }
        Ok(())
    }

    async fn query(&self, symbol: &Symbol, order_id: &OrderId) -> Result<OrderStatus> {
        let query = self.signed_query(&[
            ("symbol", self.native_symbol(symbol)),
            ("orderId", order_id.as_str().to_string()),
        ]);
        let url = format!("{}/api/v3/order?{query}", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("X-MEXC-APIKEY", &self.credentials.api_key)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(self.order_error(status, response.text().await?));
        }
        let raw: RestOrderStatus = response.json().await?;
        let avg_price = if raw.executed_qty > Decimal::ZERO {
            Some(raw.cummulative_quote_qty / raw.executed_qty)
        } else {
            None
        };
        Ok(OrderStatus {
            state: Self::map_status(&raw),
            filled_base: raw.executed_qty,
            filled_quote: raw.cummulative_quote_qty,
            avg_price,
        })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn adapter() -> MexcAdapter {
        MexcAdapter::new(
            "https://api.mexc.test".into(),
            Credentials::new("k", "s"),
            dec!(0.000001),
        )
    }

    #[test]
    fn test_native_symbol_drops_separator() {
        assert_eq!(
            adapter().native_symbol(&Symbol::new("BTC", "USDC")),
            "BTCUSDC"
        );
    }

    #[test]
    fn test_status_mapping() {
        let raw = |status: &str| RestOrderStatus {
            status: status.into(),
            orig_qty: dec!(1),
            executed_qty: dec!(0),
            cummulative_quote_qty: dec!(0),
        };
        assert_eq!(MexcAdapter::map_status(&raw("NEW")), LegState::Submitted);
        assert_eq!(
            MexcAdapter::map_status(&raw("PARTIALLY_FILLED")),
            LegState::PartiallyFilled
        );
        assert_eq!(MexcAdapter::map_status(&raw("FILLED")), LegState::Filled);
        assert_eq!(
            MexcAdapter::map_status(&raw("CANCELED")),
            LegState::Cancelled
        );
        assert_eq!(MexcAdapter::map_status(&raw("EXPIRED")), LegState::Rejected);
        assert_eq!(MexcAdapter::map_status(&raw("???")), LegState::Unknown);
    }

    #[test]
    fn test_signed_query_appends_timestamp_and_signature() {
        let q = adapter().signed_query(&[("symbol", "BTCUSDC".to_string())]);
        assert!(q.starts_with("symbol=BTCUSDC&timestamp="));
        assert!(q.contains("&signature="));
    }
}
