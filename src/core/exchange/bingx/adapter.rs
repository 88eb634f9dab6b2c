//! BingX REST adapter: depth snapshots and the order lifecycle.

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::messages::{RestDepth, RestEnvelope, RestOrder, RestOrderDetail, VENUE};
use crate::core::domain::{BookSnapshot, LegState, OrderId, Symbol};
use crate::core::exchange::signing::{timestamp_ms, Credentials};
use crate::core::exchange::{ExchangeAdapter, OrderSide, OrderStatus};
use crate::error::{Error, Result};

/// BingX spot REST client.
pub struct BingxAdapter {
    client: Client,
    base_url: String,
    credentials: Credentials,
    base_increment: Decimal,
}

impl BingxAdapter {
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

    async fn signed_post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}?{}", self.base_url, path, self.signed_query(params));
        let envelope: RestEnvelope<T> = self
            .client
            .post(&url)
            .header("X-BX-APIKEY", &self.credentials.api_key)
            .send()
            .await?
            .json()
            .await?;
        envelope.into_data()
    }

    async fn signed_get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}?{}", self.base_url, path, self.signed_query(params));
        let envelope: RestEnvelope<T> = self
            .client
            .get(&url)
            .header("X-BX-APIKEY", &self.credentials.api_key)
            .send()
            .await?
            .json()
            .await?;
        envelope.into_data()
    }

    fn map_status(raw: &str) -> LegState {
        match raw {
            "NEW" | "PENDING" => LegState::Submitted,
            "PARTIALLY_FILLED" => LegState::PartiallyFilled,
            "FILLED" => LegState::Filled,
            "CANCELED" | "CANCELLED" => LegState::Cancelled,
            "FAILED" | "REJECTED" => LegState::Rejected,
            other => {
                warn!(venue = VENUE, status = other, "Unrecognized order status");
                LegState::Unknown
            }
        }
    }
}

#[async_trait]
impl ExchangeAdapter for BingxAdapter {
    fn name(&self) -> &'static str {
        VENUE
    }

    fn native_symbol(&self, symbol: &Symbol) -> String {
        // BingX already speaks the canonical hyphenated form.
        symbol.to_string()
    }

    fn base_increment(&self) -> Decimal {
        self.base_increment
    }

    async fn fetch_orderbook(&self, symbol: &Symbol, depth: usize) -> Result<BookSnapshot> {
        let url = format!(
            "{}/openApi/spot/v1/market/depth?symbol={}&limit={}",
            self.base_url,
            self.native_symbol(symbol),
            depth
        );
        debug!(venue = VENUE, url = %url, "Fetching depth snapshot");
        let envelope: RestEnvelope<RestDepth> =
            self.client.get(&url).send().await?.json().await?;
        let snapshot = envelope.into_data()?.into_snapshot(symbol)?;
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
        let order: RestOrder = self
            .signed_post(
                "/openApi/spot/v1/trade/order",
                &[
                    ("symbol", self.native_symbol(symbol)),
                    ("side", side.as_str().to_string()),
                    ("type", "LIMIT".to_string()),
                    ("quantity", base_amount.to_string()),
                    ("price", limit_price.to_string()),
                ],
            )
            .await?;
        Ok(OrderId::new(order.order_id.to_string()))
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
        let order: RestOrder = self
            .signed_post(
                "/openApi/spot/v1/trade/order",
                &[
                    ("symbol", self.native_symbol(symbol)),
                    ("side", side.as_str().to_string()),
                    ("type", "MARKET".to_string()),
                    ("quantity", base_amount.to_string()),
                ],
            )
            .await?;
        Ok(OrderId::new(order.order_id.to_string()))
    }

    async fn cancel(&self, symbol: &Symbol, order_id: &OrderId) -> Result<()> {
        let result: Result<RestOrder> = self
            .signed_post(
                "/openApi/spot/v1/trade/cancel",
                &[
                    ("symbol", self.native_symbol(symbol)),
                    ("orderId", order_id.as_str().to_string()),
                ],
            )
            .await;
        match result {
            Ok(_) => Ok(()),
            // The venue reports an already-settled order as unknown.
            Err(Error::OrderNotFound) => Err(Error::AlreadyTerminal),
            Err(e) => Err(e),
        }
    }

    async fn query(&self, symbol: &Symbol, order_id: &OrderId) -> Result<OrderStatus> {
        let detail: RestOrderDetail = self
            .signed_get(
                "/openApi/spot/v1/trade/query",
                &[
                    ("symbol", self.native_symbol(symbol)),
                    ("orderId", order_id.as_str().to_string()),
                ],
            )
            .await?;
        let avg_price = if detail.executed_qty > Decimal::ZERO {
            Some(detail.cummulative_quote_qty / detail.executed_qty)
        } else {
            None
        };
        Ok(OrderStatus {
            state: Self::map_status(&detail.status),
            filled_base: detail.executed_qty,
            filled_quote: detail.cummulative_quote_qty,
            avg_price,
        })
    }
}
