//! Venue capability contracts.
//!
//! Two traits split the exchange boundary the way the engine consumes it:
//! [`BookStream`] for the streaming order-book feed and
//! [`ExchangeAdapter`] for request/response operations (REST depth,
//! order placement, cancel, status). The coordinator only ever sees these
//! traits; it must not special-case venues.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::core::domain::{BookSnapshot, LegState, OrderId, Symbol};
use crate::error::Result;

/// Direction of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

/// Venue-reported status of an order.
#[derive(Debug, Clone)]
pub struct OrderStatus {
    pub state: LegState,
    pub filled_base: Decimal,
    /// Cumulative quote exchanged across all fills so far.
    pub filled_quote: Decimal,
    /// Average fill price, absent when nothing has filled.
    pub avg_price: Option<Decimal>,
}

/// Request/response operations a venue must provide.
///
/// Implementations are thread-safe (`Send + Sync`); the coordinator holds
/// them behind `Arc<dyn ExchangeAdapter>`.
///
/// # Errors
///
/// Transport failures surface as transport-kind [`Error`](crate::error::Error)
/// variants and are retried by callers; venue rejections, invalid
/// parameters, and unknown orders are terminal for the operation.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// Venue name for logging and records.
    fn name(&self) -> &'static str;

    /// The venue's native spelling of a canonical symbol.
    fn native_symbol(&self, symbol: &Symbol) -> String;

    /// Smallest base-size step the venue accepts; plan sizes are rounded
    /// down to a multiple of this.
    fn base_increment(&self) -> Decimal;

    /// One-shot depth snapshot over REST. Fallback path when the stream
    /// stalls, and the freshness source for the pre-execution gate.
    async fn fetch_orderbook(&self, symbol: &Symbol, depth: usize) -> Result<BookSnapshot>;

    /// Place a limit order; resolves to the venue-assigned order id.
    async fn place_limit(
        &self,
        symbol: &Symbol,
        side: OrderSide,
        base_amount: Decimal,
        limit_price: Decimal,
    ) -> Result<OrderId>;

    /// Place a market order; resolves to the venue-assigned order id.
    async fn place_market(
        &self,
        symbol: &Symbol,
        side: OrderSide,
        base_amount: Decimal,
    ) -> Result<OrderId>;

    /// Cancel an order. `AlreadyTerminal` and `OrderNotFound` are
    /// distinct failures so callers can treat a lost race as settled.
    async fn cancel(&self, symbol: &Symbol, order_id: &OrderId) -> Result<()>;

    /// Query current order state and realized fills.
    async fn query(&self, symbol: &Symbol, order_id: &OrderId) -> Result<OrderStatus>;
}

/// Event from a venue's streaming book feed.
#[derive(Debug, Clone)]
pub enum BookEvent {
    /// A full decoded snapshot.
    Snapshot(BookSnapshot),
    /// The transport dropped; the stream will reconnect before the next
    /// snapshot.
    Disconnected { reason: String },
}

/// Streaming order-book feed for one venue.
///
/// An infinite, restartable source: `next_event` reconnects internally on
/// failure and only returns `None` when the stream is shut down for good.
#[async_trait]
pub trait BookStream: Send {
    /// Establish the transport connection.
    async fn connect(&mut self) -> Result<()>;

    /// Subscribe to depth updates for `symbol`.
    async fn subscribe(&mut self, symbol: &Symbol, depth: usize) -> Result<()>;

    /// Next decoded event. Decode failures are logged and skipped, never
    /// surfaced.
    async fn next_event(&mut self) -> Option<BookEvent>;

    /// Venue name for logging.
    fn venue(&self) -> &'static str;
}
