//! Scripted [`ExchangeAdapter`] mock.
//!
//! Each operation pops from its own result queue; the queue's last entry
//! is sticky so a terminal state keeps answering repeated polls. Query
//! results switch to the `final_query` queue once `cancel` has been
//! attempted, which lets tests script "what the venue says after the
//! cancel raced a fill".

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::core::domain::{BookSnapshot, OrderId, Symbol};
use crate::core::exchange::{ExchangeAdapter, OrderSide, OrderStatus};
use crate::error::{Error, Result};

/// Clonable stand-in for the error an operation should produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFailure {
    Transport,
    NotFound,
    AlreadyTerminal,
    Rejected(String),
}

impl MockFailure {
    fn into_error(self, venue: &'static str) -> Error {
        match self {
            MockFailure::Transport => Error::Transport("mock transport failure".into()),
            MockFailure::NotFound => Error::OrderNotFound,
            MockFailure::AlreadyTerminal => Error::AlreadyTerminal,
            MockFailure::Rejected(reason) => Error::Rejected { venue, reason },
        }
    }
}

type Script<T> = Mutex<VecDeque<std::result::Result<T, MockFailure>>>;

/// A limit or market placement the mock received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedOrder {
    pub side: OrderSide,
    pub base_amount: Decimal,
    /// `None` for market orders.
    pub price: Option<Decimal>,
}

pub struct MockAdapter {
    name: &'static str,
    base_increment: Decimal,
    fetch_results: Script<BookSnapshot>,
    place_limit_results: Script<OrderId>,
    place_market_results: Script<OrderId>,
    cancel_results: Script<()>,
    query_results: Script<OrderStatus>,
    final_query_results: Script<OrderStatus>,
    cancel_attempted: AtomicBool,
    query_count: AtomicU32,
    cancel_count: AtomicU32,
    fetch_count: AtomicU32,
    limits: Mutex<Vec<PlacedOrder>>,
    markets: Mutex<Vec<PlacedOrder>>,
}

impl MockAdapter {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            base_increment: dec!(0.000001),
            fetch_results: Mutex::new(VecDeque::new()),
            place_limit_results: Mutex::new(VecDeque::new()),
            place_market_results: Mutex::new(VecDeque::new()),
            cancel_results: Mutex::new(VecDeque::new()),
            query_results: Mutex::new(VecDeque::new()),
            final_query_results: Mutex::new(VecDeque::new()),
            cancel_attempted: AtomicBool::new(false),
            query_count: AtomicU32::new(0),
            cancel_count: AtomicU32::new(0),
            fetch_count: AtomicU32::new(0),
            limits: Mutex::new(Vec::new()),
            markets: Mutex::new(Vec::new()),
        }
    }

    /// The symbol all tests trade.
    pub fn symbol(&self) -> Symbol {
        Symbol::new("BTC", "USDC")
    }

    pub fn with_fetch(self, result: std::result::Result<BookSnapshot, MockFailure>) -> Self {
        self.fetch_results.lock().push_back(result);
        self
    }

    pub fn with_place_limit(self, result: std::result::Result<OrderId, MockFailure>) -> Self {
        self.place_limit_results.lock().push_back(result);
        self
    }

    pub fn with_place_market(self, result: std::result::Result<OrderId, MockFailure>) -> Self {
        self.place_market_results.lock().push_back(result);
        self
    }

    pub fn with_cancel(self, result: std::result::Result<(), MockFailure>) -> Self {
        self.cancel_results.lock().push_back(result);
        self
    }

    pub fn with_query(self, result: std::result::Result<OrderStatus, MockFailure>) -> Self {
        self.query_results.lock().push_back(result);
        self
    }

    /// Query result served once a cancel has been attempted.
    pub fn with_final_query(self, result: std::result::Result<OrderStatus, MockFailure>) -> Self {
        self.final_query_results.lock().push_back(result);
        self
    }

    pub fn query_calls(&self) -> u32 {
        self.query_count.load(Ordering::SeqCst)
    }

    pub fn cancel_calls(&self) -> u32 {
        self.cancel_count.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> u32 {
        self.fetch_count.load(Ordering::SeqCst)
    }

    pub fn placed_limits(&self) -> Vec<PlacedOrder> {
        self.limits.lock().clone()
    }

    pub fn placed_markets(&self) -> Vec<PlacedOrder> {
        self.markets.lock().clone()
    }

    fn take<T: Clone>(&self, script: &Script<T>) -> Option<std::result::Result<T, MockFailure>> {
        let mut queue = script.lock();
        match queue.len() {
            0 => None,
            1 => queue.front().cloned(),
            _ => queue.pop_front(),
        }
    }

    fn resolve<T: Clone>(&self, script: &Script<T>) -> Result<T> {
        match self.take(script) {
            Some(Ok(value)) => Ok(value),
            Some(Err(failure)) => Err(failure.into_error(self.name)),
            None => Err(Error::Transport("mock script exhausted".into())),
        }
    }
}

#[async_trait]
impl ExchangeAdapter for MockAdapter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn native_symbol(&self, symbol: &Symbol) -> String {
        symbol.to_string()
    }

    fn base_increment(&self) -> Decimal {
        self.base_increment
    }

    async fn fetch_orderbook(&self, _symbol: &Symbol, _depth: usize) -> Result<BookSnapshot> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        self.resolve(&self.fetch_results)
    }

    async fn place_limit(
        &self,
        _symbol: &Symbol,
        side: OrderSide,
        base_amount: Decimal,
        limit_price: Decimal,
    ) -> Result<OrderId> {
        self.limits.lock().push(PlacedOrder {
            side,
            base_amount,
            price: Some(limit_price),
        });
        self.resolve(&self.place_limit_results)
    }

    async fn place_market(
        &self,
        _symbol: &Symbol,
        side: OrderSide,
        base_amount: Decimal,
    ) -> Result<OrderId> {
        self.markets.lock().push(PlacedOrder {
            side,
            base_amount,
            price: None,
        });
        self.resolve(&self.place_market_results)
    }

    async fn cancel(&self, _symbol: &Symbol, _order_id: &OrderId) -> Result<()> {
        self.cancel_count.fetch_add(1, Ordering::SeqCst);
        self.cancel_attempted.store(true, Ordering::SeqCst);
        match self.take(&self.cancel_results) {
            Some(Ok(())) => Ok(()),
            Some(Err(failure)) => Err(failure.into_error(self.name)),
            None => Ok(()),
        }
    }

    async fn query(&self, _symbol: &Symbol, _order_id: &OrderId) -> Result<OrderStatus> {
        self.query_count.fetch_add(1, Ordering::SeqCst);
        if self.cancel_attempted.load(Ordering::SeqCst)
            && !self.final_query_results.lock().is_empty()
        {
            return self.resolve(&self.final_query_results);
        }
        self.resolve(&self.query_results)
    }
}
