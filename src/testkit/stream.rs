//! Scripted [`BookStream`] mock.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::domain::Symbol;
use crate::core::exchange::{BookEvent, BookStream};
use crate::error::Result;

/// A mock stream with scripted connect/subscribe results and a fixed
/// event queue. Each `next_event` pops the next entry; an exhausted
/// queue ends the stream (`None`).
pub struct ScriptedBookStream {
    venue: &'static str,
    connect_results: Mutex<VecDeque<Result<()>>>,
    subscribe_results: Mutex<VecDeque<Result<()>>>,
    events: Mutex<VecDeque<BookEvent>>,
    connect_count: Arc<AtomicU32>,
    subscribe_count: Arc<AtomicU32>,
}

impl ScriptedBookStream {
    pub fn new(venue: &'static str) -> Self {
        Self {
            venue,
            connect_results: Mutex::new(VecDeque::new()),
            subscribe_results: Mutex::new(VecDeque::new()),
            events: Mutex::new(VecDeque::new()),
            connect_count: Arc::new(AtomicU32::new(0)),
            subscribe_count: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn with_connect_result(self, result: Result<()>) -> Self {
        self.connect_results.lock().push_back(result);
        self
    }

    pub fn with_subscribe_result(self, result: Result<()>) -> Self {
        self.subscribe_results.lock().push_back(result);
        self
    }

    pub fn with_event(self, event: BookEvent) -> Self {
        self.events.lock().push_back(event);
        self
    }

    pub fn connect_count(&self) -> u32 {
        self.connect_count.load(Ordering::SeqCst)
    }

    pub fn subscribe_count(&self) -> u32 {
        self.subscribe_count.load(Ordering::SeqCst)
    }

    /// Shared counters for asserting after the stream moved into a task.
    pub fn counters(&self) -> (Arc<AtomicU32>, Arc<AtomicU32>) {
        (self.connect_count.clone(), self.subscribe_count.clone())
    }
}

#[async_trait]
impl BookStream for ScriptedBookStream {
    async fn connect(&mut self) -> Result<()> {
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        self.connect_results.lock().pop_front().unwrap_or(Ok(()))
    }

    async fn subscribe(&mut self, _symbol: &Symbol, _depth: usize) -> Result<()> {
        self.subscribe_count.fetch_add(1, Ordering::SeqCst);
        self.subscribe_results.lock().pop_front().unwrap_or(Ok(()))
    }

    async fn next_event(&mut self) -> Option<BookEvent> {
        self.events.lock().pop_front()
    }

    fn venue(&self) -> &'static str {
        self.venue
    }
}
