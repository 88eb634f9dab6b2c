//! Market-data service: owns the live books and the tasks that feed them.
//!
//! Per venue one stream task applies snapshots to the [`BookStore`] and
//! fans lightweight update notices to listeners. The buy venue optionally
//! gets a REST fallback poller that steps in when the stream goes quiet.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::store::BookStore;
use crate::core::domain::Symbol;
use crate::core::exchange::{BookEvent, BookStream, ExchangeAdapter};

/// Notice that a venue's book changed. Listeners re-read the store; the
/// notice itself carries no levels.
#[derive(Debug, Clone)]
pub struct BookUpdate {
    pub venue: &'static str,
    pub update_id: u64,
}

/// REST fallback policy for a stalled stream.
#[derive(Debug, Clone)]
pub struct FallbackConfig {
    /// Stream age beyond which the poller starts fetching.
    pub stale_after: Duration,
    /// Discard a REST snapshot whose top of book deviates more than this
    /// from the last streamed one (quote units).
    pub max_deviation: Decimal,
    /// Depth to request.
    pub depth: usize,
}

pub struct MarketDataService {
    store: Arc<BookStore>,
    updates: broadcast::Sender<BookUpdate>,
}

impl MarketDataService {
    pub fn new(symbol: Symbol, venues: &[&'static str]) -> Self {
        let (updates, _) = broadcast::channel(256);
        Self {
            store: Arc::new(BookStore::new(symbol, venues)),
            updates,
        }
    }

    #[must_use]
    pub fn store(&self) -> Arc<BookStore> {
        Arc::clone(&self.store)
    }

    /// Subscribe to update notices. Lagging receivers miss notices, not
    /// book state; the store always holds the newest view.
    #[must_use]
    pub fn subscribe_updates(&self) -> broadcast::Receiver<BookUpdate> {
        self.updates.subscribe()
    }

    /// Run one venue's stream until the stop flag flips.
    ///
    /// The stream reconnects internally; `Disconnected` events are logged
    /// here for visibility and nothing else.
    pub fn spawn_stream(
        &self,
        mut stream: Box<dyn BookStream>,
        depth: usize,
        mut stop: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let updates = self.updates.clone();
        tokio::spawn(async move {
            let venue = stream.venue();
            let symbol = store.symbol().clone();
            if let Err(e) = stream.connect().await {
                warn!(venue, error = %e, "Initial connect failed, stream will retry");
            } else if let Err(e) = stream.subscribe(&symbol, depth).await {
                warn!(venue, error = %e, "Initial subscribe failed, stream will retry");
            }

            loop {
                let event = tokio::select! {
                    event = stream.next_event() => event,
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            info!(venue, "Stream task stopping");
                            return;
                        }
                        continue;
                    }
                };
                match event {
                    Some(BookEvent::Snapshot(snapshot)) => {
                        let update_id = snapshot.update_id;
                        // Discards are already counted and logged by the store.
                        if store.publish_streamed(venue, snapshot).is_ok() {
                            let _ = updates.send(BookUpdate { venue, update_id });
                        }
                    }
                    Some(BookEvent::Disconnected { reason }) => {
                        warn!(venue, reason = %reason, "Book stream dropped, reconnecting");
                    }
                    None => {
                        info!(venue, "Book stream ended");
                        return;
                    }
                }
            }
        })
    }

    /// Run the REST fallback poller for one venue until the stop flag
    /// flips.
    pub fn spawn_rest_fallback(
        &self,
        adapter: Arc<dyn ExchangeAdapter>,
        config: FallbackConfig,
        mut stop: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let updates = self.updates.clone();
        // Poll fast enough to notice staleness promptly without hammering
        // the REST endpoint.
        let poll = (config.stale_after / 2).max(Duration::from_millis(250));
        tokio::spawn(async move {
            let venue = adapter.name();
            let symbol = store.symbol().clone();
            loop {
                tokio::select! {
                    _ = sleep(poll) => {}
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            info!(venue, "Fallback poller stopping");
                            return;
                        }
                        continue;
                    }
                }

                let stale = match store.age(venue) {
                    Some(age) => age > config.stale_after,
                    // Nothing streamed yet; a REST snapshot is better
                    // than an empty view.
                    None => true,
                };
                if !stale {
                    continue;
                }

                debug!(venue, "Stream stale, fetching REST snapshot");
                match adapter.fetch_orderbook(&symbol, config.depth).await {
                    Ok(snapshot) => {
                        let update_id = snapshot.update_id;
                        if store
                            .apply_fallback(venue, snapshot, config.max_deviation)
                            .is_ok()
                        {
                            let _ = updates.send(BookUpdate { venue, update_id });
                        }
                    }
                    Err(e) => {
                        warn!(venue, error = %e, "REST fallback fetch failed");
                    }
                }
            }
        })
    }
}
