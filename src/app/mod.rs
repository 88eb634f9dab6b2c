//! Application wiring: configuration, venue construction, task spawning,
//! and the coordinator loop.

pub mod config;
pub mod coordinator;

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

pub use config::Config;
pub use coordinator::{Coordinator, CoordinatorParams};

use crate::core::exchange::bingx::{BingxAdapter, BingxBookStream};
use crate::core::exchange::mexc::{MexcAdapter, MexcBookStream};
use crate::core::exchange::signing::Credentials;
use crate::core::exchange::ExchangeAdapter;
use crate::core::market::MarketDataService;
use crate::core::service::Journal;
use crate::error::Result;

/// Build every component from config and run until the stop flag flips
/// or a stuck position halts trading.
pub async fn run(config: Config, stop: watch::Receiver<bool>) -> Result<()> {
    let symbol = config.engine.symbol.clone();

    let buy: Arc<dyn ExchangeAdapter> = Arc::new(MexcAdapter::new(
        config.mexc.api_url.clone(),
        Credentials::from_env("MEXC")?,
        config.mexc.base_increment,
    ));
    let sell: Arc<dyn ExchangeAdapter> = Arc::new(BingxAdapter::new(
        config.bingx.api_url.clone(),
        Credentials::from_env("BINGX")?,
        config.bingx.base_increment,
    ));

    let service = MarketDataService::new(symbol.clone(), &[buy.name(), sell.name()]);
    // Feed tasks are detached; the shared stop flag winds them down.
    let _mexc_feed = service.spawn_stream(
        Box::new(MexcBookStream::new(
            config.mexc.ws_endpoints.clone(),
            config.mexc_ping_interval(),
        )),
        config.orders.order_book_depth,
        stop.clone(),
    );
    let _bingx_feed = service.spawn_stream(
        Box::new(BingxBookStream::new(config.bingx.ws_url.clone())),
        config.bingx.depth,
        stop.clone(),
    );
    let _fallback = if config.mexc.rest_fallback {
        Some(service.spawn_rest_fallback(
            Arc::clone(&buy),
            config.mexc_fallback_config(),
            stop.clone(),
        ))
    } else {
        None
    };

    let journal = Journal::open(&config.journal.dir)?;
    info!(
        symbol = %symbol,
        journal = %config.journal.dir,
        "Engine assembled"
    );

    let mut coordinator = Coordinator::new(CoordinatorParams {
        symbol,
        buy,
        sell,
        store: service.store(),
        journal,
        evaluator: config.evaluator_config(),
        leg: config.leg_config(),
        recovery: config.recovery_config(),
        recheck_interval: config.recheck_interval(),
        pre_exec_tolerance: config.pre_exec_tolerance(),
        order_book_depth: config.orders.order_book_depth,
        quote_balance: config.engine.quote_balance,
    });
    coordinator.run(stop).await
}
