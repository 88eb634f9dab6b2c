//! Market-data service behavior over scripted streams and adapters.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;
use skimmer::core::domain::Symbol;
use skimmer::core::exchange::{BookEvent, ExchangeAdapter};
use skimmer::core::market::{FallbackConfig, MarketDataService};
use skimmer::testkit::{snapshot, MockAdapter, ScriptedBookStream};
use tokio::sync::watch;

#[tokio::test]
async fn test_stream_snapshots_reach_the_store_in_order() {
    let service = MarketDataService::new(Symbol::new("BTC", "USDC"), &["mexc"]);
    let stream = ScriptedBookStream::new("mexc")
        .with_event(BookEvent::Snapshot(snapshot(
            &[(dec!(39990), dec!(1))],
            &[(dec!(40000), dec!(1))],
            1,
        )))
        .with_event(BookEvent::Snapshot(snapshot(
            &[(dec!(39991), dec!(1))],
            &[(dec!(40001), dec!(1))],
            2,
        )));
    let (connects, subscribes) = stream.counters();

    let mut updates = service.subscribe_updates();
    let (_stop_tx, stop_rx) = watch::channel(false);
    let handle = service.spawn_stream(Box::new(stream), 20, stop_rx);
    handle.await.unwrap();

    let store = service.store();
    let book = store.get("mexc").unwrap();
    assert_eq!(book.update_id, 2);
    assert_eq!(book.best_bid().unwrap().price, dec!(39991));
    assert_eq!(connects.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(subscribes.load(std::sync::atomic::Ordering::SeqCst), 1);

    // Notices arrive in stream order.
    assert_eq!(updates.recv().await.unwrap().update_id, 1);
    assert_eq!(updates.recv().await.unwrap().update_id, 2);
}

#[tokio::test]
async fn test_crossed_snapshot_discarded_stream_continues() {
    let service = MarketDataService::new(Symbol::new("BTC", "USDC"), &["mexc"]);
    let stream = ScriptedBookStream::new("mexc")
        .with_event(BookEvent::Snapshot(snapshot(
            &[(dec!(39990), dec!(1))],
            &[(dec!(40000), dec!(1))],
            1,
        )))
        // Crossed: best bid above best ask.
        .with_event(BookEvent::Snapshot(snapshot(
            &[(dec!(40010), dec!(1))],
            &[(dec!(40000), dec!(1))],
            2,
        )))
        .with_event(BookEvent::Snapshot(snapshot(
            &[(dec!(39992), dec!(1))],
            &[(dec!(40002), dec!(1))],
            3,
        )));

    let (_stop_tx, stop_rx) = watch::channel(false);
    service
        .spawn_stream(Box::new(stream), 20, stop_rx)
        .await
        .unwrap();

    let store = service.store();
    assert_eq!(store.get("mexc").unwrap().update_id, 3);
    assert_eq!(store.discarded("mexc"), 1);
}

#[tokio::test]
async fn test_disconnect_event_does_not_clear_the_view() {
    let service = MarketDataService::new(Symbol::new("BTC", "USDC"), &["mexc"]);
    let stream = ScriptedBookStream::new("mexc")
        .with_event(BookEvent::Snapshot(snapshot(
            &[(dec!(39990), dec!(1))],
            &[(dec!(40000), dec!(1))],
            1,
        )))
        .with_event(BookEvent::Disconnected {
            reason: "reset by peer".into(),
        })
        .with_event(BookEvent::Snapshot(snapshot(
            &[(dec!(39995), dec!(1))],
            &[(dec!(40005), dec!(1))],
            2,
        )));

    let (_stop_tx, stop_rx) = watch::channel(false);
    service
        .spawn_stream(Box::new(stream), 20, stop_rx)
        .await
        .unwrap();

    assert_eq!(service.store().get("mexc").unwrap().update_id, 2);
}

#[tokio::test(start_paused = true)]
async fn test_rest_fallback_fills_an_empty_view() {
    let service = MarketDataService::new(Symbol::new("BTC", "USDC"), &["mexc"]);
    let adapter: Arc<dyn ExchangeAdapter> = Arc::new(MockAdapter::new("mexc").with_fetch(Ok(
        snapshot(&[(dec!(39990), dec!(1))], &[(dec!(40000), dec!(1))], 7),
    )));

    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = service.spawn_rest_fallback(
        adapter,
        FallbackConfig {
            stale_after: Duration::from_millis(2000),
            max_deviation: dec!(50),
            depth: 20,
        },
        stop_rx,
    );

    let store = service.store();
    // Nothing has streamed, so the first poll treats the view as stale.
    let mut waited = 0;
    while store.get("mexc").is_none() && waited < 100 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        waited += 1;
    }
    assert_eq!(store.get("mexc").unwrap().update_id, 7);

    stop_tx.send(true).unwrap();
    handle.await.unwrap();
}
