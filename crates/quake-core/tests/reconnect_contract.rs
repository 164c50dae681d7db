//! Architectural Contract Test: Fixed-Delay Reconnection
//!
//! This test verifies the connection lifecycle of the QuakeEngine.
//!
//! ## Constraints verified:
//!
//! 1. Every close is followed by exactly one reconnect after the fixed delay
//! 2. A failed connect is retried the same way as a close
//! 3. At most one connection is open at any time
//! 4. Shutdown stops the loop and flushes the geocode store
//!
//! If this test fails, the relay may hammer the feed or stop receiving
//! events after the first disconnect.

mod common;

use common::*;
use quake_core::traits::{FeedMessage, GeocodeStore};
use quake_core::{ConnectionState, EngineConfig, EngineEvent, QuakeEngine};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

fn engine_config() -> EngineConfig {
    EngineConfig {
        reconnect_delay_ms: 1000,
        ..EngineConfig::default()
    }
}

fn drain(rx: &mut mpsc::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test(start_paused = true)]
async fn closes_are_followed_by_one_reconnect_per_delay() {
    let feed = ScriptedFeed::always_closing();
    let stats = feed.stats();
    let router = router_with(&RecordingNotifier::new(), Vec::new());
    let (engine, _events) = QuakeEngine::new(Box::new(feed), router, &engine_config()).unwrap();

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle = tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    // Connects at 0ms, 1000ms, 2000ms and 3000ms
    tokio::time::sleep(Duration::from_millis(3500)).await;
    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();

    assert_eq!(
        stats.connects(),
        4,
        "Expected one connection attempt per reconnect delay"
    );
    assert_eq!(
        stats.max_active(),
        1,
        "At most one connection may be open at a time"
    );
}

#[tokio::test(start_paused = true)]
async fn failed_connects_are_retried() {
    let feed = ScriptedFeed::always_refusing();
    let stats = feed.stats();
    let router = router_with(&RecordingNotifier::new(), Vec::new());
    let (engine, mut events) = QuakeEngine::new(Box::new(feed), router, &engine_config()).unwrap();

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle = tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    tokio::time::sleep(Duration::from_millis(2500)).await;
    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();

    assert_eq!(stats.connects(), 3, "A failed connect must be retried after the delay");

    let events = drain(&mut events);
    let refused = events
        .iter()
        .filter(|e| matches!(e, EngineEvent::Disconnected { code: None, .. }))
        .count();
    assert_eq!(refused, 3, "Every failed connect must be reported as a disconnect");
    assert!(
        !events.contains(&EngineEvent::Connected),
        "A refused connection must never be reported as connected"
    );
}

#[tokio::test(start_paused = true)]
async fn lifecycle_events_follow_connection_order() {
    let feed = ScriptedFeed::new(
        vec![vec![
            FeedMessage::Frame(bare_frame(555)),
            FeedMessage::Closed(quake_core::traits::CloseInfo::new(Some(1000), "bye")),
        ]],
        WhenExhausted::StayOpen,
    );
    let router = router_with(&RecordingNotifier::new(), Vec::new());
    let (engine, mut events) = QuakeEngine::new(Box::new(feed), router, &engine_config()).unwrap();
    let state = engine.subscribe_state();

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle = tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(
        *state.borrow(),
        ConnectionState::Connected,
        "Second connection must be open"
    );

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();
    assert_eq!(*state.borrow(), ConnectionState::Disconnected);

    let events = drain(&mut events);
    assert_eq!(
        events,
        vec![
            EngineEvent::Started {
                endpoint: "scripted://feed".to_string()
            },
            EngineEvent::Connecting { attempt: 1 },
            EngineEvent::Connected,
            EngineEvent::Dispatched { code: 555 },
            EngineEvent::Disconnected {
                code: Some(1000),
                reason: "bye".to_string()
            },
            EngineEvent::ReconnectScheduled {
                delay: Duration::from_millis(1000)
            },
            EngineEvent::Connecting { attempt: 2 },
            EngineEvent::Connected,
            EngineEvent::Stopped {
                reason: "Shutdown signal".to_string()
            },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn shutdown_flushes_geocode_store() {
    let store = FlushCountingStore::new();
    let feed = ScriptedFeed::new(Vec::new(), WhenExhausted::StayOpen);
    let router = router_with(&RecordingNotifier::new(), Vec::new());
    let (engine, _events) = QuakeEngine::new(Box::new(feed), router, &engine_config()).unwrap();
    let engine = engine.with_geocode_store(Arc::new(store.clone()) as Arc<dyn GeocodeStore>);

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle = tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(store.flush_count(), 0, "Store must not be flushed while running");

    shutdown_tx.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("Engine must stop promptly on shutdown")
        .unwrap();

    assert!(result.is_ok());
    assert_eq!(store.flush_count(), 1, "Shutdown must flush the geocode store exactly once");
}
