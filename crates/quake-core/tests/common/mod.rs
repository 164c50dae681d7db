//! Test doubles and common utilities for contract tests
//!
//! This module provides minimal test doubles that verify behavioural
//! contracts without touching the network.

#![allow(dead_code)]

use quake_core::aggregate::{EewAggregator, QuakeAggregator};
use quake_core::error::{Error, Result};
use quake_core::notification::{DeliveryReceipt, Destination, Notification};
use quake_core::router::EventRouter;
use quake_core::traits::{
    CloseInfo, CoordinateLookup, Coordinates, DestinationSource, FeedConnector, FeedMessage,
    FeedStream, GeocodeEntry, GeocodeStore, LookupResponse, MapRenderer, Notifier,
    StaticDestinations, STATUS_OK,
};
use quake_core::{GeocodeResolver, MemoryGeocodeStore};
use serde_json::json;
use std::collections::{HashMap, HashSet, VecDeque};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::{Stream, StreamExt};

// ---------------------------------------------------------------------------
// Feed connectors
// ---------------------------------------------------------------------------

/// Connection counters shared between a connector and the test
#[derive(Clone, Default)]
pub struct ConnectionStats {
    connects: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

impl ConnectionStats {
    /// Number of connect() calls
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously open streams
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    fn opened(&self) -> ActiveGuard {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        ActiveGuard {
            active: Arc::clone(&self.active),
        }
    }
}

struct ActiveGuard {
    active: Arc<AtomicUsize>,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A stream that counts as an open connection until dropped
struct TrackedStream {
    inner: FeedStream,
    _guard: ActiveGuard,
}

impl Stream for TrackedStream {
    type Item = FeedMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<FeedMessage>> {
        self.inner.as_mut().poll_next(cx)
    }
}

/// What a [`ScriptedFeed`] does once its scripts are used up
#[derive(Clone, Copy)]
pub enum WhenExhausted {
    /// Every further connection closes immediately with code 1006
    CloseImmediately,
    /// Every further connection stays open without frames
    StayOpen,
    /// Every further connect() fails
    Refuse,
}

/// A feed connector replaying one script per connection
pub struct ScriptedFeed {
    scripts: Mutex<VecDeque<Vec<FeedMessage>>>,
    exhausted: WhenExhausted,
    stats: ConnectionStats,
}

impl ScriptedFeed {
    pub fn new(scripts: Vec<Vec<FeedMessage>>, exhausted: WhenExhausted) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            exhausted,
            stats: ConnectionStats::default(),
        }
    }

    /// A feed whose every connection closes immediately
    pub fn always_closing() -> Self {
        Self::new(Vec::new(), WhenExhausted::CloseImmediately)
    }

    /// A feed whose every connect() fails
    pub fn always_refusing() -> Self {
        Self::new(Vec::new(), WhenExhausted::Refuse)
    }

    pub fn stats(&self) -> ConnectionStats {
        self.stats.clone()
    }
}

#[async_trait::async_trait]
impl FeedConnector for ScriptedFeed {
    async fn connect(&self) -> Result<FeedStream> {
        let script = self.scripts.lock().unwrap().pop_front();
        let messages = match (script, self.exhausted) {
            (Some(script), _) => script,
            (None, WhenExhausted::CloseImmediately) => {
                vec![FeedMessage::Closed(CloseInfo::new(Some(1006), "abnormal closure"))]
            }
            (None, WhenExhausted::StayOpen) => Vec::new(),
            (None, WhenExhausted::Refuse) => {
                self.stats.connects.fetch_add(1, Ordering::SeqCst);
                return Err(Error::feed("connection refused"));
            }
        };

        let guard = self.stats.opened();
        let closes = messages
            .iter()
            .any(|m| matches!(m, FeedMessage::Closed(_)));
        let inner: FeedStream = if closes {
            Box::pin(tokio_stream::iter(messages))
        } else {
            Box::pin(tokio_stream::iter(messages).chain(tokio_stream::pending()))
        };

        Ok(Box::pin(TrackedStream {
            inner,
            _guard: guard,
        }))
    }

    fn endpoint(&self) -> &str {
        "scripted://feed"
    }
}

/// A feed connector whose frames are pushed by the test
pub struct ChannelFeed {
    rx: Mutex<Option<mpsc::UnboundedReceiver<FeedMessage>>>,
    stats: ConnectionStats,
}

impl ChannelFeed {
    pub fn new() -> (Self, mpsc::UnboundedSender<FeedMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let feed = Self {
            rx: Mutex::new(Some(rx)),
            stats: ConnectionStats::default(),
        };
        (feed, tx)
    }

    pub fn stats(&self) -> ConnectionStats {
        self.stats.clone()
    }
}

#[async_trait::async_trait]
impl FeedConnector for ChannelFeed {
    async fn connect(&self) -> Result<FeedStream> {
        // Only the first connection receives pushed frames
        let guard = self.stats.opened();
        let inner: FeedStream = match self.rx.lock().unwrap().take() {
            Some(rx) => Box::pin(tokio_stream::wrappers::UnboundedReceiverStream::new(rx)),
            None => Box::pin(tokio_stream::pending()),
        };
        Ok(Box::pin(TrackedStream {
            inner,
            _guard: guard,
        }))
    }

    fn endpoint(&self) -> &str {
        "channel://feed"
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

/// A notifier that records deliveries and fails on chosen channels
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    delivered: Arc<Mutex<Vec<(String, Notification)>>>,
    attempted: Arc<Mutex<Vec<String>>>,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every delivery to these channels
    pub fn failing_on(channels: &[&str]) -> Self {
        Self {
            failing: channels.iter().map(|c| c.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Delay every delivery to this channel
    pub fn with_delay(mut self, channel: &str, delay: Duration) -> Self {
        self.delays.insert(channel.to_string(), delay);
        self
    }

    /// Successful deliveries, in completion order
    pub fn deliveries(&self) -> Vec<(String, Notification)> {
        self.delivered.lock().unwrap().clone()
    }

    /// Channels of successful deliveries
    pub fn delivered_channels(&self) -> Vec<String> {
        self.deliveries().into_iter().map(|(c, _)| c).collect()
    }

    /// Channels a delivery was attempted to, in attempt order
    pub fn attempted_channels(&self) -> Vec<String> {
        self.attempted.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(
        &self,
        destination: &Destination,
        notification: &Notification,
    ) -> Result<DeliveryReceipt> {
        self.attempted
            .lock()
            .unwrap()
            .push(destination.channel_id.clone());

        if let Some(delay) = self.delays.get(&destination.channel_id) {
            tokio::time::sleep(*delay).await;
        }

        if self.failing.contains(&destination.channel_id) {
            return Err(Error::delivery(format!(
                "channel {} is unreachable",
                destination.channel_id
            )));
        }

        self.delivered
            .lock()
            .unwrap()
            .push((destination.channel_id.clone(), notification.clone()));

        Ok(DeliveryReceipt {
            channel_id: destination.channel_id.clone(),
            message_id: None,
            messages_sent: notification.message_count(),
        })
    }

    fn notifier_name(&self) -> &'static str {
        "recording"
    }
}

// ---------------------------------------------------------------------------
// Coordinate lookup and store
// ---------------------------------------------------------------------------

/// A coordinate lookup that counts calls
pub struct CountingLookup {
    calls: Arc<AtomicUsize>,
    status: &'static str,
    result: Coordinates,
    delay: Duration,
}

impl CountingLookup {
    /// A lookup that succeeds with `result`
    pub fn ok(result: Coordinates) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            status: STATUS_OK,
            result,
            delay: Duration::ZERO,
        }
    }

    /// A lookup that always answers with `status` and no results
    pub fn failing(status: &'static str) -> Self {
        Self {
            status,
            ..Self::ok(Coordinates::new(0.0, 0.0))
        }
    }

    /// Delay every lookup
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Shared call counter
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait::async_trait]
impl CoordinateLookup for CountingLookup {
    async fn lookup(&self, _address: &str, _region: &str) -> Result<LookupResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let results = if self.status == STATUS_OK {
            vec![self.result]
        } else {
            Vec::new()
        };
        Ok(LookupResponse {
            status: self.status.to_string(),
            results,
        })
    }

    fn lookup_name(&self) -> &'static str {
        "counting"
    }
}

/// A coordinate lookup answering from a fixed address table
///
/// Addresses missing from the table answer `ZERO_RESULTS`.
pub struct TableLookup {
    table: HashMap<String, Coordinates>,
    queried: Arc<Mutex<Vec<String>>>,
}

impl TableLookup {
    pub fn new(table: &[(&str, Coordinates)]) -> Self {
        Self {
            table: table
                .iter()
                .map(|(address, coordinates)| (address.to_string(), *coordinates))
                .collect(),
            queried: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Addresses looked up so far, in call order
    pub fn queried(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.queried)
    }
}

#[async_trait::async_trait]
impl CoordinateLookup for TableLookup {
    async fn lookup(&self, address: &str, _region: &str) -> Result<LookupResponse> {
        self.queried.lock().unwrap().push(address.to_string());
        Ok(match self.table.get(address) {
            Some(coordinates) => LookupResponse {
                status: STATUS_OK.to_string(),
                results: vec![*coordinates],
            },
            None => LookupResponse {
                status: "ZERO_RESULTS".to_string(),
                results: Vec::new(),
            },
        })
    }

    fn lookup_name(&self) -> &'static str {
        "table"
    }
}

/// A map renderer producing `center|marker;marker` references
pub struct TextMap;

impl MapRenderer for TextMap {
    fn render(&self, center: Coordinates, markers: &[Coordinates]) -> Option<String> {
        let markers: Vec<String> = markers
            .iter()
            .map(|m| format!("{},{}", m.lat, m.lng))
            .collect();
        Some(format!("{},{}|{}", center.lat, center.lng, markers.join(";")))
    }

    fn renderer_name(&self) -> &'static str {
        "text"
    }
}

/// A memory store that counts flushes
#[derive(Clone, Default)]
pub struct FlushCountingStore {
    inner: MemoryGeocodeStore,
    flushes: Arc<AtomicUsize>,
}

impl FlushCountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl GeocodeStore for FlushCountingStore {
    async fn get(&self, prefecture: &str, address: &str) -> Result<Option<GeocodeEntry>> {
        self.inner.get(prefecture, address).await
    }

    async fn add(&self, entry: GeocodeEntry) -> Result<bool> {
        self.inner.add(entry).await
    }

    async fn list(&self) -> Result<Vec<GeocodeEntry>> {
        self.inner.list().await
    }

    async fn flush(&self) -> Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Wiring and frames
// ---------------------------------------------------------------------------

/// A router delivering through `notifier` to `destinations`
pub fn router_with(notifier: &RecordingNotifier, destinations: Vec<Destination>) -> Arc<EventRouter> {
    let notifier: Arc<dyn Notifier> = Arc::new(notifier.clone());
    let source: Arc<dyn DestinationSource> = Arc::new(StaticDestinations::new(destinations));

    let quake = QuakeAggregator::new(Arc::clone(&notifier), Arc::clone(&source), "ja")
        .expect("ja collation data is available");
    let eew = EewAggregator::new(notifier, source);
    Arc::new(EventRouter::new(quake, eew))
}

/// A router whose quake notifications carry a [`TextMap`] image with
/// up to `max_markers` addresses resolved through `lookup`
pub fn router_with_map(
    notifier: &RecordingNotifier,
    destinations: Vec<Destination>,
    lookup: impl CoordinateLookup + 'static,
    max_markers: usize,
) -> Arc<EventRouter> {
    let notifier: Arc<dyn Notifier> = Arc::new(notifier.clone());
    let source: Arc<dyn DestinationSource> = Arc::new(StaticDestinations::new(destinations));
    let resolver = Arc::new(GeocodeResolver::new(
        Arc::new(lookup),
        Arc::new(MemoryGeocodeStore::new()),
        "jp",
    ));

    let quake = QuakeAggregator::new(Arc::clone(&notifier), Arc::clone(&source), "ja")
        .expect("ja collation data is available")
        .with_map(Arc::new(TextMap))
        .with_resolver(resolver, max_markers);
    let eew = EewAggregator::new(notifier, source);
    Arc::new(EventRouter::new(quake, eew))
}

/// A destination on channel `channel` with threshold `min_intensity`
pub fn destination(channel: &str, min_intensity: i32) -> Destination {
    Destination::new("guild", channel, min_intensity)
}

/// A code 551 frame using the alternate `_id` field
pub fn quake_frame(id: &str, max_scale: i32, latitude: f64, points: &[(&str, &str, i32)]) -> String {
    let points: Vec<_> = points
        .iter()
        .map(|(pref, addr, scale)| json!({ "pref": pref, "addr": addr, "scale": scale, "isArea": false }))
        .collect();

    json!({
        "_id": id,
        "code": 551,
        "time": "2024/01/01 16:10:09.123",
        "issue": { "type": "DetailScale" },
        "earthquake": {
            "time": "2024/01/01 16:10:00",
            "hypocenter": {
                "name": "石川県能登地方",
                "latitude": latitude,
                "longitude": 137.2,
                "depth": 10,
                "magnitude": 7.6
            },
            "maxScale": max_scale,
            "domesticTsunami": "Warning",
            "foreignTsunami": "Unknown"
        },
        "points": points
    })
    .to_string()
}

/// A code 556 frame
pub fn eew_frame(id: &str, test: bool, areas: &[(&str, &str, i32)]) -> String {
    let areas: Vec<_> = areas
        .iter()
        .map(|(pref, name, scale_to)| {
            json!({
                "pref": pref,
                "name": name,
                "scaleFrom": scale_to,
                "scaleTo": scale_to,
                "kindCode": "10",
                "arrivalTime": null
            })
        })
        .collect();

    json!({
        "_id": id,
        "code": 556,
        "time": "2024/01/01 16:10:20.000",
        "test": test,
        "cancelled": false,
        "earthquake": {
            "originTime": "2024/01/01 16:10:00",
            "arrivalTime": "2024/01/01 16:10:05",
            "condition": "",
            "hypocenter": {
                "name": "石川県能登地方",
                "latitude": 37.5,
                "longitude": 137.2,
                "depth": 10,
                "magnitude": 7.4
            }
        },
        "areas": areas
    })
    .to_string()
}

/// A frame of code `code` with a minimal payload
pub fn bare_frame(code: i64) -> String {
    json!({ "_id": format!("bare-{}", code), "code": code, "time": "2024/01/01 16:10:00" }).to_string()
}
