//! Feed connection manager
//!
//! The QuakeEngine is responsible for:
//! - Keeping a connection to the feed open, reconnecting forever
//! - Classifying every frame in arrival order
//! - Dispatching envelopes to the [`EventRouter`] without waiting for them
//! - Flushing the geocode store on shutdown
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐
//! │ FeedConnector │─── FeedMessage ───┐
//! └───────────────┘                   │
//!                                     ▼
//!                            ┌──────────────┐
//!                            │ QuakeEngine  │── classify ──┐
//!                            └──────────────┘              │
//!                                     │                    ▼
//!                                     │           ┌──────────────┐
//!                                     │           │ EventRouter  │── spawn ─▶ aggregators
//!                                     │           └──────────────┘
//!                                     ▼
//!                              ┌─────────────┐
//!                              │   Events    │
//!                              │  (notify)   │
//!                              └─────────────┘
//! ```
//!
//! ## Connection states
//!
//! `Disconnected → Connecting → Connected → Disconnected → ...`
//!
//! Any close, transport error or failed connect is followed by exactly
//! one reconnect attempt after a fixed delay. There is no backoff and no
//! retry limit.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::event;
use crate::router::EventRouter;
use crate::traits::{CloseInfo, FeedConnector, FeedMessage, GeocodeStore};

/// Events emitted by the QuakeEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started
    Started {
        /// Feed address
        endpoint: String,
    },

    /// Connection attempt started
    Connecting {
        /// 1-based attempt number
        attempt: u64,
    },

    /// Connection open
    Connected,

    /// Connection closed or could not be opened
    Disconnected {
        /// Close code, when the peer sent one
        code: Option<u16>,
        /// Close reason or error text
        reason: String,
    },

    /// Reconnect scheduled after a close
    ReconnectScheduled {
        /// Delay before the next attempt
        delay: Duration,
    },

    /// A frame could not be classified
    FrameRejected {
        /// Classification error
        error: String,
    },

    /// An envelope was handed to the router
    Dispatched {
        /// Feed code of the envelope
        code: i64,
    },

    /// Engine stopped
    Stopped {
        /// Why the engine stopped
        reason: String,
    },
}

/// State of the feed connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection; a reconnect may be pending
    Disconnected,
    /// Connection attempt in progress
    Connecting,
    /// Connection open, frames are being read
    Connected,
}

/// Feed connection manager
///
/// ## Lifecycle
///
/// 1. Create with [`QuakeEngine::new()`]
/// 2. Start with [`QuakeEngine::run()`]
/// 3. Engine runs until a shutdown signal is received
///
/// ## Load Resistance
///
/// - **Non-blocking dispatch**: the read loop never waits for a handler
/// - **Bounded event channel**: engine events are dropped (logged) when full
pub struct QuakeEngine {
    /// Feed connector
    connector: Box<dyn FeedConnector>,

    /// Router for classified envelopes
    router: Arc<EventRouter>,

    /// Geocode store flushed on shutdown
    store: Option<Arc<dyn GeocodeStore>>,

    /// Fixed delay between a close and the next connection attempt
    reconnect_delay: Duration,

    /// Number of connection attempts so far
    attempts: AtomicU64,

    /// Current connection state
    state: watch::Sender<ConnectionState>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl QuakeEngine {
    /// Create a new engine
    ///
    /// # Parameters
    ///
    /// - `connector`: Feed connector implementation
    /// - `router`: Router receiving classified envelopes
    /// - `config`: Engine configuration
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        connector: Box<dyn FeedConnector>,
        router: Arc<EventRouter>,
        config: &EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        let engine = Self {
            connector,
            router,
            store: None,
            reconnect_delay: Duration::from_millis(config.reconnect_delay_ms),
            attempts: AtomicU64::new(0),
            state,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Flush this geocode store when the engine stops
    pub fn with_geocode_store(mut self, store: Arc<dyn GeocodeStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch connection state changes
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// The router envelopes are dispatched to
    pub fn router(&self) -> &Arc<EventRouter> {
        &self.router
    }

    /// Run the engine
    ///
    /// Connects to the feed and keeps reconnecting until SIGINT.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    /// - `Err(Error)`: The geocode store could not be flushed
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    async fn run_internal(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.emit_event(EngineEvent::Started {
            endpoint: self.connector.endpoint().to_string(),
        });

        let shutdown = async {
            match shutdown_rx {
                // Test mode: wait for provided shutdown signal
                Some(rx) => {
                    let _ = rx.await;
                }
                // Production mode: wait for SIGINT
                None => {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        warn!("Failed to listen for shutdown signal: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
        };

        tokio::select! {
            _ = self.connection_loop() => {}
            _ = shutdown => {
                info!("Shutdown signal received");
            }
        }

        self.state.send_replace(ConnectionState::Disconnected);
        self.emit_event(EngineEvent::Stopped {
            reason: "Shutdown signal".to_string(),
        });

        if let Some(store) = &self.store {
            store.flush().await?;
            info!("Geocode store flushed, engine stopped");
        } else {
            info!("Engine stopped");
        }

        Ok(())
    }

    /// Connect, read until close, wait, repeat
    async fn connection_loop(&self) {
        loop {
            self.connect_and_read().await;

            info!("feed: reconnecting in {:?}", self.reconnect_delay);
            self.emit_event(EngineEvent::ReconnectScheduled {
                delay: self.reconnect_delay,
            });
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    /// One connection: returns once it is closed or failed to open
    async fn connect_and_read(&self) {
        let attempt = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;
        self.state.send_replace(ConnectionState::Connecting);
        self.emit_event(EngineEvent::Connecting { attempt });
        debug!("feed: connecting to {} (attempt {})", self.connector.endpoint(), attempt);

        let mut stream = match self.connector.connect().await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("feed: failed to connect to {}: {}", self.connector.endpoint(), e);
                self.disconnected(CloseInfo::new(None, e.to_string()));
                return;
            }
        };

        self.state.send_replace(ConnectionState::Connected);
        info!("feed: connected to {}", self.connector.endpoint());
        self.emit_event(EngineEvent::Connected);

        let close = loop {
            match stream.next().await {
                Some(FeedMessage::Frame(frame)) => self.handle_frame(&frame),
                Some(FeedMessage::Closed(close)) => break close,
                None => break CloseInfo::ended(),
            }
        };

        self.disconnected(close);
    }

    fn disconnected(&self, close: CloseInfo) {
        self.state.send_replace(ConnectionState::Disconnected);
        info!("feed: disconnected {}", close);
        self.emit_event(EngineEvent::Disconnected {
            code: close.code,
            reason: close.reason,
        });
    }

    /// Classify a frame and hand it to the router without waiting
    fn handle_frame(&self, frame: &str) {
        match event::classify(frame) {
            Ok(envelope) => {
                let code = envelope.code();
                // Handler outcomes are logged by the handlers themselves
                drop(self.router.dispatch(envelope));
                self.emit_event(EngineEvent::Dispatched { code });
            }
            Err(e) => {
                warn!("feed: rejected frame: {}", e);
                self.emit_event(EngineEvent::FrameRejected {
                    error: e.to_string(),
                });
            }
        }
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            // Nobody is listening
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    /// Run the engine until `shutdown_rx` fires
    ///
    /// With `None` this behaves like [`run()`](Self::run). The daemon
    /// passes a receiver wired to SIGTERM and SIGINT; contract tests use
    /// it for controlled shutdown.
    pub async fn run_with_shutdown(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }
}
