// # WebSocket Feed Connector
//
// This crate opens the outbound WebSocket connection to the seismic
// event feed (by default `wss://api.p2pquake.net/v2/ws`).
//
// ## Behaviour
//
// - Text frames are forwarded as-is
// - Binary frames are forwarded when they are valid UTF-8, dropped otherwise
// - Ping/pong frames are answered by the WebSocket layer and not forwarded
// - A close frame, a transport error or the end of the stream yields
//   exactly one `FeedMessage::Closed` and ends the stream
//
// ## Scope
//
// The connector opens one connection per `connect()` call. Reconnection
// and its delay are owned by `QuakeEngine`.

use async_trait::async_trait;
use futures_util::StreamExt;
use quake_core::config::FeedConfig;
use quake_core::traits::{CloseInfo, FeedConnector, FeedConnectorFactory, FeedMessage, FeedStream};
use quake_core::{Error, PluginRegistry, Result};
use std::time::Duration;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

/// Time allowed for the TCP, TLS and WebSocket handshakes
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Outbound WebSocket feed connector
#[derive(Debug, Clone)]
pub struct WebSocketFeed {
    url: String,
    connect_timeout: Duration,
}

impl WebSocketFeed {
    /// Create a connector for `url` (`ws://` or `wss://`)
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Set the handshake timeout
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

#[async_trait]
impl FeedConnector for WebSocketFeed {
    async fn connect(&self) -> Result<FeedStream> {
        let (socket, response) = tokio::time::timeout(self.connect_timeout, connect_async(&self.url))
            .await
            .map_err(|_| {
                Error::feed(format!(
                    "Handshake with {} timed out after {:?}",
                    self.url, self.connect_timeout
                ))
            })?
            .map_err(|e| Error::feed(format!("Failed to connect to {}: {}", self.url, e)))?;

        tracing::debug!("WebSocket handshake complete: HTTP {}", response.status());

        Ok(Box::pin(frames(socket)))
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

/// Adapt a socket into feed messages, ending after the first close
fn frames(socket: Socket) -> impl tokio_stream::Stream<Item = FeedMessage> + Send + 'static {
    futures_util::stream::unfold(Some(socket), |state| async move {
        let mut socket = state?;
        loop {
            let message = match socket.next().await {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    return Some((FeedMessage::Closed(CloseInfo::new(None, e.to_string())), None));
                }
                None => return Some((FeedMessage::Closed(CloseInfo::ended()), None)),
            };

            match message {
                Message::Text(text) => {
                    return Some((FeedMessage::Frame(text.as_str().to_owned()), Some(socket)));
                }
                Message::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => return Some((FeedMessage::Frame(text), Some(socket))),
                    Err(e) => tracing::warn!("Dropping binary frame that is not UTF-8: {}", e),
                },
                Message::Close(frame) => {
                    let close = match frame {
                        Some(frame) => {
                            CloseInfo::new(Some(u16::from(frame.code)), frame.reason.as_str())
                        }
                        None => CloseInfo::new(None, "closed without a close frame"),
                    };
                    return Some((FeedMessage::Closed(close), None));
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    })
}

/// Factory for creating WebSocket feed connectors
pub struct WebSocketFeedFactory;

impl FeedConnectorFactory for WebSocketFeedFactory {
    fn create(&self, config: &FeedConfig) -> Result<Box<dyn FeedConnector>> {
        match config {
            FeedConfig::WebSocket { url } => {
                if !url.starts_with("ws://") && !url.starts_with("wss://") {
                    return Err(Error::config(format!(
                        "Feed URL must use ws:// or wss://, got {}",
                        url
                    )));
                }
                Ok(Box::new(WebSocketFeed::new(url.clone())))
            }
            _ => Err(Error::config("Invalid config for WebSocket feed")),
        }
    }
}

/// Register the WebSocket feed connector with a registry
///
/// # Example
///
/// ```rust
/// use quake_core::PluginRegistry;
///
/// let registry = PluginRegistry::new();
/// quake_feed_ws::register(&registry);
/// assert!(registry.has_feed("websocket"));
/// ```
pub fn register(registry: &PluginRegistry) {
    registry.register_feed("websocket", Box::new(WebSocketFeedFactory));
}
