// # Feed Connector Trait
//
// Defines the interface for opening the outbound stream of feed frames.
//
// ## Implementations
//
// - WebSocket: `quake-feed-ws` crate
// - Tests: scripted connectors in `tests/common`
//
// ## Usage
//
// ```rust,ignore
// use quake_core::traits::{FeedConnector, FeedMessage};
// use tokio_stream::StreamExt;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let connector = /* FeedConnector implementation */;
//
//     let mut stream = connector.connect().await?;
//     while let Some(message) = stream.next().await {
//         match message {
//             FeedMessage::Frame(text) => println!("frame: {}", text),
//             FeedMessage::Closed(info) => break,
//         }
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::fmt;
use std::pin::Pin;
use tokio_stream::Stream;

/// Why a feed connection ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    /// Close code, when the peer sent one
    pub code: Option<u16>,
    /// Close reason or transport error text
    pub reason: String,
}

impl CloseInfo {
    /// Create close information
    pub fn new(code: Option<u16>, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Close information for a stream that ended without a close frame
    pub fn ended() -> Self {
        Self::new(None, "stream ended")
    }
}

impl fmt::Display for CloseInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "[{}] {}", code, self.reason),
            None => write!(f, "[-] {}", self.reason),
        }
    }
}

/// An item read from an open feed connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedMessage {
    /// A raw frame, as received
    Frame(String),
    /// The connection closed; no further items follow
    Closed(CloseInfo),
}

/// Stream of items from one feed connection
pub type FeedStream = Pin<Box<dyn Stream<Item = FeedMessage> + Send + 'static>>;

/// Trait for feed connector implementations
///
/// A connector opens ONE connection per [`connect()`](FeedConnector::connect)
/// call. It never reconnects on its own: reconnection policy (fixed
/// delay, unlimited attempts) is owned by [`QuakeEngine`](crate::QuakeEngine).
///
/// ## Stream contract
///
/// - Yields [`FeedMessage::Frame`] in arrival order
/// - Yields at most one [`FeedMessage::Closed`], as its last item
/// - Transport errors are reported as `Closed` with the error text as reason
/// - Dropping the stream closes the connection
#[async_trait]
pub trait FeedConnector: Send + Sync {
    /// Open a connection to the feed
    ///
    /// # Returns
    ///
    /// - `Ok(FeedStream)`: The connection is open
    /// - `Err(Error)`: The connection could not be established
    async fn connect(&self) -> Result<FeedStream, crate::Error>;

    /// Address of the feed, for logging
    fn endpoint(&self) -> &str;
}

/// Helper trait for constructing feed connectors from configuration
pub trait FeedConnectorFactory: Send + Sync {
    /// Create a FeedConnector instance from configuration
    fn create(
        &self,
        config: &crate::config::FeedConfig,
    ) -> Result<Box<dyn FeedConnector>, crate::Error>;
}
