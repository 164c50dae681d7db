//! Error types for the feed relay
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

use crate::intensity::UnexpectedIntensityError;

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the feed relay
#[derive(Error, Debug)]
pub enum Error {
    /// Feed connection errors
    #[error("Feed error: {0}")]
    Feed(String),

    /// A frame could not be classified into an envelope
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Coordinate lookup errors
    #[error("Geocode error: {0}")]
    Geocode(String),

    /// Geocode store errors
    #[error("Geocode store error: {0}")]
    Store(String),

    /// Notification delivery errors
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// Destination listing errors
    #[error("Destination error: {0}")]
    Destination(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Strict-mode intensity classification failure
    #[error(transparent)]
    UnexpectedIntensity(#[from] UnexpectedIntensityError),

    /// Notifier-specific error
    #[error("Notifier error ({notifier}): {message}")]
    Notifier {
        /// Notifier name
        notifier: String,
        /// Error message
        message: String,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a feed error
    pub fn feed(msg: impl Into<String>) -> Self {
        Self::Feed(msg.into())
    }

    /// Create a malformed frame error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedFrame(msg.into())
    }

    /// Create a geocode error
    pub fn geocode(msg: impl Into<String>) -> Self {
        Self::Geocode(msg.into())
    }

    /// Create a geocode store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a delivery error
    pub fn delivery(msg: impl Into<String>) -> Self {
        Self::Delivery(msg.into())
    }

    /// Create a destination error
    pub fn destination(msg: impl Into<String>) -> Self {
        Self::Destination(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create a notifier-specific error
    pub fn notifier(notifier: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Notifier {
            notifier: notifier.into(),
            message: message.into(),
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
