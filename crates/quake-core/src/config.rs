//! Configuration types for the feed relay
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};

use crate::notification::Destination;

/// Default feed endpoint
pub const DEFAULT_FEED_URL: &str = "wss://api.p2pquake.net/v2/ws";

/// Main relay configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuakeConfig {
    /// Feed configuration
    #[serde(default)]
    pub feed: FeedConfig,

    /// Coordinate lookup configuration
    #[serde(default)]
    pub geocoder: GeocoderConfig,

    /// Map image configuration
    #[serde(default)]
    pub map: MapConfig,

    /// Geocode store configuration
    #[serde(default)]
    pub store: GeocodeStoreConfig,

    /// Notifier configuration
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Delivery targets
    #[serde(default)]
    pub destinations: Vec<Destination>,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl QuakeConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.feed.validate()?;
        self.geocoder.validate()?;
        self.map.validate()?;
        self.store.validate()?;
        self.notifier.validate()?;
        self.engine.validate()?;

        for destination in &self.destinations {
            if destination.channel_id.is_empty() {
                return Err(crate::Error::config(format!(
                    "Destination in guild {} has an empty channel id",
                    destination.guild_id
                )));
            }
        }

        if self.destinations.is_empty() {
            tracing::warn!("No destinations configured; events will be processed but not delivered");
        }

        Ok(())
    }
}

fn validate_custom(kind: &str, factory: &str, config: &serde_json::Value) -> Result<(), crate::Error> {
    if factory.is_empty() {
        return Err(crate::Error::config(format!(
            "Custom {} factory cannot be empty",
            kind
        )));
    }
    if config.is_null() {
        return Err(crate::Error::config(format!(
            "Custom {} config cannot be null",
            kind
        )));
    }
    Ok(())
}

/// Feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedConfig {
    /// Outbound WebSocket connection
    #[serde(rename = "websocket")]
    WebSocket {
        /// Feed URL
        #[serde(default = "default_feed_url")]
        url: String,
    },

    /// Custom feed connector
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl FeedConfig {
    /// Validate the feed configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            FeedConfig::WebSocket { url } => {
                if url.is_empty() {
                    return Err(crate::Error::config("Feed URL cannot be empty"));
                }
                Ok(())
            }
            FeedConfig::Custom { factory, config } => validate_custom("feed", factory, config),
        }
    }

    /// Get the feed type name
    pub fn type_name(&self) -> &str {
        match self {
            FeedConfig::WebSocket { .. } => "websocket",
            FeedConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        FeedConfig::WebSocket {
            url: default_feed_url(),
        }
    }
}

fn default_feed_url() -> String {
    DEFAULT_FEED_URL.to_string()
}

/// Coordinate lookup configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GeocoderConfig {
    /// No coordinate lookups; addresses are never geocoded
    #[default]
    Disabled,

    /// Google Geocoding API
    Google {
        /// API key
        api_key: String,
        /// Region hint passed with every lookup
        #[serde(default = "default_region")]
        region: String,
    },

    /// Custom coordinate lookup
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl GeocoderConfig {
    /// Validate the geocoder configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            GeocoderConfig::Disabled => Ok(()),
            GeocoderConfig::Google { api_key, region } => {
                if api_key.is_empty() {
                    return Err(crate::Error::config("Google geocoder API key cannot be empty"));
                }
                if region.is_empty() {
                    return Err(crate::Error::config("Geocode region cannot be empty"));
                }
                Ok(())
            }
            GeocoderConfig::Custom { factory, config } => {
                validate_custom("geocoder", factory, config)
            }
        }
    }

    /// Get the geocoder type name, `None` when disabled
    pub fn type_name(&self) -> Option<&str> {
        match self {
            GeocoderConfig::Disabled => None,
            GeocoderConfig::Google { .. } => Some("google"),
            GeocoderConfig::Custom { factory, .. } => Some(factory),
        }
    }

    /// Region hint for lookups
    pub fn region(&self) -> &str {
        match self {
            GeocoderConfig::Google { region, .. } => region,
            _ => DEFAULT_REGION,
        }
    }
}

const DEFAULT_REGION: &str = "jp";

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

/// Map image configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MapConfig {
    /// Notifications carry no map image
    #[default]
    Disabled,

    /// Google Static Maps image URLs
    GoogleStatic {
        /// API key
        api_key: String,
        /// Image size, `WIDTHxHEIGHT`
        #[serde(default = "default_map_size")]
        size: String,
        /// Zoom level
        #[serde(default = "default_map_zoom")]
        zoom: u8,
        /// Label language
        #[serde(default = "default_map_language")]
        language: String,
    },

    /// Custom map renderer
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl MapConfig {
    /// Validate the map configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            MapConfig::Disabled => Ok(()),
            MapConfig::GoogleStatic { api_key, size, .. } => {
                if api_key.is_empty() {
                    return Err(crate::Error::config("Static map API key cannot be empty"));
                }
                let valid_size = size
                    .split_once('x')
                    .is_some_and(|(w, h)| w.parse::<u32>().is_ok() && h.parse::<u32>().is_ok());
                if !valid_size {
                    return Err(crate::Error::config(format!(
                        "Static map size must be WIDTHxHEIGHT, got {:?}",
                        size
                    )));
                }
                Ok(())
            }
            MapConfig::Custom { factory, config } => validate_custom("map", factory, config),
        }
    }

    /// Get the map renderer type name, `None` when disabled
    pub fn type_name(&self) -> Option<&str> {
        match self {
            MapConfig::Disabled => None,
            MapConfig::GoogleStatic { .. } => Some("google_static"),
            MapConfig::Custom { factory, .. } => Some(factory),
        }
    }
}

fn default_map_size() -> String {
    "640x480".to_string()
}

fn default_map_zoom() -> u8 {
    8
}

fn default_map_language() -> String {
    "ja".to_string()
}

/// Geocode store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GeocodeStoreConfig {
    /// File-based store
    File {
        /// Path to the cache file
        path: String,
    },

    /// In-memory store (not persistent)
    #[default]
    Memory,

    /// Custom store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl GeocodeStoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            GeocodeStoreConfig::File { path } => {
                if path.is_empty() {
                    return Err(crate::Error::config("Geocode store path cannot be empty"));
                }
                Ok(())
            }
            GeocodeStoreConfig::Memory => Ok(()),
            GeocodeStoreConfig::Custom { factory, config } => {
                validate_custom("geocode store", factory, config)
            }
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &str {
        match self {
            GeocodeStoreConfig::File { .. } => "file",
            GeocodeStoreConfig::Memory => "memory",
            GeocodeStoreConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Notifier configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotifierConfig {
    /// Write notifications to the log
    #[default]
    Log,

    /// POST notifications to a webhook
    Webhook {
        /// URL template; `{channel_id}` is replaced per destination
        url_template: String,
        /// Optional bearer token
        #[serde(default)]
        bearer_token: Option<String>,
    },

    /// Custom notifier
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl NotifierConfig {
    /// Validate the notifier configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            NotifierConfig::Log => Ok(()),
            NotifierConfig::Webhook { url_template, .. } => {
                if url_template.is_empty() {
                    return Err(crate::Error::config("Webhook URL cannot be empty"));
                }
                Ok(())
            }
            NotifierConfig::Custom { factory, config } => {
                validate_custom("notifier", factory, config)
            }
        }
    }

    /// Get the notifier type name
    pub fn type_name(&self) -> &str {
        match self {
            NotifierConfig::Log => "log",
            NotifierConfig::Webhook { .. } => "webhook",
            NotifierConfig::Custom { factory, .. } => factory,
        }
    }
}

/// What happens to an address whose coordinate lookup failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailedLookupPolicy {
    /// The address stays blocked for the process lifetime; later callers
    /// get no coordinates and no new lookup is made
    #[default]
    Pin,
    /// The address is released; the next caller retries the lookup
    Reset,
}

impl std::str::FromStr for FailedLookupPolicy {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pin" => Ok(FailedLookupPolicy::Pin),
            "reset" => Ok(FailedLookupPolicy::Reset),
            other => Err(crate::Error::config(format!(
                "Unknown failed lookup policy: {} (expected pin or reset)",
                other
            ))),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Fixed delay before reconnecting after the feed closes (in milliseconds)
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Capacity of the engine event channel
    ///
    /// When full, new engine events are dropped (with a warning log).
    ///
    /// Default: 1000 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// How long a caller waits for another caller's in-flight lookup of
    /// the same address (in milliseconds)
    #[serde(default = "default_geocode_wait_timeout_ms")]
    pub geocode_wait_timeout_ms: u64,

    /// Handling of addresses whose lookup failed
    #[serde(default)]
    pub failed_lookup_policy: FailedLookupPolicy,

    /// Locale used to order prefectures
    #[serde(default = "default_collation_locale")]
    pub collation_locale: String,

    /// Maximum number of geocoded markers on a quake map
    #[serde(default = "default_max_map_markers")]
    pub max_map_markers: usize,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        if self
            .collation_locale
            .parse::<icu_locale_core::Locale>()
            .is_err()
        {
            return Err(crate::Error::config(format!(
                "Invalid collation locale: {}",
                self.collation_locale
            )));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: default_reconnect_delay_ms(),
            event_channel_capacity: default_event_channel_capacity(),
            geocode_wait_timeout_ms: default_geocode_wait_timeout_ms(),
            failed_lookup_policy: FailedLookupPolicy::default(),
            collation_locale: default_collation_locale(),
            max_map_markers: default_max_map_markers(),
        }
    }
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

fn default_event_channel_capacity() -> usize {
    1000
}

fn default_geocode_wait_timeout_ms() -> u64 {
    10_000
}

fn default_collation_locale() -> String {
    "ja".to_string()
}

fn default_max_map_markers() -> usize {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = QuakeConfig::new();
        assert_eq!(config.feed.type_name(), "websocket");
        assert_eq!(config.geocoder.type_name(), None);
        assert_eq!(config.store.type_name(), "memory");
        assert_eq!(config.notifier.type_name(), "log");
        assert_eq!(config.engine.reconnect_delay_ms, 1000);
        assert_eq!(config.engine.failed_lookup_policy, FailedLookupPolicy::Pin);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_tagged_sections() {
        let json = serde_json::json!({
            "feed": { "type": "websocket" },
            "geocoder": { "type": "google", "api_key": "key" },
            "store": { "type": "file", "path": "/tmp/geocode.json" },
            "notifier": { "type": "webhook", "url_template": "https://hooks.example/{channel_id}" },
            "destinations": [
                { "guild_id": "1", "channel_id": "2", "min_intensity": 30 }
            ],
            "engine": { "failed_lookup_policy": "reset" }
        });

        let config: QuakeConfig = serde_json::from_value(json).unwrap();
        assert!(matches!(&config.feed, FeedConfig::WebSocket { url } if url == DEFAULT_FEED_URL));
        assert_eq!(config.geocoder.region(), "jp");
        assert_eq!(config.destinations[0].min_intensity, 30);
        assert_eq!(config.engine.failed_lookup_policy, FailedLookupPolicy::Reset);
        assert_eq!(config.engine.max_map_markers, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = QuakeConfig::new();
        config.geocoder = GeocoderConfig::Google {
            api_key: String::new(),
            region: "jp".to_string(),
        };
        assert!(config.validate().is_err());

        let mut config = QuakeConfig::new();
        config.map = MapConfig::GoogleStatic {
            api_key: "key".to_string(),
            size: "large".to_string(),
            zoom: 8,
            language: "ja".to_string(),
        };
        assert!(config.validate().is_err());

        let mut config = QuakeConfig::new();
        config.destinations.push(Destination::new("guild", "", 0));
        assert!(config.validate().is_err());

        let mut config = QuakeConfig::new();
        config.engine.event_channel_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = QuakeConfig::new();
        config.engine.collation_locale = "not a locale!".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_failed_lookup_policy_from_str() {
        assert_eq!("pin".parse::<FailedLookupPolicy>().unwrap(), FailedLookupPolicy::Pin);
        assert_eq!("RESET".parse::<FailedLookupPolicy>().unwrap(), FailedLookupPolicy::Reset);
        assert!("retry".parse::<FailedLookupPolicy>().is_err());
    }
}
