// # Geocode Store Trait
//
// Defines the interface for the persistent cache of resolved coordinates.
//
// ## Purpose
//
// Coordinate lookups are slow and billed per request. The store keeps
// every successful lookup, keyed by `(prefecture, address)`, so an
// address is looked up at most once over the lifetime of the cache.
//
// ## Implementations
//
// - In-memory: `MemoryGeocodeStore` (tests, ephemeral deployments)
// - File-based: `FileGeocodeStore` (JSON file with backup and recovery)
//
// ## Usage
//
// ```rust,ignore
// use quake_core::traits::{GeocodeEntry, GeocodeStore};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let store = /* GeocodeStore implementation */;
//
//     if store.get("東京都", "千代田区").await?.is_none() {
//         store.add(GeocodeEntry::new("東京都", "千代田区", 35.69, 139.75)).await?;
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::coordinate_lookup::Coordinates;

/// A cached geocoding result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeEntry {
    /// Prefecture part of the key
    pub prefecture: String,
    /// Address part of the key
    pub address: String,
    /// Latitude, rounded to 2 decimal places
    pub latitude: f64,
    /// Longitude, rounded to 2 decimal places
    pub longitude: f64,
    /// When the entry was first stored
    pub created_at: DateTime<Utc>,
}

impl GeocodeEntry {
    /// Create an entry stamped with the current time
    pub fn new(
        prefecture: impl Into<String>,
        address: impl Into<String>,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            prefecture: prefecture.into(),
            address: address.into(),
            latitude,
            longitude,
            created_at: Utc::now(),
        }
    }

    /// Create an entry from resolved coordinates
    pub fn from_coordinates(
        prefecture: impl Into<String>,
        address: impl Into<String>,
        coordinates: Coordinates,
    ) -> Self {
        Self::new(prefecture, address, coordinates.lat, coordinates.lng)
    }

    /// Stored coordinates
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }

    /// Whether this entry is stored under the given key
    pub fn matches(&self, prefecture: &str, address: &str) -> bool {
        self.prefecture == prefecture && self.address == address
    }
}

/// Trait for geocode store implementations
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Trust Level: Trusted (Core Component)
///
/// ## Allowed Capabilities
/// - ✅ Perform I/O for persistent storage
/// - ✅ Cache entries in memory (with explicit flush)
///
/// ## Forbidden Capabilities
/// - ❌ Perform coordinate lookups (owned by `CoordinateLookup`)
/// - ❌ Deduplicate concurrent lookups (owned by `GeocodeResolver`)
/// - ❌ Spawn background tasks
#[async_trait]
pub trait GeocodeStore: Send + Sync {
    /// Get the entry stored under `(prefecture, address)`
    ///
    /// # Returns
    ///
    /// - `Ok(Some(GeocodeEntry))`: Cache hit
    /// - `Ok(None)`: No entry
    /// - `Err(Error)`: Storage error
    async fn get(
        &self,
        prefecture: &str,
        address: &str,
    ) -> Result<Option<GeocodeEntry>, crate::Error>;

    /// Add an entry
    ///
    /// An existing entry for the same key is kept; the new one is
    /// discarded. Entries are never overwritten.
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: The entry was added
    /// - `Ok(false)`: An entry for this key already existed
    /// - `Err(Error)`: Storage error
    async fn add(&self, entry: GeocodeEntry) -> Result<bool, crate::Error>;

    /// All stored entries, in no particular order
    async fn list(&self) -> Result<Vec<GeocodeEntry>, crate::Error>;

    /// Persist pending changes
    ///
    /// Stores without a durable backend may treat this as a no-op.
    async fn flush(&self) -> Result<(), crate::Error>;
}

/// Helper trait for constructing geocode stores from configuration
pub trait GeocodeStoreFactory: Send + Sync {
    /// Create a GeocodeStore instance from configuration
    fn create(
        &self,
        config: &crate::config::GeocodeStoreConfig,
    ) -> Result<Box<dyn GeocodeStore>, crate::Error>;
}
