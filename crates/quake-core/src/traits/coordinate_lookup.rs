// # Coordinate Lookup Trait
//
// Defines the interface for the external address → coordinate service.
//
// ## Implementations
//
// - Google Geocoding API: `quake-geocode-google` crate
//
// Lookups are expensive and rate limited. Callers go through
// `GeocodeResolver`, which caches results and guarantees at most one
// in-flight lookup per address.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Status reported by a successful lookup
pub const STATUS_OK: &str = "OK";

/// A latitude/longitude pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude
    pub lat: f64,
    /// Longitude
    pub lng: f64,
}

impl Coordinates {
    /// Create coordinates
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Round both components to 2 decimal places
    ///
    /// Cached coordinates are stored at this precision so that nearby
    /// addresses share cache rows.
    pub fn rounded(self) -> Self {
        Self {
            lat: round2(self.lat),
            lng: round2(self.lng),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Raw answer of the lookup service
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LookupResponse {
    /// Service status (`OK`, `ZERO_RESULTS`, `OVER_QUERY_LIMIT`, ...)
    pub status: String,
    /// Candidate locations, best first
    pub results: Vec<Coordinates>,
}

impl LookupResponse {
    /// First result, if the status is `OK` and there is at least one
    pub fn best_match(&self) -> Option<Coordinates> {
        if self.status == STATUS_OK {
            self.results.first().copied()
        } else {
            None
        }
    }
}

/// Trait for coordinate lookup implementations
///
/// # Contract
///
/// - One request per call, no retries and no caching
/// - Non-OK statuses are returned as `Ok(LookupResponse)`, not as errors
/// - `Err` is reserved for transport and decoding failures
#[async_trait]
pub trait CoordinateLookup: Send + Sync {
    /// Look up an address
    ///
    /// # Parameters
    ///
    /// - `address`: Free-form address
    /// - `region`: Region hint (ccTLD, e.g. `jp`)
    async fn lookup(&self, address: &str, region: &str) -> Result<LookupResponse, crate::Error>;

    /// Lookup service name (for logging)
    fn lookup_name(&self) -> &'static str;
}

/// Helper trait for constructing coordinate lookups from configuration
pub trait CoordinateLookupFactory: Send + Sync {
    /// Create a CoordinateLookup instance from configuration
    fn create(
        &self,
        config: &crate::config::GeocoderConfig,
    ) -> Result<Box<dyn CoordinateLookup>, crate::Error>;
}
