// # Google Maps Plugins
//
// This crate provides two Google Maps collaborators for the relay:
//
// - `GoogleGeocoder`: address → coordinates via the Geocoding API
// - `GoogleStaticMap`: map image URLs via the Static Maps API
//
// ## Scope
//
// The geocoder makes exactly one HTTP request per `lookup()` call and
// reports the API status verbatim. Rounding, caching and single-flight
// coordination are owned by `GeocodeResolver`.
//
// ## Security Requirements
//
// - The API key NEVER appears in logs or Debug output
// - Static map URLs embed the key; they are handed to the notifier only
//
// ## API Reference
//
// - Geocoding: GET `https://maps.googleapis.com/maps/api/geocode/json?address=...&region=...&key=...`
// - Static Maps: `https://maps.googleapis.com/maps/api/staticmap?key=...&size=...&zoom=...&center=...&markers=...&language=...`

use async_trait::async_trait;
use quake_core::config::{GeocoderConfig, MapConfig};
use quake_core::traits::{
    CoordinateLookup, CoordinateLookupFactory, Coordinates, LookupResponse, MapRenderer,
    MapRendererFactory,
};
use quake_core::{Error, PluginRegistry, Result};
use serde::Deserialize;
use std::time::Duration;

/// Geocoding API endpoint
const GEOCODE_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode/json";

/// Static Maps API endpoint
const STATIC_MAP_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/staticmap";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Coordinates,
}

/// Parse a Geocoding API response body
fn parse_response(body: &str) -> Result<LookupResponse> {
    let response: GeocodeResponse = serde_json::from_str(body)
        .map_err(|e| Error::geocode(format!("Failed to parse geocoding response: {}", e)))?;

    Ok(LookupResponse {
        status: response.status,
        results: response
            .results
            .into_iter()
            .map(|result| result.geometry.location)
            .collect(),
    })
}

/// Google Geocoding API client
pub struct GoogleGeocoder {
    /// API key
    /// ⚠️ NEVER log this value
    api_key: String,

    client: reqwest::Client,
}

// Custom Debug implementation that hides the API key
impl std::fmt::Debug for GoogleGeocoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleGeocoder")
            .field("api_key", &"<REDACTED>")
            .finish()
    }
}

impl GoogleGeocoder {
    /// Create a geocoder
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an empty key and an HTTP error
    /// if the client cannot be built.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(Error::config("Google Maps API key cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { api_key, client })
    }
}

#[async_trait]
impl CoordinateLookup for GoogleGeocoder {
    async fn lookup(&self, address: &str, region: &str) -> Result<LookupResponse> {
        tracing::debug!("Geocoding {} (region {})", address, region);

        let response = self
            .client
            .get(GEOCODE_ENDPOINT)
            .query(&[("region", region), ("address", address), ("key", self.api_key.as_str())])
            .send()
            .await
            // reqwest errors carry the URL, which carries the key
            .map_err(|e| Error::http(format!("Geocoding request failed: {}", e.without_url())))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read geocoding response: {}", e.without_url())))?;

        if !status.is_success() {
            return Err(Error::geocode(format!(
                "Geocoding API returned HTTP {}",
                status
            )));
        }

        parse_response(&body)
    }

    fn lookup_name(&self) -> &'static str {
        "google"
    }
}

/// Factory for creating Google geocoders
pub struct GoogleGeocoderFactory;

impl CoordinateLookupFactory for GoogleGeocoderFactory {
    fn create(&self, config: &GeocoderConfig) -> Result<Box<dyn CoordinateLookup>> {
        match config {
            GeocoderConfig::Google { api_key, .. } => Ok(Box::new(GoogleGeocoder::new(api_key.clone())?)),
            _ => Err(Error::config("Invalid config for Google geocoder")),
        }
    }
}

/// Google Static Maps URL builder
pub struct GoogleStaticMap {
    api_key: String,
    size: String,
    zoom: u8,
    language: String,
}

impl std::fmt::Debug for GoogleStaticMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleStaticMap")
            .field("api_key", &"<REDACTED>")
            .field("size", &self.size)
            .field("zoom", &self.zoom)
            .field("language", &self.language)
            .finish()
    }
}

impl GoogleStaticMap {
    /// Create a renderer
    pub fn new(
        api_key: impl Into<String>,
        size: impl Into<String>,
        zoom: u8,
        language: impl Into<String>,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(Error::config("Google Maps API key cannot be empty"));
        }

        Ok(Self {
            api_key,
            size: size.into(),
            zoom,
            language: language.into(),
        })
    }
}

fn point(coordinates: &Coordinates) -> String {
    format!("{},{}", coordinates.lat, coordinates.lng)
}

impl MapRenderer for GoogleStaticMap {
    fn render(&self, center: Coordinates, markers: &[Coordinates]) -> Option<String> {
        let mut params = vec![
            ("key", self.api_key.clone()),
            ("size", self.size.clone()),
            ("zoom", self.zoom.to_string()),
            ("center", point(&center)),
            ("markers", format!("color:red|{}", point(&center))),
        ];
        if !markers.is_empty() {
            let points: Vec<String> = markers.iter().map(point).collect();
            params.push(("markers", format!("size:small|color:orange|{}", points.join("|"))));
        }
        params.push(("language", self.language.clone()));

        match reqwest::Url::parse_with_params(STATIC_MAP_ENDPOINT, &params) {
            Ok(url) => Some(url.to_string()),
            Err(e) => {
                tracing::warn!("Failed to build static map URL: {}", e);
                None
            }
        }
    }

    fn renderer_name(&self) -> &'static str {
        "google_static"
    }
}

/// Factory for creating Google static map renderers
pub struct GoogleStaticMapFactory;

impl MapRendererFactory for GoogleStaticMapFactory {
    fn create(&self, config: &MapConfig) -> Result<Box<dyn MapRenderer>> {
        match config {
            MapConfig::GoogleStatic {
                api_key,
                size,
                zoom,
                language,
            } => Ok(Box::new(GoogleStaticMap::new(
                api_key.clone(),
                size.clone(),
                *zoom,
                language.clone(),
            )?)),
            _ => Err(Error::config("Invalid config for Google static map")),
        }
    }
}

/// Register the Google geocoder and static map renderer with a registry
///
/// # Example
///
/// ```rust
/// use quake_core::PluginRegistry;
///
/// let registry = PluginRegistry::new();
/// quake_geocode_google::register(&registry);
/// assert!(registry.has_lookup("google"));
/// assert!(registry.has_map("google_static"));
/// ```
pub fn register(registry: &PluginRegistry) {
    registry.register_lookup("google", Box::new(GoogleGeocoderFactory));
    registry.register_map("google_static", Box::new(GoogleStaticMapFactory));
}
