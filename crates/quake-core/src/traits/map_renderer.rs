// # Map Renderer Trait
//
// Defines the interface for producing a map image reference.
//
// ## Implementations
//
// - Google Static Maps: `quake-geocode-google` crate
//
// Renderers build a reference (typically a URL) and never fetch the
// image themselves; the notification target does.

use crate::traits::coordinate_lookup::Coordinates;

/// Trait for map renderer implementations
pub trait MapRenderer: Send + Sync {
    /// Image reference for a map centred on `center`
    ///
    /// `markers` are extra locations to pin, in display order. The
    /// renderer may drop markers beyond its own limits.
    fn render(&self, center: Coordinates, markers: &[Coordinates]) -> Option<String>;

    /// Renderer name (for logging)
    fn renderer_name(&self) -> &'static str;
}

/// Helper trait for constructing map renderers from configuration
pub trait MapRendererFactory: Send + Sync {
    /// Create a MapRenderer instance from configuration
    fn create(
        &self,
        config: &crate::config::MapConfig,
    ) -> Result<Box<dyn MapRenderer>, crate::Error>;
}
