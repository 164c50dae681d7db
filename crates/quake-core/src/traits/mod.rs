//! Collaborator traits for the feed relay
//!
//! This module defines the abstract interfaces the relay consumes.
//!
//! - [`FeedConnector`]: Open an outbound stream of feed frames
//! - [`CoordinateLookup`]: External address → coordinate lookup
//! - [`GeocodeStore`]: Persistent cache of resolved coordinates
//! - [`Notifier`]: Deliver structured notifications to a destination
//! - [`DestinationSource`]: Currently configured delivery targets
//! - [`MapRenderer`]: Image reference for a map around a location

pub mod coordinate_lookup;
pub mod destination_source;
pub mod feed_connector;
pub mod geocode_store;
pub mod map_renderer;
pub mod notifier;

pub use coordinate_lookup::{
    CoordinateLookup, CoordinateLookupFactory, Coordinates, LookupResponse, STATUS_OK,
};
pub use destination_source::{DestinationSource, StaticDestinations};
pub use feed_connector::{CloseInfo, FeedConnector, FeedConnectorFactory, FeedMessage, FeedStream};
pub use geocode_store::{GeocodeEntry, GeocodeStore, GeocodeStoreFactory};
pub use map_renderer::{MapRenderer, MapRendererFactory};
pub use notifier::{Notifier, NotifierFactory};
