// # quake-core
//
// Core library for the seismic feed relay.
//
// ## Architecture Overview
//
// This library keeps a connection to a real-time seismic event feed and
// fans structured notifications out to configured destinations:
// - **FeedConnector**: Trait for opening the feed connection
// - **QuakeEngine**: Reconnecting read loop that classifies frames
// - **EventRouter**: Dispatches envelopes to per-type aggregators
// - **QuakeAggregator / EewAggregator**: Group, sort and deliver
// - **GeocodeResolver**: Single-flight cache over a CoordinateLookup
// - **Notifier**: Trait for delivering notifications
// - **PluginRegistry**: Plugin-based registry for collaborators
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from implementations
// 2. **Event-Driven**: Frames are handled as they arrive, never polled
// 3. **Plugin-Based**: Collaborators are registered dynamically
// 4. **Isolation**: A failing destination or handler never affects others

pub mod aggregate;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod geocode;
pub mod intensity;
pub mod notification;
pub mod notify;
pub mod registry;
pub mod router;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use aggregate::{AbortReason, EewAggregator, EventCache, Outcome, QuakeAggregator};
pub use config::{EngineConfig, FailedLookupPolicy, QuakeConfig};
pub use engine::{ConnectionState, EngineEvent, QuakeEngine};
pub use error::{Error, Result};
pub use event::EventEnvelope;
pub use geocode::GeocodeResolver;
pub use intensity::{IntensityLabel, UnexpectedIntensityError};
pub use notification::{DeliveryReceipt, Destination, Notification};
pub use notify::LogNotifier;
pub use registry::PluginRegistry;
pub use router::EventRouter;
pub use store::{FileGeocodeStore, MemoryGeocodeStore};
pub use traits::{CoordinateLookup, DestinationSource, FeedConnector, GeocodeStore, MapRenderer, Notifier};
