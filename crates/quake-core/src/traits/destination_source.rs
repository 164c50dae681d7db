// # Destination Source Trait
//
// Defines where the aggregators read the current delivery targets from.
// Targets are read per event, so a source may change between events.

use async_trait::async_trait;
use std::sync::RwLock;

use crate::notification::Destination;

/// Trait for destination source implementations
#[async_trait]
pub trait DestinationSource: Send + Sync {
    /// Snapshot of the configured destinations
    async fn destinations(&self) -> Result<Vec<Destination>, crate::Error>;
}

/// Destinations held in memory
///
/// Built from configuration at startup; [`replace`](Self::replace)
/// swaps the whole set atomically.
#[derive(Debug, Default)]
pub struct StaticDestinations {
    destinations: RwLock<Vec<Destination>>,
}

impl StaticDestinations {
    /// Create a source with a fixed set of destinations
    pub fn new(destinations: Vec<Destination>) -> Self {
        Self {
            destinations: RwLock::new(destinations),
        }
    }

    /// Replace the configured destinations
    pub fn replace(&self, destinations: Vec<Destination>) -> Result<(), crate::Error> {
        let mut guard = self
            .destinations
            .write()
            .map_err(|e| crate::Error::destination(format!("Lock poisoned: {}", e)))?;
        *guard = destinations;
        Ok(())
    }
}

#[async_trait]
impl DestinationSource for StaticDestinations {
    async fn destinations(&self) -> Result<Vec<Destination>, crate::Error> {
        let guard = self
            .destinations
            .read()
            .map_err(|e| crate::Error::destination(format!("Lock poisoned: {}", e)))?;
        Ok(guard.clone())
    }
}
