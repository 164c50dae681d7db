//! In-memory cache of the latest quake report per event

use std::collections::HashMap;
use std::sync::RwLock;

use crate::event::JmaQuake;

/// Most recent [`JmaQuake`] per event identifier
///
/// Entries are overwritten on repeat identifiers and never evicted, so
/// the cache grows with the number of distinct events for the lifetime
/// of the process.
#[derive(Debug, Default)]
pub struct EventCache {
    quakes: RwLock<HashMap<String, JmaQuake>>,
}

impl EventCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a quake report, replacing any earlier one with the same id
    pub fn record(&self, quake: &JmaQuake) {
        let mut quakes = self
            .quakes
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        quakes.insert(quake.id.clone(), quake.clone());
    }

    /// Latest report recorded under `id`
    pub fn get(&self, id: &str) -> Option<JmaQuake> {
        let quakes = self
            .quakes
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        quakes.get(id).cloned()
    }

    /// Number of distinct events recorded
    pub fn len(&self) -> usize {
        self.quakes
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Whether nothing has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
