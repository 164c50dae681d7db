// # Memory Geocode Store
//
// In-memory implementation of GeocodeStore.
//
// ## Crash Behavior
//
// - All entries are lost on restart
// - Every address is looked up again after a restart
//
// ## When to Use
//
// - Testing environments
// - Deployments without a lookup quota to protect

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::entry_key;
use crate::Error;
use crate::config::GeocodeStoreConfig;
use crate::traits::geocode_store::{GeocodeEntry, GeocodeStore, GeocodeStoreFactory};

/// In-memory geocode store
///
/// # Example
///
/// ```rust,no_run
/// use quake_core::store::MemoryGeocodeStore;
/// use quake_core::traits::{GeocodeEntry, GeocodeStore};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryGeocodeStore::new();
///
///     store.add(GeocodeEntry::new("東京都", "千代田区", 35.69, 139.75)).await?;
///     let entry = store.get("東京都", "千代田区").await?;
///     assert!(entry.is_some());
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryGeocodeStore {
    inner: Arc<RwLock<HashMap<String, GeocodeEntry>>>,
}

impl MemoryGeocodeStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with entries
    ///
    /// Later duplicates of a key are ignored, as with [`GeocodeStore::add`].
    pub fn with_entries(entries: impl IntoIterator<Item = GeocodeEntry>) -> Self {
        let mut map = HashMap::new();
        for entry in entries {
            map.entry(entry_key(&entry.prefecture, &entry.address))
                .or_insert(entry);
        }
        Self {
            inner: Arc::new(RwLock::new(map)),
        }
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl GeocodeStore for MemoryGeocodeStore {
    async fn get(&self, prefecture: &str, address: &str) -> Result<Option<GeocodeEntry>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.get(&entry_key(prefecture, address)).cloned())
    }

    async fn add(&self, entry: GeocodeEntry) -> Result<bool, Error> {
        let mut guard = self.inner.write().await;
        let key = entry_key(&entry.prefecture, &entry.address);
        if guard.contains_key(&key) {
            return Ok(false);
        }
        guard.insert(key, entry);
        Ok(true)
    }

    async fn list(&self) -> Result<Vec<GeocodeEntry>, Error> {
        Ok(self.inner.read().await.values().cloned().collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        // Nothing to persist
        Ok(())
    }
}

/// Factory for [`MemoryGeocodeStore`]
pub struct MemoryGeocodeStoreFactory;

impl GeocodeStoreFactory for MemoryGeocodeStoreFactory {
    fn create(&self, _config: &GeocodeStoreConfig) -> Result<Box<dyn GeocodeStore>, Error> {
        Ok(Box::new(MemoryGeocodeStore::new()))
    }
}
