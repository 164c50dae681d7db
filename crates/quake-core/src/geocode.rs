//! Single-flight geocode resolver
//!
//! [`GeocodeResolver`] turns `(prefecture, address)` into coordinates:
//!
//! 1. The persistent [`GeocodeStore`] is consulted first
//! 2. On a miss, the first caller for a key becomes the leader and
//!    performs the external lookup; concurrent callers for the same key
//!    wait on the leader's result instead of issuing their own lookup
//! 3. Successful results are rounded to 2 decimal places and stored
//!
//! A failed lookup is handled per [`FailedLookupPolicy`]: `Pin` keeps the
//! key blocked for the lifetime of the resolver, `Reset` lets the next
//! caller try again.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, trace, warn};

use crate::config::{EngineConfig, FailedLookupPolicy};
use crate::store::entry_key;
use crate::traits::{CoordinateLookup, Coordinates, GeocodeEntry, GeocodeStore};

/// Result published by a leader: `None` while the lookup runs
type Published = Option<Option<Coordinates>>;

enum Slot {
    /// A leader is looking the key up
    InFlight(watch::Receiver<Published>),
    /// Looked up successfully during this process lifetime
    Resolved(Coordinates),
    /// Lookup failed and the key is pinned
    Stuck,
}

enum Role {
    Lead(watch::Sender<Published>),
    Wait(watch::Receiver<Published>),
}

/// Process-wide, concurrency-safe geocoding cache
pub struct GeocodeResolver {
    lookup: Arc<dyn CoordinateLookup>,
    store: Arc<dyn GeocodeStore>,
    region: String,
    policy: FailedLookupPolicy,
    wait_timeout: Duration,
    slots: Mutex<HashMap<String, Slot>>,
}

impl GeocodeResolver {
    /// Create a resolver
    ///
    /// # Parameters
    ///
    /// - `lookup`: External coordinate service
    /// - `store`: Persistent cache
    /// - `region`: Region hint passed with every lookup
    pub fn new(
        lookup: Arc<dyn CoordinateLookup>,
        store: Arc<dyn GeocodeStore>,
        region: impl Into<String>,
    ) -> Self {
        let defaults = EngineConfig::default();
        Self {
            lookup,
            store,
            region: region.into(),
            policy: defaults.failed_lookup_policy,
            wait_timeout: Duration::from_millis(defaults.geocode_wait_timeout_ms),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Set the failed lookup policy
    pub fn with_policy(mut self, policy: FailedLookupPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set how long a waiter waits for the leader's result
    pub fn with_wait_timeout(mut self, wait_timeout: Duration) -> Self {
        self.wait_timeout = wait_timeout;
        self
    }

    /// Apply the resolver settings of an engine configuration
    pub fn with_engine_config(self, config: &EngineConfig) -> Self {
        self.with_policy(config.failed_lookup_policy)
            .with_wait_timeout(Duration::from_millis(config.geocode_wait_timeout_ms))
    }

    /// The persistent cache backing this resolver
    pub fn store(&self) -> &Arc<dyn GeocodeStore> {
        &self.store
    }

    /// Resolve an address to coordinates
    ///
    /// Returns `None` when the address cannot be resolved. Callers treat
    /// `None` as "omit enrichment", never as fatal.
    pub async fn resolve(&self, prefecture: &str, address: &str) -> Option<Coordinates> {
        match self.store.get(prefecture, address).await {
            Ok(Some(entry)) => {
                trace!("geocode: cache hit for {}{}", prefecture, address);
                return Some(entry.coordinates());
            }
            Ok(None) => {}
            Err(e) => warn!("geocode: store read failed for {}{}: {}", prefecture, address, e),
        }

        let key = entry_key(prefecture, address);
        let role = {
            let mut slots = self.lock_slots();
            match slots.get(&key) {
                Some(Slot::Resolved(coordinates)) => return Some(*coordinates),
                Some(Slot::Stuck) => {
                    debug!("geocode: {} is pinned after a failed lookup", key);
                    return None;
                }
                Some(Slot::InFlight(rx)) => Role::Wait(rx.clone()),
                None => {
                    let (tx, rx) = watch::channel(None);
                    slots.insert(key.clone(), Slot::InFlight(rx));
                    Role::Lead(tx)
                }
            }
        };

        match role {
            Role::Wait(rx) => self.wait(rx, &key).await,
            Role::Lead(tx) => self.lead(tx, key, prefecture, address).await,
        }
    }

    async fn wait(&self, mut rx: watch::Receiver<Published>, key: &str) -> Option<Coordinates> {
        match tokio::time::timeout(self.wait_timeout, rx.wait_for(Option::is_some)).await {
            Ok(Ok(published)) => (*published).flatten(),
            Ok(Err(_)) => {
                debug!("geocode: leader for {} went away", key);
                None
            }
            Err(_) => {
                warn!(
                    "geocode: gave up waiting for {} after {:?}",
                    key, self.wait_timeout
                );
                None
            }
        }
    }

    async fn lead(
        &self,
        tx: watch::Sender<Published>,
        key: String,
        prefecture: &str,
        address: &str,
    ) -> Option<Coordinates> {
        let flight = Flight {
            slots: &self.slots,
            key,
            tx,
            settled: false,
        };

        let resolved = self.fetch(address).await;
        match resolved {
            Some(coordinates) => {
                let entry = GeocodeEntry::from_coordinates(prefecture, address, coordinates);
                if let Err(e) = self.store.add(entry).await {
                    warn!("geocode: failed to store {}{}: {}", prefecture, address, e);
                }
                flight.settle(Some(Slot::Resolved(coordinates)), Some(coordinates));
            }
            None => match self.policy {
                FailedLookupPolicy::Pin => flight.settle(Some(Slot::Stuck), None),
                FailedLookupPolicy::Reset => flight.settle(None, None),
            },
        }
        resolved
    }

    async fn fetch(&self, address: &str) -> Option<Coordinates> {
        match self.lookup.lookup(address, &self.region).await {
            Ok(response) => {
                let found = response.best_match().map(Coordinates::rounded);
                if found.is_none() {
                    warn!(
                        "geocode: {} lookup failed for {} (region {}): status {}, {} results",
                        self.lookup.lookup_name(),
                        address,
                        self.region,
                        response.status,
                        response.results.len()
                    );
                }
                found
            }
            Err(e) => {
                warn!(
                    "geocode: {} lookup failed for {} (region {}): {}",
                    self.lookup.lookup_name(),
                    address,
                    self.region,
                    e
                );
                None
            }
        }
    }

    fn lock_slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        lock(&self.slots)
    }
}

fn lock(slots: &Mutex<HashMap<String, Slot>>) -> MutexGuard<'_, HashMap<String, Slot>> {
    // No code path panics while holding the lock; recover the map if one ever does
    slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// An in-flight lookup owned by its leader
///
/// Dropping an unsettled flight (the leader's future was cancelled)
/// releases the key and wakes waiters with no result.
struct Flight<'a> {
    slots: &'a Mutex<HashMap<String, Slot>>,
    key: String,
    tx: watch::Sender<Published>,
    settled: bool,
}

impl Flight<'_> {
    fn settle(mut self, slot: Option<Slot>, result: Option<Coordinates>) {
        self.finish(slot, result);
    }

    fn finish(&mut self, slot: Option<Slot>, result: Option<Coordinates>) {
        {
            let mut slots = lock(self.slots);
            match slot {
                Some(slot) => {
                    slots.insert(self.key.clone(), slot);
                }
                None => {
                    slots.remove(&self.key);
                }
            }
        }
        self.tx.send_replace(Some(result));
        self.settled = true;
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.finish(None, None);
        }
    }
}
