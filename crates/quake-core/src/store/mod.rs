// # Geocode Store Implementations
//
// This module provides implementations of the GeocodeStore trait for
// different persistence strategies.

pub mod file;
pub mod memory;

pub use file::{FileGeocodeStore, FileGeocodeStoreFactory};
pub use memory::{MemoryGeocodeStore, MemoryGeocodeStoreFactory};

/// Cache key for a `(prefecture, address)` pair
pub(crate) fn entry_key(prefecture: &str, address: &str) -> String {
    format!("{}{}", prefecture, address)
}
