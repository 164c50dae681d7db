// # File Geocode Store
//
// File-based implementation of GeocodeStore with crash recovery.
//
// ## Purpose
//
// Keeps resolved coordinates across restarts so an address is looked
// up at most once over the lifetime of the cache file.
//
// ## Crash Recovery
//
// - Atomic writes: write to `.tmp`, then rename over the cache file
// - Backup: the previous cache file is copied to `.backup` before each write
// - Recovery: a cache file that fails to parse is restored from `.backup`
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "entries": [
//     {
//       "prefecture": "東京都",
//       "address": "千代田区",
//       "latitude": 35.69,
//       "longitude": 139.75,
//       "created_at": "2025-01-09T12:00:00Z"
//     }
//   ]
// }
// ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use super::entry_key;
use crate::Error;
use crate::config::GeocodeStoreConfig;
use crate::traits::geocode_store::{GeocodeEntry, GeocodeStore, GeocodeStoreFactory};

/// Cache file format version
const CACHE_FILE_VERSION: &str = "1.0";

/// File-based geocode store with crash recovery
///
/// Every successful [`add`](GeocodeStore::add) is written through to
/// disk before it returns.
///
/// # Example
///
/// ```rust,no_run
/// use quake_core::store::FileGeocodeStore;
/// use quake_core::traits::{GeocodeEntry, GeocodeStore};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileGeocodeStore::new("/var/lib/quake/geocode.json").await?;
///
///     store.add(GeocodeEntry::new("東京都", "千代田区", 35.69, 139.75)).await?;
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileGeocodeStore {
    path: PathBuf,
    state: Arc<RwLock<FileState>>,
}

#[derive(Debug)]
struct FileState {
    entries: HashMap<String, GeocodeEntry>,
    dirty: bool,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct CacheFileFormat {
    version: String,
    entries: Vec<GeocodeEntry>,
}

impl FileGeocodeStore {
    /// Create or load a file geocode store
    ///
    /// This will:
    /// 1. Create parent directories if needed
    /// 2. Load the existing cache file
    /// 3. Fall back to the backup if the cache file is corrupted
    /// 4. Start empty if both are unusable
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        tokio::task::spawn_blocking(move || Self::open(path))
            .await
            .map_err(|e| Error::store(format!("Geocode cache load task failed: {}", e)))?
    }

    /// Blocking variant of [`new`](Self::new), for startup code
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::config(format!(
                    "Failed to create cache directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let entries = Self::load_with_recovery(&path)?;

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(FileState {
                entries,
                dirty: false,
            })),
        })
    }

    /// Load entries, recovering from the backup on corruption
    fn load_with_recovery(path: &Path) -> Result<HashMap<String, GeocodeEntry>, Error> {
        match Self::load(path) {
            Ok(entries) => {
                tracing::debug!("Loaded geocode cache: {} entries", entries.len());
                Ok(entries)
            }
            Err(Error::Json(e)) => {
                tracing::warn!(
                    "Geocode cache {} appears corrupted: {}. Attempting recovery from backup.",
                    path.display(),
                    e
                );

                let backup_path = Self::backup_path(path);
                if !backup_path.exists() {
                    tracing::warn!("No backup file found. Starting with empty geocode cache.");
                    return Ok(HashMap::new());
                }

                match Self::load(&backup_path) {
                    Ok(entries) => {
                        tracing::info!(
                            "Recovered geocode cache from backup: {} entries",
                            entries.len()
                        );
                        if let Err(restore_err) = std::fs::copy(&backup_path, path) {
                            tracing::error!(
                                "Failed to restore geocode cache from backup: {}",
                                restore_err
                            );
                        }
                        Ok(entries)
                    }
                    Err(backup_err) => {
                        tracing::error!(
                            "Backup also corrupted: {}. Starting with empty geocode cache.",
                            backup_err
                        );
                        Ok(HashMap::new())
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    fn load(path: &Path) -> Result<HashMap<String, GeocodeEntry>, Error> {
        if !path.exists() {
            tracing::debug!("Geocode cache does not exist yet: {}", path.display());
            return Ok(HashMap::new());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::store(format!(
                "Failed to read geocode cache {}: {}",
                path.display(),
                e
            ))
        })?;

        let file: CacheFileFormat = serde_json::from_str(&content)?;

        if file.version != CACHE_FILE_VERSION {
            tracing::warn!(
                "Geocode cache version mismatch: expected {}, got {}. Attempting to load anyway.",
                CACHE_FILE_VERSION,
                file.version
            );
        }

        let mut entries = HashMap::with_capacity(file.entries.len());
        for entry in file.entries {
            entries
                .entry(entry_key(&entry.prefecture, &entry.address))
                .or_insert(entry);
        }
        Ok(entries)
    }

    /// Write the cache atomically
    async fn write(&self) -> Result<(), Error> {
        let mut guard = self.state.write().await;

        let mut entries: Vec<GeocodeEntry> = guard.entries.values().cloned().collect();
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        let file = CacheFileFormat {
            version: CACHE_FILE_VERSION.to_string(),
            entries,
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| Error::store(format!("Failed to serialize geocode cache: {}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut temp = fs::File::create(&temp_path).await.map_err(|e| {
                Error::store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            temp.write_all(json.as_bytes()).await.map_err(|e| {
                Error::store(format!(
                    "Failed to write temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            temp.flush().await.map_err(|e| {
                Error::store(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists()
            && let Err(e) = fs::copy(&self.path, Self::backup_path(&self.path)).await
        {
            tracing::warn!("Failed to create geocode cache backup: {}", e);
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        guard.dirty = false;
        tracing::trace!("Geocode cache written: {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl GeocodeStore for FileGeocodeStore {
    async fn get(&self, prefecture: &str, address: &str) -> Result<Option<GeocodeEntry>, Error> {
        let guard = self.state.read().await;
        Ok(guard.entries.get(&entry_key(prefecture, address)).cloned())
    }

    async fn add(&self, entry: GeocodeEntry) -> Result<bool, Error> {
        {
            let mut guard = self.state.write().await;
            let key = entry_key(&entry.prefecture, &entry.address);
            if guard.entries.contains_key(&key) {
                return Ok(false);
            }
            guard.entries.insert(key, entry);
            guard.dirty = true;
        }

        self.write().await?;
        Ok(true)
    }

    async fn list(&self) -> Result<Vec<GeocodeEntry>, Error> {
        let guard = self.state.read().await;
        Ok(guard.entries.values().cloned().collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        let dirty = self.state.read().await.dirty;
        if dirty { self.write().await } else { Ok(()) }
    }
}

/// Factory for [`FileGeocodeStore`]
pub struct FileGeocodeStoreFactory;

impl GeocodeStoreFactory for FileGeocodeStoreFactory {
    fn create(&self, config: &GeocodeStoreConfig) -> Result<Box<dyn GeocodeStore>, Error> {
        let GeocodeStoreConfig::File { path } = config else {
            return Err(Error::config("File geocode store requires a File configuration"));
        };

        Ok(Box::new(FileGeocodeStore::open(path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_store_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("geocode.json");

        let store = FileGeocodeStore::new(&path).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());

        store
            .add(GeocodeEntry::new("東京都", "千代田区", 35.69, 139.75))
            .await
            .unwrap();
        assert!(path.exists());

        let reloaded = FileGeocodeStore::new(&path).await.unwrap();
        let entry = reloaded.get("東京都", "千代田区").await.unwrap().unwrap();
        assert_eq!(entry.latitude, 35.69);
        assert_eq!(entry.longitude, 139.75);
    }

    #[tokio::test]
    async fn test_file_store_never_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("geocode.json");

        let store = FileGeocodeStore::new(&path).await.unwrap();
        assert!(
            store
                .add(GeocodeEntry::new("大阪府", "大阪市", 34.69, 135.5))
                .await
                .unwrap()
        );
        assert!(
            !store
                .add(GeocodeEntry::new("大阪府", "大阪市", 0.0, 0.0))
                .await
                .unwrap()
        );

        let reloaded = FileGeocodeStore::new(&path).await.unwrap();
        let entry = reloaded.get("大阪府", "大阪市").await.unwrap().unwrap();
        assert_eq!(entry.latitude, 34.69);
    }

    #[tokio::test]
    async fn test_file_store_corruption_recovery() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("geocode.json");

        let store = FileGeocodeStore::new(&path).await.unwrap();
        store
            .add(GeocodeEntry::new("宮城県", "仙台市", 38.27, 140.87))
            .await
            .unwrap();
        // Second write leaves the first file as the backup
        store
            .add(GeocodeEntry::new("福岡県", "福岡市", 33.59, 130.4))
            .await
            .unwrap();

        let backup_path = FileGeocodeStore::backup_path(&path);
        assert!(backup_path.exists());

        fs::write(&path, b"corrupted json data").await.unwrap();

        let recovered = FileGeocodeStore::new(&path).await.unwrap();
        assert!(recovered.get("宮城県", "仙台市").await.unwrap().is_some());
        assert!(recovered.get("福岡県", "福岡市").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_flush_is_noop_when_clean() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("geocode.json");

        let store = FileGeocodeStore::new(&path).await.unwrap();
        store.flush().await.unwrap();
        assert!(!path.exists());
    }
}
