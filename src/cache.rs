//! Response cache with a fixed time-to-live
//!
//! Results of fetch operations are memoized under a key derived from the
//! operation name and its arguments. Entries carry their own expiry time and
//! are checked lazily on lookup; there is no background eviction.
//!
//! # Cache key format
//!
//! ```text
//! key = lowercase_hex( SHA-256( operation_utf8 || 0x00 || serde_json::to_vec(args) ) )
//! ```
//!
//! `serde_json::to_vec` writes compact JSON (no whitespace) and keeps struct
//! fields in declaration order, so the key depends only on the operation name
//! and the argument values. Entries also record [`CACHE_FORMAT_VERSION`];
//! entries written under another version are ignored and removed.
//!
//! # Storage
//!
//! The disk backend stores one `{key}.json` file per entry. Writes go to a
//! temporary file in the same directory which is then renamed over the entry,
//! so concurrent readers see either the old entry or the new one.

use crate::config::{CacheBackendKind, CacheConfig};
use crate::error::{Error, Result};
use crate::utils::{remove_file_if_exists, write_atomic};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Version tag stored in every entry
pub const CACHE_FORMAT_VERSION: u32 = 1;

/// Operation name for type payload fetches
pub const OP_TYPE_PAYLOAD: &str = "type_payload";

/// Operation name for member sub-resource fetches
pub const OP_SUB_RESOURCE: &str = "sub_resource";

const ENTRY_EXTENSION: &str = "json";

/// Compute the cache key for an operation and its arguments
pub fn cache_key<A: Serialize + ?Sized>(operation: &str, args: &A) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(operation.as_bytes());
    hasher.update([0u8]);
    hasher.update(serde_json::to_vec(args)?);
    Ok(format!("{:x}", hasher.finalize()))
}

/// A stored result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Format version the entry was written with
    pub version: u32,
    /// Operation that produced the value
    pub operation: String,
    /// Cache key (see module docs)
    pub key: String,
    /// When the value was stored
    pub created_at: DateTime<Utc>,
    /// When the entry stops being served
    pub expires_at: DateTime<Utc>,
    /// The memoized result
    pub value: serde_json::Value,
}

impl CacheEntry {
    /// Whether the entry's TTL has elapsed at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of stored entries, expired ones included
    pub entries: usize,
    /// Entries whose TTL has elapsed but which have not been purged yet
    pub expired: usize,
    /// Total size of stored values in bytes
    pub size_bytes: u64,
}

/// Storage backend
#[derive(Debug)]
pub enum CacheBackend {
    /// Process-local map
    Memory(Mutex<HashMap<String, CacheEntry>>),
    /// One file per entry in a directory
    Disk(PathBuf),
}

/// Source of the current time, replaceable in tests
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// TTL cache wrapping fetch operations
pub struct ResponseCache {
    backend: CacheBackend,
    ttl: chrono::Duration,
    enabled: bool,
    clock: Clock,
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("backend", &self.backend)
            .field("ttl", &self.ttl)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

impl ResponseCache {
    /// Build the cache described by `config`
    ///
    /// The disk backend creates its directory if needed. A disabled cache
    /// touches nothing on disk.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        if !config.enabled {
            return Ok(Self::disabled());
        }

        match config.backend {
            CacheBackendKind::Memory => Self::memory(config.ttl),
            CacheBackendKind::Disk => Self::disk(&config.dir, config.ttl),
        }
    }

    /// In-memory cache
    pub fn memory(ttl: Duration) -> Result<Self> {
        Self::with_backend(CacheBackend::Memory(Mutex::new(HashMap::new())), ttl)
    }

    /// Directory-backed cache shared across runs
    pub fn disk(dir: impl AsRef<Path>, ttl: Duration) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Self::with_backend(CacheBackend::Disk(dir), ttl)
    }

    /// A cache that never stores anything; every call runs the operation
    pub fn disabled() -> Self {
        Self {
            backend: CacheBackend::Memory(Mutex::new(HashMap::new())),
            ttl: chrono::Duration::zero(),
            enabled: false,
            clock: Arc::new(Utc::now),
        }
    }

    fn with_backend(backend: CacheBackend, ttl: Duration) -> Result<Self> {
        let ttl = chrono::Duration::from_std(ttl).map_err(|e| Error::Config {
            message: format!("cache TTL out of range: {}", e),
            key: Some("cache.ttl".to_string()),
        })?;

        Ok(Self {
            backend,
            ttl,
            enabled: true,
            clock: Arc::new(Utc::now),
        })
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Whether lookups and stores are performed
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Run `op` unless an unexpired result for (`operation`, `args`) is stored
    ///
    /// On a hit the stored value is returned and `op` is never invoked. On a miss
    /// the result of `op` is stored with `now + ttl` as its expiry. Errors from
    /// `op` are returned unchanged and nothing is stored. Storage failures are
    /// logged and do not fail the call.
    pub async fn cached_call<T, A, F, Fut>(&self, operation: &str, args: &A, op: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        A: Serialize + ?Sized,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if !self.enabled {
            return op().await;
        }

        let key = cache_key(operation, args)?;

        match self.get(&key).await {
            Ok(Some(entry)) => match serde_json::from_value::<T>(entry.value) {
                Ok(value) => {
                    tracing::debug!(operation, key = %key, status = "hit", "cache hit");
                    return Ok(value);
                }
                Err(e) => {
                    tracing::warn!(
                        operation,
                        key = %key,
                        error = %e,
                        "cached value has unexpected shape, discarding"
                    );
                    if let Err(e) = self.remove(&key).await {
                        tracing::warn!(key = %key, error = %e, "failed to remove cache entry");
                    }
                }
            },
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    operation,
                    key = %key,
                    error = %e,
                    "cache lookup failed, treating as miss"
                );
            }
        }

        tracing::debug!(operation, key = %key, status = "miss", "cache miss");
        let value = op().await?;

        match serde_json::to_value(&value) {
            Ok(json) => {
                if let Err(e) = self.put(&key, operation, json).await {
                    tracing::warn!(
                        operation,
                        key = %key,
                        error = %e,
                        "failed to store cache entry"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    operation,
                    key = %key,
                    error = %e,
                    "result is not serializable, not cached"
                );
            }
        }

        Ok(value)
    }

    /// Get an unexpired entry
    ///
    /// Expired, corrupt, and version-mismatched entries are removed and reported
    /// as absent. Disk reads go through `tokio::fs`.
    pub async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let now = (self.clock)();

        match &self.backend {
            CacheBackend::Memory(map) => {
                let mut map = map.lock().unwrap_or_else(|p| p.into_inner());
                let expired = match map.get(key) {
                    Some(entry) => entry.is_expired(now),
                    None => return Ok(None),
                };
                if expired {
                    map.remove(key);
                    return Ok(None);
                }
                Ok(map.get(key).cloned())
            }
            CacheBackend::Disk(dir) => {
                let path = entry_path(dir, key);
                let bytes = match tokio::fs::read(&path).await {
                    Ok(bytes) => bytes,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                    Err(e) => {
                        return Err(Error::Cache(format!(
                            "failed to read {}: {}",
                            path.display(),
                            e
                        )));
                    }
                };

                let entry = match serde_json::from_slice::<CacheEntry>(&bytes) {
                    Ok(entry) if entry.version == CACHE_FORMAT_VERSION && entry.key == key => entry,
                    Ok(_) | Err(_) => {
                        tracing::debug!(key, "discarding unreadable cache entry");
                        remove_entry_file(&path).await?;
                        return Ok(None);
                    }
                };

                if entry.is_expired(now) {
                    tracing::debug!(key, expires_at = %entry.expires_at, "cache entry expired");
                    remove_entry_file(&path).await?;
                    return Ok(None);
                }

                Ok(Some(entry))
            }
        }
    }

    /// Store a value under `key`, replacing any existing entry
    ///
    /// The disk backend's atomic write (temp file, fsync, rename) runs on the
    /// blocking thread pool.
    pub async fn put(&self, key: &str, operation: &str, value: serde_json::Value) -> Result<()> {
        let created_at = (self.clock)();
        let expires_at = created_at
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let entry = CacheEntry {
            version: CACHE_FORMAT_VERSION,
            operation: operation.to_string(),
            key: key.to_string(),
            created_at,
            expires_at,
            value,
        };

        match &self.backend {
            CacheBackend::Memory(map) => {
                map.lock()
                    .unwrap_or_else(|p| p.into_inner())
                    .insert(key.to_string(), entry);
                Ok(())
            }
            CacheBackend::Disk(dir) => {
                let bytes = serde_json::to_vec(&entry)?;
                let dir = dir.clone();
                let path = entry_path(&dir, key);

                tokio::task::spawn_blocking(move || {
                    write_atomic(&dir, &path, &bytes).map_err(|e| {
                        Error::Cache(format!("failed to write {}: {}", path.display(), e))
                    })
                })
                .await
                .map_err(|e| Error::Cache(format!("cache write task failed: {}", e)))?
            }
        }
    }

    /// Remove one entry; missing entries are not an error
    pub async fn remove(&self, key: &str) -> Result<()> {
        match &self.backend {
            CacheBackend::Memory(map) => {
                map.lock().unwrap_or_else(|p| p.into_inner()).remove(key);
                Ok(())
            }
            CacheBackend::Disk(dir) => remove_entry_file(&entry_path(dir, key)).await,
        }
    }

    /// Remove every expired or unreadable entry, returning how many were removed
    pub fn purge_expired(&self) -> Result<usize> {
        let now = (self.clock)();

        match &self.backend {
            CacheBackend::Memory(map) => {
                let mut map = map.lock().unwrap_or_else(|p| p.into_inner());
                let before = map.len();
                map.retain(|_, entry| !entry.is_expired(now));
                Ok(before - map.len())
            }
            CacheBackend::Disk(dir) => {
                let mut removed = 0;
                for path in entry_files(dir)? {
                    let keep = fs::read(&path)
                        .ok()
                        .and_then(|bytes| serde_json::from_slice::<CacheEntry>(&bytes).ok())
                        .is_some_and(|entry| {
                            entry.version == CACHE_FORMAT_VERSION && !entry.is_expired(now)
                        });
                    if !keep {
                        remove_file_if_exists(&path)?;
                        removed += 1;
                    }
                }
                Ok(removed)
            }
        }
    }

    /// Remove every entry, returning how many were removed
    pub fn clear(&self) -> Result<usize> {
        match &self.backend {
            CacheBackend::Memory(map) => {
                let mut map = map.lock().unwrap_or_else(|p| p.into_inner());
                let count = map.len();
                map.clear();
                Ok(count)
            }
            CacheBackend::Disk(dir) => {
                let files = entry_files(dir)?;
                for path in &files {
                    remove_file_if_exists(path)?;
                }
                Ok(files.len())
            }
        }
    }

    /// Count entries and their size
    pub fn stats(&self) -> Result<CacheStats> {
        let now = (self.clock)();
        let mut stats = CacheStats::default();

        match &self.backend {
            CacheBackend::Memory(map) => {
                let map = map.lock().unwrap_or_else(|p| p.into_inner());
                for entry in map.values() {
                    stats.entries += 1;
                    if entry.is_expired(now) {
                        stats.expired += 1;
                    }
                    stats.size_bytes += serde_json::to_vec(&entry.value)
                        .map(|v| v.len() as u64)
                        .unwrap_or(0);
                }
            }
            CacheBackend::Disk(dir) => {
                for path in entry_files(dir)? {
                    stats.entries += 1;
                    stats.size_bytes += fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                    let expired = fs::read(&path)
                        .ok()
                        .and_then(|bytes| serde_json::from_slice::<CacheEntry>(&bytes).ok())
                        .is_none_or(|entry| entry.is_expired(now));
                    if expired {
                        stats.expired += 1;
                    }
                }
            }
        }

        Ok(stats)
    }
}

async fn remove_entry_file(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn entry_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{key}.{ENTRY_EXTENSION}"))
}

fn entry_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    if !dir.exists() {
        return Ok(files);
    }

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}
