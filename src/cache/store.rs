use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::types::Result;

// ============================================================================
// Store Trait
// ============================================================================

/// An associative store holding serialized capability results.
///
/// Implementations may be remote, so both operations are fallible. Callers
/// are expected to treat failures as a cache miss rather than an error.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch the serialized value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: String) -> Result<()>;
}

// ============================================================================
// Store Configuration
// ============================================================================

/// Retention policy for [`MemoryCacheStore`]
///
/// Both limits default to `None`: entries are kept for the lifetime of the
/// store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Time-to-live for every entry
    #[serde(default)]
    pub ttl: Option<Duration>,

    /// Maximum number of entries before least recently used ones are evicted
    #[serde(default)]
    pub max_entries: Option<usize>,
}

#[derive(Debug, Clone)]
struct StoreEntry {
    value: String,
    last_accessed: Instant,
    expires_at: Option<Instant>,
}

impl StoreEntry {
    fn new(value: String, ttl: Option<Duration>) -> Self {
        let now = Instant::now();
        Self {
            value,
            last_accessed: now,
            expires_at: ttl.map(|d| now + d),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .map(|exp| Instant::now() > exp)
            .unwrap_or(false)
    }
}

// ============================================================================
// In-Memory Store
// ============================================================================

/// In-process [`CacheStore`] guarded by a `parking_lot::RwLock`.
///
/// Writes are independent and last-write-wins; concurrent writers to the same
/// key are not serialized beyond the lock itself.
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, StoreEntry>>,
    config: StoreConfig,
}

impl MemoryCacheStore {
    /// Empty store with the given retention
    pub fn new(config: StoreConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Unbounded store without expiry
    pub fn with_defaults() -> Self {
        Self::new(StoreConfig::default())
    }

    /// Number of entries, including expired ones not yet swept
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    fn evict_lru(entries: &mut HashMap<String, StoreEntry>, max_entries: usize) {
        while entries.len() >= max_entries && !entries.is_empty() {
            let lru_key = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_accessed)
                .map(|(key, _)| key.clone());

            match lru_key {
                Some(key) => {
                    entries.remove(&key);
                    tracing::debug!(key = %key, "Evicted least recently used cache entry");
                }
                None => break,
            }
        }
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.write();
        let expired = match entries.get_mut(key) {
            Some(entry) if !entry.is_expired() => {
                entry.last_accessed = Instant::now();
                return Ok(Some(entry.value.clone()));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let mut entries = self.entries.write();

        // Entries that are never read again would otherwise outlive their TTL
        if self.config.ttl.is_some() {
            entries.retain(|_, entry| !entry.is_expired());
        }

        if let Some(max_entries) = self.config.max_entries {
            if !entries.contains_key(key) {
                Self::evict_lru(&mut entries, max_entries);
            }
        }

        entries.insert(key.to_string(), StoreEntry::new(value, self.config.ttl));
        Ok(())
    }
}
