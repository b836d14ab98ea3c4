//! In-memory cache with expiration and LRU eviction
//!
//! Backs both the application-wide byte cache and the session store.

use crate::error::{CacheError, CacheResult};
use std::{
    collections::HashMap,
    fmt::Debug,
    hash::Hash,
    sync::{Arc, RwLock},
    time::{Duration, Instant},
};
use tracing::debug;

/// How long an entry stays alive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    /// Entries live until removed or evicted
    Never,
    /// Entries expire a fixed time after they were written
    Absolute(Duration),
    /// Entries expire after a period without access
    Sliding(Duration),
}

/// Cache entry with expiration
#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: T,
    expires_at: Option<Instant>,
    last_accessed: Instant,
}

impl<T> CacheEntry<T> {
    fn new(value: T, expiration: Expiration) -> Self {
        let now = Instant::now();
        let expires_at = match expiration {
            Expiration::Never => None,
            Expiration::Absolute(ttl) | Expiration::Sliding(ttl) => Some(now + ttl),
        };
        Self {
            value,
            expires_at,
            last_accessed: now,
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .map(|expires_at| Instant::now() >= expires_at)
            .unwrap_or(false)
    }

    fn touch(&mut self, expiration: Expiration) {
        let now = Instant::now();
        self.last_accessed = now;
        if let Expiration::Sliding(ttl) = expiration {
            self.expires_at = Some(now + ttl);
        }
    }
}

/// Thread-safe in-memory cache. Clones share the same entries.
#[derive(Debug, Clone)]
pub struct MemoryCache<K, V> {
    entries: Arc<RwLock<HashMap<K, CacheEntry<V>>>>,
    max_size: usize,
    expiration: Expiration,
}

impl<K, V> MemoryCache<K, V>
where
    K: Clone + Eq + Hash + Debug,
    V: Clone,
{
    pub fn new(max_size: usize, expiration: Expiration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            max_size: max_size.max(1),
            expiration,
        }
    }

    pub fn expiration(&self) -> Expiration {
        self.expiration
    }

    /// Clone of the live value for `key`; refreshes sliding expiration
    pub fn get(&self, key: &K) -> CacheResult<Option<V>> {
        self.with_entry(key, |value| value.clone())
    }

    /// Run `f` against the live value for `key`, if any. Counts as an access.
    pub fn with_entry<R>(&self, key: &K, f: impl FnOnce(&mut V) -> R) -> CacheResult<Option<R>> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| CacheError::LockPoisoned("read"))?;

        let expired = match entries.get(key) {
            Some(entry) => entry.is_expired(),
            None => {
                debug!("Cache miss for key: {:?}", key);
                return Ok(None);
            }
        };

        if expired {
            entries.remove(key);
            debug!("Cache entry expired and removed: {:?}", key);
            return Ok(None);
        }

        Ok(entries.get_mut(key).map(|entry| {
            entry.touch(self.expiration);
            f(&mut entry.value)
        }))
    }

    pub fn set(&self, key: K, value: V) -> CacheResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| CacheError::LockPoisoned("write"))?;

        if entries.len() >= self.max_size && !entries.contains_key(&key) {
            Self::evict_lru(&mut entries);
        }

        entries.insert(key, CacheEntry::new(value, self.expiration));
        Ok(())
    }

    /// Modify the live value for `key`, creating it with `init` first when
    /// missing or expired.
    pub fn upsert<R>(
        &self,
        key: K,
        init: impl FnOnce() -> V,
        f: impl FnOnce(&mut V) -> R,
    ) -> CacheResult<R> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| CacheError::LockPoisoned("upsert"))?;

        if entries.get(&key).map(CacheEntry::is_expired).unwrap_or(false) {
            entries.remove(&key);
        }

        if !entries.contains_key(&key) && entries.len() >= self.max_size {
            Self::evict_lru(&mut entries);
        }

        let expiration = self.expiration;
        let entry = entries
            .entry(key)
            .or_insert_with(|| CacheEntry::new(init(), expiration));
        entry.touch(expiration);
        Ok(f(&mut entry.value))
    }

    pub fn remove(&self, key: &K) -> CacheResult<Option<V>> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| CacheError::LockPoisoned("remove"))?;
        Ok(entries
            .remove(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value))
    }

    pub fn contains_key(&self, key: &K) -> CacheResult<bool> {
        let entries = self
            .entries
            .read()
            .map_err(|_| CacheError::LockPoisoned("contains_key"))?;
        Ok(entries.get(key).map(|e| !e.is_expired()).unwrap_or(false))
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> CacheResult<usize> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| CacheError::LockPoisoned("purge"))?;
        let initial_size = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        Ok(initial_size - entries.len())
    }

    pub fn clear(&self) -> CacheResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| CacheError::LockPoisoned("clear"))?;
        entries.clear();
        Ok(())
    }

    /// Number of stored entries, including expired ones not yet purged
    pub fn len(&self) -> CacheResult<usize> {
        let entries = self
            .entries
            .read()
            .map_err(|_| CacheError::LockPoisoned("len"))?;
        Ok(entries.len())
    }

    pub fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.len()? == 0)
    }

    fn evict_lru(entries: &mut HashMap<K, CacheEntry<V>>) {
        let lru_key = entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_accessed)
            .map(|(key, _)| key.clone());

        if let Some(key) = lru_key {
            entries.remove(&key);
            debug!("Evicted LRU cache entry: {:?}", key);
        }
    }
}
