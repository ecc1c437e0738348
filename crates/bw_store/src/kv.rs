//! Expiring key-value capability.
//!
//! Expiry belongs to the backend.  Callers only rely on an entry becoming
//! permanently unavailable once its TTL has elapsed; `MemoryKvStore` hides
//! expired entries on read and sweeps them out every `purge_interval` writes.

use std::{
    collections::HashMap,
    hash::Hash,
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::trace;

use crate::error::StoreError;

/// Writes between two sweeps of a `MemoryKvStore`.
pub const DEFAULT_PURGE_INTERVAL: usize = 64;

#[async_trait]
pub trait ExpiringKeyValueStore<K, V>: Send + Sync
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    async fn get(&self, key: &K) -> Result<Option<V>, StoreError>;

    async fn set(&self, key: K, value: V, ttl: Duration) -> Result<(), StoreError>;

    /// Store only when no live entry exists.  Returns `false` if one did.
    async fn set_if_absent(&self, key: K, value: V, ttl: Duration) -> Result<bool, StoreError>;

    /// Returns whether a live entry was removed.
    async fn delete(&self, key: &K) -> Result<bool, StoreError>;
}

struct Entry<V> {
    value: V,
    /// `None` when the TTL runs past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    fn new(value: V, now: Instant, ttl: Duration) -> Self {
        Self { value, expires_at: now.checked_add(ttl) }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

struct Shelf<K, V> {
    entries: HashMap<K, Entry<V>>,
    writes_since_purge: usize,
}

impl<K: Eq + Hash, V> Shelf<K, V> {
    fn purge(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.is_live(now));
        self.writes_since_purge = 0;
        before - self.entries.len()
    }

    fn insert(&mut self, key: K, entry: Entry<V>, purge_interval: usize, now: Instant) {
        self.entries.insert(key, entry);
        self.writes_since_purge += 1;
        if self.writes_since_purge >= purge_interval {
            let removed = self.purge(now);
            trace!(removed, "expired entries swept");
        }
    }
}

/// In-process backend.  Cheap to clone (Arc internally); each operation holds
/// the lock for exactly one key update, so writes are visible to every clone
/// as soon as the call returns.
pub struct MemoryKvStore<K, V> {
    inner: Arc<RwLock<Shelf<K, V>>>,
    purge_interval: usize,
}

impl<K, V> Clone for MemoryKvStore<K, V> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner), purge_interval: self.purge_interval }
    }
}

impl<K: Eq + Hash, V> MemoryKvStore<K, V> {
    pub fn new() -> Self {
        Self::with_purge_interval(DEFAULT_PURGE_INTERVAL)
    }

    /// Sweep expired entries after every `writes` inserts (at least one).
    pub fn with_purge_interval(writes: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Shelf {
                entries: HashMap::new(),
                writes_since_purge: 0,
            })),
            purge_interval: writes.max(1),
        }
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.inner.write().purge(Instant::now())
    }

    /// Live and not-yet-purged entries.
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Eq + Hash, V> Default for MemoryKvStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<K, V> ExpiringKeyValueStore<K, V> for MemoryKvStore<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &K) -> Result<Option<V>, StoreError> {
        let now = Instant::now();
        let shelf = self.inner.read();
        Ok(shelf
            .entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone()))
    }

    async fn set(&self, key: K, value: V, ttl: Duration) -> Result<(), StoreError> {
        let now = Instant::now();
        self.inner
            .write()
            .insert(key, Entry::new(value, now, ttl), self.purge_interval, now);
        Ok(())
    }

    async fn set_if_absent(&self, key: K, value: V, ttl: Duration) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut shelf = self.inner.write();
        if shelf.entries.get(&key).is_some_and(|e| e.is_live(now)) {
            return Ok(false);
        }
        shelf.insert(key, Entry::new(value, now, ttl), self.purge_interval, now);
        Ok(true)
    }

    async fn delete(&self, key: &K) -> Result<bool, StoreError> {
        let now = Instant::now();
        Ok(self
            .inner
            .write()
            .entries
            .remove(key)
            .is_some_and(|e| e.is_live(now)))
    }
}
