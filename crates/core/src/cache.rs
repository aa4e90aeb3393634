//! TTL response cache mirrored into durable storage
//!
//! Reads are served from memory. Expired entries are evicted lazily by
//! [`ResponseCache::get`] and in bulk by [`ResponseCache::sweep`]. Writes mark
//! the cache dirty and wake the background flusher, which serialises the
//! whole map under a single storage key.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tether_common::SharedClock;
use tether_domain::constants::CACHE_SCHEMA_VERSION;
use tether_domain::{CacheEntry, HttpMethod, RequestKey, Response, Result};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::ports::DurableStore;

/// Versioned blob written to durable storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedCache {
    version: u32,
    saved_at_ms: u64,
    entries: Vec<CacheEntry>,
}

/// Only the version is read first so a future schema with different entry
/// fields is recognised as a mismatch rather than as corruption.
#[derive(Debug, Deserialize)]
struct PersistedVersion {
    version: u32,
}

/// In-memory response cache with TTL and durable mirroring.
pub struct ResponseCache {
    entries: Mutex<HashMap<RequestKey, CacheEntry>>,
    ttl_ms: u64,
    clock: SharedClock,
    store: Option<Arc<dyn DurableStore>>,
    storage_key: String,
    dirty: AtomicBool,
    flush_signal: Notify,
    write_lock: tokio::sync::Mutex<()>,
}

impl ResponseCache {
    /// Create a cache. Without a store, entries live in memory only.
    pub fn new(
        ttl_ms: u64,
        clock: SharedClock,
        store: Option<Arc<dyn DurableStore>>,
        storage_key: impl Into<String>,
    ) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl_ms,
            clock,
            store,
            storage_key: storage_key.into(),
            dirty: AtomicBool::new(false),
            flush_signal: Notify::new(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Fetch a valid entry, evicting it if it has expired.
    pub fn get(&self, url: &str, method: HttpMethod) -> Option<CacheEntry> {
        if !method.is_cacheable() {
            return None;
        }
        let key = RequestKey::new(method, url);
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock();

        match entries.get(&key) {
            Some(entry) if !entry.is_expired(now, self.ttl_ms) => return Some(entry.clone()),
            Some(_) => {}
            None => return None,
        }

        entries.remove(&key);
        drop(entries);
        debug!(key = %key, "Evicted expired cache entry on read");
        self.mark_dirty();
        None
    }

    /// Store a response snapshot. Returns `false` for non-cacheable methods.
    pub fn put(&self, url: &str, method: HttpMethod, response: &Response) -> bool {
        if !method.is_cacheable() {
            return false;
        }
        let key = RequestKey::new(method, url);
        let entry = CacheEntry::from_response(&key, response, self.clock.now_millis());
        self.entries.lock().insert(key, entry);
        self.mark_dirty();
        true
    }

    /// Evict every expired entry; returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now_millis();
        let removed = {
            let mut entries = self.entries.lock();
            let before = entries.len();
            entries.retain(|_, entry| !entry.is_expired(now, self.ttl_ms));
            before - entries.len()
        };
        if removed > 0 {
            debug!(removed, "Swept expired cache entries");
            self.mark_dirty();
        }
        removed
    }

    /// Number of entries that are still valid.
    pub fn len(&self) -> usize {
        let now = self.clock.now_millis();
        self.entries.lock().values().filter(|e| !e.is_expired(now, self.ttl_ms)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    fn mark_dirty(&self) {
        if self.store.is_some() {
            self.dirty.store(true, Ordering::Release);
            self.flush_signal.notify_one();
        }
    }

    /// Load persisted entries into memory.
    ///
    /// Never fails: a missing, unreadable, corrupt or version-mismatched
    /// blob leaves the cache empty. Entries already expired are dropped and
    /// entries written since startup are kept.
    #[instrument(skip(self), fields(storage_key = %self.storage_key))]
    pub async fn hydrate(&self) -> usize {
        let Some(store) = &self.store else {
            return 0;
        };

        let raw = match store.get_item(&self.storage_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("No persisted cache found");
                return 0;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read persisted cache; starting empty");
                return 0;
            }
        };

        let version = match serde_json::from_str::<PersistedVersion>(&raw) {
            Ok(header) => header.version,
            Err(e) => {
                warn!(error = %e, "Persisted cache is corrupt; starting empty");
                return 0;
            }
        };
        if version != CACHE_SCHEMA_VERSION {
            warn!(
                found = version,
                expected = CACHE_SCHEMA_VERSION,
                "Persisted cache has an unsupported schema version; ignoring it"
            );
            return 0;
        }

        let persisted: PersistedCache = match serde_json::from_str(&raw) {
            Ok(persisted) => persisted,
            Err(e) => {
                warn!(error = %e, "Persisted cache entries are corrupt; starting empty");
                return 0;
            }
        };

        let now = self.clock.now_millis();
        let total = persisted.entries.len();
        let mut loaded = 0;
        {
            let mut entries = self.entries.lock();
            for entry in persisted.entries {
                if entry.is_expired(now, self.ttl_ms) || !entry.method.is_cacheable() {
                    continue;
                }
                entries.entry(entry.key()).or_insert(entry);
                loaded += 1;
            }
        }

        info!(loaded, dropped = total - loaded, "Hydrated response cache");
        loaded
    }

    /// Write the current map to durable storage.
    #[instrument(skip(self), fields(storage_key = %self.storage_key))]
    pub async fn flush(&self) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };

        let _guard = self.write_lock.lock().await;
        // Cleared before the snapshot so writes racing this flush re-mark it.
        self.dirty.store(false, Ordering::Release);

        let mut entries: Vec<CacheEntry> = self.entries.lock().values().cloned().collect();
        entries.sort_by(|a, b| a.key().cmp(&b.key()));
        let count = entries.len();

        let blob = PersistedCache {
            version: CACHE_SCHEMA_VERSION,
            saved_at_ms: self.clock.now_millis(),
            entries,
        };
        let raw = serde_json::to_string(&blob)?;

        if let Err(e) = store.set_item(&self.storage_key, raw).await {
            self.dirty.store(true, Ordering::Release);
            return Err(e);
        }
        debug!(entries = count, "Flushed response cache");
        Ok(())
    }

    /// Drop every entry from memory and durable storage.
    pub async fn clear(&self) -> Result<()> {
        self.entries.lock().clear();
        let Some(store) = &self.store else {
            return Ok(());
        };
        let _guard = self.write_lock.lock().await;
        self.dirty.store(false, Ordering::Release);
        store.remove_item(&self.storage_key).await
    }

    /// Background task flushing the cache whenever it is marked dirty.
    pub fn spawn_flusher(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = cache.flush_signal.notified() => {
                        if !cache.is_dirty() {
                            continue;
                        }
                        if let Err(e) = cache.flush().await {
                            error!(error = %e, "Failed to persist response cache");
                        }
                    }
                }
            }
            debug!("Cache flusher stopped");
        })
    }

    /// Background task running [`ResponseCache::sweep`] every `interval`.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        cache.sweep();
                    }
                }
            }
            debug!("Cache sweeper stopped");
        })
    }
}
