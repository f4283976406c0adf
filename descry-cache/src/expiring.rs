//! Expiring read-through cache wrapper.
//!
//! [`ExpiringCache`] serves `vector()` reads for one descriptor identity out
//! of memory, fetching from the wrapped [`ValueStore`] on a miss. A fetched
//! vector stays cached until it has gone unread for the configured timeout,
//! at which point the entry's expiry monitor clears it.
//!
//! # Locking
//!
//! All reads and writes of the entry (`vector`, `last_access`, `monitor`)
//! happen under one mutex per wrapper. The fetch from the backing store runs
//! while holding it, so concurrent readers of one wrapper queue behind a slow
//! fetch. Wrappers for different identities never share a lock.
//!
//! # Monitor lifecycle
//!
//! A monitor is spawned only after a successful population with a finite
//! timeout. It exits once the vector is cleared, either by its own timeout
//! check or by the wrapper being dropped, and it never touches the entry
//! again after clearing it. Joining a finished monitor while holding the
//! entry lock is therefore deadlock-free.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Instant;

use descry_core::{
    CacheConfig, DescriptorId, DescryResult, StoreError, ValueStore, ValueStoreFactory, Vector,
};

use crate::monitor::{self, MonitorSettings};

// ============================================================================
// SHARED ENTRY STATE
// ============================================================================

/// The single cache entry owned by one wrapper.
pub(crate) struct CacheEntry {
    pub(crate) vector: Option<Vector>,
    pub(crate) last_access: Instant,
    /// Expiry monitor of the current (or most recent) population.
    pub(crate) monitor: Option<JoinHandle<()>>,
}

/// State shared between a wrapper and its expiry monitor.
pub(crate) struct Shared {
    pub(crate) entry: Mutex<CacheEntry>,
    /// Signalled when the entry is cleared from outside the monitor.
    pub(crate) wake: Condvar,
    pub(crate) counters: Counters,
}

#[derive(Default)]
pub(crate) struct Counters {
    pub(crate) fetches: AtomicU64,
    pub(crate) hits: AtomicU64,
    pub(crate) expirations: AtomicU64,
    pub(crate) monitors_started: AtomicU64,
}

impl Shared {
    fn lock(&self) -> Result<MutexGuard<'_, CacheEntry>, StoreError> {
        self.entry.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

/// Snapshot of a wrapper's activity counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads that went to the backing store.
    pub fetches: u64,
    /// Reads served from memory.
    pub hits: u64,
    /// Entries cleared by the timeout.
    pub expirations: u64,
    /// Expiry monitors spawned.
    pub monitors_started: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.fetches;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// ============================================================================
// EXPIRING CACHE
// ============================================================================

/// Time-bounded caching decorator around one [`ValueStore`].
///
/// Writes are not propagated: [`set_vector`](Self::set_vector) is a no-op and
/// the wrapper only ever reads through to the backing store. A negative
/// result (no vector stored) is never cached.
pub struct ExpiringCache<S: ValueStore> {
    id: DescriptorId,
    store: S,
    store_kind: String,
    config: CacheConfig,
    shared: Arc<Shared>,
}

impl<S: ValueStore + 'static> ExpiringCache<S> {
    /// Create a wrapper, manufacturing its backing store from `factory`.
    pub fn new<F>(id: DescriptorId, factory: &F, config: CacheConfig) -> DescryResult<Self>
    where
        F: ValueStoreFactory<Store = S>,
    {
        config.validate()?;
        let store = factory.new_store(&id)?;
        tracing::debug!(
            descriptor = %id,
            store_kind = factory.store_kind(),
            "Caching descriptor store"
        );
        Ok(Self::assemble(id, store, factory.store_kind().to_string(), config))
    }

    /// Wrap an already constructed backing store.
    pub fn from_store(
        store: S,
        store_kind: impl Into<String>,
        config: CacheConfig,
    ) -> DescryResult<Self> {
        config.validate()?;
        let id = store.id().clone();
        Ok(Self::assemble(id, store, store_kind.into(), config))
    }

    fn assemble(id: DescriptorId, store: S, store_kind: String, config: CacheConfig) -> Self {
        Self {
            id,
            store,
            store_kind,
            config,
            shared: Arc::new(Shared {
                entry: Mutex::new(CacheEntry {
                    vector: None,
                    last_access: Instant::now(),
                    monitor: None,
                }),
                wake: Condvar::new(),
                counters: Counters::default(),
            }),
        }
    }

    /// Return the vector, fetching and caching it on a miss.
    ///
    /// On a successful population with a finite timeout, exactly one expiry
    /// monitor is started for the entry, after any monitor of a previous
    /// population has fully stopped. Backing store errors propagate and
    /// leave nothing cached.
    pub fn vector(&self) -> DescryResult<Option<Vector>> {
        let mut entry = self.shared.lock()?;

        if let Some(vector) = entry.vector.clone() {
            debug_assert!(
                self.config.expiration.is_never() || entry.monitor.is_some(),
                "cached vector for {} has no expiry monitor",
                self.id
            );
            entry.last_access = Instant::now();
            self.shared.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(vector));
        }

        tracing::debug!(descriptor = %self.id, "Fetching vector from wrapped store");
        let fetched = self.store.get()?;
        self.shared.counters.fetches.fetch_add(1, Ordering::Relaxed);

        let Some(vector) = fetched else {
            tracing::debug!(descriptor = %self.id, "Wrapped store has no vector");
            return Ok(None);
        };

        if let Some(previous) = entry.monitor.take() {
            tracing::debug!(descriptor = %self.id, "Joining previous expiry monitor");
            if previous.join().is_err() {
                tracing::warn!(descriptor = %self.id, "Previous expiry monitor panicked");
            }
        }

        if let Some(timeout) = self.config.expiration.timeout() {
            let settings = MonitorSettings {
                label: format!("{} via {}", self.id, self.store_kind),
                timeout,
                poll_interval: self.config.poll_interval,
            };
            let handle = monitor::spawn(Arc::clone(&self.shared), settings)?;
            self.shared
                .counters
                .monitors_started
                .fetch_add(1, Ordering::Relaxed);
            entry.monitor = Some(handle);
        }

        entry.vector = Some(vector.clone());
        entry.last_access = Instant::now();
        Ok(Some(vector))
    }

    /// Whether a vector exists. Goes through the same fetch-and-cache path
    /// as [`vector`](Self::vector).
    pub fn has_vector(&self) -> DescryResult<bool> {
        Ok(self.vector()?.is_some())
    }

    /// Intentionally does nothing: the wrapper is read-through only.
    pub fn set_vector(&self, _vector: Vector) {
        tracing::debug!(descriptor = %self.id, "Ignoring write to read-through cache");
    }
}

impl<S: ValueStore> ExpiringCache<S> {
    /// Identity of the cached descriptor.
    pub fn id(&self) -> &DescriptorId {
        &self.id
    }

    /// Expiration settings this wrapper was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The wrapped backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Kind name of the wrapped store, as reported by its factory.
    pub fn store_kind(&self) -> &str {
        &self.store_kind
    }

    /// Whether a vector is currently resident. Never fetches.
    pub fn is_cached(&self) -> bool {
        self.shared
            .lock()
            .map(|entry| entry.vector.is_some())
            .unwrap_or(false)
    }

    /// Whether an expiry monitor thread is still running.
    pub fn monitor_active(&self) -> bool {
        self.shared
            .lock()
            .map(|entry| entry.monitor.as_ref().is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    /// Snapshot of the activity counters.
    pub fn stats(&self) -> CacheStats {
        let counters = &self.shared.counters;
        CacheStats {
            fetches: counters.fetches.load(Ordering::Relaxed),
            hits: counters.hits.load(Ordering::Relaxed),
            expirations: counters.expirations.load(Ordering::Relaxed),
            monitors_started: counters.monitors_started.load(Ordering::Relaxed),
        }
    }
}

impl<S: ValueStore> Drop for ExpiringCache<S> {
    /// Clear the entry and wait for the monitor to observe it and exit.
    fn drop(&mut self) {
        let monitor = {
            let mut entry = match self.shared.entry.lock() {
                Ok(entry) => entry,
                Err(poisoned) => poisoned.into_inner(),
            };
            entry.vector = None;
            entry.monitor.take()
        };
        self.shared.wake.notify_all();

        if let Some(handle) = monitor {
            tracing::debug!(descriptor = %self.id, "Waiting for expiry monitor to exit");
            if handle.join().is_err() {
                tracing::warn!(descriptor = %self.id, "Expiry monitor panicked");
            }
        }
    }
}

/// The wrapper is itself a single-item store and can stand in for one.
impl<S: ValueStore + 'static> ValueStore for ExpiringCache<S> {
    fn id(&self) -> &DescriptorId {
        &self.id
    }

    fn get(&self) -> DescryResult<Option<Vector>> {
        self.vector()
    }

    fn has(&self) -> DescryResult<bool> {
        self.has_vector()
    }

    fn set(&self, vector: Vector) -> DescryResult<()> {
        self.set_vector(vector);
        Ok(())
    }
}

impl<S: ValueStore> std::fmt::Debug for ExpiringCache<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiringCache")
            .field("id", &self.id)
            .field("store_kind", &self.store_kind)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// TESTS
// =============================================================================
