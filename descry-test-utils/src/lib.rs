//! DESCRY Test Utilities
//!
//! Centralized test infrastructure for the DESCRY workspace:
//! - Proptest generators for descriptor types
//! - Instrumented and failing value stores
//! - Test fixtures for common scenarios

pub use descry_core::{
    CacheConfig, Descriptor, DescriptorId, DescriptorUuid, DescryError, DescryResult,
    DocumentSetConfig, Expiration, StoreError, ValueStore, ValueStoreFactory, Vector,
};

use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

/// Descriptor uuids: either real UUIDs, integers, or short slugs.
pub fn descriptor_uuid_strategy() -> impl Strategy<Value = DescriptorUuid> {
    prop_oneof![
        any::<u128>().prop_map(|bits| DescriptorUuid::from(Uuid::from_u128(bits))),
        any::<u64>().prop_map(DescriptorUuid::from),
        "[a-z][a-z0-9_]{0,15}".prop_map(DescriptorUuid::from),
    ]
}

/// Vector components: mostly finite, occasionally infinite. `NaN` is left
/// out so generated descriptors still compare equal to themselves.
pub fn component_strategy() -> impl Strategy<Value = f64> {
    prop_oneof![
        18 => -1.0e3f64..1.0e3,
        1 => Just(f64::INFINITY),
        1 => Just(f64::NEG_INFINITY),
    ]
}

/// Vectors with 1 to 64 dimensions.
pub fn vector_strategy() -> impl Strategy<Value = Vector> {
    prop::collection::vec(component_strategy(), 1..64)
}

/// Descriptors of a fixed type with arbitrary uuid and vector.
pub fn descriptor_strategy(type_name: &'static str) -> impl Strategy<Value = Descriptor> {
    (descriptor_uuid_strategy(), vector_strategy())
        .prop_map(move |(uuid, vector)| Descriptor::new(DescriptorId::new(type_name, uuid), vector))
}

/// Clause limits from the minimum legal value upward.
pub fn clause_limit_strategy() -> impl Strategy<Value = usize> {
    2usize..64
}

/// Distinct uuids, `0..max` of them.
pub fn distinct_uuids_strategy(max: usize) -> impl Strategy<Value = Vec<DescriptorUuid>> {
    prop::collection::hash_set(descriptor_uuid_strategy(), 0..max)
        .prop_map(|set| set.into_iter().collect())
}

// ============================================================================
// FIXTURES
// ============================================================================

/// A descriptor whose vector is `dims` copies of `seed`.
pub fn make_descriptor(
    type_name: &str,
    uuid: impl Into<DescriptorUuid>,
    seed: f64,
    dims: usize,
) -> Descriptor {
    Descriptor::new(DescriptorId::new(type_name, uuid), vec![seed; dims])
}

/// `count` descriptors with uuids `"{prefix}-{i}"` and distinct vectors.
pub fn make_descriptors(type_name: &str, prefix: &str, count: usize) -> Vec<Descriptor> {
    (0..count)
        .map(|i| make_descriptor(type_name, format!("{}-{}", prefix, i), i as f64, 4))
        .collect()
}

// ============================================================================
// INSTRUMENTED VALUE STORES
// ============================================================================

#[derive(Debug, Default)]
struct FetchCounters {
    fetches: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Factory wrapper that counts backing-store fetches across every store it
/// produces, optionally slowing each fetch down.
#[derive(Debug, Clone)]
pub struct CountingValueStoreFactory<F> {
    inner: F,
    counters: Arc<FetchCounters>,
    fetch_delay: Duration,
}

impl<F: ValueStoreFactory> CountingValueStoreFactory<F> {
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            counters: Arc::new(FetchCounters::default()),
            fetch_delay: Duration::ZERO,
        }
    }

    /// Sleep this long inside every fetch.
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    /// The wrapped factory, for seeding values without counting.
    pub fn inner(&self) -> &F {
        &self.inner
    }

    /// Total `get` calls observed.
    pub fn fetches(&self) -> usize {
        self.counters.fetches.load(Ordering::SeqCst)
    }

    /// Highest number of fetches observed running at the same time.
    pub fn max_concurrent_fetches(&self) -> usize {
        self.counters.max_in_flight.load(Ordering::SeqCst)
    }
}

impl<F: ValueStoreFactory> ValueStoreFactory for CountingValueStoreFactory<F> {
    type Store = CountingValueStore<F::Store>;

    fn new_store(&self, id: &DescriptorId) -> DescryResult<Self::Store> {
        Ok(CountingValueStore {
            inner: self.inner.new_store(id)?,
            counters: Arc::clone(&self.counters),
            fetch_delay: self.fetch_delay,
        })
    }

    fn store_kind(&self) -> &str {
        "CountingValueStore"
    }
}

/// Store produced by [`CountingValueStoreFactory`].
#[derive(Debug)]
pub struct CountingValueStore<S> {
    inner: S,
    counters: Arc<FetchCounters>,
    fetch_delay: Duration,
}

impl<S: ValueStore> ValueStore for CountingValueStore<S> {
    fn id(&self) -> &DescriptorId {
        self.inner.id()
    }

    fn get(&self) -> DescryResult<Option<Vector>> {
        let now = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.counters.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.fetch_delay.is_zero() {
            std::thread::sleep(self.fetch_delay);
        }
        let result = self.inner.get();
        self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn has(&self) -> DescryResult<bool> {
        Ok(self.get()?.is_some())
    }

    fn set(&self, vector: Vector) -> DescryResult<()> {
        self.inner.set(vector)
    }
}

/// A value store whose every operation fails with a backend error.
#[derive(Debug, Clone)]
pub struct FailingValueStore {
    id: DescriptorId,
    reason: String,
}

impl FailingValueStore {
    pub fn new(id: DescriptorId, reason: impl Into<String>) -> Self {
        Self {
            id,
            reason: reason.into(),
        }
    }

    fn error(&self) -> DescryError {
        DescryError::Store(StoreError::Backend {
            backend: "failing".to_string(),
            reason: self.reason.clone(),
        })
    }
}

impl ValueStore for FailingValueStore {
    fn id(&self) -> &DescriptorId {
        &self.id
    }

    fn get(&self) -> DescryResult<Option<Vector>> {
        Err(self.error())
    }

    fn set(&self, _vector: Vector) -> DescryResult<()> {
        Err(self.error())
    }
}

/// Factory producing [`FailingValueStore`]s.
#[derive(Debug, Clone)]
pub struct FailingValueStoreFactory {
    reason: String,
}

impl FailingValueStoreFactory {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl ValueStoreFactory for FailingValueStoreFactory {
    type Store = FailingValueStore;

    fn new_store(&self, id: &DescriptorId) -> DescryResult<FailingValueStore> {
        Ok(FailingValueStore::new(id.clone(), self.reason.clone()))
    }

    fn store_kind(&self) -> &str {
        "FailingValueStore"
    }
}
