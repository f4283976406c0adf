//! In-memory value store.
//!
//! Stores produced by one [`MemoryValueStoreFactory`] share a single map, so
//! a vector set through one store is visible through every other store bound
//! to the same identity.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use descry_core::{DescriptorId, DescryResult, StoreError, ValueStore, ValueStoreFactory, Vector};

type SharedVectors = Arc<RwLock<HashMap<DescriptorId, Vector>>>;

/// Factory for [`MemoryValueStore`] instances over one shared map.
#[derive(Debug, Clone, Default)]
pub struct MemoryValueStoreFactory {
    vectors: SharedVectors,
}

impl MemoryValueStoreFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of identities holding a vector.
    pub fn len(&self) -> usize {
        self.vectors.read().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ValueStoreFactory for MemoryValueStoreFactory {
    type Store = MemoryValueStore;

    fn new_store(&self, id: &DescriptorId) -> DescryResult<MemoryValueStore> {
        Ok(MemoryValueStore {
            id: id.clone(),
            vectors: Arc::clone(&self.vectors),
        })
    }

    fn store_kind(&self) -> &str {
        "MemoryValueStore"
    }
}

/// Single-identity view onto a [`MemoryValueStoreFactory`]'s map.
#[derive(Debug, Clone)]
pub struct MemoryValueStore {
    id: DescriptorId,
    vectors: SharedVectors,
}

impl ValueStore for MemoryValueStore {
    fn id(&self) -> &DescriptorId {
        &self.id
    }

    fn get(&self) -> DescryResult<Option<Vector>> {
        let vectors = self.vectors.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(vectors.get(&self.id).cloned())
    }

    fn has(&self) -> DescryResult<bool> {
        let vectors = self.vectors.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(vectors.contains_key(&self.id))
    }

    fn set(&self, vector: Vector) -> DescryResult<()> {
        let mut vectors = self.vectors.write().map_err(|_| StoreError::LockPoisoned)?;
        vectors.insert(self.id.clone(), vector);
        Ok(())
    }
}
