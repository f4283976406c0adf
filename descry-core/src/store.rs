//! Single-item value store contracts.
//!
//! A [`ValueStore`] holds the vector of exactly one descriptor identity. It
//! is produced on demand by a [`ValueStoreFactory`]; caching layers wrap one
//! store instance each.

use crate::{DescriptorId, DescryResult, Vector};

/// Backing store for one descriptor's vector.
pub trait ValueStore: Send + Sync {
    /// Identity this store is bound to.
    fn id(&self) -> &DescriptorId;

    /// Fetch the vector, or `None` when nothing is stored.
    fn get(&self) -> DescryResult<Option<Vector>>;

    /// Whether a vector is stored.
    fn has(&self) -> DescryResult<bool> {
        Ok(self.get()?.is_some())
    }

    /// Store a vector.
    fn set(&self, vector: Vector) -> DescryResult<()>;
}

/// Manufactures [`ValueStore`] instances for identities.
pub trait ValueStoreFactory: Send + Sync {
    type Store: ValueStore + 'static;

    /// Create the store bound to `id`.
    fn new_store(&self, id: &DescriptorId) -> DescryResult<Self::Store>;

    /// Short name of the produced store kind, for diagnostics.
    fn store_kind(&self) -> &str;
}
