//! DESCRY Cache - Expiring Descriptor Cache
//!
//! Wraps one [`ValueStore`](descry_core::ValueStore) per descriptor identity
//! and keeps its vector resident for a bounded window. Each populated entry
//! owns exactly one background expiry monitor, which clears the entry once it
//! has gone unread for the configured timeout.
//!
//! # Example
//!
//! ```
//! use descry_cache::{ExpiringCache, MemoryValueStoreFactory};
//! use descry_core::{CacheConfig, DescriptorId, ValueStore, ValueStoreFactory};
//! use std::time::Duration;
//!
//! let factory = MemoryValueStoreFactory::new();
//! let id = DescriptorId::new("sift", "a1");
//! factory.new_store(&id)?.set(vec![0.5, 1.5])?;
//!
//! let config = CacheConfig::new()
//!     .with_timeout(Duration::from_millis(500))
//!     .with_poll_interval(Duration::from_millis(100));
//! let cache = ExpiringCache::new(id, &factory, config)?;
//!
//! assert_eq!(cache.vector()?, Some(vec![0.5, 1.5]));
//! assert!(cache.is_cached());
//! # Ok::<(), descry_core::DescryError>(())
//! ```

pub mod expiring;
pub mod memory;
mod monitor;

pub use expiring::{CacheStats, ExpiringCache};
pub use memory::{MemoryValueStore, MemoryValueStoreFactory};
