//! DESCRY Core - Descriptor Types
//!
//! Identity model, error taxonomy, configuration and collaborator contracts
//! shared by the cache and document-store crates. No I/O lives here.

pub mod codec;
pub mod config;
pub mod error;
pub mod store;

pub use codec::{DescriptorCodec, JsonCodec};
pub use config::{CacheConfig, DocumentSetConfig, Expiration};
pub use error::{ConfigError, DescryError, DescryResult, StoreError};
pub use store::{ValueStore, ValueStoreFactory};

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Descriptor vector value.
pub type Vector = Vec<f64>;

/// Opaque, hashable descriptor identifier.
///
/// Held in its canonical string form because remote stores persist and
/// query it as text; two identifiers that stringify the same are the same
/// identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DescriptorUuid(String);

impl DescriptorUuid {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generate a fresh, timestamp-sortable identifier.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DescriptorUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Uuid> for DescriptorUuid {
    fn from(value: Uuid) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for DescriptorUuid {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for DescriptorUuid {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u64> for DescriptorUuid {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

/// The `(type, uuid)` pair addressing one descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DescriptorId {
    /// Descriptor type, usually the name of the generator that produced it.
    pub type_name: String,
    pub uuid: DescriptorUuid,
}

impl DescriptorId {
    pub fn new(type_name: impl Into<String>, uuid: impl Into<DescriptorUuid>) -> Self {
        Self {
            type_name: type_name.into(),
            uuid: uuid.into(),
        }
    }
}

impl fmt::Display for DescriptorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.type_name, self.uuid)
    }
}

/// A descriptor identity together with its vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    pub id: DescriptorId,
    pub vector: Vector,
}

impl Descriptor {
    pub fn new(id: DescriptorId, vector: Vector) -> Self {
        Self { id, vector }
    }

    pub fn uuid(&self) -> &DescriptorUuid {
        &self.id.uuid
    }

    pub fn type_name(&self) -> &str {
        &self.id.type_name
    }
}

// ============================================================================
// TESTS
// ============================================================================
