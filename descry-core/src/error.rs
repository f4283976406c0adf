//! Error types for DESCRY operations

use crate::DescriptorUuid;
use thiserror::Error;

/// Backing store errors, for both single-item and document stores.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Descriptor not found: {uuid}")]
    NotFound { uuid: DescriptorUuid },

    #[error("{} descriptor(s) not found: {uuids:?}", uuids.len())]
    Missing { uuids: Vec<DescriptorUuid> },

    #[error("Backend {backend} failed: {reason}")]
    Backend { backend: String, reason: String },

    #[error("Serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("Invalid descriptor {id}: {reason}")]
    InvalidDescriptor { id: String, reason: String },

    #[error("Query rejected by store: {reason}")]
    QueryRejected { reason: String },

    #[error("Invalid query '{query}': {reason}")]
    InvalidQuery { query: String, reason: String },

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Configuration errors, raised at construction time.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration parse failed: {reason}")]
    Parse { reason: String },
}

/// Master error type for all DESCRY errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DescryError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl DescryError {
    /// True when the error only says a descriptor does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DescryError::Store(StoreError::NotFound { .. } | StoreError::Missing { .. })
        )
    }
}

/// Result type alias for DESCRY operations.
pub type DescryResult<T> = Result<T, DescryError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display_not_found() {
        let err = StoreError::NotFound {
            uuid: DescriptorUuid::from("abc"),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("not found"));
        assert!(msg.contains("abc"));
    }

    #[test]
    fn test_store_error_display_missing_lists_uuids() {
        let err = StoreError::Missing {
            uuids: vec![DescriptorUuid::from("a"), DescriptorUuid::from("b")],
        };
        let msg = format!("{}", err);
        assert!(msg.starts_with("2 descriptor(s)"));
        assert!(msg.contains("\"a\""));
        assert!(msg.contains("\"b\""));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "poll_interval".to_string(),
            value: "0ns".to_string(),
            reason: "must be positive".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("poll_interval"));
        assert!(msg.contains("0ns"));
        assert!(msg.contains("must be positive"));
    }

    #[test]
    fn test_descry_error_from_variants() {
        let store = DescryError::from(StoreError::LockPoisoned);
        assert!(matches!(store, DescryError::Store(_)));

        let config = DescryError::from(ConfigError::MissingRequired {
            field: "set_id".to_string(),
        });
        assert!(matches!(config, DescryError::Config(_)));
    }

    #[test]
    fn test_store_error_display_invalid_descriptor() {
        let err = StoreError::InvalidDescriptor {
            id: "sift:".to_string(),
            reason: "descriptor uuid must not be empty".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("sift:"));
        assert!(msg.contains("must not be empty"));
    }

    #[test]
    fn test_is_not_found() {
        let missing = DescryError::from(StoreError::NotFound {
            uuid: DescriptorUuid::from("x"),
        });
        assert!(missing.is_not_found());

        let backend = DescryError::from(StoreError::Backend {
            backend: "memory".to_string(),
            reason: "down".to_string(),
        });
        assert!(!backend.is_not_found());
    }
}
