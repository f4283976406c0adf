//! Configuration types

use crate::{ConfigError, DescryError, DescryResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Durations are exchanged as floating-point seconds.
mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// CACHE CONFIGURATION
// ============================================================================

/// How long a fetched vector stays resident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expiration {
    /// Cache forever; the backing store is never polled again.
    Never,
    /// Clear the cached vector once it has gone unread for this long.
    After(#[serde(with = "secs")] Duration),
}

impl Expiration {
    /// Finite timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        match self {
            Expiration::Never => None,
            Expiration::After(timeout) => Some(*timeout),
        }
    }

    pub fn is_never(&self) -> bool {
        matches!(self, Expiration::Never)
    }
}

/// Configuration for an expiring cache wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub expiration: Expiration,
    /// How often the expiry monitor checks the entry. Unused with `Never`.
    #[serde(with = "secs")]
    pub poll_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            expiration: Expiration::After(Duration::from_secs(1)),
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from second counts. `f64::INFINITY` as the timeout means `Never`.
    pub fn from_secs(expiration_timeout: f64, poll_interval: f64) -> DescryResult<Self> {
        let expiration = if expiration_timeout == f64::INFINITY {
            Expiration::Never
        } else {
            Expiration::After(positive_secs("cache_expiration_timeout", expiration_timeout)?)
        };
        let config = Self {
            expiration,
            poll_interval: positive_secs("poll_interval", poll_interval)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON configuration block.
    pub fn from_json_str(json: &str) -> DescryResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_expiration(mut self, expiration: Expiration) -> Self {
        self.expiration = expiration;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.expiration = Expiration::After(timeout);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - a finite expiration timeout is positive
    /// - poll_interval is positive
    pub fn validate(&self) -> DescryResult<()> {
        if let Expiration::After(timeout) = self.expiration {
            if timeout.is_zero() {
                return Err(DescryError::Config(ConfigError::InvalidValue {
                    field: "cache_expiration_timeout".to_string(),
                    value: format!("{:?}", timeout),
                    reason: "cache expiration timeout must be positive".to_string(),
                }));
            }
        }

        if self.poll_interval.is_zero() {
            return Err(DescryError::Config(ConfigError::InvalidValue {
                field: "poll_interval".to_string(),
                value: format!("{:?}", self.poll_interval),
                reason: "poll_interval must be positive".to_string(),
            }));
        }

        Ok(())
    }
}

fn positive_secs(field: &str, secs: f64) -> DescryResult<Duration> {
    if secs.is_nan() || secs <= 0.0 {
        return Err(DescryError::Config(ConfigError::InvalidValue {
            field: field.to_string(),
            value: secs.to_string(),
            reason: format!("{} must be a positive number of seconds", field),
        }));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| {
        DescryError::Config(ConfigError::InvalidValue {
            field: field.to_string(),
            value: secs.to_string(),
            reason: e.to_string(),
        })
    })
}

// ============================================================================
// DOCUMENT SET CONFIGURATION
// ============================================================================

/// Configuration for a descriptor set persisted in a document store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSetConfig {
    /// Identifier shared by every document of this set.
    pub set_id: String,
    /// Field holding the set identifier.
    pub set_id_field: String,
    /// Field holding the descriptor uuid.
    pub uuid_field: String,
    /// Field holding the serialized descriptor.
    pub descriptor_field: String,
    /// Field holding the floating-point UNIX insertion timestamp.
    pub timestamp_field: String,
    /// Commit immediately after every mutation.
    #[serde(default = "default_commit_on_add")]
    pub commit_on_add: bool,
    /// The store's maximum boolean clause count. May be lower than the
    /// store's real setting, never higher.
    #[serde(default = "default_max_boolean_clauses")]
    pub max_boolean_clauses: usize,
}

fn default_commit_on_add() -> bool {
    true
}

fn default_max_boolean_clauses() -> usize {
    1024
}

impl DocumentSetConfig {
    /// Create a config with the given set id and conventional field names.
    pub fn new(set_id: impl Into<String>) -> Self {
        Self {
            set_id: set_id.into(),
            set_id_field: "set_id_s".to_string(),
            uuid_field: "uuid_s".to_string(),
            descriptor_field: "descriptor_bin".to_string(),
            timestamp_field: "timestamp_f".to_string(),
            commit_on_add: default_commit_on_add(),
            max_boolean_clauses: default_max_boolean_clauses(),
        }
    }

    /// Parse and validate a JSON configuration block.
    pub fn from_json_str(json: &str) -> DescryResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_fields(
        mut self,
        set_id_field: impl Into<String>,
        uuid_field: impl Into<String>,
        descriptor_field: impl Into<String>,
        timestamp_field: impl Into<String>,
    ) -> Self {
        self.set_id_field = set_id_field.into();
        self.uuid_field = uuid_field.into();
        self.descriptor_field = descriptor_field.into();
        self.timestamp_field = timestamp_field.into();
        self
    }

    pub fn with_commit_on_add(mut self, commit_on_add: bool) -> Self {
        self.commit_on_add = commit_on_add;
        self
    }

    pub fn with_max_boolean_clauses(mut self, max_boolean_clauses: usize) -> Self {
        self.max_boolean_clauses = max_boolean_clauses;
        self
    }

    /// Largest number of uuids one sub-query may carry: one clause is
    /// reserved for the set restriction.
    pub fn batch_size(&self) -> usize {
        self.max_boolean_clauses.saturating_sub(1).max(1)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> DescryResult<()> {
        let names = [
            ("set_id", &self.set_id),
            ("set_id_field", &self.set_id_field),
            ("uuid_field", &self.uuid_field),
            ("descriptor_field", &self.descriptor_field),
            ("timestamp_field", &self.timestamp_field),
        ];
        for (field, value) in names {
            if value.trim().is_empty() {
                return Err(DescryError::Config(ConfigError::MissingRequired {
                    field: field.to_string(),
                }));
            }
        }

        if self.max_boolean_clauses < 2 {
            return Err(DescryError::Config(ConfigError::InvalidValue {
                field: "max_boolean_clauses".to_string(),
                value: self.max_boolean_clauses.to_string(),
                reason: "need at least 2 clauses (one set restriction, one uuid)".to_string(),
            }));
        }

        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
