//! Configuration types

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Default LMDB map size, in megabytes.
pub const DEFAULT_MAP_SIZE_MB: usize = 256;

/// Default number of LMDB reader slots.
pub const DEFAULT_MAX_READERS: u32 = 126;

/// Longest key the engine accepts (LMDB's compile-time default).
pub const MAX_KEY_LEN: usize = 511;

const MAP_SIZE_ENV: &str = "STASH_MAP_SIZE_MB";
const MAX_READERS_ENV: &str = "STASH_MAX_READERS";

/// Engine tuning for an opened store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Upper bound of the memory map, and therefore of the database size.
    pub map_size_mb: usize,
    /// Maximum number of concurrent read transactions.
    pub max_readers: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            map_size_mb: DEFAULT_MAP_SIZE_MB,
            max_readers: DEFAULT_MAX_READERS,
        }
    }
}

impl StoreConfig {
    /// Create a new store config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a config from `STASH_MAP_SIZE_MB` and `STASH_MAX_READERS`.
    ///
    /// Unset or unparsable variables fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            map_size_mb: lookup(MAP_SIZE_ENV)
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.map_size_mb),
            max_readers: lookup(MAX_READERS_ENV)
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_readers),
        }
    }

    /// Set the map size in megabytes.
    pub fn with_map_size_mb(mut self, map_size_mb: usize) -> Self {
        self.map_size_mb = map_size_mb;
        self
    }

    /// Set the number of reader slots.
    pub fn with_max_readers(mut self, max_readers: u32) -> Self {
        self.max_readers = max_readers;
        self
    }

    /// Map size in bytes, as handed to the engine.
    pub fn map_size_bytes(&self) -> usize {
        self.map_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.map_size_mb == 0 {
            return Err(ConfigError::InvalidValue {
                field: "map_size_mb".to_string(),
                value: self.map_size_mb.to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.max_readers == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_readers".to_string(),
                value: self.max_readers.to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
