//! Error types for stash operations

use thiserror::Error;

/// Errors raised by the byte-level store.
///
/// Engine failures are carried as strings so the enum stays `Clone` and
/// comparable in tests.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store open failed at {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("store transaction failed: {reason}")]
    Transaction { reason: String },

    #[error("store is closed")]
    Closed,

    #[error("invalid key: {reason}")]
    InvalidKey { reason: String },

    #[error("invalid ttl: {reason}")]
    InvalidTtl { reason: String },

    #[error("corrupt entry: {reason}")]
    Corrupt { reason: String },

    #[error("store lock poisoned")]
    LockPoisoned,

    #[error("store config: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised by a single-key JSON cache slot.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    /// The slot's key has never been written (or was cleared).
    #[error("no value")]
    NoValue,

    #[error("error marshaling: {reason}")]
    Serialization { reason: String },

    #[error("error unmarshaling: {reason}")]
    Deserialization { reason: String },

    #[error("cache store: {0}")]
    Store(#[from] StoreError),
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

// =============================================================================
// TESTS
// =============================================================================
