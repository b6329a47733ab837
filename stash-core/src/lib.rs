//! Stash Core - Shared Types
//!
//! Pure data types used by every stash crate. No I/O lives here:
//! error enums, store configuration, and the control values returned
//! by iteration callbacks.

pub mod config;
pub mod error;
pub mod visit;

pub use config::{StoreConfig, DEFAULT_MAP_SIZE_MB, DEFAULT_MAX_READERS, MAX_KEY_LEN};
pub use error::{CacheError, ConfigError, StoreError};
pub use visit::{KeyAction, Visit};
