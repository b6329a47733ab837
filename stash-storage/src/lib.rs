//! Stash Storage - LMDB Byte Store and JSON Cache Slots
//!
//! A thin layer over LMDB (via heed):
//! - [`Store`]: open/close lifecycle, byte get/set with optional metadata
//!   byte or TTL, and prefix iteration with early exit
//! - [`CacheStore`]: one fixed key holding a JSON document
//!
//! Durability, isolation and the on-disk format are LMDB's. This crate adds
//! the value envelope, lazy expiry, and error mapping.

mod cache;
mod envelope;
mod store;

pub use cache::CacheStore;
pub use envelope::HEADER_LEN;
pub use store::{EntryRecord, Store};

// Re-export the types callers need alongside the store.
pub use stash_core::{CacheError, KeyAction, StoreConfig, StoreError, Visit};
