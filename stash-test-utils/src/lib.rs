//! Stash Test Utilities
//!
//! Centralized test infrastructure for the stash workspace:
//! - Temp-dir backed store fixtures
//! - Proptest generators for keys, values and cache payloads
//! - Collecting helpers over the iteration primitives
//! - One-shot tracing setup for test runs

use std::collections::BTreeSet;
use std::path::Path;

use once_cell::sync::Lazy;
use proptest::collection::{btree_set, vec};
use proptest::prelude::*;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

pub use stash_core::{CacheError, KeyAction, StoreConfig, StoreError, Visit};
pub use stash_storage::{CacheStore, EntryRecord, Store};

/// Map size used by fixtures; small so many stores can coexist.
pub const TEST_MAP_SIZE_MB: usize = 10;

// ============================================================================
// TRACING
// ============================================================================

static TRACING: Lazy<()> = Lazy::new(|| {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // Another harness may have installed a subscriber already.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
});

/// Install a fmt subscriber filtered by `RUST_LOG`, once per process.
pub fn init_tracing() {
    Lazy::force(&TRACING);
}

// ============================================================================
// FIXTURES
// ============================================================================

/// A store living in its own temporary directory.
///
/// The directory is removed when the fixture is dropped.
pub struct TempStore {
    store: Store,
    dir: TempDir,
}

impl TempStore {
    pub fn new() -> Self {
        init_tracing();
        let dir = TempDir::new().expect("TempDir creation should succeed");
        let store = Store::open_with_config(dir.path(), &test_config())
            .expect("store open should succeed");
        Self { store, dir }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Close the current handle and open a fresh one on the same directory.
    pub fn reopen(&mut self) {
        if !self.store.is_closed() {
            self.store.close().expect("close should succeed");
        }
        self.store = Store::open_with_config(self.dir.path(), &test_config())
            .expect("reopen should succeed");
    }

    /// Fill the store with `entries`.
    pub fn fill<K: AsRef<[u8]>, V: AsRef<[u8]>>(&self, entries: impl IntoIterator<Item = (K, V)>) {
        for (key, value) in entries {
            self.store
                .set(key.as_ref(), value.as_ref())
                .expect("set should succeed");
        }
    }
}

impl Default for TempStore {
    fn default() -> Self {
        Self::new()
    }
}

pub fn test_config() -> StoreConfig {
    StoreConfig::new().with_map_size_mb(TEST_MAP_SIZE_MB)
}

/// Two-field payload used by cache tests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestData {
    pub data1: i64,
    pub data2: i64,
}

/// Nested payload exercising strings, options and collections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRecord {
    pub name: String,
    pub tags: Vec<String>,
    pub parent: Option<u64>,
    pub data: TestData,
}

/// Keys `prefix ++ [i]` for `i` in `0..n`, each with value `[i]`.
pub fn numbered_entries(prefix: &[u8], n: u8) -> Vec<(Vec<u8>, Vec<u8>)> {
    (0..n)
        .map(|i| {
            let mut key = prefix.to_vec();
            key.push(i);
            (key, vec![i])
        })
        .collect()
}

// ============================================================================
// COLLECTING HELPERS
// ============================================================================

/// Every live key under `prefix`, in iteration order.
pub fn collect_keys(store: &Store, prefix: &[u8]) -> Vec<Vec<u8>> {
    let mut keys = Vec::new();
    store
        .iterate_keys(prefix, |key| {
            keys.push(key.to_vec());
            Ok::<_, StoreError>(Visit::Continue)
        })
        .expect("iteration should succeed");
    keys
}

/// Every live value under `prefix`, in iteration order.
pub fn collect_values(store: &Store, prefix: &[u8]) -> Vec<Vec<u8>> {
    let mut values = Vec::new();
    store
        .iterate_values(prefix, |value| {
            values.push(value.to_vec());
            Ok::<_, StoreError>(Visit::Continue)
        })
        .expect("iteration should succeed");
    values
}

// ============================================================================
// GENERATORS
// ============================================================================

/// Keys of 1..=32 arbitrary bytes.
pub fn arb_key() -> impl Strategy<Value = Vec<u8>> {
    vec(any::<u8>(), 1..=32)
}

/// Values of 0..=256 arbitrary bytes.
pub fn arb_value() -> impl Strategy<Value = Vec<u8>> {
    vec(any::<u8>(), 0..=256)
}

/// Distinct non-empty key suffixes, up to `max` of them.
pub fn arb_suffixes(max: usize) -> impl Strategy<Value = BTreeSet<Vec<u8>>> {
    btree_set(vec(any::<u8>(), 1..=8), 0..=max)
}

pub fn arb_test_data() -> impl Strategy<Value = TestData> {
    (any::<i64>(), any::<i64>()).prop_map(|(data1, data2)| TestData { data1, data2 })
}

pub fn arb_test_record() -> impl Strategy<Value = TestRecord> {
    (
        ".{0,24}",
        vec("[a-z]{1,8}", 0..4),
        proptest::option::of(any::<u64>()),
        arb_test_data(),
    )
        .prop_map(|(name, tags, parent, data)| TestRecord {
            name,
            tags,
            parent,
            data,
        })
}
