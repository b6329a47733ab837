//! Single-key JSON cache slots.
//!
//! A [`CacheStore`] pins one key of a [`Store`] and treats it as a slot
//! holding one JSON document. Several slots can share one store, each under
//! its own key; they share nothing but the store handle.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use stash_core::CacheError;

use crate::store::Store;

/// One JSON value stored under a fixed key.
///
/// # Example
///
/// ```ignore
/// use serde::{Deserialize, Serialize};
/// use stash_storage::CacheStore;
///
/// #[derive(Serialize, Deserialize)]
/// struct Settings { volume: u8 }
///
/// let cache = CacheStore::open("/tmp/stash", b"settings")?;
/// cache.save(&Settings { volume: 7 })?;
/// let settings: Settings = cache.load()?;
/// cache.close()?;
/// ```
#[derive(Debug, Clone)]
pub struct CacheStore {
    store: Store,
    key: Vec<u8>,
}

impl CacheStore {
    /// Create a slot at `key` over an opened store.
    ///
    /// The slot shares the store: closing either closes both.
    pub fn new(store: Store, key: impl Into<Vec<u8>>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Open a store at `path` with default tuning and create a slot at `key`.
    pub fn open(path: impl AsRef<Path>, key: impl Into<Vec<u8>>) -> Result<Self, CacheError> {
        Ok(Self::new(Store::open(path)?, key))
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// The underlying store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Load the slot's value.
    ///
    /// # Errors
    ///
    /// - [`CacheError::NoValue`] if the slot was never saved (or was cleared)
    /// - [`CacheError::Deserialization`] if the stored bytes do not decode as `T`
    /// - [`CacheError::Store`] if the store is closed or the read fails
    pub fn load<T: DeserializeOwned>(&self) -> Result<T, CacheError> {
        self.try_load()?.ok_or(CacheError::NoValue)
    }

    /// Load the slot's value, or `None` if it was never saved.
    pub fn try_load<T: DeserializeOwned>(&self) -> Result<Option<T>, CacheError> {
        let bytes = match self.store.get(&self.key)? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| CacheError::Deserialization {
                reason: e.to_string(),
            })
    }

    /// Save `value`, replacing whatever the slot held.
    pub fn save<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(value).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
        self.store.set(&self.key, &bytes)?;
        Ok(())
    }

    /// Empty the slot. Returns whether it held a value.
    pub fn clear(&self) -> Result<bool, CacheError> {
        Ok(self.store.delete(&self.key)?)
    }

    /// Close the underlying store.
    pub fn close(&self) -> Result<(), CacheError> {
        Ok(self.store.close()?)
    }

    pub fn is_closed(&self) -> bool {
        self.store.is_closed()
    }
}

impl Store {
    /// Create a cache slot at `key` sharing this store.
    pub fn cache(&self, key: impl Into<Vec<u8>>) -> CacheStore {
        CacheStore::new(self.clone(), key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use stash_core::StoreError;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct TestData {
        data1: i64,
        data2: i64,
    }

    fn create_test_cache(key: &[u8]) -> (CacheStore, TempDir) {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let cache = CacheStore::open(temp_dir.path(), key).expect("cache open should succeed");
        (cache, temp_dir)
    }

    #[test]
    fn test_save_and_load() {
        let (cache, _temp_dir) = create_test_cache(&[0]);
        let data = TestData { data1: 1, data2: 2 };

        cache.save(&data).expect("save should succeed");
        let loaded: TestData = cache.load().expect("load should succeed");

        assert_eq!(loaded, data);
    }

    #[test]
    fn test_load_empty_slot() {
        let (cache, _temp_dir) = create_test_cache(&[0]);
        let result = cache.load::<TestData>();
        assert_eq!(result, Err(CacheError::NoValue));
    }

    #[test]
    fn test_try_load_empty_slot() {
        let (cache, _temp_dir) = create_test_cache(&[0]);
        let result = cache.try_load::<TestData>().expect("try_load should succeed");
        assert!(result.is_none());
    }

    #[test]
    fn test_load_malformed_bytes() {
        let (cache, _temp_dir) = create_test_cache(b"slot");
        cache
            .store()
            .set(b"slot", b"{not json")
            .expect("set should succeed");

        let err = cache
            .load::<TestData>()
            .expect_err("malformed bytes should fail");
        assert!(matches!(err, CacheError::Deserialization { .. }));
    }

    #[test]
    fn test_load_wrong_shape() {
        let (cache, _temp_dir) = create_test_cache(b"slot");
        cache.save(&vec![1, 2, 3]).expect("save should succeed");

        let err = cache
            .load::<TestData>()
            .expect_err("wrong shape should fail");
        assert!(matches!(err, CacheError::Deserialization { .. }));
    }

    #[test]
    fn test_save_unserializable_value() {
        let (cache, _temp_dir) = create_test_cache(b"slot");
        // JSON object keys must be strings
        let mut map = BTreeMap::new();
        map.insert(vec![1u8], 1);

        let err = cache.save(&map).expect_err("non-string keys should fail");
        assert!(matches!(err, CacheError::Serialization { .. }));
        assert_eq!(cache.load::<i32>(), Err(CacheError::NoValue));
    }

    #[test]
    fn test_save_overwrites() {
        let (cache, _temp_dir) = create_test_cache(b"slot");
        cache
            .save(&TestData { data1: 1, data2: 1 })
            .expect("save should succeed");
        cache
            .save(&TestData { data1: 5, data2: 6 })
            .expect("save should succeed");

        let loaded: TestData = cache.load().expect("load should succeed");
        assert_eq!(loaded, TestData { data1: 5, data2: 6 });
    }

    #[test]
    fn test_clear() {
        let (cache, _temp_dir) = create_test_cache(b"slot");
        cache.save("value").expect("save should succeed");

        assert!(cache.clear().expect("clear should succeed"));
        assert_eq!(cache.load::<String>(), Err(CacheError::NoValue));
        assert!(!cache.clear().expect("clear should succeed"));
    }

    #[test]
    fn test_slots_sharing_a_store_are_independent() {
        let (first, _temp_dir) = create_test_cache(b"first");
        let second = first.store().cache(b"second".to_vec());

        first.save(&1u32).expect("save should succeed");
        second.save(&2u32).expect("save should succeed");

        assert_eq!(first.load::<u32>(), Ok(1));
        assert_eq!(second.load::<u32>(), Ok(2));
    }

    #[test]
    fn test_close_closes_store() {
        let (cache, _temp_dir) = create_test_cache(b"slot");
        let store = cache.store().clone();
        let sibling = store.cache(b"other".to_vec());

        cache.close().expect("close should succeed");

        assert!(cache.is_closed());
        assert!(store.is_closed());
        assert_eq!(
            sibling.load::<u32>(),
            Err(CacheError::Store(StoreError::Closed))
        );
        assert_eq!(cache.close(), Err(CacheError::Store(StoreError::Closed)));
    }

    #[test]
    fn test_persists_across_reopen() {
        let (cache, temp_dir) = create_test_cache(&[0]);
        cache
            .save(&TestData { data1: 1, data2: 2 })
            .expect("save should succeed");
        cache.close().expect("close should succeed");

        let reopened = CacheStore::open(temp_dir.path(), vec![0u8]).expect("reopen should succeed");
        let loaded: TestData = reopened.load().expect("load should succeed");
        assert_eq!(loaded.data1, 1);
        assert_eq!(loaded.data2, 2);
        reopened.close().expect("close should succeed");
    }

    #[test]
    fn test_empty_key_surfaces_store_error() {
        let (cache, _temp_dir) = create_test_cache(&[]);
        let err = cache.save(&1u8).expect_err("empty key should fail");
        assert!(matches!(
            err,
            CacheError::Store(StoreError::InvalidKey { .. })
        ));
    }
}
