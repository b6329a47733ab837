//! Cache slot behavior across saves, reloads and store reopenings.

use proptest::prelude::*;
use stash_test_utils::{
    arb_test_data, arb_test_record, CacheError, CacheStore, StoreError, TempStore, TestData,
    TestRecord,
};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: save then load returns an equal value.
    #[test]
    fn prop_save_load_roundtrip(record in arb_test_record()) {
        let fixture = TempStore::new();
        let cache = fixture.store().cache(b"record".to_vec());

        cache.save(&record).expect("save should succeed");
        let loaded: TestRecord = cache.load().expect("load should succeed");

        prop_assert_eq!(loaded, record);
    }

    /// Property: the last save wins.
    #[test]
    fn prop_last_save_wins(first in arb_test_data(), second in arb_test_data()) {
        let fixture = TempStore::new();
        let cache = fixture.store().cache(vec![0u8]);

        cache.save(&first).expect("save should succeed");
        cache.save(&second).expect("save should succeed");

        prop_assert_eq!(cache.load::<TestData>(), Ok(second));
    }
}

#[test]
fn test_load_never_saved_is_no_value() {
    let fixture = TempStore::new();
    let cache = fixture.store().cache(vec![0u8]);
    assert_eq!(cache.load::<TestData>(), Err(CacheError::NoValue));
}

/// Save, close, reopen a store at the same path, load into a fresh value.
#[test]
fn test_persists_across_reopen() {
    let mut fixture = TempStore::new();
    let cache = CacheStore::new(fixture.store().clone(), vec![0u8]);
    cache
        .save(&TestData { data1: 1, data2: 2 })
        .expect("save should succeed");
    cache.close().expect("close should succeed");

    fixture.reopen();
    let cache = CacheStore::new(fixture.store().clone(), vec![0u8]);
    let loaded: TestData = cache.load().expect("load should succeed");

    assert_eq!(loaded.data1, 1);
    assert_eq!(loaded.data2, 2);
}

#[test]
fn test_slot_shares_store_with_byte_api() {
    let fixture = TempStore::new();
    let cache = fixture.store().cache(b"cfg".to_vec());
    cache
        .save(&TestData { data1: 3, data2: 4 })
        .expect("save should succeed");

    let raw = fixture
        .store()
        .get(b"cfg")
        .expect("get should succeed")
        .expect("slot bytes should exist");
    assert_eq!(raw, br#"{"data1":3,"data2":4}"#.to_vec());
}

#[test]
fn test_closed_store_is_not_no_value() {
    let fixture = TempStore::new();
    let cache = fixture.store().cache(vec![0u8]);
    fixture.store().close().expect("close should succeed");

    assert_eq!(
        cache.load::<TestData>(),
        Err(CacheError::Store(StoreError::Closed))
    );
}
