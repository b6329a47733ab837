//! LMDB-backed byte store.
//!
//! Uses the heed crate (Rust bindings for LMDB). Each call runs in its own
//! transaction:
//! - Read transactions for `get` and the iteration primitives
//! - Write transactions for `set*`, `delete` and `purge_expired`
//!
//! Values are wrapped in an [`Envelope`] so that a metadata byte and an
//! optional expiry can travel with them. Expired entries read as absent and
//! are skipped by iteration; [`Store::purge_expired`] removes them for good.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use heed::types::Bytes;
use heed::{Database, Env, EnvFlags, EnvOpenOptions, RoTxn};
use stash_core::{KeyAction, StoreConfig, StoreError, Visit, MAX_KEY_LEN};
use tracing::{debug, trace};

use crate::envelope::Envelope;

type RawIter<'txn> = Box<dyn Iterator<Item = heed::Result<(&'txn [u8], &'txn [u8])>> + 'txn>;

/// A stored value together with its envelope fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRecord {
    /// Owned copy of the value bytes.
    pub value: Vec<u8>,
    /// Metadata byte, 0 unless written with [`Store::set_with_metadata`].
    pub meta: u8,
    /// When the entry stops being readable, if ever.
    pub expires_at: Option<DateTime<Utc>>,
}

/// The opened environment and its single unnamed database.
struct Handle {
    env: Env,
    db: Database<Bytes, Bytes>,
}

struct StoreInner {
    path: PathBuf,
    /// `None` once closed.
    handle: RwLock<Option<Handle>>,
}

/// Handle to an opened store.
///
/// Cloning is cheap and every clone shares the same environment. Closing
/// through any clone closes it for all of them; later calls on any clone
/// return [`StoreError::Closed`].
///
/// # Example
///
/// ```ignore
/// use stash_core::Visit;
/// use stash_storage::Store;
///
/// let store = Store::open("/tmp/stash")?;
/// store.set(b"user:1", b"alice")?;
/// assert_eq!(store.get(b"user:1")?, Some(b"alice".to_vec()));
///
/// store.iterate_keys(b"user:", |key| {
///     println!("{:?}", key);
///     Ok::<_, stash_core::StoreError>(Visit::Continue)
/// })?;
/// store.close()?;
/// ```
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Open (or create) a store in `path` with default tuning.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with_config(path, &StoreConfig::default())
    }

    /// Open (or create) a store in `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config does not validate
    /// - The directory cannot be created
    /// - The LMDB environment cannot be opened (locked, corrupt, no access)
    /// - The database cannot be created
    pub fn open_with_config(
        path: impl AsRef<Path>,
        config: &StoreConfig,
    ) -> Result<Self, StoreError> {
        config.validate()?;
        let path = path.as_ref().to_path_buf();

        std::fs::create_dir_all(&path).map_err(|e| open_error(&path, e))?;

        let mut options = EnvOpenOptions::new();
        options
            .map_size(config.map_size_bytes())
            .max_readers(config.max_readers)
            .max_dbs(1);

        // SAFETY: NO_TLS ties reader slots to transactions instead of threads,
        // so a callback can read while a scan holds its own read transaction.
        // No RoTxn is ever moved across threads.
        unsafe {
            options.flags(EnvFlags::NO_TLS);
        }

        // SAFETY: the environment is opened once per handle and closed only
        // through `close`, which waits for every transaction to finish.
        let env = unsafe { options.open(&path) }.map_err(|e| open_error(&path, e))?;

        let mut wtxn = env.write_txn().map_err(|e| open_error(&path, e))?;
        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| open_error(&path, e))?;
        wtxn.commit().map_err(|e| open_error(&path, e))?;

        debug!(
            path = %path.display(),
            map_size_mb = config.map_size_mb,
            max_readers = config.max_readers,
            "opened store"
        );

        Ok(Self {
            inner: Arc::new(StoreInner {
                path,
                handle: RwLock::new(Some(Handle { env, db })),
            }),
        })
    }

    /// Close the store and wait until the environment is fully released.
    ///
    /// Closing twice returns [`StoreError::Closed`].
    pub fn close(&self) -> Result<(), StoreError> {
        let handle = {
            let mut guard = self
                .inner
                .handle
                .write()
                .map_err(|_| StoreError::LockPoisoned)?;
            guard.take().ok_or(StoreError::Closed)?
        };

        handle.env.prepare_for_closing().wait();
        debug!(path = %self.inner.path.display(), "closed store");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.inner
            .handle
            .read()
            .map(|guard| guard.is_none())
            .unwrap_or(true)
    }

    /// Directory the store was opened in.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Get a copy of the value stored at `key`.
    ///
    /// Returns `None` if the key does not exist or has expired.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.get_entry(key)?.map(|entry| entry.value))
    }

    /// Get the value stored at `key` along with its metadata byte and expiry.
    pub fn get_entry(&self, key: &[u8]) -> Result<Option<EntryRecord>, StoreError> {
        check_key(key)?;
        self.with_handle(|handle| {
            let rtxn = handle.env.read_txn().map_err(txn_error)?;
            let bytes = match handle.db.get(&rtxn, key).map_err(txn_error)? {
                Some(bytes) => bytes,
                None => return Ok(None),
            };

            let envelope = Envelope::decode(bytes)?;
            if envelope.is_expired_at(now_millis()) {
                return Ok(None);
            }

            Ok(Some(EntryRecord {
                value: envelope.value.to_vec(),
                meta: envelope.meta,
                expires_at: envelope.expires_at(),
            }))
        })
    }

    /// Set the value at `key`, overwriting any previous entry.
    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.put(key, value, 0, None)
    }

    /// Set the value at `key` with a metadata byte.
    pub fn set_with_metadata(&self, key: &[u8], value: &[u8], meta: u8) -> Result<(), StoreError> {
        self.put(key, value, meta, None)
    }

    /// Set the value at `key` so that it expires after `ttl`.
    ///
    /// Once expired the entry reads as absent; its bytes stay on disk until
    /// [`Store::purge_expired`] runs or the key is overwritten.
    pub fn set_with_ttl(&self, key: &[u8], value: &[u8], ttl: Duration) -> Result<(), StoreError> {
        let ttl = chrono::Duration::from_std(ttl).map_err(|e| StoreError::InvalidTtl {
            reason: e.to_string(),
        })?;
        let expires_at = Utc::now()
            .checked_add_signed(ttl)
            .ok_or_else(|| StoreError::InvalidTtl {
                reason: "expiry is out of range".to_string(),
            })?;
        self.put(key, value, 0, Some(expires_at))
    }

    /// Remove `key`. Returns whether a live entry was removed.
    pub fn delete(&self, key: &[u8]) -> Result<bool, StoreError> {
        check_key(key)?;
        self.with_handle(|handle| {
            let mut wtxn = handle.env.write_txn().map_err(txn_error)?;

            // Unreadable entries still count as present so they can be removed.
            let live = match handle.db.get(&wtxn, key).map_err(txn_error)? {
                Some(bytes) => Envelope::decode(bytes)
                    .map(|envelope| !envelope.is_expired_at(now_millis()))
                    .unwrap_or(true),
                None => false,
            };

            handle.db.delete(&mut wtxn, key).map_err(txn_error)?;
            wtxn.commit().map_err(txn_error)?;
            Ok(live)
        })
    }

    /// Delete every expired entry in one write transaction.
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired(&self) -> Result<u64, StoreError> {
        let purged = self.with_handle(|handle| {
            let now = now_millis();
            let mut wtxn = handle.env.write_txn().map_err(txn_error)?;

            let mut expired = Vec::new();
            for result in handle.db.iter(&wtxn).map_err(txn_error)? {
                let (key, bytes) = result.map_err(txn_error)?;
                if Envelope::decode(bytes)?.is_expired_at(now) {
                    expired.push(key.to_vec());
                }
            }

            for key in &expired {
                handle.db.delete(&mut wtxn, key).map_err(txn_error)?;
            }

            wtxn.commit().map_err(txn_error)?;
            Ok::<_, StoreError>(expired.len() as u64)
        })?;

        debug!(path = %self.inner.path.display(), purged, "purged expired entries");
        Ok(purged)
    }

    /// Visit the value of every live key starting with `prefix`, in ascending
    /// key order.
    ///
    /// `f` returns [`Visit::Stop`] to end iteration early (the call still
    /// returns `Ok(())`). An error from `f` aborts iteration and is returned
    /// unchanged. Engine failures are converted into `E`.
    pub fn iterate_values<E, F>(&self, prefix: &[u8], mut f: F) -> Result<(), E>
    where
        E: From<StoreError>,
        F: FnMut(&[u8]) -> Result<Visit, E>,
    {
        self.scan(prefix, |_, envelope| f(envelope.value))
    }

    /// Visit every live key starting with `prefix`, in ascending order.
    ///
    /// Same stop and error rules as [`Store::iterate_values`]. Values are
    /// never copied; only their header is read to check expiry.
    pub fn iterate_keys<E, F>(&self, prefix: &[u8], mut f: F) -> Result<(), E>
    where
        E: From<StoreError>,
        F: FnMut(&[u8]) -> Result<Visit, E>,
    {
        self.scan(prefix, |key, _| f(key))
    }

    /// Two-phase read: `kfunc` sees each key and decides whether its value
    /// is handed to `vfunc`.
    ///
    /// [`KeyAction::Stop`] or [`Visit::Stop`] ends iteration cleanly; an
    /// error from either callback aborts it. `vfunc` is never called for a
    /// key that `kfunc` skipped.
    pub fn sparse_read<E, K, V>(&self, prefix: &[u8], mut kfunc: K, mut vfunc: V) -> Result<(), E>
    where
        E: From<StoreError>,
        K: FnMut(&[u8]) -> Result<KeyAction, E>,
        V: FnMut(&[u8]) -> Result<Visit, E>,
    {
        self.scan(prefix, |key, envelope| match kfunc(key)? {
            KeyAction::Skip => Ok(Visit::Continue),
            KeyAction::Stop => Ok(Visit::Stop),
            KeyAction::Fetch => vfunc(envelope.value),
        })
    }

    /// Walk live entries under `prefix` inside one read transaction.
    ///
    /// The cursor and transaction are dropped on every return path.
    fn scan<E, F>(&self, prefix: &[u8], mut visit: F) -> Result<(), E>
    where
        E: From<StoreError>,
        F: FnMut(&[u8], Envelope<'_>) -> Result<Visit, E>,
    {
        self.with_handle(|handle| {
            let rtxn = handle.env.read_txn().map_err(txn_error)?;
            let now = now_millis();

            for result in prefix_entries(handle, &rtxn, prefix)? {
                let (key, bytes) = result.map_err(txn_error)?;
                let envelope = Envelope::decode(bytes)?;
                if envelope.is_expired_at(now) {
                    continue;
                }
                if visit(key, envelope)?.is_stop() {
                    break;
                }
            }

            Ok(())
        })
    }

    fn put(
        &self,
        key: &[u8],
        value: &[u8],
        meta: u8,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        check_key(key)?;
        let bytes = Envelope::encode(value, meta, expires_at);

        self.with_handle(|handle| {
            let mut wtxn = handle.env.write_txn().map_err(txn_error)?;
            handle.db.put(&mut wtxn, key, &bytes).map_err(txn_error)?;
            wtxn.commit().map_err(txn_error)?;

            trace!(key_len = key.len(), value_len = value.len(), meta, "wrote entry");
            Ok(())
        })
    }

    /// Run `f` against the open handle, or fail with `Closed`.
    fn with_handle<T, E>(&self, f: impl FnOnce(&Handle) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let guard = self
            .inner
            .handle
            .read()
            .map_err(|_| StoreError::LockPoisoned)?;
        let handle = guard.as_ref().ok_or(StoreError::Closed)?;
        f(handle)
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.inner.path)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Iterator over raw entries under `prefix`. An empty prefix covers the
/// whole database (LMDB rejects zero-length seek keys); a prefix longer than
/// any storable key matches nothing.
fn prefix_entries<'txn>(
    handle: &Handle,
    rtxn: &'txn RoTxn,
    prefix: &[u8],
) -> Result<RawIter<'txn>, StoreError> {
    if prefix.is_empty() {
        let iter = handle.db.iter(rtxn).map_err(txn_error)?;
        return Ok(Box::new(iter));
    }

    if prefix.len() > MAX_KEY_LEN {
        return Ok(Box::new(std::iter::empty()));
    }

    let iter = handle.db.prefix_iter(rtxn, prefix).map_err(txn_error)?;
    Ok(Box::new(iter))
}

fn check_key(key: &[u8]) -> Result<(), StoreError> {
    if key.is_empty() {
        return Err(StoreError::InvalidKey {
            reason: "key must not be empty".to_string(),
        });
    }
    if key.len() > MAX_KEY_LEN {
        return Err(StoreError::InvalidKey {
            reason: format!("key is {} bytes, limit is {}", key.len(), MAX_KEY_LEN),
        });
    }
    Ok(())
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn txn_error(e: heed::Error) -> StoreError {
    StoreError::Transaction {
        reason: e.to_string(),
    }
}

fn open_error(path: &Path, e: impl fmt::Display) -> StoreError {
    StoreError::Open {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}
