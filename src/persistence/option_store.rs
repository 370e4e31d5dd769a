//! Option Store
//!
//! Ties a `PersistentStore`, its key handle cache and the write worker
//! together. Every cache mutation and every physical write happens under
//! one lock, shared by callers and the worker.
//!
//! Ordering rules:
//! - writes from one caller are applied in the order they were posted
//! - a synchronous read may miss a write still in the queue; flush first
//!   when freshness matters
//! - `remove` flushes before deleting, so an earlier queued write can never
//!   resurrect the deleted value

use crate::options::error::OptionError;
use crate::options::table::OptionTable;
use crate::options::value::{ValueType, VariantValue};
use crate::persistence::codec::ValueCodec;
use crate::persistence::config::StoreConfig;
use crate::persistence::handle_cache::KeyHandleCache;
use crate::persistence::ini::{IniDocument, IniSections};
use crate::persistence::reconciler::{self, ExportStats, ImportStats};
use crate::persistence::write_queue::{AsyncWriteQueue, PendingWrite, WriteSink};
use crate::storage::{KeyPath, PersistentStore, StoreError, StoreType, StoredValue};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, info};

/// State shared between callers and the write worker
struct StoreCore<S: PersistentStore> {
    store: S,
    root: KeyPath,
    cache: Mutex<KeyHandleCache<S>>,
    keep_handles_open: bool,
    initial_read_buffer: usize,
}

impl<S: PersistentStore> StoreCore<S> {
    /// Run `op` against the key at `path`. The caller holds the cache lock.
    ///
    /// A handle whose key vanished is reopened once. Without
    /// `keep_handles_open` the handle is released afterwards.
    fn with_key<T>(
        &self,
        cache: &mut KeyHandleCache<S>,
        path: &KeyPath,
        create: bool,
        mut op: impl FnMut(&S::Handle) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let handle = cache.get(&self.store, path, create)?;
        let result = match op(&handle) {
            Err(StoreError::KeyDeleted(_)) => {
                debug!(path = %path, "Cached handle went stale, reopening");
                cache.release(&self.store, path);
                cache
                    .get(&self.store, path, create)
                    .and_then(|handle| op(&handle))
            }
            other => other,
        };
        if !self.keep_handles_open {
            cache.release(&self.store, path);
        }
        result
    }

    fn write_locked(
        &self,
        cache: &mut KeyHandleCache<S>,
        name: &str,
        value: &VariantValue,
    ) -> Result<(), OptionError> {
        let (bytes, store_type) = ValueCodec::encode(value).map_err(|e| e.for_option(name))?;
        let (path, value_name) = KeyPath::split_option_name(name);
        self.with_key(cache, &path, true, |handle| {
            self.store
                .write_value(handle, &value_name, &bytes, store_type)
        })
        .map_err(|e| OptionError::Generic(format!("write {}: {}", name, e)))
    }
}

impl<S: PersistentStore> WriteSink for StoreCore<S> {
    fn apply(&self, write: PendingWrite) {
        let mut cache = self.cache.lock();
        if let Err(e) = self.write_locked(&mut cache, &write.name, &write.value) {
            error!(name = %write.name, error = %e, "Async write failed");
        }
    }
}

/// Accessor for one store root
pub struct OptionStore<S: PersistentStore> {
    core: Arc<StoreCore<S>>,
    queue: AsyncWriteQueue,
}

impl<S: PersistentStore> OptionStore<S> {
    /// Open the configured root (creating it if missing) and start the
    /// write worker
    pub fn open(store: S, config: &StoreConfig) -> Result<Self, OptionError> {
        config
            .validate()
            .map_err(|e| OptionError::Generic(e.to_string()))?;

        let root = config.normalized_root();
        let handle = store
            .open_or_create(&root)
            .map_err(|e| OptionError::Generic(format!("create root {}: {}", root, e)))?;
        store.close(handle);

        let core = Arc::new(StoreCore {
            store,
            root: root.clone(),
            cache: Mutex::new(KeyHandleCache::new(root.clone())),
            keep_handles_open: config.keep_handles_open,
            initial_read_buffer: config.initial_read_buffer.max(1),
        });
        let queue = AsyncWriteQueue::spawn(Arc::clone(&core))?;

        info!(root = %root, keep_handles_open = config.keep_handles_open, "Option store opened");
        Ok(OptionStore { core, queue })
    }

    /// Absolute root all option names are relative to
    pub fn root(&self) -> &KeyPath {
        &self.core.root
    }

    /// Underlying backend
    pub fn backend(&self) -> &S {
        &self.core.store
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Queue a write. Failures are logged by the worker, never returned.
    pub fn write_async(&self, name: &str, value: VariantValue) {
        self.queue.write_async(PendingWrite::new(name, value));
    }

    /// Write immediately under the lock, bypassing the queue
    pub fn write_sync(&self, name: &str, value: &VariantValue) -> Result<(), OptionError> {
        let mut cache = self.core.cache.lock();
        self.core.write_locked(&mut cache, name, value)
    }

    /// Block until every write queued before this call has been applied
    pub fn flush(&self) {
        self.queue.flush();
    }

    pub fn pending_writes(&self) -> usize {
        self.queue.pending()
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Raw stored bytes and type of `name`, or `None` if the key or value
    /// does not exist. A short first buffer is resized and retried once.
    pub fn read_raw(&self, name: &str) -> Result<Option<(Vec<u8>, StoreType)>, OptionError> {
        let (path, value_name) = KeyPath::split_option_name(name);
        let core = &self.core;
        let mut buf = vec![0u8; core.initial_read_buffer];

        let mut cache = core.cache.lock();
        let result = core.with_key(&mut cache, &path, false, |handle| {
            match core.store.read_value(handle, &value_name, &mut buf) {
                Err(StoreError::MoreData { required }) => {
                    buf.resize(required, 0);
                    core.store.read_value(handle, &value_name, &mut buf)
                }
                other => other,
            }
        });
        drop(cache);

        match result {
            Ok((len, store_type)) => {
                buf.truncate(len);
                Ok(Some((buf, store_type)))
            }
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(OptionError::Generic(format!("read {}: {}", name, e))),
        }
    }

    /// Read `name` decoded as `expected`. Absent values report `NotFound`.
    pub fn read(&self, name: &str, expected: ValueType) -> Result<VariantValue, OptionError> {
        match self.read_raw(name)? {
            Some((bytes, store_type)) => {
                ValueCodec::decode(&bytes, store_type, expected).map_err(|e| e.for_option(name))
            }
            None => Err(OptionError::NotFound(name.to_string())),
        }
    }

    /// Every value under the root, in key order
    pub fn list(&self) -> Result<Vec<(String, StoredValue)>, OptionError> {
        self.flush();
        let mut out = Vec::new();
        reconciler::walk_values(&self.core.store, &self.core.root, &mut |name, value| {
            out.push((name.to_string(), value.clone()));
        })
        .map_err(|e| OptionError::Generic(format!("list: {}", e)))?;
        Ok(out)
    }

    // =========================================================================
    // Deletes
    // =========================================================================

    /// Delete a value, or with a name ending in `/` every value and subkey
    /// of that key. Flushes the queue first. Deleting something that does
    /// not exist succeeds.
    pub fn remove(&self, name: &str) -> Result<(), OptionError> {
        self.queue.flush();

        let (path, value_name) = KeyPath::split_option_name(name);
        let core = &self.core;
        let mut cache = core.cache.lock();

        let result = if value_name.is_empty() {
            let full = cache.full_path(&path);
            let deleted = core.store.delete_subtree(&full);
            let evicted = cache.evict_descendants(&core.store, &path);
            debug!(path = %full, evicted, "Deleted subtree");
            deleted
        } else {
            core.with_key(&mut cache, &path, false, |handle| {
                core.store.delete_value(handle, &value_name)
            })
        };

        match result {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(OptionError::Generic(format!("remove {}: {}", name, e))),
        }
    }

    // =========================================================================
    // Handles and lifecycle
    // =========================================================================

    /// Close every cached key handle
    pub fn close_keys(&self) {
        self.core.cache.lock().close_all(&self.core.store);
    }

    /// Number of cached key handles
    pub fn cached_handles(&self) -> usize {
        self.core.cache.lock().len()
    }

    /// Stop the worker (applying everything already queued) and close
    /// every handle. Idempotent.
    pub fn shutdown(&mut self) {
        if self.queue.is_running() {
            self.queue.shutdown();
            self.close_keys();
            debug!(root = %self.core.root, "Option store shut down");
        }
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    /// Export every stored value the table does not manage into `doc`
    pub fn export_unmanaged<T: OptionTable + ?Sized>(
        &self,
        doc: &mut IniDocument,
        table: &T,
        sections: &IniSections,
    ) -> Result<ExportStats, OptionError> {
        self.flush();
        reconciler::export_unmanaged(
            &self.core.store,
            &self.core.root,
            |name| reconciler::is_managed(table, name),
            doc,
            sections,
        )
    }

    /// Write every typed entry of `doc` the table does not manage straight
    /// into the store
    pub fn import_unmanaged<T: OptionTable + ?Sized>(
        &self,
        doc: &IniDocument,
        table: &T,
        sections: &IniSections,
    ) -> ImportStats {
        self.flush();
        reconciler::import_unmanaged(
            doc,
            sections,
            |name| reconciler::is_managed(table, name),
            |name, value| self.write_sync(name, value),
        )
    }
}

impl<S: PersistentStore> Drop for OptionStore<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
