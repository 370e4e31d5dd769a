//! Key Handle Cache
//!
//! Caches one open store handle per relative key path, so that repeated
//! access to the same key does not reopen it. Entries leave the cache only
//! through an explicit release, `close_all`, or descendant eviction after a
//! subtree delete.
//!
//! The cache is not synchronised itself; the owner keeps it behind the
//! single lock it shares with the write worker.

use crate::storage::{KeyPath, PersistentStore, StoreError};
use std::collections::HashMap;
use tracing::debug;

pub struct KeyHandleCache<S: PersistentStore> {
    /// Absolute root every cached path is relative to
    root: KeyPath,
    handles: HashMap<KeyPath, S::Handle>,
}

impl<S: PersistentStore> KeyHandleCache<S> {
    pub fn new(root: KeyPath) -> Self {
        KeyHandleCache {
            root,
            handles: HashMap::new(),
        }
    }

    pub fn root(&self) -> &KeyPath {
        &self.root
    }

    /// Absolute path of a relative key path
    pub fn full_path(&self, path: &KeyPath) -> KeyPath {
        self.root.join(path)
    }

    /// Cached handle for `path`, opening (or creating) the key on a miss
    pub fn get(
        &mut self,
        store: &S,
        path: &KeyPath,
        create_if_missing: bool,
    ) -> Result<S::Handle, StoreError> {
        if let Some(handle) = self.handles.get(path) {
            return Ok(handle.clone());
        }

        let full = self.full_path(path);
        let handle = if create_if_missing {
            store.open_or_create(&full)?
        } else {
            store.open(&full)?
        };
        debug!(path = %full, "Opened key");
        self.handles.insert(path.clone(), handle.clone());
        Ok(handle)
    }

    /// Close and evict one entry. Returns true if it was cached.
    pub fn release(&mut self, store: &S, path: &KeyPath) -> bool {
        match self.handles.remove(path) {
            Some(handle) => {
                store.close(handle);
                true
            }
            None => false,
        }
    }

    /// Close and evict every entry
    pub fn close_all(&mut self, store: &S) {
        let count = self.handles.len();
        for (_, handle) in self.handles.drain() {
            store.close(handle);
        }
        if count > 0 {
            debug!(count, "Closed cached key handles");
        }
    }

    /// Close and evict every entry strictly below `path`
    pub fn evict_descendants(&mut self, store: &S, path: &KeyPath) -> usize {
        let stale: Vec<KeyPath> = self
            .handles
            .keys()
            .filter(|cached| cached.is_descendant_of(path))
            .cloned()
            .collect();
        for cached in &stale {
            if let Some(handle) = self.handles.remove(cached) {
                store.close(handle);
            }
        }
        stale.len()
    }

    pub fn contains(&self, path: &KeyPath) -> bool {
        self.handles.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;

    fn setup() -> (InMemoryStore, KeyHandleCache<InMemoryStore>) {
        let store = InMemoryStore::new();
        let cache = KeyHandleCache::new(KeyPath::parse("Software\\Test"));
        (store, cache)
    }

    #[test]
    fn test_get_reuses_handle() {
        let (store, mut cache) = setup();
        let path = KeyPath::parse("Settings");

        let first = cache.get(&store, &path, true).unwrap();
        let second = cache.get(&store, &path, true).unwrap();

        assert_eq!(first, second);
        assert_eq!(store.open_calls(), 1);
        assert_eq!(first.path().as_str(), "Software\\Test\\Settings");
    }

    #[test]
    fn test_get_without_create() {
        let (store, mut cache) = setup();
        let result = cache.get(&store, &KeyPath::parse("Missing"), false);
        assert!(matches!(result, Err(StoreError::NotFound(_))));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_release_reopens() {
        let (store, mut cache) = setup();
        let path = KeyPath::parse("Settings");
        cache.get(&store, &path, true).unwrap();

        assert!(cache.release(&store, &path));
        assert!(!cache.release(&store, &path));
        cache.get(&store, &path, true).unwrap();
        assert_eq!(store.open_calls(), 2);
    }

    #[test]
    fn test_evict_descendants_only() {
        let (store, mut cache) = setup();
        for raw in ["A", "A\\B", "A\\B\\C", "AB"] {
            cache.get(&store, &KeyPath::parse(raw), true).unwrap();
        }

        let evicted = cache.evict_descendants(&store, &KeyPath::parse("A"));
        assert_eq!(evicted, 2);
        assert!(cache.contains(&KeyPath::parse("A")));
        assert!(cache.contains(&KeyPath::parse("AB")));
        assert!(!cache.contains(&KeyPath::parse("A\\B")));
    }

    #[test]
    fn test_close_all() {
        let (store, mut cache) = setup();
        cache.get(&store, &KeyPath::parse("A"), true).unwrap();
        cache.get(&store, &KeyPath::root(), true).unwrap();
        assert_eq!(cache.len(), 2);

        cache.close_all(&store);
        assert!(cache.is_empty());
    }
}
