//! In-memory store for unit tests and deterministic scenarios

use crate::storage::error::StoreError;
use crate::storage::path::KeyPath;
use crate::storage::store::{KeyIter, PersistentStore, StoreType, StoredValue, ValueIter};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
struct KeyNode {
    /// Distinguishes a recreated key from the one a stale handle points at
    generation: u64,
    values: BTreeMap<String, (StoreType, Vec<u8>)>,
}

#[derive(Debug, Default)]
struct Tree {
    keys: BTreeMap<KeyPath, KeyNode>,
    next_generation: u64,
}

impl Tree {
    fn create(&mut self, path: &KeyPath) -> u64 {
        // Ancestors first, like RegCreateKeyEx
        if let Some(parent) = path.parent() {
            if !parent.is_root() && !self.keys.contains_key(&parent) {
                self.create(&parent);
            }
        }
        if let Some(node) = self.keys.get(path) {
            return node.generation;
        }
        self.next_generation += 1;
        let generation = self.next_generation;
        self.keys.insert(
            path.clone(),
            KeyNode {
                generation,
                values: BTreeMap::new(),
            },
        );
        generation
    }

    fn node(&self, handle: &InMemoryHandle) -> Result<&KeyNode, StoreError> {
        self.keys
            .get(&handle.path)
            .filter(|n| n.generation == handle.generation)
            .ok_or_else(|| StoreError::KeyDeleted(handle.path.to_string()))
    }

    fn node_mut(&mut self, handle: &InMemoryHandle) -> Result<&mut KeyNode, StoreError> {
        self.keys
            .get_mut(&handle.path)
            .filter(|n| n.generation == handle.generation)
            .ok_or_else(|| StoreError::KeyDeleted(handle.path.to_string()))
    }
}

/// Handle into an `InMemoryStore`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InMemoryHandle {
    path: KeyPath,
    generation: u64,
}

impl InMemoryHandle {
    pub fn path(&self) -> &KeyPath {
        &self.path
    }
}

/// In-memory hierarchical store. Clones share the same tree.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tree: Arc<RwLock<Tree>>,
    open_calls: Arc<AtomicU64>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open/create calls that reached the store (for testing)
    pub fn open_calls(&self) -> u64 {
        self.open_calls.load(Ordering::SeqCst)
    }

    /// Number of keys in the tree (for testing)
    pub fn key_count(&self) -> usize {
        self.tree.read().keys.len()
    }

    pub fn contains_key(&self, path: &KeyPath) -> bool {
        self.tree.read().keys.contains_key(path)
    }

    /// Raw value lookup that bypasses handles (for testing)
    pub fn value(&self, path: &KeyPath, name: &str) -> Option<(StoreType, Vec<u8>)> {
        self.tree
            .read()
            .keys
            .get(path)
            .and_then(|node| node.values.get(name).cloned())
    }

    /// Every value in the tree keyed by its full option name (for testing)
    pub fn snapshot(&self) -> BTreeMap<String, (StoreType, Vec<u8>)> {
        let tree = self.tree.read();
        let mut out = BTreeMap::new();
        for (path, node) in &tree.keys {
            for (name, value) in &node.values {
                out.insert(path.option_name(name), value.clone());
            }
        }
        out
    }

    /// Drop every key (for testing)
    pub fn clear(&self) {
        self.tree.write().keys.clear();
    }
}

impl PersistentStore for InMemoryStore {
    type Handle = InMemoryHandle;

    fn open_or_create(&self, path: &KeyPath) -> Result<Self::Handle, StoreError> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        let generation = self.tree.write().create(path);
        Ok(InMemoryHandle {
            path: path.clone(),
            generation,
        })
    }

    fn open(&self, path: &KeyPath) -> Result<Self::Handle, StoreError> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        self.tree
            .read()
            .keys
            .get(path)
            .map(|node| InMemoryHandle {
                path: path.clone(),
                generation: node.generation,
            })
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    fn close(&self, _handle: Self::Handle) {}

    fn read_value(
        &self,
        handle: &Self::Handle,
        name: &str,
        buf: &mut [u8],
    ) -> Result<(usize, StoreType), StoreError> {
        let tree = self.tree.read();
        let node = tree.node(handle)?;
        let (store_type, data) = node
            .values
            .get(name)
            .ok_or_else(|| StoreError::NotFound(handle.path.option_name(name)))?;
        if data.len() > buf.len() {
            return Err(StoreError::MoreData {
                required: data.len(),
            });
        }
        buf[..data.len()].copy_from_slice(data);
        Ok((data.len(), *store_type))
    }

    fn write_value(
        &self,
        handle: &Self::Handle,
        name: &str,
        data: &[u8],
        store_type: StoreType,
    ) -> Result<(), StoreError> {
        let mut tree = self.tree.write();
        let node = tree.node_mut(handle)?;
        node.values
            .insert(name.to_string(), (store_type, data.to_vec()));
        Ok(())
    }

    fn delete_value(&self, handle: &Self::Handle, name: &str) -> Result<(), StoreError> {
        let mut tree = self.tree.write();
        let node = tree.node_mut(handle)?;
        node.values
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(handle.path.option_name(name)))
    }

    fn delete_subtree(&self, path: &KeyPath) -> Result<(), StoreError> {
        let mut tree = self.tree.write();
        match tree.keys.get_mut(path) {
            Some(node) => node.values.clear(),
            None => return Err(StoreError::NotFound(path.to_string())),
        }
        tree.keys.retain(|k, _| !k.is_descendant_of(path));
        Ok(())
    }

    fn enumerate_values<'a>(&'a self, handle: &'a Self::Handle) -> Result<ValueIter<'a>, StoreError> {
        let tree = self.tree.read();
        let values: Vec<StoredValue> = tree
            .node(handle)?
            .values
            .iter()
            .map(|(name, (store_type, data))| StoredValue {
                name: name.clone(),
                data: data.clone(),
                store_type: *store_type,
            })
            .collect();
        Ok(Box::new(values.into_iter().map(Ok)))
    }

    fn enumerate_child_keys<'a>(&'a self, path: &KeyPath) -> Result<KeyIter<'a>, StoreError> {
        let tree = self.tree.read();
        if !path.is_root() && !tree.keys.contains_key(path) {
            return Err(StoreError::NotFound(path.to_string()));
        }
        let children: Vec<String> = tree
            .keys
            .keys()
            .filter(|k| k.parent().as_ref() == Some(path))
            .map(|k| k.name().to_string())
            .collect();
        Ok(Box::new(children.into_iter().map(Ok)))
    }
}
