//! Hierarchical Store Abstraction
//!
//! Trait-based abstraction over a tree of named keys, each holding named,
//! typed values (the shape of an OS registry).
//!
//! Implementations:
//! - `InMemoryStore`: For unit tests
//! - `LocalFsStore`: Directory tree with checksummed value files
//! - `SimulatedStore`: Fault injection wrapper for either of the above

use crate::storage::error::StoreError;
use crate::storage::path::KeyPath;

/// Type tag the store records next to a value's raw bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreType {
    /// NUL-terminated UTF-8 text
    String,
    /// 4-byte little-endian word. Holds both ints and bools.
    Word,
    /// Opaque bytes (written by foreign tools only)
    Binary,
}

impl StoreType {
    /// Numeric tag, matching the registry's REG_SZ / REG_BINARY / REG_DWORD
    pub fn tag(self) -> u32 {
        match self {
            StoreType::String => 1,
            StoreType::Binary => 3,
            StoreType::Word => 4,
        }
    }

    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            1 => Some(StoreType::String),
            3 => Some(StoreType::Binary),
            4 => Some(StoreType::Word),
            _ => None,
        }
    }
}

impl std::fmt::Display for StoreType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StoreType::String => "string",
            StoreType::Word => "word",
            StoreType::Binary => "binary",
        };
        f.write_str(name)
    }
}

/// A value as enumerated from a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredValue {
    pub name: String,
    pub data: Vec<u8>,
    pub store_type: StoreType,
}

/// Lazy sequence of values under a key
pub type ValueIter<'a> = Box<dyn Iterator<Item = Result<StoredValue, StoreError>> + Send + 'a>;

/// Lazy sequence of child key names under a key
pub type KeyIter<'a> = Box<dyn Iterator<Item = Result<String, StoreError>> + Send + 'a>;

/// Hierarchical key-value backend.
///
/// Paths passed to these methods are absolute (the configured root is
/// already applied).
pub trait PersistentStore: Send + Sync + 'static {
    /// Open handle to a key
    type Handle: Clone + Send + Sync + std::fmt::Debug;

    /// Open a key, creating it and any missing ancestors
    fn open_or_create(&self, path: &KeyPath) -> Result<Self::Handle, StoreError>;

    /// Open an existing key. Missing keys report `NotFound`.
    fn open(&self, path: &KeyPath) -> Result<Self::Handle, StoreError>;

    /// Release a handle
    fn close(&self, handle: Self::Handle);

    /// Read a value into `buf`, returning its length and type.
    ///
    /// When `buf` is too small the store reports `MoreData` with the
    /// required size and leaves `buf` unspecified.
    fn read_value(
        &self,
        handle: &Self::Handle,
        name: &str,
        buf: &mut [u8],
    ) -> Result<(usize, StoreType), StoreError>;

    /// Create or overwrite a value
    fn write_value(
        &self,
        handle: &Self::Handle,
        name: &str,
        data: &[u8],
        store_type: StoreType,
    ) -> Result<(), StoreError>;

    /// Delete a value. Missing values report `NotFound`.
    fn delete_value(&self, handle: &Self::Handle, name: &str) -> Result<(), StoreError>;

    /// Delete every value and descendant key of `path`. The key itself stays.
    fn delete_subtree(&self, path: &KeyPath) -> Result<(), StoreError>;

    /// Enumerate the values of a key
    fn enumerate_values<'a>(&'a self, handle: &'a Self::Handle) -> Result<ValueIter<'a>, StoreError>;

    /// Enumerate the names of a key's direct children
    fn enumerate_child_keys<'a>(&'a self, path: &KeyPath) -> Result<KeyIter<'a>, StoreError>;
}
