//! Hierarchical store backends
//!
//! The `PersistentStore` trait plus three implementations: an in-memory
//! fake, a directory-tree backend and a fault-injecting wrapper.

pub mod error;
pub mod in_memory;
pub mod local_fs;
pub mod path;
pub mod simulated;
pub mod store;

pub use error::StoreError;
pub use in_memory::{InMemoryHandle, InMemoryStore};
pub use local_fs::{LocalFsHandle, LocalFsStore};
pub use path::{KeyPath, KEY_SEPARATOR, NAME_SEPARATOR};
pub use simulated::{SimulatedStore, SimulatedStoreConfig, SimulatedStoreStats};
pub use store::{KeyIter, PersistentStore, StoreType, StoredValue, ValueIter};
