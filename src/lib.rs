pub mod options;
pub mod persistence;
pub mod storage;

#[cfg(test)]
mod stateright;

pub use options::{ErrorCode, OptionError, OptionTable, OptionsMap, RegOptionsManager, ValueType, VariantValue};
pub use persistence::{OptionStore, StoreConfig};
pub use storage::{InMemoryStore, KeyPath, LocalFsStore, PersistentStore, SimulatedStore, StoreError};
