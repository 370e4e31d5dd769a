//! Persistence engine
//!
//! Everything between the option table and a `PersistentStore`: the value
//! codec, the key handle cache, the asynchronous write queue, the store
//! accessor and the import/export reconciler.

pub mod codec;
pub mod config;
pub mod handle_cache;
pub mod ini;
pub mod option_store;
pub mod reconciler;
pub mod write_queue;

pub use codec::{CodecError, ValueCodec};
pub use config::{BackendType, ConfigError, StoreConfig};
pub use handle_cache::KeyHandleCache;
pub use ini::{IniDocument, IniSections};
pub use option_store::OptionStore;
pub use reconciler::{ExportStats, ImportStats};
pub use write_queue::{AsyncWriteQueue, PendingWrite, WriteSink};
