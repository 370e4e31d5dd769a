//! Options: typed values, the option table and the manager front end

pub mod error;
pub mod manager;
pub mod table;
pub mod value;

pub use error::{ErrorCode, OptionError};
pub use manager::RegOptionsManager;
pub use table::{OptionEntry, OptionTable, OptionsMap};
pub use value::{ValueType, VariantValue};
