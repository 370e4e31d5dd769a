//! Store Configuration
//!
//! Configuration for an option store: where its root lives, which backend
//! holds it, and how the export file is laid out. Loadable from TOML, with
//! environment overrides:
//!
//! - `REGOPTS_ROOT`: store root (normalised under the namespace prefix)
//! - `REGOPTS_PATH`: base directory of the local filesystem backend

use crate::persistence::ini::IniSections;
use crate::storage::KeyPath;
use serde::{Deserialize, Serialize};
use std::io::Error as IoError;
use std::path::{Path, PathBuf};

/// Which `PersistentStore` implementation backs the option store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendType {
    /// Volatile, process-local tree
    InMemory,
    /// Directory tree under `local_path`
    LocalFs,
}

impl Default for BackendType {
    fn default() -> Self {
        BackendType::LocalFs
    }
}

/// Configuration for an option store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store root for all option names
    pub root: String,
    /// Prefix the root is normalised under (default: "Software")
    pub namespace_prefix: String,
    /// Backend holding the store
    pub backend: BackendType,
    /// Base directory for the local filesystem backend
    pub local_path: PathBuf,
    /// Keep key handles cached between operations (default: true)
    pub keep_handles_open: bool,
    /// First read attempt buffer size in bytes (default: 256)
    pub initial_read_buffer: usize,
    /// Export file section holding values
    pub values_section: String,
    /// Export file section holding type tags
    pub types_section: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            root: "RegOpts".to_string(),
            namespace_prefix: "Software".to_string(),
            backend: BackendType::LocalFs,
            local_path: PathBuf::from("regopts-store"),
            keep_handles_open: true,
            initial_read_buffer: 256,
            values_section: "Options".to_string(),
            types_section: "Options.TypeInfo".to_string(),
        }
    }
}

impl StoreConfig {
    /// Configuration for testing (in-memory, tiny read buffer so the
    /// resize path is exercised)
    pub fn test() -> Self {
        StoreConfig {
            root: "RegOptsTest".to_string(),
            backend: BackendType::InMemory,
            initial_read_buffer: 8,
            ..Default::default()
        }
    }

    /// Local filesystem configuration rooted at `local_path`
    pub fn local(local_path: PathBuf) -> Self {
        StoreConfig {
            backend: BackendType::LocalFs,
            local_path,
            ..Default::default()
        }
    }

    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = root.into();
        self
    }

    /// Parse TOML. Missing fields take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: StoreConfig =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Apply `REGOPTS_ROOT` and `REGOPTS_PATH` when set
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(root) = std::env::var("REGOPTS_ROOT") {
            self.root = root;
        }
        if let Ok(path) = std::env::var("REGOPTS_PATH") {
            self.local_path = PathBuf::from(path);
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_read_buffer == 0 {
            return Err(ConfigError::Invalid(
                "initial_read_buffer must be greater than zero".to_string(),
            ));
        }
        if self.values_section.eq_ignore_ascii_case(&self.types_section) {
            return Err(ConfigError::Invalid(
                "values_section and types_section must differ".to_string(),
            ));
        }
        Ok(())
    }

    /// Root normalised under the namespace prefix
    pub fn normalized_root(&self) -> KeyPath {
        KeyPath::normalize_root(&self.root, &self.namespace_prefix)
    }

    /// Section names for the export file
    pub fn sections(&self) -> IniSections {
        IniSections {
            values: self.values_section.clone(),
            types: self.types_section.clone(),
        }
    }
}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
    Io(IoError),
    Parse(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Config I/O error: {}", e),
            ConfigError::Parse(msg) => write!(f, "Config parse error: {}", msg),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<IoError> for ConfigError {
    fn from(e: IoError) -> Self {
        ConfigError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.namespace_prefix, "Software");
        assert!(config.keep_handles_open);
        assert_eq!(config.initial_read_buffer, 256);
        assert_eq!(config.sections(), IniSections::default());
        assert_eq!(config.normalized_root().as_str(), "Software\\RegOpts");
    }

    #[test]
    fn test_from_toml_partial() {
        let config = StoreConfig::from_toml_str(
            r#"
            root = "Acme\\Editor"
            backend = "in_memory"
            keep_handles_open = false
            "#,
        )
        .unwrap();
        assert_eq!(config.backend, BackendType::InMemory);
        assert!(!config.keep_handles_open);
        assert_eq!(config.initial_read_buffer, 256);
        assert_eq!(config.normalized_root().as_str(), "Software\\Acme\\Editor");
    }

    #[test]
    fn test_from_toml_rejects_bad_input() {
        assert!(matches!(
            StoreConfig::from_toml_str("initial_read_buffer = \"big\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            StoreConfig::from_toml_str("initial_read_buffer = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            StoreConfig::from_toml_str("types_section = \"options\""),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = StoreConfig::load(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_config_serialization() {
        let config = StoreConfig::local(PathBuf::from("/tmp/opts")).with_root("Acme");
        let json = serde_json::to_string(&config).unwrap();
        let parsed: StoreConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);

        let text = toml::to_string(&config).unwrap();
        assert_eq!(StoreConfig::from_toml_str(&text).unwrap(), config);
    }
}
