//! Registry-style Options Manager
//!
//! Front end combining an option table with an `OptionStore`. Setters update
//! the table and queue a store write; initialisation reads the stored value
//! synchronously. With serializing turned off the store is never touched.

use crate::options::error::OptionError;
use crate::options::table::{OptionTable, OptionsMap};
use crate::options::value::VariantValue;
use crate::persistence::config::StoreConfig;
use crate::persistence::ini::{IniDocument, IniSections};
use crate::persistence::option_store::OptionStore;
use crate::persistence::reconciler::{ExportStats, ImportStats};
use crate::storage::{KeyPath, PersistentStore};
use std::path::Path;
use tracing::{debug, info};

pub struct RegOptionsManager<S: PersistentStore, T: OptionTable = OptionsMap> {
    table: T,
    store: OptionStore<S>,
    sections: IniSections,
    serializing: bool,
}

impl<S: PersistentStore> RegOptionsManager<S, OptionsMap> {
    /// Open a manager with an empty `OptionsMap`
    pub fn open(store: S, config: &StoreConfig) -> Result<Self, OptionError> {
        Self::with_table(store, config, OptionsMap::new())
    }
}

impl<S: PersistentStore, T: OptionTable> RegOptionsManager<S, T> {
    pub fn with_table(store: S, config: &StoreConfig, table: T) -> Result<Self, OptionError> {
        Ok(RegOptionsManager {
            table,
            store: OptionStore::open(store, config)?,
            sections: config.sections(),
            serializing: true,
        })
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    pub fn store(&self) -> &OptionStore<S> {
        &self.store
    }

    pub fn get(&self, name: &str) -> Option<&VariantValue> {
        self.table.get(name)
    }

    pub fn is_serializing(&self) -> bool {
        self.serializing
    }

    pub fn set_serializing(&mut self, serializing: bool) {
        self.serializing = serializing;
    }

    /// Add an option and load its stored value.
    ///
    /// A value already in the store replaces the default (a type mismatch
    /// keeps the default and reports `WrongType`). With nothing stored the
    /// default is queued for writing.
    pub fn init_option(
        &mut self,
        name: &str,
        default: impl Into<VariantValue>,
    ) -> Result<(), OptionError> {
        let default = default.into();
        if default.is_null() {
            return Err(OptionError::Generic(format!("null default for {}", name)));
        }
        self.table.add(name, default.clone())?;
        if !self.serializing {
            return Ok(());
        }

        match self.store.read(name, default.value_type()) {
            Ok(stored) => self.table.set(name, stored),
            Err(OptionError::NotFound(_)) => {
                self.store.write_async(name, default);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Add an option that is never loaded from the store
    pub fn init_transient(
        &mut self,
        name: &str,
        default: impl Into<VariantValue>,
    ) -> Result<(), OptionError> {
        self.table.add(name, default.into())
    }

    /// Queue a write of the option's current value
    pub fn save_option(&self, name: &str) -> Result<(), OptionError> {
        if !self.serializing {
            return Ok(());
        }
        match self.table.get(name) {
            Some(value) if !value.is_null() => {
                self.store.write_async(name, value.clone());
                Ok(())
            }
            _ => Err(OptionError::NotFound(name.to_string())),
        }
    }

    /// Set the option (type checked) and queue the write
    pub fn save_option_value(
        &mut self,
        name: &str,
        value: impl Into<VariantValue>,
    ) -> Result<(), OptionError> {
        self.table.set(name, value.into())?;
        self.save_option(name)
    }

    /// Remove an option from the table and the store.
    ///
    /// A name ending in `/` removes every option below that path and the
    /// whole key from the store.
    pub fn remove_option(&mut self, name: &str) -> Result<(), OptionError> {
        let (_, value_name) = KeyPath::split_option_name(name);
        let table_result = if value_name.is_empty() {
            let doomed: Vec<String> = self
                .table
                .names()
                .into_iter()
                .filter(|n| n.len() > name.len() && n.starts_with(name))
                .collect();
            for option in &doomed {
                self.table.remove(option)?;
            }
            debug!(prefix = %name, removed = doomed.len(), "Removed options below path");
            Ok(())
        } else {
            self.table.remove(name)
        };

        if self.serializing {
            self.store.remove(name)?;
        }
        table_result
    }

    /// Wait until every queued write has been applied
    pub fn flush_options(&self) {
        self.store.flush();
    }

    /// Export unmanaged store values, then the table's own options, into
    /// `path`. The file is saved even when the unmanaged pass fails part way.
    pub fn export_options(&self, path: &Path) -> Result<ExportStats, OptionError> {
        let mut doc = IniDocument::load(path)?;
        let result = self
            .store
            .export_unmanaged(&mut doc, &self.table, &self.sections)
            .map(|mut stats| {
                stats.managed_exported = self.table.export_to(&mut doc, &self.sections);
                stats
            });
        doc.save(path)?;

        if let Ok(stats) = &result {
            info!(
                path = %path.display(),
                unmanaged = stats.exported,
                managed = stats.managed_exported,
                "Exported options"
            );
        }
        result
    }

    /// Import unmanaged entries into the store, then update the table's own
    /// options from the file and queue writes for the ones that changed.
    pub fn import_options(&mut self, path: &Path) -> Result<ImportStats, OptionError> {
        let doc = IniDocument::load(path)?;
        let mut stats = if self.serializing {
            self.store.import_unmanaged(&doc, &self.table, &self.sections)
        } else {
            ImportStats::default()
        };

        let changed = self.table.import_from(&doc, &self.sections);
        stats.managed_updated = changed.len();
        for name in &changed {
            self.save_option(name)?;
        }

        info!(
            path = %path.display(),
            unmanaged = stats.imported,
            managed = stats.managed_updated,
            "Imported options"
        );
        Ok(stats)
    }

    /// Close every cached key handle
    pub fn close_keys(&self) {
        self.store.close_keys();
    }

    /// Apply all queued writes and stop the worker
    pub fn shutdown(&mut self) {
        self.store.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::value::ValueType;
    use crate::storage::InMemoryStore;

    fn manager() -> (InMemoryStore, RegOptionsManager<InMemoryStore>) {
        let backend = InMemoryStore::new();
        let mgr = RegOptionsManager::open(backend.clone(), &StoreConfig::test()).unwrap();
        (backend, mgr)
    }

    #[test]
    fn test_init_option_persists_default() {
        let (_backend, mut mgr) = manager();
        mgr.init_option("Settings/Width", 100).unwrap();
        mgr.flush_options();

        assert_eq!(
            mgr.store().read("Settings/Width", ValueType::Int).unwrap(),
            VariantValue::Int(100)
        );
        assert_eq!(mgr.get("Settings/Width"), Some(&VariantValue::Int(100)));
    }

    #[test]
    fn test_init_option_loads_stored_value() {
        let (_backend, mut mgr) = manager();
        mgr.store()
            .write_sync("Settings/Title", &VariantValue::from("stored"))
            .unwrap();

        mgr.init_option("Settings/Title", "default").unwrap();
        assert_eq!(mgr.get("Settings/Title"), Some(&VariantValue::from("stored")));
    }

    #[test]
    fn test_init_option_wrong_type_keeps_default() {
        let (_backend, mut mgr) = manager();
        mgr.store()
            .write_sync("Settings/Width", &VariantValue::from("wide"))
            .unwrap();

        let err = mgr.init_option("Settings/Width", 100).unwrap_err();
        assert!(matches!(err, OptionError::WrongType { .. }));
        assert_eq!(mgr.get("Settings/Width"), Some(&VariantValue::Int(100)));
    }

    #[test]
    fn test_init_option_rejects_null_and_duplicates() {
        let (_backend, mut mgr) = manager();
        assert!(mgr.init_option("A/x", VariantValue::Null).is_err());
        mgr.init_option("A/x", true).unwrap();
        assert!(mgr.init_option("A/x", false).is_err());
    }

    #[test]
    fn test_bool_roundtrip_through_word() {
        let (_backend, mut mgr) = manager();
        mgr.init_option("Settings/Wrap", false).unwrap();
        mgr.save_option_value("Settings/Wrap", true).unwrap();
        mgr.flush_options();

        assert_eq!(
            mgr.store().read("Settings/Wrap", ValueType::Bool).unwrap(),
            VariantValue::Bool(true)
        );
    }

    #[test]
    fn test_save_option_errors() {
        let (_backend, mut mgr) = manager();
        assert!(mgr.save_option("Missing/x").unwrap_err().is_not_found());

        mgr.init_option("Settings/Width", 100).unwrap();
        let err = mgr.save_option_value("Settings/Width", "wide").unwrap_err();
        assert!(matches!(err, OptionError::WrongType { .. }));
    }

    #[test]
    fn test_not_serializing_leaves_store_alone() {
        let (backend, mut mgr) = manager();
        mgr.set_serializing(false);
        mgr.init_option("Settings/Width", 100).unwrap();
        mgr.save_option_value("Settings/Width", 5).unwrap();
        mgr.flush_options();

        assert!(backend.snapshot().is_empty());
        assert_eq!(mgr.get("Settings/Width"), Some(&VariantValue::Int(5)));
    }

    #[test]
    fn test_init_transient_not_persisted() {
        let (backend, mut mgr) = manager();
        mgr.init_transient("Session/Token", "abc").unwrap();
        mgr.flush_options();
        assert!(backend.snapshot().is_empty());
        assert!(mgr.table().contains("Session/Token"));
    }

    #[test]
    fn test_remove_option_by_prefix() {
        let (_backend, mut mgr) = manager();
        mgr.init_option("Diff/Color", 1).unwrap();
        mgr.init_option("Diff/Size", 2).unwrap();
        mgr.init_option("Diffs/Other", 3).unwrap();
        mgr.flush_options();

        mgr.remove_option("Diff/").unwrap();

        assert!(!mgr.table().contains("Diff/Color"));
        assert!(!mgr.table().contains("Diff/Size"));
        assert!(mgr.table().contains("Diffs/Other"));
        assert!(mgr
            .store()
            .read("Diff/Color", ValueType::Int)
            .unwrap_err()
            .is_not_found());
        assert_eq!(
            mgr.store().read("Diffs/Other", ValueType::Int).unwrap(),
            VariantValue::Int(3)
        );
    }

    #[test]
    fn test_remove_option_single() {
        let (_backend, mut mgr) = manager();
        mgr.init_option("Settings/Width", 100).unwrap();
        mgr.save_option_value("Settings/Width", 200).unwrap();
        mgr.remove_option("Settings/Width").unwrap();

        assert!(mgr.get("Settings/Width").is_none());
        assert!(mgr
            .store()
            .read("Settings/Width", ValueType::Int)
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_close_keys() {
        let (_backend, mut mgr) = manager();
        mgr.init_option("Settings/Width", 100).unwrap();
        mgr.flush_options();
        assert!(mgr.store().cached_handles() > 0);
        mgr.close_keys();
        assert_eq!(mgr.store().cached_handles(), 0);
    }
}
