//! Option Tables
//!
//! The in-memory, authoritative set of known options. `OptionTable` is the
//! seam the manager and the reconciler work against; `OptionsMap` is the
//! shipped implementation.

use crate::options::error::OptionError;
use crate::options::value::{ValueType, VariantValue};
use crate::persistence::codec::ValueCodec;
use crate::persistence::ini::{IniDocument, IniSections};
use std::collections::BTreeMap;
use tracing::debug;

/// Typed option table keyed by option name
pub trait OptionTable {
    fn get(&self, name: &str) -> Option<&VariantValue>;

    /// Replace an existing option's value. The type must match.
    fn set(&mut self, name: &str, value: VariantValue) -> Result<(), OptionError>;

    /// Add a new option. Adding an existing name is an error.
    fn add(&mut self, name: &str, value: VariantValue) -> Result<(), OptionError>;

    fn remove(&mut self, name: &str) -> Result<(), OptionError>;

    fn names(&self) -> Vec<String>;

    fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Write every option into the two sections. Returns the number written.
    fn export_to(&self, doc: &mut IniDocument, sections: &IniSections) -> usize {
        let mut written = 0;
        for name in self.names() {
            let Some(value) = self.get(&name) else {
                continue;
            };
            let Ok(text) = ValueCodec::to_text(value) else {
                continue;
            };
            doc.set(&sections.values, &name, &text);
            doc.set(&sections.types, &name, value.value_type().as_str());
            written += 1;
        }
        written
    }

    /// Read known options back from the values section, decoding each as
    /// its current type. Entries whose type tag disagrees, or whose text
    /// does not parse, are skipped. Returns the names whose value changed.
    fn import_from(&mut self, doc: &IniDocument, sections: &IniSections) -> Vec<String> {
        let values = doc.section(&sections.values);
        let types = doc.section(&sections.types);
        let mut changed = Vec::new();

        for name in self.names() {
            let Some(text) = values.get(&name) else {
                continue;
            };
            let Some(current) = self.get(&name) else {
                continue;
            };
            let expected = current.value_type();
            if let Some(tag) = types.get(&name) {
                if ValueType::parse(tag) != Some(expected) {
                    debug!(name = %name, tag = %tag, expected = %expected, "Skipping option with mismatched type tag");
                    continue;
                }
            }
            let value = match ValueCodec::from_text(text, expected) {
                Ok(value) => value,
                Err(e) => {
                    debug!(name = %name, error = %e, "Skipping unparsable option");
                    continue;
                }
            };
            if self.get(&name) == Some(&value) {
                continue;
            }
            if self.set(&name, value).is_ok() {
                changed.push(name);
            }
        }
        changed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionEntry {
    pub value: VariantValue,
    pub default: VariantValue,
}

/// `BTreeMap`-backed option table holding each option's value and default
#[derive(Debug, Clone, Default)]
pub struct OptionsMap {
    entries: BTreeMap<String, OptionEntry>,
}

impl OptionsMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn default_of(&self, name: &str) -> Option<&VariantValue> {
        self.entries.get(name).map(|e| &e.default)
    }

    /// Restore an option to its default
    pub fn reset(&mut self, name: &str) -> Result<(), OptionError> {
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| OptionError::NotFound(name.to_string()))?;
        entry.value = entry.default.clone();
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &VariantValue)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), &e.value))
    }
}

impl OptionTable for OptionsMap {
    fn get(&self, name: &str) -> Option<&VariantValue> {
        self.entries.get(name).map(|e| &e.value)
    }

    fn set(&mut self, name: &str, value: VariantValue) -> Result<(), OptionError> {
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| OptionError::NotFound(name.to_string()))?;
        let expected = entry.default.value_type();
        if value.value_type() != expected {
            return Err(OptionError::WrongType {
                name: name.to_string(),
                expected,
                found: value.value_type().to_string(),
            });
        }
        entry.value = value;
        Ok(())
    }

    fn add(&mut self, name: &str, value: VariantValue) -> Result<(), OptionError> {
        if self.entries.contains_key(name) {
            return Err(OptionError::Generic(format!("option {} already exists", name)));
        }
        self.entries.insert(
            name.to_string(),
            OptionEntry {
                value: value.clone(),
                default: value,
            },
        );
        Ok(())
    }

    fn remove(&mut self, name: &str) -> Result<(), OptionError> {
        self.entries
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| OptionError::NotFound(name.to_string()))
    }

    fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }
}
