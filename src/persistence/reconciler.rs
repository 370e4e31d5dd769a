//! Import/Export Reconciler
//!
//! Moves values that live in the store but are unknown to the option table
//! ("unmanaged" values) to and from a flat two-section file. One section
//! holds the text values, its twin holds a type tag per name so the text
//! can be decoded on import.
//!
//! Export walks the whole tree below the root. A value's option name is its
//! key path relative to the root, `/`, then the value name; values directly
//! under the root are named `/<value>`.

use crate::options::error::OptionError;
use crate::options::table::OptionTable;
use crate::options::value::{ValueType, VariantValue};
use crate::persistence::codec::ValueCodec;
use crate::persistence::ini::{IniDocument, IniSections};
use crate::storage::{KeyPath, PersistentStore, StoreError, StoredValue};
use tracing::{debug, info, warn};

/// Outcome of an export
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportStats {
    pub keys_visited: usize,
    pub exported: usize,
    pub skipped_managed: usize,
    /// Binary values and malformed words
    pub skipped_unsupported: usize,
    /// Managed options the table wrote after the unmanaged pass
    pub managed_exported: usize,
}

/// Outcome of an import
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub imported: usize,
    pub skipped_managed: usize,
    pub skipped_untyped: usize,
    pub skipped_invalid: usize,
    pub failed: usize,
    /// Managed options the table updated after the unmanaged pass
    pub managed_updated: usize,
}

/// True if the table knows `name`, either as written or with `\`
/// separators spelled `/`. Root-level names also match without their
/// leading `/`.
pub fn is_managed<T: OptionTable + ?Sized>(table: &T, name: &str) -> bool {
    if table.contains(name) {
        return true;
    }
    let slashed = name.replace('\\', "/");
    if slashed != name && table.contains(&slashed) {
        return true;
    }
    match name.strip_prefix('/') {
        Some(bare) if !bare.contains('/') => table.contains(bare),
        _ => false,
    }
}

/// Visit every value below `root` (values of a key before its children).
/// Returns the number of keys visited.
///
/// Enumeration errors abort the walk. A child key that cannot be opened is
/// skipped.
pub fn walk_values<S: PersistentStore>(
    store: &S,
    root: &KeyPath,
    visit: &mut dyn FnMut(&str, &StoredValue),
) -> Result<usize, StoreError> {
    let handle = store.open(root)?;
    let result = walk_key(store, &handle, root, &KeyPath::root(), visit);
    store.close(handle);
    result
}

fn walk_key<S: PersistentStore>(
    store: &S,
    handle: &S::Handle,
    full: &KeyPath,
    relative: &KeyPath,
    visit: &mut dyn FnMut(&str, &StoredValue),
) -> Result<usize, StoreError> {
    for value in store.enumerate_values(handle)? {
        let value = value?;
        visit(&relative.option_name(&value.name), &value);
    }

    let children = store
        .enumerate_child_keys(full)?
        .collect::<Result<Vec<String>, StoreError>>()?;

    let mut visited = 1;
    for child in children {
        let child_full = full.child(&child);
        let child_handle = match store.open(&child_full) {
            Ok(h) => h,
            Err(e) => {
                debug!(path = %child_full, error = %e, "Skipping key that cannot be opened");
                continue;
            }
        };
        let result = walk_key(
            store,
            &child_handle,
            &child_full,
            &relative.child(&child),
            visit,
        );
        store.close(child_handle);
        visited += result?;
    }
    Ok(visited)
}

/// Write every unmanaged Word and String value below `root` into `doc`.
///
/// On error the entries written so far stay in `doc`; the caller decides
/// whether to save it.
pub fn export_unmanaged<S: PersistentStore>(
    store: &S,
    root: &KeyPath,
    is_managed: impl Fn(&str) -> bool,
    doc: &mut IniDocument,
    sections: &IniSections,
) -> Result<ExportStats, OptionError> {
    let mut stats = ExportStats::default();

    let mut visit = |name: &str, value: &StoredValue| {
        if is_managed(name) {
            stats.skipped_managed += 1;
            return;
        }
        let Some(decoded) = ValueCodec::decode_native(&value.data, value.store_type) else {
            stats.skipped_unsupported += 1;
            return;
        };
        // decode_native never yields Null, so text encoding cannot fail
        let Ok(text) = ValueCodec::to_text(&decoded) else {
            stats.skipped_unsupported += 1;
            return;
        };
        doc.set(&sections.values, name, &text);
        doc.set(&sections.types, name, decoded.value_type().as_str());
        stats.exported += 1;
    };

    let walked = walk_values(store, root, &mut visit);
    match walked {
        Ok(keys) => {
            stats.keys_visited = keys;
            info!(
                exported = stats.exported,
                keys = stats.keys_visited,
                skipped_managed = stats.skipped_managed,
                "Exported unmanaged values"
            );
            Ok(stats)
        }
        Err(e) => {
            warn!(root = %root, error = %e, exported = stats.exported, "Export aborted");
            Err(OptionError::Generic(format!("export {}: {}", root, e)))
        }
    }
}

/// Decode every typed, unmanaged entry of `doc` and hand it to `write`.
///
/// Entries without a type tag are skipped silently; unknown tags and
/// unparsable text are skipped with a debug log. Write failures are logged
/// and counted, never fatal.
pub fn import_unmanaged(
    doc: &IniDocument,
    sections: &IniSections,
    is_managed: impl Fn(&str) -> bool,
    mut write: impl FnMut(&str, &VariantValue) -> Result<(), OptionError>,
) -> ImportStats {
    let values = doc.section(&sections.values);
    let types = doc.section(&sections.types);
    let mut stats = ImportStats::default();

    for (name, text) in &values {
        if is_managed(name) {
            stats.skipped_managed += 1;
            continue;
        }
        let Some(tag) = types.get(name) else {
            stats.skipped_untyped += 1;
            continue;
        };
        let Some(value_type) = ValueType::parse(tag) else {
            debug!(name = %name, tag = %tag, "Skipping entry with unknown type tag");
            stats.skipped_invalid += 1;
            continue;
        };
        let value = match ValueCodec::from_text(text, value_type) {
            Ok(value) => value,
            Err(e) => {
                debug!(name = %name, error = %e, "Skipping unparsable entry");
                stats.skipped_invalid += 1;
                continue;
            }
        };
        match write(name, &value) {
            Ok(()) => stats.imported += 1,
            Err(e) => {
                warn!(name = %name, error = %e, "Import write failed");
                stats.failed += 1;
            }
        }
    }

    info!(
        imported = stats.imported,
        skipped_managed = stats.skipped_managed,
        skipped_untyped = stats.skipped_untyped,
        skipped_invalid = stats.skipped_invalid,
        failed = stats.failed,
        "Imported unmanaged values"
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::table::OptionsMap;
    use crate::storage::{InMemoryStore, StoreType};
    use std::collections::BTreeMap;

    fn root() -> KeyPath {
        KeyPath::parse("Software\\Test")
    }

    fn seeded_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        let top = store.open_or_create(&root()).unwrap();
        store
            .write_value(&top, "Top", &3u32.to_le_bytes(), StoreType::Word)
            .unwrap();
        let settings = store.open_or_create(&root().child("Settings")).unwrap();
        store
            .write_value(&settings, "Width", &100u32.to_le_bytes(), StoreType::Word)
            .unwrap();
        store
            .write_value(&settings, "DebugFlag", &1u32.to_le_bytes(), StoreType::Word)
            .unwrap();
        let sub = store
            .open_or_create(&root().join(&KeyPath::parse("Settings\\Sub")))
            .unwrap();
        store
            .write_value(&sub, "Title", b"a=b\0", StoreType::String)
            .unwrap();
        store
            .write_value(&sub, "Blob", &[1, 2, 3], StoreType::Binary)
            .unwrap();
        store
    }

    #[test]
    fn test_is_managed_normalisation() {
        let mut table = OptionsMap::new();
        table.add("Settings/Width", VariantValue::Int(1)).unwrap();
        table.add("Settings/Sub/Title", VariantValue::from("t")).unwrap();
        table.add("Top", VariantValue::Int(1)).unwrap();

        assert!(is_managed(&table, "Settings/Width"));
        assert!(is_managed(&table, "Settings\\Sub/Title"));
        assert!(is_managed(&table, "/Top"));
        assert!(!is_managed(&table, "Settings/DebugFlag"));
        assert!(!is_managed(&table, "/Settings/Width"));
    }

    #[test]
    fn test_walk_values_names() {
        let store = seeded_store();
        let mut names = Vec::new();
        let keys = walk_values(&store, &root(), &mut |name, _| names.push(name.to_string())).unwrap();

        assert_eq!(keys, 3);
        assert_eq!(
            names,
            vec![
                "/Top",
                "Settings/DebugFlag",
                "Settings/Width",
                "Settings\\Sub/Blob",
                "Settings\\Sub/Title",
            ]
        );
    }

    #[test]
    fn test_export_skips_managed_and_binary() {
        let store = seeded_store();
        let sections = IniSections::default();
        let mut doc = IniDocument::new();

        let stats = export_unmanaged(
            &store,
            &root(),
            |name| name == "Settings/Width",
            &mut doc,
            &sections,
        )
        .unwrap();

        assert_eq!(stats.exported, 3);
        assert_eq!(stats.skipped_managed, 1);
        assert_eq!(stats.skipped_unsupported, 1);
        assert_eq!(doc.get("Options", "Settings/DebugFlag"), Some("1"));
        assert_eq!(doc.get("Options.TypeInfo", "Settings/DebugFlag"), Some("int"));
        assert_eq!(doc.get("Options", "Settings\\Sub/Title"), Some("a\\=b"));
        assert_eq!(doc.get("Options.TypeInfo", "Settings\\Sub/Title"), Some("string"));
        assert_eq!(doc.get("Options", "/Top"), Some("3"));
        assert_eq!(doc.get("Options", "Settings/Width"), None);
        assert_eq!(doc.get("Options", "Settings\\Sub/Blob"), None);
    }

    #[test]
    fn test_export_missing_root_is_generic_error() {
        let store = InMemoryStore::new();
        let mut doc = IniDocument::new();
        let result = export_unmanaged(&store, &root(), |_| false, &mut doc, &IniSections::default());
        assert!(matches!(result, Err(OptionError::Generic(_))));
    }

    #[test]
    fn test_import_filters_entries() {
        let doc = IniDocument::parse(
            "[Options]\n\
             A/int=0x10\n\
             A/flag=1\n\
             A/text=hello\\sworld\\s\n\
             A/untyped=5\n\
             A/weird=5\n\
             A/bad=abc\n\
             A/managed=7\n\
             [Options.TypeInfo]\n\
             A/int=int\n\
             A/flag=BOOL\n\
             A/text=string\n\
             A/weird=float\n\
             A/bad=int\n\
             A/managed=int\n",
        );

        let mut written = BTreeMap::new();
        let stats = import_unmanaged(
            &doc,
            &IniSections::default(),
            |name| name == "A/managed",
            |name, value| {
                written.insert(name.to_string(), value.clone());
                Ok(())
            },
        );

        assert_eq!(stats.imported, 3);
        assert_eq!(stats.skipped_managed, 1);
        assert_eq!(stats.skipped_untyped, 1);
        assert_eq!(stats.skipped_invalid, 2);
        assert_eq!(written.get("A/int"), Some(&VariantValue::Int(16)));
        assert_eq!(written.get("A/flag"), Some(&VariantValue::Bool(true)));
        assert_eq!(
            written.get("A/text"),
            Some(&VariantValue::from("hello world "))
        );
    }

    #[test]
    fn test_import_counts_write_failures() {
        let doc = IniDocument::parse("[Options]\nA/x=1\n[Options.TypeInfo]\nA/x=int\n");
        let stats = import_unmanaged(&doc, &IniSections::default(), |_| false, |_, _| {
            Err(OptionError::Generic("disk full".to_string()))
        });
        assert_eq!(stats.imported, 0);
        assert_eq!(stats.failed, 1);
    }

    #[test]
    fn test_import_missing_sections_is_empty() {
        let stats = import_unmanaged(
            &IniDocument::new(),
            &IniSections::default(),
            |_| false,
            |_, _| Ok(()),
        );
        assert_eq!(stats, ImportStats::default());
    }
}
