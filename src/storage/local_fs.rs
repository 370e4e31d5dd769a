//! Local filesystem store
//!
//! Keys are directories under a base directory. Each value is a file
//! `<name>.val` laid out as:
//!
//! ```text
//! [type tag: u32 LE][crc32 of payload: u32 LE][payload ...]
//! ```
//!
//! Key and value names are percent-escaped so they always map to a single
//! path component and never collide with the `.val` suffix. Escaping can
//! triple a name's length (six bytes per non-ASCII UTF-8 pair), and file
//! names are capped at 255 bytes. A name whose escaped form does not fit
//! is rejected with `StoreError::Other` before touching the filesystem.

use crate::storage::error::StoreError;
use crate::storage::path::KeyPath;
use crate::storage::store::{KeyIter, PersistentStore, StoreType, StoredValue, ValueIter};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const VALUE_SUFFIX: &str = ".val";
/// Suffix of the temp file a write goes through
const TMP_SUFFIX: &str = ".val.tmp";
const MAX_FILE_NAME: usize = 255;
const HEADER_LEN: usize = 8;

/// Handle into a `LocalFsStore`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFsHandle {
    path: KeyPath,
    dir: PathBuf,
}

impl LocalFsHandle {
    pub fn path(&self) -> &KeyPath {
        &self.path
    }
}

/// Hierarchical store backed by a directory tree
#[derive(Debug, Clone)]
pub struct LocalFsStore {
    base_path: PathBuf,
}

impl LocalFsStore {
    /// Create a store rooted at `base_path`, creating the directory if needed
    pub fn new(base_path: PathBuf) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&base_path)?;
        Ok(LocalFsStore { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn key_dir(&self, path: &KeyPath) -> Result<PathBuf, StoreError> {
        let mut dir = self.base_path.clone();
        for segment in path.segments() {
            dir.push(fitted_component(segment, 0)?);
        }
        Ok(dir)
    }

    fn value_file(handle: &LocalFsHandle, name: &str) -> Result<PathBuf, StoreError> {
        let stem = fitted_component(name, TMP_SUFFIX.len())?;
        Ok(handle.dir.join(format!("{}{}", stem, VALUE_SUFFIX)))
    }

    fn check_key(handle: &LocalFsHandle) -> Result<(), StoreError> {
        if handle.dir.is_dir() {
            Ok(())
        } else {
            Err(StoreError::KeyDeleted(handle.path.to_string()))
        }
    }

    fn read_file(file: &Path) -> Result<(StoreType, Vec<u8>), StoreError> {
        let raw = std::fs::read(file)?;
        decode_value_file(&raw).map_err(|msg| StoreError::Corrupt(format!("{}: {}", file.display(), msg)))
    }
}

/// Encode a value file body
fn encode_value_file(data: &[u8], store_type: StoreType) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + data.len());
    out.extend_from_slice(&store_type.tag().to_le_bytes());
    out.extend_from_slice(&crc32fast::hash(data).to_le_bytes());
    out.extend_from_slice(data);
    out
}

/// Decode and validate a value file body
fn decode_value_file(raw: &[u8]) -> Result<(StoreType, Vec<u8>), String> {
    if raw.len() < HEADER_LEN {
        return Err(format!("truncated header ({} bytes)", raw.len()));
    }
    let tag = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
    let crc = u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]);
    let payload = &raw[HEADER_LEN..];
    let store_type = StoreType::from_tag(tag).ok_or_else(|| format!("unknown type tag {}", tag))?;
    let actual = crc32fast::hash(payload);
    if actual != crc {
        return Err(format!("checksum mismatch (expected {:08x}, got {:08x})", crc, actual));
    }
    Ok((store_type, payload.to_vec()))
}

/// Escape a key or value name into a single safe path component
fn escape_component(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-' | b' ' => out.push(byte as char),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// Escape `name` and check that it still fits a file name with `reserved`
/// bytes of suffix
fn fitted_component(name: &str, reserved: usize) -> Result<String, StoreError> {
    let escaped = escape_component(name);
    if escaped.len() + reserved > MAX_FILE_NAME {
        return Err(StoreError::Other(format!(
            "name too long for local store: {} bytes escaped, limit {}",
            escaped.len(),
            MAX_FILE_NAME - reserved
        )));
    }
    Ok(escaped)
}

fn unescape_component(escaped: &str) -> String {
    fn hex(byte: u8) -> Option<u8> {
        (byte as char).to_digit(16).map(|d| d as u8)
    }

    let bytes = escaped.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex(bytes[i + 1]), hex(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

impl PersistentStore for LocalFsStore {
    type Handle = LocalFsHandle;

    fn open_or_create(&self, path: &KeyPath) -> Result<Self::Handle, StoreError> {
        let dir = self.key_dir(path)?;
        std::fs::create_dir_all(&dir)?;
        Ok(LocalFsHandle {
            path: path.clone(),
            dir,
        })
    }

    fn open(&self, path: &KeyPath) -> Result<Self::Handle, StoreError> {
        let dir = self.key_dir(path)?;
        if !dir.is_dir() {
            return Err(StoreError::NotFound(path.to_string()));
        }
        Ok(LocalFsHandle {
            path: path.clone(),
            dir,
        })
    }

    fn close(&self, _handle: Self::Handle) {}

    fn read_value(
        &self,
        handle: &Self::Handle,
        name: &str,
        buf: &mut [u8],
    ) -> Result<(usize, StoreType), StoreError> {
        let file = Self::value_file(handle, name)?;
        let (store_type, data) = match Self::read_file(&file) {
            Err(StoreError::NotFound(_)) => {
                return Err(StoreError::NotFound(handle.path.option_name(name)))
            }
            other => other?,
        };
        if data.len() > buf.len() {
            return Err(StoreError::MoreData {
                required: data.len(),
            });
        }
        buf[..data.len()].copy_from_slice(&data);
        Ok((data.len(), store_type))
    }

    fn write_value(
        &self,
        handle: &Self::Handle,
        name: &str,
        data: &[u8],
        store_type: StoreType,
    ) -> Result<(), StoreError> {
        Self::check_key(handle)?;
        let file = Self::value_file(handle, name)?;
        let tmp = file.with_extension("val.tmp");
        std::fs::write(&tmp, encode_value_file(data, store_type))?;
        std::fs::rename(&tmp, &file)?;
        Ok(())
    }

    fn delete_value(&self, handle: &Self::Handle, name: &str) -> Result<(), StoreError> {
        let file = Self::value_file(handle, name)?;
        match std::fs::remove_file(&file) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StoreError::NotFound(handle.path.option_name(name)))
            }
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn delete_subtree(&self, path: &KeyPath) -> Result<(), StoreError> {
        let dir = self.key_dir(path)?;
        if !dir.is_dir() {
            return Err(StoreError::NotFound(path.to_string()));
        }
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let entry_path = entry.path();
            if entry_path.is_dir() {
                std::fs::remove_dir_all(&entry_path)?;
            } else {
                std::fs::remove_file(&entry_path)?;
            }
        }
        Ok(())
    }

    fn enumerate_values<'a>(&'a self, handle: &'a Self::Handle) -> Result<ValueIter<'a>, StoreError> {
        let mut files: Vec<(String, PathBuf)> = Vec::new();
        for entry in std::fs::read_dir(&handle.dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(stem) = file_name.strip_suffix(VALUE_SUFFIX) {
                if entry.path().is_file() {
                    files.push((unescape_component(stem), entry.path()));
                }
            }
        }
        files.sort();

        Ok(Box::new(files.into_iter().map(|(name, file)| {
            Self::read_file(&file).map(|(store_type, data)| StoredValue {
                name,
                data,
                store_type,
            })
        })))
    }

    fn enumerate_child_keys<'a>(&'a self, path: &KeyPath) -> Result<KeyIter<'a>, StoreError> {
        let dir = self.key_dir(path)?;
        let mut children = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.path().is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    children.push(unescape_component(name));
                }
            }
        }
        children.sort();
        Ok(Box::new(children.into_iter().map(Ok)))
    }
}
