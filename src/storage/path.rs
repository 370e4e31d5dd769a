//! Key Paths and Option Names
//!
//! A `KeyPath` is a normalised, backslash-separated path to a key in the
//! hierarchical store. Option names use `/` as their separator; the segment
//! after the last `/` names the value, everything before it names the key.

use std::fmt;

/// Separator used between key segments inside the store
pub const KEY_SEPARATOR: char = '\\';

/// Separator used between the key path and the value name in option names
pub const NAME_SEPARATOR: char = '/';

/// Normalised path to a key, relative or absolute depending on context
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyPath(String);

impl KeyPath {
    /// The empty path (the store root, or the configured root when relative)
    pub fn root() -> Self {
        KeyPath(String::new())
    }

    /// Parse a path. Both `/` and `\` separate segments; empty segments are dropped.
    pub fn parse(raw: &str) -> Self {
        let joined = raw
            .split(|c| c == KEY_SEPARATOR || c == NAME_SEPARATOR)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\\");
        KeyPath(joined)
    }

    /// Normalise a configured root under the namespace prefix.
    ///
    /// The prefix is prepended once, and only when the root does not
    /// already start with it.
    pub fn normalize_root(root: &str, namespace_prefix: &str) -> Self {
        if namespace_prefix.is_empty() || root.starts_with(namespace_prefix) {
            KeyPath::parse(root)
        } else {
            KeyPath::parse(&format!("{}{}{}", namespace_prefix, KEY_SEPARATOR, root))
        }
    }

    /// Split an option name into (key path, value name).
    ///
    /// Pure and total: a name without `/` lives at the root, and a name
    /// ending in `/` has an empty value name (the whole key).
    pub fn split_option_name(name: &str) -> (KeyPath, String) {
        match name.rfind(NAME_SEPARATOR) {
            Some(idx) => (KeyPath::parse(&name[..idx]), name[idx + 1..].to_string()),
            None => (KeyPath::root(), name.to_string()),
        }
    }

    /// Build the option name of `value_name` stored under this key.
    ///
    /// Inverse of `split_option_name` for normalised paths. Root-level
    /// values are named `/<value>`.
    pub fn option_name(&self, value_name: &str) -> String {
        format!("{}{}{}", self.0, NAME_SEPARATOR, value_name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(KEY_SEPARATOR).filter(|s| !s.is_empty())
    }

    /// Append a relative path
    pub fn join(&self, other: &KeyPath) -> KeyPath {
        match (self.is_root(), other.is_root()) {
            (true, _) => other.clone(),
            (_, true) => self.clone(),
            _ => KeyPath(format!("{}{}{}", self.0, KEY_SEPARATOR, other.0)),
        }
    }

    /// Append a single child key name
    pub fn child(&self, name: &str) -> KeyPath {
        self.join(&KeyPath::parse(name))
    }

    /// Parent key, or `None` for the root
    pub fn parent(&self) -> Option<KeyPath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind(KEY_SEPARATOR) {
            Some(idx) => Some(KeyPath(self.0[..idx].to_string())),
            None => Some(KeyPath::root()),
        }
    }

    /// Last segment, or the empty string for the root
    pub fn name(&self) -> &str {
        match self.0.rfind(KEY_SEPARATOR) {
            Some(idx) => &self.0[idx + 1..],
            None => &self.0,
        }
    }

    /// True if `self` lies strictly below `ancestor`
    pub fn is_descendant_of(&self, ancestor: &KeyPath) -> bool {
        if ancestor.is_root() {
            return !self.is_root();
        }
        self.0.len() > ancestor.0.len()
            && self.0.starts_with(&ancestor.0)
            && self.0[ancestor.0.len()..].starts_with(KEY_SEPARATOR)
    }

    /// Strip `ancestor` from the front, giving the relative remainder
    pub fn strip_prefix(&self, ancestor: &KeyPath) -> Option<KeyPath> {
        if self == ancestor {
            Some(KeyPath::root())
        } else if self.is_descendant_of(ancestor) {
            let start = if ancestor.is_root() { 0 } else { ancestor.0.len() + 1 };
            Some(KeyPath(self.0[start..].to_string()))
        } else {
            None
        }
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for KeyPath {
    fn from(raw: &str) -> Self {
        KeyPath::parse(raw)
    }
}
