//! Flat INI-style text file
//!
//! `[section]` headers followed by `key=value` lines. Lines starting with
//! `;` or `#` are comments and, like blank lines, are kept on save so that
//! content this crate does not own survives a rewrite.
//!
//! Keys are escaped with the value codec's text escaping, so an option name
//! containing `=` or `\` is stored unambiguously. Values are stored as the
//! caller's text with surrounding spaces and tabs trimmed.

use crate::persistence::codec::ValueCodec;
use std::collections::BTreeMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::Path;

/// Names of the two sections an export writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IniSections {
    /// Section mapping option names to text values
    pub values: String,
    /// Section mapping option names to type tags
    pub types: String,
}

impl Default for IniSections {
    fn default() -> Self {
        IniSections {
            values: "Options".to_string(),
            types: "Options.TypeInfo".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Entry { key: String, value: String },
    /// Comment, blank or unparsable line, kept verbatim
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Section {
    name: String,
    lines: Vec<Line>,
}

/// In-memory INI document with ordered sections
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniDocument {
    /// Lines before the first header
    preamble: Vec<String>,
    sections: Vec<Section>,
}

impl IniDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse document text
    pub fn parse(text: &str) -> Self {
        let mut doc = IniDocument::new();
        for raw in text.lines() {
            let trimmed = trim_blank(raw);
            if trimmed.starts_with('[') && trimmed.ends_with(']') && trimmed.len() >= 2 {
                let name = trim_blank(&trimmed[1..trimmed.len() - 1]).to_string();
                doc.sections.push(Section {
                    name,
                    lines: Vec::new(),
                });
                continue;
            }

            let line = if trimmed.is_empty() || trimmed.starts_with(';') || trimmed.starts_with('#')
            {
                Line::Other(raw.to_string())
            } else {
                match split_entry(trimmed) {
                    Some((key, value)) => Line::Entry {
                        key: ValueCodec::unescape(trim_blank(key)),
                        value: trim_blank(value).to_string(),
                    },
                    None => Line::Other(raw.to_string()),
                }
            };

            match doc.sections.last_mut() {
                Some(section) => section.lines.push(line),
                None => doc.preamble.push(raw.to_string()),
            }
        }
        doc
    }

    /// Load a file. A missing file gives an empty document.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(Self::parse(&text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(e),
        }
    }

    /// Write the document to `path` through a temp file and rename
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = std::path::PathBuf::from(tmp);
        std::fs::write(&tmp, self.to_string())?;
        std::fs::rename(&tmp, path)
    }

    fn find_section(&self, name: &str) -> Option<&Section> {
        self.sections
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    fn find_section_mut(&mut self, name: &str) -> Option<&mut Section> {
        self.sections
            .iter_mut()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.find_section(name).is_some()
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.name.as_str())
    }

    /// Look up a value. Section names match case-insensitively, keys exactly.
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.find_section(section)?
            .lines
            .iter()
            .rev()
            .find_map(|line| match line {
                Line::Entry { key: k, value } if k == key => Some(value.as_str()),
                _ => None,
            })
    }

    /// Set a value, replacing an existing entry in place or appending.
    /// The section is created when missing.
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        if self.find_section(section).is_none() {
            self.sections.push(Section {
                name: section.to_string(),
                lines: Vec::new(),
            });
        }
        let Some(target) = self.find_section_mut(section) else {
            return;
        };

        let value = trim_blank(value).to_string();
        let existing = target.lines.iter_mut().find_map(|line| match line {
            Line::Entry { key: k, value: v } if k == key => Some(v),
            _ => None,
        });
        match existing {
            Some(slot) => *slot = value,
            None => target.lines.push(Line::Entry {
                key: key.to_string(),
                value,
            }),
        }
    }

    /// Remove every entry for `key`. Returns true if anything was removed.
    pub fn remove(&mut self, section: &str, key: &str) -> bool {
        let Some(target) = self.find_section_mut(section) else {
            return false;
        };
        let before = target.lines.len();
        target
            .lines
            .retain(|line| !matches!(line, Line::Entry { key: k, .. } if k == key));
        target.lines.len() != before
    }

    /// All entries of a section. Later duplicates win. Missing sections are empty.
    pub fn section(&self, name: &str) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        if let Some(section) = self.find_section(name) {
            for line in &section.lines {
                if let Line::Entry { key, value } = line {
                    out.insert(key.clone(), value.clone());
                }
            }
        }
        out
    }
}

/// Strip the spaces and tabs that may pad a line. Other whitespace is
/// content.
fn trim_blank(text: &str) -> &str {
    text.trim_matches(|c: char| c == ' ' || c == '\t')
}

/// Split `key=value` at the first `=` not preceded by an escaping backslash
fn split_entry(line: &str) -> Option<(&str, &str)> {
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'=' => return Some((&line[..i], &line[i + 1..])),
            _ => i += 1,
        }
    }
    None
}

impl fmt::Display for IniDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.preamble {
            writeln!(f, "{}", line)?;
        }
        for section in &self.sections {
            writeln!(f, "[{}]", section.name)?;
            for line in &section.lines {
                match line {
                    Line::Entry { key, value } => {
                        writeln!(f, "{}={}", ValueCodec::escape(key), value)?
                    }
                    Line::Other(raw) => writeln!(f, "{}", raw)?,
                }
            }
        }
        Ok(())
    }
}
