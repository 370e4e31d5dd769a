//! Typed option values
//!
//! `VariantValue` is the tagged union every option holds. `Null` marks an
//! unset value and never reaches the store.

use std::fmt;

/// Type of a `VariantValue`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Null,
    Int,
    Bool,
    String,
}

impl ValueType {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueType::Null => "null",
            ValueType::Int => "int",
            ValueType::Bool => "bool",
            ValueType::String => "string",
        }
    }

    /// Parse a type name as used on the command line and in type tags
    pub fn parse(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("int") {
            Some(ValueType::Int)
        } else if name.eq_ignore_ascii_case("bool") {
            Some(ValueType::Bool)
        } else if name.eq_ignore_ascii_case("string") {
            Some(ValueType::String)
        } else {
            None
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Option value
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum VariantValue {
    #[default]
    Null,
    Int(i32),
    Bool(bool),
    String(String),
}

impl VariantValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            VariantValue::Null => ValueType::Null,
            VariantValue::Int(_) => ValueType::Int,
            VariantValue::Bool(_) => ValueType::Bool,
            VariantValue::String(_) => ValueType::String,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, VariantValue::Null)
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            VariantValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            VariantValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            VariantValue::String(v) => Some(v),
            _ => None,
        }
    }
}

impl From<i32> for VariantValue {
    fn from(v: i32) -> Self {
        VariantValue::Int(v)
    }
}

impl From<bool> for VariantValue {
    fn from(v: bool) -> Self {
        VariantValue::Bool(v)
    }
}

impl From<String> for VariantValue {
    fn from(v: String) -> Self {
        VariantValue::String(v)
    }
}

impl From<&str> for VariantValue {
    fn from(v: &str) -> Self {
        VariantValue::String(v.to_string())
    }
}

impl fmt::Display for VariantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariantValue::Null => f.write_str("(null)"),
            VariantValue::Int(v) => write!(f, "{}", v),
            VariantValue::Bool(v) => write!(f, "{}", v),
            VariantValue::String(v) => f.write_str(v),
        }
    }
}
