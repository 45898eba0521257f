//! Flattened leaf records and value tagging
//!
//! Every JSON scalar is stored as one [`LeafRecord`]. The `value` column is a
//! sentinel character followed by a sortable payload:
//!
//! | JSON | `value` | `ovalue` |
//! |------|---------|----------|
//! | `null` | `N` | - |
//! | `false` | `F` | `false` |
//! | `true` | `T` | `true` |
//! | `"abc"` | `` `abc `` | - |
//! | `-1.5` | `<8.4~` | `-1.5` |
//! | `10` | `=:210` | `10` |
//!
//! Numbers reuse the sign marker of [`crate::encoding`] as their sentinel, so
//! all numbers form one contiguous range (`<` .. `>`) and compare correctly.

use crate::encoding::{self, NEGATIVE_SIGN, POSITIVE_SIGN};
use crate::error::{Error, Result};
use crate::key::{self, SEPARATOR};
use std::collections::{HashMap, HashSet};

/// Sentinel of `null`
pub const NULL_VALUE: char = 'N';
/// Sentinel of `false`
pub const FALSE_VALUE: char = 'F';
/// Sentinel of `true`
pub const TRUE_VALUE: char = 'T';
/// Prefix of string values
pub const STRING_PREFIX: char = '`';

/// A stored row: one JSON scalar at one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafRecord {
    path: String,
    value: String,
    ovalue: Option<String>,
    index: Option<String>,
}

impl LeafRecord {
    /// Create a record
    pub fn new(
        path: impl Into<String>,
        value: impl Into<String>,
        ovalue: Option<String>,
        index: Option<String>,
    ) -> Self {
        LeafRecord {
            path: path.into(),
            value: value.into(),
            ovalue,
            index,
        }
    }

    /// Stored path (primary key)
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Tagged, sortable value
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Original literal for numbers and booleans
    pub fn ovalue(&self) -> Option<&str> {
        self.ovalue.as_deref()
    }

    /// Secondary index key, when declared
    pub fn index(&self) -> Option<&str> {
        self.index.as_deref()
    }

    /// Bytes counted against the insert batch threshold
    pub fn size_bytes(&self) -> usize {
        self.path.len() + self.value.len() + self.ovalue.as_ref().map_or(0, |o| o.len())
    }

    /// Decode the stored value
    pub fn scalar(&self) -> Result<Scalar<'_>> {
        Scalar::decode(&self.value, self.ovalue.as_deref())
    }
}

/// A decoded scalar, borrowing from the stored columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scalar<'a> {
    /// `null`
    Null,
    /// `true` / `false`
    Bool(bool),
    /// Number literal as originally written
    Number(std::borrow::Cow<'a, str>),
    /// String contents (unescaped)
    String(&'a str),
}

impl<'a> Scalar<'a> {
    /// Decode a `value`/`ovalue` column pair
    ///
    /// Numbers prefer the original literal; rows without one fall back to the
    /// canonical decoding of the sortable payload.
    pub fn decode(value: &'a str, ovalue: Option<&'a str>) -> Result<Self> {
        let mut chars = value.chars();
        match chars.next() {
            Some(NULL_VALUE) => Ok(Scalar::Null),
            Some(FALSE_VALUE) => Ok(Scalar::Bool(false)),
            Some(TRUE_VALUE) => Ok(Scalar::Bool(true)),
            Some(STRING_PREFIX) => Ok(Scalar::String(chars.as_str())),
            Some(NEGATIVE_SIGN) | Some(POSITIVE_SIGN) => match ovalue {
                Some(literal) => Ok(Scalar::Number(literal.into())),
                None => Ok(Scalar::Number(encoding::decode(value)?.into())),
            },
            _ => Err(Error::corruption(format!(
                "unknown value sentinel in '{}'",
                value
            ))),
        }
    }
}

/// Tag a string value
pub fn encode_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 1);
    out.push(STRING_PREFIX);
    out.push_str(s);
    out
}

/// Tag a boolean value
pub fn encode_bool(b: bool) -> String {
    if b {
        TRUE_VALUE.to_string()
    } else {
        FALSE_VALUE.to_string()
    }
}

/// Tag a number literal
pub fn encode_number(literal: &str) -> Result<String> {
    encoding::encode(literal)
}

/// Tag a scalar `serde_json::Value` (used for filters and lookups)
pub fn encode_scalar(value: &serde_json::Value) -> Result<String> {
    match value {
        serde_json::Value::Null => Ok(NULL_VALUE.to_string()),
        serde_json::Value::Bool(b) => Ok(encode_bool(*b)),
        serde_json::Value::Number(n) => encode_number(&n.to_string()),
        serde_json::Value::String(s) => Ok(encode_string(s)),
        other => Err(Error::invalid_input(format!(
            "expected a scalar value, got {}",
            other
        ))),
    }
}

/// Declared secondary indexes: `(container path, field)` pairs
///
/// Container paths are kept in stored form (`/users/`). A record at
/// `/users/<entity>/name/` gets the index key `/users/#name` when
/// `("/users", "name")` is declared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSet {
    by_container: HashMap<String, HashSet<String>>,
}

impl IndexSet {
    /// Empty index set
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from caller-form `(container, field)` pairs
    pub fn from_pairs<I, C, F>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (C, F)>,
        C: AsRef<str>,
        F: AsRef<str>,
    {
        let mut set = IndexSet::new();
        for (container, field) in pairs {
            set.declare(container.as_ref(), field.as_ref())?;
        }
        Ok(set)
    }

    /// Declare one index
    pub fn declare(&mut self, container: &str, field: &str) -> Result<()> {
        let container = key::to_db_path(container)?;
        key::validate_key(field)?;
        self.by_container
            .entry(container)
            .or_default()
            .insert(field.to_string());
        Ok(())
    }

    /// Whether no index is declared
    pub fn is_empty(&self) -> bool {
        self.by_container.is_empty()
    }

    /// Number of declared pairs
    pub fn len(&self) -> usize {
        self.by_container.values().map(HashSet::len).sum()
    }

    /// Whether `(container, field)` is declared; `container` in stored form
    pub fn contains(&self, db_container: &str, field: &str) -> bool {
        self.by_container
            .get(db_container)
            .map_or(false, |fields| fields.contains(field))
    }

    /// Index key for a declared pair
    pub fn index_key(db_container: &str, field: &str) -> String {
        format!("{}{}#{}", db_container.trim_end_matches(SEPARATOR), SEPARATOR, field)
    }

    /// Index key for a record path of shape `<container>/<entity>/<field>/`
    pub fn index_key_for(&self, record_path: &str) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        let trimmed = record_path.strip_suffix(SEPARATOR)?;
        let field_start = trimmed.rfind(SEPARATOR)? + 1;
        let field = &trimmed[field_start..];
        let entity_slash = trimmed[..field_start - 1].rfind(SEPARATOR)?;
        let container = &trimmed[..=entity_slash];
        if field.is_empty() || field_start - 1 == entity_slash {
            return None;
        }
        if self.contains(container, field) {
            Some(Self::index_key(container, field))
        } else {
            None
        }
    }
}
