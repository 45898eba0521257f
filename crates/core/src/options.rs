//! Read options for path queries

use crate::error::{Error, Result};
use crate::filter::Filter;
use serde::{Deserialize, Serialize};

/// Row order of a read, by stored path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending path order (default)
    #[default]
    Asc,
    /// Descending path order
    Desc,
}

impl SortOrder {
    /// SQL keyword
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Options of a `get`
///
/// Range bounds name direct children of the queried path (`startAt("k")`
/// includes `k` and its whole subtree).
///
/// # Example
///
/// ```
/// use jsondb_core::{GetOptions, SortOrder};
///
/// let options = GetOptions::new()
///     .order(SortOrder::Desc)
///     .limit_to_first(10)
///     .pretty_print(true);
/// assert_eq!(options.limit_to_first, Some(10));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GetOptions {
    /// Path order of the result
    pub order: SortOrder,
    /// First child to include (inclusive)
    pub start_at: Option<String>,
    /// Children strictly after this one
    pub start_after: Option<String>,
    /// Last child to include (inclusive)
    pub end_at: Option<String>,
    /// Children strictly before this one
    pub end_before: Option<String>,
    /// Stop after this many top-level children
    pub limit_to_first: Option<usize>,
    /// Collapse subtrees deeper than this to `true`
    pub depth: Option<usize>,
    /// Only children matching this filter
    pub filter: Option<Filter>,
    /// Indent the output
    pub pretty_print: bool,
    /// Wrap the output as `callback(...)`
    pub callback: Option<String>,
}

impl GetOptions {
    /// Default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the path order
    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    /// Include children from `key` on
    pub fn start_at(mut self, key: impl Into<String>) -> Self {
        self.start_at = Some(key.into());
        self
    }

    /// Include children after `key`
    pub fn start_after(mut self, key: impl Into<String>) -> Self {
        self.start_after = Some(key.into());
        self
    }

    /// Include children up to `key`
    pub fn end_at(mut self, key: impl Into<String>) -> Self {
        self.end_at = Some(key.into());
        self
    }

    /// Include children before `key`
    pub fn end_before(mut self, key: impl Into<String>) -> Self {
        self.end_before = Some(key.into());
        self
    }

    /// Limit the number of top-level children
    pub fn limit_to_first(mut self, limit: usize) -> Self {
        self.limit_to_first = Some(limit);
        self
    }

    /// Limit the output depth
    pub fn depth(mut self, depth: usize) -> Self {
        self.depth = Some(depth);
        self
    }

    /// Filter children
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Pretty-print the output
    pub fn pretty_print(mut self, pretty: bool) -> Self {
        self.pretty_print = pretty;
        self
    }

    /// JSONP callback name
    pub fn callback(mut self, name: impl Into<String>) -> Self {
        self.callback = Some(name.into());
        self
    }

    /// Check the options before any I/O
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.callback {
            validate_callback(name)?;
        }
        if let Some(filter) = &self.filter {
            filter.validate()?;
        }
        Ok(())
    }
}

/// A callback must be a (dotted) JavaScript identifier
fn validate_callback(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.split('.').all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        });
    if valid {
        Ok(())
    } else {
        Err(Error::invalid_input(format!(
            "'{}' is not a valid callback name",
            name
        )))
    }
}
