//! Query-time filters
//!
//! A filter selects direct children of the queried path. [`ChildFilter`]
//! compares one field of each child; [`LogicalFilter`] combines two or more
//! filters with AND/OR. Filters are never persisted.
//!
//! ```
//! use jsondb_core::filter::{Filter, Op};
//! use serde_json::json;
//!
//! let active_admins = Filter::and(vec![
//!     Filter::child("role", Op::Eq, json!("admin")).unwrap(),
//!     Filter::child("active", Op::Eq, json!(true)).unwrap(),
//! ])
//! .unwrap();
//! assert!(active_admins.validate().is_ok());
//! ```

use crate::encoding::{NEGATIVE_SIGN, POSITIVE_SIGN};
use crate::error::{Error, Result};
use crate::key::validate_key;
use crate::record::{encode_scalar, STRING_PREFIX};
use serde::{Deserialize, Serialize};

/// Comparison operator of a [`ChildFilter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl Op {
    /// SQL operator text
    pub fn as_sql(&self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Ne => "<>",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
        }
    }

    /// Whether the operator orders values (as opposed to equality)
    pub fn is_ordering(&self) -> bool {
        !matches!(self, Op::Eq | Op::Ne)
    }
}

/// Leaf predicate against one child field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildFilter {
    field: String,
    op: Op,
    value: serde_json::Value,
}

impl ChildFilter {
    /// Create a validated child filter
    pub fn new(field: impl Into<String>, op: Op, value: serde_json::Value) -> Result<Self> {
        let filter = ChildFilter {
            field: field.into(),
            op,
            value,
        };
        filter.validate()?;
        Ok(filter)
    }

    /// Compared field
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Comparison operator
    pub fn op(&self) -> Op {
        self.op
    }

    /// Compared value
    pub fn value(&self) -> &serde_json::Value {
        &self.value
    }

    /// Value in stored (tagged) form
    pub fn encoded_value(&self) -> Result<String> {
        encode_scalar(&self.value)
    }

    /// Half-open range `[low, high)` of stored values of the same JSON type
    ///
    /// Ordering comparisons are confined to this range so that, for example,
    /// `< 5` never matches strings or booleans.
    pub fn type_range(&self) -> Option<(String, String)> {
        match &self.value {
            serde_json::Value::Number(_) => Some((
                NEGATIVE_SIGN.to_string(),
                char::from(POSITIVE_SIGN as u8 + 1).to_string(),
            )),
            serde_json::Value::String(_) => Some((
                STRING_PREFIX.to_string(),
                char::from(STRING_PREFIX as u8 + 1).to_string(),
            )),
            _ => None,
        }
    }

    fn validate(&self) -> Result<()> {
        validate_key(&self.field)?;
        encode_scalar(&self.value)?;
        if self.op.is_ordering() && self.type_range().is_none() {
            return Err(Error::invalid_input(format!(
                "operator '{}' needs a number or string value, got {}",
                self.op.as_sql(),
                self.value
            )));
        }
        Ok(())
    }
}

/// Boolean combinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOp {
    /// All sub-filters match
    And,
    /// Any sub-filter matches
    Or,
}

/// Combination of two or more filters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalFilter {
    op: LogicalOp,
    filters: Vec<Filter>,
}

impl LogicalFilter {
    /// Create a validated combinator
    pub fn new(op: LogicalOp, filters: Vec<Filter>) -> Result<Self> {
        let filter = LogicalFilter { op, filters };
        filter.validate()?;
        Ok(filter)
    }

    /// Combinator
    pub fn op(&self) -> LogicalOp {
        self.op
    }

    /// Sub-filters
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    fn validate(&self) -> Result<()> {
        if self.filters.len() < 2 {
            return Err(Error::invalid_input(format!(
                "{:?} filter needs at least 2 sub-filters, got {}",
                self.op,
                self.filters.len()
            )));
        }
        self.filters.iter().try_for_each(Filter::validate)
    }
}

/// Filter tagged union
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    /// Leaf predicate
    Child(ChildFilter),
    /// AND/OR combinator
    Logical(LogicalFilter),
}

impl Filter {
    /// Leaf predicate shorthand
    pub fn child(field: impl Into<String>, op: Op, value: serde_json::Value) -> Result<Self> {
        ChildFilter::new(field, op, value).map(Filter::Child)
    }

    /// Equality shorthand
    pub fn equals(field: impl Into<String>, value: serde_json::Value) -> Result<Self> {
        Self::child(field, Op::Eq, value)
    }

    /// AND of two or more filters
    pub fn and(filters: Vec<Filter>) -> Result<Self> {
        LogicalFilter::new(LogicalOp::And, filters).map(Filter::Logical)
    }

    /// OR of two or more filters
    pub fn or(filters: Vec<Filter>) -> Result<Self> {
        LogicalFilter::new(LogicalOp::Or, filters).map(Filter::Logical)
    }

    /// Re-check invariants (needed after deserialization)
    pub fn validate(&self) -> Result<()> {
        match self {
            Filter::Child(c) => c.validate(),
            Filter::Logical(l) => l.validate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_child_filter_accessors() {
        let f = ChildFilter::new("age", Op::Gt, json!(30)).unwrap();
        assert_eq!(f.field(), "age");
        assert_eq!(f.op(), Op::Gt);
        assert_eq!(f.value(), &json!(30));
        assert_eq!(f.encoded_value().unwrap(), "=:230");
    }

    #[test]
    fn test_child_filter_rejects_bad_field() {
        assert!(ChildFilter::new("a/b", Op::Eq, json!(1)).is_err());
        assert!(ChildFilter::new("", Op::Eq, json!(1)).is_err());
    }

    #[test]
    fn test_child_filter_rejects_container_value() {
        assert!(ChildFilter::new("a", Op::Eq, json!({"x": 1})).is_err());
    }

    #[test]
    fn test_ordering_needs_number_or_string() {
        assert!(ChildFilter::new("a", Op::Lt, json!(true)).is_err());
        assert!(ChildFilter::new("a", Op::Ge, json!(null)).is_err());
        assert!(ChildFilter::new("a", Op::Ne, json!(null)).is_ok());
        assert!(ChildFilter::new("a", Op::Le, json!("m")).is_ok());
    }

    #[test]
    fn test_type_range_brackets_encoded_values() {
        let f = ChildFilter::new("n", Op::Lt, json!(1)).unwrap();
        let (low, high) = f.type_range().unwrap();
        for n in ["-100", "0", "2.5", "1e9"] {
            let enc = crate::record::encode_number(n).unwrap();
            assert!(enc >= low && enc < high);
        }
        assert!(crate::record::encode_string("x") >= high);
    }

    #[test]
    fn test_logical_needs_two() {
        let one = Filter::equals("a", json!(1)).unwrap();
        assert!(Filter::and(vec![one.clone()]).is_err());
        assert!(Filter::or(vec![one.clone(), one]).is_ok());
    }

    #[test]
    fn test_filter_serde_round_trip() {
        let f = Filter::or(vec![
            Filter::equals("a", json!("x")).unwrap(),
            Filter::child("b", Op::Le, json!(3)).unwrap(),
        ])
        .unwrap();
        let text = serde_json::to_string(&f).unwrap();
        let back: Filter = serde_json::from_str(&text).unwrap();
        assert_eq!(back, f);
        assert!(back.validate().is_ok());
    }

    #[test]
    fn test_deserialized_filter_is_revalidated() {
        let text = r#"{"logical":{"op":"and","filters":[]}}"#;
        let f: Filter = serde_json::from_str(text).unwrap();
        assert!(f.validate().is_err());
    }
}
