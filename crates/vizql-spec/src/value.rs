//! Structural row values
//!
//! Query results and filter literals are tagged scalars instead of untyped
//! JSON, so aggregation and comparison logic is exhaustively checkable.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// A single result cell or filter literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<ScalarValue>),
}

/// One result row: field name to scalar.
pub type Row = HashMap<String, ScalarValue>;

impl ScalarValue {
    /// Numeric view. Strings parse like the lenient front-end coercion the
    /// contract inherited; non-numeric values are None.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Int(i) => Some(*i as f64),
            ScalarValue::Float(f) => Some(*f),
            ScalarValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }

    pub fn is_textual(&self) -> bool {
        matches!(self, ScalarValue::String(_))
    }

    /// Display / grouping-key form. Distinct values are keyed by this
    /// rendering, so `1` and `"1"` coalesce, matching the source contract.
    pub fn label(&self) -> String {
        match self {
            ScalarValue::Null => String::new(),
            ScalarValue::Bool(b) => b.to_string(),
            ScalarValue::Int(i) => i.to_string(),
            ScalarValue::Float(f) => f.to_string(),
            ScalarValue::String(s) => s.clone(),
            ScalarValue::List(items) => items
                .iter()
                .map(ScalarValue::label)
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    /// Equality with numeric coercion: `Int(5)` equals `Float(5.0)` and
    /// `String("5")`.
    pub fn loose_eq(&self, other: &ScalarValue) -> bool {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => self == other,
        }
    }

    /// Total ordering used by `sortBy`: numeric when both sides coerce,
    /// label comparison otherwise. Nulls sort first.
    pub fn compare(&self, other: &ScalarValue) -> Ordering {
        match (self, other) {
            (ScalarValue::Null, ScalarValue::Null) => Ordering::Equal,
            (ScalarValue::Null, _) => Ordering::Less,
            (_, ScalarValue::Null) => Ordering::Greater,
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
                _ => self.label().cmp(&other.label()),
            },
        }
    }

    /// Membership test for `in`/`nin` filters; non-list operands never match.
    pub fn contains_value(&self, needle: &ScalarValue) -> bool {
        match self {
            ScalarValue::List(items) => items.iter().any(|v| v.loose_eq(needle)),
            _ => false,
        }
    }
}

impl From<&str> for ScalarValue {
    fn from(s: &str) -> Self {
        ScalarValue::String(s.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(s: String) -> Self {
        ScalarValue::String(s)
    }
}

impl From<i64> for ScalarValue {
    fn from(i: i64) -> Self {
        ScalarValue::Int(i)
    }
}

impl From<f64> for ScalarValue {
    fn from(f: f64) -> Self {
        ScalarValue::Float(f)
    }
}

impl From<bool> for ScalarValue {
    fn from(b: bool) -> Self {
        ScalarValue::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untagged_parse() {
        let v: ScalarValue = serde_json::from_str("null").unwrap();
        assert!(v.is_null());
        let v: ScalarValue = serde_json::from_str("42").unwrap();
        assert_eq!(v, ScalarValue::Int(42));
        let v: ScalarValue = serde_json::from_str("4.5").unwrap();
        assert_eq!(v, ScalarValue::Float(4.5));
        let v: ScalarValue = serde_json::from_str("[\"a\", 1]").unwrap();
        assert_eq!(
            v,
            ScalarValue::List(vec![ScalarValue::String("a".into()), ScalarValue::Int(1)])
        );
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(ScalarValue::String(" 12.5 ".into()).as_f64(), Some(12.5));
        assert!(ScalarValue::Int(5).loose_eq(&ScalarValue::Float(5.0)));
        assert!(ScalarValue::String("5".into()).loose_eq(&ScalarValue::Int(5)));
        assert!(!ScalarValue::String("five".into()).loose_eq(&ScalarValue::Int(5)));
    }

    #[test]
    fn test_ordering() {
        assert_eq!(
            ScalarValue::Int(2).compare(&ScalarValue::Float(10.0)),
            Ordering::Less
        );
        assert_eq!(
            ScalarValue::String("b".into()).compare(&ScalarValue::String("a".into())),
            Ordering::Greater
        );
        assert_eq!(
            ScalarValue::Null.compare(&ScalarValue::Int(0)),
            Ordering::Less
        );
    }

    #[test]
    fn test_list_membership() {
        let list = ScalarValue::List(vec![ScalarValue::Int(1), ScalarValue::String("x".into())]);
        assert!(list.contains_value(&ScalarValue::Float(1.0)));
        assert!(list.contains_value(&ScalarValue::String("x".into())));
        assert!(!list.contains_value(&ScalarValue::String("y".into())));
        assert!(!ScalarValue::Int(1).contains_value(&ScalarValue::Int(1)));
    }
}
