//! `SIValue` — the tagged scalar union that flows through records, property
//! maps, and expression evaluation.
//!
//! Two orderings are defined over [`Value`]: [`order`] (`SIValue_Order`), a
//! total order used for sorting and the `ValueHashJoin` build phase, and
//! [`compare`] (`SIValue_Compare`), the partial equality used by predicate
//! evaluation where null never equals anything, including another null.

use std::borrow::Cow;
use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::model::{EdgeId, NodeId};

/// Which temporal flavor a [`Temporal`] value represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TemporalKind {
    Date,
    Time,
    LocalTime,
    DateTime,
    LocalDateTime,
}

/// A temporal scalar, stored as a `(seconds, nanos, kind)` triple so that
/// arithmetic never needs to round-trip through a calendar library.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Temporal {
    pub seconds: i64,
    pub nanos: u32,
    pub kind: TemporalKind,
}

impl Temporal {
    pub fn new(seconds: i64, nanos: u32, kind: TemporalKind) -> Self {
        Self {
            seconds,
            nanos,
            kind,
        }
    }

    /// Adds a duration expressed in nanoseconds, returning `None` on overflow
    /// rather than an in-band sentinel value.
    pub fn checked_add_nanos(&self, delta_nanos: i128) -> Option<Temporal> {
        let total = (self.seconds as i128) * 1_000_000_000 + self.nanos as i128 + delta_nanos;
        let seconds = i64::try_from(total.div_euclid(1_000_000_000)).ok()?;
        let nanos = u32::try_from(total.rem_euclid(1_000_000_000)).ok()?;
        Some(Temporal::new(seconds, nanos, self.kind))
    }
}

/// Tagged scalar value. Strings use [`Cow`] so constant literals referenced
/// directly from the AST never allocate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Cow<'static, str>),
    Bytes(Vec<u8>),
    Node(NodeId),
    Edge(EdgeId),
    Array(Vec<Value>),
    Temporal(Temporal),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::Str(Cow::Owned(s.into()))
    }

    pub const fn borrowed(s: &'static str) -> Self {
        Value::Str(Cow::Borrowed(s))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Truthiness used by filter evaluation: NULL coerces to false, as do
    /// non-boolean types that reach a boolean context (Internal, strictly
    /// this should never happen once the AST is type-checked).
    pub fn truthy(&self) -> bool {
        matches!(self, Value::Bool(true))
    }

    /// Ordinal used by [`order`]; defines type-bucket precedence, not a
    /// claim about which type is "larger".
    fn type_ordinal(&self) -> u8 {
        match self {
            Value::Bool(_) => 0,
            Value::Int(_) => 1,
            Value::Float(_) => 2,
            Value::Str(_) => 3,
            Value::Bytes(_) => 4,
            Value::Node(_) => 5,
            Value::Edge(_) => 6,
            Value::Array(_) => 7,
            Value::Temporal(_) => 8,
            Value::Null => 9,
        }
    }

    fn value_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            (Value::Node(a), Value::Edge(b)) | (Value::Edge(a), Value::Node(b)) => a.cmp(b),
            (Value::Node(a), Value::Node(b)) => a.cmp(b),
            (Value::Edge(a), Value::Edge(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let c = order(x, y);
                    if c != Ordering::Equal {
                        return c;
                    }
                }
                a.len().cmp(&b.len())
            }
            (Value::Temporal(a), Value::Temporal(b)) => (a.seconds, a.nanos)
                .cmp(&(b.seconds, b.nanos))
                .then(a.kind.cmp(&b.kind)),
            (Value::Null, Value::Null) => Ordering::Equal,
            _ => Ordering::Equal,
        }
    }
}

/// `SIValue_Order`: total order, type ordinal first, null sorts last.
pub fn order(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        _ => {
            let ta = a.type_ordinal();
            let tb = b.type_ordinal();
            if ta != tb {
                ta.cmp(&tb)
            } else {
                a.value_cmp(b)
            }
        }
    }
}

/// `SIValue_Compare`: predicate equality. Null is never equal to anything,
/// including another null; mismatched types are never equal.
pub fn compare(a: &Value, b: &Value) -> bool {
    if a.is_null() || b.is_null() {
        return false;
    }
    if a.type_ordinal() != b.type_ordinal() {
        return false;
    }
    a.value_cmp(b) == Ordering::Equal
}

/// Relational ordering for `<`/`<=`/`>`/`>=` filter comparisons: `None` when
/// either side is null or the two sides are different types, matching
/// Cypher's three-valued logic where such a comparison is unknown (and so
/// filters out the row) rather than falling back to [`order`]'s total,
/// type-bucketed ordering used for sorting.
pub fn typed_order(a: &Value, b: &Value) -> Option<Ordering> {
    if a.is_null() || b.is_null() || a.type_ordinal() != b.type_ordinal() {
        return None;
    }
    Some(a.value_cmp(b))
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::string(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(Cow::Owned(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_sorts_null_last() {
        let mut values = vec![Value::Int(3), Value::Null, Value::Int(1)];
        values.sort_by(order);
        assert!(matches!(values[2], Value::Null));
    }

    #[test]
    fn order_buckets_by_type_before_value() {
        // A Bool is always ordered before an Int regardless of value.
        assert_eq!(order(&Value::Bool(true), &Value::Int(0)), Ordering::Less);
    }

    #[test]
    fn compare_rejects_null_equality() {
        assert!(!compare(&Value::Null, &Value::Null));
        assert!(!compare(&Value::Int(1), &Value::Null));
    }

    #[test]
    fn compare_requires_matching_types() {
        assert!(!compare(&Value::Int(1), &Value::Float(1.0)));
        assert!(compare(&Value::Int(1), &Value::Int(1)));
    }
}
