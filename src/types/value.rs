//! Runtime values

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::DataType;
use crate::aggregation::AggregationState;

/// A single typed cell value.
///
/// Equality and hashing are structural; floating point values compare by
/// bit pattern so a `Value` can key a hash map and sit inside a hashable
/// symbol tree. SQL comparison semantics live in [`Value::compare`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Null,
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    /// Milliseconds since the Unix epoch
    Timestamp(i64),
    State(Box<AggregationState>),
}

impl Value {
    /// Creates a timestamp value from a UTC datetime
    pub fn timestamp(at: DateTime<Utc>) -> Self {
        Value::Timestamp(at.timestamp_millis())
    }

    /// Logical type of this value; `Undefined` for NULL
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Undefined,
            Value::Boolean(_) => DataType::Boolean,
            Value::Byte(_) => DataType::Byte,
            Value::Short(_) => DataType::Short,
            Value::Integer(_) => DataType::Integer,
            Value::Long(_) => DataType::Long,
            Value::Float(_) => DataType::Float,
            Value::Double(_) => DataType::Double,
            Value::String(_) => DataType::String,
            Value::Timestamp(_) => DataType::Timestamp,
            Value::State(_) => DataType::AggregationState,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether this value may be stored in a column of `data_type`
    pub fn fits(&self, data_type: DataType) -> bool {
        self.is_null() || self.data_type() == data_type
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integral value widened to i64 (timestamps included)
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Byte(v) => Some(i64::from(*v)),
            Value::Short(v) => Some(i64::from(*v)),
            Value::Integer(v) => Some(i64::from(*v)),
            Value::Long(v) | Value::Timestamp(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric or timestamp value coerced to double
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(f64::from(*v)),
            Value::Double(v) => Some(*v),
            Value::Long(v) | Value::Timestamp(v) => Some(*v as f64),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    /// SQL comparison of two non-null values.
    ///
    /// Integral values compare exactly, mixed numeric values compare as
    /// doubles. Returns `None` when either side is null or the types are
    /// not comparable with each other.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        let left = self.data_type();
        let right = other.data_type();
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            _ if left.is_integral() && right.is_integral() => {
                Some(self.as_i64()?.cmp(&other.as_i64()?))
            }
            _ if left.is_numeric() && right.is_numeric() => {
                Some(self.as_f64()?.total_cmp(&other.as_f64()?))
            }
            _ => None,
        }
    }

    fn discriminant(&self) -> u8 {
        self.data_type().id()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Short(a), Value::Short(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::State(a), Value::State(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.discriminant().hash(state);
        match self {
            Value::Null | Value::State(_) => {}
            Value::Boolean(v) => v.hash(state),
            Value::Byte(v) => v.hash(state),
            Value::Short(v) => v.hash(state),
            Value::Integer(v) => v.hash(state),
            Value::Long(v) | Value::Timestamp(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::Double(v) => v.to_bits().hash(state),
            Value::String(v) => v.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Byte(v) => write!(f, "{v}"),
            Value::Short(v) => write!(f, "{v}"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "'{v}'"),
            Value::Timestamp(millis) => match DateTime::<Utc>::from_timestamp_millis(*millis) {
                Some(at) => write!(f, "{}", at.to_rfc3339_opts(SecondsFormat::Millis, true)),
                None => write!(f, "{millis}"),
            },
            Value::State(state) => write!(f, "<{} state>", state.kind_name()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Short(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    #[test]
    fn test_data_type_of_values() {
        assert_eq!(Value::Null.data_type(), DataType::Undefined);
        assert_eq!(Value::from(3i32).data_type(), DataType::Integer);
        assert_eq!(Value::from("x").data_type(), DataType::String);
    }

    #[test]
    fn test_mixed_numeric_comparison() {
        assert_eq!(
            Value::Integer(3).compare(&Value::Long(3)),
            Some(Ordering::Equal)
        );
        assert_eq!(
            Value::Short(2).compare(&Value::Double(2.5)),
            Some(Ordering::Less)
        );
        assert_eq!(Value::Integer(1).compare(&Value::from("1")), None);
        assert_eq!(Value::Null.compare(&Value::Null), None);
    }

    #[test]
    fn test_float_equality_is_bitwise() {
        assert_eq!(Value::Double(f64::NAN), Value::Double(f64::NAN));
        assert_ne!(Value::Double(0.0), Value::Double(-0.0));
    }

    #[test]
    fn test_values_are_hashable() {
        let mut set = HashSet::new();
        set.insert(Value::from("a"));
        set.insert(Value::from("a"));
        set.insert(Value::Double(1.0));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_timestamp_display() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let value = Value::timestamp(at);
        assert_eq!(value.to_string(), "2024-01-02T03:04:05.000Z");
        assert_eq!(value.as_f64(), Some(at.timestamp_millis() as f64));
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some(4i64)), Value::Long(4));
    }
}
