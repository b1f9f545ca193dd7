//! Scalar field values and composite keys

use crate::core::temporal::Timestamp;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A single field value.
///
/// Scalars are totally ordered so that keys can be sorted and hashed:
/// values of different variants order by variant, floats by `total_cmp`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(Timestamp),
}

impl Scalar {
    fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Int(_) => 2,
            Self::Float(_) => 3,
            Self::Text(_) => 4,
            Self::Timestamp(_) => 5,
        }
    }

    /// Whether this is `Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Convert a JSON scalar; arrays and objects are rejected
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        use serde_json::Value;

        match value {
            Value::Null => Ok(Self::Null),
            Value::Bool(b) => Ok(Self::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(Self::Int(i)),
                None => n
                    .as_f64()
                    .map(Self::Float)
                    .ok_or_else(|| Error::Serialization(format!("unsupported number: {n}"))),
            },
            Value::String(s) => Ok(Self::Text(s.clone())),
            other => Err(Error::Serialization(format!(
                "expected a scalar value, got {other}"
            ))),
        }
    }

    /// Render as JSON; timestamps become RFC 3339 strings
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;

        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Text(s) => Value::String(s.clone()),
            Self::Timestamp(ts) => Value::String(ts.to_string()),
        }
    }
}

impl Ord for Scalar {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Timestamp(a), Self::Timestamp(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Scalar {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scalar {}

impl Hash for Scalar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Self::Null => {}
            Self::Bool(b) => b.hash(state),
            Self::Int(i) => i.hash(state),
            Self::Float(f) => f.to_bits().hash(state),
            Self::Text(s) => s.hash(state),
            Self::Timestamp(ts) => ts.hash(state),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::Timestamp(ts) => write!(f, "{ts}"),
        }
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for Scalar {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<u32> for Scalar {
    fn from(i: u32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Scalar {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Timestamp> for Scalar {
    fn from(ts: Timestamp) -> Self {
        Self::Timestamp(ts)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Ordered tuple of key-field values identifying one logical entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key(Vec<Scalar>);

impl Key {
    pub fn new(values: Vec<Scalar>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[Scalar] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{value}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn test_scalar_ordering_across_variants() {
        let mut values = vec![
            Scalar::from("b"),
            Scalar::from(2),
            Scalar::Null,
            Scalar::from(1.5),
            Scalar::from("a"),
            Scalar::from(true),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                Scalar::Null,
                Scalar::from(true),
                Scalar::from(2),
                Scalar::from(1.5),
                Scalar::from("a"),
                Scalar::from("b"),
            ]
        );
    }

    #[test]
    fn test_float_equality_is_total() {
        assert_eq!(Scalar::Float(f64::NAN), Scalar::Float(f64::NAN));
        assert_ne!(Scalar::Int(1), Scalar::Float(1.0));
    }

    #[test]
    fn test_keys_hash_by_value() {
        let mut set = HashSet::new();
        set.insert(Key::new(vec!["AAPL".into(), "vendor1".into()]));
        assert!(set.contains(&Key::new(vec!["AAPL".into(), "vendor1".into()])));
        assert!(!set.contains(&Key::new(vec!["AAPL".into(), "vendor2".into()])));
    }

    #[test]
    fn test_json_conversion() {
        assert_eq!(Scalar::from_json(&json!(150)).unwrap(), Scalar::Int(150));
        assert_eq!(Scalar::from_json(&json!(1.25)).unwrap(), Scalar::Float(1.25));
        assert_eq!(Scalar::from_json(&json!("x")).unwrap(), Scalar::from("x"));
        assert_eq!(Scalar::from_json(&json!(null)).unwrap(), Scalar::Null);
        assert!(Scalar::from_json(&json!([1, 2])).is_err());
        assert!(Scalar::from_json(&json!({"a": 1})).is_err());

        assert_eq!(Scalar::Int(7).to_json(), json!(7));
    }

    #[test]
    fn test_key_display() {
        let key = Key::new(vec!["MSFT".into(), "vendor1".into()]);
        assert_eq!(key.to_string(), "(MSFT, vendor1)");
    }
}
