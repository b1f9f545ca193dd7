//! Versioned rows and the caller-facing input types that produce them

use crate::core::schema::FROM_TIME;
use crate::core::temporal::{Interval, TimeInput, Timestamp};
use crate::core::value::{Key, Scalar};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One version of one logical entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedRecord {
    /// Key-field values, in schema order
    pub key: Key,
    /// Value-field values by name
    pub values: BTreeMap<String, Scalar>,
    /// Inclusive start of validity
    pub from_time: Timestamp,
    /// Exclusive end of validity; `None` while the version is active
    pub to_time: Option<Timestamp>,
    /// Last physical mutation of this row
    pub change_time: Timestamp,
}

impl VersionedRecord {
    pub fn interval(&self) -> Interval {
        Interval {
            from: self.from_time,
            to: self.to_time,
        }
    }

    pub fn is_open(&self) -> bool {
        self.to_time.is_none()
    }

    /// Whether this version was valid at `ts`
    pub fn is_active_at(&self, ts: Timestamp) -> bool {
        self.interval().contains(ts)
    }

    pub fn value(&self, name: &str) -> Option<&Scalar> {
        self.values.get(name)
    }
}

/// A schema-validated record ready for insertion
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub key: Key,
    pub values: BTreeMap<String, Scalar>,
    pub from_time: Timestamp,
}

impl Candidate {
    /// Materialize as an open row
    pub fn into_open_record(self, change_time: Timestamp) -> VersionedRecord {
        VersionedRecord {
            key: self.key,
            values: self.values,
            from_time: self.from_time,
            to_time: None,
            change_time,
        }
    }
}

/// Caller-supplied record: field values by name plus `from_time`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordInput {
    fields: BTreeMap<String, Scalar>,
    from_time: Option<TimeInput>,
}

impl RecordInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a key or value field
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Set the start of validity
    pub fn from_time(mut self, time: impl Into<TimeInput>) -> Self {
        self.from_time = Some(time.into());
        self
    }

    /// Build from a JSON object such as
    /// `{"symbol": "AAPL", "from_time": "2024-01-01", "price": 150}`
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            Error::Serialization(format!("expected a JSON object record, got {value}"))
        })?;

        let mut input = Self::new();
        for (name, value) in object {
            if name == FROM_TIME {
                let text = value.as_str().ok_or_else(|| {
                    Error::Temporal(format!("{FROM_TIME} must be a string, got {value}"))
                })?;
                input = input.from_time(text);
            } else {
                input = input.field(name.clone(), Scalar::from_json(value)?);
            }
        }
        Ok(input)
    }

    /// Build a batch from a JSON array of record objects
    pub fn batch_from_json(value: &serde_json::Value) -> Result<Vec<Self>> {
        let records = value.as_array().ok_or_else(|| {
            Error::Serialization(format!("expected a JSON array of records, got {value}"))
        })?;
        records.iter().map(Self::from_json).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Scalar> {
        self.fields.get(name)
    }

    pub fn time(&self) -> Option<&TimeInput> {
        self.from_time.as_ref()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

/// Exact-match filter over any subset of key and value fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyFilter {
    fields: BTreeMap<String, Scalar>,
}

impl KeyFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Parse a `name=value` pair; the value is read as JSON when possible
    /// and as plain text otherwise.
    pub fn parse_pair(mut self, pair: &str) -> Result<Self> {
        let (name, raw) = pair
            .split_once('=')
            .ok_or_else(|| Error::Serialization(format!("expected name=value, got {pair:?}")))?;
        let value = match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(json) => Scalar::from_json(&json).unwrap_or_else(|_| Scalar::from(raw)),
            Err(_) => Scalar::from(raw),
        };
        self.fields.insert(name.trim().to_string(), value);
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Scalar> {
        self.fields.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_input_from_json() {
        let input = RecordInput::from_json(&json!({
            "symbol": "AAPL",
            "source": "vendor1",
            "from_time": "2024-01-01",
            "price": 150,
            "volume": 10000
        }))
        .unwrap();

        assert_eq!(input.get("symbol"), Some(&Scalar::from("AAPL")));
        assert_eq!(input.get("price"), Some(&Scalar::Int(150)));
        assert_eq!(
            input.time().unwrap().resolve().unwrap(),
            Timestamp::parse("2024-01-01").unwrap()
        );
        assert!(input.get(FROM_TIME).is_none());
    }

    #[test]
    fn test_batch_from_json() {
        let batch = RecordInput::batch_from_json(&json!([
            {"symbol": "AAPL", "from_time": "2024-01-01"},
            {"symbol": "MSFT", "from_time": "2024-01-02"}
        ]))
        .unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1].get("symbol"), Some(&Scalar::from("MSFT")));
        assert!(RecordInput::batch_from_json(&json!({"symbol": "AAPL"})).is_err());
    }

    #[test]
    fn test_input_from_json_rejects_non_objects() {
        assert!(RecordInput::from_json(&json!([1, 2])).is_err());
        assert!(RecordInput::from_json(&json!({"from_time": 5})).is_err());
    }

    #[test]
    fn test_record_activity() {
        let record = VersionedRecord {
            key: Key::new(vec!["K".into()]),
            values: BTreeMap::new(),
            from_time: Timestamp::from_secs(10),
            to_time: Some(Timestamp::from_secs(20)),
            change_time: Timestamp::from_secs(30),
        };

        assert!(record.is_active_at(Timestamp::from_secs(10)));
        assert!(!record.is_active_at(Timestamp::from_secs(20)));
        assert!(!record.is_open());
    }

    #[test]
    fn test_filter_pair_parsing() {
        let filter = KeyFilter::new()
            .parse_pair("symbol=AAPL")
            .unwrap()
            .parse_pair("price=150")
            .unwrap();

        assert_eq!(filter.get("symbol"), Some(&Scalar::from("AAPL")));
        assert_eq!(filter.get("price"), Some(&Scalar::Int(150)));
        assert!(KeyFilter::new().parse_pair("symbol").is_err());
    }
}
