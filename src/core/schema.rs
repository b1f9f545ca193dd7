//! Table schema: the fixed key and value field lists of a table

use crate::core::record::{Candidate, KeyFilter, RecordInput, VersionedRecord};
use crate::core::value::{Key, Scalar};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Inclusive start of a version's validity
pub const FROM_TIME: &str = "from_time";
/// Exclusive end of a version's validity
pub const TO_TIME: &str = "to_time";
/// Instant of the last physical mutation of a row
pub const CHANGE_TIME: &str = "change_time";
/// Tag added to rows returned by snapshot queries
pub const SNAPSHOT_TIME: &str = "snapshot_time";

const RESERVED_FIELDS: [&str; 4] = [FROM_TIME, TO_TIME, CHANGE_TIME, SNAPSHOT_TIME];

/// Ordered key and value field names, fixed for the lifetime of a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    key_fields: Vec<String>,
    value_fields: Vec<String>,
}

impl Schema {
    /// Build a schema, rejecting empty, duplicate, or reserved field names
    pub fn new<K, V>(key_fields: K, value_fields: V) -> Result<Self>
    where
        K: IntoIterator,
        K::Item: Into<String>,
        V: IntoIterator,
        V::Item: Into<String>,
    {
        let key_fields: Vec<String> = key_fields.into_iter().map(Into::into).collect();
        let value_fields: Vec<String> = value_fields.into_iter().map(Into::into).collect();

        if key_fields.is_empty() {
            return Err(Error::InvalidConfiguration(
                "at least one key field is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for name in key_fields.iter().chain(value_fields.iter()) {
            if name.trim().is_empty() {
                return Err(Error::InvalidConfiguration("empty field name".to_string()));
            }
            if RESERVED_FIELDS.contains(&name.as_str()) {
                return Err(Error::InvalidConfiguration(format!(
                    "field name {name:?} is reserved"
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(Error::InvalidConfiguration(format!(
                    "duplicate field name {name:?}"
                )));
            }
        }

        Ok(Self {
            key_fields,
            value_fields,
        })
    }

    pub fn key_fields(&self) -> &[String] {
        &self.key_fields
    }

    pub fn value_fields(&self) -> &[String] {
        &self.value_fields
    }

    /// Whether `name` is a key or value field
    pub fn contains(&self, name: &str) -> bool {
        self.key_position(name).is_some() || self.value_fields.iter().any(|f| f == name)
    }

    fn key_position(&self, name: &str) -> Option<usize> {
        self.key_fields.iter().position(|f| f == name)
    }

    /// Look up a key or value field of a record by name
    pub fn field_value<'a>(&self, record: &'a VersionedRecord, name: &str) -> Option<&'a Scalar> {
        match self.key_position(name) {
            Some(pos) => record.key.values().get(pos),
            None => record.values.get(name),
        }
    }

    /// Names of required input fields absent from `input`, in schema order
    pub fn missing_fields(&self, input: &RecordInput) -> Vec<String> {
        let mut missing: Vec<String> = self
            .key_fields
            .iter()
            .filter(|f| input.get(f).is_none())
            .cloned()
            .collect();
        if input.time().is_none() {
            missing.push(FROM_TIME.to_string());
        }
        missing.extend(
            self.value_fields
                .iter()
                .filter(|f| input.get(f).is_none())
                .cloned(),
        );
        missing
    }

    /// Validate an input record and turn it into an insertable candidate
    pub fn candidate(&self, input: &RecordInput) -> Result<Candidate> {
        let missing = self.missing_fields(input);
        if !missing.is_empty() {
            return Err(Error::MissingFields(missing));
        }
        if let Some(unknown) = input.field_names().find(|name| !self.contains(name)) {
            return Err(Error::UnknownField(unknown.to_string()));
        }

        let mut key = Vec::with_capacity(self.key_fields.len());
        for name in &self.key_fields {
            key.push(input.get(name).cloned().unwrap_or(Scalar::Null));
        }
        let values: BTreeMap<String, Scalar> = self
            .value_fields
            .iter()
            .map(|name| (name.clone(), input.get(name).cloned().unwrap_or(Scalar::Null)))
            .collect();
        let from_time = match input.time() {
            Some(time) => time.resolve()?,
            None => return Err(Error::MissingFields(vec![FROM_TIME.to_string()])),
        };

        Ok(Candidate {
            key: Key::new(key),
            values,
            from_time,
        })
    }

    /// Reject filters naming fields outside the schema
    pub fn check_filter(&self, filter: &KeyFilter) -> Result<()> {
        match filter.field_names().find(|name| !self.contains(name)) {
            Some(unknown) => Err(Error::UnknownField(unknown.to_string())),
            None => Ok(()),
        }
    }

    /// The full key a filter pins down, when it constrains exactly the key fields
    pub fn exact_key(&self, filter: &KeyFilter) -> Option<Key> {
        if filter.len() != self.key_fields.len() {
            return None;
        }
        self.key_fields
            .iter()
            .map(|name| filter.get(name).cloned())
            .collect::<Option<Vec<_>>>()
            .map(Key::new)
    }

    /// Whether `record` equals the filter on every constrained field
    pub fn matches(&self, filter: &KeyFilter, record: &VersionedRecord) -> bool {
        filter
            .iter()
            .all(|(name, expected)| self.field_value(record, name) == Some(expected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::new(["symbol", "source"], ["price", "volume"]).unwrap()
    }

    #[test]
    fn test_schema_rejects_bad_names() {
        assert!(matches!(
            Schema::new(Vec::<String>::new(), ["price"]),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(matches!(
            Schema::new(["symbol"], ["symbol"]),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(matches!(
            Schema::new(["symbol"], ["to_time"]),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(matches!(
            Schema::new([""], ["price"]),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_candidate_orders_key_by_schema() {
        let input = RecordInput::new()
            .field("source", "vendor1")
            .field("symbol", "AAPL")
            .field("price", 150)
            .field("volume", 10_000)
            .from_time("2024-01-01");

        let candidate = schema().candidate(&input).unwrap();
        assert_eq!(candidate.key, Key::new(vec!["AAPL".into(), "vendor1".into()]));
        assert_eq!(candidate.values.get("price"), Some(&Scalar::Int(150)));
    }

    #[test]
    fn test_candidate_reports_every_missing_field() {
        let input = RecordInput::new().field("symbol", "AAPL").field("price", 1);

        match schema().candidate(&input) {
            Err(Error::MissingFields(fields)) => {
                assert_eq!(fields, vec!["source", "from_time", "volume"]);
            }
            other => panic!("expected MissingFields, got {other:?}"),
        }
    }

    #[test]
    fn test_candidate_rejects_engine_managed_fields() {
        let input = RecordInput::new()
            .field("symbol", "AAPL")
            .field("source", "vendor1")
            .field("price", 1)
            .field("volume", 1)
            .field("to_time", "2024-02-01")
            .from_time("2024-01-01");

        assert!(matches!(
            schema().candidate(&input),
            Err(Error::UnknownField(name)) if name == "to_time"
        ));
    }

    #[test]
    fn test_exact_key_requires_all_key_fields() {
        let schema = schema();
        let partial = KeyFilter::new().field("symbol", "AAPL");
        let full = KeyFilter::new().field("symbol", "AAPL").field("source", "vendor1");

        assert_eq!(schema.exact_key(&partial), None);
        assert_eq!(
            schema.exact_key(&full),
            Some(Key::new(vec!["AAPL".into(), "vendor1".into()]))
        );
        assert!(schema.check_filter(&KeyFilter::new().field("exchange", "X")).is_err());
    }
}
