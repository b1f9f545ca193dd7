//! Store configuration loaded from JSON

use crate::core::schema::Schema;
use crate::engine::{OverlapMode, VersionedTable};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_overlap_mode() -> String {
    OverlapMode::default().to_string()
}

/// Schema and default overlap mode of a table.
///
/// ```json
/// {
///   "key_fields": ["symbol", "source"],
///   "value_fields": ["price", "volume"],
///   "default_overlap_mode": "replace"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub key_fields: Vec<String>,
    #[serde(default)]
    pub value_fields: Vec<String>,
    /// One of `raise`, `skip`, `replace`
    #[serde(default = "default_overlap_mode")]
    pub default_overlap_mode: String,
}

impl StoreConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn schema(&self) -> Result<Schema> {
        Schema::new(self.key_fields.clone(), self.value_fields.clone())
    }

    pub fn overlap_mode(&self) -> Result<OverlapMode> {
        self.default_overlap_mode.parse()
    }

    /// Validate the configuration and create an empty table
    pub fn build_table(&self) -> Result<VersionedTable> {
        let mode = self.overlap_mode()?;
        Ok(VersionedTable::new(self.schema()?, mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_parse_full_config() {
        let config = StoreConfig::from_json_str(
            r#"{"key_fields": ["symbol", "source"], "value_fields": ["price", "volume"], "default_overlap_mode": "replace"}"#,
        )
        .unwrap();

        let table = config.build_table().unwrap();
        assert_eq!(table.default_mode(), OverlapMode::Replace);
        assert_eq!(table.schema().key_fields(), ["symbol", "source"]);
    }

    #[test]
    fn test_mode_defaults_to_raise() {
        let config = StoreConfig::from_json_str(r#"{"key_fields": ["id"]}"#).unwrap();
        assert_eq!(config.overlap_mode().unwrap(), OverlapMode::Raise);
        assert!(config.schema().unwrap().value_fields().is_empty());
    }

    #[test]
    fn test_invalid_mode_is_a_configuration_error() {
        let config = StoreConfig::from_json_str(
            r#"{"key_fields": ["id"], "default_overlap_mode": "overwrite"}"#,
        )
        .unwrap();
        assert!(matches!(config.build_table(), Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            StoreConfig::from_json_str("{"),
            Err(Error::Serialization(_))
        ));
    }
}
