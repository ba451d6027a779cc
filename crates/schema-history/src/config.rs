#![forbid(unsafe_code)]

//! Operation log configuration.
//!
//! ```toml
//! # schema-history.toml
//! max_size = 250
//! ```
//!
//! ```rust,ignore
//! let config = HistoryConfig::from_toml_file("schema-history.toml")?;
//! let list = OperationList::new(config)?;
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{HistoryError, HistoryResult};

/// Default number of operations kept in history.
pub const DEFAULT_MAX_SIZE: usize = 500;

/// Configuration for an [`OperationList`](crate::oplog::OperationList).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of operations kept. The oldest operation is evicted
    /// when a registration pushes the log past this bound.
    pub max_size: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
        }
    }
}

impl HistoryConfig {
    /// Create a configuration with the given capacity.
    #[must_use]
    pub const fn new(max_size: usize) -> Self {
        Self { max_size }
    }

    /// Load from a JSON string.
    pub fn from_json_str(s: &str) -> HistoryResult<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Load from a JSON file on disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> HistoryResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Load from a TOML string.
    #[cfg(feature = "toml-config")]
    pub fn from_toml_str(s: &str) -> HistoryResult<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "toml-config")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> HistoryResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Check parameter ranges. An empty list means the config is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.max_size == 0 {
            errors.push("max_size must be at least 1".to_owned());
        }
        errors
    }

    pub(crate) fn ensure_valid(&self) -> HistoryResult<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(HistoryError::InvalidConfig(errors.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = HistoryConfig::default();
        assert_eq!(config.max_size, DEFAULT_MAX_SIZE);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let config = HistoryConfig::new(0);
        assert_eq!(config.validate().len(), 1);
        assert!(matches!(
            config.ensure_valid(),
            Err(HistoryError::InvalidConfig(_))
        ));
    }

    #[test]
    fn json_missing_fields_use_defaults() {
        let config = HistoryConfig::from_json_str("{}").unwrap();
        assert_eq!(config, HistoryConfig::default());

        let config = HistoryConfig::from_json_str(r#"{"max_size": 12}"#).unwrap();
        assert_eq!(config.max_size, 12);
    }

    #[test]
    fn json_garbage_is_an_error() {
        assert!(matches!(
            HistoryConfig::from_json_str("{max_size"),
            Err(HistoryError::Json(_))
        ));
    }

    #[test]
    fn json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, r#"{"max_size": 3}"#).unwrap();
        assert_eq!(HistoryConfig::from_json_file(&path).unwrap().max_size, 3);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            HistoryConfig::from_json_file(dir.path().join("absent.json")),
            Err(HistoryError::Io(_))
        ));
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn toml_loading() {
        let config = HistoryConfig::from_toml_str("max_size = 42\n").unwrap();
        assert_eq!(config.max_size, 42);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.toml");
        std::fs::write(&path, "max_size = 7\n").unwrap();
        assert_eq!(HistoryConfig::from_toml_file(&path).unwrap().max_size, 7);
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn toml_wrong_type_is_an_error() {
        assert!(matches!(
            HistoryConfig::from_toml_str("max_size = \"lots\"\n"),
            Err(HistoryError::Toml(_))
        ));
    }
}
