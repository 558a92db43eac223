//! Runtime configuration, read from TOML.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Settings of one [`runtime`](crate::runtime) instance. Every field has a default, so an empty
/// document is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `tracing` filter directive used when `TIDEWATER_LOG` is unset.
    pub log_filter: String,
    /// When deferred native work is flushed.
    pub flush: FlushPolicy,
    /// List virtualization settings.
    pub list: ListConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: "info".to_owned(),
            flush: FlushPolicy::default(),
            list: ListConfig::default(),
        }
    }
}

/// When deferred native work is flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushPolicy {
    /// Only at the end of every commit.
    #[default]
    Commit,
    /// At the end of every commit, and from the toolkit idle hook for list mutations made
    /// outside a commit.
    Idle,
}

/// List virtualization settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListConfig {
    /// Render the item placeholder into freshly set up and unbound cells.
    pub overscan_placeholder: bool,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            overscan_placeholder: true,
        }
    }
}

impl Config {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) when the document is malformed.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) when the file cannot be read and
    /// [`Error::Config`](crate::Error::Config) when it is malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Renders the configuration as TOML.
    #[must_use]
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, FlushPolicy};

    #[test]
    fn empty_document_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.log_filter, "info");
        assert!(config.list.overscan_placeholder);
    }

    #[test]
    fn partial_document_overrides_fields() {
        let config = Config::from_toml_str(
            r#"
            log_filter = "tidewater=trace"
            flush = "idle"

            [list]
            overscan_placeholder = false
            "#,
        )
        .unwrap();
        assert_eq!(config.log_filter, "tidewater=trace");
        assert_eq!(config.flush, FlushPolicy::Idle);
        assert!(!config.list.overscan_placeholder);
    }

    #[test]
    fn malformed_documents_are_rejected() {
        let error = Config::from_toml_str("flush = \"sometimes\"").unwrap_err();
        assert!(error.to_string().starts_with("invalid configuration"));
    }

    #[test]
    fn rendered_configuration_parses_back() {
        let config = Config {
            flush: FlushPolicy::Idle,
            ..Config::default()
        };
        assert_eq!(Config::from_toml_str(&config.to_toml_string()).unwrap(), config);
    }
}
