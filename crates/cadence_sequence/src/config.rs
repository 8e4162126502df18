//! Sequencing configuration (cadence.toml / `[config]` tables)

use crate::error::{Result, SequenceError};
use crate::transition::{DEFAULT_DELAY_MS, DEFAULT_DURATION_MS};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Defaults applied to hosts and items
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct SequenceConfig {
    /// Duration assumed for descriptors that carry none
    #[serde(default = "default_duration")]
    pub default_duration_ms: u64,
    /// Post-delay for items that do not set one
    #[serde(default = "default_delay")]
    pub default_delay_ms: u64,
    /// Run the enter sequence as soon as a scope is created
    #[serde(default = "default_true")]
    pub start_by_default: bool,
}

fn default_duration() -> u64 {
    DEFAULT_DURATION_MS
}

fn default_delay() -> u64 {
    DEFAULT_DELAY_MS
}

fn default_true() -> bool {
    true
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            default_duration_ms: default_duration(),
            default_delay_ms: default_delay(),
            start_by_default: true,
        }
    }
}

impl SequenceConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SequenceConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded sequence config");
        Ok(config)
    }

    /// Reject values the scheduler cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.default_duration_ms == 0 {
            return Err(SequenceError::Config(
                "default_duration_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Builder-style override of the autostart flag
    pub fn start_by_default(mut self, start: bool) -> Self {
        self.start_by_default = start;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = SequenceConfig::from_toml_str("").unwrap();
        assert_eq!(config, SequenceConfig::default());
        assert_eq!(config.default_duration_ms, 300);
        assert_eq!(config.default_delay_ms, 400);
        assert!(config.start_by_default);
    }

    #[test]
    fn test_partial_document() {
        let config = SequenceConfig::from_toml_str(
            r#"
            default_delay_ms = 120
            start_by_default = false
            "#,
        )
        .unwrap();
        assert_eq!(config.default_duration_ms, 300);
        assert_eq!(config.default_delay_ms, 120);
        assert!(!config.start_by_default);
    }

    #[test]
    fn test_zero_default_duration_rejected() {
        let err = SequenceConfig::from_toml_str("default_duration_ms = 0").unwrap_err();
        assert!(matches!(err, SequenceError::Config(_)));
    }

    #[test]
    fn test_malformed_document() {
        let err = SequenceConfig::from_toml_str("default_delay_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, SequenceError::ConfigParse(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = SequenceConfig::load(Path::new("/nonexistent/cadence.toml")).unwrap_err();
        assert!(matches!(err, SequenceError::Io(_)));
    }
}
