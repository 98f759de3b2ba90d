//! Engine configuration.
//!
//! Every field has a default, so a host only spells out what it changes:
//!
//! ```rust
//! use richtext_core::EngineConfig;
//!
//! let config = EngineConfig::from_json(r#"{ "document_width": 480, "undo_depth": 20 }"#).unwrap();
//! assert_eq!(config.document_width, 480);
//! assert!(!config.allow_break_in_words);
//! ```

use crate::auto_format::AutoFormatConfig;
use crate::error::{EngineError, Result};
use crate::format::Format;
use serde::{Deserialize, Serialize};

/// Default number of undoable commands kept.
pub const DEFAULT_UNDO_DEPTH: usize = 100;

/// Tunables of a [`Document`](crate::Document) and its command history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Width text is laid out in, in layout pixels.
    pub document_width: i32,
    /// Maximum number of commands on the undo stack.
    pub undo_depth: usize,
    /// Break inside a word that is wider than the line.
    pub allow_break_in_words: bool,
    /// Interval of implicit tab stops, in layout pixels.
    pub default_tab_width: i32,
    /// Paragraphs formatted per idle step by hosts using the default budget.
    pub reflow_budget: usize,
    /// Format of text inserted without an explicit format.
    pub default_format: Format,
    /// Corrections applied while typing through the command executor.
    pub auto_format: AutoFormatConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            document_width: 600,
            undo_depth: DEFAULT_UNDO_DEPTH,
            allow_break_in_words: false,
            default_tab_width: 48,
            reflow_budget: 20,
            default_format: Format::default(),
            auto_format: AutoFormatConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.document_width <= 0 {
            return Err(EngineError::Config(format!(
                "document_width must be positive, got {}",
                self.document_width
            )));
        }
        if self.undo_depth == 0 {
            return Err(EngineError::Config("undo_depth must be at least 1".to_string()));
        }
        if self.default_tab_width <= 0 {
            return Err(EngineError::Config(format!(
                "default_tab_width must be positive, got {}",
                self.default_tab_width
            )));
        }
        if self.reflow_budget == 0 {
            return Err(EngineError::Config("reflow_budget must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.undo_depth, 100);
    }

    #[test]
    fn test_nested_format() {
        let config =
            EngineConfig::from_json(r#"{ "default_format": { "family": "Serif", "weight": 700 } }"#)
                .unwrap();
        assert_eq!(config.default_format.family, "Serif");
        assert!(config.default_format.is_bold());
        assert_eq!(config.default_format.point_size, 12);
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            EngineConfig::from_json(r#"{ "undo_depth": 0 }"#),
            Err(EngineError::Config(_))
        ));
        assert!(matches!(
            EngineConfig::from_json(r#"{ "document_width": -5 }"#),
            Err(EngineError::Config(_))
        ));
        assert!(matches!(
            EngineConfig::from_json("not json"),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn test_auto_format_section() {
        let config = EngineConfig::from_json(
            r#"{ "auto_format": { "numbered_lists": true, "bullet_char": "+" } }"#,
        )
        .unwrap();
        assert!(config.auto_format.numbered_lists);
        assert!(!config.auto_format.typographic_quotes);
        assert_eq!(config.auto_format.bullet_char, Some('+'));
    }

    #[test]
    fn test_json_round_trip() {
        let config = EngineConfig {
            document_width: 320,
            allow_break_in_words: true,
            ..EngineConfig::default()
        };
        let parsed = EngineConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }
}
