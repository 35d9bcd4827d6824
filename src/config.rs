//! Coordinator configuration.

use serde::Deserialize;

/// Default length of generated room codes.
pub const DEFAULT_ROOM_CODE_DIGITS: usize = 4;

/// Default maximum display name length, in characters.
pub const DEFAULT_MAX_NAME_LEN: usize = 32;

/// Tunables for the session coordinator.
///
/// Every field has a default, so an empty JSON object is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct CoordinatorConfig {
    /// Number of digits in generated room codes
    pub room_code_digits: usize,

    /// Display names are truncated to this many characters
    pub max_name_len: usize,

    /// Name used when a client sends an empty one
    pub default_name: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            room_code_digits: DEFAULT_ROOM_CODE_DIGITS,
            max_name_len: DEFAULT_MAX_NAME_LEN,
            default_name: "Player".to_string(),
        }
    }
}

impl CoordinatorConfig {
    /// Parse and validate a JSON config.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=9).contains(&self.room_code_digits) {
            return Err(ConfigError::Invalid(format!(
                "roomCodeDigits must be between 1 and 9, got {}",
                self.room_code_digits
            )));
        }
        if self.max_name_len == 0 {
            return Err(ConfigError::Invalid("maxNameLen must be positive".into()));
        }
        if self.default_name.trim().is_empty() {
            return Err(ConfigError::Invalid("defaultName must not be blank".into()));
        }
        Ok(())
    }

    /// Trim and truncate a client-supplied display name.
    pub fn normalize_name(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return self.default_name.clone();
        }
        trimmed.chars().take(self.max_name_len).collect()
    }
}

/// Config errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = CoordinatorConfig::from_json_str("{}").unwrap();
        assert_eq!(config, CoordinatorConfig::default());
        assert_eq!(config.room_code_digits, 4);
    }

    #[test]
    fn test_partial_override() {
        let config = CoordinatorConfig::from_json_str(r#"{"maxNameLen": 8}"#).unwrap();
        assert_eq!(config.max_name_len, 8);
        assert_eq!(config.room_code_digits, DEFAULT_ROOM_CODE_DIGITS);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            CoordinatorConfig::from_json_str(r#"{"roomCodeDigits": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            CoordinatorConfig::from_json_str(r#"{"roomCodeDigits": 12}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            CoordinatorConfig::from_json_str(r#"{"bogus": true}"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_normalize_name() {
        let config = CoordinatorConfig {
            max_name_len: 5,
            ..CoordinatorConfig::default()
        };

        assert_eq!(config.normalize_name("  Alice  "), "Alice");
        assert_eq!(config.normalize_name("Bartholomew"), "Barth");
        assert_eq!(config.normalize_name("   "), "Player");
        // Truncation respects char boundaries
        assert_eq!(config.normalize_name("Zoë Ünal"), "Zoë Ü");
    }
}
