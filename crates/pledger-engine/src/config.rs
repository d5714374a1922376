//! # Engine Configuration
//!
//! YAML file, then environment overrides, then validation:
//!
//! ```yaml
//! ready_timeout_secs: 120
//! archive_compression_level: 3
//! code_version: "1.0.0"
//! channel_prefix: policy
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Overrides `ready_timeout_secs`.
pub const ENV_READY_TIMEOUT: &str = "PLEDGER_READY_TIMEOUT_SECS";
/// Overrides `archive_compression_level`.
pub const ENV_ARCHIVE_COMPRESSION: &str = "PLEDGER_ARCHIVE_COMPRESSION";

/// Runtime settings of a [`PolicyEngine`](crate::PolicyEngine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How long to wait for a worker's readiness callback.
    pub ready_timeout_secs: u64,
    /// Gzip level of published policy archives (0–9).
    pub archive_compression_level: u32,
    /// Stamped on every policy row the engine writes.
    pub code_version: String,
    /// Prefix of worker channel names.
    pub channel_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ready_timeout_secs: 120,
            archive_compression_level: 3,
            code_version: "1.0.0".to_string(),
            channel_prefix: "policy".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load from a YAML file, apply process environment overrides, validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_yaml(&text)?;
        config.apply_overrides(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse YAML without overrides or validation. Missing fields take
    /// their defaults.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Apply overrides from `lookup` (normally the process environment).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_READY_TIMEOUT) {
            self.ready_timeout_secs = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: ENV_READY_TIMEOUT,
                value,
            })?;
        }
        if let Some(value) = lookup(ENV_ARCHIVE_COMPRESSION) {
            self.archive_compression_level =
                value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                    var: ENV_ARCHIVE_COMPRESSION,
                    value,
                })?;
        }
        Ok(())
    }

    /// Range checks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ready_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "ready_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.archive_compression_level > 9 {
            return Err(ConfigError::Invalid(format!(
                "archive_compression_level must be 0..=9, got {}",
                self.archive_compression_level
            )));
        }
        if self.channel_prefix.is_empty() {
            return Err(ConfigError::Invalid("channel_prefix must not be empty".into()));
        }
        Ok(())
    }

    /// Readiness timeout as a `Duration`.
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let c = EngineConfig::default();
        assert_eq!(c.ready_timeout(), Duration::from_secs(120));
        assert_eq!(c.archive_compression_level, 3);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let c = EngineConfig::from_yaml("ready_timeout_secs: 5\n").unwrap();
        assert_eq!(c.ready_timeout_secs, 5);
        assert_eq!(c.channel_prefix, "policy");
    }

    #[test]
    fn test_env_overrides() {
        let mut c = EngineConfig::default();
        c.apply_overrides(|var| match var {
            ENV_READY_TIMEOUT => Some("7".into()),
            ENV_ARCHIVE_COMPRESSION => Some(" 9 ".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(c.ready_timeout_secs, 7);
        assert_eq!(c.archive_compression_level, 9);
    }

    #[test]
    fn test_bad_env_override_rejected() {
        let mut c = EngineConfig::default();
        let err = c
            .apply_overrides(|var| (var == ENV_READY_TIMEOUT).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { var: ENV_READY_TIMEOUT, .. }));
    }

    #[test]
    fn test_validation_ranges() {
        let zero = EngineConfig {
            ready_timeout_secs: 0,
            ..EngineConfig::default()
        };
        assert!(zero.validate().is_err());
        let level = EngineConfig {
            archive_compression_level: 10,
            ..EngineConfig::default()
        };
        assert!(level.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "archive_compression_level: 6\ncode_version: \"2.1.0\"").unwrap();
        let c = EngineConfig::load(file.path()).unwrap();
        assert_eq!(c.archive_compression_level, 6);
        assert_eq!(c.code_version, "2.1.0");
    }

    #[test]
    fn test_load_missing_file() {
        let err = EngineConfig::load(Path::new("/nonexistent/pledger.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
