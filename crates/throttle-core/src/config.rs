//! Throttle configuration
//!
//! The three escalation tunables plus the deployment knobs that decide how
//! state is namespaced and what happens when the store is down.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, ThrottleError};
use crate::{
    DEFAULT_ATTEMPTS_LIMIT, DEFAULT_DELAY_CONSECUTIVE_MINUTES, DEFAULT_DELAY_FIRST_MINUTES,
    DEFAULT_KEY_PREFIX, DEFAULT_MAX_SUSPENSION_MINUTES,
};

/// What `Check` does when throttle state cannot be read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Deny the login attempt
    #[default]
    FailClosed,
    /// Let the attempt through unthrottled
    FailOpen,
}

/// Escalation and storage settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Wrong passwords tolerated before the next one triggers a suspension
    pub attempts_limit: u32,

    /// Suspension length of the first tier (minutes)
    pub delay_first_minutes: u32,

    /// Minutes added to the suspension for every further tier
    pub delay_consecutive_minutes: u32,

    /// Ceiling for the suspension length (minutes); 0 grows without bound
    pub max_suspension_minutes: u32,

    /// Namespace prefix for the persisted keys
    pub key_prefix: String,

    /// Behaviour of the login gate when the store is unavailable
    pub failure_policy: FailurePolicy,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            attempts_limit: DEFAULT_ATTEMPTS_LIMIT,
            delay_first_minutes: DEFAULT_DELAY_FIRST_MINUTES,
            delay_consecutive_minutes: DEFAULT_DELAY_CONSECUTIVE_MINUTES,
            max_suspension_minutes: DEFAULT_MAX_SUSPENSION_MINUTES,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl ThrottleConfig {
    /// Config with explicit tunables and defaults for everything else
    pub fn with_delays(
        attempts_limit: u32,
        delay_first_minutes: u32,
        delay_consecutive_minutes: u32,
    ) -> Self {
        Self {
            attempts_limit,
            delay_first_minutes,
            delay_consecutive_minutes,
            ..Default::default()
        }
    }

    /// Drop the suspension ceiling
    pub fn unbounded(mut self) -> Self {
        self.max_suspension_minutes = 0;
        self
    }

    /// The suspension ceiling, if one is configured
    pub fn suspension_cap(&self) -> Option<u32> {
        match self.max_suspension_minutes {
            0 => None,
            cap => Some(cap),
        }
    }

    /// Reject values that would disable the throttle or produce bogus delays
    pub fn validate(&self) -> Result<()> {
        if self.attempts_limit == 0 {
            return Err(ThrottleError::InvalidConfiguration(
                "attempts_limit must be at least 1".to_string(),
            ));
        }
        if self.delay_first_minutes == 0 {
            return Err(ThrottleError::InvalidConfiguration(
                "delay_first_minutes must be at least 1".to_string(),
            ));
        }
        if self.delay_consecutive_minutes == 0 {
            return Err(ThrottleError::InvalidConfiguration(
                "delay_consecutive_minutes must be at least 1".to_string(),
            ));
        }
        if let Some(cap) = self.suspension_cap() {
            if cap < self.delay_first_minutes {
                return Err(ThrottleError::InvalidConfiguration(format!(
                    "max_suspension_minutes ({}) is below delay_first_minutes ({})",
                    cap, self.delay_first_minutes
                )));
            }
        }
        if self.key_prefix.is_empty() {
            return Err(ThrottleError::InvalidConfiguration(
                "key_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Default config file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("login-throttle")
            .join("throttle.toml")
    }

    /// Load and validate configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise use the defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration as TOML
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = ThrottleConfig::default();
        assert_eq!(config.attempts_limit, 3);
        assert_eq!(config.delay_first_minutes, 2);
        assert_eq!(config.delay_consecutive_minutes, 3);
        assert_eq!(config.suspension_cap(), Some(24 * 60));
        assert_eq!(config.key_prefix, "loginThrottle.");
        assert_eq!(config.failure_policy, FailurePolicy::FailClosed);
        assert!(config.validate().is_ok());
    }

    #[rstest]
    #[case(0, 2, 3)]
    #[case(3, 0, 3)]
    #[case(3, 2, 0)]
    fn test_zero_tunables_rejected(#[case] limit: u32, #[case] first: u32, #[case] next: u32) {
        let config = ThrottleConfig::with_delays(limit, first, next);
        assert!(matches!(
            config.validate(),
            Err(ThrottleError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_cap_below_first_tier_rejected() {
        let mut config = ThrottleConfig::with_delays(3, 10, 3);
        config.max_suspension_minutes = 5;
        assert!(config.validate().is_err());

        assert!(config.unbounded().validate().is_ok());
    }

    #[test]
    fn test_empty_prefix_rejected() {
        let config = ThrottleConfig {
            key_prefix: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("throttle.toml");
        fs::write(&path, "attempts_limit = 5\nfailure_policy = \"fail_open\"\n").unwrap();

        let config = ThrottleConfig::load(&path).unwrap();
        assert_eq!(config.attempts_limit, 5);
        assert_eq!(config.delay_first_minutes, 2);
        assert_eq!(config.failure_policy, FailurePolicy::FailOpen);
    }

    #[test]
    fn test_invalid_file_rejected_on_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("throttle.toml");
        fs::write(&path, "delay_first_minutes = 0\n").unwrap();

        assert!(matches!(
            ThrottleConfig::load(&path),
            Err(ThrottleError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("throttle.toml");
        let config = ThrottleConfig::with_delays(4, 5, 6).unbounded();

        config.save(&path).unwrap();
        let loaded = ThrottleConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.suspension_cap(), None);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = ThrottleConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, ThrottleConfig::default());
    }
}
