//! Anonymous customer purge configuration.
//!
//! # Example
//!
//! ```toml
//! [purge]
//! retention_days = 61
//! default_batch_size = 1000
//! batch_size_setting = "purge.anonymous_customers.batch_size"
//! dry_run = false
//! interval_hours = 24
//! ```

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Setting key holding the runtime batch size.
pub const DEFAULT_BATCH_SIZE_SETTING: &str = "purge.anonymous_customers.batch_size";

/// Longest accepted retention window (100 years).
pub const MAX_RETENTION_DAYS: u32 = 36_500;

const SECS_PER_HOUR: u64 = 3600;

/// Purge job configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct PurgeConfig {
    /// Anonymous customers untouched for longer than this many days are
    /// eligible for deletion.
    /// Default: 61
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Batch size used when the settings store has no value under
    /// `batch_size_setting`.
    /// Default: 1000
    #[serde(default = "default_batch_size")]
    pub default_batch_size: i64,

    /// Settings key read once per run for the batch size.
    #[serde(default = "default_batch_size_setting")]
    pub batch_size_setting: String,

    /// If true, scan and partition but delete nothing.
    #[serde(default)]
    pub dry_run: bool,

    /// How often the worker runs a purge (in hours).
    /// Default: 24 (once per day)
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u64,
}

impl Default for PurgeConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            default_batch_size: default_batch_size(),
            batch_size_setting: default_batch_size_setting(),
            dry_run: false,
            interval_hours: default_interval_hours(),
        }
    }
}

fn default_retention_days() -> u32 {
    61
}

fn default_batch_size() -> i64 {
    1000
}

fn default_batch_size_setting() -> String {
    DEFAULT_BATCH_SIZE_SETTING.to_string()
}

fn default_interval_hours() -> u64 {
    24
}

impl PurgeConfig {
    /// Get the worker interval as a Duration.
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_hours.saturating_mul(SECS_PER_HOUR))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retention_days == 0 {
            return Err(ConfigError::Validation(
                "purge.retention_days must be greater than 0".into(),
            ));
        }
        if self.retention_days > MAX_RETENTION_DAYS {
            return Err(ConfigError::Validation(format!(
                "purge.retention_days must be at most {MAX_RETENTION_DAYS}, got {}",
                self.retention_days
            )));
        }
        if self.default_batch_size <= 0 {
            return Err(ConfigError::Validation(format!(
                "purge.default_batch_size must be positive, got {}",
                self.default_batch_size
            )));
        }
        if self.batch_size_setting.trim().is_empty() {
            return Err(ConfigError::Validation(
                "purge.batch_size_setting cannot be empty".into(),
            ));
        }
        if self.interval_hours == 0 {
            return Err(ConfigError::Validation(
                "purge.interval_hours must be greater than 0".into(),
            ));
        }
        if self.interval_hours.checked_mul(SECS_PER_HOUR).is_none() {
            return Err(ConfigError::Validation(format!(
                "purge.interval_hours is too large: {}",
                self.interval_hours
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = PurgeConfig::default();
        assert_eq!(config.retention_days, 61);
        assert_eq!(config.default_batch_size, 1000);
        assert_eq!(config.batch_size_setting, DEFAULT_BATCH_SIZE_SETTING);
        assert!(!config.dry_run);
        assert_eq!(config.interval_hours, 24);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            retention_days = 30
            default_batch_size = 50
            batch_size_setting = "jobs.purge.batch"
            dry_run = true
            interval_hours = 6
        "#;
        let config: PurgeConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.retention_days, 30);
        assert_eq!(config.default_batch_size, 50);
        assert_eq!(config.batch_size_setting, "jobs.purge.batch");
        assert!(config.dry_run);
        assert_eq!(config.interval(), std::time::Duration::from_secs(6 * 3600));
    }

    #[test]
    fn test_retention_limit_accepted() {
        let config = PurgeConfig {
            retention_days: MAX_RETENTION_DAYS,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_interval_saturates_instead_of_overflowing() {
        let config = PurgeConfig {
            interval_hours: u64::MAX / 1000,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(config.interval(), std::time::Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<PurgeConfig, _> = toml::from_str("batch_size = 10");
        assert!(result.is_err());
    }

    #[rstest]
    #[case::zero_retention("retention_days = 0")]
    #[case::zero_batch("default_batch_size = 0")]
    #[case::negative_batch("default_batch_size = -5")]
    #[case::blank_setting("batch_size_setting = \"  \"")]
    #[case::zero_interval("interval_hours = 0")]
    #[case::retention_past_limit("retention_days = 36501")]
    #[case::retention_u32_max("retention_days = 4294967295")]
    #[case::interval_overflows_seconds("interval_hours = 9223372036854775807")]
    fn test_invalid_values(#[case] toml: &str) {
        let config: PurgeConfig = toml::from_str(toml).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }
}
