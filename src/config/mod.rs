//! # Migration Configuration
//!
//! YAML-based configuration with environment-specific overrides, mirroring the layered
//! approach used across the orchestration services.
//!
//! ## Sections
//!
//! - **source**: how the legacy source pages its results
//! - **execution**: worker concurrency, activity timeouts, attempt limits, cancellation grace
//! - **backoff**: exponential backoff between retried activity attempts
//!
//! ## Usage
//!
//! ```rust,no_run
//! use consolidation_migration::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let policy = manager.config().retry_policy();
//! let workers = manager.config().execution.max_concurrent_activities;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::system;
use crate::host::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring migration-config.yaml
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Legacy source paging behaviour
    pub source: SourceConfig,

    /// Activity execution settings
    pub execution: ExecutionConfig,

    /// Backoff and retry configuration
    pub backoff: BackoffConfig,
}

/// Legacy source query surface configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Lead records per source page
    pub page_size: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            page_size: system::DEFAULT_PAGE_SIZE,
        }
    }
}

/// Activity execution configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Upper bound on concurrently running activities across the whole fan-out tree
    pub max_concurrent_activities: usize,
    pub activity_timeout_seconds: u64,
    /// Total attempts per activity, first attempt included
    pub max_attempts: u32,
    pub cancellation_grace_period_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_concurrent_activities: 16,
            activity_timeout_seconds: 30,
            max_attempts: 3,
            cancellation_grace_period_ms: 5_000,
        }
    }
}

impl ExecutionConfig {
    /// Get activity timeout as Duration
    pub fn activity_timeout(&self) -> Duration {
        Duration::from_secs(self.activity_timeout_seconds)
    }

    /// Get cancellation grace period as Duration
    pub fn cancellation_grace_period(&self) -> Duration {
        Duration::from_millis(self.cancellation_grace_period_ms)
    }
}

/// Backoff and retry configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub base_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub max_backoff_seconds: u64,
    pub jitter_enabled: bool,
    pub jitter_max_percentage: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 500,
            backoff_multiplier: 2.0,
            max_backoff_seconds: 30,
            jitter_enabled: true,
            jitter_max_percentage: 0.1,
        }
    }
}

impl MigrationConfig {
    /// Validate configuration values that serde cannot express
    pub fn validate(&self) -> ConfigResult<()> {
        if self.source.page_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "source.page_size",
                "0",
                "page size must be at least 1",
            ));
        }
        if self.execution.max_concurrent_activities == 0 {
            return Err(ConfigurationError::invalid_value(
                "execution.max_concurrent_activities",
                "0",
                "at least one worker is required",
            ));
        }
        if self.execution.max_attempts == 0 {
            return Err(ConfigurationError::invalid_value(
                "execution.max_attempts",
                "0",
                "the first attempt counts, so the minimum is 1",
            ));
        }
        if self.execution.activity_timeout_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "execution.activity_timeout_seconds",
                "0",
                "every activity needs a non-zero timeout",
            ));
        }
        if self.backoff.backoff_multiplier < 1.0 {
            return Err(ConfigurationError::invalid_value(
                "backoff.backoff_multiplier",
                self.backoff.backoff_multiplier.to_string(),
                "multiplier below 1.0 would shrink delays",
            ));
        }
        if !(0.0..=1.0).contains(&self.backoff.jitter_max_percentage) {
            return Err(ConfigurationError::invalid_value(
                "backoff.jitter_max_percentage",
                self.backoff.jitter_max_percentage.to_string(),
                "expected a fraction between 0.0 and 1.0",
            ));
        }
        Ok(())
    }

    /// Build the host retry policy from the execution and backoff sections
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.execution.max_attempts,
            timeout: self.execution.activity_timeout(),
            base_delay: Duration::from_millis(self.backoff.base_delay_ms),
            backoff_multiplier: self.backoff.backoff_multiplier,
            max_delay: Duration::from_secs(self.backoff.max_backoff_seconds),
            jitter_factor: if self.backoff.jitter_enabled {
                self.backoff.jitter_max_percentage
            } else {
                0.0
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = MigrationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.source.page_size, 10);
        assert_eq!(config.execution.max_attempts, 3);
    }

    #[test]
    fn test_validation_rejects_zero_page_size() {
        let mut config = MigrationConfig::default();
        config.source.page_size = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("source.page_size"));
    }

    #[test]
    fn test_validation_rejects_shrinking_backoff() {
        let mut config = MigrationConfig::default();
        config.backoff.backoff_multiplier = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_policy_without_jitter() {
        let mut config = MigrationConfig::default();
        config.backoff.jitter_enabled = false;
        let policy = config.retry_policy();
        assert_eq!(policy.jitter_factor, 0.0);
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.timeout, Duration::from_secs(30));
        assert_eq!(policy.base_delay, Duration::from_millis(500));
    }

    #[test]
    fn test_partial_yaml_sections_fill_defaults() {
        let config: MigrationConfig =
            serde_json::from_value(serde_json::json!({ "execution": { "max_attempts": 5 } }))
                .unwrap();
        assert_eq!(config.execution.max_attempts, 5);
        assert_eq!(config.execution.max_concurrent_activities, 16);
        assert_eq!(config.source, SourceConfig::default());
    }
}
