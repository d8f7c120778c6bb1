//! Configuration Loader
//!
//! Environment-aware configuration loading. Layers, lowest precedence first:
//!
//! 1. `migration-config.yaml` in the configuration directory (required)
//! 2. `environments/{environment}.yaml` beside it (optional)
//! 3. `MIGRATION__{SECTION}__{KEY}` environment variables

use super::error::{ConfigResult, ConfigurationError};
use super::MigrationConfig;
use ::config::{Config, Environment, File, FileFormat};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const CONFIG_FILE_NAMES: [&str; 2] = ["migration-config.yaml", "migration-config.yml"];
const ENV_PREFIX: &str = "MIGRATION";

/// Loaded configuration together with where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: MigrationConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    /// This is useful for testing without modifying global environment variables
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from("config"));

        debug!(
            environment = %environment,
            config_directory = %config_directory.display(),
            "Loading migration configuration"
        );

        let config = Self::load_and_merge_config(&config_directory, environment)?;
        config.validate()?;

        info!(
            environment = %environment,
            page_size = config.source.page_size,
            max_concurrent_activities = config.execution.max_concurrent_activities,
            max_attempts = config.execution.max_attempts,
            "⚙️ Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Wrap an already-built configuration, validating it first
    pub fn from_config(config: MigrationConfig, environment: &str) -> ConfigResult<ConfigManager> {
        config.validate()?;
        Ok(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory: PathBuf::from("config"),
        })
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Get the current environment
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Get the configuration directory
    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Detect current environment from environment variables
    pub fn detect_environment() -> String {
        env::var("MIGRATION_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    fn find_config_file(config_directory: &Path) -> ConfigResult<PathBuf> {
        let mut searched_paths = Vec::new();

        for name in CONFIG_FILE_NAMES {
            let config_path = config_directory.join(name);
            searched_paths.push(config_path.clone());

            if config_path.is_file() {
                debug!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        Err(ConfigurationError::config_file_not_found(searched_paths))
    }

    fn load_and_merge_config(
        config_directory: &Path,
        environment: &str,
    ) -> ConfigResult<MigrationConfig> {
        let config_file = Self::find_config_file(config_directory)?;
        let override_file = config_directory
            .join("environments")
            .join(format!("{environment}.yaml"));

        if override_file.is_file() {
            debug!(
                "Applying environment-specific overrides from {}",
                override_file.display()
            );
        }

        let settings = Config::builder()
            .add_source(
                File::from(config_file.clone())
                    .format(FileFormat::Yaml)
                    .required(true),
            )
            .add_source(
                File::from(override_file)
                    .format(FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigurationError::load_error(config_file.display().to_string(), e))?;

        settings
            .try_deserialize::<MigrationConfig>()
            .map_err(|e| ConfigurationError::load_error(config_file.display().to_string(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_base_config(dir: &Path) {
        fs::write(
            dir.join("migration-config.yaml"),
            r#"
source:
  page_size: 25
execution:
  max_concurrent_activities: 8
  activity_timeout_seconds: 20
  max_attempts: 4
  cancellation_grace_period_ms: 1000
backoff:
  base_delay_ms: 100
  backoff_multiplier: 2.0
  max_backoff_seconds: 10
  jitter_enabled: false
  jitter_max_percentage: 0.0
"#,
        )
        .unwrap();
    }

    #[test]
    fn test_load_base_configuration() {
        let temp_dir = TempDir::new().unwrap();
        write_base_config(temp_dir.path());

        let manager =
            ConfigManager::load_from_directory_with_env(Some(temp_dir.path().to_path_buf()), "test")
                .unwrap();

        assert_eq!(manager.environment(), "test");
        assert_eq!(manager.config().source.page_size, 25);
        assert_eq!(manager.config().execution.max_attempts, 4);
        assert!(!manager.config().backoff.jitter_enabled);
    }

    #[test]
    fn test_environment_override_file_wins() {
        let temp_dir = TempDir::new().unwrap();
        write_base_config(temp_dir.path());
        fs::create_dir_all(temp_dir.path().join("environments")).unwrap();
        fs::write(
            temp_dir.path().join("environments").join("production.yaml"),
            "execution:\n  max_concurrent_activities: 64\n",
        )
        .unwrap();

        let manager = ConfigManager::load_from_directory_with_env(
            Some(temp_dir.path().to_path_buf()),
            "production",
        )
        .unwrap();

        assert_eq!(manager.config().execution.max_concurrent_activities, 64);
        // untouched keys keep the base value
        assert_eq!(manager.config().execution.max_attempts, 4);
    }

    #[test]
    fn test_missing_file_reports_searched_paths() {
        let temp_dir = TempDir::new().unwrap();
        let err = ConfigManager::load_from_directory_with_env(
            Some(temp_dir.path().to_path_buf()),
            "test",
        )
        .unwrap_err();

        match err {
            ConfigurationError::ConfigFileNotFound { searched_paths } => {
                assert_eq!(searched_paths.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("migration-config.yaml"),
            "source:\n  page_size: 0\n",
        )
        .unwrap();

        let err = ConfigManager::load_from_directory_with_env(
            Some(temp_dir.path().to_path_buf()),
            "test",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidValue { .. }));
    }
}
