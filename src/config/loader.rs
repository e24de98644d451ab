//! Configuration Loader
//!
//! Environment-aware configuration loading. Layers, lowest precedence first:
//! built-in defaults, `batcher.yaml`, `batcher.<environment>.yaml`, then
//! `BATCHER__*` environment variables.

use config::{Config, Environment, File, FileFormat, Map};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use super::BatcherConfig;
use crate::error::{BatcherError, Result};

/// Base name of the YAML configuration files
pub const CONFIG_FILE_STEM: &str = "batcher";

/// Prefix for environment variable overrides (`BATCHER__BATCH_SIZE=-1`)
pub const ENV_PREFIX: &str = "BATCHER";

const ENV_SEPARATOR: &str = "__";

/// Loaded and validated configuration plus where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: BatcherConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> Result<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> Result<Arc<ConfigManager>> {
        let environment = detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> Result<Arc<ConfigManager>> {
        Self::load_with_env_source(config_dir, environment, None)
    }

    /// Load configuration with an explicit set of environment variables instead of the
    /// process environment. This is useful for testing without modifying global state.
    pub fn load_with_overrides(
        config_dir: Option<PathBuf>,
        environment: &str,
        overrides: Map<String, String>,
    ) -> Result<Arc<ConfigManager>> {
        Self::load_with_env_source(config_dir, environment, Some(overrides))
    }

    fn load_with_env_source(
        config_dir: Option<PathBuf>,
        environment: &str,
        env_source: Option<Map<String, String>>,
    ) -> Result<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(default_config_directory);
        let environment = environment.to_lowercase();

        debug!(
            environment = %environment,
            directory = %config_directory.display(),
            "Loading batcher configuration"
        );

        let settings = Config::builder()
            .add_source(yaml_source(&config_directory, CONFIG_FILE_STEM))
            .add_source(yaml_source(
                &config_directory,
                &format!("{CONFIG_FILE_STEM}.{environment}"),
            ))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .source(env_source),
            )
            .build()?;

        let config: BatcherConfig = settings.try_deserialize().map_err(|e| {
            BatcherError::configuration(format!("Failed to deserialize configuration: {e}"))
        })?;

        config.validate()?;

        debug!(
            config = %serde_json::to_string(&config)
                .unwrap_or_else(|_| "[serialization error]".to_string()),
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment,
            config_directory,
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &BatcherConfig {
        &self.config
    }

    /// Get the environment the configuration was resolved for
    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }
}

/// Detect current environment: BATCHER_ENV || APP_ENV || 'development'
pub fn detect_environment() -> String {
    env::var("BATCHER_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
        .to_lowercase()
}

fn default_config_directory() -> PathBuf {
    if let Ok(dir) = env::var("BATCHER_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    PathBuf::from("config")
}

fn yaml_source(directory: &Path, stem: &str) -> File<config::FileSourceFile, FileFormat> {
    let path = directory.join(format!("{stem}.yaml"));
    File::new(&path.to_string_lossy(), FileFormat::Yaml).required(false)
}
