//! Configuration Loader
//!
//! Environment-aware configuration loading. Sources are layered in order:
//!
//! 1. built-in defaults (`PipelineConfig::default()`)
//! 2. `{config_dir}/pipeline.{toml,yaml,json}`
//! 3. `{config_dir}/pipeline.{environment}.{toml,yaml,json}`
//! 4. `PIPELINE__SECTION__KEY` environment variables
//! 5. `DATABASE_URL`, which always wins for the connection string

use super::error::{ConfigResult, ConfigurationError};
use super::PipelineConfig;
use config::{Config, Environment, File};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const ENV_PREFIX: &str = "PIPELINE";
const ENV_SEPARATOR: &str = "__";
const DEFAULT_CONFIG_DIR: &str = "config";

/// Loaded configuration plus the environment it was resolved for
#[derive(Debug)]
pub struct ConfigManager {
    config: PipelineConfig,
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
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        Self::load_with_sources(config_dir, environment, None)
    }

    /// Load with an explicit variable map standing in for the process environment
    pub fn load_with_sources(
        config_dir: Option<PathBuf>,
        environment: &str,
        variables: Option<HashMap<String, String>>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_DIR));

        debug!(
            environment = %environment,
            config_directory = %config_directory.display(),
            "Loading pipeline configuration"
        );

        let database_url_override = match &variables {
            Some(vars) => vars.get("DATABASE_URL").cloned(),
            None => env::var("DATABASE_URL").ok(),
        };

        let mut config = Self::build(&config_directory, environment, variables)?;

        if let Some(url) = database_url_override {
            config.database.url = url;
        }

        config.validate()?;

        debug!(
            environment = %environment,
            max_retries = config.retry.max_retries,
            base_delay_ms = config.retry.base_delay_ms,
            pool_size = config.database.max_connections,
            "Pipeline configuration loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Wrap an already-built configuration
    pub fn from_config(config: PipelineConfig, environment: &str) -> ConfigResult<Arc<Self>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory: PathBuf::from(DEFAULT_CONFIG_DIR),
        }))
    }

    fn build(
        config_directory: &Path,
        environment: &str,
        variables: Option<HashMap<String, String>>,
    ) -> ConfigResult<PipelineConfig> {
        let defaults = Config::try_from(&PipelineConfig::default())
            .map_err(|e| ConfigurationError::load_error(environment, e))?;

        let base = config_directory.join("pipeline");
        let overrides = config_directory.join(format!("pipeline.{environment}"));

        Config::builder()
            .add_source(defaults)
            .add_source(File::with_name(&base.to_string_lossy()).required(false))
            .add_source(File::with_name(&overrides.to_string_lossy()).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true)
                    .source(variables),
            )
            .build()
            .and_then(Config::try_deserialize)
            .map_err(|e| ConfigurationError::load_error(environment, e))
    }

    /// Detect the current environment from environment variables
    pub fn detect_environment() -> String {
        env::var("PIPELINE_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_directory_uses_defaults() {
        let manager = ConfigManager::load_with_sources(
            Some(PathBuf::from("/nonexistent/pipeline-config")),
            "test",
            Some(HashMap::new()),
        )
        .unwrap();

        assert_eq!(manager.environment(), "test");
        assert_eq!(manager.config().retry.max_retries, 3);
        assert_eq!(manager.config().database.max_connections, 5);
    }

    #[test]
    fn test_database_url_override() {
        let mut vars = HashMap::new();
        vars.insert(
            "DATABASE_URL".to_string(),
            "postgresql://override@db/pipeline".to_string(),
        );

        let manager = ConfigManager::load_with_sources(
            Some(PathBuf::from("/nonexistent/pipeline-config")),
            "test",
            Some(vars),
        )
        .unwrap();

        assert_eq!(
            manager.config().database.url,
            "postgresql://override@db/pipeline"
        );
    }
}
