//! Configuration layering: files, environment overrides and validation.

use provider_pipeline::config::{ConfigManager, ConfigurationError};
use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn write_config(dir: &TempDir, name: &str, contents: &str) {
    fs::write(dir.path().join(name), contents).unwrap();
}

/// Load from `dir` with no process environment
fn load(dir: &TempDir, environment: &str) -> Result<Arc<ConfigManager>, ConfigurationError> {
    ConfigManager::load_with_sources(
        Some(dir.path().to_path_buf()),
        environment,
        Some(HashMap::new()),
    )
}

fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
        .collect()
}

#[test]
fn test_environment_file_overrides_base_file() {
    let dir = TempDir::new().unwrap();
    write_config(
        &dir,
        "pipeline.toml",
        r#"
[database]
url = "postgresql://base@localhost/pipeline"
max_connections = 8

[retry]
max_retries = 5
base_delay_ms = 500
"#,
    );
    write_config(
        &dir,
        "pipeline.test.toml",
        r#"
[retry]
base_delay_ms = 1
"#,
    );

    let manager = load(&dir, "test").unwrap();
    let config = manager.config();

    assert_eq!(manager.environment(), "test");
    assert_eq!(config.database.url, "postgresql://base@localhost/pipeline");
    assert_eq!(config.database.max_connections, 8);
    assert_eq!(config.retry.max_retries, 5);
    assert_eq!(config.retry.base_delay(), Duration::from_millis(1));
    // untouched sections keep their defaults
    assert_eq!(config.reporting.example_provider_limit, 3);
}

#[test]
fn test_environment_variables_override_files() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "pipeline.toml", "[retry]\nmax_retries = 5\n");

    let manager = ConfigManager::load_with_sources(
        Some(dir.path().to_path_buf()),
        "production",
        Some(vars(&[
            ("PIPELINE__RETRY__MAX_RETRIES", "7"),
            ("PIPELINE__LOGGING__JSON", "true"),
            ("DATABASE_URL", "postgresql://prod@db/pipeline"),
        ])),
    )
    .unwrap();

    assert_eq!(manager.config().retry.max_retries, 7);
    assert!(manager.config().logging.json);
    assert_eq!(manager.config().database.url, "postgresql://prod@db/pipeline");
}

#[test]
fn test_provider_table_section_is_loaded() {
    let dir = TempDir::new().unwrap();
    write_config(
        &dir,
        "pipeline.toml",
        r#"
[database.provider_table]
table = "directory_providers"
id_column = "provider_id"
name_column = "display_name"
"#,
    );

    let manager = load(&dir, "development").unwrap();
    let table = manager.config().database.provider_table.clone().unwrap();

    assert_eq!(table.table, "directory_providers");
    assert_eq!(table.id_column, "provider_id");
    assert_eq!(table.name_column, "display_name");
}

#[test]
fn test_unsafe_provider_table_is_rejected() {
    let dir = TempDir::new().unwrap();
    write_config(
        &dir,
        "pipeline.toml",
        r#"
[database.provider_table]
table = "providers; DROP TABLE pipeline_runs"
"#,
    );

    let result = load(&dir, "development");

    assert!(matches!(
        result,
        Err(ConfigurationError::InvalidValue { .. })
    ));
}

#[test]
fn test_zero_pool_size_is_rejected() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "pipeline.toml", "[database]\nmax_connections = 0\n");

    let result = load(&dir, "development");

    assert!(result.is_err());
}

#[test]
fn test_malformed_file_is_a_load_error() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "pipeline.toml", "[retry\nmax_retries = ");

    let result = load(&dir, "development");

    assert!(matches!(result, Err(ConfigurationError::LoadError { .. })));
}
