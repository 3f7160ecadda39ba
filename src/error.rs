//! Error types for the provider pipeline.

use crate::config::ConfigurationError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Migration error: {0}")]
    MigrationError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Provider repository error: {0}")]
    ProviderError(String),
}

impl From<sqlx::Error> for PipelineError {
    fn from(err: sqlx::Error) -> Self {
        PipelineError::DatabaseError(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for PipelineError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        PipelineError::MigrationError(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(error: serde_json::Error) -> Self {
        PipelineError::ValidationError(format!("JSON serialization error: {error}"))
    }
}

impl From<ConfigurationError> for PipelineError {
    fn from(error: ConfigurationError) -> Self {
        PipelineError::ConfigurationError(error.to_string())
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
