use crate::activity::{ActivityLogger, TracingActivityLogger};
use crate::config::{ConfigManager, PipelineConfig};
use crate::database::DatabaseConnection;
use crate::error::PipelineResult;
use crate::store::{InMemoryPipelineStore, PgPipelineStore, PipelineStore};
use std::sync::Arc;
use tracing::info;

/// Shared pipeline dependencies and configuration
///
/// Passed into every tracker, orchestrator and runner instead of module-level
/// singletons, so tests can swap the store or activity sink freely.
#[derive(Clone)]
pub struct PipelineContext {
    /// Run, failure and step-event persistence
    pub store: Arc<dyn PipelineStore>,

    /// Human-readable audit trail sink
    pub activity: Arc<dyn ActivityLogger>,

    /// Loaded configuration
    pub config: Arc<PipelineConfig>,
}

impl std::fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineContext")
            .field("store", &"Arc<dyn PipelineStore>")
            .field("activity", &"Arc<dyn ActivityLogger>")
            .field("config", &self.config)
            .finish()
    }
}

impl PipelineContext {
    pub fn new(
        store: Arc<dyn PipelineStore>,
        activity: Arc<dyn ActivityLogger>,
        config: Arc<PipelineConfig>,
    ) -> Self {
        Self {
            store,
            activity,
            config,
        }
    }

    /// In-process store, tracing activity sink and default configuration
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryPipelineStore::new()),
            Arc::new(TracingActivityLogger),
            Arc::new(PipelineConfig::default()),
        )
    }

    /// Connect to PostgreSQL using the loaded configuration
    pub async fn from_config_manager(config_manager: &ConfigManager) -> PipelineResult<Self> {
        let config = config_manager.config().clone();
        info!(
            environment = %config_manager.environment(),
            "🔧 Initializing PipelineContext"
        );

        let connection = DatabaseConnection::from_config(&config.database).await?;
        let store = PgPipelineStore::new(connection.pool().clone())
            .with_provider_table(config.database.provider_table.clone());

        Ok(Self::new(
            Arc::new(store),
            Arc::new(TracingActivityLogger),
            Arc::new(config),
        ))
    }

    pub fn with_store(mut self, store: Arc<dyn PipelineStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_activity_logger(mut self, activity: Arc<dyn ActivityLogger>) -> Self {
        self.activity = activity;
        self
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = Arc::new(config);
        self
    }
}
