//! # Activity Logging
//!
//! Human-readable audit trail collaborator. The tracker reports every success,
//! failure and completion here. A sink returning `false` is logged and ignored.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    #[default]
    Success,
    Failed,
    Info,
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// One audit entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub activity_type: String,
    pub activity_category: String,
    pub description: String,
    pub provider_id: Option<i32>,
    pub provider_name: Option<String>,
    pub details: Option<serde_json::Value>,
    pub status: ActivityStatus,
    pub error_message: Option<String>,
}

impl ActivityRecord {
    pub fn new(
        activity_type: impl Into<String>,
        activity_category: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            activity_type: activity_type.into(),
            activity_category: activity_category.into(),
            description: description.into(),
            provider_id: None,
            provider_name: None,
            details: None,
            status: ActivityStatus::Success,
            error_message: None,
        }
    }

    pub fn with_provider(mut self, provider_id: i32, provider_name: impl Into<String>) -> Self {
        self.provider_id = Some(provider_id);
        self.provider_name = Some(provider_name.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_status(mut self, status: ActivityStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_error(mut self, error_message: impl Into<String>) -> Self {
        self.error_message = Some(error_message.into());
        self
    }
}

#[async_trait]
pub trait ActivityLogger: Send + Sync {
    /// Record an entry; returns whether the sink accepted it
    async fn log_activity(&self, record: &ActivityRecord) -> bool;
}

/// Writes activity entries as structured `tracing` events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingActivityLogger;

#[async_trait]
impl ActivityLogger for TracingActivityLogger {
    async fn log_activity(&self, record: &ActivityRecord) -> bool {
        let details = record.details.as_ref().map(ToString::to_string);
        match record.status {
            ActivityStatus::Failed => tracing::warn!(
                activity_type = %record.activity_type,
                activity_category = %record.activity_category,
                provider_id = record.provider_id,
                provider_name = record.provider_name.as_deref(),
                details = details.as_deref(),
                error_message = record.error_message.as_deref(),
                status = %record.status,
                "{}",
                record.description
            ),
            _ => tracing::info!(
                activity_type = %record.activity_type,
                activity_category = %record.activity_category,
                provider_id = record.provider_id,
                provider_name = record.provider_name.as_deref(),
                details = details.as_deref(),
                status = %record.status,
                "{}",
                record.description
            ),
        }
        true
    }
}
