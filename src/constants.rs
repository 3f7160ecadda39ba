//! Shared labels used across the tracker, runner and reports.

/// Run type labels written to `pipeline_runs.run_type`
pub mod run_types {
    pub const AUTOMATION: &str = "automation";
    pub const RETRY: &str = "retry";
    pub const BULK_RETRY: &str = "bulk_retry";
    pub const UNIFIED_PIPELINE: &str = "unified_pipeline";
}

/// Provider status values owned by the directory
pub mod provider_status {
    pub const PENDING: &str = "pending";
    pub const APPROVED: &str = "approved";
}

/// Activity categories and types sent to the activity logger
pub mod activity {
    pub const CATEGORY_PIPELINE: &str = "pipeline";

    pub const PIPELINE_STARTED: &str = "pipeline_started";
    pub const PIPELINE_COMPLETED: &str = "pipeline_completed";
    pub const PROVIDER_SUCCESS: &str = "provider_pipeline_success";
    pub const PROVIDER_FAILURE: &str = "provider_pipeline_failure";
    pub const STEP_SUCCESS: &str = "pipeline_step_success";
    pub const FAILURE_RETRY: &str = "pipeline_failure_retry";
}

/// Failure statistics look back over this many days
pub const FAILURE_STATS_WINDOW_DAYS: i64 = 7;

/// Detail reason recorded when an idempotent guard skips a step
pub const ALREADY_COMPLETE: &str = "already_complete";
