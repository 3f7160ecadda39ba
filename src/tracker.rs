//! # Pipeline Tracker
//!
//! Binds one logical run to the step outcomes recorded while it executes and
//! summarizes them when the run completes.
//!
//! ## Best-effort contract
//!
//! Tracking never aborts provider processing. Every store or activity-sink
//! error inside a tracker method is logged and swallowed; if the run row
//! cannot be created the tracker keeps going unrecorded and skips run-row
//! updates, while failure and step rows are still attempted.
//!
//! ## Counting
//!
//! `successful_providers` counts `log_success` calls. `failed_providers` counts
//! distinct provider ids in the run's in-memory failure list, so a provider
//! that failed and later succeeded in the same run is counted in both.
//! `api_limit` failures are kept in the list and persisted, but they mark a
//! quota condition rather than a bad provider and are left out of the count.
//!
//! ```rust,no_run
//! use provider_pipeline::context::PipelineContext;
//! use provider_pipeline::models::FailureReason;
//! use provider_pipeline::tracker::PipelineTracker;
//!
//! # async fn example() {
//! let mut tracker = PipelineTracker::start(PipelineContext::in_memory(), "automation").await;
//! tracker.set_total_providers(1).await;
//! tracker
//!     .log_failure(1, "Harbor Dental", "geocoding", FailureReason::Timeout, Some("slow"))
//!     .await;
//! tracker.log_success(1, "Harbor Dental", &["geocoding"]).await;
//! let summary = tracker.complete_pipeline().await;
//! assert_eq!(summary.failed_providers, 1);
//! # }
//! ```

use crate::activity::{ActivityRecord, ActivityStatus};
use crate::constants::{activity, FAILURE_STATS_WINDOW_DAYS};
use crate::context::PipelineContext;
use crate::logging::{log_run_operation, log_step_operation};
use crate::models::{
    FailureReason, NewPipelineFailure, NewPipelineRun, NewPipelineStepEvent, RunCompletion,
    UnresolvedFailure,
};
use crate::reporting::{FailureStatsReport, RunSummary};
use chrono::{Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use tracing::{debug, error, warn};
use uuid::Uuid;

/// A failure as remembered by the tracker for the lifetime of the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedFailure {
    pub provider_id: i32,
    pub provider_name: String,
    pub step: String,
    pub reason: FailureReason,
    pub details: Option<String>,
    /// Stored row id; `None` when the write failed
    pub failure_id: Option<i32>,
    pub recorded_at: NaiveDateTime,
}

pub struct PipelineTracker {
    context: PipelineContext,
    run_id: String,
    run_type: String,
    recorded: bool,
    started_at: NaiveDateTime,
    total_providers: i32,
    successful_providers: i32,
    failures: Vec<TrackedFailure>,
    api_limit_hits: HashMap<String, Vec<NaiveDateTime>>,
}

impl std::fmt::Debug for PipelineTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineTracker")
            .field("run_id", &self.run_id)
            .field("run_type", &self.run_type)
            .field("recorded", &self.recorded)
            .field("total_providers", &self.total_providers)
            .field("successful_providers", &self.successful_providers)
            .field("failures", &self.failures.len())
            .finish()
    }
}

impl PipelineTracker {
    /// Open a run of the given type
    pub async fn start(context: PipelineContext, run_type: &str) -> Self {
        Self::start_with_metadata(context, run_type, None).await
    }

    /// Open a run, storing free-form metadata on the run row
    pub async fn start_with_metadata(
        context: PipelineContext,
        run_type: &str,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        let run_id = Uuid::new_v4().to_string();
        let started_at = now();

        let recorded = match context
            .store
            .insert_run(NewPipelineRun {
                id: run_id.clone(),
                run_type: run_type.to_string(),
                started_at,
                metadata,
            })
            .await
        {
            Ok(_) => true,
            Err(e) => {
                error!(
                    run_id = %run_id,
                    run_type = %run_type,
                    error = %e,
                    "Failed to record pipeline run; continuing unrecorded"
                );
                false
            }
        };

        let tracker = Self {
            context,
            run_id,
            run_type: run_type.to_string(),
            recorded,
            started_at,
            total_providers: 0,
            successful_providers: 0,
            failures: Vec::new(),
            api_limit_hits: HashMap::new(),
        };

        log_run_operation(
            "start",
            &tracker.run_id,
            &tracker.run_type,
            if recorded { "recorded" } else { "unrecorded" },
            None,
        );
        tracker
            .emit(
                ActivityRecord::new(
                    activity::PIPELINE_STARTED,
                    activity::CATEGORY_PIPELINE,
                    format!("Pipeline run {} started ({})", tracker.run_id, tracker.run_type),
                )
                .with_details(json!({ "run_id": tracker.run_id, "run_type": tracker.run_type }))
                .with_status(ActivityStatus::Info),
            )
            .await;

        tracker
    }

    /// Record the expected number of providers; used for percentages only
    pub async fn set_total_providers(&mut self, count: usize) {
        self.total_providers = i32::try_from(count).unwrap_or(i32::MAX);

        if !self.recorded {
            return;
        }

        match self
            .context
            .store
            .update_run_total(&self.run_id, self.total_providers)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                warn!(run_id = %self.run_id, "Pipeline run row missing while setting total")
            }
            Err(e) => error!(run_id = %self.run_id, error = %e, "Failed to update total providers"),
        }
    }

    /// Record a provider-level success and resolve all of its open failures
    pub async fn log_success(
        &mut self,
        provider_id: i32,
        provider_name: &str,
        steps_completed: &[&str],
    ) {
        self.successful_providers += 1;

        match self
            .context
            .store
            .resolve_provider_failures(provider_id, now())
            .await
        {
            Ok(resolved) if resolved > 0 => debug!(
                run_id = %self.run_id,
                provider_id = provider_id,
                resolved = resolved,
                "Resolved prior failures after provider success"
            ),
            Ok(_) => {}
            Err(e) => error!(
                run_id = %self.run_id,
                provider_id = provider_id,
                error = %e,
                "Failed to resolve provider failures"
            ),
        }

        self.emit(
            ActivityRecord::new(
                activity::PROVIDER_SUCCESS,
                activity::CATEGORY_PIPELINE,
                format!("Pipeline completed for {provider_name}"),
            )
            .with_provider(provider_id, provider_name)
            .with_details(json!({
                "run_id": self.run_id,
                "steps_completed": steps_completed,
            })),
        )
        .await;
    }

    /// Record a step failure
    ///
    /// Returns the stored failure id when the write succeeded.
    pub async fn log_failure(
        &mut self,
        provider_id: i32,
        provider_name: &str,
        step: &str,
        reason: FailureReason,
        details: Option<&str>,
    ) -> Option<i32> {
        self.log_failure_with_retries(provider_id, provider_name, step, reason, details, 0)
            .await
    }

    /// Record a step failure that already consumed `retry_count` retries
    pub async fn log_failure_with_retries(
        &mut self,
        provider_id: i32,
        provider_name: &str,
        step: &str,
        reason: FailureReason,
        details: Option<&str>,
        retry_count: u32,
    ) -> Option<i32> {
        let recorded_at = now();

        if reason.is_api_limit() {
            self.api_limit_hits
                .entry(step.to_string())
                .or_default()
                .push(recorded_at);
            warn!(
                run_id = %self.run_id,
                step = %step,
                hits = self.api_limit_hits.get(step).map_or(0, Vec::len),
                "API limit reached"
            );
        }

        let failure_id = match self
            .context
            .store
            .insert_failure(NewPipelineFailure {
                provider_id,
                provider_name: provider_name.to_string(),
                pipeline_run_id: Some(self.run_id.clone()),
                step: step.to_string(),
                failure_reason: reason.clone(),
                error_details: details.map(str::to_string),
                retry_count: i32::try_from(retry_count).unwrap_or(i32::MAX),
                created_at: recorded_at,
            })
            .await
        {
            Ok(failure) => Some(failure.id),
            Err(e) => {
                error!(
                    run_id = %self.run_id,
                    provider_id = provider_id,
                    step = %step,
                    reason = %reason,
                    error = %e,
                    "Failed to record pipeline failure"
                );
                None
            }
        };

        self.failures.push(TrackedFailure {
            provider_id,
            provider_name: provider_name.to_string(),
            step: step.to_string(),
            reason: reason.clone(),
            details: details.map(str::to_string),
            failure_id,
            recorded_at,
        });

        log_step_operation("failure", &self.run_id, provider_id, step, reason.as_str(), details);

        let mut record = ActivityRecord::new(
            activity::PROVIDER_FAILURE,
            activity::CATEGORY_PIPELINE,
            format!("{step} failed for {provider_name}: {reason}"),
        )
        .with_provider(provider_id, provider_name)
        .with_details(json!({
            "run_id": self.run_id,
            "step": step,
            "failure_reason": reason.as_str(),
            "retry_count": retry_count,
        }))
        .with_status(ActivityStatus::Failed);
        if let Some(details) = details {
            record = record.with_error(details);
        }
        self.emit(record).await;

        failure_id
    }

    /// Record a step-level success; never resolves failures
    pub async fn log_step_success(
        &self,
        provider_id: i32,
        provider_name: &str,
        step: &str,
        details: Option<serde_json::Value>,
    ) {
        if let Err(e) = self
            .context
            .store
            .insert_step_event(NewPipelineStepEvent {
                pipeline_run_id: Some(self.run_id.clone()),
                provider_id,
                provider_name: provider_name.to_string(),
                step: step.to_string(),
                details: details.clone(),
                created_at: now(),
            })
            .await
        {
            error!(
                run_id = %self.run_id,
                provider_id = provider_id,
                step = %step,
                error = %e,
                "Failed to record step success"
            );
        }

        log_step_operation("success", &self.run_id, provider_id, step, "success", None);

        let mut record = ActivityRecord::new(
            activity::STEP_SUCCESS,
            activity::CATEGORY_PIPELINE,
            format!("{step} completed for {provider_name}"),
        )
        .with_provider(provider_id, provider_name);
        if let Some(details) = details {
            record = record.with_details(details);
        }
        self.emit(record).await;
    }

    /// Close the run and write its final counters
    pub async fn complete_pipeline(&mut self) -> RunSummary {
        let failed_providers = self.failed_provider_count();
        let completed_at = now();

        if self.recorded {
            match self
                .context
                .store
                .complete_run(
                    &self.run_id,
                    RunCompletion {
                        total_providers: self.total_providers,
                        successful_providers: self.successful_providers,
                        failed_providers,
                        completed_at,
                    },
                )
                .await
            {
                Ok(true) => {}
                Ok(false) => warn!(run_id = %self.run_id, "Pipeline run row missing at completion"),
                Err(e) => {
                    error!(run_id = %self.run_id, error = %e, "Failed to complete pipeline run")
                }
            }
        }

        let summary = RunSummary {
            run_id: self.run_id.clone(),
            run_type: self.run_type.clone(),
            total_providers: self.total_providers,
            successful_providers: self.successful_providers,
            failed_providers,
            recorded: self.recorded,
            started_at: self.started_at,
            completed_at,
        };

        log_run_operation(
            "complete",
            &self.run_id,
            &self.run_type,
            "completed",
            Some(&summary.to_string()),
        );
        self.emit(
            ActivityRecord::new(
                activity::PIPELINE_COMPLETED,
                activity::CATEGORY_PIPELINE,
                format!(
                    "Pipeline run {} completed: {} successful, {} failed",
                    self.run_id, summary.successful_providers, summary.failed_providers
                ),
            )
            .with_details(json!({
                "run_id": self.run_id,
                "total_providers": summary.total_providers,
                "successful_providers": summary.successful_providers,
                "failed_providers": summary.failed_providers,
            }))
            .with_status(ActivityStatus::Info),
        )
        .await;

        summary
    }

    /// Every unresolved failure in the store, newest first
    pub async fn get_unresolved_failures(&self) -> Vec<UnresolvedFailure> {
        match self.context.store.unresolved_failures().await {
            Ok(failures) => failures,
            Err(e) => {
                error!(run_id = %self.run_id, error = %e, "Failed to load unresolved failures");
                Vec::new()
            }
        }
    }

    /// Bump a failure's retry count
    ///
    /// Bookkeeping only: re-running the provider is the caller's job.
    pub async fn retry_failed_step(&self, failure_id: i32) -> bool {
        match self
            .context
            .store
            .increment_retry_count(failure_id, now())
            .await
        {
            Ok(true) => {
                self.emit(
                    ActivityRecord::new(
                        activity::FAILURE_RETRY,
                        activity::CATEGORY_PIPELINE,
                        format!("Retry recorded for pipeline failure {failure_id}"),
                    )
                    .with_details(json!({ "run_id": self.run_id, "failure_id": failure_id }))
                    .with_status(ActivityStatus::Info),
                )
                .await;
                true
            }
            Ok(false) => {
                warn!(failure_id = failure_id, "Pipeline failure not found for retry");
                false
            }
            Err(e) => {
                error!(failure_id = failure_id, error = %e, "Failed to record retry");
                false
            }
        }
    }

    /// Failures of the last seven days grouped by step and reason
    pub async fn get_failure_stats(&self) -> FailureStatsReport {
        let since = now() - Duration::days(FAILURE_STATS_WINDOW_DAYS);
        match self.context.store.failure_stats_since(since).await {
            Ok(rows) => FailureStatsReport::new(FAILURE_STATS_WINDOW_DAYS, rows),
            Err(e) => {
                error!(run_id = %self.run_id, error = %e, "Failed to load failure stats");
                FailureStatsReport::new(FAILURE_STATS_WINDOW_DAYS, Vec::new())
            }
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn run_type(&self) -> &str {
        &self.run_type
    }

    /// Whether the run row was written at start
    pub fn is_recorded(&self) -> bool {
        self.recorded
    }

    pub fn total_providers(&self) -> i32 {
        self.total_providers
    }

    pub fn successful_providers(&self) -> i32 {
        self.successful_providers
    }

    pub fn failures(&self) -> &[TrackedFailure] {
        &self.failures
    }

    /// Timestamps of `api_limit` failures per step; diagnostics only
    pub fn api_limit_hits(&self) -> &HashMap<String, Vec<NaiveDateTime>> {
        &self.api_limit_hits
    }

    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    fn failed_provider_count(&self) -> i32 {
        let distinct: HashSet<i32> = self
            .failures
            .iter()
            .filter(|f| !f.reason.is_api_limit())
            .map(|f| f.provider_id)
            .collect();
        i32::try_from(distinct.len()).unwrap_or(i32::MAX)
    }

    async fn emit(&self, record: ActivityRecord) {
        if !self.context.activity.log_activity(&record).await {
            warn!(
                run_id = %self.run_id,
                activity_type = %record.activity_type,
                "Activity logger rejected entry"
            );
        }
    }
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RunStatus;
    use crate::store::InMemoryPipelineStore;
    use crate::test_utils::{FailingPipelineStore, RecordingActivityLogger};
    use std::sync::Arc;

    fn context_with(store: Arc<InMemoryPipelineStore>) -> PipelineContext {
        PipelineContext::in_memory().with_store(store)
    }

    #[tokio::test]
    async fn test_start_records_running_run() {
        let store = Arc::new(InMemoryPipelineStore::new());
        let tracker = PipelineTracker::start(context_with(store.clone()), "automation").await;

        assert!(tracker.is_recorded());
        let runs = store.runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].id, tracker.run_id());
        assert_eq!(runs[0].run_type, "automation");
        assert_eq!(runs[0].run_status(), RunStatus::Running);
    }

    #[tokio::test]
    async fn test_api_limit_hits_tracked_per_step() {
        let store = Arc::new(InMemoryPipelineStore::new());
        let mut tracker = PipelineTracker::start(context_with(store), "automation").await;

        tracker
            .log_failure(1, "A", "geocoding", FailureReason::ApiLimit, Some("quota"))
            .await;
        tracker
            .log_failure(2, "B", "geocoding", FailureReason::ApiLimit, Some("quota"))
            .await;
        tracker
            .log_failure(3, "C", "ai_content", FailureReason::Timeout, None)
            .await;

        let hits = tracker.api_limit_hits();
        assert_eq!(hits.get("geocoding").map(Vec::len), Some(2));
        assert!(!hits.contains_key("ai_content"));
    }

    #[tokio::test]
    async fn test_step_success_does_not_resolve() {
        let store = Arc::new(InMemoryPipelineStore::new());
        let mut tracker = PipelineTracker::start(context_with(store.clone()), "automation").await;

        tracker
            .log_failure(1, "A", "geocoding", FailureReason::Timeout, None)
            .await;
        tracker
            .log_step_success(1, "A", "geocoding", Some(json!({"attempt": 2})))
            .await;

        assert_eq!(tracker.get_unresolved_failures().await.len(), 1);
        let events = store.step_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].step, "geocoding");
    }

    #[tokio::test]
    async fn test_store_failures_are_swallowed() {
        let context = PipelineContext::in_memory().with_store(Arc::new(FailingPipelineStore));
        let mut tracker = PipelineTracker::start(context, "automation").await;

        assert!(!tracker.is_recorded());
        tracker.set_total_providers(2).await;
        let failure_id = tracker
            .log_failure(1, "A", "geocoding", FailureReason::Timeout, Some("boom"))
            .await;
        assert!(failure_id.is_none());
        tracker.log_success(2, "B", &["geocoding"]).await;
        tracker.log_step_success(2, "B", "geocoding", None).await;

        assert!(tracker.get_unresolved_failures().await.is_empty());
        assert!(!tracker.retry_failed_step(1).await);
        assert!(tracker.get_failure_stats().await.rows.is_empty());

        let summary = tracker.complete_pipeline().await;
        assert!(!summary.recorded);
        assert_eq!(summary.successful_providers, 1);
        assert_eq!(summary.failed_providers, 1);
        assert_eq!(summary.total_providers, 2);
    }

    #[tokio::test]
    async fn test_activity_events_emitted() {
        let recorder = Arc::new(RecordingActivityLogger::new());
        let context = PipelineContext::in_memory().with_activity_logger(recorder.clone());
        let mut tracker = PipelineTracker::start(context, "automation").await;

        tracker
            .log_failure(1, "A", "ai_content", FailureReason::GenerationFailed, Some("empty"))
            .await;
        tracker.log_success(1, "A", &["ai_content"]).await;
        tracker.complete_pipeline().await;

        let types: Vec<String> = recorder
            .records()
            .into_iter()
            .map(|record| record.activity_type)
            .collect();
        assert_eq!(
            types,
            vec![
                activity::PIPELINE_STARTED,
                activity::PROVIDER_FAILURE,
                activity::PROVIDER_SUCCESS,
                activity::PIPELINE_COMPLETED,
            ]
        );
    }

    #[tokio::test]
    async fn test_rejecting_activity_logger_does_not_block() {
        let recorder = Arc::new(RecordingActivityLogger::rejecting());
        let store = Arc::new(InMemoryPipelineStore::new());
        let context = context_with(store.clone()).with_activity_logger(recorder);
        let mut tracker = PipelineTracker::start(context, "automation").await;

        tracker
            .log_failure(1, "A", "geocoding", FailureReason::Timeout, None)
            .await;

        assert_eq!(store.failures().len(), 1);
    }
}
