//! # Pipeline Runner
//!
//! Runs the provider pipeline over a batch of providers inside one tracked
//! run, and re-runs providers that still have unresolved failures.
//!
//! Providers are processed one at a time in the order given.

use crate::constants::run_types;
use crate::context::PipelineContext;
use crate::error::PipelineResult;
use crate::models::ProviderRecord;
use crate::orchestration::provider_pipeline::{ProviderOutcome, ProviderPipeline};
use crate::orchestration::traits::ProviderRepository;
use crate::reporting::{FailureReport, RunSummary};
use crate::tracker::PipelineTracker;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

/// Everything a finished run produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub summary: RunSummary,
    pub outcomes: Vec<ProviderOutcome>,
    /// Unresolved failures across all runs once this run finished
    pub failure_report: FailureReport,
}

impl RunReport {
    pub fn stuck_providers(&self) -> Vec<i32> {
        self.outcomes
            .iter()
            .filter(|outcome| !outcome.is_success())
            .map(|outcome| outcome.provider_id)
            .collect()
    }
}

pub struct PipelineRunner {
    context: PipelineContext,
    pipeline: ProviderPipeline,
    repository: Arc<dyn ProviderRepository>,
}

impl std::fmt::Debug for PipelineRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineRunner")
            .field("context", &self.context)
            .field("pipeline", &self.pipeline)
            .finish()
    }
}

impl PipelineRunner {
    pub fn new(
        context: PipelineContext,
        pipeline: ProviderPipeline,
        repository: Arc<dyn ProviderRepository>,
    ) -> Self {
        Self {
            context,
            pipeline,
            repository,
        }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    /// Process `providers` in order under a new run of `run_type`
    pub async fn run(&self, run_type: &str, providers: &[ProviderRecord]) -> RunReport {
        let tracker = PipelineTracker::start(self.context.clone(), run_type).await;
        self.run_with_tracker(tracker, providers).await
    }

    /// Load providers by id, then [`run`](Self::run) them
    pub async fn run_for_ids(
        &self,
        run_type: &str,
        provider_ids: &[i32],
    ) -> PipelineResult<RunReport> {
        let providers = self.load_in_order(provider_ids).await?;
        Ok(self.run(run_type, &providers).await)
    }

    /// Re-run every provider with unresolved failures under a `retry` run
    ///
    /// Providers are loaded before the run starts, so a lookup error leaves
    /// no run behind and no retry counts bumped. Each unresolved failure's
    /// retry count is then bumped and providers are re-run from the first
    /// step; guards decide what executes again.
    pub async fn retry_failures(&self) -> PipelineResult<RunReport> {
        let unresolved = self.context.store.unresolved_failures().await?;
        let mut seen = HashSet::new();
        let provider_ids: Vec<i32> = unresolved
            .iter()
            .map(|entry| entry.failure.provider_id)
            .filter(|provider_id| seen.insert(*provider_id))
            .collect();
        let providers = self.load_in_order(&provider_ids).await?;

        let tracker = PipelineTracker::start_with_metadata(
            self.context.clone(),
            run_types::RETRY,
            Some(json!({ "source": "unresolved_failures" })),
        )
        .await;

        for entry in &unresolved {
            if !tracker.retry_failed_step(entry.failure.id).await {
                warn!(failure_id = entry.failure.id, "Could not record retry for failure");
            }
        }

        info!(
            run_id = %tracker.run_id(),
            failures = unresolved.len(),
            providers = providers.len(),
            "Retrying providers with unresolved failures"
        );

        Ok(self.run_with_tracker(tracker, &providers).await)
    }

    async fn run_with_tracker(
        &self,
        mut tracker: PipelineTracker,
        providers: &[ProviderRecord],
    ) -> RunReport {
        tracker.set_total_providers(providers.len()).await;

        let mut outcomes = Vec::with_capacity(providers.len());
        for provider in providers {
            outcomes.push(self.pipeline.process(&mut tracker, provider).await);
        }

        let summary = tracker.complete_pipeline().await;
        let failure_report = FailureReport::from_unresolved(
            &tracker.get_unresolved_failures().await,
            self.context.config.reporting.example_provider_limit,
        );

        info!(
            run_id = %summary.run_id,
            successful = summary.successful_providers,
            failed = summary.failed_providers,
            unresolved = failure_report.total_unresolved,
            "Pipeline run finished"
        );

        RunReport {
            summary,
            outcomes,
            failure_report,
        }
    }

    /// Fetch providers and order them like `provider_ids`
    async fn load_in_order(&self, provider_ids: &[i32]) -> PipelineResult<Vec<ProviderRecord>> {
        if provider_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut by_id: HashMap<i32, ProviderRecord> = self
            .repository
            .find_by_ids(provider_ids)
            .await?
            .into_iter()
            .map(|provider| (provider.id, provider))
            .collect();

        let providers: Vec<ProviderRecord> = provider_ids
            .iter()
            .filter_map(|id| by_id.remove(id))
            .collect();
        if providers.len() < provider_ids.len() {
            warn!(
                requested = provider_ids.len(),
                found = providers.len(),
                "Some providers were not found"
            );
        }
        Ok(providers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::PipelineStep;
    use crate::test_utils::{InMemoryProviderRepository, ScriptedStepHandler};

    #[tokio::test]
    async fn test_run_for_ids_keeps_requested_order_and_skips_missing() {
        let repository = Arc::new(InMemoryProviderRepository::new(vec![
            ProviderRecord::new(1, "One"),
            ProviderRecord::new(2, "Two"),
        ]));
        let pipeline = ProviderPipeline::builder()
            .with_step(Arc::new(ScriptedStepHandler::new(PipelineStep::Geocoding)))
            .build()
            .unwrap();
        let runner = PipelineRunner::new(PipelineContext::in_memory(), pipeline, repository);

        let report = runner
            .run_for_ids(run_types::AUTOMATION, &[2, 99, 1])
            .await
            .unwrap();

        let ids: Vec<i32> = report.outcomes.iter().map(|o| o.provider_id).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(report.summary.total_providers, 2);
        assert_eq!(report.summary.successful_providers, 2);
        assert!(report.stuck_providers().is_empty());
    }

    #[tokio::test]
    async fn test_retry_with_nothing_unresolved() {
        let repository = Arc::new(InMemoryProviderRepository::new(Vec::new()));
        let pipeline = ProviderPipeline::builder()
            .with_step(Arc::new(ScriptedStepHandler::new(PipelineStep::Geocoding)))
            .build()
            .unwrap();
        let runner = PipelineRunner::new(PipelineContext::in_memory(), pipeline, repository);

        let report = runner.retry_failures().await.unwrap();
        assert_eq!(report.summary.run_type, run_types::RETRY);
        assert_eq!(report.summary.total_providers, 0);
        assert!(report.outcomes.is_empty());
        assert!(report.failure_report.is_empty());
    }

    #[tokio::test]
    async fn test_retry_lookup_error_leaves_no_run_and_no_bumped_counts() {
        let store = Arc::new(crate::store::InMemoryPipelineStore::new());
        let context = PipelineContext::in_memory().with_store(store.clone());
        {
            let mut tracker = PipelineTracker::start(context.clone(), run_types::AUTOMATION).await;
            tracker
                .log_failure(
                    4,
                    "Four",
                    "geocoding",
                    crate::models::FailureReason::Timeout,
                    None,
                )
                .await;
            tracker.complete_pipeline().await;
        }

        let repository = Arc::new(InMemoryProviderRepository::new(Vec::new()).failing_lookups());
        let pipeline = ProviderPipeline::builder()
            .with_step(Arc::new(ScriptedStepHandler::new(PipelineStep::Geocoding)))
            .build()
            .unwrap();
        let runner = PipelineRunner::new(context, pipeline, repository);

        assert!(runner.retry_failures().await.is_err());

        let runs = store.runs();
        assert_eq!(runs.len(), 1);
        assert!(runs
            .iter()
            .all(|run| run.run_status() == crate::models::RunStatus::Completed));
        assert_eq!(store.failures()[0].retry_count, 0);
        assert!(!store.failures()[0].resolved);
    }
}
