//! # Provider Pipeline
//!
//! Drives one provider through the ordered enrichment steps:
//!
//! ```text
//! pending -> google_data -> geocoding -> ai_content -> wp_preparation -> {approved | stuck}
//! ```
//!
//! Each step's guard is checked first; a satisfied guard records a step
//! success tagged `already_complete` and skips the work. Otherwise the step
//! runs under the [`RetryOrchestrator`]. A failed step does not block later
//! steps. After the last step every guard is re-checked: all satisfied means
//! the provider succeeded (`approved`), anything else leaves it `stuck`.
//!
//! On success a `pending` provider whose AI content is complete is approved
//! through the [`ProviderRepository`]. Approval errors are logged and ignored.

use crate::constants::ALREADY_COMPLETE;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{FailureReason, ProviderRecord};
use crate::orchestration::retry_orchestrator::{RetryDisposition, RetryOrchestrator, RetryPolicy};
use crate::orchestration::traits::{ProviderRepository, StepHandler};
use crate::state_machine::{PipelineStep, ProviderState};
use crate::tracker::PipelineTracker;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What happened to one step of one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "disposition", rename_all = "snake_case")]
pub enum StepDisposition {
    /// Guard was satisfied; no work ran
    AlreadyComplete,
    Executed { attempts: u32 },
    Failed { reason: FailureReason, attempts: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub step: PipelineStep,
    pub disposition: StepDisposition,
}

/// Result of one pass over a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderOutcome {
    pub provider_id: i32,
    pub provider_name: String,
    /// `Approved` or `Stuck`
    pub final_state: ProviderState,
    pub steps: Vec<StepReport>,
    /// Steps whose guard still failed after the pass
    pub incomplete_steps: Vec<PipelineStep>,
    /// Whether the repository approved the provider during this pass
    pub approved: bool,
}

impl ProviderOutcome {
    pub fn is_success(&self) -> bool {
        self.final_state == ProviderState::Approved
    }

    /// Steps whose work actually ran (successfully or not)
    pub fn executed_steps(&self) -> Vec<PipelineStep> {
        self.steps
            .iter()
            .filter(|report| report.disposition != StepDisposition::AlreadyComplete)
            .map(|report| report.step)
            .collect()
    }
}

pub struct ProviderPipeline {
    handlers: Vec<Arc<dyn StepHandler>>,
    orchestrator: RetryOrchestrator,
    repository: Option<Arc<dyn ProviderRepository>>,
}

impl std::fmt::Debug for ProviderPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderPipeline")
            .field("steps", &self.steps())
            .field("retry_policy", self.orchestrator.policy())
            .field("has_repository", &self.repository.is_some())
            .finish()
    }
}

impl ProviderPipeline {
    pub fn builder() -> ProviderPipelineBuilder {
        ProviderPipelineBuilder::default()
    }

    /// Configured steps in execution order
    pub fn steps(&self) -> Vec<PipelineStep> {
        self.handlers.iter().map(|handler| handler.step()).collect()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        self.orchestrator.policy()
    }

    /// Run every step for one provider, recording outcomes on `tracker`
    pub async fn process(
        &self,
        tracker: &mut PipelineTracker,
        provider: &ProviderRecord,
    ) -> ProviderOutcome {
        let mut steps = Vec::with_capacity(self.handlers.len());

        for handler in &self.handlers {
            let step = handler.step();
            debug!(
                run_id = %tracker.run_id(),
                provider_id = provider.id,
                state = %ProviderState::for_step(step),
                "Entering pipeline step"
            );

            if handler.is_complete(provider).await {
                tracker
                    .log_step_success(
                        provider.id,
                        &provider.name,
                        step.as_str(),
                        Some(json!({ "reason": ALREADY_COMPLETE })),
                    )
                    .await;
                steps.push(StepReport {
                    step,
                    disposition: StepDisposition::AlreadyComplete,
                });
                continue;
            }

            let report = self
                .orchestrator
                .execute(tracker, provider.id, &provider.name, step.as_str(), |_attempt| {
                    handler.execute(provider)
                })
                .await;

            let disposition = match report.disposition {
                RetryDisposition::Succeeded => StepDisposition::Executed {
                    attempts: report.attempts,
                },
                RetryDisposition::Aborted | RetryDisposition::Exhausted => StepDisposition::Failed {
                    reason: report
                        .recorded_reason
                        .unwrap_or(FailureReason::MaxRetriesExceeded),
                    attempts: report.attempts,
                },
            };
            steps.push(StepReport { step, disposition });
        }

        let mut incomplete_steps = Vec::new();
        for handler in &self.handlers {
            if !handler.is_complete(provider).await {
                incomplete_steps.push(handler.step());
            }
        }

        if !incomplete_steps.is_empty() {
            warn!(
                run_id = %tracker.run_id(),
                provider_id = provider.id,
                incomplete = ?incomplete_steps,
                "Provider left stuck with incomplete steps"
            );
            return ProviderOutcome {
                provider_id: provider.id,
                provider_name: provider.name.clone(),
                final_state: ProviderState::Stuck,
                steps,
                incomplete_steps,
                approved: false,
            };
        }

        let completed: Vec<&str> = self
            .handlers
            .iter()
            .map(|handler| handler.step().as_str())
            .collect();
        tracker
            .log_success(provider.id, &provider.name, &completed)
            .await;

        let approved = self.approve_if_ready(provider).await;

        ProviderOutcome {
            provider_id: provider.id,
            provider_name: provider.name.clone(),
            final_state: ProviderState::Approved,
            steps,
            incomplete_steps,
            approved,
        }
    }

    /// Called only after every guard passed, so AI content is complete when
    /// the pipeline has an AI content step at all
    async fn approve_if_ready(&self, provider: &ProviderRecord) -> bool {
        let Some(repository) = &self.repository else {
            return false;
        };
        let has_ai_content = self
            .handlers
            .iter()
            .any(|handler| handler.step() == PipelineStep::AiContent);

        if !provider.is_pending() || !has_ai_content {
            return false;
        }

        match repository.approve(provider.id).await {
            Ok(()) => {
                info!(
                    provider_id = provider.id,
                    provider_name = %provider.name,
                    "Provider approved"
                );
                true
            }
            Err(e) => {
                error!(provider_id = provider.id, error = %e, "Failed to approve provider");
                false
            }
        }
    }
}

#[derive(Default)]
pub struct ProviderPipelineBuilder {
    handlers: Vec<Arc<dyn StepHandler>>,
    retry_policy: RetryPolicy,
    repository: Option<Arc<dyn ProviderRepository>>,
}

impl ProviderPipelineBuilder {
    /// Add a step handler; order of calls does not matter
    pub fn with_step(mut self, handler: Arc<dyn StepHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Repository used for approval; without one approval is skipped
    pub fn with_repository(mut self, repository: Arc<dyn ProviderRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Sort handlers into step order, rejecting duplicates and empty pipelines
    pub fn build(mut self) -> PipelineResult<ProviderPipeline> {
        if self.handlers.is_empty() {
            return Err(PipelineError::ValidationError(
                "pipeline needs at least one step handler".to_string(),
            ));
        }

        self.handlers.sort_by_key(|handler| handler.step());

        let mut seen = HashSet::new();
        for handler in &self.handlers {
            if !seen.insert(handler.step()) {
                return Err(PipelineError::ValidationError(format!(
                    "duplicate handler for step {}",
                    handler.step()
                )));
            }
        }

        Ok(ProviderPipeline {
            handlers: self.handlers,
            orchestrator: RetryOrchestrator::new(self.retry_policy),
            repository: self.repository,
        })
    }
}
