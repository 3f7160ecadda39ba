//! # Pipeline Collaborator Traits
//!
//! Seams between the pipeline and the directory system it works on. Step
//! handlers wrap the external enrichment calls; the repository loads and
//! approves providers.

use crate::error::PipelineResult;
use crate::models::ProviderRecord;
use crate::orchestration::types::StepOutcome;
use crate::state_machine::PipelineStep;
use async_trait::async_trait;

/// One enrichment step of the per-provider pipeline
#[async_trait]
pub trait StepHandler: Send + Sync {
    /// The step this handler implements
    fn step(&self) -> PipelineStep;

    /// Idempotent guard: true when the provider already has this step's output
    async fn is_complete(&self, provider: &ProviderRecord) -> bool;

    /// Perform one attempt; invoked again by the retry loop on failure
    async fn execute(&self, provider: &ProviderRecord) -> StepOutcome;
}

/// Provider lookup and the approval side effect
#[async_trait]
pub trait ProviderRepository: Send + Sync {
    /// Providers for the given ids; missing ids are skipped
    async fn find_by_ids(&self, ids: &[i32]) -> PipelineResult<Vec<ProviderRecord>>;

    async fn approve(&self, provider_id: i32) -> PipelineResult<()>;
}
