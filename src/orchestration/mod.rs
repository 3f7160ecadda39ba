//! # Pipeline Orchestration
//!
//! Executes the per-provider enrichment pipeline and records what happened
//! through the [`PipelineTracker`](crate::tracker::PipelineTracker).
//!
//! ## Core Components
//!
//! - **RetryOrchestrator**: bounded retries with exponential backoff around one step
//! - **ProviderPipeline**: ordered step handlers with idempotent guards
//! - **PipelineRunner**: batches of providers inside one tracked run, plus re-runs of failures
//! - **error_classifier**: typed and message-based failure classification
//!
//! Step work never raises: it returns a [`StepOutcome`] and the orchestrator
//! decides whether to retry, stop or record success.

pub mod error_classifier;
pub mod pipeline_runner;
pub mod provider_pipeline;
pub mod retry_orchestrator;
pub mod traits;
pub mod types;

pub use error_classifier::{classify_error_message, ClassifyFailure};
pub use pipeline_runner::{PipelineRunner, RunReport};
pub use provider_pipeline::{
    ProviderOutcome, ProviderPipeline, ProviderPipelineBuilder, StepDisposition, StepReport,
};
pub use retry_orchestrator::{RetryDisposition, RetryOrchestrator, RetryPolicy, RetryReport};
pub use traits::{ProviderRepository, StepHandler};
pub use types::StepOutcome;
