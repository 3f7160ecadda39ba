//! # Data Models
//!
//! Run, failure and step-event records persisted by the pipeline, plus the
//! provider DTO and the failure reason taxonomy.
//!
//! - [`pipeline_run`] - `pipeline_runs` rows and run status
//! - [`pipeline_failure`] - `pipeline_failures` rows, unresolved listings and stats
//! - [`pipeline_step_event`] - `pipeline_steps` audit rows
//! - [`failure_reason`] - categorical failure reasons
//! - [`provider`] - provider record populated at the boundary

pub mod failure_reason;
pub mod pipeline_failure;
pub mod pipeline_run;
pub mod pipeline_step_event;
pub mod provider;

pub use failure_reason::FailureReason;
pub use pipeline_failure::{FailureStat, NewPipelineFailure, PipelineFailure, UnresolvedFailure};
pub use pipeline_run::{NewPipelineRun, PipelineRun, RunCompletion, RunStatus};
pub use pipeline_step_event::{NewPipelineStepEvent, PipelineStepEvent};
pub use provider::ProviderRecord;
