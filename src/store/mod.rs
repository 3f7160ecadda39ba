//! # Pipeline Store
//!
//! Persistence port for runs, failures and step events. The tracker only talks
//! to this trait, so PostgreSQL and in-process stores are interchangeable.

pub mod memory;
pub mod postgres;

use crate::error::PipelineResult;
use crate::models::{
    FailureStat, NewPipelineFailure, NewPipelineRun, NewPipelineStepEvent, PipelineFailure,
    PipelineRun, PipelineStepEvent, RunCompletion, UnresolvedFailure,
};
use async_trait::async_trait;
use chrono::NaiveDateTime;

pub use memory::InMemoryPipelineStore;
pub use postgres::PgPipelineStore;

#[async_trait]
pub trait PipelineStore: Send + Sync {
    /// Insert a `running` run row
    async fn insert_run(&self, new_run: NewPipelineRun) -> PipelineResult<PipelineRun>;

    async fn update_run_total(&self, run_id: &str, total_providers: i32) -> PipelineResult<bool>;

    /// Mark a run completed with its final counters
    async fn complete_run(&self, run_id: &str, completion: RunCompletion) -> PipelineResult<bool>;

    async fn find_run(&self, run_id: &str) -> PipelineResult<Option<PipelineRun>>;

    /// Most recently started runs first
    async fn recent_runs(&self, limit: i64) -> PipelineResult<Vec<PipelineRun>>;

    async fn insert_failure(
        &self,
        new_failure: NewPipelineFailure,
    ) -> PipelineResult<PipelineFailure>;

    async fn find_failure(&self, failure_id: i32) -> PipelineResult<Option<PipelineFailure>>;

    async fn failures_for_run(&self, run_id: &str) -> PipelineResult<Vec<PipelineFailure>>;

    /// Resolve every unresolved failure of a provider; returns how many changed
    async fn resolve_provider_failures(
        &self,
        provider_id: i32,
        resolved_at: NaiveDateTime,
    ) -> PipelineResult<u64>;

    /// Returns false when the failure does not exist
    async fn increment_retry_count(
        &self,
        failure_id: i32,
        updated_at: NaiveDateTime,
    ) -> PipelineResult<bool>;

    /// All unresolved failures across runs, newest first
    async fn unresolved_failures(&self) -> PipelineResult<Vec<UnresolvedFailure>>;

    /// Failures created at or after `since`, grouped by step and reason
    async fn failure_stats_since(&self, since: NaiveDateTime) -> PipelineResult<Vec<FailureStat>>;

    async fn insert_step_event(
        &self,
        new_event: NewPipelineStepEvent,
    ) -> PipelineResult<PipelineStepEvent>;

    async fn step_events_for_run(&self, run_id: &str) -> PipelineResult<Vec<PipelineStepEvent>>;
}
