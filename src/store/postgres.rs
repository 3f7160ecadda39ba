//! PostgreSQL-backed [`PipelineStore`]. Every call is its own statement on a
//! pooled connection; nothing spans a run.

use super::PipelineStore;
use crate::config::ProviderTableConfig;
use crate::error::PipelineResult;
use crate::models::{
    FailureStat, NewPipelineFailure, NewPipelineRun, NewPipelineStepEvent, PipelineFailure,
    PipelineRun, PipelineStepEvent, RunCompletion, UnresolvedFailure,
};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::PgPool;

#[derive(Debug, Clone)]
pub struct PgPipelineStore {
    pool: PgPool,
    provider_table: Option<ProviderTableConfig>,
}

impl PgPipelineStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            provider_table: None,
        }
    }

    /// Join this provider table when listing unresolved failures
    pub fn with_provider_table(mut self, provider_table: Option<ProviderTableConfig>) -> Self {
        self.provider_table = provider_table;
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl PipelineStore for PgPipelineStore {
    async fn insert_run(&self, new_run: NewPipelineRun) -> PipelineResult<PipelineRun> {
        Ok(PipelineRun::create(&self.pool, new_run).await?)
    }

    async fn update_run_total(&self, run_id: &str, total_providers: i32) -> PipelineResult<bool> {
        Ok(PipelineRun::update_total_providers(&self.pool, run_id, total_providers).await?)
    }

    async fn complete_run(&self, run_id: &str, completion: RunCompletion) -> PipelineResult<bool> {
        Ok(PipelineRun::complete(&self.pool, run_id, completion).await?)
    }

    async fn find_run(&self, run_id: &str) -> PipelineResult<Option<PipelineRun>> {
        Ok(PipelineRun::find_by_id(&self.pool, run_id).await?)
    }

    async fn recent_runs(&self, limit: i64) -> PipelineResult<Vec<PipelineRun>> {
        Ok(PipelineRun::recent(&self.pool, limit).await?)
    }

    async fn insert_failure(
        &self,
        new_failure: NewPipelineFailure,
    ) -> PipelineResult<PipelineFailure> {
        Ok(PipelineFailure::create(&self.pool, new_failure).await?)
    }

    async fn find_failure(&self, failure_id: i32) -> PipelineResult<Option<PipelineFailure>> {
        Ok(PipelineFailure::find_by_id(&self.pool, failure_id).await?)
    }

    async fn failures_for_run(&self, run_id: &str) -> PipelineResult<Vec<PipelineFailure>> {
        Ok(PipelineFailure::for_run(&self.pool, run_id).await?)
    }

    async fn resolve_provider_failures(
        &self,
        provider_id: i32,
        resolved_at: NaiveDateTime,
    ) -> PipelineResult<u64> {
        Ok(PipelineFailure::resolve_for_provider(&self.pool, provider_id, resolved_at).await?)
    }

    async fn increment_retry_count(
        &self,
        failure_id: i32,
        updated_at: NaiveDateTime,
    ) -> PipelineResult<bool> {
        Ok(PipelineFailure::increment_retry_count(&self.pool, failure_id, updated_at).await?)
    }

    async fn unresolved_failures(&self) -> PipelineResult<Vec<UnresolvedFailure>> {
        Ok(PipelineFailure::unresolved(&self.pool, self.provider_table.as_ref()).await?)
    }

    async fn failure_stats_since(&self, since: NaiveDateTime) -> PipelineResult<Vec<FailureStat>> {
        Ok(PipelineFailure::stats_since(&self.pool, since).await?)
    }

    async fn insert_step_event(
        &self,
        new_event: NewPipelineStepEvent,
    ) -> PipelineResult<PipelineStepEvent> {
        Ok(PipelineStepEvent::create(&self.pool, new_event).await?)
    }

    async fn step_events_for_run(&self, run_id: &str) -> PipelineResult<Vec<PipelineStepEvent>> {
        Ok(PipelineStepEvent::for_run(&self.pool, run_id).await?)
    }
}
