//! Process-local [`PipelineStore`] with the same ordering and aggregation rules
//! as the PostgreSQL store. Used for dry runs and tests.

use super::PipelineStore;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{
    FailureStat, NewPipelineFailure, NewPipelineRun, NewPipelineStepEvent, PipelineFailure,
    PipelineRun, PipelineStepEvent, RunCompletion, RunStatus, UnresolvedFailure,
};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Default)]
struct MemoryState {
    runs: Vec<PipelineRun>,
    failures: Vec<PipelineFailure>,
    step_events: Vec<PipelineStepEvent>,
    /// Stand-in for the directory's provider table
    provider_names: HashMap<i32, String>,
}

#[derive(Debug, Default)]
pub struct InMemoryPipelineStore {
    state: Mutex<MemoryState>,
}

impl InMemoryPipelineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current provider name shown instead of the denormalized one
    pub fn set_provider_name(&self, provider_id: i32, name: impl Into<String>) {
        self.state.lock().provider_names.insert(provider_id, name.into());
    }

    pub fn runs(&self) -> Vec<PipelineRun> {
        self.state.lock().runs.clone()
    }

    pub fn failures(&self) -> Vec<PipelineFailure> {
        self.state.lock().failures.clone()
    }

    pub fn step_events(&self) -> Vec<PipelineStepEvent> {
        self.state.lock().step_events.clone()
    }
}

#[async_trait]
impl PipelineStore for InMemoryPipelineStore {
    async fn insert_run(&self, new_run: NewPipelineRun) -> PipelineResult<PipelineRun> {
        let mut state = self.state.lock();
        if state.runs.iter().any(|run| run.id == new_run.id) {
            return Err(PipelineError::ValidationError(format!(
                "pipeline run {} already exists",
                new_run.id
            )));
        }

        let run = PipelineRun::from_new(new_run);
        state.runs.push(run.clone());
        Ok(run)
    }

    async fn update_run_total(&self, run_id: &str, total_providers: i32) -> PipelineResult<bool> {
        let mut state = self.state.lock();
        Ok(match state.runs.iter_mut().find(|run| run.id == run_id) {
            Some(run) => {
                run.total_providers = total_providers;
                true
            }
            None => false,
        })
    }

    async fn complete_run(&self, run_id: &str, completion: RunCompletion) -> PipelineResult<bool> {
        let mut state = self.state.lock();
        Ok(match state.runs.iter_mut().find(|run| run.id == run_id) {
            Some(run) => {
                run.status = RunStatus::Completed.to_string();
                run.total_providers = completion.total_providers;
                run.successful_providers = completion.successful_providers;
                run.failed_providers = completion.failed_providers;
                run.completed_at = Some(completion.completed_at);
                true
            }
            None => false,
        })
    }

    async fn find_run(&self, run_id: &str) -> PipelineResult<Option<PipelineRun>> {
        Ok(self
            .state
            .lock()
            .runs
            .iter()
            .find(|run| run.id == run_id)
            .cloned())
    }

    async fn recent_runs(&self, limit: i64) -> PipelineResult<Vec<PipelineRun>> {
        let mut runs = self.state.lock().runs.clone();
        // Insertion order breaks ties between runs started in the same instant
        runs.reverse();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(runs)
    }

    async fn insert_failure(
        &self,
        new_failure: NewPipelineFailure,
    ) -> PipelineResult<PipelineFailure> {
        let mut state = self.state.lock();
        let next_id = state.failures.last().map_or(1, |failure| failure.id + 1);
        let failure = PipelineFailure::from_new(next_id, new_failure);
        state.failures.push(failure.clone());
        Ok(failure)
    }

    async fn find_failure(&self, failure_id: i32) -> PipelineResult<Option<PipelineFailure>> {
        Ok(self
            .state
            .lock()
            .failures
            .iter()
            .find(|failure| failure.id == failure_id)
            .cloned())
    }

    async fn failures_for_run(&self, run_id: &str) -> PipelineResult<Vec<PipelineFailure>> {
        Ok(self
            .state
            .lock()
            .failures
            .iter()
            .filter(|failure| failure.pipeline_run_id.as_deref() == Some(run_id))
            .cloned()
            .collect())
    }

    async fn resolve_provider_failures(
        &self,
        provider_id: i32,
        resolved_at: NaiveDateTime,
    ) -> PipelineResult<u64> {
        let mut state = self.state.lock();
        let mut resolved = 0;
        for failure in state
            .failures
            .iter_mut()
            .filter(|failure| failure.provider_id == provider_id && !failure.resolved)
        {
            failure.resolved = true;
            failure.resolved_at = Some(resolved_at);
            failure.updated_at = resolved_at;
            resolved += 1;
        }
        Ok(resolved)
    }

    async fn increment_retry_count(
        &self,
        failure_id: i32,
        updated_at: NaiveDateTime,
    ) -> PipelineResult<bool> {
        let mut state = self.state.lock();
        Ok(
            match state.failures.iter_mut().find(|failure| failure.id == failure_id) {
                Some(failure) => {
                    failure.retry_count += 1;
                    failure.updated_at = updated_at;
                    true
                }
                None => false,
            },
        )
    }

    async fn unresolved_failures(&self) -> PipelineResult<Vec<UnresolvedFailure>> {
        let state = self.state.lock();
        let mut unresolved: Vec<UnresolvedFailure> = state
            .failures
            .iter()
            .filter(|failure| !failure.resolved)
            .map(|failure| UnresolvedFailure {
                display_name: state
                    .provider_names
                    .get(&failure.provider_id)
                    .cloned()
                    .unwrap_or_else(|| failure.provider_name.clone()),
                failure: failure.clone(),
            })
            .collect();

        unresolved.sort_by(|a, b| {
            b.failure
                .created_at
                .cmp(&a.failure.created_at)
                .then_with(|| b.failure.id.cmp(&a.failure.id))
        });
        Ok(unresolved)
    }

    async fn failure_stats_since(&self, since: NaiveDateTime) -> PipelineResult<Vec<FailureStat>> {
        let state = self.state.lock();
        let mut groups: BTreeMap<(String, String), (i64, i64)> = BTreeMap::new();
        for failure in state.failures.iter().filter(|f| f.created_at >= since) {
            let counts = groups
                .entry((failure.step.clone(), failure.failure_reason.clone()))
                .or_default();
            if failure.resolved {
                counts.0 += 1;
            } else {
                counts.1 += 1;
            }
        }

        let mut stats: Vec<FailureStat> = groups
            .into_iter()
            .map(|((step, failure_reason), (resolved, unresolved))| FailureStat {
                step,
                failure_reason,
                total: resolved + unresolved,
                resolved_count: resolved,
                unresolved_count: unresolved,
            })
            .collect();

        // BTreeMap already orders by (step, reason); stable sort keeps that for ties
        stats.sort_by(|a, b| b.total.cmp(&a.total));
        Ok(stats)
    }

    async fn insert_step_event(
        &self,
        new_event: NewPipelineStepEvent,
    ) -> PipelineResult<PipelineStepEvent> {
        let mut state = self.state.lock();
        let next_id = state.step_events.last().map_or(1, |event| event.id + 1);
        let event = PipelineStepEvent::from_new(next_id, new_event);
        state.step_events.push(event.clone());
        Ok(event)
    }

    async fn step_events_for_run(&self, run_id: &str) -> PipelineResult<Vec<PipelineStepEvent>> {
        Ok(self
            .state
            .lock()
            .step_events
            .iter()
            .filter(|event| event.pipeline_run_id.as_deref() == Some(run_id))
            .cloned()
            .collect())
    }
}
