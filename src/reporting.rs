//! # Reporting
//!
//! Run summaries, grouped failure reports and rolling failure statistics.
//!
//! [`FailureReporter`] reads the store directly, so operators can inspect
//! failures without opening a run.

use crate::constants::FAILURE_STATS_WINDOW_DAYS;
use crate::context::PipelineContext;
use crate::error::PipelineResult;
use crate::models::{FailureReason, FailureStat, PipelineRun, UnresolvedFailure};
use chrono::{Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Final counters of a run as seen by its tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub run_type: String,
    pub total_providers: i32,
    pub successful_providers: i32,
    pub failed_providers: i32,
    /// False when the run row could not be written
    pub recorded: bool,
    pub started_at: NaiveDateTime,
    pub completed_at: NaiveDateTime,
}

impl RunSummary {
    /// Successful providers relative to the expected total
    pub fn success_percentage(&self) -> f64 {
        if self.total_providers <= 0 {
            0.0
        } else {
            f64::from(self.successful_providers) / f64::from(self.total_providers) * 100.0
        }
    }

    pub fn duration(&self) -> Duration {
        self.completed_at - self.started_at
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run {} ({}): {}/{} successful ({:.1}%), {} failed",
            self.run_id,
            self.run_type,
            self.successful_providers,
            self.total_providers,
            self.success_percentage(),
            self.failed_providers
        )
    }
}

/// Unresolved failures sharing a step and reason
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureGroup {
    pub step: String,
    pub reason: FailureReason,
    pub count: usize,
    /// Distinct provider names, most recent failure first
    pub example_providers: Vec<String>,
}

/// Unresolved failures grouped by (step, reason)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FailureReport {
    pub total_unresolved: usize,
    pub groups: Vec<FailureGroup>,
}

impl FailureReport {
    /// Group failures, keeping at most `example_limit` provider names per group
    ///
    /// Input order is preserved for examples, so newest-first input yields the
    /// most recent providers. Groups are ordered by count, then step and reason.
    pub fn from_unresolved(failures: &[UnresolvedFailure], example_limit: usize) -> Self {
        let mut index: HashMap<(String, String), usize> = HashMap::new();
        let mut groups: Vec<FailureGroup> = Vec::new();

        for unresolved in failures {
            let failure = &unresolved.failure;
            let key = (failure.step.clone(), failure.failure_reason.clone());
            let position = *index.entry(key).or_insert_with(|| {
                groups.push(FailureGroup {
                    step: failure.step.clone(),
                    reason: failure.reason(),
                    count: 0,
                    example_providers: Vec::new(),
                });
                groups.len() - 1
            });

            let group = &mut groups[position];
            group.count += 1;
            if group.example_providers.len() < example_limit
                && !group.example_providers.contains(&unresolved.display_name)
            {
                group.example_providers.push(unresolved.display_name.clone());
            }
        }

        groups.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.step.cmp(&b.step))
                .then_with(|| a.reason.as_str().cmp(b.reason.as_str()))
        });

        Self {
            total_unresolved: failures.len(),
            groups,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_unresolved == 0
    }
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "No unresolved pipeline failures");
        }

        writeln!(f, "Unresolved pipeline failures: {}", self.total_unresolved)?;
        for group in &self.groups {
            writeln!(f, "  {} / {}: {}", group.step, group.reason, group.count)?;
            if !group.example_providers.is_empty() {
                writeln!(f, "    e.g. {}", group.example_providers.join(", "))?;
            }
        }
        Ok(())
    }
}

/// Failure counts over a fixed rolling window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureStatsReport {
    pub window_days: i64,
    pub rows: Vec<FailureStat>,
}

impl FailureStatsReport {
    pub fn new(window_days: i64, rows: Vec<FailureStat>) -> Self {
        Self { window_days, rows }
    }

    pub fn total(&self) -> i64 {
        self.rows.iter().map(|row| row.total).sum()
    }

    pub fn unresolved(&self) -> i64 {
        self.rows.iter().map(|row| row.unresolved_count).sum()
    }
}

impl fmt::Display for FailureStatsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pipeline failures, last {} days", self.window_days)?;
        writeln!(
            f,
            "  {:<16} {:<22} {:>7} {:>9} {:>11}",
            "step", "reason", "total", "resolved", "unresolved"
        )?;
        for row in &self.rows {
            writeln!(
                f,
                "  {:<16} {:<22} {:>7} {:>9} {:>11}",
                row.step, row.failure_reason, row.total, row.resolved_count, row.unresolved_count
            )?;
        }
        Ok(())
    }
}

/// Read-only access to failure reports and run history
#[derive(Debug, Clone)]
pub struct FailureReporter {
    context: PipelineContext,
}

impl FailureReporter {
    pub fn new(context: PipelineContext) -> Self {
        Self { context }
    }

    pub async fn unresolved_report(&self) -> PipelineResult<FailureReport> {
        let failures = self.context.store.unresolved_failures().await?;
        Ok(FailureReport::from_unresolved(
            &failures,
            self.context.config.reporting.example_provider_limit,
        ))
    }

    pub async fn failure_stats(&self) -> PipelineResult<FailureStatsReport> {
        let since = Utc::now().naive_utc() - Duration::days(FAILURE_STATS_WINDOW_DAYS);
        let rows = self.context.store.failure_stats_since(since).await?;
        Ok(FailureStatsReport::new(FAILURE_STATS_WINDOW_DAYS, rows))
    }

    pub async fn recent_runs(&self, limit: Option<i64>) -> PipelineResult<Vec<PipelineRun>> {
        let limit = limit.unwrap_or(self.context.config.reporting.recent_runs_limit);
        self.context.store.recent_runs(limit).await
    }
}
